//! Action-specific option sets.
//!
//! The initiator turns an [`OptionSet`] into wire fields with
//! [`OptionSet::to_fields`], refusing to send anything invalid. The
//! responder rebuilds it from the raw fields it received with
//! [`OptionSet::from_fields`] and validates again.

use crate::action::{Action, OptionField};
use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Where page numbers are stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Position {
    #[default]
    BottomCenter,
    BottomLeft,
    BottomRight,
    TopCenter,
    TopLeft,
    TopRight,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::BottomCenter,
        Position::BottomLeft,
        Position::BottomRight,
        Position::TopCenter,
        Position::TopLeft,
        Position::TopRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::BottomCenter => "bottom-center",
            Position::BottomLeft => "bottom-left",
            Position::BottomRight => "bottom-right",
            Position::TopCenter => "top-center",
            Position::TopLeft => "top-left",
            Position::TopRight => "top-right",
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(
            self,
            Position::TopCenter | Position::TopLeft | Position::TopRight
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ValidationError::InvalidPosition(name.to_string()))
    }
}

/// Parses a rotation angle: an integer multiple of 90, sign allowed.
pub fn parse_angle(raw: &str) -> Result<i32, ValidationError> {
    let angle: i32 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidAngle(raw.to_string()))?;
    if angle % 90 != 0 {
        return Err(ValidationError::InvalidAngle(raw.to_string()));
    }
    Ok(angle)
}

/// Extra parameters that follow the payload, keyed by action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptionSet {
    /// Actions without options.
    #[default]
    Empty,
    /// `encrypt` and `decrypt`.
    Password { password: String },
    /// `split`: comma-separated page specifications.
    Ranges { ranges: String },
    /// `rotate`: page selection and angle.
    Rotate { pages: String, angle: i32 },
    /// `add_numbers`.
    Position { position: Position },
}

impl OptionSet {
    fn variant_name(&self) -> &'static str {
        match self {
            OptionSet::Empty => "no options",
            OptionSet::Password { .. } => "password",
            OptionSet::Ranges { .. } => "ranges",
            OptionSet::Rotate { .. } => "rotate",
            OptionSet::Position { .. } => "position",
        }
    }

    /// Whether this variant is the one `action` negotiates.
    pub fn matches(&self, action: Action) -> bool {
        match self {
            OptionSet::Empty => action.option_fields().is_empty(),
            OptionSet::Password { .. } => matches!(action, Action::Encrypt | Action::Decrypt),
            OptionSet::Ranges { .. } => action == Action::Split,
            OptionSet::Rotate { .. } => action == Action::Rotate,
            OptionSet::Position { .. } => action == Action::AddNumbers,
        }
    }

    /// Renders the wire fields for `action`, in negotiation order.
    ///
    /// Fails locally on a mismatched variant, an empty field or an invalid
    /// angle, so that nothing invalid is ever put on the wire.
    pub fn to_fields(&self, action: Action) -> Result<Vec<(OptionField, String)>, ValidationError> {
        if !self.matches(action) {
            return Err(ValidationError::OptionMismatch {
                action,
                given: self.variant_name(),
            });
        }

        let fields = match self {
            OptionSet::Empty => Vec::new(),
            OptionSet::Password { password } => {
                vec![(OptionField::Password, password.clone())]
            }
            OptionSet::Ranges { ranges } => vec![(OptionField::Ranges, ranges.clone())],
            OptionSet::Rotate { pages, angle } => {
                if angle % 90 != 0 {
                    return Err(ValidationError::InvalidAngle(angle.to_string()));
                }
                vec![
                    (OptionField::Pages, pages.clone()),
                    (OptionField::Angle, angle.to_string()),
                ]
            }
            OptionSet::Position { position } => {
                vec![(OptionField::Position, position.as_str().to_string())]
            }
        };

        for (field, value) in &fields {
            if is_blank(*field, value) {
                return Err(ValidationError::MissingField(*field));
            }
        }

        Ok(fields)
    }

    /// Rebuilds the option set from fields received for `action`.
    ///
    /// `fields` must follow `action.option_fields()` order; a field arriving
    /// in the wrong slot fails validation of that slot.
    pub fn from_fields(action: Action, fields: &[(OptionField, String)]) -> Result<Self, ValidationError> {
        let expected = action.option_fields();
        for (i, field) in expected.iter().enumerate() {
            match fields.get(i) {
                Some((got, value)) if got == field && !is_blank(*field, value) => {}
                _ => return Err(ValidationError::MissingField(*field)),
            }
        }

        let value = |i: usize| fields[i].1.clone();
        match action {
            Action::Encrypt | Action::Decrypt => Ok(OptionSet::Password { password: value(0) }),
            Action::Split => Ok(OptionSet::Ranges {
                ranges: value(0).trim().to_string(),
            }),
            Action::Rotate => Ok(OptionSet::Rotate {
                pages: value(0).trim().to_string(),
                angle: parse_angle(&value(1))?,
            }),
            Action::AddNumbers => Ok(OptionSet::Position {
                position: value(0).parse()?,
            }),
            _ => Ok(OptionSet::Empty),
        }
    }
}

// Passwords are taken verbatim; every other field is trimmed first.
fn is_blank(field: OptionField, value: &str) -> bool {
    match field {
        OptionField::Password => value.is_empty(),
        _ => value.trim().is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(OptionField, &str)]) -> Vec<(OptionField, String)> {
        pairs.iter().map(|(f, v)| (*f, v.to_string())).collect()
    }

    #[test]
    fn test_position_parse() {
        for position in Position::ALL {
            assert_eq!(position.as_str().parse::<Position>().unwrap(), position);
        }
        assert_eq!(" Top-Left ".parse::<Position>().unwrap(), Position::TopLeft);
        assert!(matches!(
            "middle".parse::<Position>(),
            Err(ValidationError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_parse_angle() {
        assert_eq!(parse_angle("90").unwrap(), 90);
        assert_eq!(parse_angle("-90").unwrap(), -90);
        assert_eq!(parse_angle(" 270 ").unwrap(), 270);
        assert_eq!(parse_angle("0").unwrap(), 0);
        assert!(parse_angle("45").is_err());
        assert!(parse_angle("ninety").is_err());
        assert!(parse_angle("").is_err());
    }

    #[test]
    fn test_to_fields_order() {
        let set = OptionSet::Rotate {
            pages: "all".into(),
            angle: 180,
        };
        assert_eq!(
            set.to_fields(Action::Rotate).unwrap(),
            fields(&[(OptionField::Pages, "all"), (OptionField::Angle, "180")])
        );

        let set = OptionSet::Password {
            password: "s3cret".into(),
        };
        assert_eq!(
            set.to_fields(Action::Decrypt).unwrap(),
            fields(&[(OptionField::Password, "s3cret")])
        );

        assert!(OptionSet::Empty.to_fields(Action::Merge).unwrap().is_empty());
    }

    #[test]
    fn test_to_fields_rejects_mismatch() {
        let set = OptionSet::Ranges {
            ranges: "1-3".into(),
        };
        assert!(matches!(
            set.to_fields(Action::Rotate),
            Err(ValidationError::OptionMismatch { .. })
        ));
        assert!(matches!(
            OptionSet::Empty.to_fields(Action::Encrypt),
            Err(ValidationError::OptionMismatch { .. })
        ));
    }

    #[test]
    fn test_to_fields_rejects_empty_and_bad_angle() {
        let set = OptionSet::Ranges { ranges: "  ".into() };
        assert_eq!(
            set.to_fields(Action::Split),
            Err(ValidationError::MissingField(OptionField::Ranges))
        );

        let set = OptionSet::Password {
            password: String::new(),
        };
        assert_eq!(
            set.to_fields(Action::Encrypt),
            Err(ValidationError::MissingField(OptionField::Password))
        );

        let set = OptionSet::Rotate {
            pages: "1".into(),
            angle: 45,
        };
        assert!(matches!(
            set.to_fields(Action::Rotate),
            Err(ValidationError::InvalidAngle(_))
        ));
    }

    #[test]
    fn test_from_fields_roundtrip_each_action() {
        let cases = [
            (
                Action::Encrypt,
                OptionSet::Password {
                    password: " pass word ".into(),
                },
            ),
            (
                Action::Split,
                OptionSet::Ranges {
                    ranges: "1-3,5,7-".into(),
                },
            ),
            (
                Action::Rotate,
                OptionSet::Rotate {
                    pages: "all".into(),
                    angle: -90,
                },
            ),
            (
                Action::AddNumbers,
                OptionSet::Position {
                    position: Position::TopRight,
                },
            ),
            (Action::Compress, OptionSet::Empty),
        ];

        for (action, set) in cases {
            let wire = set.to_fields(action).unwrap();
            assert_eq!(OptionSet::from_fields(action, &wire).unwrap(), set);
        }
    }

    #[test]
    fn test_from_fields_missing_field() {
        assert_eq!(
            OptionSet::from_fields(Action::Rotate, &fields(&[(OptionField::Pages, "1")])),
            Err(ValidationError::MissingField(OptionField::Angle))
        );
        assert_eq!(
            OptionSet::from_fields(Action::Split, &fields(&[(OptionField::Ranges, " ")])),
            Err(ValidationError::MissingField(OptionField::Ranges))
        );
    }

    #[test]
    fn test_from_fields_swapped_rotate_fields_rejected() {
        // Angle sent where pages were expected and vice versa.
        let swapped = fields(&[(OptionField::Pages, "90"), (OptionField::Angle, "all")]);
        assert!(matches!(
            OptionSet::from_fields(Action::Rotate, &swapped),
            Err(ValidationError::InvalidAngle(_))
        ));

        let mislabeled = fields(&[(OptionField::Angle, "90"), (OptionField::Pages, "all")]);
        assert_eq!(
            OptionSet::from_fields(Action::Rotate, &mislabeled),
            Err(ValidationError::MissingField(OptionField::Pages))
        );
    }

    #[test]
    fn test_from_fields_bad_position() {
        assert!(matches!(
            OptionSet::from_fields(
                Action::AddNumbers,
                &fields(&[(OptionField::Position, "center")])
            ),
            Err(ValidationError::InvalidPosition(_))
        ));
    }
}
