//! The ordered step plan shared by both ends of a session.
//!
//! Initiator and responder walk the same sequence; they differ only in which
//! side writes and which side acknowledges each step.

use crate::ack::AckToken;
use crate::action::{Action, OptionField};
use std::fmt;

/// One step of a session, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Action,
    Filename,
    Size,
    Payload,
    Option(OptionField),
    /// Responder-only. No wire representation.
    Process,
    ResultName,
    ResultSize,
    ResultPayload,
}

impl Step {
    /// ACK that closes this step, if any.
    ///
    /// Bulk payloads are never acknowledged: the next step's ACK is the
    /// synchronization point.
    pub fn ack(&self) -> Option<AckToken> {
        match self {
            Step::Action => Some(AckToken::Action),
            Step::Filename => Some(AckToken::Filename),
            Step::Size => Some(AckToken::Size),
            Step::Option(field) => Some(field.ack()),
            Step::ResultName => Some(AckToken::OutFilename),
            Step::ResultSize => Some(AckToken::OutSize),
            Step::Payload | Step::Process | Step::ResultPayload => None,
        }
    }

    /// Whether this step moves bulk bytes.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Step::Payload | Step::ResultPayload)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Action => f.write_str("action"),
            Step::Filename => f.write_str("filename"),
            Step::Size => f.write_str("size"),
            Step::Payload => f.write_str("payload"),
            Step::Option(field) => write!(f, "option '{}'", field),
            Step::Process => f.write_str("processing"),
            Step::ResultName => f.write_str("result name"),
            Step::ResultSize => f.write_str("result size"),
            Step::ResultPayload => f.write_str("result payload"),
        }
    }
}

/// The steps that follow the action tag for one request.
///
/// The action is read before the plan can be known, so it is not part of
/// the plan itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    steps: Vec<Step>,
}

impl SessionPlan {
    /// Plan for a known action: base payload, its option fields, then the
    /// result envelope.
    pub fn for_action(action: Action) -> Self {
        Self::build(action.option_fields())
    }

    fn build(fields: &[OptionField]) -> Self {
        let mut steps = vec![Step::Filename, Step::Size, Step::Payload];
        steps.extend(fields.iter().copied().map(Step::Option));
        steps.extend([
            Step::Process,
            Step::ResultName,
            Step::ResultSize,
            Step::ResultPayload,
        ]);
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Option fields in the order they are exchanged.
    pub fn option_fields(&self) -> impl Iterator<Item = OptionField> + '_ {
        self.steps.iter().filter_map(|step| match step {
            Step::Option(field) => Some(*field),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_without_options() {
        let plan = SessionPlan::for_action(Action::Compress);
        assert_eq!(
            plan.steps(),
            &[
                Step::Filename,
                Step::Size,
                Step::Payload,
                Step::Process,
                Step::ResultName,
                Step::ResultSize,
                Step::ResultPayload,
            ]
        );
    }

    #[test]
    fn test_plan_rotate_orders_pages_before_angle() {
        let plan = SessionPlan::for_action(Action::Rotate);
        let fields: Vec<_> = plan.option_fields().collect();
        assert_eq!(fields, vec![OptionField::Pages, OptionField::Angle]);

        let payload = plan.steps().iter().position(|s| *s == Step::Payload).unwrap();
        let process = plan.steps().iter().position(|s| *s == Step::Process).unwrap();
        assert_eq!(plan.steps()[payload + 1], Step::Option(OptionField::Pages));
        assert_eq!(plan.steps()[payload + 2], Step::Option(OptionField::Angle));
        assert_eq!(payload + 3, process);
    }

    #[test]
    fn test_every_action_exchanges_exactly_its_fields() {
        for action in Action::ALL {
            let plan = SessionPlan::for_action(action);
            let fields: Vec<_> = plan.option_fields().collect();
            assert_eq!(fields.as_slice(), action.option_fields(), "{action}");
        }
    }

    #[test]
    fn test_step_acks() {
        assert_eq!(Step::Payload.ack(), None);
        assert_eq!(Step::ResultPayload.ack(), None);
        assert_eq!(Step::Process.ack(), None);
        assert_eq!(Step::ResultName.ack(), Some(AckToken::OutFilename));
        assert_eq!(
            Step::Option(OptionField::Position).ack(),
            Some(AckToken::Position)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Step::Filename.to_string(), "filename");
        assert_eq!(
            Step::Option(OptionField::Password).to_string(),
            "option 'password'"
        );
        assert_eq!(Step::ResultSize.to_string(), "result size");
    }
}
