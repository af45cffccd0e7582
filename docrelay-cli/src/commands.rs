//! Command execution.

use crate::{Commands, OutputArgs};
use colored::Colorize;
use docrelay_client::sink::local_file_name;
use docrelay_client::{ClientError, Delivery, Outcome, Request, ResultSink};
use docrelay_protocol::{Action, OptionSet, ValidationError};
use std::path::{Path, PathBuf};

/// Turns a subcommand into a request.
pub fn build_request(cmd: Commands) -> Result<Request, ValidationError> {
    let request = match cmd {
        Commands::Compress { input } => Request::new(Action::Compress, input),
        Commands::Convert { input } => Request::new(Action::Convert, input),
        Commands::Encrypt { input, password } => Request::new(Action::Encrypt, input)
            .with_options(OptionSet::Password { password }),
        Commands::Decrypt { input, password } => Request::new(Action::Decrypt, input)
            .with_options(OptionSet::Password { password }),
        Commands::Split { input, ranges } => {
            Request::new(Action::Split, input).with_options(OptionSet::Ranges { ranges })
        }
        Commands::Merge { inputs } => Request::merge(inputs),
        Commands::Rotate {
            input,
            pages,
            angle,
        } => Request::new(Action::Rotate, input).with_options(OptionSet::Rotate { pages, angle }),
        Commands::AddNumbers { input, position } => Request::new(Action::AddNumbers, input)
            .with_options(OptionSet::Position { position }),
        Commands::PdfToJpg { input } => Request::new(Action::PdfToJpg, input),
        Commands::PdfToWord { input } => Request::new(Action::PdfToWord, input),
        Commands::PdfToPptx { input } => Request::new(Action::PdfToPptx, input),
        Commands::Actions => {
            return Err(ValidationError::UnsupportedAction("actions".into()));
        }
    };
    Ok(request)
}

/// Resolves where a result goes from the output flags.
///
/// Without `--force`, an existing file at the destination declines the
/// result, which ends the request as cancelled.
pub struct OutputTarget {
    args: OutputArgs,
    refused: Option<PathBuf>,
}

impl OutputTarget {
    pub fn new(args: OutputArgs) -> Self {
        Self {
            args,
            refused: None,
        }
    }

    /// The existing file that made this target decline, if any.
    pub fn refused(&self) -> Option<&Path> {
        self.refused.as_deref()
    }

    fn resolve(&self, suggested_name: &str) -> PathBuf {
        match (&self.args.output, &self.args.output_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(local_file_name(suggested_name)),
            (None, None) => PathBuf::from(local_file_name(suggested_name)),
        }
    }
}

impl ResultSink for OutputTarget {
    fn destination(&mut self, suggested_name: &str, _size: u64) -> Option<PathBuf> {
        let dest = self.resolve(suggested_name);
        if dest.exists() && !self.args.force {
            self.refused = Some(dest);
            return None;
        }
        Some(dest)
    }
}

/// Formats the result of a request.
///
/// Failures come back as an exit code and a message; each outcome has its
/// own code.
pub fn render(
    result: &Result<Delivery, ClientError>,
    refused: Option<&Path>,
) -> Result<String, (i32, String)> {
    match result {
        Ok(Delivery::Saved { name, path, size }) => Ok(format!(
            "{} {} ({}) to {}",
            "Saved".green(),
            name.cyan(),
            format_size(*size),
            path.display()
        )),
        Ok(Delivery::Empty { name }) => Ok(format!(
            "{}: server returned an empty result for {}; nothing was saved",
            "Warning".yellow(),
            name.cyan()
        )),
        Err(e) => Err(match e.outcome() {
            Outcome::CouldNotConnect => (2, format!("{}: {}", "Could not connect".red(), e)),
            Outcome::ConnectionLost => (
                3,
                format!("{}: {}", "Connection lost during transfer".red(), e),
            ),
            Outcome::ServerReported => {
                let message = match e {
                    ClientError::ServerReported { message, .. } => message.as_str(),
                    _ => "",
                };
                (4, format!("{}: {}", "Server reported an error".red(), message))
            }
            Outcome::Cancelled => (
                5,
                match refused {
                    Some(path) => format!(
                        "{}: {} already exists (use --force to replace it)",
                        "Operation cancelled".yellow(),
                        path.display()
                    ),
                    None => "Operation cancelled".yellow().to_string(),
                },
            ),
            Outcome::LocalFailure => (1, format!("{}: {}", "Error".red(), e)),
        }),
    }
}

/// Lists every action with its option fields.
pub fn list_actions() -> String {
    let mut output = String::new();
    for action in Action::ALL {
        let fields: Vec<&str> = action.option_fields().iter().map(|f| f.name()).collect();
        if fields.is_empty() {
            output.push_str(&format!("  {}\n", action.as_str().cyan()));
        } else {
            output.push_str(&format!(
                "  {} [{}]\n",
                action.as_str().cyan(),
                fields.join(", ")
            ));
        }
    }
    output.trim_end().to_string()
}

fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} B", bytes)
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else if b < KIB * KIB * KIB {
        format!("{:.1} MiB", b / (KIB * KIB))
    } else {
        format!("{:.1} GiB", b / (KIB * KIB * KIB))
    }
}
