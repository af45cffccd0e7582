//! Engine that shells out to configured commands.
//!
//! Each action maps to an argv template. Placeholders are substituted per
//! argument:
//!
//! - `{input}` - the primary input document
//! - `{inputs}` - as a whole argument, expands to every input in order
//! - `{output}` - where a single-file result must be written
//! - `{output_dir}` - where multi-file results must be written
//! - `{password}`, `{ranges}`, `{pages}`, `{angle}`, `{position}` - options
//!
//! Arguments are passed directly to the program, never through a shell.

use crate::engine::{ProcessOutput, ProcessRequest, ProcessingEngine};
use crate::error::ProcessingError;
use docrelay_protocol::{Action, OptionSet, OutputShape};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_STDERR_CHARS: usize = 200;
const STDERR_KEEP_BYTES: usize = 4 * MAX_STDERR_CHARS;

/// Runs external programs for the actions it has templates for.
#[derive(Debug, Clone, Default)]
pub struct CommandEngine {
    commands: HashMap<Action, Vec<String>>,
    timeout: Option<Duration>,
}

impl CommandEngine {
    pub fn new(commands: HashMap<Action, Vec<String>>) -> Self {
        let commands = commands
            .into_iter()
            .filter(|(action, argv)| {
                if argv.is_empty() {
                    warn!(%action, "ignoring empty command template");
                }
                !argv.is_empty()
            })
            .collect();
        Self {
            commands,
            timeout: None,
        }
    }

    /// Kills a command that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the argv for `request`, placeholders substituted.
    pub fn render(&self, request: &ProcessRequest, output_dir: &Path) -> Result<Vec<String>, ProcessingError> {
        let template = self
            .commands
            .get(&request.action)
            .ok_or(ProcessingError::Unsupported {
                action: request.action,
            })?;
        let input = display(request.primary_input()?);
        let output = display(&request.output);
        let output_dir = display(output_dir);
        let vars = option_vars(&request.options);

        let mut argv = Vec::with_capacity(template.len());
        for arg in template {
            if arg == "{inputs}" {
                argv.extend(request.inputs.iter().map(|p| display(p)));
                continue;
            }
            let mut rendered = arg
                .replace("{input}", &input)
                .replace("{output_dir}", &output_dir)
                .replace("{output}", &output);
            for (name, value) in &vars {
                rendered = rendered.replace(name, value);
            }
            argv.push(rendered);
        }
        Ok(argv)
    }

    fn run(&self, argv: &[String], work_dir: &Path) -> Result<(), ProcessingError> {
        let (program, args) = argv.split_first().ok_or_else(|| ProcessingError::Command {
            program: String::new(),
            detail: "empty command".into(),
        })?;
        debug!(program, args = args.len(), "running command");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessingError::Command {
                program: program.clone(),
                detail: e.to_string(),
            })?;

        // Drained concurrently so a chatty command never blocks on a full pipe.
        let stderr_reader = child
            .stderr
            .take()
            .map(|pipe| std::thread::spawn(move || drain_tail(pipe)));

        let status = match self.timeout {
            Some(limit) => {
                let started = Instant::now();
                loop {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if started.elapsed() >= limit {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ProcessingError::CommandTimeout {
                            program: program.clone(),
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
            None => child.wait()?,
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let stderr = stderr.trim();
            let tail: String = stderr
                .chars()
                .skip(stderr.chars().count().saturating_sub(MAX_STDERR_CHARS))
                .collect();
            return Err(ProcessingError::Command {
                program: program.clone(),
                detail: format!("{} {}", status, tail).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Reads `pipe` to the end, keeping only the last [`STDERR_KEEP_BYTES`].
fn drain_tail<R: Read>(mut pipe: R) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                kept.extend_from_slice(&buf[..n]);
                if kept.len() > STDERR_KEEP_BYTES {
                    kept.drain(..kept.len() - STDERR_KEEP_BYTES);
                }
            }
        }
    }
    kept
}

impl ProcessingEngine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    fn supports(&self, action: Action) -> bool {
        self.commands.contains_key(&action)
    }

    fn process(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessingError> {
        let output_dir = request.work_dir.join("parts");
        let shape = request.action.output_shape();
        if shape == OutputShape::Archive {
            std::fs::create_dir_all(&output_dir)?;
        }

        let argv = self.render(request, &output_dir)?;
        self.run(&argv, &request.work_dir)?;

        let output = match shape {
            OutputShape::Single => ProcessOutput::File(request.output.clone()),
            OutputShape::Archive => ProcessOutput::Files(collect_files(&output_dir)?),
        };
        if let ProcessOutput::Files(files) = &output {
            if files.is_empty() {
                return Err(ProcessingError::MissingOutput(output_dir));
            }
        }
        output.verify()?;
        info!(action = %request.action, program = %argv[0], "command finished");
        Ok(output)
    }
}

fn option_vars(options: &OptionSet) -> Vec<(&'static str, String)> {
    match options {
        OptionSet::Empty => vec![],
        OptionSet::Password { password } => vec![("{password}", password.clone())],
        OptionSet::Ranges { ranges } => vec![("{ranges}", ranges.clone())],
        OptionSet::Rotate { pages, angle } => {
            vec![("{pages}", pages.clone()), ("{angle}", angle.to_string())]
        }
        OptionSet::Position { position } => vec![("{position}", position.to_string())],
    }
}

fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, ProcessingError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
