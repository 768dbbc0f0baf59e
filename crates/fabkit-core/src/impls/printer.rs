//! WriterPrinter - the `Printer` the CLI uses.
//!
//! Output goes to stdout, stderr or the `tracing` log; responses and
//! summaries render as text or as one JSON object per line.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::domain::{Summary, TaskId};
use crate::ports::{Printer, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    #[default]
    Stdout,
    Stderr,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintFormat {
    #[default]
    Display,
    Json,
}

macro_rules! lowercase_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $name,)+
                })
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($ty))),
                }
            }
        }
    };
}

lowercase_enum!(OutputTarget { Stdout => "stdout", Stderr => "stderr", Log => "log" });
lowercase_enum!(PrintFormat { Display => "display", Json => "json" });

type Sink = Box<dyn Write + Send>;

pub struct WriterPrinter {
    target: OutputTarget,
    format: PrintFormat,
    sink: Mutex<Option<Sink>>,
}

impl WriterPrinter {
    pub fn new(target: OutputTarget, format: PrintFormat) -> Self {
        let sink: Option<Sink> = match target {
            OutputTarget::Stdout => Some(Box::new(std::io::stdout())),
            OutputTarget::Stderr => Some(Box::new(std::io::stderr())),
            OutputTarget::Log => None,
        };
        Self {
            target,
            format,
            sink: Mutex::new(sink),
        }
    }

    /// Print into an arbitrary writer (tests, files).
    pub fn to_writer(writer: impl Write + Send + 'static, format: PrintFormat) -> Self {
        Self {
            target: OutputTarget::Stdout,
            format,
            sink: Mutex::new(Some(Box::new(writer))),
        }
    }

    pub fn target(&self) -> OutputTarget {
        self.target
    }

    pub fn format(&self) -> PrintFormat {
        self.format
    }

    fn emit(&self, line: &str) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match sink.as_mut() {
            Some(writer) => {
                if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
                    warn!(error = %e, "failed to write output");
                }
            }
            None => info!(target: "fabkit::output", "{line}"),
        }
    }

    fn render_response(&self, task_id: TaskId, response: &Response, payload_only: bool) -> Vec<String> {
        match (self.format, payload_only) {
            (PrintFormat::Display, true) => {
                vec![String::from_utf8_lossy(response.payload()).into_owned()]
            }
            (PrintFormat::Display, false) => {
                let mut lines = vec![format!("Task {task_id} - tx {}", response.tx_id)];
                if let Some(code) = response.validation_code {
                    lines.push(format!("  validation code: {code}"));
                }
                for r in &response.responses {
                    lines.push(format!(
                        "  {} status={} message={:?} payload={}",
                        r.endorser,
                        r.status,
                        r.message,
                        String::from_utf8_lossy(&r.payload)
                    ));
                }
                lines
            }
            (PrintFormat::Json, true) => vec![
                json!({
                    "task_id": task_id,
                    "payload": String::from_utf8_lossy(response.payload()),
                })
                .to_string(),
            ],
            (PrintFormat::Json, false) => {
                let endorsements: Vec<serde_json::Value> = response
                    .responses
                    .iter()
                    .map(|r| {
                        json!({
                            "endorser": r.endorser,
                            "status": r.status,
                            "message": r.message,
                            "payload": String::from_utf8_lossy(&r.payload),
                        })
                    })
                    .collect();
                vec![
                    json!({
                        "task_id": task_id,
                        "tx_id": response.tx_id,
                        "validation_code": response.validation_code.map(|c| c.name()),
                        "responses": endorsements,
                    })
                    .to_string(),
                ]
            }
        }
    }
}

impl Printer for WriterPrinter {
    fn print_line(&self, line: &str) {
        match self.format {
            PrintFormat::Display => self.emit(line),
            PrintFormat::Json => self.emit(&json!({ "message": line }).to_string()),
        }
    }

    fn print_response(&self, task_id: TaskId, response: &Response, payload_only: bool) {
        for line in self.render_response(task_id, response, payload_only) {
            self.emit(&line);
        }
    }

    fn print_summary(&self, summary: &Summary) {
        match self.format {
            PrintFormat::Display => {
                for line in summary.render() {
                    self.emit(&line);
                }
            }
            PrintFormat::Json => match serde_json::to_string(summary) {
                Ok(line) => self.emit(&line),
                Err(e) => warn!(error = %e, "failed to serialize summary"),
            },
        }
    }
}

/// In-memory writer shared between a printer and its reader.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
