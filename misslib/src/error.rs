use std::error::Error;
use std::fmt;
use std::io;

/// All failures the library reports to the caller
///
/// Configuration errors fire before any address is processed. Source errors
/// abort the run with no partial statistics. Log sink errors are recorded but
/// never abort a run, the debug log is best effort
#[derive(Debug)]
pub enum SimError {
    /// The configuration is invalid, naming the offending field
    Config { field: &'static str, reason: String },
    /// The trace source failed after producing `records_read` full records
    Source { records_read: u64, source: io::Error },
    /// The optional debug log sink failed after `records_written` records
    LogSink { records_written: u64, source: io::Error },
}

impl SimError {
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        SimError::Config {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config { field, reason } => {
                write!(f, "invalid configuration: {field} {reason}")
            }
            SimError::Source {
                records_read,
                source,
            } => {
                write!(
                    f,
                    "trace source failed after {records_read} records: {source}"
                )
            }
            SimError::LogSink {
                records_written,
                source,
            } => {
                write!(
                    f,
                    "debug log sink failed after {records_written} records: {source}"
                )
            }
        }
    }
}

impl Error for SimError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimError::Config { .. } => None,
            SimError::Source { source, .. } | SimError::LogSink { source, .. } => Some(source),
        }
    }
}
