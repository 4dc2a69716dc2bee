use thiserror::Error;

/// Why a single input line could not be processed.
#[derive(Clone, Debug, Error)]
pub enum LineError {
    #[error("line {line}: expected at least {expected} tab-separated fields, found {found}")]
    TooFewFields {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: bad alignment: {reason}")]
    BadAlignment { line: usize, reason: String },
    #[error("line {line}: not valid UTF-8")]
    InvalidUtf8 { line: usize },
}

impl LineError {
    pub fn line(&self) -> usize {
        match self {
            Self::TooFewFields { line, .. }
            | Self::BadAlignment { line, .. }
            | Self::InvalidUtf8 { line } => *line,
        }
    }
}
