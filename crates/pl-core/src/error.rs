use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RenderError {
    pub code: String,
    pub message: String,
    pub line: Option<usize>,
}

impl RenderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(code: impl Into<String>, message: impl Into<String>, line: usize) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            line: Some(line),
        }
    }
}
