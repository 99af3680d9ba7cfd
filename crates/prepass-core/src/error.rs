use std::fmt;
use std::rc::Rc;

/// Cloneable, type-erased error raised by component code.
///
/// Boundaries receive these by reference and may be handed the same value
/// several times, so the underlying error is reference counted rather than
/// owned. An unrecovered value surfaces as [`PrepassError`].
#[derive(Clone)]
pub struct ErrorValue(Rc<anyhow::Error>);

impl ErrorValue {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Rc::new(error.into()))
    }

    /// Builds an error value from a plain message.
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self(Rc::new(anyhow::Error::msg(message)))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Terminal failure of a prepass run.
///
/// Carries the original error value verbatim; the display output is the
/// raising component's message, not a wrapper around it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct PrepassError(ErrorValue);

impl PrepassError {
    pub fn value(&self) -> &ErrorValue {
        &self.0
    }

    pub fn into_value(self) -> ErrorValue {
        self.0
    }
}

impl From<ErrorValue> for PrepassError {
    fn from(value: ErrorValue) -> Self {
        Self(value)
    }
}
