//! Problems found while loading a grammar.
//!
//! Loading never fails as a whole. Anything that goes wrong is logged, kept
//! with the model as a [`Diagnostic`], and loading carries on with whatever
//! could be salvaged.

use std::fmt;

use crate::model::Position;

#[derive(Copy, Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Severity {
    #[display(fmt = "error")]
    Error,

    #[display(fmt = "warning")]
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Position,
    pub message: String,
}

impl Diagnostic {
    pub fn error(position: Position, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            position,
            message: message.into(),
        }
    }

    pub fn warning(position: Position, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            position,
            message: message.into(),
        }
    }

    pub(crate) fn log(&self) {
        match self.severity {
            Severity::Error => tracing::error!(location = %self.position, "{}", self.message),
            Severity::Warning => tracing::warn!(location = %self.position, "{}", self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.position, self.severity, self.message)
    }
}
