use thiserror::Error;

/// User-facing failure of a single view action.
///
/// Nothing here is fatal: every variant is reported to the user and the
/// action can simply be repeated.
#[derive(Debug, Error)]
pub enum FitError {
    /// Input rejected before any backend call was made.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    /// No session; the caller must send the user to the login route.
    #[error("You must be logged in")]
    Unauthenticated,
    /// The backend refused or could not be reached.
    #[error("{0:#}")]
    Backend(#[from] anyhow::Error),
}

impl FitError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Field name for inline form errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type FitResult<T> = std::result::Result<T, FitError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_validation_carries_field() {
        let err = FitError::validation("weight", "Weight must be greater than 0");
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("weight"));
        assert_eq!(err.to_string(), "Weight must be greater than 0");
    }

    #[test]
    fn test_backend_message_includes_context_chain() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
        let err: FitError = inner.context("Failed to load entries").unwrap_err().into();
        assert!(!err.is_validation());
        assert_eq!(err.field(), None);
        assert_eq!(err.to_string(), "Failed to load entries: connection refused");
    }
}
