//! Model construction errors.

use crate::validation::{Severity, ValidationIssue};
use std::fmt;
use thiserror::Error;

/// Errors raised while building a resource model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A resource type could not describe itself.
    #[error("failed to introspect {type_name}: {message}")]
    Introspection {
        /// Rust type name of the resource.
        type_name: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Structural validation found fatal issues.
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
}

impl ModelError {
    /// Creates an introspection error for `T`.
    pub fn introspection<T>(message: impl Into<String>) -> Self {
        Self::Introspection {
            type_name: std::any::type_name::<T>(),
            message: message.into(),
        }
    }
}

/// Every issue found by a failed validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelValidationError {
    issues: Vec<ValidationIssue>,
}

impl ModelValidationError {
    /// Wraps the issues of a validation run.
    #[must_use]
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// All issues, including non-fatal ones.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// The fatal issues.
    pub fn fatal(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Fatal)
    }
}

impl fmt::Display for ModelValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fatal: Vec<_> = self.fatal().collect();
        write!(f, "resource model validation failed with {} fatal issue(s)", fatal.len())?;
        for issue in fatal {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ModelValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_only_fatal_issues() {
        let err = ModelValidationError::new(vec![
            ValidationIssue::fatal("/users", "duplicate route GET /users"),
            ValidationIssue::warning("/empty", "resource has no methods"),
        ]);
        let text = err.to_string();
        assert!(text.contains("1 fatal issue"));
        assert!(text.contains("duplicate route GET /users"));
        assert!(!text.contains("no methods"));
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_introspection_names_type() {
        struct Orders;
        let err = ModelError::introspection::<Orders>("no path");
        assert!(err.to_string().contains("Orders"));
    }
}
