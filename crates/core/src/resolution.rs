//! Outcome of a single resolution step.

use crate::error::StoreResult;
use crate::model::{UnresolvedField, UnresolvedReason};

/// Result of trying to link a submitted value to master data.
///
/// A failed lookup is kept apart from a clean miss so it can be reported, but both leave the
/// field without a reference and neither stops the surrounding operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved(T),
    Unresolved,
    Failed(String),
}

impl<T> Resolution<T> {
    /// Wraps a store lookup: `Some` resolves, `None` is a miss, an error is a failure.
    pub fn from_lookup(lookup: StoreResult<Option<T>>) -> Self {
        match lookup {
            Ok(Some(value)) => Resolution::Resolved(value),
            Ok(None) => Resolution::Unresolved,
            Err(e) => Resolution::Failed(e.to_string()),
        }
    }

    /// Runs the next strategy unless this one resolved.
    ///
    /// When neither resolves, the first failure is kept so a lookup error is not hidden by a
    /// later clean miss.
    pub fn or_else(self, next: impl FnOnce() -> Resolution<T>) -> Self {
        match self {
            Resolution::Resolved(_) => self,
            Resolution::Unresolved => next(),
            Resolution::Failed(message) => match next() {
                Resolution::Resolved(value) => Resolution::Resolved(value),
                _ => Resolution::Failed(message),
            },
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// Describes why the field stayed empty, or `None` when it resolved.
    pub fn unresolved_field(&self, field: &str) -> Option<UnresolvedField> {
        let reason = match self {
            Resolution::Resolved(_) => return None,
            Resolution::Unresolved => UnresolvedReason::NoMatch,
            Resolution::Failed(message) => {
                tracing::warn!(field, error = %message, "lookup failed, leaving field unresolved");
                UnresolvedReason::LookupFailed {
                    message: message.clone(),
                }
            }
        };
        Some(UnresolvedField {
            field: field.to_string(),
            reason,
        })
    }
}
