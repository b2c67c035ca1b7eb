use std::fmt;

use composer_core::Zone;

/// Hard failures of an edit session. Everything else a user can trigger is
/// handled inside the session (ignored, or reported through notifications).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A re-anchor event named a zone that no reference in the formula
    /// resolves to.
    ReferenceNotFound { zone: Zone },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReferenceNotFound { zone } => write!(
                f,
                "no reference to ({}, {})-({}, {}) in the edited formula",
                zone.left, zone.top, zone.right, zone.bottom
            ),
        }
    }
}

impl std::error::Error for SessionError {}
