//! Error types for the region analysis API
//!
//! These report misuse of the API (unbalanced stack operations, unknown
//! declarations, bad options). Problems in the analyzed program are not
//! errors; they are reported as [`Diagnostic`](crate::diagnostics::Diagnostic)s.

use thiserror::Error;

/// Region analysis errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Stack discipline
    /// Pop on an empty region stack
    ///
    /// **Triggered by:** More `pop` calls than `push` calls
    #[error("Region stack is empty")]
    EmptyStack,

    /// Push or pop while a suppression guard hides frames
    ///
    /// **Triggered by:** Calling `push` or `pop` through a parent view
    /// obtained from `suppress_innermost`
    /// **Prevention:** Drop the guard before entering a new region
    #[error("Cannot push or pop a region while {hidden} frame(s) are suppressed")]
    StackSuppressed {
        /// Number of hidden frames
        hidden: usize,
    },

    /// Frames left on the stack when the walk finished
    #[error("Region stack not balanced: {remaining} frame(s) left")]
    UnbalancedStack {
        /// Frames still pushed
        remaining: usize,
    },

    // Input tree
    /// Reference to a declaration missing from the table
    ///
    /// **Triggered by:** A tree whose `DeclId`s do not come from its own
    /// `DeclTable`
    #[error("Unknown declaration #{id}")]
    UnknownDeclaration {
        /// Raw declaration id
        id: u32,
    },

    // Configuration
    /// Options failed validation
    #[error("Invalid analysis options: {0}")]
    InvalidOptions(String),

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an options error with a message
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Error::InvalidOptions(msg.into())
    }

    /// Whether the error indicates a bracketing bug in the caller
    pub fn is_stack_misuse(&self) -> bool {
        matches!(
            self,
            Error::EmptyStack | Error::StackSuppressed { .. } | Error::UnbalancedStack { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type for region analysis operations
pub type Result<T> = std::result::Result<T, Error>;
