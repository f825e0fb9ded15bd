use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for Strata operations
///
/// This enum represents all possible error types that can occur while building,
/// compiling, or replaying a migration. Each error kind describes a specific
/// category of author-facing failure; all of them are detected synchronously
/// and none is retryable.
///
/// # Examples
///
/// ```rust,ignore
/// use strata::errors::{StrataError, ErrorKind, StrataResult};
///
/// fn example() -> StrataResult<()> {
///     Err(StrataError::new("a command is already open", ErrorKind::NestedCommand))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A top-level command was opened while another command is still open
    NestedCommand,
    /// A command replayed backward has no valid inverse
    Irreversible,
    /// A field type is not a recognized primitive or composite
    InvalidFieldType,
    /// A per-key option predicate failed; the message names the key and value
    InvalidOption,
    /// A target's declared scope conflicts with the migration context's scope
    ScopeMismatch,
    /// `flush` was invoked while replaying a single-direction definition backward
    FlushDuringRollback,
    /// The operation is not valid in the current session state
    InvalidOperation,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NestedCommand => write!(f, "Nested command"),
            ErrorKind::Irreversible => write!(f, "Irreversible command"),
            ErrorKind::InvalidFieldType => write!(f, "Invalid field type"),
            ErrorKind::InvalidOption => write!(f, "Invalid option"),
            ErrorKind::ScopeMismatch => write!(f, "Scope mismatch"),
            ErrorKind::FlushDuringRollback => write!(f, "Flush during rollback"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Strata error type.
///
/// `StrataError` encapsulates error information including the error message,
/// kind, and optional cause. It supports error chaining and backtraces for
/// debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use strata::errors::{StrataError, ErrorKind};
///
/// // Create a simple error
/// let err = StrataError::new("unknown field type `MyApp.Custom`", ErrorKind::InvalidFieldType);
///
/// // Create an error with a cause
/// let cause = StrataError::new("invalid value for option `pattern`", ErrorKind::InvalidOption);
/// let err = StrataError::new_with_cause("schema compilation failed", ErrorKind::InvalidOption, cause);
/// ```
///
/// # Type alias
///
/// The `StrataResult<T>` type alias is equivalent to `Result<T, StrataError>`
/// and is used throughout the codebase for operations that can fail.
#[derive(Clone)]
pub struct StrataError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<StrataError>>,
    backtrace: Arc<Backtrace>,
}

impl StrataError {
    /// Creates a new `StrataError` with the specified message and error kind.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    ///
    /// # Returns
    ///
    /// A new `StrataError` instance.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `StrataError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    /// * `cause` - The underlying error that caused this error
    ///
    /// # Returns
    ///
    /// A new `StrataError` instance with the cause error attached.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: StrataError) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&Box<StrataError>> {
        self.cause.as_ref()
    }
}

impl Display for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for StrataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Strata operations.
///
/// `StrataResult<T>` is shorthand for `Result<T, StrataError>`.
/// All fallible Strata operations return this type.
pub type StrataResult<T> = Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ErrorKind Tests ====================

    #[test]
    fn test_error_kind_display() {
        assert_eq!(format!("{}", ErrorKind::NestedCommand), "Nested command");
        assert_eq!(format!("{}", ErrorKind::Irreversible), "Irreversible command");
        assert_eq!(format!("{}", ErrorKind::InvalidOption), "Invalid option");
        assert_eq!(
            format!("{}", ErrorKind::FlushDuringRollback),
            "Flush during rollback"
        );
    }

    #[test]
    fn test_error_kind_equality() {
        assert_eq!(ErrorKind::ScopeMismatch, ErrorKind::ScopeMismatch);
        assert_ne!(ErrorKind::ScopeMismatch, ErrorKind::NestedCommand);
    }

    // ==================== StrataError Tests ====================

    #[test]
    fn test_error_creation() {
        let err = StrataError::new("something failed", ErrorKind::InvalidOperation);
        assert_eq!(err.message(), "something failed");
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        assert!(err.cause().is_none());
    }

    #[test]
    fn test_error_with_cause() {
        let cause = StrataError::new("bad pattern", ErrorKind::InvalidOption);
        let err =
            StrataError::new_with_cause("compilation failed", ErrorKind::InvalidOption, cause);
        assert_eq!(err.message(), "compilation failed");
        let inner = err.cause().expect("cause should be present");
        assert_eq!(inner.message(), "bad pattern");
    }

    #[test]
    fn test_error_display() {
        let err = StrataError::new("a command is already open", ErrorKind::NestedCommand);
        assert_eq!(format!("{}", err), "a command is already open");
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;
        let cause = StrataError::new("root cause", ErrorKind::InternalError);
        let err = StrataError::new_with_cause("outer", ErrorKind::InternalError, cause);
        let source = err.source().expect("source should be present");
        assert_eq!(format!("{}", source), "root cause");
    }

    #[test]
    fn test_error_clone() {
        let err = StrataError::new("cloneable", ErrorKind::InvalidFieldType);
        let cloned = err.clone();
        assert_eq!(cloned.message(), err.message());
        assert_eq!(cloned.kind(), err.kind());
    }
}
