//! Application error type.
//!
//! Every fallible operation in the library returns `AppError`. The binary maps
//! the error kind to a process exit code, so library code never terminates the
//! process itself.

/// Failure taxonomy for an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing/malformed input file, bad flags, unusable schema.
    Configuration,
    /// The destination output already exists; nothing to do.
    AlreadyExists,
    /// Minimizer non-convergence or insufficient data on one side.
    Fit,
    /// Threshold inversion undefined for the fitted parameters.
    Domain,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::Fit => 3,
            ErrorKind::Domain => 4,
            ErrorKind::AlreadyExists => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::Fit => "fit error",
            ErrorKind::Domain => "domain error",
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn fit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fit, message)
    }

    pub fn domain(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Domain, message)
    }

    /// Prefix the message with the pipeline location that failed
    /// (e.g. `left side / fit`).
    pub fn at(self, context: impl std::fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{context}: {}", self.message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
