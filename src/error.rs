use http::Method;
use std::fmt;

/// Error surfaced by the resolver or by a handler's continuation.
///
/// Carries the numeric wire code, a human-readable description, and an
/// optional underlying cause whose backtrace is exposed only in debug
/// configuration (see [`crate::server::response`]).
#[derive(Debug)]
pub struct ApiError {
    /// Numeric status/error code sent on the wire (default 500).
    pub code: u16,
    /// Human-readable description of what went wrong.
    pub description: String,
    /// Underlying cause, when one exists.
    pub cause: Option<anyhow::Error>,
}

impl ApiError {
    /// Request path does not contain the configured API prefix.
    #[must_use]
    pub fn not_api_call() -> Self {
        Self::new(404, "Not an API call.")
    }

    /// Nothing left after the API prefix to name a function.
    #[must_use]
    pub fn function_name_required() -> Self {
        Self::new(404, "Function name required.")
    }

    /// No entry registered under the requested name.
    #[must_use]
    pub fn function_not_found(name: &str) -> Self {
        Self::new(404, format!("Function \"{name}\" not found."))
    }

    /// An entry exists for the name, but not for this method.
    ///
    /// Reported as 500, not 405: the original contract used 500 here and
    /// callers depend on it.
    #[must_use]
    pub fn method_not_allowed(name: &str, method: &Method) -> Self {
        Self::new(500, format!("Function \"{name}\" has no {method} method"))
    }

    /// Error reported by a handler itself, with an arbitrary code.
    #[must_use]
    pub fn handler(code: u16, description: impl Into<String>) -> Self {
        Self::new(code, description)
    }

    #[must_use]
    pub fn new(code: u16, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            cause: None,
        }
    }

    /// Attach an underlying cause to this error.
    #[must_use]
    pub fn with_cause(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(cause);
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.code)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(500, err.to_string()).with_cause(err)
    }
}
