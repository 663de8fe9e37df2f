use hyper::StatusCode;
use std::fmt::Display;
use std::panic::Location;

/// The closed set of error codes understood by the response envelope.
///
/// Every code carries a default HTTP status and a default human message,
/// so a handler can reply with nothing more than a code. Codes serialize
/// to their wire form (e.g. `invalid_json`) in the envelope's `token`
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Fallback for anything that does not map onto a known code.
    Unknown,
    /// An unexpected server-side failure.
    Internal,
    /// A database-layer failure.
    DbError,
    /// The request was malformed or otherwise unacceptable.
    InvalidRequest,
    /// The request body was not valid JSON.
    InvalidJson,
    /// The request body was not valid form data.
    InvalidForm,
    /// The request was well-formed but failed validation.
    Validation,
    /// No resource exists at the requested location.
    NotFound,
    /// The request lacks valid credentials.
    Unauthorized,
    /// The credentials are valid but do not grant access.
    Forbidden,
    /// The request took too long to complete.
    Timeout,
    /// The client is being rate limited.
    TooManyRequests,
    /// A database lookup returned no rows.
    DbNotFound,
    /// A database write collided with an existing row.
    DbDuplicate,
    /// Authentication was attempted and failed.
    AuthFailed,
    /// The presented authentication token has expired.
    TokenExpired,
    /// The presented authentication token is malformed or forged.
    TokenInvalid,
}

impl ErrorCode {
    /// The wire form of this code, as it appears in the envelope.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "unknown",
            ErrorCode::Internal => "internal",
            ErrorCode::DbError => "db_error",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidJson => "invalid_json",
            ErrorCode::InvalidForm => "invalid_form",
            ErrorCode::Validation => "validation",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::Timeout => "timeout",
            ErrorCode::TooManyRequests => "too_many_requests",
            ErrorCode::DbNotFound => "db_not_found",
            ErrorCode::DbDuplicate => "db_duplicate",
            ErrorCode::AuthFailed => "auth_failed",
            ErrorCode::TokenExpired => "token_expired",
            ErrorCode::TokenInvalid => "token_invalid",
        }
    }

    /// Parses a wire-form code. Unknown strings fall back to
    /// [`ErrorCode::Unknown`] rather than failing.
    pub fn parse(s: &str) -> Self {
        match s {
            "internal" => ErrorCode::Internal,
            "db_error" => ErrorCode::DbError,
            "invalid_request" => ErrorCode::InvalidRequest,
            "invalid_json" => ErrorCode::InvalidJson,
            "invalid_form" => ErrorCode::InvalidForm,
            "validation" => ErrorCode::Validation,
            "not_found" => ErrorCode::NotFound,
            "unauthorized" => ErrorCode::Unauthorized,
            "forbidden" => ErrorCode::Forbidden,
            "timeout" => ErrorCode::Timeout,
            "too_many_requests" => ErrorCode::TooManyRequests,
            "db_not_found" => ErrorCode::DbNotFound,
            "db_duplicate" => ErrorCode::DbDuplicate,
            "auth_failed" => ErrorCode::AuthFailed,
            "token_expired" => ErrorCode::TokenExpired,
            "token_invalid" => ErrorCode::TokenInvalid,
            _ => ErrorCode::Unknown,
        }
    }

    /// The HTTP status this code maps to by default.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::Unknown | ErrorCode::Internal | ErrorCode::DbError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::InvalidRequest
            | ErrorCode::InvalidJson
            | ErrorCode::InvalidForm
            | ErrorCode::Validation => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound | ErrorCode::DbNotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized
            | ErrorCode::AuthFailed
            | ErrorCode::TokenExpired
            | ErrorCode::TokenInvalid => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::DbDuplicate => StatusCode::CONFLICT,
        }
    }

    /// The default human-readable message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::Internal => "Internal error",
            ErrorCode::DbError => "Database error",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidJson => "Invalid JSON",
            ErrorCode::InvalidForm => "Invalid form data",
            ErrorCode::Validation => "Validation error",
            ErrorCode::NotFound => "Not found",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::Forbidden => "Forbidden",
            ErrorCode::Timeout => "Request timeout",
            ErrorCode::TooManyRequests => "Too many requests",
            ErrorCode::DbNotFound => "Resource not found",
            ErrorCode::DbDuplicate => "Resource already exists",
            ErrorCode::AuthFailed => "Authentication failed",
            ErrorCode::TokenExpired => "Authentication token expired",
            ErrorCode::TokenInvalid => "Invalid authentication token",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed framework error.
///
/// Carries an [`ErrorCode`], an optional message overriding the code's
/// default, an optional wrapped cause, and the file/line where the error
/// was first constructed. Re-wrapping with [`Error::rewrap`] changes the
/// code and message but keeps the earliest capture site, so logs always
/// point at the origin.
#[derive(Debug)]
pub struct Error {
    code: ErrorCode,
    message: Option<String>,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    site: &'static Location<'static>,
}

impl Error {
    /// Creates an error from a bare code.
    #[track_caller]
    pub fn new(code: ErrorCode) -> Self {
        Error {
            code,
            message: None,
            cause: None,
            site: Location::caller(),
        }
    }

    /// Creates an error wrapping a lower-level cause.
    #[track_caller]
    pub fn with_cause<E>(code: ErrorCode, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error {
            code,
            message: None,
            cause: Some(cause.into()),
            site: Location::caller(),
        }
    }

    /// Overrides the default message for this error's code.
    pub fn with_message<M: Into<String>>(mut self, message: M) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Re-wraps an already-typed error with a new code and message.
    ///
    /// The original capture site is preserved.
    pub fn rewrap<M: Into<String>>(mut self, code: ErrorCode, message: M) -> Self {
        self.code = code;
        self.message = Some(message.into());
        self
    }

    /// This error's code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The HTTP status derived from this error's code.
    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    /// The human-readable message: the override if set, else the code's
    /// default.
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.code.default_message())
    }

    /// `(file, line)` of the construction site.
    pub fn site(&self) -> (&'static str, u32) {
        (self.site.file(), self.site.line())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message())?;
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Error::with_cause(ErrorCode::Internal, err)
    }
}

impl From<std::str::Utf8Error> for Error {
    #[track_caller]
    fn from(err: std::str::Utf8Error) -> Self {
        Error::with_cause(ErrorCode::InvalidRequest, err)
    }
}

impl From<serde_json::Error> for Error {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Error::with_cause(ErrorCode::InvalidJson, err)
    }
}
