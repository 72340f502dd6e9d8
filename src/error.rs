//! Error handling in [`kubedyn`][crate]
use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors when working with [`kubedyn`][crate]
#[derive(Error, Debug)]
pub enum Error {
    /// A shortKind or fullKind has no matching entry in the [`Registry`](crate::registry::Registry).
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    /// A shortKind resolved to more than one fullKind; the caller must disambiguate.
    #[error("ambiguous kind {kind}: candidates {candidates:?}")]
    AmbiguousKind {
        /// The shortKind that was looked up.
        kind: String,
        /// The fullKinds it could refer to.
        candidates: Vec<String>,
    },

    /// An empty or otherwise invalid argument was passed to a convertor operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying transport failed to complete a request.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API server responded with a JSON body whose `status` field is `"Failure"`.
    #[error("api error: {message} (reason: {reason}, code: {code})")]
    ApiFailure {
        /// Server-provided human readable message.
        message: String,
        /// Server-provided machine readable reason.
        reason: String,
        /// HTTP-ish status code reported by the server.
        code: u16,
    },

    /// A response body or watch event line was not valid JSON, or not shaped as expected.
    #[error("parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// A watch session ended, normally or due to a stream error.
    #[error("watch cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

/// Errors surfaced by the default [`transport`](crate::transport) implementation of
/// [`RequestExecutor`](crate::executor::RequestExecutor).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to build an `http::Request`.
    #[error("failed to build request: {0}")]
    BuildRequest(#[source] http::Error),

    /// The underlying hyper client failed to execute the request.
    #[error("request execution failed: {0}")]
    Hyper(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Failed to read the response body.
    #[error("failed to read response body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The credential material (token/basic-auth/kubeconfig) was invalid.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Failed to load or parse a kubeconfig file.
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    /// Failed to configure TLS for the transport.
    #[error("tls configuration error: {0}")]
    Tls(String),

    /// The server responded with a non-2xx status and no JSON body carrying its own
    /// `status: "Failure"` classification (which would instead surface as
    /// [`Error::ApiFailure`]).
    #[error("unexpected http status {status}: {body:?}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The raw response body, if any (may be empty or non-JSON).
        body: String,
    },
}
