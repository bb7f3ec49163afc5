//! Errors shared across the labeler components.

use thiserror::Error;

/// Errors that can occur while resolving an instance or labeling a node.
#[derive(Error, Debug)]
pub enum LabelerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport-level failure reaching an endpoint (DNS lookup, refused
    /// connection, timeout). The only retryable HTTP failure class.
    #[error("connection error: {0}")]
    Connection(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Kubernetes API call failed.
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The infrastructure API returned no instances.
    #[error("failed to get worker details as instance list is empty")]
    EmptyInstanceList,

    /// No instance matched the requested worker.
    #[error("worker {0} was not found in the instance list fetched from the VPC provider")]
    WorkerNotFound(String),

    /// A name-filtered lookup returned a record for a different instance.
    #[error("instance lookup for {requested} returned {returned} instead")]
    NameMismatch { requested: String, returned: String },

    /// Zone name carries no region separator.
    #[error("zone {0:?} has no region separator")]
    MalformedZone(String),

    /// Instance record is missing a field the labeler needs.
    #[error("instance {0} is missing its {1}")]
    MissingField(String, &'static str),
}

impl LabelerError {
    /// Whether the retry governor may re-attempt the failed operation.
    ///
    /// Connection-class transport failures are transient; a node lookup that
    /// fails for any reason other than the node being gone is worth another
    /// try. Everything else is terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Kube(kube::Error::Api(resp)) => resp.code != 404,
            Self::Kube(_) => true,
            _ => false,
        }
    }
}

/// Classifies a transport error from `reqwest`, so that connection-class
/// failures are recognized as retryable by the governor.
pub(crate) fn classify_transport(err: reqwest::Error) -> LabelerError {
    if err.is_connect() || err.is_timeout() {
        LabelerError::Connection(err.to_string())
    } else {
        LabelerError::Http(err)
    }
}
