//! Error types for the issue tracker boundary.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`TrackerError`] failures.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Failures that can occur while talking to the issue tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Required environment variable is missing.
    #[error("missing tracker environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the missing variable.
        var: &'static str,
    },
    /// Building the HTTP client failed.
    #[error("failed to build tracker client")]
    ClientBuilder {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send tracker request to `{path}`")]
    RequestSend {
        /// API path of the request.
        path: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The tracker answered with an unexpected status code.
    #[error("unexpected tracker response status {status} for `{path}`")]
    RequestStatus {
        /// API path of the request.
        path: String,
        /// Status code the tracker answered with.
        status: StatusCode,
    },
    /// Response payload could not be parsed.
    #[error("failed to decode tracker response for `{path}`")]
    DecodeResponse {
        /// API path of the request.
        path: String,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}
