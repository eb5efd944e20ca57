//! Crate-level error types shared by the coordinator, transports, and stores.

// self
use crate::{_prelude::*, transport::ApiResponse};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced to callers of the coordinator and client.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout). Never retried.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The server rejected the request as unauthenticated (HTTP 401).
	#[error("Request to `{}` was rejected as unauthenticated.", .response.path)]
	AuthExpired {
		/// Response carrying the 401 status.
		response: ApiResponse,
	},
	/// The server answered with a non-success status other than 401.
	#[error("Request to `{}` failed with HTTP status {}.", .response.path, .response.status)]
	Status {
		/// Response carrying the failing status.
		response: ApiResponse,
	},
	/// The credential refresh triggered by this request failed; stored credentials were purged.
	#[error("Request to `{}` was rejected and the session could not be refreshed.", .response.path)]
	RefreshFailed {
		/// Original 401 response observed by the triggering request.
		response: ApiResponse,
		/// Why the refresh failed.
		#[source]
		cause: RefreshError,
	},
	/// A request queued behind an in-flight refresh was rejected because that refresh failed.
	#[error("Queued request was aborted: {reason}")]
	QueuedRequestAborted {
		/// Summary of the refresh failure that released the queue.
		reason: String,
	},
}
impl Error {
	/// Returns the HTTP status associated with the error, if any.
	///
	/// For [`Error::RefreshFailed`] this is the status of the original request (401), never the
	/// status returned by the refresh endpoint.
	pub fn status(&self) -> Option<u16> {
		self.response().map(|response| response.status)
	}

	/// Returns the HTTP response associated with the error, if any.
	pub fn response(&self) -> Option<&ApiResponse> {
		match self {
			Self::AuthExpired { response }
			| Self::Status { response }
			| Self::RefreshFailed { response, .. } => Some(response),
			_ => None,
		}
	}

	/// Whether the caller should treat the session as ended and re-authenticate.
	pub fn is_session_ended(&self) -> bool {
		matches!(self, Self::RefreshFailed { .. } | Self::QueuedRequestAborted { .. })
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
	/// Request URL could not be assembled from the base URL and path.
	#[error("Request path `{path}` cannot be joined onto the base URL.")]
	RequestUrl {
		/// Offending request path.
		path: String,
	},
	/// API descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::endpoint::DescriptorError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete within the configured timeout.
	#[error("Request timed out while calling the API.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// The request could not be assembled by the transport.
	#[error(transparent)]
	Request(#[from] ConfigError),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

/// Reasons a credential refresh fails. Every variant is terminal for the stored credentials.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// No refresh token is stored, so no refresh call was made.
	#[error("No refresh token is stored.")]
	MissingRefreshToken,
	/// The refresh call failed at the transport level.
	#[error("Refresh call failed at the transport level.")]
	Transport(#[source] TransportError),
	/// The refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the refresh token with HTTP status {status}.")]
	Rejected {
		/// HTTP status returned by the refresh endpoint.
		status: u16,
	},
	/// The refresh endpoint returned a body that is not the expected JSON shape.
	#[error("Refresh endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The refresh response omitted `access_token` (or carried an empty one).
	#[error("Refresh response is missing access_token.")]
	MissingAccessToken,
	/// Reading or writing credentials failed during the refresh.
	#[error("Credential storage failed during refresh.")]
	Storage(#[source] crate::store::StoreError),
	/// The refresh request could not be assembled.
	#[error("Refresh request could not be assembled.")]
	Config(#[source] ConfigError),
}
