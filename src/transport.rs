//! Transport primitives for API calls.
//!
//! The module exposes [`Transport`], the coordinator's only dependency on an HTTP stack,
//! together with the transport-neutral [`ApiRequest`] and [`ApiResponse`] values that flow
//! through it. A transport reports every HTTP status as an `Ok` response; only failures that
//! prevent a response from arriving (DNS, TCP, TLS, timeouts) surface as [`TransportError`].
//!
//! The coordinator holds its transport as a raw handle: requests it sends (refresh calls and
//! replays) never pass back through its own decoration or 401 handling.

// crates.io
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing [`ApiRequest`]s.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared between the
/// coordinator and its callers, and the returned futures must be `Send` so callers can spawn
/// requests onto multi-threaded executors.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and resolves with whatever response the server produced.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}
impl<T> Transport for Arc<T>
where
	T: ?Sized + Transport,
{
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		(**self).send(request)
	}
}

/// Outgoing request addressed by a path relative to the API base URL.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the base URL, always starting with `/`.
	pub path: String,
	/// Query parameters appended in order.
	pub query: Vec<(String, String)>,
	/// Request headers.
	pub headers: HeaderMap,
	/// Raw request body, if any.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request for the given method and path.
	///
	/// An inline query string (`/orders?page=2`) is split off into [`query`](Self::query) and a
	/// fragment is dropped, so `path` is always a bare path.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		let path = path.into();
		let path = path.split_once('#').map_or(path.as_str(), |(path, _)| path);
		let (path, query) = match path.split_once('?') {
			Some((path, query)) => (
				path,
				url::form_urlencoded::parse(query.as_bytes()).into_owned().collect::<Vec<_>>(),
			),
			None => (path, Vec::new()),
		};
		let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };

		Self { method, path, query, headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Inserts (or replaces) a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(ConfigError::RequestBody)?;

		self.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(bytes);

		Ok(self)
	}

	/// Returns the bearer token carried by the `Authorization` header, if any.
	pub fn bearer_token(&self) -> Option<&str> {
		self.headers
			.get(header::AUTHORIZATION)?
			.to_str()
			.ok()?
			.strip_prefix("Bearer ")
			.map(str::trim)
			.filter(|token| !token.is_empty())
	}

	/// Builds the absolute URL for this request under `base`.
	///
	/// The request path is appended to the base path rather than replacing it, so a base of
	/// `https://api.example.com/v1/` and a path of `/orders` yields `/v1/orders`.
	pub fn url(&self, base: &Url) -> Result<Url, ConfigError> {
		let mut url = base.clone();

		if url.cannot_be_a_base() {
			return Err(ConfigError::RequestUrl { path: self.path.clone() });
		}

		let joined = format!("{}{}", base.path().trim_end_matches('/'), self.path);

		url.set_path(&joined);
		url.set_query(None);

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		Ok(url)
	}
}

/// Response returned by a [`Transport`], whatever its status.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Path of the request that produced this response.
	pub path: String,
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with an empty header map.
	pub fn new(path: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { path: path.into(), status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Whether the server rejected the request as unauthenticated.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED.as_u16()
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}

	/// Returns the body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Classifies the response: 2xx is `Ok`, 401 is [`Error::AuthExpired`], anything else is
	/// [`Error::Status`].
	pub fn into_result(self) -> Result<Self> {
		if self.is_success() {
			Ok(self)
		} else if self.is_unauthorized() {
			Err(Error::AuthExpired { response: self })
		} else {
			Err(Error::Status { response: self })
		}
	}
}

/// Connect/receive limits applied by [`ReqwestTransport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportTimeouts {
	/// Maximum time to establish a connection.
	pub connect: Duration,
	/// Maximum time for the whole exchange, including reading the body.
	pub receive: Duration,
}
impl TransportTimeouts {
	const DEFAULT_CONNECT: Duration = Duration::from_secs(30);
	const DEFAULT_RECEIVE: Duration = Duration::from_secs(30);
}
impl Default for TransportTimeouts {
	fn default() -> Self {
		Self { connect: Self::DEFAULT_CONNECT, receive: Self::DEFAULT_RECEIVE }
	}
}

/// [`Transport`] backed by a shared [`ReqwestClient`].
///
/// Redirects are not followed: a redirect status is returned to the caller like any other
/// non-success response.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	base_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport for `base_url` with the provided timeouts.
	pub fn new(base_url: Url, timeouts: TransportTimeouts) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.connect_timeout(timeouts.connect)
			.timeout(timeouts.receive)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self { client, base_url })
	}

	/// Builds a transport pointed at the descriptor's base URL.
	pub fn from_descriptor(
		descriptor: &crate::endpoint::ApiDescriptor,
		timeouts: TransportTimeouts,
	) -> Result<Self, ConfigError> {
		Self::new(descriptor.base_url.clone(), timeouts)
	}

	/// Wraps an existing reqwest [`ReqwestClient`]. Configure it without redirect following.
	pub fn with_client(client: ReqwestClient, base_url: Url) -> Self {
		Self { client, base_url }
	}

	/// Base URL every request path is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let url = request.url(&self.base_url)?;
			let mut builder = self.client.request(request.method, url).headers(request.headers);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { path: request.path, status, headers, body })
		})
	}
}
