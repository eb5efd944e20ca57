//! Token refresh coordination: bearer decoration, single-flight refresh, queued replay.
//!
//! [`Coordinator`] exposes two entry points. [`Coordinator::decorate_request`] attaches the
//! stored access token to requests for protected paths. [`Coordinator::handle_response_error`]
//! inspects failed responses; a 401 on a protected path drives the refresh protocol:
//!
//! - The first caller to observe a 401 while idle becomes the leader, flips the state to
//!   refreshing, and performs the refresh call through the raw transport.
//! - Every caller observing a 401 while the refresh is in flight is parked in a FIFO queue and
//!   suspended on a one-shot continuation.
//! - On success the leader persists the new token, returns the state to idle, and hands every
//!   parked caller a turn. Each caller re-decorates and sends its own retry; retries start in
//!   arrival order and the leader's own retry starts last. A cancelled caller never takes another
//!   caller's retry down with it.
//! - On failure the leader purges both tokens, returns the state to idle, rejects every parked
//!   request with [`Error::QueuedRequestAborted`], and reports [`Error::RefreshFailed`] carrying
//!   its original 401 response.

mod metrics;
mod refresh;
mod state;

pub use metrics::RefreshMetrics;

// std
use std::{pin::pin, task::Poll};
// crates.io
use futures::channel::oneshot;
use http::{HeaderValue, header};
// self
use crate::{
	_prelude::*,
	auth::TokenKind,
	coordinator::state::{Admission, PendingRequest, RefreshLease, RefreshState, ReplayTurn},
	endpoint::{ApiDescriptor, EndpointClass},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
	transport::{ApiRequest, ApiResponse, Transport},
};

/// Coordinates bearer decoration and the single-flight refresh protocol for one API.
///
/// The coordinator owns the refresh state and the queue of parked requests; credentials stay
/// in the [`TokenStore`], which is re-read on every decoration and refresh. The transport is
/// held as a raw handle: refresh calls and replays go straight to it and never re-enter the
/// coordinator.
pub struct Coordinator<C>
where
	C: ?Sized + Transport,
{
	transport: Arc<C>,
	store: Arc<dyn TokenStore>,
	descriptor: ApiDescriptor,
	state: Mutex<RefreshState>,
	credential_lock: Arc<AsyncMutex<()>>,
	refresh_metrics: Arc<RefreshMetrics>,
}
impl<C> Coordinator<C>
where
	C: ?Sized + Transport,
{
	/// Creates a coordinator over the provided store, descriptor, and raw transport.
	pub fn new(store: Arc<dyn TokenStore>, descriptor: ApiDescriptor, transport: Arc<C>) -> Self {
		Self {
			transport,
			store,
			descriptor,
			state: Default::default(),
			credential_lock: Default::default(),
			refresh_metrics: Default::default(),
		}
	}

	/// Counters describing refresh activity so far.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Descriptor used for endpoint classification and the refresh path.
	pub fn descriptor(&self) -> &ApiDescriptor {
		&self.descriptor
	}

	/// Whether a refresh is currently in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().is_refreshing()
	}

	/// Attaches `Authorization: Bearer <access token>` to requests for protected paths.
	///
	/// Requests for public paths, and requests made while no access token is stored, are
	/// returned unchanged. This never fails: a store failure or a token that cannot be encoded
	/// as a header value is logged and the request passes through undecorated.
	pub async fn decorate_request(&self, mut request: ApiRequest) -> ApiRequest {
		if self.descriptor.classify(&request.path) == EndpointClass::Public {
			return request;
		}

		let token = match self.store.read(TokenKind::Access).await {
			Ok(Some(token)) if !token.is_empty() => token,
			Ok(_) => return request,
			Err(e) => {
				obs::warn_absorbed(FlowKind::Decorate, "Access token read failed.", &e);

				return request;
			},
		};

		match HeaderValue::try_from(format!("Bearer {}", token.expose())) {
			Ok(mut value) => {
				value.set_sensitive(true);
				request.headers.insert(header::AUTHORIZATION, value);
			},
			Err(e) => obs::warn_absorbed(
				FlowKind::Decorate,
				"Access token is not a valid header value.",
				&e,
			),
		}

		request
	}

	/// Resolves a failed request.
	///
	/// Anything other than [`Error::AuthExpired`] on a protected path is returned unchanged.
	/// A 401 on a protected path is absorbed: the caller either leads a refresh or waits for the
	/// one in flight, and receives the outcome of its single retry, [`Error::RefreshFailed`]
	/// (leader), or [`Error::QueuedRequestAborted`] (parked caller).
	///
	/// Pass the request exactly as it was sent. Its bearer token tells a stale 401 (the stored
	/// token was rotated after it was sent, so no refresh call is needed) from a fresh one; a
	/// request without a bearer token always drives the refresh protocol.
	pub async fn handle_response_error(
		&self,
		request: ApiRequest,
		error: Error,
	) -> Result<ApiResponse> {
		let response = match error {
			Error::AuthExpired { response }
				if self.descriptor.classify(&request.path) == EndpointClass::Protected =>
				response,
			other => return Err(other),
		};
		let admission = self.state.lock().admit(request);

		match admission {
			Admission::Leader(request) => self.lead_refresh(request, response).await,
			Admission::Follower(receiver) => {
				const KIND: FlowKind = FlowKind::Queued;

				self.refresh_metrics.record_queued();
				obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

				let result = FlowSpan::new(KIND, "handle_response_error")
					.instrument(async move {
						let turn = receiver.await.unwrap_or_else(|_| {
							Err(Error::QueuedRequestAborted {
								reason: "The refresh was abandoned before it settled.".into(),
							})
						})?;

						self.retry_queued(turn).await
					})
					.await;

				match &result {
					Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
					Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
				}

				result
			},
		}
	}

	/// Sends a request through the raw transport and classifies the response.
	pub(crate) async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.transport.send(request).await?.into_result()
	}

	/// Shared lock serializing every credential write (refresh, purge, login, logout).
	pub(crate) fn credential_lock(&self) -> &AsyncMutex<()> {
		&self.credential_lock
	}

	pub(crate) fn store(&self) -> &dyn TokenStore {
		self.store.as_ref()
	}

	async fn lead_refresh(
		&self,
		request: ApiRequest,
		response: ApiResponse,
	) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Refresh;

		let lease = RefreshLease::new(&self.state);
		let span = FlowSpan::new(KIND, "lead_refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let outcome = span
			.instrument(async {
				let _credentials = self.credential_lock.lock().await;
				let outcome = self.refresh_credentials(request.bearer_token()).await;

				if outcome.is_err() {
					self.purge_credentials().await;
				}

				outcome
			})
			.await;
		let pending = lease.settle();

		obs::record_released_queue(pending.len());

		match outcome {
			Ok(()) => {
				self.refresh_metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				let queue_started = state::release_turns(pending);

				self.replay(request, queue_started).await
			},
			Err(cause) => {
				self.refresh_metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				let reason = cause.to_string();

				for PendingRequest { responder, .. } in pending {
					let _ = responder
						.send(Err(Error::QueuedRequestAborted { reason: reason.clone() }));
				}

				Err(Error::RefreshFailed { response, cause })
			},
		}
	}

	/// Sends the leader's own retry once every parked request has started its retry.
	async fn replay(
		&self,
		request: ApiRequest,
		queue_started: Option<oneshot::Receiver<()>>,
	) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Replay;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = FlowSpan::new(KIND, "replay")
			.instrument(async {
				if let Some(started) = queue_started {
					// Cancelled when the last parked caller left before retrying.
					let _ = started.await;
				}

				let request = self.decorate_request(request).await;

				self.dispatch(request).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Runs a parked request's retry once its predecessor in the queue has started.
	async fn retry_queued(&self, turn: ReplayTurn) -> Result<ApiResponse> {
		let ReplayTurn { request, after, started } = turn;

		if let Some(after) = after {
			let _ = after.await;
		}

		let request = self.decorate_request(request).await;
		let mut retry = pin!(self.dispatch(request));
		let first = futures::poll!(retry.as_mut());

		let _ = started.send(());

		match first {
			Poll::Ready(result) => result,
			Poll::Pending => retry.await,
		}
	}

	/// Deletes both tokens. Failures are logged; the purge continues with the next key.
	async fn purge_credentials(&self) {
		for kind in TokenKind::ALL {
			if let Err(e) = self.store.delete(kind).await {
				obs::warn_absorbed(FlowKind::Refresh, "Credential purge failed.", &e);
			}
		}
	}
}
impl<C> Debug for Coordinator<C>
where
	C: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("descriptor", &self.descriptor)
			.field("refreshing", &self.is_refreshing())
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{Credentials, TokenSecret},
		error::{RefreshError, TransportError},
		store::{MemoryStore, StoreError, StoreFuture},
		transport::TransportFuture,
	};

	type Outcome = Result<ApiResponse, TransportError>;
	type Route = Box<dyn Fn(&ApiRequest) -> Outcome + Send + Sync>;

	struct FakeTransport {
		route: Route,
		calls: Mutex<Vec<(String, Option<String>)>>,
	}
	impl FakeTransport {
		fn new(route: impl Fn(&ApiRequest) -> Outcome + 'static + Send + Sync) -> Arc<Self> {
			Arc::new(Self { route: Box::new(route), calls: Default::default() })
		}

		fn calls(&self) -> Vec<(String, Option<String>)> {
			self.calls.lock().clone()
		}
	}
	impl Transport for FakeTransport {
		fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
			self.calls.lock().push((request.path.clone(), request.bearer_token().map(Into::into)));

			let outcome = (self.route)(&request);

			Box::pin(async move { outcome })
		}
	}

	struct BrokenStore;
	impl TokenStore for BrokenStore {
		fn read(&self, _: TokenKind) -> StoreFuture<'_, Option<TokenSecret>> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}

		fn write(&self, _: TokenKind, _: TokenSecret) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}

		fn delete(&self, _: TokenKind) -> StoreFuture<'_, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}
	}

	fn descriptor() -> ApiDescriptor {
		ApiDescriptor::builder(
			Url::parse("https://api.example.com").expect("Base URL fixture should parse."),
		)
		.build()
		.expect("Descriptor fixture should build.")
	}

	fn seeded_store(access: &str, refresh: &str) -> Arc<MemoryStore> {
		Arc::new(MemoryStore::with_credentials(Credentials::new(access, refresh)))
	}

	fn coordinator(
		store: Arc<MemoryStore>,
		transport: Arc<FakeTransport>,
	) -> Coordinator<FakeTransport> {
		Coordinator::new(store, descriptor(), transport)
	}

	fn call(path: &str, token: Option<&str>) -> (String, Option<String>) {
		(path.to_owned(), token.map(ToOwned::to_owned))
	}

	fn unauthorized(path: &str) -> Error {
		Error::AuthExpired { response: ApiResponse::new(path, 401, Vec::new()) }
	}

	fn rotating_api(request: &ApiRequest) -> Result<ApiResponse, TransportError> {
		let response = match (request.path.as_str(), request.bearer_token()) {
			("/auth/refresh", _) =>
				ApiResponse::new(&request.path, 200, &b"{\"access_token\":\"A2\"}"[..]),
			(_, Some("A2")) => ApiResponse::new(&request.path, 200, &b"ok"[..]),
			_ => ApiResponse::new(&request.path, 401, Vec::new()),
		};

		Ok(response)
	}

	#[tokio::test]
	async fn decorate_attaches_bearer_to_protected_paths() {
		let coordinator = coordinator(seeded_store("A1", "R1"), FakeTransport::new(rotating_api));
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;

		assert_eq!(request.bearer_token(), Some("A1"));
		assert!(
			request
				.headers
				.get(header::AUTHORIZATION)
				.expect("Authorization header should be attached.")
				.is_sensitive()
		);
	}

	#[tokio::test]
	async fn decorate_skips_public_paths_even_with_a_token() {
		let coordinator = coordinator(seeded_store("A1", "R1"), FakeTransport::new(rotating_api));

		for path in ["/auth/login", "/auth/register", "/auth/refresh"] {
			let request = coordinator.decorate_request(ApiRequest::post(path)).await;

			assert!(request.headers.get(header::AUTHORIZATION).is_none(), "{path} was decorated");
		}
	}

	#[tokio::test]
	async fn decorate_passes_through_without_a_token() {
		let coordinator =
			coordinator(Arc::new(MemoryStore::default()), FakeTransport::new(rotating_api));
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;

		assert!(request.headers.is_empty());
	}

	#[tokio::test]
	async fn decorate_survives_store_failures() {
		let coordinator: Coordinator<FakeTransport> =
			Coordinator::new(Arc::new(BrokenStore), descriptor(), FakeTransport::new(rotating_api));
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;

		assert!(request.headers.is_empty());
	}

	#[tokio::test]
	async fn non_401_errors_pass_through_untouched() {
		let transport = FakeTransport::new(rotating_api);
		let coordinator = coordinator(seeded_store("A1", "R1"), transport.clone());
		let error = Error::Status { response: ApiResponse::new("/orders", 500, Vec::new()) };
		let err = coordinator
			.handle_response_error(ApiRequest::get("/orders"), error)
			.await
			.expect_err("A 500 should be passed through.");

		assert!(matches!(err, Error::Status { .. }));
		assert_eq!(err.status(), Some(500));
		assert!(transport.calls().is_empty());
	}

	#[tokio::test]
	async fn unauthorized_public_request_is_not_refreshed() {
		let transport = FakeTransport::new(rotating_api);
		let coordinator = coordinator(seeded_store("A1", "R1"), transport.clone());
		let err = coordinator
			.handle_response_error(ApiRequest::post("/auth/login"), unauthorized("/auth/login"))
			.await
			.expect_err("A 401 from the login endpoint should be passed through.");

		assert!(matches!(err, Error::AuthExpired { .. }));
		assert!(transport.calls().is_empty());
		assert_eq!(coordinator.refresh_metrics().attempts(), 0);
	}

	#[tokio::test]
	async fn unauthorized_protected_request_is_refreshed_and_retried() {
		let store = seeded_store("A1", "R1");
		let transport = FakeTransport::new(rotating_api);
		let coordinator = coordinator(store.clone(), transport.clone());
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;
		let response = coordinator
			.handle_response_error(request, unauthorized("/orders"))
			.await
			.expect("Retried request should succeed with the new token.");

		assert_eq!(response.text(), "ok");
		assert_eq!(
			transport.calls(),
			vec![call("/auth/refresh", None), call("/orders", Some("A2"))]
		);
		assert_eq!(store.peek(TokenKind::Access).map(|t| t.expose().to_owned()), Some("A2".into()));
		assert_eq!(
			store.peek(TokenKind::Refresh).map(|t| t.expose().to_owned()),
			Some("R1".into())
		);
		assert!(!coordinator.is_refreshing());
	}

	#[tokio::test]
	async fn already_rotated_token_skips_the_refresh_call() {
		let store = seeded_store("A2", "R1");
		let transport = FakeTransport::new(rotating_api);
		let coordinator = coordinator(store, transport.clone());
		let stale = ApiRequest::get("/orders")
			.with_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer A1"));

		coordinator
			.handle_response_error(stale, unauthorized("/orders"))
			.await
			.expect("Request should be retried with the already rotated token.");

		assert_eq!(transport.calls(), vec![call("/orders", Some("A2"))]);
		assert_eq!(coordinator.refresh_metrics().attempts(), 1);
		assert_eq!(coordinator.refresh_metrics().network_calls(), 0);
	}

	#[tokio::test]
	async fn undecorated_request_still_drives_the_refresh() {
		let store = seeded_store("A1", "R1");
		let transport = FakeTransport::new(rotating_api);
		let coordinator = coordinator(store.clone(), transport.clone());
		let response = coordinator
			.handle_response_error(ApiRequest::get("/orders"), unauthorized("/orders"))
			.await
			.expect("Request without a bearer token should be refreshed and retried.");

		assert_eq!(response.text(), "ok");
		assert_eq!(
			transport.calls(),
			vec![call("/auth/refresh", None), call("/orders", Some("A2"))]
		);
		assert_eq!(coordinator.refresh_metrics().network_calls(), 1);
		assert_eq!(store.peek(TokenKind::Access).map(|t| t.expose().to_owned()), Some("A2".into()));
	}

	#[tokio::test]
	async fn refresh_token_alone_recovers_the_session() {
		let store = Arc::new(MemoryStore::default());

		store
			.write(TokenKind::Refresh, TokenSecret::new("R1"))
			.await
			.expect("Seeding the refresh token should succeed.");

		let transport = FakeTransport::new(rotating_api);
		let coordinator = coordinator(store.clone(), transport.clone());
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;

		assert_eq!(request.bearer_token(), None);

		let error = coordinator
			.dispatch(request.clone())
			.await
			.expect_err("Undecorated protected request should be rejected.");
		let response = coordinator
			.handle_response_error(request, error)
			.await
			.expect("Stored refresh token should recover the session.");

		assert_eq!(response.text(), "ok");
		assert_eq!(
			transport.calls(),
			vec![call("/orders", None), call("/auth/refresh", None), call("/orders", Some("A2"))]
		);
		assert_eq!(store.peek(TokenKind::Access).map(|t| t.expose().to_owned()), Some("A2".into()));
	}

	#[tokio::test]
	async fn missing_refresh_token_fails_without_network_and_purges() {
		let store = Arc::new(MemoryStore::default());

		store
			.write(TokenKind::Access, TokenSecret::new("A1"))
			.await
			.expect("Seeding the access token should succeed.");

		let transport = FakeTransport::new(rotating_api);
		let coordinator = coordinator(store.clone(), transport.clone());
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;
		let err = coordinator
			.handle_response_error(request, unauthorized("/orders"))
			.await
			.expect_err("Refresh without a refresh token should fail.");

		assert!(matches!(
			err,
			Error::RefreshFailed { cause: RefreshError::MissingRefreshToken, .. }
		));
		assert_eq!(err.status(), Some(401));
		assert!(transport.calls().is_empty());
		assert!(store.peek(TokenKind::Access).is_none());
	}

	#[tokio::test]
	async fn transport_failure_during_refresh_purges_credentials() {
		let store = seeded_store("A1", "R1");
		let transport = FakeTransport::new(|request| {
			if request.path == "/auth/refresh" {
				Err(TransportError::network(std::io::Error::other("connection reset")))
			} else {
				Ok(ApiResponse::new(&request.path, 401, Vec::new()))
			}
		});
		let coordinator = coordinator(store.clone(), transport);
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;
		let err = coordinator
			.handle_response_error(request, unauthorized("/orders"))
			.await
			.expect_err("Transport failures during refresh should fail the refresh.");

		assert!(matches!(err, Error::RefreshFailed { cause: RefreshError::Transport(_), .. }));
		assert!(err.is_session_ended());
		assert!(store.peek(TokenKind::Access).is_none());
		assert!(store.peek(TokenKind::Refresh).is_none());
	}

	#[tokio::test]
	async fn refresh_body_without_access_token_fails() {
		let store = seeded_store("A1", "R1");
		let transport = FakeTransport::new(|request| {
			let response = if request.path == "/auth/refresh" {
				ApiResponse::new(&request.path, 200, &b"{\"refresh_token\":\"R2\"}"[..])
			} else {
				ApiResponse::new(&request.path, 401, Vec::new())
			};

			Ok(response)
		});
		let coordinator = coordinator(store.clone(), transport);
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;
		let err = coordinator
			.handle_response_error(request, unauthorized("/orders"))
			.await
			.expect_err("A refresh body without access_token should fail the refresh.");

		assert!(matches!(
			err,
			Error::RefreshFailed { cause: RefreshError::MissingAccessToken, .. }
		));
		assert!(store.peek(TokenKind::Refresh).is_none());
	}

	#[tokio::test]
	async fn malformed_refresh_body_fails() {
		let store = seeded_store("A1", "R1");
		let transport = FakeTransport::new(|request| {
			let response = if request.path == "/auth/refresh" {
				ApiResponse::new(&request.path, 200, &b"<html>maintenance</html>"[..])
			} else {
				ApiResponse::new(&request.path, 401, Vec::new())
			};

			Ok(response)
		});
		let coordinator = coordinator(store, transport);
		let request = coordinator.decorate_request(ApiRequest::get("/orders")).await;
		let err = coordinator
			.handle_response_error(request, unauthorized("/orders"))
			.await
			.expect_err("A non-JSON refresh body should fail the refresh.");

		assert!(matches!(
			err,
			Error::RefreshFailed { cause: RefreshError::MalformedResponse { .. }, .. }
		));
		assert_eq!(coordinator.refresh_metrics().failures(), 1);
	}
}
