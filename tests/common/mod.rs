#![allow(dead_code)]

// std
use std::{collections::HashMap, sync::Arc, time::Duration};
// crates.io
use async_lock::{Mutex as AsyncMutex, MutexGuardArc};
use parking_lot::Mutex;
// self
use refresh_gate::{
	auth::{Credentials, TokenKind},
	client::AuthedClient,
	endpoint::ApiDescriptor,
	store::{MemoryStore, TokenStore},
	transport::{ApiRequest, ApiResponse, Transport, TransportFuture},
	url::Url,
};

pub const REFRESH_PATH: &str = "/auth/refresh";

/// One observed transport call: request path plus the bearer token it carried.
pub type Call = (String, Option<String>);

pub fn call(path: &str, token: Option<&str>) -> Call {
	(path.to_owned(), token.map(ToOwned::to_owned))
}

pub fn descriptor(base: &str) -> ApiDescriptor {
	ApiDescriptor::builder(Url::parse(base).expect("Failed to parse test base URL."))
		.build()
		.expect("Test descriptor should build.")
}

/// Fake API: protected paths accept a fixed set of bearer tokens, the refresh endpoint answers with
/// a configurable reply once its gate opens.
pub struct ScriptedTransport {
	calls: Mutex<Vec<Call>>,
	accepted_tokens: Mutex<Vec<String>>,
	refresh_reply: Mutex<(u16, String)>,
	refresh_gate: Arc<AsyncMutex<()>>,
	success_delays: Mutex<HashMap<String, Duration>>,
}
impl ScriptedTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			calls: Default::default(),
			accepted_tokens: Mutex::new(vec!["A2".into()]),
			refresh_reply: Mutex::new((200, "{\"access_token\":\"A2\"}".into())),
			refresh_gate: Default::default(),
			success_delays: Default::default(),
		})
	}

	pub fn accept_token(&self, token: &str) {
		self.accepted_tokens.lock().push(token.to_owned());
	}

	/// Delays successful responses for `path`; rejections stay immediate.
	pub fn delay_success(&self, path: &str, delay: Duration) {
		self.success_delays.lock().insert(path.to_owned(), delay);
	}

	pub fn reply_to_refresh(&self, status: u16, body: &str) {
		*self.refresh_reply.lock() = (status, body.to_owned());
	}

	/// Keeps refresh calls suspended until the returned guard is dropped.
	pub fn hold_refresh(&self) -> MutexGuardArc<()> {
		self.refresh_gate.try_lock_arc().expect("Refresh gate should not already be held.")
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	pub fn refresh_calls(&self) -> usize {
		self.calls.lock().iter().filter(|(path, _)| path == REFRESH_PATH).count()
	}
}
impl Transport for ScriptedTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let token = request.bearer_token().map(ToOwned::to_owned);

		self.calls.lock().push((request.path.clone(), token.clone()));

		if request.path == REFRESH_PATH {
			let gate = self.refresh_gate.clone();
			let (status, body) = self.refresh_reply.lock().clone();

			return Box::pin(async move {
				let _open = gate.lock().await;

				Ok(ApiResponse::new(request.path, status, body.into_bytes()))
			});
		}

		let accepted = {
			let tokens = self.accepted_tokens.lock();

			token.as_deref().is_some_and(|token| tokens.iter().any(|accepted| accepted == token))
		};
		if !accepted {
			return Box::pin(async move { Ok(ApiResponse::new(request.path, 401, Vec::new())) });
		}

		let delay = self.success_delays.lock().get(&request.path).copied();

		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			Ok(ApiResponse::new(request.path.clone(), 200, request.path.into_bytes()))
		})
	}
}

pub fn scripted_client(
	transport: Arc<ScriptedTransport>,
	access: &str,
	refresh: &str,
) -> (AuthedClient<ScriptedTransport>, Arc<MemoryStore>) {
	let store = Arc::new(MemoryStore::with_credentials(Credentials::new(access, refresh)));
	let descriptor = descriptor("https://api.example.com");
	let client = AuthedClient::with_transport(store.clone(), descriptor, transport);

	(client, store)
}

#[cfg(feature = "reqwest")]
/// Builds a reqwest transport that accepts the self-signed certificates produced by `httpmock`.
pub fn test_reqwest_transport(base: &str) -> refresh_gate::transport::ReqwestTransport {
	let client = refresh_gate::reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.redirect(refresh_gate::reqwest::redirect::Policy::none())
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	let base = Url::parse(base).expect("Failed to parse test base URL.");

	refresh_gate::transport::ReqwestTransport::with_client(client, base)
}

#[cfg(feature = "reqwest")]
pub fn reqwest_client(
	base: &str,
	store: Arc<dyn TokenStore>,
) -> refresh_gate::client::ReqwestAuthedClient {
	AuthedClient::with_transport(store, descriptor(base), Arc::new(test_reqwest_transport(base)))
}

pub fn stored(store: &MemoryStore, kind: TokenKind) -> Option<String> {
	store.peek(kind).map(|secret| secret.expose().to_owned())
}
