//! Authenticated client facade running every request through the [`Coordinator`].

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenKind},
	coordinator::Coordinator,
	endpoint::ApiDescriptor,
	store::TokenStore,
	transport::{ApiRequest, ApiResponse, Transport},
};
#[cfg(feature = "reqwest")]
use crate::{
	error::ConfigError,
	transport::{ReqwestTransport, TransportTimeouts},
};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestAuthedClient = AuthedClient<ReqwestTransport>;

/// HTTP client that attaches bearer tokens and absorbs expired-token rejections.
///
/// Each [`execute`](AuthedClient::execute) call decorates the request, sends it through the
/// raw transport, and hands any failure to [`Coordinator::handle_response_error`]. Login and
/// logout flows write credentials through [`store_credentials`](AuthedClient::store_credentials)
/// and [`clear_credentials`](AuthedClient::clear_credentials), which never interleave with a
/// refresh's own writes.
pub struct AuthedClient<C>
where
	C: ?Sized + Transport,
{
	coordinator: Arc<Coordinator<C>>,
}
impl<C> AuthedClient<C>
where
	C: ?Sized + Transport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		store: Arc<dyn TokenStore>,
		descriptor: ApiDescriptor,
		transport: Arc<C>,
	) -> Self {
		Self { coordinator: Arc::new(Coordinator::new(store, descriptor, transport)) }
	}

	/// Coordinator driving this client.
	pub fn coordinator(&self) -> &Coordinator<C> {
		&self.coordinator
	}

	/// Sends a request, refreshing credentials once if the server reports them expired.
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		let request = self.coordinator.decorate_request(request).await;

		match self.coordinator.dispatch(request.clone()).await {
			Ok(response) => Ok(response),
			Err(error) => self.coordinator.handle_response_error(request, error).await,
		}
	}

	/// Persists a credentials pair issued by a login flow.
	pub async fn store_credentials(&self, credentials: Credentials) -> Result<()> {
		let _credentials = self.coordinator.credential_lock().lock().await;
		let store = self.coordinator.store();

		store.write(TokenKind::Access, credentials.access_token).await?;
		store.write(TokenKind::Refresh, credentials.refresh_token).await?;

		Ok(())
	}

	/// Deletes both tokens, e.g. on logout.
	pub async fn clear_credentials(&self) -> Result<()> {
		let _credentials = self.coordinator.credential_lock().lock().await;
		let store = self.coordinator.store();

		for kind in TokenKind::ALL {
			store.delete(kind).await?;
		}

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl AuthedClient<ReqwestTransport> {
	/// Creates a client with its own reqwest transport pointed at the descriptor's base URL.
	pub fn new(
		store: Arc<dyn TokenStore>,
		descriptor: ApiDescriptor,
		timeouts: TransportTimeouts,
	) -> Result<Self, ConfigError> {
		let transport = ReqwestTransport::from_descriptor(&descriptor, timeouts)?;

		Ok(Self::with_transport(store, descriptor, Arc::new(transport)))
	}
}
impl<C> Clone for AuthedClient<C>
where
	C: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self { coordinator: self.coordinator.clone() }
	}
}
impl<C> Debug for AuthedClient<C>
where
	C: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthedClient").field("coordinator", &self.coordinator).finish()
	}
}
