//! The refresh protocol run by the leading caller.

// self
use crate::{
	_prelude::*,
	auth::{RefreshRequestBody, RefreshResponseBody, TokenKind, TokenSecret},
	coordinator::Coordinator,
	error::RefreshError,
	transport::{ApiRequest, Transport},
};

impl<C> Coordinator<C>
where
	C: ?Sized + Transport,
{
	/// Obtains a fresh access token and persists it.
	///
	/// `failed_token` is the bearer token the rejected request carried. If the request carried
	/// one and the store now holds a different access token, someone else rotated it since that
	/// request was sent, and the protocol succeeds without calling the refresh endpoint. A request
	/// without a bearer token always refreshes.
	///
	/// Callers must hold the credential lock.
	pub(super) async fn refresh_credentials(
		&self,
		failed_token: Option<&str>,
	) -> Result<(), RefreshError> {
		let store = self.store();
		let current = store
			.read(TokenKind::Access)
			.await
			.map_err(RefreshError::Storage)?
			.filter(|token| !token.is_empty());

		let rotated = failed_token.is_some_and(|failed| {
			current.as_ref().is_some_and(|current| current.expose() != failed)
		});

		if rotated {
			return Ok(());
		}

		let refresh_token = store
			.read(TokenKind::Refresh)
			.await
			.map_err(RefreshError::Storage)?
			.filter(|token| !token.is_empty())
			.ok_or(RefreshError::MissingRefreshToken)?;
		let call = ApiRequest::post(self.descriptor().refresh_path())
			.json(&RefreshRequestBody { refresh_token: refresh_token.expose() })
			.map_err(RefreshError::Config)?;

		self.refresh_metrics().record_network_call();

		let response = self.transport.send(call).await.map_err(RefreshError::Transport)?;

		if !response.is_success() {
			return Err(RefreshError::Rejected { status: response.status });
		}

		let body = response
			.json::<RefreshResponseBody>()
			.map_err(|source| RefreshError::MalformedResponse { source })?;
		let access_token = body.access_token().ok_or(RefreshError::MissingAccessToken)?;

		store
			.write(TokenKind::Access, TokenSecret::new(access_token))
			.await
			.map_err(RefreshError::Storage)?;

		if let Some(rotated) = body.refresh_token() {
			store
				.write(TokenKind::Refresh, TokenSecret::new(rotated))
				.await
				.map_err(RefreshError::Storage)?;
		}

		Ok(())
	}
}
