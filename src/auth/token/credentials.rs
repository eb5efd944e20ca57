//! The access/refresh credentials pair written by login flows.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access + refresh token pair issued by a successful login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Bearer token attached to protected requests.
	pub access_token: TokenSecret,
	/// Token exchanged for a new access token once the bearer token expires.
	pub refresh_token: TokenSecret,
}
impl Credentials {
	/// Creates a pair from raw token strings.
	pub fn new(
		access_token: impl Into<TokenSecret>,
		refresh_token: impl Into<TokenSecret>,
	) -> Self {
		Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
	}
}
