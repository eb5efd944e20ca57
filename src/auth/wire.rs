//! Refresh endpoint wire contract.
//!
//! The request body is exactly `{"refresh_token": "<token>"}`. A successful response must carry
//! a string `access_token` and may carry a rotated `refresh_token`; unknown fields are ignored.

// self
use crate::_prelude::*;

/// JSON body posted to the refresh endpoint.
#[derive(Debug, Serialize)]
pub struct RefreshRequestBody<'a> {
	/// Currently stored refresh token.
	pub refresh_token: &'a str,
}

/// JSON body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
pub struct RefreshResponseBody {
	/// Newly minted access token; absence fails the refresh.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Rotated refresh token, when the server rotates.
	#[serde(default)]
	pub refresh_token: Option<String>,
}
impl RefreshResponseBody {
	/// Returns the non-empty access token, if present.
	pub fn access_token(&self) -> Option<&str> {
		self.access_token.as_deref().filter(|token| !token.is_empty())
	}

	/// Returns the non-empty rotated refresh token, if present.
	pub fn refresh_token(&self) -> Option<&str> {
		self.refresh_token.as_deref().filter(|token| !token.is_empty())
	}
}
