//! API descriptor data structures and the public-endpoint classifier.
//!
//! An [`ApiDescriptor`] records the base URL every request is resolved against, the paths of
//! the authentication endpoints (login, register, refresh), and any additional paths that must
//! never carry a bearer token. Descriptors are validated on construction through
//! [`ApiDescriptorBuilder`] and are serde-friendly so they can be loaded from configuration.

/// Builder API for assembling API descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::_prelude::*;

/// Whether a path requires a bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointClass {
	/// Reachable without credentials; never decorated and never refreshed for.
	Public,
	/// Requires a bearer token; a 401 drives the refresh protocol.
	Protected,
}

/// Authentication endpoint paths, relative to the base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEndpoints {
	/// Login endpoint.
	pub login: String,
	/// Registration endpoint.
	pub register: String,
	/// Refresh endpoint exchanging a refresh token for a new access token.
	pub refresh: String,
}
impl Default for AuthEndpoints {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			register: "/auth/register".into(),
			refresh: "/auth/refresh".into(),
		}
	}
}

/// Immutable API descriptor consumed by the coordinator and transports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
	/// Base URL request paths are appended to.
	pub base_url: Url,
	/// Authentication endpoints (always public).
	pub endpoints: AuthEndpoints,
	/// Additional paths that never carry a bearer token.
	#[serde(default)]
	pub public_paths: BTreeSet<String>,
}
impl ApiDescriptor {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ApiDescriptorBuilder {
		ApiDescriptorBuilder::new(base_url)
	}

	/// Path of the refresh endpoint.
	pub fn refresh_path(&self) -> &str {
		&self.endpoints.refresh
	}

	/// Classifies a request path. Query strings and trailing slashes are ignored.
	pub fn classify(&self, path: &str) -> EndpointClass {
		let path = normalize_path(path);
		let endpoints = &self.endpoints;
		let public = [&endpoints.login, &endpoints.register, &endpoints.refresh]
			.into_iter()
			.any(|candidate| normalize_path(candidate) == path)
			|| self.public_paths.iter().any(|candidate| normalize_path(candidate) == path);

		if public { EndpointClass::Public } else { EndpointClass::Protected }
	}

	/// Whether the path is on the public allow-list.
	pub fn is_public(&self, path: &str) -> bool {
		self.classify(path) == EndpointClass::Public
	}
}

fn normalize_path(path: &str) -> &str {
	let path = path.split(['?', '#']).next().unwrap_or_default();
	let trimmed = path.trim_end_matches('/');

	if trimmed.is_empty() { "/" } else { trimmed }
}
