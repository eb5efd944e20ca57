// self
use crate::{
	_prelude::*,
	endpoint::{ApiDescriptor, AuthEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum DescriptorError {
	/// Base URL must use HTTPS unless it points at a loopback host.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Base URL cannot have paths appended to it (e.g. `mailto:`).
	#[error("The base URL cannot be used as a base: {url}.")]
	UnusableBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Endpoint paths must be absolute and free of query strings.
	#[error("The {endpoint} path is invalid: `{path}`.")]
	InvalidPath {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Path that failed validation.
		path: String,
	},
}

/// Builder for [`ApiDescriptor`] values.
#[derive(Debug)]
pub struct ApiDescriptorBuilder {
	/// Base URL for the descriptor being constructed.
	pub base_url: Url,
	/// Authentication endpoint paths.
	pub endpoints: AuthEndpoints,
	/// Additional public paths.
	pub public_paths: BTreeSet<String>,
}
impl ApiDescriptorBuilder {
	/// Creates a new builder seeded with default authentication paths.
	pub fn new(base_url: Url) -> Self {
		Self { base_url, endpoints: AuthEndpoints::default(), public_paths: BTreeSet::new() }
	}

	/// Sets the login path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Sets the registration path.
	pub fn register_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.register = path.into();

		self
	}

	/// Sets the refresh path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Marks an additional path as public.
	pub fn public_path(mut self, path: impl Into<String>) -> Self {
		self.public_paths.insert(path.into());

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ApiDescriptor, DescriptorError> {
		let descriptor = ApiDescriptor {
			base_url: self.base_url,
			endpoints: self.endpoints,
			public_paths: self.public_paths,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ApiDescriptor {
	/// Validates invariants for the descriptor.
	pub fn validate(&self) -> Result<(), DescriptorError> {
		validate_base_url(&self.base_url)?;
		validate_path("login", &self.endpoints.login)?;
		validate_path("register", &self.endpoints.register)?;
		validate_path("refresh", &self.endpoints.refresh)?;

		for path in &self.public_paths {
			validate_path("public", path)?;
		}

		Ok(())
	}
}

fn validate_base_url(url: &Url) -> Result<(), DescriptorError> {
	if url.cannot_be_a_base() {
		return Err(DescriptorError::UnusableBaseUrl { url: url.to_string() });
	}

	let loopback = match url.host() {
		Some(url::Host::Domain(domain)) => domain == "localhost",
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	};

	match url.scheme() {
		"https" => Ok(()),
		"http" if loopback => Ok(()),
		_ => Err(DescriptorError::InsecureBaseUrl { url: url.to_string() }),
	}
}

fn validate_path(endpoint: &'static str, path: &str) -> Result<(), DescriptorError> {
	if !path.starts_with('/') || path.contains(['?', '#']) || path.chars().any(char::is_whitespace)
	{
		Err(DescriptorError::InvalidPath { endpoint, path: path.to_owned() })
	} else {
		Ok(())
	}
}
