//! Storage contract and built-in stores for the credentials pair.
//!
//! The store is the single source of truth for credentials. The coordinator re-reads it on
//! every decoration and refresh, so out-of-band writers such as login and logout flows are always
//! observed.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenKind, TokenSecret},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key-value contract for credential storage.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Reads the token stored under `kind`. Missing keys resolve to `None`, never an error.
	fn read(&self, kind: TokenKind) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Persists or replaces the token stored under `kind`.
	fn write(&self, kind: TokenKind, value: TokenSecret) -> StoreFuture<'_, ()>;

	/// Removes the token stored under `kind`. Deleting a missing key succeeds.
	fn delete(&self, kind: TokenKind) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
