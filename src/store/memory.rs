//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenKind, TokenSecret},
	store::{StoreError, StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<TokenKind, TokenSecret>>>;

/// Storage backend that keeps credentials in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Creates a store pre-seeded with a credentials pair.
	pub fn with_credentials(credentials: Credentials) -> Self {
		let store = Self::default();

		{
			let mut guard = store.0.write();

			guard.insert(TokenKind::Access, credentials.access_token);
			guard.insert(TokenKind::Refresh, credentials.refresh_token);
		}

		store
	}

	/// Returns the token stored under `kind` without going through the async contract.
	pub fn peek(&self, kind: TokenKind) -> Option<TokenSecret> {
		self.0.read().get(&kind).cloned()
	}

	fn write_now(map: StoreMap, kind: TokenKind, value: TokenSecret) -> Result<(), StoreError> {
		map.write().insert(kind, value);

		Ok(())
	}

	fn delete_now(map: StoreMap, kind: TokenKind) -> Result<(), StoreError> {
		map.write().remove(&kind);

		Ok(())
	}
}
impl TokenStore for MemoryStore {
	fn read(&self, kind: TokenKind) -> StoreFuture<'_, Option<TokenSecret>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(&kind).cloned()) })
	}

	fn write(&self, kind: TokenKind, value: TokenSecret) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::write_now(map, kind, value) })
	}

	fn delete(&self, kind: TokenKind) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::delete_now(map, kind) })
	}
}
