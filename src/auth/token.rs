//! Token value types stored by [`TokenStore`](crate::store::TokenStore) implementations.

pub mod credentials;
pub mod kind;
pub mod secret;
