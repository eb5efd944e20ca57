//! Credential models: token kinds, redacted secrets, and the refresh endpoint wire contract.

pub mod token;
pub mod wire;

pub use token::{credentials::*, kind::*, secret::*};
pub use wire::*;
