//! Keys under which credentials are persisted.

// self
use crate::_prelude::*;

/// Which half of the credentials pair a store entry holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// Short-lived bearer token attached to protected requests.
	Access,
	/// Long-lived token exchanged for a new access token.
	Refresh,
}
impl TokenKind {
	/// Both kinds, access first.
	pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];

	/// Returns a stable label suitable for store keys and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::Access => "access",
			TokenKind::Refresh => "refresh",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
