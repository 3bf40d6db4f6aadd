mod codec;
mod errors;
mod issuer;
mod types;

pub use codec::TokenCodec;
pub use errors::TokenError;
pub use issuer::{MAX_TOKEN_TTL_SECS, TokenIssuer, validate_ttl};
pub use types::{IssueRequest, IssuedSession, TokenClaims, TokenPair, TokenType};
