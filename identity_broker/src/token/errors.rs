use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("{0}")]
    Invalid(String),

    #[error("Token lifetime out of range: {0}s")]
    Lifetime(i64),

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::Invalid("Invalid token signature".to_string()),
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                Self::Invalid("Malformed token".to_string())
            }
            other => Self::Invalid(format!("Invalid token: {other:?}")),
        }
    }
}
