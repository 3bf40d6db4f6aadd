mod storage;
mod types;

pub use storage::SessionStore;
pub use types::{CLIENT_TYPES, DEFAULT_CLIENT_TYPE, NewSession, SessionFilter, SessionRecord};
