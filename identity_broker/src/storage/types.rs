use serde::{Deserialize, Serialize};

/// Data stored in the cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheData {
    pub value: String,
}

impl From<String> for CacheData {
    fn from(value: String) -> Self {
        Self { value }
    }
}
