use std::{env, sync::LazyLock};

use crate::storage::DB_TABLE_PREFIX;

pub(crate) static DB_TABLE_SESSIONS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_SESSIONS").unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "sessions"))
});
