use std::{env, sync::LazyLock};

use crate::storage::DB_TABLE_PREFIX;

pub(crate) static DB_TABLE_USERS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_USERS").unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "users"))
});

pub(crate) static DB_TABLE_APPS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_APPS").unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "apps"))
});

pub(crate) static DB_TABLE_USER_APPS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_USER_APPS")
        .unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "user_apps"))
});

pub(crate) static DB_TABLE_DEVICES: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_DEVICES").unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "devices"))
});
