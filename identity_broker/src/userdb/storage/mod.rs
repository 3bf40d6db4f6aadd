mod config;
mod postgres;
mod sqlite;
mod store_type;

pub(crate) use postgres::{find_user_postgres, update_password_hash_postgres};
pub(crate) use sqlite::{find_user_sqlite, update_password_hash_sqlite};
pub(crate) use store_type::create_directory_tables;
pub use store_type::{AppStore, DeviceStore, UserStore};
