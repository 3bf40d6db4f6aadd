mod password;
mod storage;
mod types;

pub(crate) use password::{hash_password, verify_password};
pub(crate) use storage::{
    create_directory_tables, find_user_postgres, find_user_sqlite, update_password_hash_postgres,
    update_password_hash_sqlite,
};
pub use storage::{AppStore, DeviceStore, UserStore};
pub use types::{
    App, AppSearchField, CreateOutcome, Device, User, UserApp, UserSearchField, hash_app_secret,
};
