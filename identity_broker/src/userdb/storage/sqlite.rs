use sqlx::{Executor, Pool, Sqlite};

use crate::storage::StorageError;
use crate::userdb::types::{App, AppSearchField, Device, User, UserApp, UserSearchField};

use super::config::{DB_TABLE_APPS, DB_TABLE_DEVICES, DB_TABLE_USER_APPS, DB_TABLE_USERS};

pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), StorageError> {
    let users = DB_TABLE_USERS.as_str();
    let apps = DB_TABLE_APPS.as_str();
    let user_apps = DB_TABLE_USER_APPS.as_str();
    let devices = DB_TABLE_DEVICES.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {users} (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            username TEXT,
            password_hash TEXT,
            is_admin BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {apps} (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            hashed_secret TEXT,
            is_active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {user_apps} (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES {users}(id) ON DELETE CASCADE,
            app_id TEXT NOT NULL REFERENCES {apps}(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL,
            UNIQUE (user_id, app_id)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {devices} (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES {users}(id) ON DELETE CASCADE,
            device_id TEXT NOT NULL,
            device_name TEXT,
            device_type TEXT NOT NULL,
            last_active_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL,
            UNIQUE (user_id, device_id)
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn find_user_sqlite<'e, E>(
    exec: E,
    field: &UserSearchField,
) -> Result<Option<User>, StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let table_name = DB_TABLE_USERS.as_str();
    let (column, value) = match field {
        UserSearchField::Id(id) => ("id", id),
        UserSearchField::Email(email) => ("email", email),
    };

    Ok(sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE {column} = ?
        "#
    ))
    .bind(value)
    .fetch_optional(exec)
    .await?)
}

/// Inserts unless the email is taken; `None` means a conflicting row exists.
pub(super) async fn insert_user_sqlite(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<Option<User>, StorageError> {
    let table_name = DB_TABLE_USERS.as_str();

    Ok(sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO {table_name} (id, email, username, password_hash, is_admin, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#
    ))
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(user.is_admin)
    .bind(user.created_at)
    .bind(user.updated_at)
    .fetch_optional(pool)
    .await?)
}

pub(crate) async fn update_password_hash_sqlite<'e, E>(
    exec: E,
    user_id: &str,
    password_hash: &str,
) -> Result<u64, StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let table_name = DB_TABLE_USERS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {table_name} SET password_hash = ?, updated_at = ? WHERE id = ?
        "#
    ))
    .bind(password_hash)
    .bind(chrono::Utc::now())
    .bind(user_id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected())
}

pub(super) async fn set_admin_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    is_admin: bool,
) -> Result<u64, StorageError> {
    let table_name = DB_TABLE_USERS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {table_name} SET is_admin = ?, updated_at = ? WHERE id = ?
        "#
    ))
    .bind(is_admin)
    .bind(chrono::Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Removes the user together with its devices and app links, in one transaction.
pub(super) async fn delete_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<u64, StorageError> {
    let mut tx = pool.begin().await?;

    for table_name in [DB_TABLE_USER_APPS.as_str(), DB_TABLE_DEVICES.as_str()] {
        sqlx::query(&format!(
            r#"
            DELETE FROM {table_name} WHERE user_id = ?
            "#
        ))
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    let users = DB_TABLE_USERS.as_str();
    let result = sqlx::query(&format!(
        r#"
        DELETE FROM {users} WHERE id = ?
        "#
    ))
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

pub(super) async fn find_app_sqlite(
    pool: &Pool<Sqlite>,
    field: &AppSearchField,
) -> Result<Option<App>, StorageError> {
    let table_name = DB_TABLE_APPS.as_str();
    let (column, value) = match field {
        AppSearchField::Id(id) => ("id", id),
        AppSearchField::Name(name) => ("name", name),
    };

    Ok(sqlx::query_as::<_, App>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE {column} = ?
        "#
    ))
    .bind(value)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn insert_app_sqlite(
    pool: &Pool<Sqlite>,
    app: &App,
) -> Result<Option<App>, StorageError> {
    let table_name = DB_TABLE_APPS.as_str();

    Ok(sqlx::query_as::<_, App>(&format!(
        r#"
        INSERT INTO {table_name} (id, name, display_name, hashed_secret, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (name) DO NOTHING
        RETURNING *
        "#
    ))
    .bind(&app.id)
    .bind(&app.name)
    .bind(&app.display_name)
    .bind(&app.hashed_secret)
    .bind(app.is_active)
    .bind(app.created_at)
    .bind(app.updated_at)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn insert_user_app_sqlite(
    pool: &Pool<Sqlite>,
    link: &UserApp,
) -> Result<Option<UserApp>, StorageError> {
    let table_name = DB_TABLE_USER_APPS.as_str();

    Ok(sqlx::query_as::<_, UserApp>(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, app_id, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id, app_id) DO NOTHING
        RETURNING *
        "#
    ))
    .bind(&link.id)
    .bind(&link.user_id)
    .bind(&link.app_id)
    .bind(link.created_at)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn find_user_app_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    app_id: &str,
) -> Result<Option<UserApp>, StorageError> {
    let table_name = DB_TABLE_USER_APPS.as_str();

    Ok(sqlx::query_as::<_, UserApp>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = ? AND app_id = ?
        "#
    ))
    .bind(user_id)
    .bind(app_id)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn insert_device_sqlite(
    pool: &Pool<Sqlite>,
    device: &Device,
) -> Result<Option<Device>, StorageError> {
    let table_name = DB_TABLE_DEVICES.as_str();

    Ok(sqlx::query_as::<_, Device>(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, device_id, device_name, device_type, last_active_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, device_id) DO NOTHING
        RETURNING *
        "#
    ))
    .bind(&device.id)
    .bind(&device.user_id)
    .bind(&device.device_id)
    .bind(&device.device_name)
    .bind(&device.device_type)
    .bind(device.last_active_at)
    .bind(device.created_at)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn find_device_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    device_id: &str,
) -> Result<Option<Device>, StorageError> {
    let table_name = DB_TABLE_DEVICES.as_str();

    Ok(sqlx::query_as::<_, Device>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = ? AND device_id = ?
        "#
    ))
    .bind(user_id)
    .bind(device_id)
    .fetch_optional(pool)
    .await?)
}
