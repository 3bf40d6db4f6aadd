use chrono::{DateTime, Utc};
use sqlx::{Pool, QueryBuilder, Sqlite};

use crate::session::types::{SessionFilter, SessionRecord};
use crate::storage::StorageError;

use super::config::DB_TABLE_SESSIONS;

pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            app_id TEXT NOT NULL,
            device_id TEXT NOT NULL,
            client_type TEXT NOT NULL,
            access_token TEXT NOT NULL,
            refresh_token TEXT NOT NULL,
            access_token_expires_at TIMESTAMP NOT NULL,
            refresh_token_expires_at TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL,
            expires_at TIMESTAMP NOT NULL,
            UNIQUE (user_id, device_id, app_id)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{table_name}_refresh_token ON {table_name}(refresh_token)
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn upsert_session_sqlite(
    pool: &Pool<Sqlite>,
    record: &SessionRecord,
) -> Result<SessionRecord, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    // The id and natural key survive; everything else is replaced.
    Ok(sqlx::query_as::<_, SessionRecord>(&format!(
        r#"
        INSERT INTO {table_name} (
            id, user_id, app_id, device_id, client_type, access_token, refresh_token,
            access_token_expires_at, refresh_token_expires_at, created_at, expires_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, device_id, app_id) DO UPDATE SET
            client_type = excluded.client_type,
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            access_token_expires_at = excluded.access_token_expires_at,
            refresh_token_expires_at = excluded.refresh_token_expires_at,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at
        RETURNING *
        "#
    ))
    .bind(&record.id)
    .bind(&record.user_id)
    .bind(&record.app_id)
    .bind(&record.device_id)
    .bind(&record.client_type)
    .bind(&record.access_token)
    .bind(&record.refresh_token)
    .bind(record.access_token_expires_at)
    .bind(record.refresh_token_expires_at)
    .bind(record.created_at)
    .bind(record.expires_at)
    .fetch_one(pool)
    .await?)
}

pub(super) async fn find_by_refresh_token_sqlite(
    pool: &Pool<Sqlite>,
    refresh_token: &str,
) -> Result<Option<SessionRecord>, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    Ok(sqlx::query_as::<_, SessionRecord>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE refresh_token = ?
        "#
    ))
    .bind(refresh_token)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn find_by_user_device_app_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    device_id: &str,
    app_id: &str,
) -> Result<Option<SessionRecord>, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    Ok(sqlx::query_as::<_, SessionRecord>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE user_id = ? AND device_id = ? AND app_id = ?
        "#
    ))
    .bind(user_id)
    .bind(device_id)
    .bind(app_id)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn update_access_token_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    device_id: &str,
    app_id: &str,
    access_token: &str,
    expires_at: DateTime<Utc>,
) -> Result<u64, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {table_name}
        SET access_token = ?, access_token_expires_at = ?
        WHERE user_id = ? AND device_id = ? AND app_id = ?
        "#
    ))
    .bind(access_token)
    .bind(expires_at)
    .bind(user_id)
    .bind(device_id)
    .bind(app_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Compare-and-swap on the refresh token; matches only while `expected_old` is current.
pub(super) async fn rotate_refresh_token_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    device_id: &str,
    app_id: &str,
    expected_old: &str,
    new_refresh_token: &str,
    expires_at: DateTime<Utc>,
) -> Result<u64, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {table_name}
        SET refresh_token = ?, refresh_token_expires_at = ?, expires_at = ?
        WHERE user_id = ? AND device_id = ? AND app_id = ? AND refresh_token = ?
        "#
    ))
    .bind(new_refresh_token)
    .bind(expires_at)
    .bind(expires_at)
    .bind(user_id)
    .bind(device_id)
    .bind(app_id)
    .bind(expected_old)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub(super) async fn get_by_id_sqlite(
    pool: &Pool<Sqlite>,
    id: &str,
) -> Result<Option<SessionRecord>, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    Ok(sqlx::query_as::<_, SessionRecord>(&format!(
        r#"
        SELECT * FROM {table_name} WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn list_sqlite(
    pool: &Pool<Sqlite>,
    filter: &SessionFilter,
) -> Result<Vec<SessionRecord>, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {table_name}"));
    for (i, (column, value)) in filter.columns().into_iter().enumerate() {
        query.push(if i == 0 { " WHERE " } else { " AND " });
        query.push(column).push(" = ").push_bind(value.to_string());
    }
    query.push(" ORDER BY created_at DESC");

    Ok(query
        .build_query_as::<SessionRecord>()
        .fetch_all(pool)
        .await?)
}

pub(super) async fn delete_by_id_sqlite(pool: &Pool<Sqlite>, id: &str) -> Result<u64, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let result = sqlx::query(&format!(
        r#"
        DELETE FROM {table_name} WHERE id = ?
        "#
    ))
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Callers guarantee a non-empty filter.
pub(super) async fn delete_by_filter_sqlite(
    pool: &Pool<Sqlite>,
    filter: &SessionFilter,
) -> Result<u64, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let mut query = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {table_name}"));
    for (i, (column, value)) in filter.columns().into_iter().enumerate() {
        query.push(if i == 0 { " WHERE " } else { " AND " });
        query.push(column).push(" = ").push_bind(value.to_string());
    }

    Ok(query.build().execute(pool).await?.rows_affected())
}
