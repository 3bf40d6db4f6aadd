use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::session::types::{NewSession, SessionFilter, SessionRecord};
use crate::storage::{DataStore, StorageError};

use super::postgres::*;
use super::sqlite::*;

fn unsupported() -> StorageError {
    StorageError::Unsupported("Unsupported database type".to_string())
}

/// Persistence for sessions, keyed by `(user_id, device_id, app_id)`.
///
/// Mutations are either last-writer-wins (`upsert_session`, `update_access_token`)
/// or conditional (`rotate_refresh_token`). No other locking is involved.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn DataStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub(crate) async fn init(&self) -> Result<(), StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            create_tables_sqlite(pool).await
        } else if let Some(pool) = self.store.as_postgres() {
            create_tables_postgres(pool).await
        } else {
            Err(unsupported())
        }
    }

    #[tracing::instrument(skip(self, session), fields(user_id = %session.user_id, device_id = %session.device_id, app_id = %session.app_id))]
    pub async fn upsert_session(&self, session: NewSession) -> Result<SessionRecord, StorageError> {
        let record = session.into_record();

        let stored = if let Some(pool) = self.store.as_sqlite() {
            upsert_session_sqlite(pool, &record).await
        } else if let Some(pool) = self.store.as_postgres() {
            upsert_session_postgres(pool, &record).await
        } else {
            Err(unsupported())
        }?;

        tracing::info!(session_id = %stored.id, "Session upserted");
        Ok(stored)
    }

    #[tracing::instrument(skip_all)]
    pub async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<SessionRecord>, StorageError> {
        let result = if let Some(pool) = self.store.as_sqlite() {
            find_by_refresh_token_sqlite(pool, refresh_token).await
        } else if let Some(pool) = self.store.as_postgres() {
            find_by_refresh_token_postgres(pool, refresh_token).await
        } else {
            Err(unsupported())
        }?;

        tracing::debug!(found = result.is_some(), "Session lookup by refresh token");
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_user_device_app(
        &self,
        user_id: &str,
        device_id: &str,
        app_id: &str,
    ) -> Result<Option<SessionRecord>, StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            find_by_user_device_app_sqlite(pool, user_id, device_id, app_id).await
        } else if let Some(pool) = self.store.as_postgres() {
            find_by_user_device_app_postgres(pool, user_id, device_id, app_id).await
        } else {
            Err(unsupported())
        }
    }

    /// Unconditional replacement of the access token. Returns whether a session matched.
    #[tracing::instrument(skip(self, access_token))]
    pub async fn update_access_token(
        &self,
        user_id: &str,
        device_id: &str,
        app_id: &str,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let updated = if let Some(pool) = self.store.as_sqlite() {
            update_access_token_sqlite(pool, user_id, device_id, app_id, access_token, expires_at)
                .await
        } else if let Some(pool) = self.store.as_postgres() {
            update_access_token_postgres(pool, user_id, device_id, app_id, access_token, expires_at)
                .await
        } else {
            Err(unsupported())
        }?;

        Ok(updated == 1)
    }

    /// Swaps the refresh token only if the stored one is still `expected_old`.
    ///
    /// `false` means another rotation (or a new login) got there first.
    #[tracing::instrument(skip(self, expected_old, new_refresh_token))]
    pub async fn rotate_refresh_token(
        &self,
        user_id: &str,
        device_id: &str,
        app_id: &str,
        expected_old: &str,
        new_refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let updated = if let Some(pool) = self.store.as_sqlite() {
            rotate_refresh_token_sqlite(
                pool,
                user_id,
                device_id,
                app_id,
                expected_old,
                new_refresh_token,
                expires_at,
            )
            .await
        } else if let Some(pool) = self.store.as_postgres() {
            rotate_refresh_token_postgres(
                pool,
                user_id,
                device_id,
                app_id,
                expected_old,
                new_refresh_token,
                expires_at,
            )
            .await
        } else {
            Err(unsupported())
        }?;

        tracing::debug!(matched = updated == 1, "Conditional refresh rotation");
        Ok(updated == 1)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<SessionRecord>, StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            get_by_id_sqlite(pool, id).await
        } else if let Some(pool) = self.store.as_postgres() {
            get_by_id_postgres(pool, id).await
        } else {
            Err(unsupported())
        }
    }

    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            list_sqlite(pool, filter).await
        } else if let Some(pool) = self.store.as_postgres() {
            list_postgres(pool, filter).await
        } else {
            Err(unsupported())
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_by_id(&self, id: &str) -> Result<bool, StorageError> {
        let deleted = if let Some(pool) = self.store.as_sqlite() {
            delete_by_id_sqlite(pool, id).await
        } else if let Some(pool) = self.store.as_postgres() {
            delete_by_id_postgres(pool, id).await
        } else {
            Err(unsupported())
        }?;

        Ok(deleted == 1)
    }

    /// Deletes every session matching `filter`. An empty filter is refused.
    #[tracing::instrument(skip(self))]
    pub async fn delete_by_filter(&self, filter: &SessionFilter) -> Result<u64, StorageError> {
        if filter.is_empty() {
            return Err(StorageError::Storage(
                "Refusing to delete sessions without a filter".to_string(),
            ));
        }

        let deleted = if let Some(pool) = self.store.as_sqlite() {
            delete_by_filter_sqlite(pool, filter).await
        } else if let Some(pool) = self.store.as_postgres() {
            delete_by_filter_postgres(pool, filter).await
        } else {
            Err(unsupported())
        }?;

        tracing::info!(deleted, "Sessions deleted by filter");
        Ok(deleted)
    }
}
