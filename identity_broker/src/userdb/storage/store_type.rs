use chrono::Utc;
use std::sync::Arc;

use crate::storage::{DataStore, StorageError};
use crate::userdb::types::{
    App, AppSearchField, CreateOutcome, Device, User, UserApp, UserSearchField,
};

use super::postgres::*;
use super::sqlite::*;

fn unsupported() -> StorageError {
    StorageError::Unsupported("Unsupported database type".to_string())
}

/// Creates the users, apps, user_apps and devices tables.
pub(crate) async fn create_directory_tables(store: &dyn DataStore) -> Result<(), StorageError> {
    if let Some(pool) = store.as_sqlite() {
        create_tables_sqlite(pool).await
    } else if let Some(pool) = store.as_postgres() {
        create_tables_postgres(pool).await
    } else {
        Err(unsupported())
    }
}

#[derive(Clone)]
pub struct UserStore {
    store: Arc<dyn DataStore>,
}

impl UserStore {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self), fields(user_field = %field))]
    pub async fn get_user_by(&self, field: UserSearchField) -> Result<Option<User>, StorageError> {
        let result = if let Some(pool) = self.store.as_sqlite() {
            find_user_sqlite(pool, &field).await
        } else if let Some(pool) = self.store.as_postgres() {
            find_user_postgres(pool, &field).await
        } else {
            Err(unsupported())
        };

        match &result {
            Ok(Some(_)) => tracing::info!(found = true, "User lookup completed"),
            Ok(None) => tracing::info!(found = false, "User lookup completed - not found"),
            Err(e) => tracing::error!(error = %e, "User lookup failed"),
        }

        result
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, StorageError> {
        self.get_user_by(UserSearchField::Id(id.to_string())).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        self.get_user_by(UserSearchField::Email(email.to_string()))
            .await
    }

    /// Inserts `user`, or returns the row already holding its email.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_user(&self, user: User) -> Result<CreateOutcome<User>, StorageError> {
        let inserted = if let Some(pool) = self.store.as_sqlite() {
            insert_user_sqlite(pool, &user).await?
        } else if let Some(pool) = self.store.as_postgres() {
            insert_user_postgres(pool, &user).await?
        } else {
            return Err(unsupported());
        };

        match inserted {
            Some(user) => {
                tracing::info!(user_id = %user.id, "User created");
                Ok(CreateOutcome::Created(user))
            }
            None => {
                let existing = self.find_by_email(&user.email).await?.ok_or_else(|| {
                    StorageError::Storage("User insert conflicted but no row found".to_string())
                })?;
                tracing::info!(user_id = %existing.id, "User already exists");
                Ok(CreateOutcome::AlreadyExists(existing))
            }
        }
    }

    /// Returns whether a user row was updated.
    #[tracing::instrument(skip(self))]
    pub async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<bool, StorageError> {
        let updated = if let Some(pool) = self.store.as_sqlite() {
            set_admin_sqlite(pool, user_id, is_admin).await?
        } else if let Some(pool) = self.store.as_postgres() {
            set_admin_postgres(pool, user_id, is_admin).await?
        } else {
            return Err(unsupported());
        };
        Ok(updated == 1)
    }

    /// Removes a user and its devices and app links. Returns whether the user existed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<bool, StorageError> {
        let deleted = if let Some(pool) = self.store.as_sqlite() {
            delete_user_sqlite(pool, user_id).await?
        } else if let Some(pool) = self.store.as_postgres() {
            delete_user_postgres(pool, user_id).await?
        } else {
            return Err(unsupported());
        };

        tracing::info!(deleted, "User deleted");
        Ok(deleted == 1)
    }

    pub async fn is_admin(&self, user_id: &str) -> Result<bool, StorageError> {
        Ok(self
            .find_by_id(user_id)
            .await?
            .is_some_and(|user| user.is_admin))
    }
}

#[derive(Clone)]
pub struct AppStore {
    store: Arc<dyn DataStore>,
}

impl AppStore {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self), fields(app_field = %field))]
    pub async fn get_app_by(&self, field: AppSearchField) -> Result<Option<App>, StorageError> {
        let result = if let Some(pool) = self.store.as_sqlite() {
            find_app_sqlite(pool, &field).await
        } else if let Some(pool) = self.store.as_postgres() {
            find_app_postgres(pool, &field).await
        } else {
            Err(unsupported())
        };

        if let Ok(found) = &result {
            tracing::debug!(found = found.is_some(), "App lookup completed");
        }
        result
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<App>, StorageError> {
        self.get_app_by(AppSearchField::Id(id.to_string())).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<App>, StorageError> {
        self.get_app_by(AppSearchField::Name(name.to_string())).await
    }

    #[tracing::instrument(skip(self, app), fields(app_name = %app.name))]
    pub async fn create_app(&self, app: App) -> Result<CreateOutcome<App>, StorageError> {
        let inserted = if let Some(pool) = self.store.as_sqlite() {
            insert_app_sqlite(pool, &app).await?
        } else if let Some(pool) = self.store.as_postgres() {
            insert_app_postgres(pool, &app).await?
        } else {
            return Err(unsupported());
        };

        match inserted {
            Some(app) => Ok(CreateOutcome::Created(app)),
            None => self
                .find_by_name(&app.name)
                .await?
                .map(CreateOutcome::AlreadyExists)
                .ok_or_else(|| {
                    StorageError::Storage("App insert conflicted but no row found".to_string())
                }),
        }
    }

    /// Links a user to an app, reporting an existing link instead of failing.
    #[tracing::instrument(skip(self))]
    pub async fn link_user(
        &self,
        user_id: &str,
        app_id: &str,
    ) -> Result<CreateOutcome<UserApp>, StorageError> {
        let link = UserApp {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            app_id: app_id.to_string(),
            created_at: Utc::now(),
        };

        let (inserted, existing) = if let Some(pool) = self.store.as_sqlite() {
            match insert_user_app_sqlite(pool, &link).await? {
                Some(row) => (Some(row), None),
                None => (None, find_user_app_sqlite(pool, user_id, app_id).await?),
            }
        } else if let Some(pool) = self.store.as_postgres() {
            match insert_user_app_postgres(pool, &link).await? {
                Some(row) => (Some(row), None),
                None => (None, find_user_app_postgres(pool, user_id, app_id).await?),
            }
        } else {
            return Err(unsupported());
        };

        match (inserted, existing) {
            (Some(row), _) => Ok(CreateOutcome::Created(row)),
            (None, Some(row)) => Ok(CreateOutcome::AlreadyExists(row)),
            (None, None) => Err(StorageError::Storage(
                "User-app link insert conflicted but no row found".to_string(),
            )),
        }
    }
}

#[derive(Clone)]
pub struct DeviceStore {
    store: Arc<dyn DataStore>,
}

impl DeviceStore {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn find(&self, user_id: &str, device_id: &str) -> Result<Option<Device>, StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            find_device_sqlite(pool, user_id, device_id).await
        } else if let Some(pool) = self.store.as_postgres() {
            find_device_postgres(pool, user_id, device_id).await
        } else {
            Err(unsupported())
        }
    }

    /// Registers a device, or hands back the one already registered for
    /// `(user_id, device_id)`.
    #[tracing::instrument(skip(self, device), fields(user_id = %device.user_id, device_id = %device.device_id))]
    pub async fn create(&self, device: Device) -> Result<CreateOutcome<Device>, StorageError> {
        let inserted = if let Some(pool) = self.store.as_sqlite() {
            insert_device_sqlite(pool, &device).await?
        } else if let Some(pool) = self.store.as_postgres() {
            insert_device_postgres(pool, &device).await?
        } else {
            return Err(unsupported());
        };

        match inserted {
            Some(device) => {
                tracing::info!("Device created");
                Ok(CreateOutcome::Created(device))
            }
            None => {
                tracing::info!("Device already exists, reusing it");
                self.find(&device.user_id, &device.device_id)
                    .await?
                    .map(CreateOutcome::AlreadyExists)
                    .ok_or_else(|| {
                        StorageError::Storage(
                            "Device insert conflicted but no row found".to_string(),
                        )
                    })
            }
        }
    }
}
