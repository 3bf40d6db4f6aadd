//! Password verification against the user directory
//!
//! Each operation runs in one relational transaction. Returning early with an error
//! drops the transaction, which rolls it back.

use std::sync::Arc;

use crate::errors::BrokerError;
use crate::storage::{DataStore, StorageError};
use crate::userdb::{
    User, UserSearchField, find_user_postgres, find_user_sqlite, hash_password,
    update_password_hash_postgres, update_password_hash_sqlite, verify_password,
};

#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn DataStore>,
}

fn unsupported() -> BrokerError {
    StorageError::Unsupported("Unsupported database type".to_string()).into()
}

fn check_password(user: Option<User>, lookup: &str, password: &str) -> Result<User, BrokerError> {
    let user = user.ok_or_else(|| BrokerError::UserNotFound {
        lookup: lookup.to_string(),
    })?;

    match user.password_hash.as_deref() {
        Some(hash) if verify_password(password, hash) => Ok(user),
        Some(_) => Err(BrokerError::IncorrectPassword),
        None => {
            tracing::debug!(user_id = %user.id, "User has no password set");
            Err(BrokerError::IncorrectPassword)
        }
    }
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Looks the user up by email and checks the password.
    #[tracing::instrument(skip(self, password))]
    pub async fn verify(&self, email: &str, password: &str) -> Result<User, BrokerError> {
        let field = UserSearchField::Email(email.to_string());

        let user = if let Some(pool) = self.store.as_sqlite() {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let found = find_user_sqlite(&mut *tx, &field).await?;
            let user = check_password(found, email, password)?;
            tx.commit().await.map_err(StorageError::from)?;
            user
        } else if let Some(pool) = self.store.as_postgres() {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let found = find_user_postgres(&mut *tx, &field).await?;
            let user = check_password(found, email, password)?;
            tx.commit().await.map_err(StorageError::from)?;
            user
        } else {
            return Err(unsupported());
        };

        tracing::info!(user_id = %user.id, "Credentials verified");
        Ok(user)
    }

    /// Replaces the password after checking the current one.
    #[tracing::instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), BrokerError> {
        if new_password.is_empty() {
            return Err(BrokerError::Validation("New password is required".to_string()));
        }
        let field = UserSearchField::Id(user_id.to_string());

        if let Some(pool) = self.store.as_sqlite() {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let found = find_user_sqlite(&mut *tx, &field).await?;
            check_password(found, user_id, old_password)?;
            if old_password == new_password {
                return Err(BrokerError::PasswordMatch);
            }
            let hash = hash_password(new_password)?;
            update_password_hash_sqlite(&mut *tx, user_id, &hash).await?;
            tx.commit().await.map_err(StorageError::from)?;
        } else if let Some(pool) = self.store.as_postgres() {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let found = find_user_postgres(&mut *tx, &field).await?;
            check_password(found, user_id, old_password)?;
            if old_password == new_password {
                return Err(BrokerError::PasswordMatch);
            }
            let hash = hash_password(new_password)?;
            update_password_hash_postgres(&mut *tx, user_id, &hash).await?;
            tx.commit().await.map_err(StorageError::from)?;
        } else {
            return Err(unsupported());
        }

        tracing::info!(user_id, "Password changed");
        Ok(())
    }
}
