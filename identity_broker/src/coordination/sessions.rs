//! Session administration
//!
//! Ownership is checked by the guard before these run. A caller who is not an admin
//! only ever sees their own sessions, even through an unscoped filter.

use crate::auth::{DeviceIdentity, Identity};
use crate::broker::Broker;
use crate::errors::BrokerError;
use crate::session::{SessionFilter, SessionRecord};

async fn scope_to_caller(
    broker: &Broker,
    identity: &Identity,
    mut filter: SessionFilter,
) -> Result<SessionFilter, BrokerError> {
    if !broker.users().is_admin(&identity.user_id).await? {
        filter.user_id = Some(identity.user_id.clone());
    }
    Ok(filter)
}

#[tracing::instrument(skip(broker, identity), fields(user_id = %identity.user_id))]
pub async fn list_sessions_core(
    broker: &Broker,
    identity: &Identity,
    filter: SessionFilter,
) -> Result<Vec<SessionRecord>, BrokerError> {
    let filter = scope_to_caller(broker, identity, filter).await?;
    Ok(broker.sessions().list(&filter).await?)
}

pub async fn get_session_core(
    broker: &Broker,
    session_id: &str,
) -> Result<SessionRecord, BrokerError> {
    broker
        .sessions()
        .get_by_id(session_id)
        .await?
        .ok_or(BrokerError::SessionNotFound)
}

#[tracing::instrument(skip(broker))]
pub async fn delete_session_core(broker: &Broker, session_id: &str) -> Result<(), BrokerError> {
    if broker.sessions().delete_by_id(session_id).await? {
        tracing::info!("Session deleted");
        Ok(())
    } else {
        Err(BrokerError::SessionNotFound)
    }
}

/// Deletes every matching session and returns how many went.
#[tracing::instrument(skip(broker, identity), fields(user_id = %identity.user_id))]
pub async fn delete_sessions_core(
    broker: &Broker,
    identity: &Identity,
    filter: SessionFilter,
) -> Result<u64, BrokerError> {
    if filter.is_empty() {
        return Err(BrokerError::Validation(
            "At least one of user_id, app_id or device_id is required".to_string(),
        ));
    }
    let filter = scope_to_caller(broker, identity, filter).await?;
    Ok(broker.sessions().delete_by_filter(&filter).await?)
}

/// The session a device holds for the caller's app.
pub async fn device_session_core(
    broker: &Broker,
    identity: &Identity,
    device: &DeviceIdentity,
) -> Result<SessionRecord, BrokerError> {
    broker
        .devices()
        .find(&device.user_id, &device.device_id)
        .await?
        .ok_or_else(|| BrokerError::DeviceNotFound {
            user_id: device.user_id.clone(),
            device_id: device.device_id.clone(),
        })?;

    broker
        .sessions()
        .find_by_user_device_app(&device.user_id, &device.device_id, &identity.app_id)
        .await?
        .ok_or(BrokerError::SessionNotFound)
}
