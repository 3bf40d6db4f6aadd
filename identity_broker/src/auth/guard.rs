//! Ownership checks between the authenticated identity and the ids a request names

use serde_json::Value;
use std::collections::HashMap;

use crate::errors::BrokerError;
use crate::userdb::UserStore;

use super::types::Identity;

/// Which ids a route must check against the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardOptions {
    pub check_user: bool,
    pub check_device: bool,
    pub check_app: bool,
    pub check_session: bool,
    /// Admins pass regardless of ownership.
    pub allow_admin: bool,
    /// Absent ids are not an error; present ones are still checked.
    pub allow_partial: bool,
}

impl GuardOptions {
    pub fn user() -> Self {
        Self {
            check_user: true,
            ..Default::default()
        }
    }

    pub fn session() -> Self {
        Self {
            check_session: true,
            ..Default::default()
        }
    }

    pub fn user_device() -> Self {
        Self {
            check_user: true,
            check_device: true,
            ..Default::default()
        }
    }

    pub fn with_admin(mut self) -> Self {
        self.allow_admin = true;
        self
    }

    pub fn with_partial(mut self) -> Self {
        self.allow_partial = true;
        self
    }
}

/// User and device named by a composite device identifier in the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub user_id: String,
    pub device_id: String,
}

const UUID_LEN: usize = 36;

/// Splits `<user_uuid>-<device_id>` at the first `-` after the uuid.
pub fn parse_device_identifier(id: Option<&str>) -> Result<DeviceIdentity, BrokerError> {
    let id = id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BrokerError::auth("Device identifier is required"))?;

    let separator = id
        .get(UUID_LEN..)
        .and_then(|rest| rest.find('-'))
        .map(|offset| UUID_LEN + offset)
        .ok_or_else(|| BrokerError::auth("Invalid device identifier format"))?;

    let (user_id, device_id) = (&id[..separator], &id[separator + 1..]);
    if user_id.is_empty() || device_id.is_empty() {
        return Err(BrokerError::auth("Invalid device identifier components"));
    }

    Ok(DeviceIdentity {
        user_id: user_id.to_string(),
        device_id: device_id.to_string(),
    })
}

/// Where a request may name ids, in order of trust.
#[derive(Debug, Default)]
pub struct RequestSources<'a> {
    pub device: Option<&'a DeviceIdentity>,
    pub path: Option<&'a HashMap<String, String>>,
    pub body: Option<&'a Value>,
    pub query: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    User,
    Device,
    App,
    Session,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Device => "device",
            Self::App => "app",
            Self::Session => "session",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::User => "user_id",
            Self::Device => "device_id",
            Self::App => "app_id",
            Self::Session => "session_id",
        }
    }
}

/// Ids named by the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedIds {
    pub user_id: Option<String>,
    pub device_id: Option<String>,
    pub app_id: Option<String>,
    pub session_id: Option<String>,
}

impl RequestedIds {
    pub fn extract(sources: &RequestSources<'_>) -> Self {
        Self {
            user_id: extract_field(sources, Field::User),
            device_id: extract_field(sources, Field::Device),
            app_id: extract_field(sources, Field::App),
            session_id: extract_field(sources, Field::Session),
        }
    }

    fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::User => self.user_id.as_deref(),
            Field::Device => self.device_id.as_deref(),
            Field::App => self.app_id.as_deref(),
            Field::Session => self.session_id.as_deref(),
        }
    }
}

fn extract_field(sources: &RequestSources<'_>, field: Field) -> Option<String> {
    let canonical = sources.device.and_then(|device| match field {
        Field::User => Some(device.user_id.as_str()),
        Field::Device => Some(device.device_id.as_str()),
        _ => None,
    });
    if let Some(value) = canonical.filter(|v| !v.is_empty()) {
        return Some(value.to_string());
    }

    [field.key(), "id"].into_iter().find_map(|key| {
        let from_path = sources.path.and_then(|p| p.get(key)).map(String::as_str);
        let from_body = sources.body.and_then(|b| b.get(key)).and_then(Value::as_str);
        let from_query = sources.query.and_then(|q| q.get(key)).map(String::as_str);

        [from_path, from_body, from_query]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
            .map(str::to_string)
    })
}

#[derive(Clone)]
pub struct IdentityGuard {
    users: UserStore,
}

impl IdentityGuard {
    pub fn new(users: UserStore) -> Self {
        Self { users }
    }

    #[tracing::instrument(skip_all, fields(user_id = identity.map(|i| i.user_id.as_str())))]
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        requested: &RequestedIds,
        options: &GuardOptions,
    ) -> Result<(), BrokerError> {
        let identity = identity.ok_or(BrokerError::AuthenticationRequired)?;
        if identity.user_id.is_empty() || identity.device_id.is_empty() || identity.app_id.is_empty()
        {
            return Err(BrokerError::unauthorized("Incomplete identity context"));
        }

        let checks = [
            (Field::User, options.check_user, identity.user_id.as_str()),
            (Field::Device, options.check_device, identity.device_id.as_str()),
            (Field::App, options.check_app, identity.app_id.as_str()),
            (Field::Session, options.check_session, identity.session_id.as_str()),
        ];

        if !options.allow_partial {
            for (field, enabled, _) in checks {
                if enabled && requested.get(field).is_none() {
                    return Err(BrokerError::auth(format!(
                        "Missing {} id in request",
                        field.name()
                    )));
                }
            }
        }

        if options.allow_admin && self.users.is_admin(&identity.user_id).await? {
            tracing::debug!("Admin override");
            return Ok(());
        }

        for (field, enabled, own) in checks {
            match requested.get(field) {
                Some(wanted) if enabled && wanted != own => {
                    tracing::warn!(field = field.name(), "Ownership mismatch");
                    return Err(BrokerError::Forbidden(format!(
                        "Forbidden: {} mismatch",
                        field.name()
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
