//! Composite flows
//!
//! Each function drives several components of a [`Broker`](crate::Broker) in a fixed
//! order. HTTP layers call these and never the components directly.

mod auth;
mod sessions;
mod types;

pub use auth::{
    change_password_core, create_session_core, login_core, refresh_core, register_core,
    verify_pkce_core,
};
pub use sessions::{
    delete_session_core, delete_sessions_core, device_session_core, get_session_core,
    list_sessions_core,
};
pub use types::{
    ChangePasswordRequest, LoginOutcome, LoginRequest, RegisterRequest, SessionResponse,
};
