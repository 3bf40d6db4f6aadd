mod app;
mod credential;
mod guard;
mod hmac;
mod jwt;
mod pkce;
mod refresh;
mod types;

pub use app::{
    AppAuthenticator, AuthScheme, HEADER_APP_ID, HEADER_CODE_CHALLENGER,
    HEADER_INTERNAL_SIGNATURE, HEADER_INTERNAL_TIMESTAMP, HEADER_SIGNATURE, HEADER_TIMESTAMP,
    classify,
};
pub use credential::CredentialVerifier;
pub use guard::{
    DeviceIdentity, GuardOptions, IdentityGuard, RequestSources, RequestedIds,
    parse_device_identifier,
};
pub use hmac::{
    InternalSignature, SignedRequest, canonical_body, create_internal_signature, sign,
    signing_string, verify_signature, within_drift,
};
pub use jwt::RequestAuthenticator;
pub use pkce::{ChallengeEscrow, EscrowReceipt, PkceVerifyRequest};
pub use refresh::{RefreshRequest, RotationEngine, RotationOutcome};
pub use types::{AppAuthContext, Identity};
