//! Request layers: application authentication, access tokens, device ids, ownership

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{OriginalUri, Path, Query, Request, State},
    middleware::Next,
    response::Response,
};
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use http::{HeaderMap, HeaderValue};
use serde_json::Value;

use identity_broker::{
    Broker, BrokerError, DeviceIdentity, GuardOptions, Identity, RefreshRequest, RequestSources,
    RequestedIds, SignedRequest, TokenPair, parse_device_identifier, validate_ttl,
};

use crate::config::MAX_BODY_BYTES;
use crate::error::ApiError;

pub const HEADER_ACCESS_TOKEN: &str = "x-access-token";
pub const HEADER_REFRESH_TOKEN: &str = "x-refresh-token";
pub const HEADER_ACCESS_TOKEN_TTL: &str = "x-access-token-ttl";
pub const HEADER_REFRESH_TOKEN_TTL: &str = "x-refresh-token-ttl";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn ttl_header(headers: &HeaderMap, name: &str) -> Result<Option<i64>, BrokerError> {
    let ttl = header_str(headers, name)
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| BrokerError::Validation(format!("Invalid {name} header")))
        })
        .transpose()?;
    validate_ttl(ttl, name)
}

async fn buffer(body: Body) -> Result<Bytes, BrokerError> {
    to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| BrokerError::Validation(format!("Failed to read request body: {e}")))
}

/// Verifies which application is calling and stores its [`AppAuthContext`](identity_broker::AppAuthContext).
///
/// The body is buffered so the signature can cover it, then handed on unchanged.
pub async fn authenticate_app(
    State(broker): State<Arc<Broker>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = req.into_parts();
    let bytes = buffer(body).await?;

    // Signatures cover the URL the client called, before any nesting strips the prefix
    let url = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or(&parts.uri)
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let context = broker
        .app_authenticator()
        .authenticate(
            &parts.headers,
            &SignedRequest {
                method: parts.method.as_str(),
                url: &url,
                body: &bytes,
            },
        )
        .await?;

    parts.extensions.insert(context);
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

fn access_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .or_else(|| header_str(headers, HEADER_ACCESS_TOKEN).map(str::to_string))
}

fn set_token_headers(response: &mut Response, tokens: &TokenPair) -> Result<(), BrokerError> {
    let value = |token: &str| {
        HeaderValue::from_str(token)
            .map_err(|_| BrokerError::Crypto("Token is not a valid header value".to_string()))
    };
    let headers = response.headers_mut();
    headers.insert(HEADER_ACCESS_TOKEN, value(&tokens.access_token)?);
    headers.insert(HEADER_REFRESH_TOKEN, value(&tokens.refresh_token)?);
    Ok(())
}

/// Authenticates the access token and stores the caller's [`Identity`].
///
/// An expired access token is rotated transparently when `x-refresh-token` is sent;
/// the new pair comes back in the `x-access-token` and `x-refresh-token` response headers.
pub async fn authenticate_request(
    State(broker): State<Arc<Broker>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = access_token(req.headers()).ok_or(BrokerError::AuthenticationRequired)?;

    match broker.authenticator().authenticate(&token).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        Err(BrokerError::AccessTokenExpired) => {
            let headers = req.headers();
            let refresh_token = header_str(headers, HEADER_REFRESH_TOKEN)
                .ok_or_else(|| BrokerError::unauthorized("Refresh token required"))?;
            let request = RefreshRequest {
                refresh_token: refresh_token.to_string(),
                access_ttl: ttl_header(headers, HEADER_ACCESS_TOKEN_TTL)?,
                refresh_ttl: ttl_header(headers, HEADER_REFRESH_TOKEN_TTL)?,
            };

            let outcome = broker.rotation().rotate(request).await?;
            tracing::debug!(session_id = %outcome.session_id, "Access token refreshed in flight");

            req.extensions_mut().insert(Identity {
                user_id: outcome.user_id,
                app_id: outcome.app_id,
                device_id: outcome.device_id,
                session_id: outcome.session_id,
                refreshed: true,
            });
            let mut response = next.run(req).await;
            set_token_headers(&mut response, &outcome.tokens)?;
            Ok(response)
        }
        Err(err) => Err(err.into()),
    }
}

/// Parses the `{id}` path segment of a device route into a [`DeviceIdentity`].
pub async fn extract_device_identity(
    path: Option<Path<HashMap<String, String>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw = path
        .as_ref()
        .and_then(|Path(params)| params.get("id"))
        .map(String::as_str);
    let device = parse_device_identifier(raw)?;

    req.extensions_mut().insert(device);
    Ok(next.run(req).await)
}

/// State of one ownership check layer.
#[derive(Clone)]
pub struct GuardState {
    broker: Arc<Broker>,
    options: GuardOptions,
}

impl GuardState {
    pub fn new(broker: Arc<Broker>, options: GuardOptions) -> Self {
        Self { broker, options }
    }
}

/// Checks the ids a request names against the authenticated caller.
///
/// Must run inside [`authenticate_request`], and inside [`extract_device_identity`] on
/// device routes.
pub async fn guard_identity(
    State(guard): State<GuardState>,
    path: Option<Path<HashMap<String, String>>>,
    Query(query): Query<HashMap<String, String>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    let bytes = buffer(body).await?;
    let json = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice::<Value>(&bytes).ok()
    };

    let requested = RequestedIds::extract(&RequestSources {
        device: parts.extensions.get::<DeviceIdentity>(),
        path: path.as_ref().map(|Path(params)| params),
        body: json.as_ref(),
        query: Some(&query),
    });

    guard
        .broker
        .guard()
        .authorize(parts.extensions.get::<Identity>(), &requested, &guard.options)
        .await?;

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
