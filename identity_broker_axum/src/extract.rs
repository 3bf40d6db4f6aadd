use axum::{
    extract::{
        FromRequest, FromRequestParts, Query as AxumQuery, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    response::{IntoResponse, Response},
};
use http::request::Parts;
use serde::{Serialize, de::DeserializeOwned};

use identity_broker::{AppAuthContext, BrokerError, DeviceIdentity, Identity};

use crate::error::ApiError;

/// The caller established by the access token middleware
///
/// Available as an extractor on every route behind
/// [`authenticate_request`](crate::authenticate_request). A handler reached without
/// that layer is rejected with `AuthenticationRequiredError`.
///
/// ```no_run
/// use axum::Json;
/// use identity_broker_axum::AuthIdentity;
///
/// async fn me(AuthIdentity(identity): AuthIdentity) -> Json<identity_broker::Identity> {
///     Json(identity)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthIdentity(pub Identity);

impl<S> FromRequestParts<S> for AuthIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or(ApiError(BrokerError::AuthenticationRequired))
    }
}

/// How the calling application authenticated, set by [`authenticate_app`](crate::authenticate_app).
#[derive(Debug, Clone)]
pub struct AppContext(pub AppAuthContext);

impl<S> FromRequestParts<S> for AppContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AppAuthContext>()
            .cloned()
            .map(Self)
            .ok_or(ApiError(BrokerError::NoAuthenticationMethod))
    }
}

/// User and device named by the `{id}` segment of a device route.
#[derive(Debug, Clone)]
pub struct DeviceParam(pub DeviceIdentity);

impl<S> FromRequestParts<S> for DeviceParam
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<DeviceIdentity>()
            .cloned()
            .map(Self)
            .ok_or(ApiError(BrokerError::auth("Device identifier is required")))
    }
}

/// JSON body extractor whose rejections use the broker error envelope.
///
/// A malformed body, a wrong field type or a missing `Content-Type` becomes a
/// `ValidationError` (400) instead of axum's plain-text 415/422.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        axum::Json::<T>::from_request(req, state)
            .await
            .map(|axum::Json(value)| Self(value))
            .map_err(|rejection| ApiError(json_rejection(rejection)))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

fn json_rejection(rejection: JsonRejection) -> BrokerError {
    let message = match &rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Content-Type must be application/json".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => format!("Invalid JSON: {}", rejection.body_text()),
        JsonRejection::JsonDataError(_) => {
            format!("Invalid request data: {}", rejection.body_text())
        }
        _ => format!("Failed to read request body: {}", rejection.body_text()),
    };
    tracing::debug!(status = %rejection.status(), "{message}");
    BrokerError::Validation(message)
}

/// Query string extractor with the same rejection handling as [`Json`].
#[derive(Debug, Clone, Default)]
pub struct Query<T>(pub T);

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        AxumQuery::<T>::from_request_parts(parts, state)
            .await
            .map(|AxumQuery(value)| Self(value))
            .map_err(|rejection: QueryRejection| {
                ApiError(BrokerError::Validation(format!(
                    "Invalid query string: {}",
                    rejection.body_text()
                )))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use identity_broker::PkceVerifyRequest;

    fn post(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = http::Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn rejection(req: Request) -> BrokerError {
        match Json::<PkceVerifyRequest>::from_request(req, &()).await {
            Err(ApiError(err)) => err,
            Ok(_) => panic!("Expected a rejection"),
        }
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_validation_error() {
        let err = rejection(post(Some("application/json"), r#"{"secret_key":1}"#)).await;
        match err {
            BrokerError::Validation(message) => {
                assert!(message.starts_with("Invalid request data"), "{message}");
                assert!(message.contains("secret_key"), "{message}");
            }
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_syntax_and_content_type_errors() {
        let err = rejection(post(Some("application/json"), "{not json")).await;
        assert!(matches!(err, BrokerError::Validation(m) if m.starts_with("Invalid JSON")));

        let err = rejection(post(None, r#"{"secret_key":"k","code_verifier":"v"}"#)).await;
        assert!(matches!(
            err,
            BrokerError::Validation(m) if m == "Content-Type must be application/json"
        ));
    }

    #[tokio::test]
    async fn test_valid_body_extracts() {
        let req = post(
            Some("application/json"),
            r#"{"secret_key":"k","code_verifier":"v"}"#,
        );
        let Json(body) = Json::<PkceVerifyRequest>::from_request(req, &()).await.unwrap();
        assert_eq!(body.secret_key, "k");
        assert_eq!(body.code_verifier, "v");
    }
}
