//! Login endpoint
//!
//! Trades a username/password pair for a one-time token.

use super::response::{ApiError, ApiResult};
use super::GatewayState;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    Json,
};
use relay_common::AppError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::Validate;

/// JSON body that must also pass its `validator` rules
///
/// Unparseable bodies become `InvalidBody`, rule violations `Validation`;
/// both are 400s.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::invalid_body(rejection.body_text()))?;
        body.validate()?;
        Ok(Self(body))
    }
}

/// Login request body
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 128))]
    pub username: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// One-time token for `GET /ws?otp=...`
    pub otp: String,
}

/// Issue a one-time token
///
/// POST /login
pub async fn login(
    State(state): State<GatewayState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let credentials = state.credentials().clone();
    let username = request.username.clone();

    // Argon2 verification is CPU bound
    let accepted = tokio::task::spawn_blocking(move || {
        credentials.verify(&request.username, &request.password)
    })
    .await
    .map_err(AppError::internal)?;

    if !accepted {
        tracing::info!(username = %username, "Login rejected");
        return Err(AppError::InvalidCredentials.into());
    }

    let token = state.tokens().generate();
    tracing::info!(username = %username, "One-time token issued");

    Ok(Json(LoginResponse {
        otp: token.key().to_string(),
    }))
}
