//! Authentication flow: sign-in, sign-up, profile refresh, sign-out.
//!
//! These are the only callers of [`Session::establish`] and
//! [`Session::update_user`] outside tests.

use bazaar_core::User;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{instrument, warn};

use super::Session;
use crate::api::conversions::{convert_user, convert_user_payload};
use crate::api::{AuthPayload, UserPayload};
use crate::error::ClientError;
use crate::pipeline::{ApiClient, ApiRequest};

/// Sign in with email and password and establish the session.
///
/// A 401 here means bad credentials and never tears anything down.
///
/// # Errors
///
/// Returns the pipeline error, or [`ClientError::Store`] if the new session
/// could not be persisted (it is still active in memory).
#[instrument(skip_all)]
pub async fn login(api: &ApiClient, email: &str, password: &SecretString) -> Result<User, ClientError> {
    let payload: AuthPayload = api
        .dispatch(
            ApiRequest::post("/auth/login")
                .json(json!({ "email": email, "password": password.expose_secret() }))
                .auth_flow(),
        )
        .await?;
    establish(api.session(), payload).await
}

/// Create an account and establish its session.
///
/// # Errors
///
/// Same as [`login`].
#[instrument(skip_all)]
pub async fn register(
    api: &ApiClient,
    name: &str,
    email: &str,
    password: &SecretString,
) -> Result<User, ClientError> {
    let payload: AuthPayload = api
        .dispatch(
            ApiRequest::post("/auth/register")
                .json(json!({
                    "name": name,
                    "email": email,
                    "password": password.expose_secret(),
                }))
                .auth_flow(),
        )
        .await?;
    establish(api.session(), payload).await
}

/// Refetch the signed-in user's profile.
///
/// Returns `Ok(None)` without a request when there is no session, or when
/// the session ended while the request was in flight.
///
/// # Errors
///
/// Returns the pipeline error; a 401 tears the session down first.
#[instrument(skip(api))]
pub async fn refresh_profile(api: &ApiClient) -> Result<Option<User>, ClientError> {
    let session = api.session();
    if !session.is_authenticated().await {
        return Ok(None);
    }

    let epoch = session.epoch();
    let payload: UserPayload = api.dispatch(ApiRequest::get("/users/me")).await?;
    let user = convert_user_payload(payload)?;

    if session.epoch() != epoch {
        warn!("Session changed during profile refresh; discarding result");
        return Ok(None);
    }

    if session.update_user(user.clone()).await? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// End the session locally. Returns whether one was held.
pub async fn logout(api: &ApiClient) -> bool {
    api.session().teardown().await
}

async fn establish(session: &Session, payload: AuthPayload) -> Result<User, ClientError> {
    if payload.token.trim().is_empty() {
        return Err(ClientError::Malformed("auth response without token".to_string()));
    }
    let user = convert_user(payload.user)?;
    session
        .establish(SecretString::from(payload.token), user.clone())
        .await?;
    Ok(user)
}
