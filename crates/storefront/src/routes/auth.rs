//! Identity hand-off routes.
//!
//! Authentication itself is the identity provider's job; these routes sit
//! behind it and only translate a completed sign-in into session state.
//! The customer record is created lazily on hand-off, so every
//! authenticated identity that later touches the cart already has one.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use tamarind_core::{Email, UserId};

use crate::db::CustomerRepository;
use crate::error::{AppError, Result};
use crate::middleware::auth::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, Customer};
use crate::state::AppState;

/// Identity payload forwarded by the provider after a successful sign-in.
#[derive(Debug, Deserialize)]
pub struct SessionHandOff {
    /// The provider's stable user reference.
    pub user_ref: i32,
    /// Display name, used as the default customer name.
    pub name: String,
    /// Email address, used as the default customer email.
    pub email: String,
}

/// Store the authenticated user in the session.
#[instrument(skip(state, session, payload))]
pub async fn create_session(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<SessionHandOff>,
) -> Result<Json<Customer>> {
    let email = Email::parse(&payload.email)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_owned()));
    }

    let user = CurrentUser {
        user_ref: UserId::new(payload.user_ref),
        name: payload.name,
        email,
    };

    set_current_user(&session, &user).await?;
    let customer = CustomerRepository::new(state.pool()).ensure(&user).await?;

    tracing::info!(customer_id = %customer.id, "shopper signed in");
    Ok(Json(customer))
}

/// Sign the shopper out.
#[instrument(skip(session))]
pub async fn destroy_session(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
