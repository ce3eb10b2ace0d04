use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::auth::cookie::extract_session_token;
use crate::auth::dto::SafeUser;
use crate::auth::error::AuthError;
use crate::state::AppState;

/// Resolves the request's session cookie to the current identity. Any
/// route requires authentication by taking this as an argument; anonymous
/// requests are rejected with 401. Missing, expired, or tampered tokens
/// all resolve the same way.
pub struct CurrentUser(pub SafeUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers, &state.config.session.cookie_name)
            .ok_or(AuthError::Unauthorized)?;

        let user_id = state
            .sessions
            .get(&token)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        // The session only stores the id; the authoritative record is
        // re-read on every request so out-of-band profile edits show up
        // immediately and deleted accounts lose access at once.
        match state.users.find_by_id(user_id).await? {
            Some(user) => Ok(CurrentUser(user.into())),
            None => {
                state.sessions.destroy(&token).await?;
                Err(AuthError::Unauthorized)
            }
        }
    }
}
