use crate::state::AppState;
use axum::Router;

pub mod cookie;
mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod session;
pub mod store;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
