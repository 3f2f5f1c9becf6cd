//! Routes of the short-lived sign-in listener.
//!
//! - `GET /callback`: OAuth redirect target (code + state)

use crate::handlers::oauth_handlers::{CallbackState, oauth_callback};
use axum::{Router, routing::get};

pub const CALLBACK_PATH: &str = "/callback";

/// Build the router served on the loopback address during sign-in.
pub fn routes() -> Router<CallbackState> {
    Router::new().route(CALLBACK_PATH, get(oauth_callback))
}
