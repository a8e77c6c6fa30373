mod credentials;
mod login;
mod password;
mod register;
mod token;

use axum::{routing::post, Router};

pub use credentials::{CredentialStore, User};
pub use token::{SessionClaims, TokenService};

use crate::AppState;

/// Public routes: no token needed to register or log in.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register::register))
        .route("/api/login", post(login::login))
}
