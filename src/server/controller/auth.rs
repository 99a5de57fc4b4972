//! Login/logout and the request-scoped authentication context.
//!
//! Handlers never read ambient user state: `AuthContext` is extracted per
//! request from the bearer token and passed into each operation explicitly.

use std::future::Future;
use std::pin::Pin;

use actix_web::http::header;
use actix_web::{post, web, FromRequest, HttpRequest, HttpResponse, Responder};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::server::controller::{db_err, error::CustomError};
use crate::server::model::user::{LoginRequest, LoginResponse, Role};
use crate::server::state::{AppState, SessionUser};

const TOKEN_LEN: usize = 32;

/// Authenticated caller, resolved from the bearer token.
#[derive(Debug, Clone)]
pub(crate) struct AuthContext {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
}

impl AuthContext {
    pub fn require_admin(&self) -> Result<(), CustomError> {
        match self.role {
            Role::Admin => Ok(()),
            _ => Err(CustomError::Forbidden),
        }
    }

    pub fn require_waiter(&self) -> Result<(), CustomError> {
        match self.role {
            Role::Waiter => Ok(()),
            _ => Err(CustomError::Forbidden),
        }
    }
}

impl FromRequest for AuthContext {
    type Error = CustomError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        Box::pin(async move {
            let state = state.ok_or(CustomError::ServerIsBusy)?;
            let token = token.ok_or(CustomError::Unauthorized)?;
            match state.session(&token).await {
                Some(user) => Ok(AuthContext {
                    user_id: user.id,
                    username: user.username,
                    role: user.role,
                }),
                None => Err(CustomError::Unauthorized),
            }
        })
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

pub(crate) fn hash_password(password: &str) -> Result<String, CustomError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            warn!("password hashing failed, {}", e);
            CustomError::ServerIsBusy
        })
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("stored password hash is malformed, {}", e);
            false
        }
    }
}

fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[post("/v1/login")]
async fn login(
    body: web::Json<LoginRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let Some(conn) = data.get_db_read_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let username = body.username.trim();
    let row = conn
        .query_opt(
            "SELECT id, username, password_hash, role, active FROM app_user WHERE username = $1",
            &[&username],
        )
        .await
        .map_err(db_err("login lookup"))?
        .ok_or(CustomError::Unauthorized)?;

    let stored_hash: String = row.get("password_hash");
    if !verify_password(&body.password, &stored_hash) {
        return Err(CustomError::Unauthorized);
    }
    let active: bool = row.get("active");
    if !active {
        // deactivated accounts keep their history but cannot sign in
        return Err(CustomError::Forbidden);
    }
    let role: Role = row
        .get::<_, String>("role")
        .parse()
        .map_err(|_| CustomError::Unauthorized)?;

    let token = new_token();
    data.insert_session(
        token.clone(),
        SessionUser {
            id: row.get("id"),
            username: row.get("username"),
            role,
        },
    )
    .await;
    info!("user {} logged in", username);

    Ok(web::Json(LoginResponse { token, role }))
}

#[post("/v1/logout")]
async fn logout(req: HttpRequest, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let token = bearer_token(&req).ok_or(CustomError::Unauthorized)?;
    data.remove_session(&token).await;
    Ok(HttpResponse::Ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("waiter123").unwrap();
        assert!(verify_password("waiter123", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn tokens_are_opaque_and_distinct() {
        let (a, b) = (new_token(), new_token());
        assert_eq!(a.len(), TOKEN_LEN);
        assert_ne!(a, b);
    }
}
