use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    Admin,
    Waiter,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "waiter" => Ok(Role::Waiter),
            s => Err(format!("invalid role: {s}")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetUsersResponse {
    pub users: Vec<UserView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserView {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostUserRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostUserResponse {
    pub id: i32,
}
