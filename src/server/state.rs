use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;

use crate::server::database::pool::Pool;
use crate::server::model::user::Role;
use crate::server::util::time;

/// Tokens outlive a full shift, then lookups treat them as gone.
const SESSION_TTL_HOURS: i64 = 12;

/// Authenticated identity attached to a session token.
#[derive(Debug, Clone)]
pub(crate) struct SessionUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

struct Session {
    user: SessionUser,
    issued_at: DateTime<Utc>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    db_read_pool: Pool,
    db_write_pool: Pool,
    /// opaque bearer token -> authenticated user; in-process only, sessions
    /// do not survive a restart
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    timezone: Tz,
}

impl AppState {
    pub fn new(db_read_pool: Pool, db_write_pool: Pool, timezone: Tz) -> Self {
        Self {
            db_read_pool,
            db_write_pool,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            timezone,
        }
    }

    pub fn get_db_read_pool(&self) -> Pool {
        self.db_read_pool.clone()
    }

    pub fn get_db_write_pool(&self) -> Pool {
        self.db_write_pool.clone()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub async fn insert_session(&self, token: String, user: SessionUser) {
        let session = Session {
            user,
            issued_at: time::helper::get_utc_now(),
        };
        self.sessions.lock().await.insert(token, session);
    }

    /// Resolve a token, dropping it once the TTL has passed.
    pub async fn session(&self, token: &str) -> Option<SessionUser> {
        let mut sessions = self.sessions.lock().await;
        let expired = match sessions.get(token) {
            Some(session) => {
                time::helper::get_utc_now() - session.issued_at
                    >= Duration::hours(SESSION_TTL_HOURS)
            }
            None => return None,
        };
        if expired {
            sessions.remove(token);
            return None;
        }
        sessions.get(token).map(|s| s.user.clone())
    }

    pub async fn remove_session(&self, token: &str) {
        self.sessions.lock().await.remove(token);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[actix_web::test]
    async fn sessions_round_trip() {
        let state = AppState::new(
            Pool::new("read"),
            Pool::new("write"),
            chrono_tz::America::Bogota,
        );
        let user = SessionUser {
            id: 1,
            username: "admin".to_string(),
            role: Role::Admin,
        };
        state.insert_session("tok".to_string(), user).await;

        let found = state.session("tok").await.expect("session stored");
        assert_eq!(found.username, "admin");
        assert_eq!(found.role, Role::Admin);

        state.remove_session("tok").await;
        assert!(state.session("tok").await.is_none());
    }

    #[actix_web::test]
    async fn sessions_expire_after_a_shift() {
        let issued = 1_709_269_140;
        crate::server::util::time::mock_chrono::set_utc_now(issued);
        let state = AppState::new(
            Pool::new("read"),
            Pool::new("write"),
            chrono_tz::America::Bogota,
        );
        let user = SessionUser {
            id: 2,
            username: "mesero".to_string(),
            role: Role::Waiter,
        };
        state.insert_session("tok".to_string(), user).await;

        // still valid one second before the TTL
        crate::server::util::time::mock_chrono::set_utc_now(
            issued + SESSION_TTL_HOURS * 3600 - 1,
        );
        assert!(state.session("tok").await.is_some());

        // gone at the TTL, and stays gone if the clock moves back
        crate::server::util::time::mock_chrono::set_utc_now(issued + SESSION_TTL_HOURS * 3600);
        assert!(state.session("tok").await.is_none());
        crate::server::util::time::mock_chrono::set_utc_now(issued);
        assert!(state.session("tok").await.is_none());
    }
}
