//! Session-identity lookup.
//!
//! # Responsibilities
//! - Map a session cookie value to a logged-in member id
//! - Read PHP session files (`sess_<id>`) from the configured directory
//!
//! # Design Decisions
//! - A missing session file means "anonymous", not an error
//! - Session ids are validated before touching the filesystem

use std::path::PathBuf;

use async_trait::async_trait;

use crate::session::php::{decode_session, PhpDecodeError};

/// Error reading session state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session id")]
    InvalidId,

    #[error("failed to read session: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode session: {0}")]
    Decode(#[from] PhpDecodeError),
}

/// Capability to resolve a session id to a member id.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// `Ok(None)` when the session is unknown or anonymous.
    async fn lookup(&self, session_id: &str) -> Result<Option<u64>, SessionError>;
}

/// Reads PHP session files written by the backend application.
#[derive(Debug, Clone)]
pub struct PhpSessionStore {
    dir: PathBuf,
    member_key: String,
}

impl PhpSessionStore {
    pub fn new(dir: impl Into<PathBuf>, member_key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            member_key: member_key.into(),
        }
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf, SessionError> {
        let valid = !session_id.is_empty()
            && session_id.len() <= 256
            && session_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b',');
        if !valid {
            return Err(SessionError::InvalidId);
        }
        Ok(self.dir.join(format!("sess_{}", session_id)))
    }
}

#[async_trait]
impl SessionStore for PhpSessionStore {
    async fn lookup(&self, session_id: &str) -> Result<Option<u64>, SessionError> {
        let path = self.session_path(session_id)?;

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let session = decode_session(&contents)?;
        Ok(session
            .get(&self.member_key)
            .and_then(|value| value.as_member_id()))
    }
}
