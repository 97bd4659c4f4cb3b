/// Backend service seam
///
/// This module defines the traits the application talks to for
/// persistence and identity:
/// - FindStore: find record query and insert
/// - ObjectStore: photo upload and URL resolution
/// - Identity: current user, sign-in, sign-out, session notifications
///
/// The default implementation is the local SQLite + disk backend
/// (local.rs). The application shell and the capture workflow only see
/// these traits.

pub mod local;

use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::finds::{Find, NewFind};

/// Errors surfaced by the backend.
///
/// Every variant is recoverable by user retry; nothing here is fatal to
/// the process and no automatic retry is attempted anywhere.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Record query or insert failed
    #[error("storage error: {0}")]
    Storage(String),
    /// Photo upload or resolution failed
    #[error("object store error: {0}")]
    ObjectStore(String),
    /// Sign-in attempt rejected
    #[error("sign-in failed: {0}")]
    Auth(String),
}

/// A signed-in user as reported by the identity collaborator
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

/// Find record storage
pub trait FindStore {
    /// The most recent finds, newest first (`created_at` descending)
    fn recent_finds(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Find>, RemoteError>> + Send;

    /// Insert a new find. The backend assigns `id` and `created_at` and
    /// returns the completed record.
    fn insert_find(
        &self,
        find: NewFind,
    ) -> impl Future<Output = Result<Find, RemoteError>> + Send;
}

/// Photo object storage
pub trait ObjectStore {
    /// Store `bytes` under `key`. Fails if the key already exists; keys
    /// are freshly generated per upload attempt, so a collision is a bug.
    fn upload(
        &self,
        key: String,
        bytes: Vec<u8>,
        content_type: &'static str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Resolve a stored key to a retrievable location
    fn object_url(&self, key: &str) -> PathBuf;
}

/// Identity and session primitive
pub trait Identity {
    /// The session restored at startup, if any
    fn current_user(&self) -> impl Future<Output = Result<Option<User>, RemoteError>> + Send;

    /// One-shot email sign-in. Establishes a session and notifies
    /// subscribers on success.
    fn sign_in(&self, email: String) -> impl Future<Output = Result<User, RemoteError>> + Send;

    /// End the current session and notify subscribers
    fn sign_out(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Session-changed notifications. Receivers observe the signed-in
    /// user (or None) after every sign-in/sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}
