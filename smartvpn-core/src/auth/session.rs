//! API session forking for the network extension

use crate::error::AuthenticationError;
use crate::types::{SessionCookie, SessionSelector};
use async_trait::async_trait;

/// Source of child API sessions
///
/// The extension keeps its own API session; when that session expires the
/// app forks one and hands the selector over.
#[async_trait]
pub trait SessionService: Send + Sync {
    async fn extension_session_selector(&self) -> Result<SessionSelector, AuthenticationError>;

    /// Cookie the extension must send alongside the selector, if any
    fn session_cookie(&self) -> Option<SessionCookie>;
}
