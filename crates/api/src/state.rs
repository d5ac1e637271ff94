//! Shared application state

use std::sync::Arc;

use crate::{
    auth::{CodecError, CookieSettings, JwtManager, RefreshCodec},
    config::Config,
    store::{AccountDirectory, CommentStore},
    websocket::{HubHandle, SessionContext, SessionSettings},
};

/// State handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt_manager: JwtManager,
    pub codec: RefreshCodec,
    pub hub: HubHandle,
    pub accounts: Arc<dyn AccountDirectory>,
    pub comments: Arc<dyn CommentStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        jwt_manager: JwtManager,
        hub: HubHandle,
        accounts: Arc<dyn AccountDirectory>,
        comments: Arc<dyn CommentStore>,
    ) -> Result<Self, CodecError> {
        let codec = RefreshCodec::new(config.refresh_mask_key.as_bytes())?;
        Ok(Self {
            config: Arc::new(config),
            jwt_manager,
            codec,
            hub,
            accounts,
            comments,
        })
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            name: self.config.refresh_cookie_name.clone(),
            domain: self.config.cookie_domain.clone(),
            secure: self.config.cookie_secure,
        }
    }

    /// Collaborators for one chat connection
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            hub: self.hub.clone(),
            comments: Arc::clone(&self.comments),
            settings: SessionSettings::new(
                self.config.ws_mailbox_capacity,
                self.config.ws_max_frame_bytes,
            ),
        }
    }
}
