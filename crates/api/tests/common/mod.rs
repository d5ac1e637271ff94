//! Shared fixtures for integration tests: in-memory collaborators and a
//! fully wired router.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::Router;
use helpdesk_api::{
    auth::{JwtManager, MemoryRevocationStore},
    create_router,
    store::{Account, AccountDirectory, CommentStore},
    websocket::Hub,
    AppState, Config,
};
use helpdesk_shared::{HelpdeskError, Identity, Role, TicketId};
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery staple";

#[derive(Default)]
pub struct MemoryAccounts {
    accounts: HashMap<String, Account>,
}

impl MemoryAccounts {
    pub fn with(mut self, email: &str, identity: Identity, password: &str) -> Self {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string();
        self.accounts.insert(
            email.to_string(),
            Account {
                identity,
                password_hash: hash,
            },
        );
        self
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccounts {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, HelpdeskError> {
        Ok(self.accounts.get(email).cloned())
    }

    async fn ping(&self) -> Result<(), HelpdeskError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryComments {
    pub saved: Mutex<Vec<(TicketId, String, Uuid)>>,
}

#[async_trait]
impl CommentStore for MemoryComments {
    async fn save_comment(
        &self,
        ticket_id: TicketId,
        content: &str,
        author: &Identity,
    ) -> Result<Uuid, HelpdeskError> {
        self.saved
            .lock()
            .unwrap()
            .push((ticket_id, content.to_string(), author.id));
        Ok(Uuid::new_v4())
    }
}

pub fn identity(username: &str, role: Role) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        username: username.to_string(),
        role,
        belong: vec!["tenant-1".to_string()],
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        cors_allowed_origins: vec!["http://localhost:3000".to_string()],
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        redis_url: "redis://unused".to_string(),
        revocation_fail_open: false,
        jwt_secret: "integration-test-secret-at-least-32-chars".to_string(),
        refresh_mask_key: "integration-mask".to_string(),
        access_token_ttl_minutes: 60,
        refresh_token_ttl_days: 7,
        refresh_cookie_name: "token".to_string(),
        cookie_domain: None,
        cookie_secure: false,
        ws_mailbox_capacity: 16,
        ws_max_frame_bytes: 512,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub revocations: Arc<MemoryRevocationStore>,
    pub comments: Arc<MemoryComments>,
}

/// Wire the real router over in-memory stores. Must run inside a runtime
/// because the hub task is spawned.
pub fn spawn_app(accounts: MemoryAccounts) -> TestApp {
    let config = test_config();
    let revocations = Arc::new(MemoryRevocationStore::new());
    let comments = Arc::new(MemoryComments::default());

    let jwt_manager = JwtManager::new(
        &config.jwt_secret,
        time::Duration::minutes(config.access_token_ttl_minutes),
        time::Duration::days(config.refresh_token_ttl_days),
        revocations.clone(),
    );

    let state = AppState::new(
        config,
        jwt_manager,
        Hub::spawn(),
        Arc::new(accounts),
        comments.clone(),
    )
    .unwrap();

    TestApp {
        router: create_router(state.clone()),
        state,
        revocations,
        comments,
    }
}
