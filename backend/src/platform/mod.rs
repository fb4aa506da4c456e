//! Collaborators the views talk to: the listing and user document stores and
//! the identity provider. Each has an in-process implementation and a
//! PostgreSQL one.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{Passwords, TokenIssuer};
use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{Cursor, ListingRecord, NewUser, Session, UserRecord};

pub mod memory;
pub mod postgres;

/// Equality filter on the listing type, newest first, at most `limit` records,
/// optionally resuming after a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub category: String,
    pub limit: usize,
    pub start_after: Option<Cursor>,
}

impl ListingQuery {
    pub fn new(category: &str, limit: usize) -> Self {
        Self {
            category: category.to_string(),
            limit,
            start_after: None,
        }
    }

    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn query(&self, query: &ListingQuery) -> Result<Vec<ListingRecord>>;

    /// Only used to seed the store; views never write listings.
    async fn insert(&self, record: ListingRecord) -> Result<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, uid: &str) -> Result<Option<UserRecord>>;

    /// Writes the whole document, stamping it with the store's clock.
    async fn create(&self, uid: &str, user: NewUser) -> Result<UserRecord>;

    /// Fails with `NotFound` when the document does not exist.
    async fn update_name(&self, uid: &str, name: &str) -> Result<()>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn create_account(&self, email: &str, password: &str) -> Result<Session>;

    async fn update_display_name(&self, session: &Session, name: &str) -> Result<()>;

    async fn sign_out(&self, session: &Session) -> Result<()>;

    /// Resolves a bearer token to its live session.
    async fn current_session(&self, token: &str) -> Result<Session>;
}

#[derive(Clone)]
pub struct Platform {
    pub listings: Arc<dyn ListingStore>,
    pub users: Arc<dyn UserStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Platform {
    pub fn in_memory(tokens: TokenIssuer, passwords: Passwords) -> Self {
        Self {
            listings: Arc::new(memory::MemoryListings::default()),
            users: Arc::new(memory::MemoryUsers::default()),
            identity: Arc::new(memory::MemoryIdentity::new(tokens, passwords)),
        }
    }

    pub fn postgres(database_url: &str, tokens: TokenIssuer, passwords: Passwords) -> Self {
        Self {
            listings: Arc::new(postgres::PgListings::new(database_url)),
            users: Arc::new(postgres::PgUsers::new(database_url)),
            identity: Arc::new(postgres::PgIdentity::new(database_url, tokens, passwords)),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let tokens = TokenIssuer::new(&config.jwt_secret, config.session_ttl_hours);
        let passwords = Passwords::with_cost(config.password_memory_kib, config.password_iterations)?;

        match &config.database_url {
            Some(url) => {
                postgres::check_connection(url).await?;
                log::info!("Using PostgreSQL platform");
                Ok(Self::postgres(url, tokens, passwords))
            }
            None => {
                log::warn!("DATABASE_URL not set, data will only live in memory");
                Ok(Self::in_memory(tokens, passwords))
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_platform() -> Platform {
    let passwords = Passwords::with_cost(64, 1).expect("valid test cost");
    Platform::in_memory(TokenIssuer::new("test-secret", 24), passwords)
}
