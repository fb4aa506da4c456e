use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{IdentityProvider, ListingQuery, ListingStore, UserStore};
use crate::auth::{check_password_strength, normalize_email, Passwords, TokenIssuer};
use crate::error::{AppError, Result};
use crate::models::{ListingRecord, NewUser, Session, UserRecord};

#[derive(Default)]
pub struct MemoryListings {
    listings: RwLock<HashMap<String, ListingRecord>>,
}

#[async_trait]
impl ListingStore for MemoryListings {
    async fn query(&self, query: &ListingQuery) -> Result<Vec<ListingRecord>> {
        let listings = self.listings.read().await;
        let mut page: Vec<ListingRecord> = listings
            .values()
            .filter(|record| record.data.category == query.category)
            .filter(|record| query.start_after.as_ref().map_or(true, |c| c.admits(record)))
            .cloned()
            .collect();

        page.sort_by(|a, b| (b.data.timestamp, &b.id).cmp(&(a.data.timestamp, &a.id)));
        page.truncate(query.limit);
        Ok(page)
    }

    async fn insert(&self, record: ListingRecord) -> Result<()> {
        self.listings
            .write()
            .await
            .entry(record.id.clone())
            .or_insert(record);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUsers {
    users: RwLock<HashMap<String, UserRecord>>,
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn get(&self, uid: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(uid).cloned())
    }

    async fn create(&self, uid: &str, user: NewUser) -> Result<UserRecord> {
        let record = UserRecord {
            name: user.name,
            email: user.email,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.users
            .write()
            .await
            .insert(uid.to_string(), record.clone());
        Ok(record)
    }

    async fn update_name(&self, uid: &str, name: &str) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(uid)
            .ok_or_else(|| AppError::NotFound(format!("user {}", uid)))?;
        user.name = name.to_string();
        Ok(())
    }
}

struct Account {
    email: String,
    password_hash: String,
    display_name: Option<String>,
}

#[derive(Default)]
struct Accounts {
    by_uid: HashMap<String, Account>,
    by_email: HashMap<String, String>,
    sessions: HashMap<String, String>, // sid -> uid
}

impl Accounts {
    fn session(&self, uid: &str, session_id: String, token: String) -> Result<Session> {
        let account = self
            .by_uid
            .get(uid)
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;
        Ok(Session {
            uid: uid.to_string(),
            session_id,
            token,
            display_name: account.display_name.clone(),
            email: account.email.clone(),
        })
    }
}

pub struct MemoryIdentity {
    tokens: TokenIssuer,
    passwords: Passwords,
    state: RwLock<Accounts>,
}

impl MemoryIdentity {
    pub fn new(tokens: TokenIssuer, passwords: Passwords) -> Self {
        Self {
            tokens,
            passwords,
            state: RwLock::new(Accounts::default()),
        }
    }

    async fn open_session(&self, uid: &str) -> Result<Session> {
        let (sid, token) = self.tokens.create_token(uid)?;
        let mut state = self.state.write().await;
        state.sessions.insert(sid.clone(), uid.to_string());
        state.session(uid, sid, token)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email).map_err(|_| AppError::InvalidCredentials)?;
        let (uid, password_hash) = {
            let state = self.state.read().await;
            let uid = state
                .by_email
                .get(&email)
                .ok_or(AppError::InvalidCredentials)?;
            let account = state.by_uid.get(uid).ok_or(AppError::InvalidCredentials)?;
            (uid.clone(), account.password_hash.clone())
        };

        let passwords = self.passwords.clone();
        let password = password.to_string();
        let verified =
            tokio::task::spawn_blocking(move || passwords.verify(&password, &password_hash)).await??;
        if !verified {
            return Err(AppError::InvalidCredentials);
        }
        self.open_session(&uid).await
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        check_password_strength(password)?;
        let passwords = self.passwords.clone();
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || passwords.hash(&password)).await??;
        let uid = Uuid::new_v4().simple().to_string();

        {
            let mut state = self.state.write().await;
            if state.by_email.contains_key(&email) {
                return Err(AppError::EmailInUse);
            }
            state.by_email.insert(email.clone(), uid.clone());
            state.by_uid.insert(
                uid.clone(),
                Account {
                    email,
                    password_hash,
                    display_name: None,
                },
            );
        }
        self.open_session(&uid).await
    }

    async fn update_display_name(&self, session: &Session, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .by_uid
            .get_mut(&session.uid)
            .ok_or_else(|| AppError::NotFound(format!("account {}", session.uid)))?;
        account.display_name = Some(name.to_string());
        Ok(())
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.state.write().await.sessions.remove(&session.session_id);
        Ok(())
    }

    async fn current_session(&self, token: &str) -> Result<Session> {
        let claims = self
            .tokens
            .validate_token(token)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let state = self.state.read().await;
        match state.sessions.get(&claims.sid) {
            Some(uid) if *uid == claims.sub => state.session(uid, claims.sid, token.to_string()),
            _ => Err(AppError::Unauthorized("Session has ended".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::listing;

    fn identity() -> MemoryIdentity {
        MemoryIdentity::new(
            TokenIssuer::new("test-secret", 24),
            Passwords::with_cost(64, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let store = MemoryListings::default();
        for (id, category, ts) in [("a", "rent", 1), ("b", "sale", 5), ("c", "rent", 3), ("d", "rent", 2)] {
            store.insert(listing(id, category, ts)).await.unwrap();
        }

        let page = store.query(&ListingQuery::new("rent", 2)).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "d"]);

        let rest = store
            .query(&ListingQuery::new("rent", 2).start_after(page[1].cursor()))
            .await
            .unwrap();
        let ids: Vec<_> = rest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a"]);
    }

    #[tokio::test]
    async fn equal_timestamps_page_without_skipping_or_repeating() {
        let store = MemoryListings::default();
        for id in ["a", "b", "c"] {
            store.insert(listing(id, "rent", 7)).await.unwrap();
        }

        let first = store.query(&ListingQuery::new("rent", 2)).await.unwrap();
        let second = store
            .query(&ListingQuery::new("rent", 2).start_after(first[1].cursor()))
            .await
            .unwrap();
        let ids: Vec<_> = first.iter().chain(&second).map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn update_name_requires_existing_document() {
        let users = MemoryUsers::default();
        let err = users.update_name("nobody", "Jane").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        users
            .create("u1", NewUser { name: "Jane".into(), email: "jane@example.com".into() })
            .await
            .unwrap();
        users.update_name("u1", "Janet").await.unwrap();
        assert_eq!(users.get("u1").await.unwrap().unwrap().name, "Janet");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let identity = identity();
        identity.create_account("jane@example.com", "secret1").await.unwrap();
        let err = identity
            .create_account("JANE@example.com", "secret2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailInUse));
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let identity = identity();
        let created = identity.create_account("jane@example.com", "secret1").await.unwrap();

        let session = identity.sign_in(" Jane@Example.com", "secret1").await.unwrap();
        assert_eq!(session.uid, created.uid);
        assert_ne!(session.session_id, created.session_id);

        let err = identity.sign_in("jane@example.com", "wrong!!").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        let err = identity.sign_in("nobody@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn password_checks_do_not_hold_the_executor() {
        let identity = std::sync::Arc::new(MemoryIdentity::new(
            TokenIssuer::new("test-secret", 24),
            Passwords::with_cost(16 * 1024, 4).unwrap(),
        ));
        identity.create_account("jane@example.com", "secret1").await.unwrap();

        let signing_in = {
            let identity = identity.clone();
            tokio::spawn(async move { identity.sign_in("jane@example.com", "secret1").await })
        };
        // One turn of the single-threaded runtime lets the task reach its blocking hash.
        tokio::task::yield_now().await;
        assert!(!signing_in.is_finished());
        assert!(signing_in.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn sign_out_ends_only_that_session() {
        let identity = identity();
        let first = identity.create_account("jane@example.com", "secret1").await.unwrap();
        let second = identity.sign_in("jane@example.com", "secret1").await.unwrap();

        identity.sign_out(&first).await.unwrap();
        assert!(matches!(
            identity.current_session(&first.token).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(identity.current_session(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn current_session_reflects_display_name() {
        let identity = identity();
        let session = identity.create_account("jane@example.com", "secret1").await.unwrap();
        assert_eq!(session.display_name, None);

        identity.update_display_name(&session, "Jane").await.unwrap();
        let current = identity.current_session(&session.token).await.unwrap();
        assert_eq!(current.display_name.as_deref(), Some("Jane"));
        assert_eq!(current.email, "jane@example.com");
    }
}
