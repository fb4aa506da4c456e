use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use uuid::Uuid;

use super::{IdentityProvider, ListingQuery, ListingStore, UserStore};
use crate::auth::{check_password_strength, normalize_email, Passwords, TokenIssuer};
use crate::db::with_connection;
use crate::error::{AppError, Result};
use crate::models::{Geolocation, Listing, ListingRecord, NewUser, Session, UserRecord};
use crate::schema::{accounts, listings, sessions, users};

pub async fn check_connection(database_url: &str) -> Result<()> {
    let result: i32 = with_connection(database_url, |conn| {
        Ok(diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1")).get_result::<i32>(conn)?)
    })
    .await?;
    log::info!("Database test query result: {}", result);
    Ok(())
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = listings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ListingRow {
    id: String,
    name: String,
    category: String,
    user_ref: Option<String>,
    bedrooms: i16,
    bathrooms: i16,
    parking: bool,
    furnished: bool,
    offer: bool,
    regular_price: i64,
    discounted_price: Option<i64>,
    location: String,
    image_urls: Vec<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: i64,
}

impl From<ListingRow> for ListingRecord {
    fn from(row: ListingRow) -> Self {
        let geolocation = match (row.latitude, row.longitude) {
            (Some(lat), Some(lng)) => Some(Geolocation { lat, lng }),
            _ => None,
        };
        ListingRecord {
            id: row.id,
            data: Listing {
                name: row.name,
                category: row.category,
                user_ref: row.user_ref,
                bedrooms: row.bedrooms,
                bathrooms: row.bathrooms,
                parking: row.parking,
                furnished: row.furnished,
                offer: row.offer,
                regular_price: row.regular_price,
                discounted_price: row.discounted_price,
                location: row.location,
                image_urls: row.image_urls,
                geolocation,
                timestamp: row.created_at,
            },
        }
    }
}

impl From<ListingRecord> for ListingRow {
    fn from(record: ListingRecord) -> Self {
        let listing = record.data;
        ListingRow {
            id: record.id,
            name: listing.name,
            category: listing.category,
            user_ref: listing.user_ref,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            parking: listing.parking,
            furnished: listing.furnished,
            offer: listing.offer,
            regular_price: listing.regular_price,
            discounted_price: listing.discounted_price,
            location: listing.location,
            image_urls: listing.image_urls,
            latitude: listing.geolocation.as_ref().map(|g| g.lat),
            longitude: listing.geolocation.as_ref().map(|g| g.lng),
            created_at: listing.timestamp,
        }
    }
}

pub struct PgListings {
    database_url: String,
}

impl PgListings {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
        }
    }
}

/// One page of a category, newest first, resuming strictly after the cursor.
fn listing_page(query: ListingQuery) -> listings::BoxedQuery<'static, Pg> {
    let mut statement = listings::table
        .filter(listings::category.eq(query.category))
        .into_boxed();

    if let Some(cursor) = query.start_after {
        statement = statement.filter(
            listings::created_at.lt(cursor.timestamp).or(listings::created_at
                .eq(cursor.timestamp)
                .and(listings::id.lt(cursor.id))),
        );
    }

    statement
        .order((listings::created_at.desc(), listings::id.desc()))
        .limit(query.limit as i64)
}

#[async_trait]
impl ListingStore for PgListings {
    async fn query(&self, query: &ListingQuery) -> Result<Vec<ListingRecord>> {
        let query = query.clone();
        with_connection(&self.database_url, move |conn| {
            let rows = listing_page(query).load::<ListingRow>(conn)?;
            Ok(rows.into_iter().map(ListingRecord::from).collect())
        })
        .await
    }

    async fn insert(&self, record: ListingRecord) -> Result<()> {
        let row = ListingRow::from(record);
        with_connection(&self.database_url, move |conn| {
            diesel::insert_into(listings::table)
                .values(&row)
                .on_conflict(listings::id)
                .do_nothing()
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct UserRow {
    id: String,
    name: String,
    email: String,
    created_at: i64,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            name: row.name,
            email: row.email,
            timestamp: row.created_at,
        }
    }
}

pub struct PgUsers {
    database_url: String,
}

impl PgUsers {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
        }
    }
}

#[async_trait]
impl UserStore for PgUsers {
    async fn get(&self, uid: &str) -> Result<Option<UserRecord>> {
        let uid = uid.to_string();
        with_connection(&self.database_url, move |conn| {
            let row = users::table
                .find(uid)
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()?;
            Ok(row.map(UserRecord::from))
        })
        .await
    }

    async fn create(&self, uid: &str, user: NewUser) -> Result<UserRecord> {
        let row = UserRow {
            id: uid.to_string(),
            name: user.name,
            email: user.email,
            created_at: Utc::now().timestamp_millis(),
        };
        with_connection(&self.database_url, move |conn| {
            diesel::insert_into(users::table)
                .values(&row)
                .on_conflict(users::id)
                .do_update()
                .set((
                    users::name.eq(&row.name),
                    users::email.eq(&row.email),
                    users::created_at.eq(row.created_at),
                ))
                .execute(conn)?;
            Ok(UserRecord::from(row))
        })
        .await
    }

    async fn update_name(&self, uid: &str, name: &str) -> Result<()> {
        let uid = uid.to_string();
        let name = name.to_string();
        with_connection(&self.database_url, move |conn| {
            let updated = diesel::update(users::table.find(&uid))
                .set(users::name.eq(&name))
                .execute(conn)?;
            if updated == 0 {
                return Err(AppError::NotFound(format!("user {}", uid)));
            }
            Ok(())
        })
        .await
    }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct AccountRow {
    uid: String,
    email: String,
    password_hash: String,
    display_name: Option<String>,
    created_at: i64,
}

fn open_session(conn: &mut PgConnection, tokens: &TokenIssuer, account: AccountRow) -> Result<Session> {
    let (sid, token) = tokens.create_token(&account.uid)?;
    diesel::insert_into(sessions::table)
        .values((
            sessions::sid.eq(&sid),
            sessions::uid.eq(&account.uid),
            sessions::created_at.eq(Utc::now().timestamp_millis()),
        ))
        .execute(conn)?;

    Ok(Session {
        uid: account.uid,
        session_id: sid,
        token,
        display_name: account.display_name,
        email: account.email,
    })
}

pub struct PgIdentity {
    database_url: String,
    tokens: TokenIssuer,
    passwords: Passwords,
}

impl PgIdentity {
    pub fn new(database_url: &str, tokens: TokenIssuer, passwords: Passwords) -> Self {
        Self {
            database_url: database_url.to_string(),
            tokens,
            passwords,
        }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email).map_err(|_| AppError::InvalidCredentials)?;
        let password = password.to_string();
        let tokens = self.tokens.clone();
        let passwords = self.passwords.clone();

        with_connection(&self.database_url, move |conn| {
            let account = accounts::table
                .filter(accounts::email.eq(&email))
                .select(AccountRow::as_select())
                .first::<AccountRow>(conn)
                .optional()?
                .ok_or(AppError::InvalidCredentials)?;

            if !passwords.verify(&password, &account.password_hash)? {
                return Err(AppError::InvalidCredentials);
            }
            open_session(conn, &tokens, account)
        })
        .await
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        check_password_strength(password)?;
        let passwords = self.passwords.clone();
        let password = password.to_string();
        let tokens = self.tokens.clone();

        with_connection(&self.database_url, move |conn| {
            let account = AccountRow {
                uid: Uuid::new_v4().simple().to_string(),
                email,
                password_hash: passwords.hash(&password)?,
                display_name: None,
                created_at: Utc::now().timestamp_millis(),
            };
            diesel::insert_into(accounts::table)
                .values(&account)
                .execute(conn)
                .map_err(|e| match e {
                    diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        AppError::EmailInUse
                    }
                    e => e.into(),
                })?;
            open_session(conn, &tokens, account)
        })
        .await
    }

    async fn update_display_name(&self, session: &Session, name: &str) -> Result<()> {
        let uid = session.uid.clone();
        let name = name.to_string();
        with_connection(&self.database_url, move |conn| {
            let updated = diesel::update(accounts::table.find(&uid))
                .set(accounts::display_name.eq(Some(name)))
                .execute(conn)?;
            if updated == 0 {
                return Err(AppError::NotFound(format!("account {}", uid)));
            }
            Ok(())
        })
        .await
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let sid = session.session_id.clone();
        with_connection(&self.database_url, move |conn| {
            diesel::delete(sessions::table.find(sid)).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn current_session(&self, token: &str) -> Result<Session> {
        let claims = self
            .tokens
            .validate_token(token)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        let token = token.to_string();

        with_connection(&self.database_url, move |conn| {
            let live = sessions::table
                .find(&claims.sid)
                .filter(sessions::uid.eq(&claims.sub))
                .select(sessions::sid)
                .first::<String>(conn)
                .optional()?;
            if live.is_none() {
                return Err(AppError::Unauthorized("Session has ended".to_string()));
            }

            let account = accounts::table
                .find(&claims.sub)
                .select(AccountRow::as_select())
                .first::<AccountRow>(conn)
                .optional()?
                .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

            Ok(Session {
                uid: account.uid,
                session_id: claims.sid,
                token,
                display_name: account.display_name,
                email: account.email,
            })
        })
        .await
    }
}
