use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::error::Result;

pub fn establish_connection(database_url: &str) -> Result<PgConnection> {
    match PgConnection::establish(database_url) {
        Ok(conn) => {
            log::debug!("Database connection established");
            Ok(conn)
        }
        Err(e) => {
            log::error!("Failed to establish database connection: {}", e);
            Err(e.into())
        }
    }
}

/// Runs blocking diesel work off the async executor on a fresh connection.
pub async fn with_connection<T, F>(database_url: &str, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
{
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = establish_connection(&database_url)?;
        work(&mut conn)
    })
    .await?
}
