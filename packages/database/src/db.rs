//! Database connection utilities.

use switchy_database::Database;
use switchy_database_connection::Credentials;

/// Opens a `PostgreSQL` connection for the given URL.
///
/// Query parameters such as `?sslmode=require` are stripped before parsing;
/// TLS is negotiated by the native-tls connector.
///
/// # Errors
///
/// Returns an error if the URL cannot be parsed or the connection fails.
pub async fn connect(url: &str) -> Result<Box<dyn Database>, Box<dyn std::error::Error>> {
    let url_base = url.split('?').next().unwrap_or(url);

    let creds = Credentials::from_url(url_base)?;
    let db = switchy_database_connection::init_postgres_raw_native_tls(creds).await?;

    db.exec_raw("SET statement_timeout = '60s'").await?;

    Ok(db)
}
