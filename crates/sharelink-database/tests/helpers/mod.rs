//! Shared helpers for database integration tests.
//!
//! Tests run against the database named by `TEST_DATABASE_URL` and are
//! skipped when it is unset. Every test drops `public.share_links` first, so
//! point it at a disposable database.

use sqlx::postgres::PgConnection;

use sharelink_core::config::{DatabaseConfig, SslMode};
use sharelink_database::connection;

/// Connect to the test database with a fresh, table-less schema.
pub async fn test_connection() -> Option<PgConnection> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };

    let config = DatabaseConfig {
        url: None,
        ssl_mode: SslMode::Prefer,
        connect_timeout_seconds: 10,
    };

    let mut conn = connection::connect(&url, &config)
        .await
        .expect("Failed to connect to test database");
    drop_table(&mut conn).await;
    Some(conn)
}

/// Drop the table together with its indexes and policies.
pub async fn drop_table(conn: &mut PgConnection) {
    sqlx::query("DROP TABLE IF EXISTS public.share_links CASCADE")
        .execute(conn)
        .await
        .expect("Failed to drop share_links");
}

/// Insert a link with only the required columns set.
pub async fn insert_link(conn: &mut PgConnection, slug: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO public.share_links (prompt_id, workspace_id, slug) VALUES ($1, $2, $3)",
    )
    .bind(uuid::Uuid::new_v4())
    .bind(uuid::Uuid::new_v4())
    .bind(slug)
    .execute(conn)
    .await
    .map(|_| ())
}
