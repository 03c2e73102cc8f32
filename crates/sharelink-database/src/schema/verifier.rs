//! Post-provisioning smoke test.

use sqlx::postgres::PgConnection;
use tracing::info;

use sharelink_core::error::{AppError, ErrorKind};
use sharelink_core::result::AppResult;

/// Count rows in `public.share_links`, proving the table is reachable.
pub async fn count_rows(conn: &mut PgConnection) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM public.share_links")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to query share_links: {e}"),
                e,
            )
        })?;

    info!(rows = count, "Verified share_links table");
    Ok(count)
}
