//! Applies the `share_links` schema inside one transaction.

use serde::Serialize;
use sqlx::postgres::{PgConnection, Postgres};
use sqlx::{Connection, Transaction};
use tracing::{debug, info, warn};

use sharelink_core::error::{AppError, ErrorKind};
use sharelink_core::result::AppResult;

use super::definition::{self, POLICIES, PolicySpec};
use super::verifier;

/// SQLSTATE `duplicate_object`, raised by `CREATE POLICY` on an existing name.
pub const DUPLICATE_OBJECT: &str = "42710";

/// What happened to one provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// An idempotent statement ran; it may or may not have changed anything.
    Applied,
    /// The object was created.
    Created,
    /// The object already existed and was left untouched.
    AlreadyExists,
}

/// Outcome of one statement.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Label of the statement.
    pub label: String,
    /// Result of running it.
    pub outcome: StepOutcome,
}

/// Result of a provisioning run.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    /// Steps in execution order.
    pub steps: Vec<StepReport>,
    /// Rows in the table after commit.
    pub row_count: i64,
}

impl ProvisionReport {
    /// Outcome of the step for the named policy.
    pub fn policy_outcome(&self, name: &str) -> Option<StepOutcome> {
        let label = format!("policy {name}");
        self.steps
            .iter()
            .find(|step| step.label == label)
            .map(|step| step.outcome)
    }
}

/// Create the table, indexes, RLS and policies, commit, then count rows.
///
/// `on_step` sees each step as soon as it completes, before the commit.
/// Any failure other than an existing policy drops the transaction, which
/// rolls back everything applied so far.
pub async fn apply(
    conn: &mut PgConnection,
    mut on_step: impl FnMut(&StepReport),
) -> AppResult<ProvisionReport> {
    let mut steps = Vec::new();
    let mut record = |step: StepReport| {
        on_step(&step);
        steps.push(step);
    };
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e))?;

    for statement in definition::idempotent_statements() {
        debug!(step = %statement.label, "Executing");
        sqlx::query(&statement.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to create {}: {e}", statement.label),
                    e,
                )
            })?;
        record(StepReport {
            label: statement.label,
            outcome: StepOutcome::Applied,
        });
    }

    for policy in POLICIES {
        let outcome = create_policy(&mut tx, policy).await?;
        record(StepReport {
            label: format!("policy {}", policy.name),
            outcome,
        });
    }

    tx.commit()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit schema", e))?;
    info!(table = definition::QUALIFIED_TABLE, "Schema committed");

    let row_count = verifier::count_rows(conn).await?;

    Ok(ProvisionReport { steps, row_count })
}

/// Create one policy under a savepoint.
///
/// A duplicate rolls back only the savepoint, so the enclosing transaction
/// stays usable for the statements that follow.
async fn create_policy(
    tx: &mut Transaction<'_, Postgres>,
    policy: &PolicySpec,
) -> AppResult<StepOutcome> {
    let mut savepoint = tx
        .begin()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create savepoint", e))?;

    match sqlx::query(&policy.create_sql())
        .execute(&mut *savepoint)
        .await
    {
        Ok(_) => {
            savepoint.commit().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to release savepoint", e)
            })?;
            info!(policy = policy.name, "Created policy");
            if policy.is_unrestricted() {
                warn!(
                    policy = policy.name,
                    "Policy permits every operation on every row"
                );
            }
            Ok(StepOutcome::Created)
        }
        Err(e) if is_duplicate_object(&e) => {
            savepoint.rollback().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to roll back savepoint", e)
            })?;
            info!(policy = policy.name, "Policy already exists, skipping");
            Ok(StepOutcome::AlreadyExists)
        }
        Err(e) => Err(AppError::with_source(
            ErrorKind::Database,
            format!("Failed to create policy {}: {e}", policy.name),
            e,
        )),
    }
}

/// Whether the error is PostgreSQL's `duplicate_object`.
pub fn is_duplicate_object(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == DUPLICATE_OBJECT)
}
