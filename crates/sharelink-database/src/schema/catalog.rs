//! Reads the live `share_links` schema from the system catalogs and compares
//! it with [`definition`](super::definition).

use serde::Serialize;
use sqlx::FromRow;
use sqlx::postgres::PgConnection;
use tracing::{debug, info};

use sharelink_core::error::{AppError, ErrorKind};
use sharelink_core::result::AppResult;

use super::definition::{
    COLUMNS, INDEXES, POLICIES, PRIMARY_KEY, QUALIFIED_TABLE, SCHEMA, TABLE, UNIQUE_COLUMNS,
    normalize_predicate,
};

/// `pg_policies.permissive` for a permissive policy.
const PERMISSIVE: &str = "PERMISSIVE";

/// Role a policy without a `TO` clause applies to.
const PUBLIC_ROLE: &str = "public";

/// A column from `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Data type as named by `information_schema`.
    pub data_type: String,
    /// Whether `NULL` is allowed.
    pub nullable: bool,
    /// Default expression.
    pub column_default: Option<String>,
    /// Length limit of character types.
    pub max_length: Option<i32>,
}

/// An index from `pg_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// `CREATE INDEX` statement reconstructed by PostgreSQL.
    pub definition: String,
    /// Indexed columns, in key order. Empty for expression indexes.
    pub columns: Vec<String>,
    /// Unique and not partial.
    pub is_unique: bool,
    /// Backs the primary key.
    pub is_primary: bool,
}

impl IndexInfo {
    fn covers(&self, column: &str) -> bool {
        self.columns.len() == 1 && self.columns[0] == column
    }
}

/// A policy from `pg_policies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PolicyInfo {
    /// Policy name.
    pub name: String,
    /// `ALL`, `SELECT`, `INSERT`, `UPDATE` or `DELETE`.
    pub command: String,
    /// `PERMISSIVE` or `RESTRICTIVE`.
    pub permissive: String,
    /// Roles the policy applies to.
    pub roles: Vec<String>,
    /// `USING` expression.
    pub using_expr: Option<String>,
    /// `WITH CHECK` expression.
    pub with_check: Option<String>,
}

/// How serious a schema difference is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The schema does not match what provisioning creates.
    Error,
    /// Worth a look, but not a mismatch.
    Warning,
}

/// A difference between the live schema and the expected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    /// Severity.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

impl SchemaIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Snapshot of the live schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    /// Fully qualified table name.
    pub table: String,
    /// Whether the table exists.
    pub table_exists: bool,
    /// Whether row-level security is enabled.
    pub rls_enabled: bool,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnInfo>,
    /// Indexes, primary key and unique constraint included.
    pub indexes: Vec<IndexInfo>,
    /// Policies.
    pub policies: Vec<PolicyInfo>,
    /// Differences from the expected schema.
    pub issues: Vec<SchemaIssue>,
}

impl SchemaReport {
    /// `true` when no issue is an error.
    pub fn is_valid(&self) -> bool {
        self.issues
            .iter()
            .all(|issue| issue.severity != Severity::Error)
    }

    /// Look up a policy by name.
    pub fn policy(&self, name: &str) -> Option<&PolicyInfo> {
        self.policies.iter().find(|policy| policy.name == name)
    }

    /// Whether an index with this name exists.
    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|index| index.name == name)
    }
}

/// Read the catalogs and build a [`SchemaReport`].
pub async fn inspect(conn: &mut PgConnection) -> AppResult<SchemaReport> {
    let rls: Option<bool> = sqlx::query_scalar(
        "SELECT c.relrowsecurity FROM pg_class c \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind IN ('r', 'p')",
    )
    .bind(SCHEMA)
    .bind(TABLE)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| catalog_error("pg_class", e))?;

    let (columns, indexes, policies) = if rls.is_some() {
        (
            fetch_columns(conn).await?,
            fetch_indexes(conn).await?,
            fetch_policies(conn).await?,
        )
    } else {
        debug!(table = QUALIFIED_TABLE, "Table not found");
        (Vec::new(), Vec::new(), Vec::new())
    };

    let issues = find_issues(rls, &columns, &indexes, &policies);
    info!(
        table = QUALIFIED_TABLE,
        columns = columns.len(),
        indexes = indexes.len(),
        policies = policies.len(),
        issues = issues.len(),
        "Inspected schema"
    );

    Ok(SchemaReport {
        table: QUALIFIED_TABLE.to_string(),
        table_exists: rls.is_some(),
        rls_enabled: rls.unwrap_or(false),
        columns,
        indexes,
        policies,
        issues,
    })
}

async fn fetch_columns(conn: &mut PgConnection) -> AppResult<Vec<ColumnInfo>> {
    sqlx::query_as::<_, ColumnInfo>(
        "SELECT column_name::text AS name, data_type::text AS data_type, \
                (is_nullable = 'YES') AS nullable, column_default::text AS column_default, \
                character_maximum_length::int4 AS max_length \
         FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 \
         ORDER BY ordinal_position",
    )
    .bind(SCHEMA)
    .bind(TABLE)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| catalog_error("information_schema.columns", e))
}

async fn fetch_indexes(conn: &mut PgConnection) -> AppResult<Vec<IndexInfo>> {
    sqlx::query_as::<_, IndexInfo>(
        "SELECT i.relname::text AS name, pg_get_indexdef(i.oid) AS definition, \
                ARRAY(SELECT a.attname::text \
                      FROM unnest(x.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) \
                      JOIN pg_attribute a ON a.attrelid = x.indrelid AND a.attnum = k.attnum \
                      ORDER BY k.ord) AS columns, \
                (x.indisunique AND x.indpred IS NULL) AS is_unique, \
                x.indisprimary AS is_primary \
         FROM pg_index x \
         JOIN pg_class i ON i.oid = x.indexrelid \
         JOIN pg_class t ON t.oid = x.indrelid \
         JOIN pg_namespace n ON n.oid = t.relnamespace \
         WHERE n.nspname = $1 AND t.relname = $2 \
         ORDER BY i.relname",
    )
    .bind(SCHEMA)
    .bind(TABLE)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| catalog_error("pg_index", e))
}

async fn fetch_policies(conn: &mut PgConnection) -> AppResult<Vec<PolicyInfo>> {
    sqlx::query_as::<_, PolicyInfo>(
        "SELECT policyname::text AS name, cmd AS command, permissive, \
                roles::text[] AS roles, qual AS using_expr, with_check \
         FROM pg_policies \
         WHERE schemaname = $1 AND tablename = $2 \
         ORDER BY policyname",
    )
    .bind(SCHEMA)
    .bind(TABLE)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| catalog_error("pg_policies", e))
}

fn catalog_error(catalog: &str, e: sqlx::Error) -> AppError {
    AppError::with_source(
        ErrorKind::Database,
        format!("Failed to read {catalog}: {e}"),
        e,
    )
}

/// Compare catalog rows with the expected schema.
///
/// `rls` is `None` when the table does not exist.
pub fn find_issues(
    rls: Option<bool>,
    columns: &[ColumnInfo],
    indexes: &[IndexInfo],
    policies: &[PolicyInfo],
) -> Vec<SchemaIssue> {
    let Some(rls_enabled) = rls else {
        return vec![SchemaIssue::error(format!(
            "table {QUALIFIED_TABLE} does not exist"
        ))];
    };

    let mut issues = Vec::new();

    for expected in COLUMNS {
        let Some(actual) = columns.iter().find(|c| c.name == expected.name) else {
            issues.push(SchemaIssue::error(format!(
                "column {} is missing",
                expected.name
            )));
            continue;
        };
        if actual.data_type != expected.data_type {
            issues.push(SchemaIssue::error(format!(
                "column {} has type {}, expected {}",
                expected.name, actual.data_type, expected.data_type
            )));
        }
        if actual.nullable != expected.nullable {
            issues.push(SchemaIssue::error(format!(
                "column {} is {}, expected {}",
                expected.name,
                nullability(actual.nullable),
                nullability(expected.nullable)
            )));
        }
        if actual.column_default.as_deref() != expected.default {
            issues.push(SchemaIssue::warning(format!(
                "column {} defaults to {}, expected {}",
                expected.name,
                actual.column_default.as_deref().unwrap_or("nothing"),
                expected.default.unwrap_or("nothing")
            )));
        }
        if actual.max_length != expected.max_length {
            issues.push(SchemaIssue::error(format!(
                "column {} has length {}, expected {}",
                expected.name,
                length(actual.max_length),
                length(expected.max_length)
            )));
        }
    }

    for actual in columns {
        if !COLUMNS.iter().any(|c| c.name == actual.name) {
            issues.push(SchemaIssue::warning(format!(
                "unexpected column {}",
                actual.name
            )));
        }
    }

    if !rls_enabled {
        issues.push(SchemaIssue::error("row level security is disabled"));
    }

    if !indexes
        .iter()
        .any(|i| i.is_primary && i.covers(PRIMARY_KEY))
    {
        issues.push(SchemaIssue::error(format!(
            "column {PRIMARY_KEY} is not the primary key"
        )));
    }

    for column in UNIQUE_COLUMNS {
        if !indexes.iter().any(|i| i.is_unique && i.covers(column)) {
            issues.push(SchemaIssue::error(format!(
                "column {column} has no unique constraint"
            )));
        }
    }

    for expected in INDEXES {
        if !indexes.iter().any(|i| i.name == expected.name) {
            issues.push(SchemaIssue::error(format!(
                "index {} on {} is missing",
                expected.name, expected.column
            )));
        }
    }

    for expected in POLICIES {
        let Some(actual) = policies.iter().find(|p| p.name == expected.name) else {
            issues.push(SchemaIssue::error(format!(
                "policy {} is missing",
                expected.name
            )));
            continue;
        };
        if actual.command != expected.command.as_sql() {
            issues.push(SchemaIssue::error(format!(
                "policy {} applies to {}, expected {}",
                expected.name,
                actual.command,
                expected.command.as_sql()
            )));
        }
        if !same_predicate(actual.using_expr.as_deref(), Some(expected.rendered_using)) {
            issues.push(SchemaIssue::error(format!(
                "policy {} USING ({}) differs from ({})",
                expected.name,
                actual.using_expr.as_deref().unwrap_or(""),
                expected.using
            )));
        }
        if !same_predicate(actual.with_check.as_deref(), expected.rendered_with_check) {
            issues.push(SchemaIssue::error(format!(
                "policy {} WITH CHECK ({}) differs from ({})",
                expected.name,
                actual.with_check.as_deref().unwrap_or(""),
                expected.with_check.unwrap_or("")
            )));
        }
        if actual.permissive != PERMISSIVE {
            issues.push(SchemaIssue::warning(format!(
                "policy {} is {}, expected {PERMISSIVE}",
                expected.name, actual.permissive
            )));
        }
        if actual.roles != [PUBLIC_ROLE] {
            issues.push(SchemaIssue::warning(format!(
                "policy {} applies to roles {}, expected {PUBLIC_ROLE}",
                expected.name,
                actual.roles.join(", ")
            )));
        }
        if expected.is_unrestricted() {
            issues.push(SchemaIssue::warning(format!(
                "policy {} grants unrestricted access to every row",
                expected.name
            )));
        }
    }

    for actual in policies {
        if !POLICIES.iter().any(|p| p.name == actual.name) {
            issues.push(SchemaIssue::warning(format!(
                "unexpected policy {}",
                actual.name
            )));
        }
    }

    issues
}

fn same_predicate(actual: Option<&str>, expected: Option<&str>) -> bool {
    actual.map(normalize_predicate) == expected.map(normalize_predicate)
}

fn nullability(nullable: bool) -> &'static str {
    if nullable { "nullable" } else { "NOT NULL" }
}

fn length(max_length: Option<i32>) -> String {
    max_length.map_or_else(|| "unbounded".to_string(), |n| n.to_string())
}
