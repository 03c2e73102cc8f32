//! The `share_links` schema as data: table DDL, indexes, RLS and policies.
//!
//! The applier executes these statements and the catalog inspector compares
//! the live database against the same definitions.

use serde::Serialize;

/// Schema holding the table.
pub const SCHEMA: &str = "public";

/// Table name.
pub const TABLE: &str = "share_links";

/// Fully qualified table name.
pub const QUALIFIED_TABLE: &str = "public.share_links";

/// `CREATE TABLE IF NOT EXISTS` for `public.share_links`.
pub const CREATE_TABLE_SQL: &str = r#"CREATE TABLE IF NOT EXISTS public.share_links (
    id UUID DEFAULT gen_random_uuid() PRIMARY KEY,
    prompt_id UUID NOT NULL,
    workspace_id UUID NOT NULL,
    slug VARCHAR(255) NOT NULL UNIQUE,
    password_hash TEXT,
    expires_at TIMESTAMP WITH TIME ZONE,
    max_views INTEGER,
    current_views INTEGER DEFAULT 0,
    allow_copying BOOLEAN DEFAULT true,
    show_variables BOOLEAN DEFAULT true,
    created_by UUID,
    created_at TIMESTAMP WITH TIME ZONE DEFAULT now(),
    last_accessed_at TIMESTAMP WITH TIME ZONE,
    is_active BOOLEAN DEFAULT true
)"#;

/// `ALTER TABLE ... ENABLE ROW LEVEL SECURITY`. A no-op when already enabled.
pub const ENABLE_RLS_SQL: &str = "ALTER TABLE public.share_links ENABLE ROW LEVEL SECURITY";

/// A column as reported by `information_schema.columns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: &'static str,
    /// `information_schema` data type name.
    pub data_type: &'static str,
    /// Whether the column accepts `NULL`.
    pub nullable: bool,
    /// Expected `column_default` text, if any.
    pub default: Option<&'static str>,
    /// `character_maximum_length` for bounded character types.
    pub max_length: Option<i32>,
}

/// Expected columns, in declaration order.
pub const COLUMNS: &[ColumnSpec] = &[
    column("id", "uuid", false, Some("gen_random_uuid()")),
    column("prompt_id", "uuid", false, None),
    column("workspace_id", "uuid", false, None),
    ColumnSpec {
        max_length: Some(255),
        ..column("slug", "character varying", false, None)
    },
    column("password_hash", "text", true, None),
    column("expires_at", "timestamp with time zone", true, None),
    column("max_views", "integer", true, None),
    column("current_views", "integer", true, Some("0")),
    column("allow_copying", "boolean", true, Some("true")),
    column("show_variables", "boolean", true, Some("true")),
    column("created_by", "uuid", true, None),
    column("created_at", "timestamp with time zone", true, Some("now()")),
    column("last_accessed_at", "timestamp with time zone", true, None),
    column("is_active", "boolean", true, Some("true")),
];

/// Primary key column.
pub const PRIMARY_KEY: &str = "id";

/// Columns carrying a single-column `UNIQUE` constraint.
pub const UNIQUE_COLUMNS: &[&str] = &["slug"];

const fn column(
    name: &'static str,
    data_type: &'static str,
    nullable: bool,
    default: Option<&'static str>,
) -> ColumnSpec {
    ColumnSpec {
        name,
        data_type,
        nullable,
        default,
        max_length: None,
    }
}

/// A single-column b-tree index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: &'static str,
    /// Indexed column.
    pub column: &'static str,
}

impl IndexSpec {
    /// `CREATE INDEX IF NOT EXISTS` statement.
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {QUALIFIED_TABLE}({})",
            self.name, self.column
        )
    }
}

/// Secondary indexes.
pub const INDEXES: &[IndexSpec] = &[
    IndexSpec {
        name: "idx_share_links_slug",
        column: "slug",
    },
    IndexSpec {
        name: "idx_share_links_prompt_id",
        column: "prompt_id",
    },
    IndexSpec {
        name: "idx_share_links_is_active",
        column: "is_active",
    },
];

/// Command a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyCommand {
    /// Every command.
    All,
    /// Reads only.
    Select,
}

impl PolicyCommand {
    /// SQL keyword, also the `cmd` value in `pg_policies`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Select => "SELECT",
        }
    }
}

/// A named row-level-security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicySpec {
    /// Policy name.
    pub name: &'static str,
    /// Command the policy governs.
    pub command: PolicyCommand,
    /// `USING` predicate.
    pub using: &'static str,
    /// `WITH CHECK` predicate.
    pub with_check: Option<&'static str>,
    /// `USING` as `pg_get_expr` renders it back from `pg_policies.qual`.
    pub rendered_using: &'static str,
    /// `WITH CHECK` as `pg_get_expr` renders it back.
    pub rendered_with_check: Option<&'static str>,
}

impl PolicySpec {
    /// `CREATE POLICY` statement. PostgreSQL has no `IF NOT EXISTS` form.
    pub fn create_sql(&self) -> String {
        let mut sql = format!(
            "CREATE POLICY {} ON {QUALIFIED_TABLE} FOR {} USING ({})",
            self.name,
            self.command.as_sql(),
            self.using
        );
        if let Some(check) = self.with_check {
            sql.push_str(&format!(" WITH CHECK ({check})"));
        }
        sql
    }

    /// `CREATE POLICY` inside a `DO` block that turns `duplicate_object`
    /// into a notice, so a hand-applied script can be run again.
    pub fn create_if_missing_sql(&self) -> String {
        format!(
            "DO $$\nBEGIN\n    {};\nEXCEPTION WHEN duplicate_object THEN\n    \
             RAISE NOTICE 'Policy {} already exists, skipping';\nEND\n$$",
            self.create_sql(),
            self.name
        )
    }

    /// Whether the policy lets every row through.
    pub fn is_unrestricted(&self) -> bool {
        normalize_predicate(self.rendered_using) == "true"
            && self
                .rendered_with_check
                .is_none_or(|check| normalize_predicate(check) == "true")
    }
}

/// Name of the placeholder policy that permits everything.
pub const MANAGE_POLICY: &str = "users_manage_share_links";

/// Name of the public read policy.
pub const VIEW_POLICY: &str = "anyone_view_active_share_links";

/// Policies, created in this order.
pub const POLICIES: &[PolicySpec] = &[
    PolicySpec {
        name: MANAGE_POLICY,
        command: PolicyCommand::All,
        using: "true",
        with_check: Some("true"),
        rendered_using: "true",
        rendered_with_check: Some("true"),
    },
    PolicySpec {
        name: VIEW_POLICY,
        command: PolicyCommand::Select,
        using: "is_active = true AND (expires_at IS NULL OR expires_at > now())",
        with_check: None,
        rendered_using: "((is_active = true) AND ((expires_at IS NULL) OR (expires_at > now())))",
        rendered_with_check: None,
    },
];

/// One step of the provisioning script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Short label used in progress output.
    pub label: String,
    /// SQL text.
    pub sql: String,
}

/// Statements that are idempotent on their own, in execution order: the
/// table, its indexes, and enabling RLS.
pub fn idempotent_statements() -> Vec<Statement> {
    let mut statements = vec![Statement {
        label: format!("table {TABLE}"),
        sql: CREATE_TABLE_SQL.to_string(),
    }];

    statements.extend(INDEXES.iter().map(|index| Statement {
        label: format!("index {}", index.name),
        sql: index.create_sql(),
    }));

    statements.push(Statement {
        label: "row level security".to_string(),
        sql: ENABLE_RLS_SQL.to_string(),
    });

    statements
}

/// The full provisioning script, policies included. Policies are wrapped
/// so the script can be applied more than once.
pub fn provisioning_script() -> Vec<Statement> {
    let mut statements = idempotent_statements();
    statements.extend(POLICIES.iter().map(|policy| Statement {
        label: format!("policy {}", policy.name),
        sql: policy.create_if_missing_sql(),
    }));
    statements
}

/// Reduce a policy predicate to a comparable form.
///
/// Whitespace runs collapse to one space and parentheses wrapping the whole
/// expression are dropped. Inner grouping is kept, so compare against the
/// `pg_get_expr` rendering rather than the source text.
pub fn normalize_predicate(expr: &str) -> String {
    let mut normalized = expr.split_whitespace().collect::<Vec<_>>().join(" ");
    while is_wrapped(&normalized) {
        normalized = normalized[1..normalized.len() - 1].trim().to_string();
    }
    normalized
}

/// Whether the opening parenthesis at the start closes at the very end.
fn is_wrapped(expr: &str) -> bool {
    if !expr.starts_with('(') || !expr.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == expr.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}
