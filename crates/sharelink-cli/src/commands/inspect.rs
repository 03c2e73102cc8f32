//! Inspect the live `share_links` schema.

use tabled::Tabled;

use crate::output::{self, OutputFormat};
use sharelink_core::config::ProvisionConfig;
use sharelink_core::error::AppError;
use sharelink_database::connection;
use sharelink_database::schema::catalog::{ColumnInfo, IndexInfo, PolicyInfo, SchemaIssue};
use sharelink_database::schema::{self, SchemaReport, Severity};

#[derive(Tabled)]
struct ColumnRow {
    #[tabled(rename = "Column")]
    name: String,
    #[tabled(rename = "Type")]
    data_type: String,
    #[tabled(rename = "Nullable")]
    nullable: bool,
    #[tabled(rename = "Default")]
    default: String,
}

impl From<&ColumnInfo> for ColumnRow {
    fn from(c: &ColumnInfo) -> Self {
        Self {
            name: c.name.clone(),
            data_type: match c.max_length {
                Some(n) => format!("{}({n})", c.data_type),
                None => c.data_type.clone(),
            },
            nullable: c.nullable,
            default: c.column_default.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct IndexRow {
    #[tabled(rename = "Index")]
    name: String,
    #[tabled(rename = "Unique")]
    unique: bool,
    #[tabled(rename = "Definition")]
    definition: String,
}

impl From<&IndexInfo> for IndexRow {
    fn from(i: &IndexInfo) -> Self {
        Self {
            name: i.name.clone(),
            unique: i.is_unique,
            definition: i.definition.clone(),
        }
    }
}

#[derive(Tabled)]
struct PolicyRow {
    #[tabled(rename = "Policy")]
    name: String,
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "Mode")]
    permissive: String,
    #[tabled(rename = "Roles")]
    roles: String,
    #[tabled(rename = "Using")]
    using_expr: String,
    #[tabled(rename = "With Check")]
    with_check: String,
}

impl From<&PolicyInfo> for PolicyRow {
    fn from(p: &PolicyInfo) -> Self {
        Self {
            name: p.name.clone(),
            command: p.command.clone(),
            permissive: p.permissive.clone(),
            roles: p.roles.join(", "),
            using_expr: p.using_expr.clone().unwrap_or_default(),
            with_check: p.with_check.clone().unwrap_or_default(),
        }
    }
}

/// Execute the inspect command
pub async fn execute(config: &ProvisionConfig, format: OutputFormat) -> Result<(), AppError> {
    let mut conn = super::connect(config).await?;
    let report = schema::inspect(&mut conn).await?;
    connection::close(conn).await?;

    match format {
        OutputFormat::Table => print_report(&report),
        OutputFormat::Json => output::print_json(&report),
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{} does not match the expected schema ({} error(s))",
            report.table,
            error_count(&report.issues)
        )))
    }
}

fn print_report(report: &SchemaReport) {
    println!("Schema of {}:", report.table);
    output::print_kv("Table exists", &report.table_exists.to_string());
    if !report.table_exists {
        print_issues(&report.issues);
        return;
    }
    output::print_kv("Row level security", enabled(report.rls_enabled));

    output::print_heading("Columns");
    let columns: Vec<ColumnRow> = report.columns.iter().map(ColumnRow::from).collect();
    output::print_table(&columns, "No columns");

    output::print_heading("Indexes");
    let indexes: Vec<IndexRow> = report.indexes.iter().map(IndexRow::from).collect();
    output::print_table(&indexes, "No indexes");

    output::print_heading("Policies");
    let policies: Vec<PolicyRow> = report.policies.iter().map(PolicyRow::from).collect();
    output::print_table(&policies, "No policies");

    println!();
    print_issues(&report.issues);
}

fn print_issues(issues: &[SchemaIssue]) {
    if issues.is_empty() {
        output::print_success("Schema matches");
        return;
    }
    for issue in issues {
        match issue.severity {
            Severity::Error => output::print_error(&issue.message),
            Severity::Warning => output::print_warning(&issue.message),
        }
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}

fn error_count(issues: &[SchemaIssue]) -> usize {
    issues
        .iter()
        .filter(|issue| issue.severity == Severity::Error)
        .count()
}
