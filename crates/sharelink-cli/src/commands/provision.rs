//! Provision the `share_links` table.

use crate::output::{self, OutputFormat};
use sharelink_core::config::ProvisionConfig;
use sharelink_core::error::AppError;
use sharelink_database::connection;
use sharelink_database::schema::definition::{POLICIES, TABLE};
use sharelink_database::schema::{self, StepOutcome, StepReport};

/// Execute the provision command
pub async fn execute(config: &ProvisionConfig, format: OutputFormat) -> Result<(), AppError> {
    let mut conn = super::connect(config).await?;

    let report = match format {
        OutputFormat::Table => {
            println!("Creating {} table...", TABLE);
            schema::apply(&mut conn, print_step).await?
        }
        OutputFormat::Json => schema::apply(&mut conn, |_| {}).await?,
    };
    connection::close(conn).await?;

    match format {
        OutputFormat::Table => {
            println!("SUCCESS: Table {} created successfully!", TABLE);
            println!("Table has {} records", report.row_count);
        }
        OutputFormat::Json => output::print_json(&report),
    }

    Ok(())
}

/// A progress line for one step.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Success(String),
    Warning(String),
}

fn print_step(step: &StepReport) {
    for line in step_lines(step) {
        match line {
            Line::Success(message) => output::print_success(&message),
            Line::Warning(message) => output::print_warning(&message),
        }
    }
}

fn step_lines(step: &StepReport) -> Vec<Line> {
    let policy = step.label.strip_prefix("policy ");
    match (step.outcome, policy) {
        (StepOutcome::Created, Some(name)) => {
            let mut lines = vec![Line::Success(format!("Created policy: {}", name))];
            if is_unrestricted(name) {
                lines.push(Line::Warning(format!(
                    "Policy {} allows every operation on every row; replace it before production use",
                    name
                )));
            }
            lines
        }
        (StepOutcome::AlreadyExists, Some(name)) => vec![Line::Warning(format!(
            "Policy {} already exists, skipping...",
            name
        ))],
        _ => vec![Line::Success(format!("Applied {}", step.label))],
    }
}

fn is_unrestricted(name: &str) -> bool {
    POLICIES
        .iter()
        .any(|policy| policy.name == name && policy.is_unrestricted())
}
