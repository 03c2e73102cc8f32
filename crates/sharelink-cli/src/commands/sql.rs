//! Print the provisioning script.

use crate::output::{self, OutputFormat};
use sharelink_core::error::AppError;
use sharelink_database::schema::definition::{self, Statement};

/// Execute the sql command
pub fn execute(format: OutputFormat) -> Result<(), AppError> {
    let statements = definition::provisioning_script();

    match format {
        OutputFormat::Table => print!("{}", render_script(&statements)),
        OutputFormat::Json => output::print_json(&statements),
    }

    Ok(())
}

/// Render statements as a psql-ready script that can be applied repeatedly.
fn render_script(statements: &[Statement]) -> String {
    let mut script = String::from("BEGIN;\n\n");
    for statement in statements {
        script.push_str(&format!("-- {}\n{};\n\n", statement.label, statement.sql));
    }
    script.push_str("COMMIT;\n");
    script
}
