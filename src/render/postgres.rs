//! PostgreSQL renderer
//!
//! Every migration becomes a pair of PL/pgSQL procedures,
//! `"<identifier>_prepare"()` and `"<identifier>_revert"()`. The batch
//! umbrella's procedures `CALL` the per-table ones.

use crate::batch::{BatchPlan, Invocation};
use crate::migration::{MigrationUnit, Operation};
use crate::schema::Field;

use super::{MigrationRenderer, Procedure, RenderedMigration};

const BODY_TAG: &str = "$migration$";

/// Renders PL/pgSQL migration procedures
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresRenderer;

impl PostgresRenderer {
    pub fn new() -> Self {
        Self
    }

    /// DDL statements for `ops` applied to `table`
    pub fn statements(&self, table: &str, ops: &[Operation]) -> Vec<String> {
        let mut statements = Vec::new();
        let mut pending: Vec<&Field> = Vec::new();

        for (i, op) in ops.iter().enumerate() {
            let creates_later = ops[i + 1..].contains(&Operation::CreateTable);

            match op {
                Operation::AddColumn { field } if creates_later => pending.push(field),
                Operation::DropColumn { field } if creates_later => {
                    pending.retain(|f| f.name != field.name);
                }
                Operation::AddColumn { field } => statements.push(Self::add_column_sql(table, field)),
                Operation::DropColumn { field } => {
                    statements.push(Self::drop_column_sql(table, &field.name))
                }
                Operation::AlterColumn { from, to } => {
                    statements.extend(Self::alter_column_sql(table, from, to))
                }
                Operation::CreateTable => {
                    statements.push(Self::create_table_sql(table, &pending));
                    pending.clear();
                }
                Operation::DropTable => statements.push(format!("DROP TABLE {};", quote(table))),
            }
        }

        statements
    }

    fn column_definition(field: &Field, inline_primary_key: bool) -> String {
        let mut def = format!("{} {}", quote(&field.name), field.data_type);
        if inline_primary_key && field.primary_key {
            def.push_str(" PRIMARY KEY");
        } else if !field.nullable {
            def.push_str(" NOT NULL");
        }
        if field.unique && !field.primary_key {
            def.push_str(" UNIQUE");
        }
        if let Some(ref default) = field.default_value {
            def.push_str(&format!(" DEFAULT {}", default));
        }
        def
    }

    fn create_table_sql(table: &str, columns: &[&Field]) -> String {
        let primary_key: Vec<String> = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| quote(&c.name))
            .collect();

        let mut lines: Vec<String> = columns
            .iter()
            .map(|c| format!("    {}", Self::column_definition(c, false)))
            .collect();
        if !primary_key.is_empty() {
            lines.push(format!("    PRIMARY KEY ({})", primary_key.join(", ")));
        }

        if lines.is_empty() {
            return format!("CREATE TABLE {} ();", quote(table));
        }
        format!("CREATE TABLE {} (\n{}\n);", quote(table), lines.join(",\n"))
    }

    fn add_column_sql(table: &str, field: &Field) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {};",
            quote(table),
            Self::column_definition(field, true)
        )
    }

    fn drop_column_sql(table: &str, column: &str) -> String {
        format!("ALTER TABLE {} DROP COLUMN {};", quote(table), quote(column))
    }

    fn alter_column_sql(table: &str, from: &Field, to: &Field) -> Vec<String> {
        let table_ident = quote(table);
        let column = quote(&to.name);
        let mut statements = Vec::new();

        // Constraints go first so type and nullability changes are not blocked by them.
        if from.primary_key && !to.primary_key {
            statements.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                table_ident,
                quote(&format!("{}_pkey", table))
            ));
        }
        if unique_constraint(from) && !unique_constraint(to) {
            statements.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                table_ident,
                quote(&format!("{}_{}_key", table, to.name))
            ));
        }

        if from.data_type != to.data_type {
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                table_ident, column, to.data_type, column, to.data_type
            ));
        }

        if from.nullable != to.nullable {
            let action = if to.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
            statements.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {};",
                table_ident, column, action
            ));
        }

        if from.default_value != to.default_value {
            statements.push(match to.default_value {
                Some(ref default) => format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    table_ident, column, default
                ),
                None => format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    table_ident, column
                ),
            });
        }

        if unique_constraint(to) && !unique_constraint(from) {
            statements.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
                table_ident,
                quote(&format!("{}_{}_key", table, to.name)),
                column
            ));
        }
        if to.primary_key && !from.primary_key {
            statements.push(format!("ALTER TABLE {} ADD PRIMARY KEY ({});", table_ident, column));
        }

        statements
    }

    fn procedure(identifier: &str, procedure: Procedure, statements: &[String]) -> String {
        let body = if statements.is_empty() {
            "    NULL;".to_string()
        } else {
            statements
                .iter()
                .map(|s| indent(s))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "CREATE OR REPLACE PROCEDURE {}()\nLANGUAGE plpgsql\nAS {tag}\nBEGIN\n{}\nEND;\n{tag};\n",
            quote(&procedure_name(identifier, procedure)),
            body,
            tag = BODY_TAG,
        )
    }

    fn call(invocation: &Invocation) -> String {
        format!(
            "CALL {}();",
            quote(&procedure_name(&invocation.identifier, invocation.procedure))
        )
    }
}

impl MigrationRenderer for PostgresRenderer {
    fn extension(&self) -> &'static str {
        "sql"
    }

    fn render_unit(&self, unit: &MigrationUnit, batch: u32) -> RenderedMigration {
        let identifier = unit.identifier(batch);
        let prepare = self.statements(&unit.table, unit.upgrade.as_slice());
        let revert = self.statements(&unit.table, unit.downgrade.as_slice());

        let content = format!(
            "-- Automatically generated migration for {}\n-- Edit if needed\n\n{}\n{}",
            unit.table,
            Self::procedure(&identifier, Procedure::Prepare, &prepare),
            Self::procedure(&identifier, Procedure::Revert, &revert),
        );

        RenderedMigration::new(&unit.table, identifier, content)
    }

    fn render_batch(&self, plan: &BatchPlan) -> RenderedMigration {
        let prepare: Vec<String> = plan.upgrade.iter().map(Self::call).collect();
        let revert: Vec<String> = plan.downgrade.iter().map(Self::call).collect();

        let content = format!(
            "-- Automatically generated migrations for {}\n-- Edit if needed\n\n{}\n{}\n-- END {}\n",
            plan.name,
            Self::procedure(&plan.identifier, Procedure::Prepare, &prepare),
            Self::procedure(&plan.identifier, Procedure::Revert, &revert),
            plan.name,
        );

        RenderedMigration::new(&plan.name, &plan.identifier, content)
    }
}

/// A primary key already implies uniqueness, so `UNIQUE` is only rendered
/// as its own constraint for non-key columns.
fn unique_constraint(field: &Field) -> bool {
    field.unique && !field.primary_key
}

/// `<identifier>_<procedure>`
pub(crate) fn procedure_name(identifier: &str, procedure: Procedure) -> String {
    format!("{}_{}", identifier, procedure.as_str())
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn indent(statement: &str) -> String {
    statement
        .lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
