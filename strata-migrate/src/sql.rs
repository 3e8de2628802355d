//! SQL generation for guarded structural operations.
//!
//! A [`GuardedOp`] is a single-target structural change whose precondition
//! is checked by the database itself ("only if it does not already exist").
//! A [`Dialect`] turns it into backend syntax, routing every identifier
//! through the quoting utility.

use std::fmt;

use crate::quote::{quote_identifier, quote_literal, Identifier};
use crate::step::{ColumnDef, ColumnType, DefaultValue, IndexDef};

/// A single guarded structural operation on one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardedOp {
    /// Create a table unless it exists.
    CreateTable {
        /// Table name.
        table: Identifier,
        /// Column definitions, in order.
        columns: Vec<ColumnDef>,
        /// Primary key columns; empty for none.
        primary_key: Vec<Identifier>,
    },
    /// Add a column to a table unless the table is missing or already has it.
    AddColumn {
        /// Table name.
        table: Identifier,
        /// Column to add.
        column: ColumnDef,
    },
    /// Drop a column if both the table and the column exist.
    DropColumn {
        /// Table name.
        table: Identifier,
        /// Column to drop.
        column: Identifier,
    },
    /// Drop a constraint if both the table and the constraint exist.
    DropConstraint {
        /// Table name.
        table: Identifier,
        /// Constraint to drop.
        constraint: Identifier,
    },
    /// Rename a table if it exists under its old name.
    RenameTable {
        /// Old name.
        from: Identifier,
        /// New name.
        to: Identifier,
    },
    /// Create an index unless it exists.
    CreateIndex {
        /// Index definition.
        index: IndexDef,
    },
    /// Drop an index if it exists.
    DropIndex {
        /// Index name.
        index: Identifier,
    },
}

impl GuardedOp {
    /// Human-readable description of the entity this operation targets.
    pub fn target(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("table {}", quote_identifier(table.as_str())),
            Self::AddColumn { table, column } => format!(
                "column {} on {}",
                quote_identifier(column.name.as_str()),
                quote_identifier(table.as_str())
            ),
            Self::DropColumn { table, column } => format!(
                "column {} on {}",
                quote_identifier(column.as_str()),
                quote_identifier(table.as_str())
            ),
            Self::DropConstraint { table, constraint } => format!(
                "constraint {} on {}",
                quote_identifier(constraint.as_str()),
                quote_identifier(table.as_str())
            ),
            Self::RenameTable { from, to } => format!(
                "table {} (renaming to {})",
                quote_identifier(from.as_str()),
                quote_identifier(to.as_str())
            ),
            Self::CreateIndex { index } => format!(
                "index {} on {}",
                quote_identifier(index.name.as_str()),
                quote_identifier(index.table.as_str())
            ),
            Self::DropIndex { index } => format!("index {}", quote_identifier(index.as_str())),
        }
    }
}

/// A rendered guarded operation, tagged with the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedStatement {
    /// Zero-based index of the step within its migration unit.
    pub step: usize,
    /// The structural operation.
    pub op: GuardedOp,
    /// Backend SQL for the operation.
    pub sql: String,
}

impl fmt::Display for GuardedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Backend syntax for guarded operations.
pub trait Dialect: Send + Sync {
    /// Dialect name, for logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier.
    fn quote_identifier(&self, name: &Identifier) -> String;

    /// Quote a string literal.
    fn quote_literal(&self, value: &str) -> String;

    /// SQL spelling of a column type.
    fn column_type(&self, ty: ColumnType) -> &'static str;

    /// Render a guarded operation.
    fn render(&self, op: &GuardedOp) -> String;
}

/// SQL generator for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Generate a column definition.
    fn column_definition(&self, column: &ColumnDef) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.column_type(column.ty).to_string(),
        ];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_value(default)));
        }

        parts.join(" ")
    }

    fn default_value(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Text(s) => self.quote_literal(s),
            DefaultValue::Integer(n) => n.to_string(),
            DefaultValue::Boolean(true) => "TRUE".to_string(),
            DefaultValue::Boolean(false) => "FALSE".to_string(),
            DefaultValue::Now => "NOW()".to_string(),
        }
    }

    fn column_list(&self, columns: &[Identifier]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn create_table(
        &self,
        table: &Identifier,
        columns: &[ColumnDef],
        primary_key: &[Identifier],
    ) -> String {
        let mut defs: Vec<String> = columns
            .iter()
            .map(|c| format!("    {}", self.column_definition(c)))
            .collect();

        if !primary_key.is_empty() {
            defs.push(format!("    PRIMARY KEY ({})", self.column_list(primary_key)));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.quote_identifier(table),
            defs.join(",\n")
        )
    }

    fn create_index(&self, index: &IndexDef) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({});",
            unique,
            self.quote_identifier(&index.name),
            self.quote_identifier(&index.table),
            self.column_list(&index.columns)
        )
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, name: &Identifier) -> String {
        quote_identifier(name.as_str())
    }

    fn quote_literal(&self, value: &str) -> String {
        quote_literal(value)
    }

    fn column_type(&self, ty: ColumnType) -> &'static str {
        match ty {
            ColumnType::Text => "TEXT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamptz => "TIMESTAMPTZ",
        }
    }

    fn render(&self, op: &GuardedOp) -> String {
        match op {
            GuardedOp::CreateTable {
                table,
                columns,
                primary_key,
            } => self.create_table(table, columns, primary_key),
            GuardedOp::AddColumn { table, column } => format!(
                "ALTER TABLE IF EXISTS {} ADD COLUMN IF NOT EXISTS {};",
                self.quote_identifier(table),
                self.column_definition(column)
            ),
            GuardedOp::DropColumn { table, column } => format!(
                "ALTER TABLE IF EXISTS {} DROP COLUMN IF EXISTS {};",
                self.quote_identifier(table),
                self.quote_identifier(column)
            ),
            GuardedOp::DropConstraint { table, constraint } => format!(
                "ALTER TABLE IF EXISTS {} DROP CONSTRAINT IF EXISTS {};",
                self.quote_identifier(table),
                self.quote_identifier(constraint)
            ),
            GuardedOp::RenameTable { from, to } => format!(
                "ALTER TABLE IF EXISTS {} RENAME TO {};",
                self.quote_identifier(from),
                self.quote_identifier(to)
            ),
            GuardedOp::CreateIndex { index } => self.create_index(index),
            GuardedOp::DropIndex { index } => {
                format!("DROP INDEX IF EXISTS {};", self.quote_identifier(index))
            }
        }
    }
}
