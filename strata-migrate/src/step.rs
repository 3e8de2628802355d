//! Delta steps: idempotent, guarded structural changes.
//!
//! A step names its targets by their current (logical) names. Steps whose
//! targets are rename-aware expand into one guarded operation per candidate
//! name reported by the [`RenameResolver`].

use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;
use crate::quote::Identifier;
use crate::rename::RenameResolver;
use crate::sql::{Dialect, GuardedOp, GuardedStatement};

/// Column types the engine knows how to spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Variable-length text.
    Text,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Boolean.
    Boolean,
    /// Timestamp with time zone.
    Timestamptz,
}

/// A column default. Text is always emitted as a quoted literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// String literal.
    Text(String),
    /// Integer literal.
    Integer(i64),
    /// Boolean literal.
    Boolean(bool),
    /// The current transaction timestamp.
    Now,
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: Identifier,
    /// Column type.
    pub ty: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default value.
    pub default: Option<DefaultValue>,
}

impl ColumnDef {
    /// Create a nullable column without a default.
    pub fn new(name: impl Into<Identifier>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            default: None,
        }
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// An index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: Identifier,
    /// Indexed table.
    pub table: Identifier,
    /// Indexed columns, in order.
    pub columns: Vec<Identifier>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexDef {
    /// Create a non-unique index.
    pub fn new<I, C>(name: impl Into<Identifier>, table: impl Into<Identifier>, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Identifier>,
    {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Create a unique index.
    pub fn unique<I, C>(name: impl Into<Identifier>, table: impl Into<Identifier>, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Identifier>,
    {
        Self {
            unique: true,
            ..Self::new(name, table, columns)
        }
    }
}

/// A table targeted by a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Current table name.
    pub name: Identifier,
    /// Whether to also target the table's historical names.
    pub rename_aware: bool,
}

impl TableRef {
    /// Target the table by its current name only.
    pub fn exact(name: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            rename_aware: false,
        }
    }

    /// Target the table under its current and every historical name.
    pub fn rename_aware(name: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            rename_aware: true,
        }
    }

    /// Physical names to try, current name first.
    pub fn candidates(&self, resolver: &RenameResolver) -> Vec<Identifier> {
        if self.rename_aware {
            resolver.aliases_of(&self.name)
        } else {
            vec![self.name.clone()]
        }
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        Self::exact(name)
    }
}

/// A constraint targeted by a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintRef {
    /// A constraint with a fixed name.
    Named(Identifier),
    /// The implicit primary key, named `<table>_pkey` after whatever name
    /// the table had when the key was created.
    PrimaryKey,
}

/// One idempotent structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaStep {
    /// Create a table unless it exists.
    CreateTableIfMissing {
        /// Table name.
        table: Identifier,
        /// Column definitions.
        columns: Vec<ColumnDef>,
        /// Primary key columns.
        primary_key: Vec<Identifier>,
    },
    /// Add a column to every listed table that lacks it.
    AddColumnIfMissing {
        /// Target tables, in order.
        tables: Vec<TableRef>,
        /// Column to add.
        column: ColumnDef,
    },
    /// Drop a column from every listed table that has it.
    DropColumnIfPresent {
        /// Target tables, in order.
        tables: Vec<TableRef>,
        /// Column to drop.
        column: Identifier,
    },
    /// Drop a constraint from every listed table that has it.
    DropConstraintIfPresent {
        /// Target tables, in order.
        tables: Vec<TableRef>,
        /// Constraint to drop.
        constraint: ConstraintRef,
    },
    /// Rename a table that still has its old name.
    RenameTableIfPresent {
        /// Old name.
        from: Identifier,
        /// New name.
        to: Identifier,
    },
    /// Create an index unless it exists.
    CreateIndexIfMissing(IndexDef),
    /// Drop an index if it exists.
    DropIndexIfPresent(Identifier),
}

impl DeltaStep {
    /// Add `column` to each of `tables`.
    pub fn add_column<I, T>(tables: I, column: ColumnDef) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TableRef>,
    {
        Self::AddColumnIfMissing {
            tables: tables.into_iter().map(Into::into).collect(),
            column,
        }
    }

    /// Drop `column` from each of `tables`.
    pub fn drop_column<I, T>(tables: I, column: impl Into<Identifier>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TableRef>,
    {
        Self::DropColumnIfPresent {
            tables: tables.into_iter().map(Into::into).collect(),
            column: column.into(),
        }
    }

    /// Drop the primary key of each of `tables`, under any historical name.
    pub fn drop_primary_key<I, T>(tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TableRef>,
    {
        Self::DropConstraintIfPresent {
            tables: tables.into_iter().map(Into::into).collect(),
            constraint: ConstraintRef::PrimaryKey,
        }
    }

    /// Short operation name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTableIfMissing { .. } => "create_table_if_missing",
            Self::AddColumnIfMissing { .. } => "add_column_if_missing",
            Self::DropColumnIfPresent { .. } => "drop_column_if_present",
            Self::DropConstraintIfPresent { .. } => "drop_constraint_if_present",
            Self::RenameTableIfPresent { .. } => "rename_table_if_present",
            Self::CreateIndexIfMissing(_) => "create_index_if_missing",
            Self::DropIndexIfPresent(_) => "drop_index_if_present",
        }
    }

    /// Expand this step into single-target guarded operations.
    pub fn operations(&self, resolver: &RenameResolver) -> Vec<GuardedOp> {
        match self {
            Self::CreateTableIfMissing {
                table,
                columns,
                primary_key,
            } => vec![GuardedOp::CreateTable {
                table: table.clone(),
                columns: columns.clone(),
                primary_key: primary_key.clone(),
            }],
            Self::AddColumnIfMissing { tables, column } => tables
                .iter()
                .flat_map(|t| t.candidates(resolver))
                .map(|table| GuardedOp::AddColumn {
                    table,
                    column: column.clone(),
                })
                .collect(),
            Self::DropColumnIfPresent { tables, column } => tables
                .iter()
                .flat_map(|t| t.candidates(resolver))
                .map(|table| GuardedOp::DropColumn {
                    table,
                    column: column.clone(),
                })
                .collect(),
            Self::DropConstraintIfPresent { tables, constraint } => {
                let mut ops = Vec::new();
                for table_ref in tables {
                    let candidates = table_ref.candidates(resolver);
                    for table in &candidates {
                        match constraint {
                            ConstraintRef::Named(name) => ops.push(GuardedOp::DropConstraint {
                                table: table.clone(),
                                constraint: name.clone(),
                            }),
                            // A renamed table keeps the key named after its old name.
                            ConstraintRef::PrimaryKey => {
                                ops.extend(candidates.iter().map(|owner| {
                                    GuardedOp::DropConstraint {
                                        table: table.clone(),
                                        constraint: owner.derived("pkey"),
                                    }
                                }))
                            }
                        }
                    }
                }
                ops
            }
            Self::RenameTableIfPresent { from, to } => vec![GuardedOp::RenameTable {
                from: from.clone(),
                to: to.clone(),
            }],
            Self::CreateIndexIfMissing(index) => vec![GuardedOp::CreateIndex {
                index: index.clone(),
            }],
            Self::DropIndexIfPresent(index) => vec![GuardedOp::DropIndex {
                index: index.clone(),
            }],
        }
    }

    /// Render this step as guarded statements for `dialect`.
    pub fn render(
        &self,
        step: usize,
        dialect: &dyn Dialect,
        resolver: &RenameResolver,
    ) -> Vec<GuardedStatement> {
        self.operations(resolver)
            .into_iter()
            .map(|op| GuardedStatement {
                step,
                sql: dialect.render(&op),
                op,
            })
            .collect()
    }

    /// Every identifier this step embeds, for validation.
    pub fn identifiers(&self) -> Vec<&Identifier> {
        let mut out = Vec::new();
        match self {
            Self::CreateTableIfMissing {
                table,
                columns,
                primary_key,
            } => {
                out.push(table);
                out.extend(columns.iter().map(|c| &c.name));
                out.extend(primary_key.iter());
            }
            Self::AddColumnIfMissing { tables, column } => {
                out.extend(tables.iter().map(|t| &t.name));
                out.push(&column.name);
            }
            Self::DropColumnIfPresent { tables, column } => {
                out.extend(tables.iter().map(|t| &t.name));
                out.push(column);
            }
            Self::DropConstraintIfPresent { tables, constraint } => {
                out.extend(tables.iter().map(|t| &t.name));
                if let ConstraintRef::Named(name) = constraint {
                    out.push(name);
                }
            }
            Self::RenameTableIfPresent { from, to } => {
                out.push(from);
                out.push(to);
            }
            Self::CreateIndexIfMissing(index) => {
                out.push(&index.name);
                out.push(&index.table);
                out.extend(index.columns.iter());
            }
            Self::DropIndexIfPresent(index) => out.push(index),
        }
        out
    }

    /// Validate every identifier this step embeds.
    pub fn validate(&self) -> MigrateResult<()> {
        self.identifiers().into_iter().try_for_each(Identifier::validate)
    }
}
