//! The schema snapshot.
//!
//! A [`Catalog`] is read from `pg_catalog` once per run and never mutated
//! afterwards: enum types with their ordered labels, the oid -> name type
//! mapping, and every user relation with its ordered columns and primary-key
//! membership. Inference resolves table and column names against this
//! snapshot; types themselves always come from the server's statement
//! description, so the snapshot only needs names, nullability, and defaults.

pub mod loader;
pub mod oid;

use std::collections::HashMap;
use std::fmt;

use oid::Oid;

pub use loader::load_catalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogError {
    pub message: String,
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CatalogError {}

impl From<tokio_postgres::Error> for CatalogError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// A user-defined enum type with its labels in sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgEnum {
    pub oid: Oid,
    pub name: String,
    pub labels: Vec<String>,
}

/// A row of `pg_type`, reduced to what emitters need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgType {
    pub oid: Oid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    type_oid: Oid,
    not_null: bool,
    has_default: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, type_oid: Oid, not_null: bool, has_default: bool) -> Self {
        Self {
            name: name.into(),
            type_oid,
            not_null,
            has_default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_oid(&self) -> Oid {
        self.type_oid
    }

    pub fn not_null(&self) -> bool {
        self.not_null
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    schema: String,
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
}

impl Table {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<Column>,
        primary_key: Vec<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns,
            primary_key,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary-key column names. Empty when the table has no primary key.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn is_primary_key_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|c| c == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: HashMap<Oid, PgType>,
    enums: Vec<PgEnum>,
    tables: HashMap<(String, String), Table>,
}

impl Catalog {
    pub fn new(types: Vec<PgType>, enums: Vec<PgEnum>, tables: Vec<Table>) -> Self {
        Self {
            types: types.into_iter().map(|t| (t.oid, t)).collect(),
            enums,
            tables: tables
                .into_iter()
                .map(|t| ((t.schema.clone(), t.name.clone()), t))
                .collect(),
        }
    }

    pub fn type_by_oid(&self, oid: Oid) -> Option<&PgType> {
        self.types.get(&oid)
    }

    pub fn enums(&self) -> &[PgEnum] {
        &self.enums
    }

    pub fn enum_by_oid(&self, oid: Oid) -> Option<&PgEnum> {
        self.enums.iter().find(|e| e.oid == oid)
    }

    /// Resolve a possibly schema-qualified table name. Unqualified names
    /// resolve against `public`, mirroring the default search path.
    pub fn resolve_table(&self, name: &[String]) -> Option<&Table> {
        match name {
            [table] => self.tables.get(&("public".to_string(), table.clone())),
            [schema, table] => self.tables.get(&(schema.clone(), table.clone())),
            _ => None,
        }
    }
}
