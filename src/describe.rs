//! The analyzer's output shape.
//!
//! A [`StatementDescription`] is the full static description of one DML
//! statement: its ordered input parameters and its output columns, each with
//! a `pg_type` oid and a nullability bit, plus a row-cardinality
//! classification. The serialized form is the transport format consumed by
//! code emitters and by the test suite.

use serde::Serialize;

use crate::catalog::oid::Oid;

/// How many rows a correctly executing statement may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RowCount {
    Zero,
    One,
    ZeroOrOne,
    Many,
}

/// A named parameter or output column with its resolved type and nullability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedField {
    pub name: String,
    pub type_oid: Oid,
    pub nullable: bool,
}

impl NamedField {
    pub fn new(name: impl Into<String>, type_oid: Oid, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_oid,
            nullable,
        }
    }
}

/// The static description of a single analyzed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementDescription {
    /// The rewritten SQL (positional markers, placeholder names stripped).
    pub sql: String,
    pub row_count: RowCount,
    /// True for INSERT/UPDATE/DELETE without RETURNING: the statement
    /// produces an affected-row count instead of rows, and `columns` is
    /// empty.
    pub affected_row_count: bool,
    /// Input parameters in `$1, $2, ...` order.
    pub parameters: Vec<NamedField>,
    /// Output columns in select-list order.
    pub columns: Vec<NamedField>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::oid::INT4_OID;

    #[test]
    fn serializes_row_count_as_camel_case() {
        let description = StatementDescription {
            sql: "SELECT x FROM a WHERE id = $1 LIMIT 1".to_string(),
            row_count: RowCount::ZeroOrOne,
            affected_row_count: false,
            parameters: vec![NamedField::new("id", INT4_OID, false)],
            columns: vec![NamedField::new("x", INT4_OID, false)],
        };
        let value = serde_json::to_value(&description).unwrap();
        assert_eq!(value["row_count"], "zeroOrOne");
        assert_eq!(value["parameters"][0]["name"], "id");
        assert_eq!(value["columns"][0]["nullable"], false);
    }
}
