//! Nullable parameter positions.
//!
//! Parameters are required inputs: generated wrappers never pass NULL for
//! them. When a parameter is fed directly into a nullable column — an
//! INSERT VALUES item or an UPDATE SET assignment — the server's view of
//! that parameter is "may be NULL", which contradicts the required-input
//! contract. Such statements are rejected outright instead of silently
//! treating the parameter as optional.

use crate::catalog::{Catalog, Table};
use crate::parser::ast::{
    Expression, InsertSource, InsertStatement, StatementKind, UpdateStatement, ValuesItem,
    WithQuery,
};

/// A parameter sitting in a position that admits NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullableParameter {
    /// 1-based positional index (`$n`).
    pub index: i32,
    /// The nullable target column the parameter is assigned to.
    pub column: String,
}

/// Find the first parameter assigned directly to a nullable column,
/// searching WITH bodies before the statement itself.
pub fn find_nullable_parameter(
    catalog: &Catalog,
    kind: &StatementKind,
) -> Option<NullableParameter> {
    match kind {
        StatementKind::Select(select) => scan_withs(catalog, &select.withs),
        StatementKind::Insert(insert) => {
            scan_withs(catalog, &insert.withs).or_else(|| scan_insert(catalog, insert))
        }
        StatementKind::Update(update) => {
            scan_withs(catalog, &update.withs).or_else(|| scan_update(catalog, update))
        }
        StatementKind::Delete(_) => None,
    }
}

fn scan_withs(catalog: &Catalog, withs: &[WithQuery]) -> Option<NullableParameter> {
    withs
        .iter()
        .find_map(|with_query| find_nullable_parameter(catalog, &with_query.statement))
}

fn scan_insert(catalog: &Catalog, insert: &InsertStatement) -> Option<NullableParameter> {
    let table = catalog.resolve_table(&insert.table.name)?;
    let InsertSource::Values(rows) = &insert.source else {
        return None;
    };
    for row in rows {
        for (position, item) in row.iter().enumerate() {
            let ValuesItem::Expr(Expression::Parameter(index)) = item else {
                continue;
            };
            // Without an explicit column list, VALUES items map to the
            // table's columns by ordinal.
            let column = if insert.columns.is_empty() {
                match table.columns().get(position) {
                    Some(column) => column.name().to_string(),
                    None => continue,
                }
            } else {
                match insert.columns.get(position) {
                    Some(name) => name.clone(),
                    None => continue,
                }
            };
            if column_is_nullable(table, &column) {
                return Some(NullableParameter {
                    index: *index,
                    column,
                });
            }
        }
    }
    None
}

fn scan_update(catalog: &Catalog, update: &UpdateStatement) -> Option<NullableParameter> {
    let table = catalog.resolve_table(&update.table.name)?;
    for assignment in &update.assignments {
        if let Expression::Parameter(index) = &assignment.value {
            if column_is_nullable(table, &assignment.column) {
                return Some(NullableParameter {
                    index: *index,
                    column: assignment.column.clone(),
                });
            }
        }
    }
    None
}

// An unknown column name means the server will reject the statement at
// prepare time; no verdict is needed here.
fn column_is_nullable(table: &Table, name: &str) -> bool {
    table.column(name).is_some_and(|c| !c.not_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::oid::INT4_OID;
    use crate::catalog::Column;
    use crate::parser::parse_statement;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![],
            vec![],
            vec![Table::new(
                "public",
                "b",
                vec![
                    Column::new("id", INT4_OID, true, true),
                    Column::new("a_id", INT4_OID, false, false),
                    Column::new("y", INT4_OID, true, false),
                ],
                vec!["id".to_string()],
            )],
        )
    }

    fn check(sql: &str) -> Option<NullableParameter> {
        let statement = parse_statement(sql).expect("fixture should parse");
        find_nullable_parameter(&catalog(), &statement.kind)
    }

    #[test]
    fn flags_insert_parameter_into_nullable_column() {
        let got = check("INSERT INTO b (a_id, y) VALUES ($1, $2)").unwrap();
        assert_eq!(got.index, 1);
        assert_eq!(got.column, "a_id");
    }

    #[test]
    fn flags_positional_insert_without_column_list() {
        let got = check("INSERT INTO b VALUES ($1, $2, $3)").unwrap();
        assert_eq!(got.index, 2);
        assert_eq!(got.column, "a_id");
    }

    #[test]
    fn accepts_parameters_into_not_null_columns() {
        assert_eq!(check("INSERT INTO b (y) VALUES ($1)"), None);
        assert_eq!(check("UPDATE b SET y = $1 WHERE a_id = $2"), None);
    }

    #[test]
    fn flags_update_assignment_of_nullable_column() {
        let got = check("UPDATE b SET y = 1, a_id = $1").unwrap();
        assert_eq!(got.index, 1);
        assert_eq!(got.column, "a_id");
    }

    #[test]
    fn wrapped_parameters_are_not_flagged() {
        // Only a bare parameter lands in the column position; an enclosing
        // expression changes what the server describes.
        assert_eq!(check("UPDATE b SET a_id = $1 + 1"), None);
    }

    #[test]
    fn searches_with_query_bodies() {
        let got = check(
            "WITH touched AS (UPDATE b SET a_id = $1 RETURNING id) \
             SELECT id FROM touched",
        )
        .unwrap();
        assert_eq!(got.column, "a_id");
    }

    #[test]
    fn unknown_tables_yield_no_verdict() {
        assert_eq!(check("INSERT INTO mystery (c) VALUES ($1)"), None);
    }
}
