//! Nullability and cardinality inference.
//!
//! Runs after parsing and after the server has described the statement. The
//! server is authoritative for types, parameter counts, and column names;
//! this pass is authoritative for nullability and row cardinality. All
//! reasoning is conservative: a column is marked non-nullable only when the
//! rules prove it cannot be NULL in any surviving row.

pub mod classify;
mod expression;
mod non_null;
mod param;
mod rowcount;
mod scope;

pub use param::{find_nullable_parameter, NullableParameter};

use std::collections::{HashMap, HashSet};

use crate::catalog::Catalog;
use crate::describe::RowCount;
use crate::error::InferenceError;
use crate::parser::ast::{
    DeleteStatement, Expression, FromClause, InsertSource, InsertStatement, JoinType, SelectBody,
    SelectListItem, SelectStatement, Statement, StatementKind, TableRef, UpdateStatement,
    ValuesItem, WithQuery,
};

use expression::expression_nullable;
use non_null::non_null_set;
use scope::{Scope, SourceColumn};

/// One inferred output column. The name is best-effort; the probe's row
/// description wins when the two are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredColumn {
    pub name: String,
    pub nullable: bool,
}

/// The inferred output column list, or `Unknown` when some `*` expansion
/// could not be enumerated (the assembler then marks every probe column
/// nullable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferredColumns {
    Known(Vec<InferredColumn>),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementInference {
    pub columns: InferredColumns,
    pub row_count: RowCount,
    pub affected_row_count: bool,
}

pub(crate) struct InferContext<'a> {
    pub catalog: &'a Catalog,
}

/// CTE name -> inferred output columns; `None` marks a CTE whose columns
/// could not be enumerated.
pub(crate) type CteMap = HashMap<String, Option<Vec<InferredColumn>>>;

/// Infer output-column nullability and row cardinality for one statement.
pub fn infer_statement(
    catalog: &Catalog,
    statement: &Statement,
) -> Result<StatementInference, InferenceError> {
    let cx = InferContext { catalog };
    let ctes = CteMap::new();
    let columns = infer_kind_columns(&cx, &ctes, &statement.kind, None)?;
    let shape = rowcount::infer_row_shape(&cx, &statement.kind);
    Ok(StatementInference {
        columns,
        row_count: shape.row_count,
        affected_row_count: shape.affected_row_count,
    })
}

fn infer_kind_columns(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    kind: &StatementKind,
    outer: Option<&Scope<'_>>,
) -> Result<InferredColumns, InferenceError> {
    match kind {
        StatementKind::Select(select) => infer_select(cx, ctes, select, outer),
        StatementKind::Insert(insert) => infer_insert_columns(cx, ctes, insert),
        StatementKind::Update(update) => infer_update_columns(cx, ctes, update, outer),
        StatementKind::Delete(delete) => infer_delete_columns(cx, ctes, delete),
    }
}

pub(crate) fn infer_select(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    select: &SelectStatement,
    outer: Option<&Scope<'_>>,
) -> Result<InferredColumns, InferenceError> {
    let ctes = extend_ctes(cx, ctes, &select.withs)?;
    let mut combined = infer_body(cx, &ctes, &select.body, outer)?;
    for set_op in &select.set_ops {
        let branch = infer_body(cx, &ctes, &set_op.body, outer)?;
        combined = merge_set_branch(combined, branch)?;
    }
    Ok(combined)
}

/// Analyze WITH queries in order; each sees the ones before it.
fn extend_ctes(
    cx: &InferContext<'_>,
    base: &CteMap,
    withs: &[WithQuery],
) -> Result<CteMap, InferenceError> {
    if withs.is_empty() {
        return Ok(base.clone());
    }
    let mut ctes = base.clone();
    for with_query in withs {
        let columns = match infer_kind_columns(cx, &ctes, &with_query.statement, None)? {
            InferredColumns::Known(mut columns) => {
                for (column, name) in columns.iter_mut().zip(&with_query.column_names) {
                    column.name = name.clone();
                }
                Some(columns)
            }
            InferredColumns::Unknown => None,
        };
        ctes.insert(with_query.name.clone(), columns);
    }
    Ok(ctes)
}

fn infer_body(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    body: &SelectBody,
    outer: Option<&Scope<'_>>,
) -> Result<InferredColumns, InferenceError> {
    let mut scope = Scope::new(outer);
    let mut non_null = HashSet::new();
    if let Some(from) = &body.from {
        non_null = add_from_clause(cx, ctes, &mut scope, from);
    }
    // WHERE filters the fully joined row, so its narrowing is sound even
    // for null-extended columns.
    if let Some(where_clause) = &body.where_clause {
        non_null.extend(non_null_set(&scope, where_clause));
    }

    expand_select_list(cx, ctes, &scope, &non_null, &body.select_list)
}

/// Append a FROM clause's sources to `scope`, applying join-induced
/// nullability left-associatively as sources are added. Returns the
/// non-null set contributed by INNER JOIN ON conditions; a narrowing is
/// dropped again when a later outer join null-extends its column, since
/// the extension happens after the inner filter ran.
fn add_from_clause(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    scope: &mut Scope<'_>,
    from: &FromClause,
) -> HashSet<usize> {
    let mut non_null = HashSet::new();
    let base = scope.len();
    add_table_source(cx, ctes, scope, &from.table);
    for join in &from.joins {
        let right_start = scope.len();
        add_table_source(cx, ctes, scope, &join.table);
        let end = scope.len();
        match join.kind {
            JoinType::Inner => {
                non_null.extend(non_null_set(scope, &join.condition));
            }
            JoinType::Left => {
                scope.make_nullable(right_start..end);
            }
            JoinType::Right => {
                scope.make_nullable(base..right_start);
                non_null.retain(|&i| !(base..right_start).contains(&i));
            }
            JoinType::Full => {
                scope.make_nullable(base..end);
                non_null.retain(|&i| !(base..end).contains(&i));
            }
        }
    }
    non_null
}

fn table_alias(table_ref: &TableRef) -> String {
    table_ref
        .alias
        .clone()
        .unwrap_or_else(|| table_ref.name.last().expect("names are non-empty").clone())
}

fn add_table_source(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    scope: &mut Scope<'_>,
    table_ref: &TableRef,
) {
    let alias = table_alias(table_ref);
    if table_ref.name.len() == 1 {
        if let Some(cte) = ctes.get(&table_ref.name[0]) {
            match cte {
                Some(columns) => {
                    for column in columns {
                        scope.push_column(SourceColumn {
                            table: alias.clone(),
                            name: column.name.clone(),
                            nullable: column.nullable,
                        });
                    }
                }
                None => scope.mark_opaque(),
            }
            return;
        }
    }
    match cx.catalog.resolve_table(&table_ref.name) {
        Some(table) => {
            for column in table.columns() {
                scope.push_column(SourceColumn {
                    table: alias.clone(),
                    name: column.name().to_string(),
                    nullable: !column.not_null(),
                });
            }
        }
        None => scope.mark_opaque(),
    }
}

fn expand_select_list(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    scope: &Scope<'_>,
    non_null: &HashSet<usize>,
    items: &[SelectListItem],
) -> Result<InferredColumns, InferenceError> {
    let mut columns = Vec::new();
    for item in items {
        match item {
            SelectListItem::AllFields => {
                if scope.is_opaque() {
                    return Ok(InferredColumns::Unknown);
                }
                for (i, column) in scope.columns().iter().enumerate() {
                    columns.push(InferredColumn {
                        name: column.name.clone(),
                        nullable: !non_null.contains(&i) && column.nullable,
                    });
                }
            }
            SelectListItem::AllTableFields(table) => {
                let indices = scope.table_column_indices(table);
                if indices.is_empty() {
                    // The probe validated the reference, so an empty
                    // expansion means our snapshot cannot enumerate it.
                    return Ok(InferredColumns::Unknown);
                }
                for i in indices {
                    let column = &scope.columns()[i];
                    columns.push(InferredColumn {
                        name: column.name.clone(),
                        nullable: !non_null.contains(&i) && column.nullable,
                    });
                }
            }
            SelectListItem::Expr { expr, alias } => {
                columns.push(InferredColumn {
                    name: alias
                        .clone()
                        .unwrap_or_else(|| derived_column_name(expr)),
                    nullable: expression_nullable(cx, ctes, scope, non_null, expr),
                });
            }
        }
    }
    Ok(InferredColumns::Known(columns))
}

fn derived_column_name(expr: &Expression) -> String {
    match expr {
        Expression::ColumnRef(name) => name.clone(),
        Expression::TableColumnRef { column, .. } => column.clone(),
        Expression::FunctionCall { name, .. } => name.clone(),
        // The probe's row description is authoritative for names; this is
        // only a stand-in for CTE virtual tables.
        _ => "?column?".to_string(),
    }
}

/// Set-operation output is nullable in column i iff any branch is.
fn merge_set_branch(
    left: InferredColumns,
    right: InferredColumns,
) -> Result<InferredColumns, InferenceError> {
    match (left, right) {
        (InferredColumns::Known(a), InferredColumns::Known(b)) => {
            if a.len() != b.len() {
                // The server accepts only union-compatible branches, so a
                // mismatch here is an analyzer bug.
                return Err(InferenceError {
                    message: format!(
                        "set operation branches produce {} and {} columns",
                        a.len(),
                        b.len()
                    ),
                });
            }
            Ok(InferredColumns::Known(
                a.into_iter()
                    .zip(b)
                    .map(|(l, r)| InferredColumn {
                        name: l.name,
                        nullable: l.nullable || r.nullable,
                    })
                    .collect(),
            ))
        }
        _ => Ok(InferredColumns::Unknown),
    }
}

fn infer_insert_columns(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    insert: &InsertStatement,
) -> Result<InferredColumns, InferenceError> {
    if insert.returning.is_empty() {
        return Ok(InferredColumns::Known(Vec::new()));
    }
    let ctes = extend_ctes(cx, ctes, &insert.withs)?;
    let Some(table) = cx.catalog.resolve_table(&insert.table.name) else {
        return Ok(InferredColumns::Unknown);
    };
    let alias = table_alias(&insert.table);

    // VALUES expressions see no table columns; only parameters, literals,
    // and function applications over them.
    let empty_scope = Scope::new(None);
    let empty_non_null = HashSet::new();

    let mut scope = Scope::new(None);
    for (ordinal, column) in table.columns().iter().enumerate() {
        let base = !column.not_null();
        let assigned_position = if insert.columns.is_empty() {
            Some(ordinal)
        } else {
            insert.columns.iter().position(|c| c == column.name())
        };
        let nullable = match (&insert.source, assigned_position) {
            (InsertSource::DefaultValues, _) | (InsertSource::Values(_), None) => base,
            (InsertSource::Values(rows), Some(position)) => {
                rows.iter().any(|row| match row.get(position) {
                    Some(ValuesItem::Expr(expr)) => {
                        expression_nullable(cx, &ctes, &empty_scope, &empty_non_null, expr)
                    }
                    Some(ValuesItem::Default) => {
                        if column.has_default() {
                            base
                        } else {
                            false
                        }
                    }
                    // Short rows are rejected by the server.
                    None => base,
                })
            }
        };
        scope.push_column(SourceColumn {
            table: alias.clone(),
            name: column.name().to_string(),
            nullable,
        });
    }

    expand_select_list(cx, &ctes, &scope, &HashSet::new(), &insert.returning)
}

fn infer_update_columns(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    update: &UpdateStatement,
    outer: Option<&Scope<'_>>,
) -> Result<InferredColumns, InferenceError> {
    if update.returning.is_empty() {
        return Ok(InferredColumns::Known(Vec::new()));
    }
    let ctes = extend_ctes(cx, ctes, &update.withs)?;

    let mut scope = Scope::new(outer);
    add_table_source(cx, &ctes, &mut scope, &update.table);
    let target_len = scope.len();
    let mut non_null = HashSet::new();
    if let Some(from) = &update.from {
        non_null = add_from_clause(cx, &ctes, &mut scope, from);
    }
    if let Some(where_clause) = &update.where_clause {
        non_null.extend(non_null_set(&scope, where_clause));
    }

    // Assignment expressions observe the pre-update row.
    let assigned: Vec<(&str, bool)> = update
        .assignments
        .iter()
        .map(|assignment| {
            (
                assignment.column.as_str(),
                expression_nullable(cx, &ctes, &scope, &non_null, &assignment.value),
            )
        })
        .collect();

    // RETURNING observes the post-update row: assigned columns take their
    // assignment's nullability, everything else keeps its WHERE-narrowed
    // base nullability.
    let mut post = Scope::new(outer);
    for (i, column) in scope.columns().iter().enumerate() {
        let narrowed = !non_null.contains(&i) && column.nullable;
        let nullable = if i < target_len {
            match assigned.iter().find(|(name, _)| *name == column.name) {
                Some((_, assignment_nullable)) => *assignment_nullable,
                None => narrowed,
            }
        } else {
            narrowed
        };
        post.push_column(SourceColumn {
            table: column.table.clone(),
            name: column.name.clone(),
            nullable,
        });
    }
    if scope.is_opaque() {
        post.mark_opaque();
    }

    expand_select_list(cx, &ctes, &post, &HashSet::new(), &update.returning)
}

fn infer_delete_columns(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    delete: &DeleteStatement,
) -> Result<InferredColumns, InferenceError> {
    if delete.returning.is_empty() {
        return Ok(InferredColumns::Known(Vec::new()));
    }
    let mut scope = Scope::new(None);
    add_table_source(cx, ctes, &mut scope, &delete.table);

    if let Some(where_clause) = &delete.where_clause {
        for i in non_null_set(&scope, where_clause) {
            scope.set_nullable(i, false);
        }
    }

    expand_select_list(cx, ctes, &scope, &HashSet::new(), &delete.returning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::oid::{INT4_OID, TEXT_OID};
    use crate::catalog::{Column, PgType, Table};
    use crate::parser::parse_statement;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                PgType {
                    oid: INT4_OID,
                    name: "int4".to_string(),
                },
                PgType {
                    oid: TEXT_OID,
                    name: "text".to_string(),
                },
            ],
            vec![],
            vec![
                Table::new(
                    "public",
                    "a",
                    vec![
                        Column::new("id", INT4_OID, true, true),
                        Column::new("x", INT4_OID, true, false),
                    ],
                    vec!["id".to_string()],
                ),
                Table::new(
                    "public",
                    "b",
                    vec![
                        Column::new("id", INT4_OID, true, true),
                        Column::new("a_id", INT4_OID, false, false),
                        Column::new("y", INT4_OID, true, false),
                    ],
                    vec!["id".to_string()],
                ),
            ],
        )
    }

    fn infer(sql: &str) -> StatementInference {
        let statement = parse_statement(sql).expect("fixture should parse");
        infer_statement(&catalog(), &statement).expect("inference should succeed")
    }

    fn known(columns: &InferredColumns) -> &[InferredColumn] {
        match columns {
            InferredColumns::Known(columns) => columns,
            InferredColumns::Unknown => panic!("expected known columns"),
        }
    }

    #[test]
    fn left_join_makes_right_side_nullable() {
        let got = infer("SELECT a.x, b.y FROM a LEFT JOIN b ON b.a_id = a.id");
        let columns = known(&got.columns);
        assert_eq!(columns[0].name, "x");
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].name, "y");
        assert!(columns[1].nullable);
        assert_eq!(got.row_count, RowCount::Many);
    }

    #[test]
    fn right_join_makes_left_side_nullable() {
        let got = infer("SELECT a.x, b.y FROM a RIGHT JOIN b ON b.a_id = a.id");
        let columns = known(&got.columns);
        assert!(columns[0].nullable);
        assert!(!columns[1].nullable);
    }

    #[test]
    fn full_join_makes_both_sides_nullable() {
        let got = infer("SELECT a.x, b.y FROM a FULL JOIN b ON b.a_id = a.id");
        let columns = known(&got.columns);
        assert!(columns[0].nullable);
        assert!(columns[1].nullable);
    }

    #[test]
    fn inner_join_on_condition_narrows() {
        let got = infer("SELECT b.a_id FROM a JOIN b ON b.a_id = a.id");
        let columns = known(&got.columns);
        assert!(!columns[0].nullable);
    }

    #[test]
    fn later_right_join_cancels_inner_on_narrowing() {
        // The inner ON proves b.a_id non-null, but the RIGHT JOIN then
        // null-extends the whole left side, so the narrowing must not
        // survive into the output.
        let got = infer(
            "SELECT b.a_id FROM a JOIN b ON b.a_id = a.id \
             RIGHT JOIN b AS other ON other.id = b.id",
        );
        assert!(known(&got.columns)[0].nullable);
    }

    #[test]
    fn outer_join_on_condition_does_not_narrow() {
        let got = infer("SELECT b.a_id FROM a LEFT JOIN b ON b.a_id = a.id");
        let columns = known(&got.columns);
        assert!(columns[0].nullable);
    }

    #[test]
    fn star_expansion_follows_join_order() {
        let got = infer("SELECT * FROM a LEFT JOIN b ON b.a_id = a.id");
        let columns = known(&got.columns);
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "x", "id", "a_id", "y"]);
        assert!(!columns[0].nullable);
        assert!(columns[2].nullable);
    }

    #[test]
    fn where_equality_narrows_output() {
        let got = infer("SELECT x FROM a WHERE x = 5");
        assert!(!known(&got.columns)[0].nullable);
    }

    #[test]
    fn union_or_combines_branch_nullability() {
        let got = infer("SELECT x FROM a UNION ALL SELECT NULL FROM b");
        let columns = known(&got.columns);
        assert_eq!(columns.len(), 1);
        assert!(columns[0].nullable);
    }

    #[test]
    fn primary_key_lookup_is_zero_or_one() {
        let got = infer("SELECT x FROM a WHERE id = $1");
        assert_eq!(got.row_count, RowCount::ZeroOrOne);
    }

    #[test]
    fn pk_equality_against_column_is_not_a_lookup() {
        let got = infer("SELECT x FROM a WHERE id = x");
        assert_eq!(got.row_count, RowCount::Many);
    }

    #[test]
    fn limit_literals_classify_cardinality() {
        assert_eq!(infer("SELECT x FROM a LIMIT 0").row_count, RowCount::Zero);
        assert_eq!(
            infer("SELECT x FROM a LIMIT 1").row_count,
            RowCount::ZeroOrOne
        );
        assert_eq!(
            infer("SELECT x FROM a LIMIT $1").row_count,
            RowCount::Many
        );
    }

    #[test]
    fn insert_without_returning_reports_affected_count() {
        let got = infer("INSERT INTO a (x) VALUES ($1)");
        assert!(got.affected_row_count);
        assert!(known(&got.columns).is_empty());
    }

    #[test]
    fn insert_returning_uses_post_insert_nullability() {
        let got = infer("INSERT INTO a (x) VALUES ($1) RETURNING id, x");
        assert_eq!(got.row_count, RowCount::One);
        let columns = known(&got.columns);
        // id is omitted but has a default and is NOT NULL.
        assert!(!columns[0].nullable);
        // x gets a non-null parameter.
        assert!(!columns[1].nullable);
    }

    #[test]
    fn insert_returning_null_expression_is_nullable() {
        let got = infer("INSERT INTO b (a_id, y) VALUES (NULL, $1) RETURNING a_id, y");
        let columns = known(&got.columns);
        assert!(columns[0].nullable);
        assert!(!columns[1].nullable);
    }

    #[test]
    fn multi_row_insert_ors_across_rows() {
        let got = infer("INSERT INTO b (a_id, y) VALUES ($1, 1), (NULL, 2) RETURNING a_id");
        assert_eq!(got.row_count, RowCount::Many);
        assert!(known(&got.columns)[0].nullable);
    }

    #[test]
    fn update_returning_tracks_assignments_and_where() {
        let got = infer("UPDATE b SET a_id = $1 WHERE y = 1 RETURNING a_id, y");
        assert_eq!(got.row_count, RowCount::Many);
        let columns = known(&got.columns);
        assert!(!columns[0].nullable);
        assert!(!columns[1].nullable);
    }

    #[test]
    fn update_assignment_to_null_overrides_where_narrowing() {
        let got = infer("UPDATE b SET a_id = NULL WHERE a_id = 1 RETURNING a_id");
        assert!(known(&got.columns)[0].nullable);
    }

    #[test]
    fn delete_returning_narrows_by_where() {
        let got = infer("DELETE FROM b WHERE a_id = 1 RETURNING a_id, y");
        let columns = known(&got.columns);
        assert!(!columns[0].nullable);
        assert!(!columns[1].nullable);
    }

    #[test]
    fn cte_columns_flow_into_outer_scope() {
        let got = infer(
            "WITH nullable_ids AS (SELECT a_id FROM b) \
             SELECT a_id FROM nullable_ids",
        );
        assert!(known(&got.columns)[0].nullable);

        let got = infer(
            "WITH ids (v) AS (SELECT id FROM b) \
             SELECT v FROM ids",
        );
        assert!(!known(&got.columns)[0].nullable);
    }

    #[test]
    fn unknown_table_star_expansion_degrades_to_unknown() {
        let got = infer("SELECT * FROM mystery");
        assert_eq!(got.columns, InferredColumns::Unknown);
    }

    #[test]
    fn ambiguous_unqualified_reference_is_nullable() {
        let got = infer("SELECT id FROM a JOIN b ON b.a_id = a.id");
        assert!(known(&got.columns)[0].nullable);
    }

    #[test]
    fn exists_subquery_is_non_null_and_in_checks_subquery_columns() {
        let got = infer("SELECT EXISTS (SELECT id FROM b) e, x IN (SELECT a_id FROM b) m FROM a WHERE x = 1");
        let columns = known(&got.columns);
        assert!(!columns[0].nullable);
        // a_id in b is nullable, so IN may evaluate to NULL.
        assert!(columns[1].nullable);
    }
}
