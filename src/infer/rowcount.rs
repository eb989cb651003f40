//! Row-cardinality classification.
//!
//! Decided purely from the AST and the catalog: DML without RETURNING
//! produces an affected-row count; a literal LIMIT 0 or LIMIT 1 bounds the
//! result; an equality on every primary-key column of a single-table SELECT
//! pins it to at most one row; everything else is "many".

use std::collections::HashSet;

use crate::describe::RowCount;
use crate::infer::expression::expression_nullable;
use crate::infer::scope::Scope;
use crate::infer::{CteMap, InferContext};
use crate::catalog::Table;
use crate::parser::ast::{Expression, InsertSource, SelectStatement, StatementKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowShape {
    pub row_count: RowCount,
    pub affected_row_count: bool,
}

fn rows(row_count: RowCount) -> RowShape {
    RowShape {
        row_count,
        affected_row_count: false,
    }
}

fn affected() -> RowShape {
    RowShape {
        row_count: RowCount::Many,
        affected_row_count: true,
    }
}

pub fn infer_row_shape(cx: &InferContext<'_>, kind: &StatementKind) -> RowShape {
    match kind {
        StatementKind::Insert(insert) => {
            if insert.returning.is_empty() {
                affected()
            } else {
                let row_count = match &insert.source {
                    InsertSource::DefaultValues => RowCount::One,
                    InsertSource::Values(insert_rows) if insert_rows.len() == 1 => RowCount::One,
                    InsertSource::Values(_) => RowCount::Many,
                };
                rows(row_count)
            }
        }
        StatementKind::Update(update) => {
            if update.returning.is_empty() {
                affected()
            } else {
                rows(RowCount::Many)
            }
        }
        StatementKind::Delete(delete) => {
            if delete.returning.is_empty() {
                affected()
            } else {
                rows(RowCount::Many)
            }
        }
        StatementKind::Select(select) => rows(select_row_count(cx, select)),
    }
}

fn select_row_count(cx: &InferContext<'_>, select: &SelectStatement) -> RowCount {
    if let Some(limit) = &select.limit {
        if matches!(limit.count, Some(Expression::Integer(0))) {
            return RowCount::Zero;
        }
        if matches!(limit.count, Some(Expression::Integer(1))) && select.set_ops.is_empty() {
            return RowCount::ZeroOrOne;
        }
    }
    if select.set_ops.is_empty() && is_primary_key_lookup(cx, select) {
        return RowCount::ZeroOrOne;
    }
    RowCount::Many
}

/// True when the WHERE clause pins every primary-key column of the single
/// FROM table to a non-null, row-independent comparand.
fn is_primary_key_lookup(cx: &InferContext<'_>, select: &SelectStatement) -> bool {
    let body = &select.body;
    let Some(from) = &body.from else {
        return false;
    };
    if !from.joins.is_empty() {
        return false;
    }
    let Some(where_clause) = &body.where_clause else {
        return false;
    };
    // A CTE shadows a real table of the same name.
    if from.table.name.len() == 1
        && select.withs.iter().any(|w| w.name == from.table.name[0])
    {
        return false;
    }
    let Some(table) = cx.catalog.resolve_table(&from.table.name) else {
        return false;
    };
    if table.primary_key().is_empty() {
        return false;
    }
    let alias = from
        .table
        .alias
        .clone()
        .unwrap_or_else(|| from.table.name.last().expect("names are non-empty").clone());

    let mut constrained = HashSet::new();
    collect_pk_equalities(cx, table, &alias, where_clause, &mut constrained);
    table
        .primary_key()
        .iter()
        .all(|pk| constrained.contains(pk))
}

fn collect_pk_equalities(
    cx: &InferContext<'_>,
    table: &Table,
    alias: &str,
    expr: &Expression,
    out: &mut HashSet<String>,
) {
    let Expression::Binary { left, op, right } = expr else {
        return;
    };
    if op == "and" {
        collect_pk_equalities(cx, table, alias, left, out);
        collect_pk_equalities(cx, table, alias, right, out);
        return;
    }
    if op == "=" {
        if let Some(column) = equality_column(cx, table, alias, left, right) {
            out.insert(column);
        } else if let Some(column) = equality_column(cx, table, alias, right, left) {
            out.insert(column);
        }
    }
}

fn equality_column(
    cx: &InferContext<'_>,
    table: &Table,
    alias: &str,
    column_side: &Expression,
    value_side: &Expression,
) -> Option<String> {
    let name = match column_side {
        Expression::ColumnRef(name) => name,
        Expression::TableColumnRef { table: t, column } if t == alias => column,
        _ => return None,
    };
    table.column(name)?;
    // The comparand must be non-null and row-independent. Evaluating it
    // against an empty scope makes any column reference resolve to
    // "nullable", which rejects row-dependent comparands too.
    let empty_scope = Scope::new(None);
    let empty_ctes = CteMap::new();
    if expression_nullable(cx, &empty_ctes, &empty_scope, &HashSet::new(), value_side) {
        return None;
    }
    Some(name.clone())
}
