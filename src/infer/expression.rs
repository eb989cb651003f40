//! Expression nullability.
//!
//! `expression_nullable` answers "might this expression evaluate to NULL in
//! a surviving row?". It must never answer `false` for an expression that
//! can be NULL; answering `true` for one that cannot is merely imprecise.

use std::collections::HashSet;

use crate::infer::classify::{classify_function, operator_null_safe, FunctionNullability};
use crate::infer::scope::{Resolved, Scope};
use crate::infer::{infer_select, CteMap, InferContext, InferredColumns};
use crate::parser::ast::{Expression, SelectStatement};

pub fn expression_nullable(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    scope: &Scope<'_>,
    non_null: &HashSet<usize>,
    expr: &Expression,
) -> bool {
    match expr {
        Expression::ColumnRef(name) => column_ref_nullable(scope, non_null, None, name),
        Expression::TableColumnRef { table, column } => {
            column_ref_nullable(scope, non_null, Some(table.as_str()), column)
        }
        Expression::Null => true,
        Expression::Boolean(_)
        | Expression::Integer(_)
        | Expression::Float(_)
        | Expression::StringLiteral(_) => false,
        // Parameters are required inputs; NULL is never passed for them.
        Expression::Parameter(_) => false,
        Expression::FunctionCall { name, args } => {
            // The three-class table cannot express coalesce: it is NULL only
            // when every argument is.
            if name == "coalesce" {
                return args
                    .iter()
                    .all(|arg| expression_nullable(cx, ctes, scope, non_null, arg));
            }
            match classify_function(name) {
                FunctionNullability::NeverNull => false,
                FunctionNullability::NullSafe => args
                    .iter()
                    .any(|arg| expression_nullable(cx, ctes, scope, non_null, arg)),
                FunctionNullability::Unknown => true,
            }
        }
        Expression::Unary { op, expr } => {
            if op.is_test() {
                false
            } else {
                expression_nullable(cx, ctes, scope, non_null, expr)
            }
        }
        Expression::Binary { left, op, right } => {
            if op == "and" || op == "or" || operator_null_safe(op) {
                expression_nullable(cx, ctes, scope, non_null, left)
                    || expression_nullable(cx, ctes, scope, non_null, right)
            } else {
                true
            }
        }
        Expression::TypeCast { expr, .. } => expression_nullable(cx, ctes, scope, non_null, expr),
        // Out-of-bounds subscripts yield NULL, so a subscript may always be
        // NULL regardless of its operands.
        Expression::Subscript { .. } => true,
        Expression::InSubquery { expr, subquery, .. } => {
            expression_nullable(cx, ctes, scope, non_null, expr)
                || subquery_any_nullable(cx, ctes, scope, subquery)
        }
        Expression::Exists(_) => false,
    }
}

fn column_ref_nullable(
    scope: &Scope<'_>,
    non_null: &HashSet<usize>,
    table: Option<&str>,
    name: &str,
) -> bool {
    match scope.resolve(table, name) {
        Resolved::Local(i) => !non_null.contains(&i) && scope.columns()[i].nullable,
        Resolved::Outer(column) => column.nullable,
        Resolved::Ambiguous | Resolved::NotFound => true,
    }
}

/// True when any output column of the subquery might be NULL. The subquery
/// sees the enclosing scope for correlated references.
fn subquery_any_nullable(
    cx: &InferContext<'_>,
    ctes: &CteMap,
    scope: &Scope<'_>,
    subquery: &SelectStatement,
) -> bool {
    match infer_select(cx, ctes, subquery, Some(scope)) {
        Ok(InferredColumns::Known(columns)) => columns.iter().any(|c| c.nullable),
        // Unknown expansion or an internal error inside the subquery: the
        // conservative answer is "might be NULL".
        Ok(InferredColumns::Unknown) | Err(_) => true,
    }
}
