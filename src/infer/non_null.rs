//! The non-null set `NN(W)` of a filter expression.
//!
//! SQL three-valued logic drops a row whenever the WHERE (or inner-join ON)
//! expression evaluates to NULL or FALSE, so the expression must come out
//! TRUE for the row to survive. `NN(W)` is the set of scope columns that are
//! therefore known non-NULL in every surviving row. The definition is the
//! monotone structural walk below; the essential duality is AND -> union,
//! OR -> intersection.

use std::collections::HashSet;

use crate::infer::classify::{classify_function, operator_null_safe, FunctionNullability};
use crate::infer::scope::{Resolved, Scope};
use crate::parser::ast::{Expression, UnaryOp};

/// Columns of `scope` (local level only) that must be non-NULL for
/// `condition` to be TRUE.
pub fn non_null_set(scope: &Scope<'_>, condition: &Expression) -> HashSet<usize> {
    let mut out = HashSet::new();
    collect(scope, condition, &mut out);
    out
}

/// Collect into `out` assuming `expr` is required to be non-NULL (at the
/// root: required to be TRUE, which is stronger).
fn collect(scope: &Scope<'_>, expr: &Expression, out: &mut HashSet<usize>) {
    match expr {
        Expression::ColumnRef(name) => {
            if let Resolved::Local(i) = scope.resolve(None, name) {
                out.insert(i);
            }
        }
        Expression::TableColumnRef { table, column } => {
            if let Resolved::Local(i) = scope.resolve(Some(table.as_str()), column) {
                out.insert(i);
            }
        }
        Expression::Binary { left, op, right } => {
            if op == "and" {
                collect(scope, left, out);
                collect(scope, right, out);
            } else if op == "or" {
                let a = non_null_set(scope, left);
                let b = non_null_set(scope, right);
                out.extend(a.intersection(&b));
            } else if operator_null_safe(op) {
                collect(scope, left, out);
                collect(scope, right, out);
            }
        }
        Expression::Unary { op, expr } => match op {
            UnaryOp::IsNotNull | UnaryOp::Plus | UnaryOp::Minus => collect(scope, expr, out),
            // IS NULL, the other IS tests, and NOT assert nothing about
            // their operand being non-NULL.
            _ => {}
        },
        Expression::TypeCast { expr, .. } => collect(scope, expr, out),
        Expression::Subscript { expr, index } => {
            collect(scope, expr, out);
            collect(scope, index, out);
        }
        Expression::FunctionCall { name, args } => {
            if classify_function(name) == FunctionNullability::NullSafe {
                for arg in args {
                    collect(scope, arg, out);
                }
            }
        }
        // IN is null-safe in its left-hand side only.
        Expression::InSubquery { expr, .. } => collect(scope, expr, out),
        Expression::Exists(_)
        | Expression::Null
        | Expression::Boolean(_)
        | Expression::Integer(_)
        | Expression::Float(_)
        | Expression::StringLiteral(_)
        | Expression::Parameter(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::scope::SourceColumn;
    use crate::parser::ast::{SelectStatement, StatementKind};
    use crate::parser::parse_statement;

    fn where_clause(sql: &str) -> Expression {
        let stmt = parse_statement(sql).expect("fixture should parse");
        let StatementKind::Select(SelectStatement { body, .. }) = stmt.kind else {
            panic!("fixture must be a SELECT");
        };
        body.where_clause.expect("fixture must have a WHERE")
    }

    fn person_scope() -> Scope<'static> {
        let mut scope = Scope::new(None);
        for name in ["age", "shoe_size", "height", "weight", "name"] {
            scope.push_column(SourceColumn {
                table: "person".to_string(),
                name: name.to_string(),
                nullable: true,
            });
        }
        scope
    }

    fn names(scope: &Scope<'_>, set: &HashSet<usize>) -> Vec<String> {
        let mut out: Vec<String> = set
            .iter()
            .map(|&i| scope.columns()[i].name.clone())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn conjunction_unions_operand_sets() {
        let scope = person_scope();
        let w = where_clause(
            "SELECT 1 FROM person \
             WHERE age + 5 < 60 AND shoe_size = 45 AND bool(height) IS NOT NULL \
               AND weight IS NOT NULL AND concat(name, 'foo') IS NOT NULL",
        );
        let nn = non_null_set(&scope, &w);
        // concat is never-null, so the last conjunct must not claim `name`.
        assert_eq!(names(&scope, &nn), ["age", "height", "shoe_size", "weight"]);
    }

    #[test]
    fn disjunction_intersects_operand_sets() {
        let scope = person_scope();
        let w = where_clause("SELECT 1 FROM person WHERE age = 1 OR (age = 2 AND weight = 3)");
        let nn = non_null_set(&scope, &w);
        assert_eq!(names(&scope, &nn), ["age"]);
    }

    #[test]
    fn negation_asserts_nothing() {
        let scope = person_scope();
        let w = where_clause("SELECT 1 FROM person WHERE NOT (age = 1)");
        assert!(non_null_set(&scope, &w).is_empty());
    }

    #[test]
    fn is_null_asserts_nothing() {
        let scope = person_scope();
        let w = where_clause("SELECT 1 FROM person WHERE age IS NULL");
        assert!(non_null_set(&scope, &w).is_empty());
    }

    #[test]
    fn qualified_references_resolve() {
        let scope = person_scope();
        let w = where_clause("SELECT 1 FROM person WHERE person.age = 1");
        assert_eq!(names(&scope, &non_null_set(&scope, &w)), ["age"]);
    }

    #[test]
    fn in_subquery_narrows_lhs_only() {
        let scope = person_scope();
        let w = where_clause("SELECT 1 FROM person WHERE age IN (SELECT a FROM t)");
        assert_eq!(names(&scope, &non_null_set(&scope, &w)), ["age"]);
    }
}
