//! The name-resolution environment of one query body.
//!
//! A scope binds unqualified and table-qualified column names to source
//! columns with their nullability. Scopes nest: a correlated subquery's
//! scope points at the enclosing body's scope. A scope is *opaque* when some
//! FROM source's columns could not be enumerated; resolution misses then
//! degrade to "nullable" instead of failing, since the server has already
//! validated that every reference is well-formed.

/// A column visible in a scope, keyed by the table alias it came in under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub table: String,
    pub name: String,
    pub nullable: bool,
}

#[derive(Debug)]
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    columns: Vec<SourceColumn>,
    opaque: bool,
}

/// Outcome of a name lookup.
#[derive(Debug)]
pub enum Resolved<'a> {
    /// Index into this scope's own columns.
    Local(usize),
    /// A column of some enclosing scope.
    Outer(&'a SourceColumn),
    Ambiguous,
    NotFound,
}

impl<'a> Scope<'a> {
    pub fn new(parent: Option<&'a Scope<'a>>) -> Self {
        Self {
            parent,
            columns: Vec::new(),
            opaque: false,
        }
    }

    pub fn push_column(&mut self, column: SourceColumn) {
        self.columns.push(column);
    }

    pub fn columns(&self) -> &[SourceColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn set_nullable(&mut self, index: usize, nullable: bool) {
        self.columns[index].nullable = nullable;
    }

    /// Mark every column in `range` nullable (outer-join null extension).
    pub fn make_nullable(&mut self, range: std::ops::Range<usize>) {
        for column in &mut self.columns[range] {
            column.nullable = true;
        }
    }

    pub fn mark_opaque(&mut self) {
        self.opaque = true;
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// Indices of the columns that came in under `table`, in source order.
    pub fn table_column_indices(&self, table: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.table == table)
            .map(|(i, _)| i)
            .collect()
    }

    /// Resolve a column reference, innermost scope first. A qualified
    /// reference whose alias is bound locally never escapes to the parent.
    pub fn resolve(&self, table: Option<&str>, name: &str) -> Resolved<'_> {
        match table {
            Some(table) => {
                if self.columns.iter().any(|c| c.table == table) {
                    let mut hits = self
                        .columns
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| c.table == table && c.name == name);
                    match (hits.next(), hits.next()) {
                        (Some((i, _)), None) => Resolved::Local(i),
                        (Some(_), Some(_)) => Resolved::Ambiguous,
                        (None, _) => Resolved::NotFound,
                    }
                } else {
                    self.resolve_in_parent(Some(table), name)
                }
            }
            None => {
                let mut hits = self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.name == name);
                match (hits.next(), hits.next()) {
                    (Some((i, _)), None) => Resolved::Local(i),
                    (Some(_), Some(_)) => Resolved::Ambiguous,
                    (None, _) => self.resolve_in_parent(None, name),
                }
            }
        }
    }

    fn resolve_in_parent(&self, table: Option<&str>, name: &str) -> Resolved<'_> {
        let Some(parent) = self.parent else {
            return Resolved::NotFound;
        };
        match parent.resolve(table, name) {
            Resolved::Local(i) => Resolved::Outer(&parent.columns[i]),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(table: &str, name: &str, nullable: bool) -> SourceColumn {
        SourceColumn {
            table: table.to_string(),
            name: name.to_string(),
            nullable,
        }
    }

    #[test]
    fn resolves_unqualified_and_qualified_names() {
        let mut scope = Scope::new(None);
        scope.push_column(column("a", "id", false));
        scope.push_column(column("b", "id", true));
        scope.push_column(column("b", "y", true));

        assert!(matches!(scope.resolve(None, "y"), Resolved::Local(2)));
        assert!(matches!(scope.resolve(None, "id"), Resolved::Ambiguous));
        assert!(matches!(scope.resolve(Some("a"), "id"), Resolved::Local(0)));
        assert!(matches!(scope.resolve(Some("b"), "z"), Resolved::NotFound));
        assert!(matches!(scope.resolve(None, "missing"), Resolved::NotFound));
    }

    #[test]
    fn falls_back_to_parent_scope() {
        let mut outer = Scope::new(None);
        outer.push_column(column("a", "x", false));
        let mut inner = Scope::new(Some(&outer));
        inner.push_column(column("b", "y", true));

        match inner.resolve(None, "x") {
            Resolved::Outer(col) => assert!(!col.nullable),
            other => panic!("expected outer resolution, got {other:?}"),
        }
        match inner.resolve(Some("a"), "x") {
            Resolved::Outer(col) => assert_eq!(col.name, "x"),
            other => panic!("expected outer resolution, got {other:?}"),
        }
    }

    #[test]
    fn local_alias_shadows_parent() {
        let mut outer = Scope::new(None);
        outer.push_column(column("t", "x", false));
        let mut inner = Scope::new(Some(&outer));
        inner.push_column(column("t", "y", true));

        // Alias t is bound locally, so t.x must not resolve to the parent.
        assert!(matches!(inner.resolve(Some("t"), "x"), Resolved::NotFound));
    }

    #[test]
    fn outer_join_null_extension() {
        let mut scope = Scope::new(None);
        scope.push_column(column("a", "x", false));
        scope.push_column(column("b", "y", false));
        scope.make_nullable(1..2);
        assert!(!scope.columns()[0].nullable);
        assert!(scope.columns()[1].nullable);
    }
}
