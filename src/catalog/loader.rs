//! One-shot catalog load.
//!
//! Issues a fixed set of read-only queries against `pg_catalog` and builds
//! the immutable [`Catalog`] snapshot. Runs once per analyzer run, before any
//! statement is parsed.

use std::collections::HashMap;

use super::oid::Oid;
use super::{Catalog, CatalogError, Column, PgEnum, PgType, Table};

/// Load the full schema snapshot from a live connection.
pub async fn load_catalog(client: &tokio_postgres::Client) -> Result<Catalog, CatalogError> {
    let types = load_types(client).await?;
    let enums = load_enums(client).await?;
    let tables = load_tables(client).await?;
    Ok(Catalog::new(types, enums, tables))
}

async fn load_types(client: &tokio_postgres::Client) -> Result<Vec<PgType>, CatalogError> {
    let rows = client
        .query("SELECT oid, typname FROM pg_catalog.pg_type", &[])
        .await?;
    Ok(rows
        .iter()
        .map(|row| PgType {
            oid: row.get(0),
            name: row.get(1),
        })
        .collect())
}

async fn load_enums(client: &tokio_postgres::Client) -> Result<Vec<PgEnum>, CatalogError> {
    let rows = client
        .query(
            "SELECT t.oid, t.typname, e.enumlabel \
             FROM pg_catalog.pg_type t \
             JOIN pg_catalog.pg_enum e ON e.enumtypid = t.oid \
             ORDER BY t.oid, e.enumsortorder",
            &[],
        )
        .await?;
    let mut enums: Vec<PgEnum> = Vec::new();
    for row in rows {
        let oid: Oid = row.get(0);
        let name: String = row.get(1);
        let label: String = row.get(2);
        match enums.last_mut() {
            Some(e) if e.oid == oid => e.labels.push(label),
            _ => enums.push(PgEnum {
                oid,
                name,
                labels: vec![label],
            }),
        }
    }
    Ok(enums)
}

async fn load_tables(client: &tokio_postgres::Client) -> Result<Vec<Table>, CatalogError> {
    let relations = client
        .query(
            "SELECT c.oid, n.nspname, c.relname \
             FROM pg_catalog.pg_class c \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE c.relkind IN ('r', 'p', 'v', 'm') \
               AND n.nspname NOT IN ('pg_catalog', 'information_schema') \
             ORDER BY n.nspname, c.relname",
            &[],
        )
        .await?;

    let columns = client
        .query(
            "SELECT a.attrelid, a.attname, a.atttypid, a.attnotnull, a.atthasdef \
             FROM pg_catalog.pg_attribute a \
             JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE c.relkind IN ('r', 'p', 'v', 'm') \
               AND n.nspname NOT IN ('pg_catalog', 'information_schema') \
               AND a.attnum > 0 \
               AND NOT a.attisdropped \
             ORDER BY a.attrelid, a.attnum",
            &[],
        )
        .await?;

    let primary_keys = client
        .query(
            "SELECT i.indrelid, a.attname \
             FROM pg_catalog.pg_index i \
             JOIN pg_catalog.pg_attribute a \
               ON a.attrelid = i.indrelid \
              AND a.attnum = ANY(i.indkey) \
             WHERE i.indisprimary",
            &[],
        )
        .await?;

    let mut columns_by_rel: HashMap<Oid, Vec<Column>> = HashMap::new();
    for row in columns {
        let relid: Oid = row.get(0);
        let name: String = row.get(1);
        let type_oid: Oid = row.get(2);
        let not_null: bool = row.get(3);
        let has_default: bool = row.get(4);
        columns_by_rel
            .entry(relid)
            .or_default()
            .push(Column::new(name, type_oid, not_null, has_default));
    }

    let mut pk_by_rel: HashMap<Oid, Vec<String>> = HashMap::new();
    for row in primary_keys {
        let relid: Oid = row.get(0);
        let name: String = row.get(1);
        pk_by_rel.entry(relid).or_default().push(name);
    }

    let mut tables = Vec::with_capacity(relations.len());
    for row in relations {
        let relid: Oid = row.get(0);
        let schema: String = row.get(1);
        let name: String = row.get(2);
        let columns = columns_by_rel.remove(&relid).unwrap_or_default();
        let primary_key = pk_by_rel.remove(&relid).unwrap_or_default();
        tables.push(Table::new(schema, name, columns, primary_key));
    }
    Ok(tables)
}
