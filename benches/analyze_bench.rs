use criterion::{criterion_group, criterion_main, Criterion};

use sqlprobe::catalog::oid::INT4_OID;
use sqlprobe::catalog::{Catalog, Column, PgType, Table};
use sqlprobe::infer::infer_statement;
use sqlprobe::parser::parse_statement;
use sqlprobe::preprocess::preprocess_sql;

const QUERY: &str = "SELECT a.x, b.y, coalesce(b.y, 0) AS y0 \
                     FROM a LEFT JOIN b ON b.a_id = a.id \
                     WHERE a.x = ${x} AND b.y IS NOT NULL \
                     ORDER BY a.x DESC NULLS LAST \
                     LIMIT 50";

fn bench_catalog() -> Catalog {
    Catalog::new(
        vec![PgType {
            oid: INT4_OID,
            name: "int4".to_string(),
        }],
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

fn bench_pipeline(c: &mut Criterion) {
    let catalog = bench_catalog();

    c.bench_function("preprocess_parse_infer", |b| {
        b.iter(|| {
            let preprocessed = preprocess_sql(QUERY).unwrap();
            let statement = parse_statement(&preprocessed.sql).unwrap();
            infer_statement(&catalog, &statement).unwrap()
        })
    });

    c.bench_function("parse_only", |b| {
        let preprocessed = preprocess_sql(QUERY).unwrap();
        b.iter(|| parse_statement(&preprocessed.sql).unwrap())
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
