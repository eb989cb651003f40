//! Static analysis of PostgreSQL DML statements.
//!
//! Feed [`analyze`] a single SELECT / INSERT / UPDATE / DELETE statement
//! decorated with `${name}` placeholders, a loaded [`catalog::Catalog`]
//! snapshot, and a [`probe::ProbeConn`] over a live connection. It returns a
//! [`describe::StatementDescription`]: the ordered input parameters (name,
//! type oid, nullability) and the output shape (row cardinality plus ordered
//! output columns), precise enough to generate a strongly typed wrapper in
//! any target language.
//!
//! The server is trusted for types, parameter counts, and column names; the
//! parsed AST and the catalog are trusted for nullability and cardinality.

#![allow(
    clippy::module_name_repetitions,
    clippy::large_enum_variant,
    clippy::too_many_lines,
    clippy::match_like_matches_macro
)]

pub mod catalog;
pub mod describe;
pub mod error;
pub mod infer;
pub mod parser;
pub mod preprocess;
pub mod probe;

use std::collections::HashSet;

use catalog::Catalog;
use describe::{NamedField, StatementDescription};
use error::{AnalyzerError, InferenceError, UserSchemaError};
use infer::InferredColumns;
use preprocess::preprocess_sql;
use probe::{probe_statement, ProbeConn};

/// Analyze one statement end to end: rewrite placeholders, parse, describe
/// against the server, infer nullability and cardinality, and merge.
pub async fn analyze<C: ProbeConn>(
    sql: &str,
    catalog: &Catalog,
    conn: &mut C,
) -> Result<StatementDescription, AnalyzerError> {
    let preprocessed = preprocess_sql(sql)?;
    let statement = parser::parse_statement(&preprocessed.sql)?;
    let probe = probe_statement(conn, &preprocessed.sql)
        .await
        .map_err(|error| AnalyzerError::Probe {
            error,
            sql: preprocessed.sql.clone(),
        })?;

    if probe.param_oids.len() != preprocessed.param_names.len() {
        return Err(InferenceError {
            message: format!(
                "the server reported {} parameters but the preprocessor collected {}",
                probe.param_oids.len(),
                preprocessed.param_names.len()
            ),
        }
        .into());
    }
    // Parameters are required inputs. A parameter the server would view as
    // nullable (one assigned directly to a nullable column) breaks that
    // contract and is rejected rather than guessed at.
    if let Some(param) = infer::find_nullable_parameter(catalog, &statement.kind) {
        let name = preprocessed
            .param_names
            .get((param.index - 1) as usize)
            .cloned()
            .unwrap_or_else(|| format!("${}", param.index));
        return Err(UserSchemaError {
            message: format!(
                "parameter \"{}\" is assigned to nullable column \"{}\"; \
                 parameters are required and cannot be null",
                name, param.column
            ),
            offset: None,
        }
        .into());
    }

    let parameters: Vec<NamedField> = preprocessed
        .param_names
        .iter()
        .zip(&probe.param_oids)
        .map(|(name, &oid)| NamedField::new(name.clone(), oid, false))
        .collect();

    let inference = infer::infer_statement(catalog, &statement)?;

    let columns: Vec<NamedField> = match inference.columns {
        InferredColumns::Known(inferred) => {
            if inferred.len() != probe.row.len() {
                return Err(InferenceError {
                    message: format!(
                        "inferred {} output columns but the server reported {}",
                        inferred.len(),
                        probe.row.len()
                    ),
                }
                .into());
            }
            probe
                .row
                .iter()
                .zip(&inferred)
                .map(|(field, inferred)| {
                    NamedField::new(field.name.clone(), field.type_oid, inferred.nullable)
                })
                .collect()
        }
        // Some `*` expansion could not be enumerated; fall back to the
        // sound answer for every server-reported column.
        InferredColumns::Unknown => probe
            .row
            .iter()
            .map(|field| NamedField::new(field.name.clone(), field.type_oid, true))
            .collect(),
    };

    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.name.as_str()) {
            return Err(UserSchemaError {
                message: format!("duplicate output column name \"{}\"", column.name),
                offset: None,
            }
            .into());
        }
    }

    Ok(StatementDescription {
        sql: preprocessed.sql,
        row_count: inference.row_count,
        affected_row_count: inference.affected_row_count,
        parameters,
        columns,
    })
}
