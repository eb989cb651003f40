//! The prepared-statement probe.
//!
//! The server is the authority on parameter types, result column names, and
//! result column types. The probe prepares the rewritten statement under a
//! run-unique name, asks the server to describe it, and always releases the
//! statement again, on success and on every error path.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::catalog::oid::Oid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    pub message: String,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProbeError {}

impl From<tokio_postgres::Error> for ProbeError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// One column of the server's row description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub name: String,
    pub type_oid: Oid,
}

/// What the server reported about a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeDescription {
    pub param_oids: Vec<Oid>,
    pub row: Vec<FieldDescription>,
}

/// The minimal capability set the analyzer needs from a database connection:
/// prepare a named statement, describe it, and release it.
#[allow(async_fn_in_trait)]
pub trait ProbeConn {
    async fn prepare(&mut self, name: &str, sql: &str) -> Result<(), ProbeError>;
    async fn describe(&mut self, name: &str) -> Result<ProbeDescription, ProbeError>;
    async fn deallocate(&mut self, name: &str) -> Result<(), ProbeError>;
}

static PROBE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Prepare, describe, and deallocate under a run-unique statement name.
/// Deallocation runs even when describe fails.
pub async fn probe_statement<C: ProbeConn>(
    conn: &mut C,
    sql: &str,
) -> Result<ProbeDescription, ProbeError> {
    let name = format!(
        "sqlprobe_stmt_{}",
        PROBE_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    conn.prepare(&name, sql).await?;
    let described = conn.describe(&name).await;
    let released = conn.deallocate(&name).await;
    let description = described?;
    released?;
    Ok(description)
}

/// [`ProbeConn`] over a live `tokio_postgres` connection. Statements are
/// prepared through the extended protocol (Parse/Describe on the wire);
/// dropping the prepared statement closes it server-side.
pub struct PgProbeConn<'a> {
    client: &'a tokio_postgres::Client,
    statements: HashMap<String, tokio_postgres::Statement>,
}

impl<'a> PgProbeConn<'a> {
    pub fn new(client: &'a tokio_postgres::Client) -> Self {
        Self {
            client,
            statements: HashMap::new(),
        }
    }
}

impl ProbeConn for PgProbeConn<'_> {
    async fn prepare(&mut self, name: &str, sql: &str) -> Result<(), ProbeError> {
        let statement = self.client.prepare(sql).await?;
        self.statements.insert(name.to_string(), statement);
        Ok(())
    }

    async fn describe(&mut self, name: &str) -> Result<ProbeDescription, ProbeError> {
        let statement = self.statements.get(name).ok_or_else(|| ProbeError {
            message: format!("no prepared statement named {}", name),
        })?;
        Ok(ProbeDescription {
            param_oids: statement.params().iter().map(|t| t.oid()).collect(),
            row: statement
                .columns()
                .iter()
                .map(|c| FieldDescription {
                    name: c.name().to_string(),
                    type_oid: c.type_().oid(),
                })
                .collect(),
        })
    }

    async fn deallocate(&mut self, name: &str) -> Result<(), ProbeError> {
        self.statements.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted probe used by unit tests: one canned description, plus a
    /// trace of calls so the release discipline can be asserted.
    struct ScriptedProbe {
        description: Option<ProbeDescription>,
        fail_describe: bool,
        calls: Vec<String>,
    }

    impl ProbeConn for ScriptedProbe {
        async fn prepare(&mut self, name: &str, _sql: &str) -> Result<(), ProbeError> {
            self.calls.push(format!("prepare {}", name));
            Ok(())
        }

        async fn describe(&mut self, name: &str) -> Result<ProbeDescription, ProbeError> {
            self.calls.push(format!("describe {}", name));
            if self.fail_describe {
                return Err(ProbeError {
                    message: "boom".to_string(),
                });
            }
            Ok(self.description.clone().unwrap())
        }

        async fn deallocate(&mut self, name: &str) -> Result<(), ProbeError> {
            self.calls.push(format!("deallocate {}", name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn deallocates_after_successful_describe() {
        let mut probe = ScriptedProbe {
            description: Some(ProbeDescription {
                param_oids: vec![23],
                row: vec![],
            }),
            fail_describe: false,
            calls: vec![],
        };
        let got = probe_statement(&mut probe, "SELECT $1").await.unwrap();
        assert_eq!(got.param_oids, vec![23]);
        assert_eq!(probe.calls.len(), 3);
        assert!(probe.calls[2].starts_with("deallocate"));
    }

    #[tokio::test]
    async fn deallocates_even_when_describe_fails() {
        let mut probe = ScriptedProbe {
            description: None,
            fail_describe: true,
            calls: vec![],
        };
        let err = probe_statement(&mut probe, "SELECT 1").await.unwrap_err();
        assert_eq!(err.message, "boom");
        assert!(probe.calls[2].starts_with("deallocate"));
    }

    #[tokio::test]
    async fn probe_names_are_unique_per_call() {
        let mut probe = ScriptedProbe {
            description: Some(ProbeDescription {
                param_oids: vec![],
                row: vec![],
            }),
            fail_describe: false,
            calls: vec![],
        };
        probe_statement(&mut probe, "SELECT 1").await.unwrap();
        probe_statement(&mut probe, "SELECT 2").await.unwrap();
        assert_ne!(probe.calls[0], probe.calls[3]);
    }
}
