//! Placeholder rewriting.
//!
//! Queries arrive with named placeholders of the form `${name}`. PostgreSQL
//! only understands positional markers, so before anything else runs the
//! source is rewritten to `$1, $2, ...` while remembering the order in which
//! distinct names first appeared. Repeated occurrences of the same name map
//! to the same positional index.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedSql {
    /// The rewritten statement, ready to be prepared.
    pub sql: String,
    /// Placeholder names in first-appearance order; `param_names[k - 1]`
    /// corresponds to `$k` in the rewritten SQL.
    pub param_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessorError {
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for PreprocessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for PreprocessorError {}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    SingleQuoted,
    DoubleQuoted,
}

/// Rewrite `${name}` placeholders to `$k` positional markers.
///
/// Placeholders inside string literals (`'...'`) and quoted identifiers
/// (`"..."`) are left untouched. Literal `$n` markers already present in the
/// source pass through unchanged.
pub fn preprocess_sql(source: &str) -> Result<PreprocessedSql, PreprocessorError> {
    let mut sql = String::with_capacity(source.len());
    let mut param_names: Vec<String> = Vec::new();
    let mut mode = Mode::Normal;

    let mut chars = source.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        match mode {
            Mode::Normal => match ch {
                '\'' => {
                    mode = Mode::SingleQuoted;
                    sql.push(ch);
                }
                '"' => {
                    mode = Mode::DoubleQuoted;
                    sql.push(ch);
                }
                '$' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    let name = scan_placeholder_name(&mut chars, offset)?;
                    let index = match param_names.iter().position(|n| n == &name) {
                        Some(existing) => existing + 1,
                        None => {
                            param_names.push(name);
                            param_names.len()
                        }
                    };
                    sql.push('$');
                    sql.push_str(&index.to_string());
                }
                _ => sql.push(ch),
            },
            Mode::SingleQuoted => {
                sql.push(ch);
                match ch {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            sql.push(escaped);
                        }
                    }
                    '\'' => mode = Mode::Normal,
                    _ => {}
                }
            }
            Mode::DoubleQuoted => {
                sql.push(ch);
                match ch {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            sql.push(escaped);
                        }
                    }
                    '"' => mode = Mode::Normal,
                    _ => {}
                }
            }
        }
    }

    Ok(PreprocessedSql { sql, param_names })
}

fn scan_placeholder_name<I>(
    chars: &mut std::iter::Peekable<I>,
    start: usize,
) -> Result<String, PreprocessorError>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut name = String::new();
    loop {
        match chars.next() {
            Some((_, '}')) => break,
            Some((offset, ch)) => {
                let valid = if name.is_empty() {
                    ch == '_' || ch.is_ascii_alphabetic()
                } else {
                    ch == '_' || ch.is_ascii_alphanumeric()
                };
                if !valid {
                    return Err(PreprocessorError {
                        message: format!("invalid character '{}' in placeholder", ch),
                        offset,
                    });
                }
                name.push(ch);
            }
            None => {
                return Err(PreprocessorError {
                    message: "unterminated placeholder".to_string(),
                    offset: start,
                });
            }
        }
    }
    if name.is_empty() {
        return Err(PreprocessorError {
            message: "empty placeholder name".to_string(),
            offset: start,
        });
    }
    Ok(name)
}
