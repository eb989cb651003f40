//! The analyzer-wide error taxonomy.
//!
//! Every failure mode is one variant of [`AnalyzerError`]. Errors located in
//! the SQL source carry a byte offset; the rest carry only a message. Nothing
//! is caught inside the analyzer except to attach context (the probe error
//! carries the rewritten SQL that the server rejected).

use std::fmt;

use crate::catalog::CatalogError;
use crate::parser::ParseError;
use crate::preprocess::PreprocessorError;
use crate::probe::ProbeError;

/// An internal invariant violated during inference. Always a bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceError {
    pub message: String,
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for InferenceError {}

/// The query violates a usability rule (e.g. duplicate output column names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSchemaError {
    pub message: String,
    pub offset: Option<usize>,
}

impl fmt::Display for UserSchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UserSchemaError {}

#[derive(Debug)]
pub enum AnalyzerError {
    Preprocessor(PreprocessorError),
    Parse(ParseError),
    /// The server refused to prepare the statement. Carries the rewritten
    /// SQL so the server's message can be read against what was sent.
    Probe { error: ProbeError, sql: String },
    Catalog(CatalogError),
    Inference(InferenceError),
    UserSchema(UserSchemaError),
}

impl AnalyzerError {
    /// Stable kind tag for the diagnostic surface.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Preprocessor(_) => "preprocessor",
            Self::Parse(_) => "parse",
            Self::Probe { .. } => "probe",
            Self::Catalog(_) => "catalog",
            Self::Inference(_) => "inference",
            Self::UserSchema(_) => "user_schema",
        }
    }

    /// Byte offset into the SQL source, when the error is located there.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Preprocessor(err) => Some(err.offset),
            Self::Parse(err) => Some(err.position),
            Self::UserSchema(err) => err.offset,
            Self::Probe { .. } | Self::Catalog(_) | Self::Inference(_) => None,
        }
    }
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preprocessor(err) => write!(f, "{}", err),
            Self::Parse(err) => write!(f, "{}", err),
            Self::Probe { error, sql } => {
                write!(f, "{} (while preparing: {})", error, sql)
            }
            Self::Catalog(err) => write!(f, "{}", err),
            Self::Inference(err) => write!(f, "{}", err),
            Self::UserSchema(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AnalyzerError {}

impl From<PreprocessorError> for AnalyzerError {
    fn from(err: PreprocessorError) -> Self {
        Self::Preprocessor(err)
    }
}

impl From<ParseError> for AnalyzerError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<CatalogError> for AnalyzerError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err)
    }
}

impl From<InferenceError> for AnalyzerError {
    fn from(err: InferenceError) -> Self {
        Self::Inference(err)
    }
}

impl From<UserSchemaError> for AnalyzerError {
    fn from(err: UserSchemaError) -> Self {
        Self::UserSchema(err)
    }
}
