//! Operator and function nullability classification.
//!
//! An operator or function is *null-safe* when its result is NULL whenever
//! any argument is NULL; a function is *never-null* when its result is
//! non-NULL regardless of arguments. Everything unlisted is *unknown* and
//! treated as possibly NULL. These tables are deliberately data-driven:
//! extending coverage means adding a line, not a branch.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionNullability {
    NullSafe,
    NeverNull,
    Unknown,
}

/// Operators that map NULL to NULL in every argument position. `AND`, `OR`
/// and `NOT` are absent on purpose: three-valued logic maps NULL operands to
/// non-NULL results.
const NULL_SAFE_OPERATORS: &[&str] = &[
    // arithmetic
    "+", "-", "*", "/", "%", "^",
    // comparison
    "<", ">", "=", "<=", ">=", "<>",
    // string and pattern matching
    "||", "like", "ilike", "~", "~*", "!~", "!~*",
    // json / array access and containment
    "->", "->>", "#>", "#>>", "@>", "<@", "&&",
    // bit operations
    "&", "|", "#", "<<", ">>",
];

pub fn operator_null_safe(op: &str) -> bool {
    NULL_SAFE_OPERATORS.contains(&op)
}

/// Functions whose result is non-NULL regardless of argument nullability.
const NEVER_NULL_FUNCTIONS: &[&str] = &[
    "count",
    "concat",
    "concat_ws",
    "format",
    "num_nonnulls",
    "num_nulls",
    "now",
    "current_date",
    "current_timestamp",
    "current_user",
    "current_database",
    "random",
    "gen_random_uuid",
    "pg_typeof",
    "version",
];

/// Functions that return NULL iff some argument is NULL.
const NULL_SAFE_FUNCTIONS: &[&str] = &[
    // casts-as-functions
    "bool", "int2", "int4", "int8", "float4", "float8", "numeric", "text",
    // math
    "abs", "ceil", "ceiling", "floor", "round", "trunc", "sqrt", "cbrt", "exp",
    "ln", "log", "sign", "mod", "power", "div", "degrees", "radians",
    // strings
    "length", "char_length", "character_length", "octet_length", "bit_length",
    "lower", "upper", "initcap", "trim", "ltrim", "rtrim", "btrim", "lpad",
    "rpad", "substr", "substring", "replace", "translate", "reverse", "repeat",
    "left", "right", "split_part", "strpos", "position", "starts_with", "md5",
    "ascii", "chr", "to_hex", "quote_ident", "quote_literal",
    // date/time
    "date_trunc", "date_part", "extract", "age", "to_char", "to_number",
    "to_date", "to_timestamp", "make_date", "make_time",
    // arrays
    "array_length", "array_upper", "array_lower", "cardinality",
];

pub fn classify_function(name: &str) -> FunctionNullability {
    if NEVER_NULL_FUNCTIONS.contains(&name) {
        FunctionNullability::NeverNull
    } else if NULL_SAFE_FUNCTIONS.contains(&name) {
        FunctionNullability::NullSafe
    } else {
        FunctionNullability::Unknown
    }
}
