#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

/// A parsed top-level statement with its byte span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

/// One `name [(columns)] AS (statement)` entry of a WITH clause.
#[derive(Debug, Clone, PartialEq)]
pub struct WithQuery {
    pub name: String,
    /// Explicit output column names; empty when not given.
    pub column_names: Vec<String>,
    pub statement: Box<StatementKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub withs: Vec<WithQuery>,
    pub body: SelectBody,
    pub set_ops: Vec<SelectOp>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Limit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectBody {
    pub select_list: Vec<SelectListItem>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOp {
    pub op: SetOperator,
    pub quantifier: SetQuantifier,
    pub body: SelectBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetQuantifier {
    All,
    Distinct,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectListItem {
    /// `*`
    AllFields,
    /// `t.*`
    AllTableFields(String),
    Expr {
        expr: Expression,
        alias: Option<String>,
    },
}

/// A FROM clause: one base table followed by zero or more qualified joins.
/// Comma-separated FROM lists are not part of the grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: TableRef,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: Vec<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinType,
    pub table: TableRef,
    pub condition: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expression,
    pub direction: Option<OrderDirection>,
    pub nulls: Option<NullsOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
    Using(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// `LIMIT [ALL | count] [OFFSET n]`; `count` is None for LIMIT ALL.
#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub count: Option<Expression>,
    pub offset: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub withs: Vec<WithQuery>,
    pub table: TableRef,
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub returning: Vec<SelectListItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    DefaultValues,
    Values(Vec<Vec<ValuesItem>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValuesItem {
    Default,
    Expr(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub withs: Vec<WithQuery>,
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expression>,
    pub returning: Vec<SelectListItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: TableRef,
    pub where_clause: Option<Expression>,
    pub returning: Vec<SelectListItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    ColumnRef(String),
    TableColumnRef {
        table: String,
        column: String,
    },
    Null,
    Boolean(bool),
    Integer(i64),
    Float(String),
    StringLiteral(String),
    Parameter(i32),
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    /// Binary operators keep their source symbol (lowercased for keyword
    /// operators) so nullability classification can stay data-driven.
    Binary {
        left: Box<Expression>,
        op: String,
        right: Box<Expression>,
    },
    TypeCast {
        expr: Box<Expression>,
        type_name: String,
    },
    Subscript {
        expr: Box<Expression>,
        index: Box<Expression>,
    },
    InSubquery {
        expr: Box<Expression>,
        negated: bool,
        subquery: Box<SelectStatement>,
    },
    Exists(Box<SelectStatement>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    IsNull,
    IsNotNull,
    IsTrue,
    IsNotTrue,
    IsFalse,
    IsNotFalse,
    IsUnknown,
    IsNotUnknown,
}

impl UnaryOp {
    /// True for the `IS ...` family (including ISNULL/NOTNULL), whose result
    /// is a non-null boolean regardless of the operand.
    pub fn is_test(self) -> bool {
        !matches!(self, Self::Plus | Self::Minus | Self::Not)
    }
}
