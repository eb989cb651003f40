use std::fmt;

use crate::parser::ast::{
    Assignment, DeleteStatement, Expression, FromClause, InsertSource, InsertStatement, Join,
    JoinType, Limit, NullsOrder, OrderBy, OrderDirection, SelectBody, SelectListItem, SelectOp,
    SelectStatement, SetOperator, SetQuantifier, SourceSpan, Statement, StatementKind, TableRef,
    UnaryOp, UpdateStatement, ValuesItem, WithQuery,
};
use crate::parser::lexer::{lex_sql, Keyword, LexError, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(value: LexError) -> Self {
        Self {
            message: value.message,
            position: value.position,
        }
    }
}

/// Parse one DML statement. The whole input must be consumed; trailing
/// input after the statement (other than semicolons) is an error.
pub fn parse_statement(sql: &str) -> Result<Statement, ParseError> {
    let tokens = lex_sql(sql)?;
    let mut parser = Parser::new(tokens);
    let start = parser.current_start();
    let kind = parser.parse_statement_kind()?;
    let end = parser.previous_end();
    while parser.consume_if(|k| matches!(k, TokenKind::Semicolon)) {}
    parser.expect_eof()?;
    Ok(Statement {
        kind,
        span: SourceSpan { start, end },
    })
}

struct Parser {
    tokens: Vec<Token>,
    idx: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, idx: 0 }
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn parse_statement_kind(&mut self) -> Result<StatementKind, ParseError> {
        let withs = if self.consume_keyword(Keyword::With) {
            self.parse_with_queries()?
        } else {
            Vec::new()
        };

        if self.consume_keyword(Keyword::Select) {
            return Ok(StatementKind::Select(self.parse_select_rest(withs)?));
        }
        if self.consume_keyword(Keyword::Insert) {
            return Ok(StatementKind::Insert(self.parse_insert_rest(withs)?));
        }
        if self.consume_keyword(Keyword::Update) {
            return Ok(StatementKind::Update(self.parse_update_rest(withs)?));
        }
        if self.consume_keyword(Keyword::Delete) {
            if !withs.is_empty() {
                return Err(self.error_at_current("WITH is not supported before DELETE"));
            }
            return Ok(StatementKind::Delete(self.parse_delete_rest()?));
        }
        Err(self.error_at_current("expected SELECT, INSERT, UPDATE or DELETE"))
    }

    fn parse_with_queries(&mut self) -> Result<Vec<WithQuery>, ParseError> {
        // WITH RECURSIVE lexes as an identifier; catch it for a clear error.
        if let TokenKind::Identifier(name) = self.peek_kind() {
            if name == "recursive" {
                return Err(self.error_at_current("recursive WITH queries are not supported"));
            }
        }

        let mut withs = vec![self.parse_with_query()?];
        while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
            withs.push(self.parse_with_query()?);
        }
        Ok(withs)
    }

    fn parse_with_query(&mut self) -> Result<WithQuery, ParseError> {
        let name = self.parse_identifier()?;
        let mut column_names = Vec::new();
        if self.consume_if(|k| matches!(k, TokenKind::LParen)) {
            column_names.push(self.parse_identifier()?);
            while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
                column_names.push(self.parse_identifier()?);
            }
            self.expect_token(
                |k| matches!(k, TokenKind::RParen),
                "expected ')' after WITH query column list",
            )?;
        }
        self.expect_keyword(Keyword::As, "expected AS in WITH query")?;
        self.expect_token(
            |k| matches!(k, TokenKind::LParen),
            "expected '(' before WITH query body",
        )?;
        let statement = self.parse_statement_kind()?;
        self.expect_token(
            |k| matches!(k, TokenKind::RParen),
            "expected ')' after WITH query body",
        )?;
        Ok(WithQuery {
            name,
            column_names,
            statement: Box::new(statement),
        })
    }

    /// A full SELECT statement in subquery position, with its own optional
    /// WITH prefix.
    fn parse_select_statement(&mut self) -> Result<SelectStatement, ParseError> {
        let withs = if self.consume_keyword(Keyword::With) {
            self.parse_with_queries()?
        } else {
            Vec::new()
        };
        self.expect_keyword(Keyword::Select, "expected SELECT")?;
        self.parse_select_rest(withs)
    }

    fn parse_select_rest(&mut self, withs: Vec<WithQuery>) -> Result<SelectStatement, ParseError> {
        let body = self.parse_select_body()?;

        let mut set_ops = Vec::new();
        loop {
            let op = if self.consume_keyword(Keyword::Union) {
                SetOperator::Union
            } else if self.consume_keyword(Keyword::Intersect) {
                SetOperator::Intersect
            } else if self.consume_keyword(Keyword::Except) {
                SetOperator::Except
            } else {
                break;
            };
            let quantifier = if self.consume_keyword(Keyword::All) {
                SetQuantifier::All
            } else {
                self.consume_keyword(Keyword::Distinct);
                SetQuantifier::Distinct
            };
            self.expect_keyword(Keyword::Select, "expected SELECT after set operator")?;
            set_ops.push(SelectOp {
                op,
                quantifier,
                body: self.parse_select_body()?,
            });
        }

        let mut order_by = Vec::new();
        if self.consume_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By, "expected BY after ORDER")?;
            order_by.push(self.parse_order_by_item()?);
            while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
                order_by.push(self.parse_order_by_item()?);
            }
        }

        let limit = if self.consume_keyword(Keyword::Limit) {
            let count = if self.consume_keyword(Keyword::All) {
                None
            } else {
                Some(self.parse_expression()?)
            };
            let offset = if self.consume_keyword(Keyword::Offset) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            Some(Limit { count, offset })
        } else {
            None
        };

        Ok(SelectStatement {
            withs,
            body,
            set_ops,
            order_by,
            limit,
        })
    }

    fn parse_select_body(&mut self) -> Result<SelectBody, ParseError> {
        let select_list = self.parse_select_list()?;

        let from = if self.consume_keyword(Keyword::From) {
            Some(self.parse_from_clause()?)
        } else {
            None
        };

        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.consume_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By, "expected BY after GROUP")?;
            group_by.push(self.parse_expression()?);
            while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
                group_by.push(self.parse_expression()?);
            }
        }

        Ok(SelectBody {
            select_list,
            from,
            where_clause,
            group_by,
        })
    }

    fn parse_select_list(&mut self) -> Result<Vec<SelectListItem>, ParseError> {
        let mut items = vec![self.parse_select_list_item()?];
        while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
            items.push(self.parse_select_list_item()?);
        }
        Ok(items)
    }

    fn parse_select_list_item(&mut self) -> Result<SelectListItem, ParseError> {
        if self.consume_if(|k| matches!(k, TokenKind::Star)) {
            return Ok(SelectListItem::AllFields);
        }

        if matches!(self.peek_kind(), TokenKind::Identifier(_))
            && matches!(self.peek_kind_at(1), TokenKind::Dot)
            && matches!(self.peek_kind_at(2), TokenKind::Star)
        {
            let table = self.parse_identifier()?;
            self.advance(); // '.'
            self.advance(); // '*'
            return Ok(SelectListItem::AllTableFields(table));
        }

        let expr = self.parse_expression()?;
        let alias = if self.consume_keyword(Keyword::As) {
            Some(self.parse_identifier()?)
        } else if matches!(self.peek_kind(), TokenKind::Identifier(_)) {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        Ok(SelectListItem::Expr { expr, alias })
    }

    fn parse_from_clause(&mut self) -> Result<FromClause, ParseError> {
        let table = self.parse_table_ref()?;

        let mut joins = Vec::new();
        loop {
            let kind = if self.consume_keyword(Keyword::Join) {
                JoinType::Inner
            } else if self.consume_keyword(Keyword::Inner) {
                self.expect_keyword(Keyword::Join, "expected JOIN after INNER")?;
                JoinType::Inner
            } else if self.consume_keyword(Keyword::Left) {
                self.consume_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join, "expected JOIN after LEFT")?;
                JoinType::Left
            } else if self.consume_keyword(Keyword::Right) {
                self.consume_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join, "expected JOIN after RIGHT")?;
                JoinType::Right
            } else if self.consume_keyword(Keyword::Full) {
                self.consume_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join, "expected JOIN after FULL")?;
                JoinType::Full
            } else {
                break;
            };

            let joined = self.parse_table_ref()?;
            self.expect_keyword(Keyword::On, "expected ON after joined table")?;
            let condition = self.parse_expression()?;
            joins.push(Join {
                kind,
                table: joined,
                condition,
            });
        }

        if matches!(self.peek_kind(), TokenKind::Comma) {
            return Err(
                self.error_at_current("comma-separated FROM is not supported; use an explicit JOIN")
            );
        }

        Ok(FromClause { table, joins })
    }

    fn parse_table_ref(&mut self) -> Result<TableRef, ParseError> {
        let name = self.parse_qualified_name()?;
        let alias = if self.consume_keyword(Keyword::As) {
            Some(self.parse_identifier()?)
        } else if matches!(self.peek_kind(), TokenKind::Identifier(_)) {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        Ok(TableRef { name, alias })
    }

    fn parse_order_by_item(&mut self) -> Result<OrderBy, ParseError> {
        let expr = self.parse_expression()?;
        let direction = if self.consume_keyword(Keyword::Asc) {
            Some(OrderDirection::Asc)
        } else if self.consume_keyword(Keyword::Desc) {
            Some(OrderDirection::Desc)
        } else if self.consume_keyword(Keyword::Using) {
            let op = self.parse_operator_symbol("expected operator after USING")?;
            Some(OrderDirection::Using(op))
        } else {
            None
        };
        let nulls = if self.consume_keyword(Keyword::Nulls) {
            if self.consume_keyword(Keyword::First) {
                Some(NullsOrder::First)
            } else if self.consume_keyword(Keyword::Last) {
                Some(NullsOrder::Last)
            } else {
                return Err(self.error_at_current("expected FIRST or LAST after NULLS"));
            }
        } else {
            None
        };
        Ok(OrderBy {
            expr,
            direction,
            nulls,
        })
    }

    fn parse_insert_rest(&mut self, withs: Vec<WithQuery>) -> Result<InsertStatement, ParseError> {
        self.expect_keyword(Keyword::Into, "expected INTO after INSERT")?;
        let name = self.parse_qualified_name()?;
        let alias = if self.consume_keyword(Keyword::As) {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        let table = TableRef { name, alias };

        let mut columns = Vec::new();
        if self.consume_if(|k| matches!(k, TokenKind::LParen)) {
            columns.push(self.parse_identifier()?);
            while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
                columns.push(self.parse_identifier()?);
            }
            self.expect_token(
                |k| matches!(k, TokenKind::RParen),
                "expected ')' after INSERT column list",
            )?;
        }

        let source = if self.consume_keyword(Keyword::Default) {
            self.expect_keyword(Keyword::Values, "expected VALUES after DEFAULT")?;
            InsertSource::DefaultValues
        } else {
            self.expect_keyword(Keyword::Values, "expected VALUES or DEFAULT VALUES")?;
            let mut rows = vec![self.parse_values_row()?];
            while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
                rows.push(self.parse_values_row()?);
            }
            InsertSource::Values(rows)
        };

        let returning = self.parse_optional_returning()?;

        Ok(InsertStatement {
            withs,
            table,
            columns,
            source,
            returning,
        })
    }

    fn parse_values_row(&mut self) -> Result<Vec<ValuesItem>, ParseError> {
        self.expect_token(
            |k| matches!(k, TokenKind::LParen),
            "expected '(' before VALUES row",
        )?;
        let mut row = vec![self.parse_values_item()?];
        while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
            row.push(self.parse_values_item()?);
        }
        self.expect_token(
            |k| matches!(k, TokenKind::RParen),
            "expected ')' after VALUES row",
        )?;
        Ok(row)
    }

    fn parse_values_item(&mut self) -> Result<ValuesItem, ParseError> {
        if self.consume_keyword(Keyword::Default) {
            return Ok(ValuesItem::Default);
        }
        Ok(ValuesItem::Expr(self.parse_expression()?))
    }

    fn parse_update_rest(&mut self, withs: Vec<WithQuery>) -> Result<UpdateStatement, ParseError> {
        let table = self.parse_table_ref()?;
        self.expect_keyword(Keyword::Set, "expected SET in UPDATE")?;

        let mut assignments = vec![self.parse_assignment()?];
        while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
            assignments.push(self.parse_assignment()?);
        }

        let from = if self.consume_keyword(Keyword::From) {
            Some(self.parse_from_clause()?)
        } else {
            None
        };

        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let returning = self.parse_optional_returning()?;

        Ok(UpdateStatement {
            withs,
            table,
            assignments,
            from,
            where_clause,
            returning,
        })
    }

    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let column = self.parse_identifier()?;
        self.expect_token(
            |k| matches!(k, TokenKind::Equal),
            "expected '=' in SET assignment",
        )?;
        let value = self.parse_expression()?;
        Ok(Assignment { column, value })
    }

    fn parse_delete_rest(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect_keyword(Keyword::From, "expected FROM after DELETE")?;
        let table = self.parse_table_ref()?;

        let where_clause = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let returning = self.parse_optional_returning()?;

        Ok(DeleteStatement {
            table,
            where_clause,
            returning,
        })
    }

    fn parse_optional_returning(&mut self) -> Result<Vec<SelectListItem>, ParseError> {
        if self.consume_keyword(Keyword::Returning) {
            self.parse_select_list()
        } else {
            Ok(Vec::new())
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────
    //
    // One method per precedence level, tightest at the bottom:
    //   or > and > not > is-tests > comparison > other operators / IN >
    //   additive > multiplicative > exponent > unary sign > subscript >
    //   typecast > primary

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.consume_keyword(Keyword::Or) {
            let rhs = self.parse_and()?;
            lhs = Expression::Binary {
                left: Box::new(lhs),
                op: "or".to_string(),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.consume_keyword(Keyword::And) {
            let rhs = self.parse_not()?;
            lhs = Expression::Binary {
                left: Box::new(lhs),
                op: "and".to_string(),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        // NOT IN / NOT LIKE are handled as postfix operators further down;
        // here NOT is only a prefix when it starts the (sub)expression.
        if self.peek_keyword(Keyword::Not)
            && !self.peek_keyword_at(1, Keyword::In)
            && !self.peek_keyword_at(1, Keyword::Like)
            && !self.peek_keyword_at(1, Keyword::Ilike)
        {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                expr: Box::new(operand),
            });
        }
        self.parse_is_test()
    }

    fn parse_is_test(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_comparison()?;
        loop {
            if self.consume_keyword(Keyword::Is) {
                let negated = self.consume_keyword(Keyword::Not);
                let op = if self.consume_keyword(Keyword::Null) {
                    if negated {
                        UnaryOp::IsNotNull
                    } else {
                        UnaryOp::IsNull
                    }
                } else if self.consume_keyword(Keyword::True) {
                    if negated {
                        UnaryOp::IsNotTrue
                    } else {
                        UnaryOp::IsTrue
                    }
                } else if self.consume_keyword(Keyword::False) {
                    if negated {
                        UnaryOp::IsNotFalse
                    } else {
                        UnaryOp::IsFalse
                    }
                } else if self.consume_keyword(Keyword::Unknown) {
                    if negated {
                        UnaryOp::IsNotUnknown
                    } else {
                        UnaryOp::IsUnknown
                    }
                } else {
                    return Err(
                        self.error_at_current("expected NULL, TRUE, FALSE or UNKNOWN after IS")
                    );
                };
                expr = Expression::Unary {
                    op,
                    expr: Box::new(expr),
                };
            } else if self.consume_keyword(Keyword::Isnull) {
                expr = Expression::Unary {
                    op: UnaryOp::IsNull,
                    expr: Box::new(expr),
                };
            } else if self.consume_keyword(Keyword::Notnull) {
                expr = Expression::Unary {
                    op: UnaryOp::IsNotNull,
                    expr: Box::new(expr),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_operator_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => "<",
                TokenKind::Greater => ">",
                TokenKind::Equal => "=",
                TokenKind::LessEquals => "<=",
                TokenKind::GreaterEquals => ">=",
                TokenKind::NotEquals => "<>",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_operator_expr()?;
            lhs = Expression::Binary {
                left: Box::new(lhs),
                op: op.to_string(),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    /// Level 8: generic (non-comparison, non-arithmetic) operators, LIKE and
    /// ILIKE, `[NOT] IN (subquery)`, and `EXISTS (subquery)`.
    fn parse_operator_expr(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = if self.consume_keyword(Keyword::Exists) {
            self.expect_token(
                |k| matches!(k, TokenKind::LParen),
                "expected '(' after EXISTS",
            )?;
            let subquery = self.parse_select_statement()?;
            self.expect_token(
                |k| matches!(k, TokenKind::RParen),
                "expected ')' after EXISTS subquery",
            )?;
            Expression::Exists(Box::new(subquery))
        } else {
            self.parse_additive()?
        };

        loop {
            if self.consume_keyword(Keyword::In) {
                lhs = self.parse_in_subquery(lhs, false)?;
            } else if self.peek_keyword(Keyword::Not) && self.peek_keyword_at(1, Keyword::In) {
                self.advance();
                self.advance();
                lhs = self.parse_in_subquery(lhs, true)?;
            } else if self.peek_keyword(Keyword::Not)
                && (self.peek_keyword_at(1, Keyword::Like)
                    || self.peek_keyword_at(1, Keyword::Ilike))
            {
                self.advance();
                let op = if self.consume_keyword(Keyword::Like) {
                    "like"
                } else {
                    self.expect_keyword(Keyword::Ilike, "expected LIKE or ILIKE after NOT")?;
                    "ilike"
                };
                let rhs = self.parse_additive()?;
                lhs = Expression::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(Expression::Binary {
                        left: Box::new(lhs),
                        op: op.to_string(),
                        right: Box::new(rhs),
                    }),
                };
            } else if self.consume_keyword(Keyword::Like) {
                let rhs = self.parse_additive()?;
                lhs = Expression::Binary {
                    left: Box::new(lhs),
                    op: "like".to_string(),
                    right: Box::new(rhs),
                };
            } else if self.consume_keyword(Keyword::Ilike) {
                let rhs = self.parse_additive()?;
                lhs = Expression::Binary {
                    left: Box::new(lhs),
                    op: "ilike".to_string(),
                    right: Box::new(rhs),
                };
            } else if let TokenKind::Operator(op) = self.peek_kind() {
                let op = op.clone();
                self.advance();
                let rhs = self.parse_additive()?;
                lhs = Expression::Binary {
                    left: Box::new(lhs),
                    op,
                    right: Box::new(rhs),
                };
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_in_subquery(
        &mut self,
        lhs: Expression,
        negated: bool,
    ) -> Result<Expression, ParseError> {
        self.expect_token(
            |k| matches!(k, TokenKind::LParen),
            "expected '(' after IN",
        )?;
        let subquery = self.parse_select_statement()?;
        self.expect_token(
            |k| matches!(k, TokenKind::RParen),
            "expected ')' after IN subquery",
        )?;
        Ok(Expression::InSubquery {
            expr: Box::new(lhs),
            negated,
            subquery: Box::new(subquery),
        })
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => "+",
                TokenKind::Minus => "-",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expression::Binary {
                left: Box::new(lhs),
                op: op.to_string(),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_exponent()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => "*",
                TokenKind::Slash => "/",
                TokenKind::Percent => "%",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_exponent()?;
            lhs = Expression::Binary {
                left: Box::new(lhs),
                op: op.to_string(),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_exponent(&mut self) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_unary_sign()?;
        while matches!(self.peek_kind(), TokenKind::Caret) {
            self.advance();
            let rhs = self.parse_unary_sign()?;
            lhs = Expression::Binary {
                left: Box::new(lhs),
                op: "^".to_string(),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary_sign(&mut self) -> Result<Expression, ParseError> {
        if self.consume_if(|k| matches!(k, TokenKind::Plus)) {
            let operand = self.parse_unary_sign()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Plus,
                expr: Box::new(operand),
            });
        }
        if self.consume_if(|k| matches!(k, TokenKind::Minus)) {
            let operand = self.parse_unary_sign()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Minus,
                expr: Box::new(operand),
            });
        }
        self.parse_subscript()
    }

    fn parse_subscript(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_cast()?;
        while self.consume_if(|k| matches!(k, TokenKind::LBracket)) {
            let index = self.parse_expression()?;
            self.expect_token(
                |k| matches!(k, TokenKind::RBracket),
                "expected ']' after subscript",
            )?;
            expr = Expression::Subscript {
                expr: Box::new(expr),
                index: Box::new(index),
            };
        }
        Ok(expr)
    }

    fn parse_cast(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.consume_if(|k| matches!(k, TokenKind::Typecast)) {
            let type_name = self.parse_type_name()?;
            expr = Expression::TypeCast {
                expr: Box::new(expr),
                type_name,
            };
        }
        Ok(expr)
    }

    fn parse_type_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.parse_identifier()?;
        // Empty bracket pairs are an array type suffix; a non-empty bracket
        // is a subscript and belongs to the level above.
        while matches!(self.peek_kind(), TokenKind::LBracket)
            && matches!(self.peek_kind_at(1), TokenKind::RBracket)
        {
            self.advance();
            self.advance();
            name.push_str("[]");
        }
        Ok(name)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(Expression::Integer(value))
            }
            TokenKind::Float(text) => {
                self.advance();
                Ok(Expression::Float(text))
            }
            TokenKind::String(text) => {
                self.advance();
                Ok(Expression::StringLiteral(text))
            }
            TokenKind::Parameter(index) => {
                self.advance();
                Ok(Expression::Parameter(index))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expression::Null)
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expression::Boolean(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expression::Boolean(false))
            }
            TokenKind::LParen => {
                self.advance();
                if self.peek_keyword(Keyword::Select) || self.peek_keyword(Keyword::With) {
                    return Err(
                        self.error_at_current("scalar subqueries are not supported here")
                    );
                }
                let expr = self.parse_expression()?;
                self.expect_token(
                    |k| matches!(k, TokenKind::RParen),
                    "expected ')' after parenthesized expression",
                )?;
                Ok(expr)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.consume_if(|k| matches!(k, TokenKind::Dot)) {
                    let column = self.parse_identifier()?;
                    if matches!(self.peek_kind(), TokenKind::Dot) {
                        return Err(self.error_at_current(
                            "schema-qualified column references are not supported",
                        ));
                    }
                    return Ok(Expression::TableColumnRef {
                        table: name,
                        column,
                    });
                }
                if self.consume_if(|k| matches!(k, TokenKind::LParen)) {
                    let args = self.parse_function_args()?;
                    return Ok(Expression::FunctionCall { name, args });
                }
                Ok(Expression::ColumnRef(name))
            }
            TokenKind::Keyword(_) => {
                Err(self.error_at_current("unexpected reserved word in expression"))
            }
            _ => Err(self.error_at_current("expected an expression")),
        }
    }

    fn parse_function_args(&mut self) -> Result<Vec<Expression>, ParseError> {
        if self.consume_if(|k| matches!(k, TokenKind::RParen)) {
            return Ok(Vec::new());
        }
        // count(*) carries no argument expression.
        if matches!(self.peek_kind(), TokenKind::Star) {
            self.advance();
            self.expect_token(
                |k| matches!(k, TokenKind::RParen),
                "expected ')' after '*'",
            )?;
            return Ok(Vec::new());
        }
        // Aggregate DISTINCT does not change types or nullability.
        self.consume_keyword(Keyword::Distinct);
        let mut args = vec![self.parse_expression()?];
        while self.consume_if(|k| matches!(k, TokenKind::Comma)) {
            args.push(self.parse_expression()?);
        }
        self.expect_token(
            |k| matches!(k, TokenKind::RParen),
            "expected ')' after function arguments",
        )?;
        Ok(args)
    }

    fn parse_operator_symbol(&mut self, message: &str) -> Result<String, ParseError> {
        let symbol = match self.peek_kind() {
            TokenKind::Less => "<".to_string(),
            TokenKind::Greater => ">".to_string(),
            TokenKind::Equal => "=".to_string(),
            TokenKind::LessEquals => "<=".to_string(),
            TokenKind::GreaterEquals => ">=".to_string(),
            TokenKind::NotEquals => "<>".to_string(),
            TokenKind::Operator(op) => op.clone(),
            _ => return Err(self.error_at_current(message)),
        };
        self.advance();
        Ok(symbol)
    }

    // ── Token plumbing ──────────────────────────────────────────────────

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek_kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Keyword(kw) => Err(self.error_at_current(&format!(
                "reserved word \"{}\" cannot be used as an identifier",
                format!("{:?}", kw).to_lowercase()
            ))),
            _ => Err(self.error_at_current("expected an identifier")),
        }
    }

    fn parse_qualified_name(&mut self) -> Result<Vec<String>, ParseError> {
        let mut parts = vec![self.parse_identifier()?];
        if self.consume_if(|k| matches!(k, TokenKind::Dot)) {
            parts.push(self.parse_identifier()?);
            if matches!(self.peek_kind(), TokenKind::Dot) {
                return Err(self.error_at_current("too many dotted name parts"));
            }
        }
        Ok(parts)
    }

    fn peek_kind(&self) -> &TokenKind {
        self.peek_kind_at(0)
    }

    fn peek_kind_at(&self, n: usize) -> &TokenKind {
        static EOF: TokenKind = TokenKind::Eof;
        self.tokens.get(self.idx + n).map_or(&EOF, |t| &t.kind)
    }

    fn peek_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn peek_keyword_at(&self, n: usize, kw: Keyword) -> bool {
        matches!(self.peek_kind_at(n), TokenKind::Keyword(k) if *k == kw)
    }

    fn consume_keyword(&mut self, kw: Keyword) -> bool {
        if self.peek_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, message: &str) -> Result<(), ParseError> {
        if self.consume_keyword(kw) {
            Ok(())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn consume_if(&mut self, pred: impl Fn(&TokenKind) -> bool) -> bool {
        if pred(self.peek_kind()) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_token(
        &mut self,
        pred: impl Fn(&TokenKind) -> bool,
        message: &str,
    ) -> Result<(), ParseError> {
        if self.consume_if(pred) {
            Ok(())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn advance(&mut self) {
        if !matches!(self.peek_kind(), TokenKind::Eof) {
            self.idx += 1;
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if matches!(self.peek_kind(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_at_current("unexpected input after statement"))
        }
    }

    fn error_at_current(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            position: self.current_start(),
        }
    }

    fn current_start(&self) -> usize {
        self.tokens
            .get(self.idx)
            .map_or(0, |t| t.start)
    }

    fn previous_end(&self) -> usize {
        self.tokens[..self.idx].last().map_or(0, |t| t.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Statement {
        parse_statement(sql).expect("statement should parse")
    }

    fn select(stmt: &Statement) -> &SelectStatement {
        match &stmt.kind {
            StatementKind::Select(s) => s,
            other => panic!("expected SELECT, got {other:?}"),
        }
    }

    #[test]
    fn parses_select_with_joins_where_group_order_limit() {
        let stmt = parse(
            "SELECT a.x, b.y AS why, count(*) cnt \
             FROM a LEFT OUTER JOIN b ON b.a_id = a.id \
             WHERE a.x > 1 AND b.y IS NOT NULL \
             GROUP BY a.x, b.y \
             ORDER BY a.x DESC NULLS LAST, b.y USING < \
             LIMIT 10 OFFSET 5",
        );
        let s = select(&stmt);
        assert_eq!(s.body.select_list.len(), 3);
        let from = s.body.from.as_ref().unwrap();
        assert_eq!(from.table.name, vec!["a"]);
        assert_eq!(from.joins.len(), 1);
        assert_eq!(from.joins[0].kind, JoinType::Left);
        assert!(s.body.where_clause.is_some());
        assert_eq!(s.body.group_by.len(), 2);
        assert_eq!(s.order_by.len(), 2);
        assert_eq!(s.order_by[0].nulls, Some(NullsOrder::Last));
        assert_eq!(
            s.order_by[1].direction,
            Some(OrderDirection::Using("<".to_string()))
        );
        let limit = s.limit.as_ref().unwrap();
        assert_eq!(limit.count, Some(Expression::Integer(10)));
        assert_eq!(limit.offset, Some(Expression::Integer(5)));
    }

    #[test]
    fn parses_star_and_table_star_items() {
        let stmt = parse("SELECT *, t.* FROM t");
        let s = select(&stmt);
        assert_eq!(s.body.select_list[0], SelectListItem::AllFields);
        assert_eq!(
            s.body.select_list[1],
            SelectListItem::AllTableFields("t".to_string())
        );
    }

    #[test]
    fn parses_set_operations() {
        let stmt = parse("SELECT x FROM a UNION ALL SELECT y FROM b EXCEPT SELECT z FROM c");
        let s = select(&stmt);
        assert_eq!(s.set_ops.len(), 2);
        assert_eq!(s.set_ops[0].op, SetOperator::Union);
        assert_eq!(s.set_ops[0].quantifier, SetQuantifier::All);
        assert_eq!(s.set_ops[1].op, SetOperator::Except);
        assert_eq!(s.set_ops[1].quantifier, SetQuantifier::Distinct);
    }

    #[test]
    fn parses_limit_all() {
        let stmt = parse("SELECT x FROM a LIMIT ALL");
        let s = select(&stmt);
        assert_eq!(s.limit, Some(Limit { count: None, offset: None }));
    }

    #[test]
    fn parses_with_queries() {
        let stmt = parse(
            "WITH adults (person_id) AS (SELECT id FROM person WHERE age >= 18), \
                  named AS (SELECT id FROM person WHERE name IS NOT NULL) \
             SELECT person_id FROM adults",
        );
        let s = select(&stmt);
        assert_eq!(s.withs.len(), 2);
        assert_eq!(s.withs[0].name, "adults");
        assert_eq!(s.withs[0].column_names, vec!["person_id"]);
        assert!(s.withs[1].column_names.is_empty());
    }

    #[test]
    fn parses_insert_with_values_and_returning() {
        let stmt = parse("INSERT INTO a (x, y) VALUES ($1, DEFAULT), ($2, 3) RETURNING id, x");
        let StatementKind::Insert(insert) = &stmt.kind else {
            panic!("expected INSERT");
        };
        assert_eq!(insert.table.name, vec!["a"]);
        assert_eq!(insert.columns, vec!["x", "y"]);
        let InsertSource::Values(rows) = &insert.source else {
            panic!("expected VALUES");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], ValuesItem::Default);
        assert_eq!(insert.returning.len(), 2);
    }

    #[test]
    fn parses_insert_default_values() {
        let stmt = parse("INSERT INTO a DEFAULT VALUES");
        let StatementKind::Insert(insert) = &stmt.kind else {
            panic!("expected INSERT");
        };
        assert_eq!(insert.source, InsertSource::DefaultValues);
        assert!(insert.returning.is_empty());
    }

    #[test]
    fn parses_update_with_from_and_returning() {
        let stmt = parse(
            "UPDATE a SET x = $1, y = a.y + 1 FROM b WHERE a.id = b.a_id RETURNING a.x",
        );
        let StatementKind::Update(update) = &stmt.kind else {
            panic!("expected UPDATE");
        };
        assert_eq!(update.assignments.len(), 2);
        assert!(update.from.is_some());
        assert!(update.where_clause.is_some());
        assert_eq!(update.returning.len(), 1);
    }

    #[test]
    fn parses_delete() {
        let stmt = parse("DELETE FROM a AS t WHERE t.id = $1 RETURNING id");
        let StatementKind::Delete(delete) = &stmt.kind else {
            panic!("expected DELETE");
        };
        assert_eq!(delete.table.alias.as_deref(), Some("t"));
        assert!(delete.where_clause.is_some());
    }

    #[test]
    fn binds_arithmetic_tighter_than_comparison() {
        let stmt = parse("SELECT 1 WHERE age + 5 < 60");
        let s = select(&stmt);
        let Some(Expression::Binary { left, op, .. }) = &s.body.where_clause else {
            panic!("expected binary WHERE");
        };
        assert_eq!(op, "<");
        assert!(matches!(&**left, Expression::Binary { op, .. } if op == "+"));
    }

    #[test]
    fn binds_is_null_looser_than_comparison() {
        let stmt = parse("SELECT 1 WHERE x = 1 IS NOT NULL");
        let s = select(&stmt);
        let Some(Expression::Unary { op, expr }) = &s.body.where_clause else {
            panic!("expected unary WHERE");
        };
        assert_eq!(*op, UnaryOp::IsNotNull);
        assert!(matches!(&**expr, Expression::Binary { op, .. } if op == "="));
    }

    #[test]
    fn parses_not_in_subquery() {
        let stmt = parse("SELECT 1 WHERE x NOT IN (SELECT y FROM b)");
        let s = select(&stmt);
        let Some(Expression::InSubquery { negated, .. }) = &s.body.where_clause else {
            panic!("expected IN expression");
        };
        assert!(negated);
    }

    #[test]
    fn parses_exists() {
        let stmt = parse("SELECT 1 WHERE EXISTS (SELECT 1 FROM b WHERE b.id = a.id)");
        let s = select(&stmt);
        assert!(matches!(
            s.body.where_clause,
            Some(Expression::Exists(_))
        ));
    }

    #[test]
    fn parses_typecast_chain_and_array_type() {
        let stmt = parse("SELECT x::int::text, y::int[]");
        let s = select(&stmt);
        let SelectListItem::Expr { expr, .. } = &s.body.select_list[0] else {
            panic!();
        };
        let Expression::TypeCast { type_name, expr } = expr else {
            panic!("expected cast");
        };
        assert_eq!(type_name, "text");
        assert!(matches!(&**expr, Expression::TypeCast { type_name, .. } if type_name == "int"));
        let SelectListItem::Expr { expr, .. } = &s.body.select_list[1] else {
            panic!();
        };
        assert!(matches!(expr, Expression::TypeCast { type_name, .. } if type_name == "int[]"));
    }

    #[test]
    fn unary_minus_wraps_subscript() {
        let stmt = parse("SELECT -xs[1]");
        let s = select(&stmt);
        let SelectListItem::Expr { expr, .. } = &s.body.select_list[0] else {
            panic!();
        };
        let Expression::Unary { op: UnaryOp::Minus, expr } = expr else {
            panic!("expected unary minus");
        };
        assert!(matches!(&**expr, Expression::Subscript { .. }));
    }

    #[test]
    fn rejects_reserved_word_as_identifier() {
        let err = parse_statement("SELECT x FROM select").unwrap_err();
        assert!(err.message.contains("reserved word"));
    }

    #[test]
    fn rejects_comma_separated_from() {
        let err = parse_statement("SELECT 1 FROM a, b").unwrap_err();
        assert!(err.message.contains("comma-separated FROM"));
    }

    #[test]
    fn rejects_recursive_with() {
        let err = parse_statement("WITH RECURSIVE t AS (SELECT 1) SELECT 1").unwrap_err();
        assert!(err.message.contains("recursive"));
    }

    #[test]
    fn rejects_trailing_garbage() {
        let err = parse_statement("SELECT 1 qux zut").unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }

    #[test]
    fn rejects_in_with_value_list() {
        assert!(parse_statement("SELECT 1 WHERE x IN (1, 2, 3)").is_err());
    }

    #[test]
    fn records_statement_span() {
        let stmt = parse("  SELECT 1  ;");
        assert_eq!(stmt.span.start, 2);
        assert_eq!(stmt.span.end, 10);
    }
}
