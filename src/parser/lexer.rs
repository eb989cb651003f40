use std::fmt;

/// The reserved words of the supported grammar. An unquoted identifier that
/// matches one of these (case-insensitively) can never be used as a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    All,
    And,
    As,
    Asc,
    By,
    Default,
    Delete,
    Desc,
    Distinct,
    Except,
    Exists,
    False,
    First,
    From,
    Full,
    Group,
    Ilike,
    In,
    Inner,
    Insert,
    Intersect,
    Into,
    Is,
    Isnull,
    Join,
    Last,
    Left,
    Like,
    Limit,
    Not,
    Notnull,
    Null,
    Nulls,
    Offset,
    On,
    Or,
    Order,
    Outer,
    Returning,
    Right,
    Select,
    Set,
    True,
    Union,
    Unknown,
    Update,
    Using,
    Values,
    Where,
    With,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "all" => Some(Self::All),
            "and" => Some(Self::And),
            "as" => Some(Self::As),
            "asc" => Some(Self::Asc),
            "by" => Some(Self::By),
            "default" => Some(Self::Default),
            "delete" => Some(Self::Delete),
            "desc" => Some(Self::Desc),
            "distinct" => Some(Self::Distinct),
            "except" => Some(Self::Except),
            "exists" => Some(Self::Exists),
            "false" => Some(Self::False),
            "first" => Some(Self::First),
            "from" => Some(Self::From),
            "full" => Some(Self::Full),
            "group" => Some(Self::Group),
            "ilike" => Some(Self::Ilike),
            "in" => Some(Self::In),
            "inner" => Some(Self::Inner),
            "insert" => Some(Self::Insert),
            "intersect" => Some(Self::Intersect),
            "into" => Some(Self::Into),
            "is" => Some(Self::Is),
            "isnull" => Some(Self::Isnull),
            "join" => Some(Self::Join),
            "last" => Some(Self::Last),
            "left" => Some(Self::Left),
            "like" => Some(Self::Like),
            "limit" => Some(Self::Limit),
            "not" => Some(Self::Not),
            "notnull" => Some(Self::Notnull),
            "null" => Some(Self::Null),
            "nulls" => Some(Self::Nulls),
            "offset" => Some(Self::Offset),
            "on" => Some(Self::On),
            "or" => Some(Self::Or),
            "order" => Some(Self::Order),
            "outer" => Some(Self::Outer),
            "returning" => Some(Self::Returning),
            "right" => Some(Self::Right),
            "select" => Some(Self::Select),
            "set" => Some(Self::Set),
            "true" => Some(Self::True),
            "union" => Some(Self::Union),
            "unknown" => Some(Self::Unknown),
            "update" => Some(Self::Update),
            "using" => Some(Self::Using),
            "values" => Some(Self::Values),
            "where" => Some(Self::Where),
            "with" => Some(Self::With),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Eof,
    Keyword(Keyword),
    Identifier(String),
    String(String),
    Integer(i64),
    Float(String),
    Parameter(i32),
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Semicolon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Less,
    Greater,
    Equal,
    Typecast,
    LessEquals,
    GreaterEquals,
    NotEquals,
    Operator(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.position)
    }
}

impl std::error::Error for LexError {}

pub fn lex_sql(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).lex_all()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn lex_all(mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            if self.pos >= self.input.len() {
                out.push(Token {
                    kind: TokenKind::Eof,
                    start: self.pos,
                    end: self.pos,
                });
                break;
            }
            out.push(self.next_token()?);
        }
        Ok(out)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let Some(ch) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                start,
                end: start,
            });
        };

        if (ch == 'e' || ch == 'E') && self.peek_nth_char(1) == Some('\'') {
            self.advance_char();
            return self.lex_single_quoted_string(start, true);
        }

        if self.starts_with("::") {
            self.pos += 2;
            return Ok(self.mk(start, TokenKind::Typecast));
        }

        match ch {
            '\'' => self.lex_single_quoted_string(start, false),
            '"' => self.lex_quoted_identifier(start),
            '$' => self.lex_parameter(start),
            '.' if self.peek_nth_char(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.lex_number(start, true)
            }
            c if c.is_ascii_digit() => self.lex_number(start, false),
            c if is_ident_start(c) => self.lex_identifier_or_keyword(start),
            ',' => {
                self.pos += 1;
                Ok(self.mk(start, TokenKind::Comma))
            }
            '(' => {
                self.pos += 1;
                Ok(self.mk(start, TokenKind::LParen))
            }
            ')' => {
                self.pos += 1;
                Ok(self.mk(start, TokenKind::RParen))
            }
            '[' => {
                self.pos += 1;
                Ok(self.mk(start, TokenKind::LBracket))
            }
            ']' => {
                self.pos += 1;
                Ok(self.mk(start, TokenKind::RBracket))
            }
            ';' => {
                self.pos += 1;
                Ok(self.mk(start, TokenKind::Semicolon))
            }
            '.' => {
                self.pos += 1;
                Ok(self.mk(start, TokenKind::Dot))
            }
            c if is_operator_char(c) => self.lex_operator(start),
            _ => Err(LexError {
                message: format!("unexpected character '{}'", ch),
                position: start,
            }),
        }
    }

    fn mk(&self, start: usize, kind: TokenKind) -> Token {
        Token {
            kind,
            start,
            end: self.pos,
        }
    }

    fn lex_single_quoted_string(
        &mut self,
        start: usize,
        allow_backslash_escapes: bool,
    ) -> Result<Token, LexError> {
        let quote = self.advance_char();
        debug_assert_eq!(quote, Some('\''));

        let mut out = String::new();
        loop {
            let Some(c) = self.advance_char() else {
                return Err(LexError {
                    message: "unterminated quoted string".to_string(),
                    position: start,
                });
            };

            if c == '\'' {
                if self.peek_char() == Some('\'') {
                    self.advance_char();
                    out.push('\'');
                    continue;
                }
                break;
            }

            if c == '\\' {
                let Some(next) = self.advance_char() else {
                    return Err(LexError {
                        message: "unterminated escape sequence".to_string(),
                        position: self.pos,
                    });
                };
                let translated = if allow_backslash_escapes {
                    match next {
                        'b' => '\u{0008}',
                        'f' => '\u{000c}',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    }
                } else {
                    next
                };
                out.push(translated);
                continue;
            }

            out.push(c);
        }

        Ok(self.mk(start, TokenKind::String(out)))
    }

    fn lex_quoted_identifier(&mut self, start: usize) -> Result<Token, LexError> {
        let quote = self.advance_char();
        debug_assert_eq!(quote, Some('"'));

        let mut out = String::new();
        loop {
            let Some(c) = self.advance_char() else {
                return Err(LexError {
                    message: "unterminated quoted identifier".to_string(),
                    position: start,
                });
            };

            if c == '"' {
                if self.peek_char() == Some('"') {
                    self.advance_char();
                    out.push('"');
                    continue;
                }
                break;
            }

            if c == '\\' {
                let Some(next) = self.advance_char() else {
                    return Err(LexError {
                        message: "unterminated escape sequence".to_string(),
                        position: self.pos,
                    });
                };
                out.push(next);
                continue;
            }

            out.push(c);
        }

        if out.is_empty() {
            return Err(LexError {
                message: "zero-length delimited identifier".to_string(),
                position: start,
            });
        }

        clamp_identifier(&mut out);
        Ok(self.mk(start, TokenKind::Identifier(out)))
    }

    fn lex_parameter(&mut self, start: usize) -> Result<Token, LexError> {
        self.advance_char();
        if !self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            return Err(LexError {
                message: "expected parameter number after '$'".to_string(),
                position: start,
            });
        }
        let digits_start = self.pos;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance_char();
        }
        let raw = &self.input[digits_start..self.pos];
        let value = raw.parse::<i32>().map_err(|_| LexError {
            message: "parameter number too large".to_string(),
            position: start,
        })?;
        if value < 1 {
            return Err(LexError {
                message: "parameter numbers start at $1".to_string(),
                position: start,
            });
        }
        Ok(self.mk(start, TokenKind::Parameter(value)))
    }

    fn lex_number(&mut self, start: usize, leading_dot: bool) -> Result<Token, LexError> {
        if leading_dot {
            self.advance_char();
            let digit_start = self.pos;
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance_char();
            }
            let mut text = format!(".{}", &self.input[digit_start..self.pos]);
            self.consume_exponent(&mut text)?;
            return Ok(self.mk(start, TokenKind::Float(text)));
        }

        let int_start = self.pos;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance_char();
        }
        let mut text = self.input[int_start..self.pos].to_string();
        let mut is_float = false;

        if self.peek_char() == Some('.') && self.peek_nth_char(1) != Some('.') {
            is_float = true;
            self.advance_char();
            text.push('.');
            let frac_start = self.pos;
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance_char();
            }
            text.push_str(&self.input[frac_start..self.pos]);
        }

        if self.peek_char().is_some_and(|c| c == 'e' || c == 'E') {
            is_float = true;
            self.consume_exponent(&mut text)?;
        }

        if self.peek_char().is_some_and(is_ident_start) {
            return Err(LexError {
                message: "trailing junk after numeric literal".to_string(),
                position: self.pos,
            });
        }

        if is_float {
            return Ok(self.mk(start, TokenKind::Float(text)));
        }

        let value = text.parse::<i64>().map_err(|_| LexError {
            message: "integer literal out of range".to_string(),
            position: start,
        })?;
        Ok(self.mk(start, TokenKind::Integer(value)))
    }

    fn consume_exponent(&mut self, text: &mut String) -> Result<(), LexError> {
        let Some(c) = self.peek_char() else {
            return Ok(());
        };
        if c != 'e' && c != 'E' {
            return Ok(());
        }

        self.advance_char();
        text.push(c);

        if self
            .peek_char()
            .is_some_and(|sign| sign == '+' || sign == '-')
        {
            let sign = self.advance_char().unwrap_or('+');
            text.push(sign);
        }

        let digit_start = self.pos;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance_char();
        }

        if digit_start == self.pos {
            return Err(LexError {
                message: "trailing junk after numeric literal".to_string(),
                position: self.pos,
            });
        }
        text.push_str(&self.input[digit_start..self.pos]);
        Ok(())
    }

    fn lex_identifier_or_keyword(&mut self, start: usize) -> Result<Token, LexError> {
        self.advance_char();
        while self.peek_char().is_some_and(is_ident_cont) {
            self.advance_char();
        }
        let raw = &self.input[start..self.pos];
        let normalized = normalize_identifier(raw);

        if let Some(kw) = Keyword::from_ident(&normalized) {
            return Ok(self.mk(start, TokenKind::Keyword(kw)));
        }
        Ok(self.mk(start, TokenKind::Identifier(normalized)))
    }

    fn lex_operator(&mut self, start: usize) -> Result<Token, LexError> {
        let op_start = self.pos;
        while let Some(c) = self.peek_char() {
            if !is_operator_char(c) {
                break;
            }
            if self.starts_with("/*") || self.starts_with("--") {
                break;
            }
            self.advance_char();
        }

        if self.pos == op_start {
            return Err(LexError {
                message: "unexpected character while parsing operator".to_string(),
                position: start,
            });
        }

        // A multi-char operator can only end in '+' or '-' if it also
        // contains a char that cannot appear in a standard SQL operator.
        let mut op = self.input[op_start..self.pos].to_string();
        if op.len() > 1 && (op.ends_with('+') || op.ends_with('-')) {
            let has_non_sql_op_chars = op[..op.len() - 1]
                .chars()
                .any(|c| matches!(c, '~' | '!' | '@' | '#' | '^' | '&' | '|' | '`' | '?' | '%'));
            if !has_non_sql_op_chars {
                while op.len() > 1 && (op.ends_with('+') || op.ends_with('-')) {
                    op.pop();
                    self.pos -= 1;
                }
            }
        }

        let remapped = match op.as_str() {
            "=" => Some(TokenKind::Equal),
            "<" => Some(TokenKind::Less),
            ">" => Some(TokenKind::Greater),
            "+" => Some(TokenKind::Plus),
            "-" => Some(TokenKind::Minus),
            "*" => Some(TokenKind::Star),
            "/" => Some(TokenKind::Slash),
            "%" => Some(TokenKind::Percent),
            "^" => Some(TokenKind::Caret),
            "<=" => Some(TokenKind::LessEquals),
            ">=" => Some(TokenKind::GreaterEquals),
            "<>" | "!=" => Some(TokenKind::NotEquals),
            _ => None,
        };

        if let Some(kind) = remapped {
            return Ok(self.mk(start, kind));
        }
        Ok(self.mk(start, TokenKind::Operator(op)))
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            let mut progressed = false;
            while self.peek_char().is_some_and(is_sql_whitespace) {
                progressed = true;
                self.advance_char();
            }

            if self.starts_with("--") {
                progressed = true;
                self.pos += 2;
                while let Some(c) = self.peek_char() {
                    self.advance_char();
                    if c == '\n' || c == '\r' {
                        break;
                    }
                }
            } else if self.starts_with("/*") {
                progressed = true;
                let comment_start = self.pos;
                self.skip_block_comment(comment_start)?;
            }

            if !progressed {
                break;
            }
        }
        Ok(())
    }

    fn skip_block_comment(&mut self, comment_start: usize) -> Result<(), LexError> {
        self.pos += 2;
        let mut depth = 1usize;
        while self.pos < self.input.len() {
            if self.starts_with("/*") {
                depth += 1;
                self.pos += 2;
                continue;
            }
            if self.starts_with("*/") {
                depth -= 1;
                self.pos += 2;
                if depth == 0 {
                    return Ok(());
                }
                continue;
            }
            self.advance_char();
        }
        Err(LexError {
            message: "unterminated /* comment".to_string(),
            position: comment_start,
        })
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_nth_char(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn advance_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

/// Identifiers longer than this many bytes are silently shortened, the same
/// limit the server applies (NAMEDATALEN - 1).
const MAX_IDENTIFIER_BYTES: usize = 63;

/// Shorten an over-long identifier in place, never splitting a UTF-8
/// character.
fn clamp_identifier(ident: &mut String) {
    if ident.len() <= MAX_IDENTIFIER_BYTES {
        return;
    }
    let mut cut = MAX_IDENTIFIER_BYTES;
    while !ident.is_char_boundary(cut) {
        cut -= 1;
    }
    ident.truncate(cut);
}

/// Unquoted identifiers fold ASCII letters to lowercase and are then
/// length-clamped; anything outside ASCII passes through untouched.
fn normalize_identifier(raw: &str) -> String {
    let mut out: String = raw.chars().map(|c| c.to_ascii_lowercase()).collect();
    clamp_identifier(&mut out);
    out
}

// The whitespace set the server's scanner accepts, which is narrower than
// char::is_whitespace.
fn is_sql_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{b}' | '\u{c}')
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && c.is_alphabetic())
}

fn is_ident_cont(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '~' | '!'
            | '@'
            | '#'
            | '^'
            | '&'
            | '|'
            | '`'
            | '?'
            | '+'
            | '-'
            | '*'
            | '/'
            | '%'
            | '<'
            | '>'
            | '='
    )
}
