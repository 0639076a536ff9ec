use super::ast::*;
use super::lexer::{SqlLexer, Token};
use crate::error::{DbError, DbResult};
use serde_json::Value;

/// Recursive-descent parser for the supported statement forms: CREATE
/// TABLE, INSERT INTO ... VALUES, SELECT ... FROM, UPDATE ... SET ...
/// WHERE, DELETE FROM ... WHERE. Anything else is a parse error.
pub struct SqlParser {
    tokens: Vec<Token>,
    position: usize,
}

impl SqlParser {
    pub fn new(input: &str) -> DbResult<Self> {
        let mut lexer = SqlLexer::new(input);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
        })
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: Token) -> DbResult<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(DbError::Parse(format!(
                "Expected {:?}, found {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    fn expect_identifier(&mut self) -> DbResult<String> {
        match self.current_token().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(DbError::Parse(format!(
                "Expected identifier, found {:?}",
                other
            ))),
        }
    }

    pub fn parse(&mut self) -> DbResult<Statement> {
        let stmt = match self.current_token() {
            Token::Create => self.parse_create_table()?,
            Token::Insert => self.parse_insert()?,
            Token::Select => self.parse_select()?,
            Token::Update => self.parse_update()?,
            Token::Delete => self.parse_delete()?,
            other => {
                return Err(DbError::Parse(format!(
                    "Unsupported statement: {:?}",
                    other
                )));
            }
        };

        // Optional semicolon at end
        if *self.current_token() == Token::Semicolon {
            self.advance();
        }

        if *self.current_token() != Token::Eof {
            return Err(DbError::Parse(format!(
                "Unexpected trailing input: {:?}",
                self.current_token()
            )));
        }

        Ok(stmt)
    }

    fn parse_create_table(&mut self) -> DbResult<Statement> {
        self.expect(Token::Create)?;
        self.expect(Token::Table)?;

        let table = self.expect_identifier()?;

        self.expect(Token::LeftParen)?;

        let mut columns = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let declared_type = self.parse_column_type()?;
            columns.push(ColumnDef {
                name,
                declared_type,
            });

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(Token::RightParen)?;

        Ok(Statement::CreateTable(CreateTableStatement {
            table,
            columns,
        }))
    }

    /// Consume the declared type of one column: every token up to the next
    /// top-level comma or closing paren, joined as text. Constraint text
    /// like `CHECK(rating BETWEEN 1 AND 5)` keeps its balanced parens.
    fn parse_column_type(&mut self) -> DbResult<String> {
        let mut parts: Vec<String> = Vec::new();
        let mut depth = 0usize;

        loop {
            match self.current_token() {
                Token::Comma if depth == 0 => break,
                Token::RightParen if depth == 0 => break,
                Token::Eof => {
                    return Err(DbError::Parse(
                        "Unterminated column definition".to_string(),
                    ));
                }
                Token::LeftParen => {
                    depth += 1;
                    parts.push("(".to_string());
                    self.advance();
                }
                Token::RightParen => {
                    depth -= 1;
                    parts.push(")".to_string());
                    self.advance();
                }
                token => {
                    parts.push(token_text(token));
                    self.advance();
                }
            }
        }

        Ok(parts.join(" "))
    }

    fn parse_insert(&mut self) -> DbResult<Statement> {
        self.expect(Token::Insert)?;
        self.expect(Token::Into)?;

        let table = self.expect_identifier()?;

        self.expect(Token::LeftParen)?;
        let columns = self.parse_identifier_list()?;
        self.expect(Token::RightParen)?;

        self.expect(Token::Values)?;

        self.expect(Token::LeftParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_bind_value()?);

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Token::RightParen)?;

        Ok(Statement::Insert(InsertStatement {
            table,
            columns,
            values,
        }))
    }

    fn parse_select(&mut self) -> DbResult<Statement> {
        self.expect(Token::Select)?;

        let columns = self.parse_projection_list()?;

        self.expect(Token::From)?;
        let table = self.expect_identifier()?;

        match self.current_token() {
            Token::Comma => {
                return Err(DbError::Parse(
                    "Only a single table may be referenced".to_string(),
                ));
            }
            Token::Join => {
                return Err(DbError::Parse("JOIN is not supported".to_string()));
            }
            _ => {}
        }

        let conditions = if *self.current_token() == Token::Where {
            self.advance();
            Some(self.parse_condition_list()?)
        } else {
            None
        };

        let order_by = if *self.current_token() == Token::Order {
            self.advance();
            self.expect(Token::By)?;
            Some(self.parse_order_by()?)
        } else {
            None
        };

        Ok(Statement::Select(SelectStatement {
            table,
            columns,
            conditions,
            order_by,
        }))
    }

    fn parse_update(&mut self) -> DbResult<Statement> {
        self.expect(Token::Update)?;

        let table = self.expect_identifier()?;

        self.expect(Token::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.expect_identifier()?;
            self.expect(Token::Equal)?;
            let value = self.parse_bind_value()?;
            assignments.push((column, value));

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(Token::Where)?;
        let conditions = self.parse_condition_list()?;

        Ok(Statement::Update(UpdateStatement {
            table,
            assignments,
            conditions,
        }))
    }

    fn parse_delete(&mut self) -> DbResult<Statement> {
        self.expect(Token::Delete)?;
        self.expect(Token::From)?;

        let table = self.expect_identifier()?;

        self.expect(Token::Where)?;
        let conditions = self.parse_condition_list()?;

        Ok(Statement::Delete(DeleteStatement { table, conditions }))
    }

    fn parse_projection_list(&mut self) -> DbResult<Vec<String>> {
        let mut columns = Vec::new();

        loop {
            match self.current_token().clone() {
                Token::Star => {
                    self.advance();
                    columns.push("*".to_string());
                }
                Token::Identifier(name) => {
                    self.advance();
                    if *self.current_token() == Token::Dot {
                        return Err(DbError::Parse(
                            "Qualified column references are not supported".to_string(),
                        ));
                    }
                    columns.push(name);
                }
                other => {
                    return Err(DbError::Parse(format!(
                        "Expected column name or *, found {:?}",
                        other
                    )));
                }
            }

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(columns)
    }

    fn parse_identifier_list(&mut self) -> DbResult<Vec<String>> {
        let mut list = Vec::new();

        loop {
            list.push(self.expect_identifier()?);

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        Ok(list)
    }

    /// Parse `cond (AND cond)*` where each condition is exactly
    /// `column op rhs`. OR, NOT, and parenthesized groups are rejected.
    fn parse_condition_list(&mut self) -> DbResult<Vec<Condition>> {
        let mut conditions = Vec::new();

        loop {
            conditions.push(self.parse_condition()?);

            match self.current_token() {
                Token::And => {
                    self.advance();
                }
                Token::Or => {
                    return Err(DbError::Parse(
                        "OR is not supported in WHERE clauses".to_string(),
                    ));
                }
                _ => break,
            }
        }

        Ok(conditions)
    }

    fn parse_condition(&mut self) -> DbResult<Condition> {
        if *self.current_token() == Token::LeftParen {
            return Err(DbError::Parse(
                "Parenthesized conditions are not supported".to_string(),
            ));
        }

        let column = self.expect_identifier()?;
        if *self.current_token() == Token::Dot {
            return Err(DbError::Parse(
                "Qualified column references are not supported".to_string(),
            ));
        }

        let op = match self.current_token() {
            Token::Equal => CompareOp::Eq,
            Token::Like => CompareOp::Like,
            Token::GreaterThan => CompareOp::Gt,
            Token::LessThan => CompareOp::Lt,
            Token::NotEqual | Token::GreaterThanEq | Token::LessThanEq => {
                return Err(DbError::Parse(format!(
                    "Operator {:?} is not supported; use =, LIKE, > or <",
                    self.current_token()
                )));
            }
            other => {
                return Err(DbError::Parse(format!(
                    "Expected comparison operator, found {:?}",
                    other
                )));
            }
        };
        self.advance();

        let rhs = self.parse_bind_value()?;

        Ok(Condition { column, op, rhs })
    }

    fn parse_order_by(&mut self) -> DbResult<OrderBy> {
        let column = self.expect_identifier()?;

        let descending = match self.current_token() {
            Token::Desc => {
                self.advance();
                true
            }
            Token::Asc => {
                self.advance();
                false
            }
            _ => false, // Default to ascending
        };

        if *self.current_token() == Token::Comma {
            return Err(DbError::Parse(
                "ORDER BY supports a single column".to_string(),
            ));
        }

        Ok(OrderBy { column, descending })
    }

    fn parse_bind_value(&mut self) -> DbResult<BindValue> {
        match self.current_token().clone() {
            Token::Placeholder(name) => {
                self.advance();
                Ok(BindValue::Placeholder(name))
            }
            Token::Integer(n) => {
                self.advance();
                Ok(BindValue::Literal(Value::from(n)))
            }
            Token::Float(f) => {
                self.advance();
                Ok(BindValue::Literal(
                    serde_json::Number::from_f64(f)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                ))
            }
            Token::Minus => {
                self.advance();
                match self.current_token().clone() {
                    Token::Integer(n) => {
                        self.advance();
                        Ok(BindValue::Literal(Value::from(-n)))
                    }
                    Token::Float(f) => {
                        self.advance();
                        Ok(BindValue::Literal(
                            serde_json::Number::from_f64(-f)
                                .map(Value::Number)
                                .unwrap_or(Value::Null),
                        ))
                    }
                    other => Err(DbError::Parse(format!(
                        "Expected number after '-', found {:?}",
                        other
                    ))),
                }
            }
            Token::String(s) => {
                self.advance();
                Ok(BindValue::Literal(Value::String(s)))
            }
            Token::True => {
                self.advance();
                Ok(BindValue::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(BindValue::Literal(Value::Bool(false)))
            }
            Token::Null => {
                self.advance();
                Ok(BindValue::Literal(Value::Null))
            }
            Token::Select => Err(DbError::Parse("Subqueries are not supported".to_string())),
            Token::LeftParen => Err(DbError::Parse(
                "Expression values are not supported".to_string(),
            )),
            other => Err(DbError::Parse(format!(
                "Expected a placeholder or literal, found {:?}",
                other
            ))),
        }
    }
}

/// Render a token back to text for advisory type strings.
fn token_text(token: &Token) -> String {
    match token {
        Token::Identifier(name) => name.clone(),
        Token::Integer(n) => n.to_string(),
        Token::Float(f) => f.to_string(),
        Token::String(s) => format!("'{}'", s),
        Token::Create => "CREATE".to_string(),
        Token::Table => "TABLE".to_string(),
        Token::Insert => "INSERT".to_string(),
        Token::Into => "INTO".to_string(),
        Token::Values => "VALUES".to_string(),
        Token::Select => "SELECT".to_string(),
        Token::From => "FROM".to_string(),
        Token::Where => "WHERE".to_string(),
        Token::Update => "UPDATE".to_string(),
        Token::Set => "SET".to_string(),
        Token::Delete => "DELETE".to_string(),
        Token::Order => "ORDER".to_string(),
        Token::By => "BY".to_string(),
        Token::And => "AND".to_string(),
        Token::Or => "OR".to_string(),
        Token::Join => "JOIN".to_string(),
        Token::Like => "LIKE".to_string(),
        Token::Asc => "ASC".to_string(),
        Token::Desc => "DESC".to_string(),
        Token::True => "TRUE".to_string(),
        Token::False => "FALSE".to_string(),
        Token::Null => "NULL".to_string(),
        Token::Equal => "=".to_string(),
        Token::NotEqual => "!=".to_string(),
        Token::LessThan => "<".to_string(),
        Token::LessThanEq => "<=".to_string(),
        Token::GreaterThan => ">".to_string(),
        Token::GreaterThanEq => ">=".to_string(),
        Token::Minus => "-".to_string(),
        Token::Star => "*".to_string(),
        Token::Comma => ",".to_string(),
        Token::Dot => ".".to_string(),
        Token::LeftParen => "(".to_string(),
        Token::RightParen => ")".to_string(),
        Token::Semicolon => ";".to_string(),
        Token::Placeholder(name) => {
            if name == "?" {
                "?".to_string()
            } else {
                format!(":{}", name)
            }
        }
        Token::Eof => String::new(),
    }
}

/// Parse a single statement.
pub fn parse(input: &str) -> DbResult<Statement> {
    let mut parser = SqlParser::new(input)?;
    parser.parse()
}
