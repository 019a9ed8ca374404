use crate::ast::{BinaryOperator, Expression, Scope, Statement};
use crate::token::{Token, TokenType};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}, column {column}] Parse Error at {location}: {message}")]
pub struct ParseError {
    pub message: String,
    pub location: String,
    pub line: usize,
    pub column: usize,
}

// Stands in for EOF when the token slice is empty.
static END: Token = Token {
    tokentype: TokenType::EOF,
    lexeme: String::new(),
    line: 0,
    column: 0,
};

/// Parses the tokens of one line into a statement. `scope` is the scope of
/// the enclosing block: `Local` inside a function body.
pub fn parse(tokens: &[Token], scope: Scope) -> Result<Statement, ParseError> {
    Parser::new(tokens, scope).parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    scope: Scope,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], scope: Scope) -> Parser<'a> {
        Parser {
            tokens,
            current: 0,
            scope,
        }
    }
    pub fn parse(&mut self) -> Result<Statement, ParseError> {
        let statement = self.statement()?;
        self.end_of_line()?;
        Ok(statement)
    }
    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let expr = self.expression()?;
        self.end_of_line()?;
        Ok(expr)
    }
    fn statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek().tokentype {
            TokenType::Local => {
                self.advance();
                self.scope = Scope::Local;
                self.statement()
            }
            TokenType::Print => {
                self.advance();
                self.print_statement()
            }
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::Else => {
                self.advance();
                self.consume(TokenType::Colon, "Expect ':' after 'else'.")?;
                Ok(Statement::Else)
            }
            TokenType::Def => {
                self.advance();
                self.function_declaration()
            }
            TokenType::Return => {
                self.advance();
                self.return_statement()
            }
            TokenType::Identifier | TokenType::Call
                if self.peek_next().tokentype == TokenType::Equal =>
            {
                let target = self.advance().lexeme.clone();
                self.advance();
                let value = self.expression()?;
                Ok(Statement::Assignment {
                    target,
                    value,
                    scope: self.scope,
                })
            }
            _ => Ok(Statement::Expression(self.expression()?)),
        }
    }
    fn print_statement(&mut self) -> Result<Statement, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'print'.")?;
        let arguments = self.arguments("Expect ',' or ')' after print argument.")?;
        Ok(Statement::Print(arguments))
    }
    fn if_statement(&mut self) -> Result<Statement, ParseError> {
        let clauses = self.clauses()?;
        self.consume(TokenType::Colon, "Expect ':' after if condition.")?;
        Ok(Statement::Conditional { clauses })
    }
    // `(c1, c2, ...)` is a clause list. Any other condition, parenthesized
    // or not, is a single expression.
    fn clauses(&mut self) -> Result<Vec<Expression>, ParseError> {
        let start = self.current;
        if self.match_token(TokenType::LeftParen) {
            let first = self.expression()?;
            if self.peek().tokentype == TokenType::Comma {
                let mut clauses = vec![first];
                while self.match_token(TokenType::Comma) {
                    clauses.push(self.expression()?);
                }
                self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;
                return Ok(clauses);
            }
            self.current = start;
        }
        Ok(vec![self.expression()?])
    }
    fn function_declaration(&mut self) -> Result<Statement, ParseError> {
        let name = self.name("Expect function name.")?;
        self.consume(TokenType::LeftParen, "Expect '(' after function name.")?;
        let mut params: Vec<String> = Vec::new();
        if self.peek().tokentype != TokenType::RightParen {
            loop {
                let param = self.name("Expect parameter name.")?;
                if params.contains(&param) {
                    return Err(self.error_at_previous("Duplicate parameter name."));
                }
                params.push(param);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenType::Colon, "Expect ':' after function signature.")?;
        Ok(Statement::FunctionDecl { name, params })
    }
    fn return_statement(&mut self) -> Result<Statement, ParseError> {
        if self.scope == Scope::Global {
            return Err(self.error_at_previous("Cannot return from top-level code."));
        }
        let name = self.name("Expect variable name after 'return'.")?;
        Ok(Statement::Return { name })
    }
    fn expression(&mut self) -> Result<Expression, ParseError> {
        self.comparison()
    }
    fn comparison(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.additive()?;
        loop {
            match self.peek().tokentype {
                TokenType::Less
                | TokenType::LessEqual
                | TokenType::Greater
                | TokenType::GreaterEqual
                | TokenType::EqualEqual => {
                    let operator = self.operator()?;
                    let right = self.additive()?;
                    expr = Expression::Binary {
                        operator,
                        left: Box::new(expr),
                        right: Box::new(right),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn additive(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.term()?;
        loop {
            match self.peek().tokentype {
                TokenType::Plus | TokenType::Minus => {
                    let operator = self.operator()?;
                    let right = self.term()?;
                    expr = Expression::Binary {
                        operator,
                        left: Box::new(expr),
                        right: Box::new(right),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn term(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.factor()?;
        loop {
            match self.peek().tokentype {
                TokenType::Star | TokenType::Slash => {
                    let operator = self.operator()?;
                    let right = self.factor()?;
                    expr = Expression::Binary {
                        operator,
                        left: Box::new(expr),
                        right: Box::new(right),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }
    fn factor(&mut self) -> Result<Expression, ParseError> {
        match self.peek().tokentype {
            TokenType::Number => {
                let token = self.advance();
                let value = i64::from_str(&token.lexeme)
                    .map_err(|_| self.error_at_previous("Invalid integer literal."))?;
                Ok(Expression::Number(value))
            }
            TokenType::Minus => {
                self.advance();
                if self.peek().tokentype == TokenType::Number {
                    let token = self.advance();
                    let value = i64::from_str(&format!("-{}", token.lexeme))
                        .map_err(|_| self.error_at_previous("Invalid integer literal."))?;
                    Ok(Expression::Number(value))
                } else {
                    let right = self.factor()?;
                    Ok(Expression::Binary {
                        operator: BinaryOperator::Subtract,
                        left: Box::new(Expression::Number(0)),
                        right: Box::new(right),
                    })
                }
            }
            TokenType::String => Ok(Expression::Str(self.advance().lexeme.clone())),
            TokenType::Call => {
                let name = self.advance().lexeme.clone();
                self.call(name)
            }
            TokenType::Identifier => {
                let name = self.advance().lexeme.clone();
                if self.peek().tokentype == TokenType::LeftParen {
                    self.call(name)
                } else {
                    Ok(Expression::Identifier {
                        name,
                        scope: self.scope,
                    })
                }
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(expr)
            }
            _ => Err(self.error("Expect expression.")),
        }
    }
    fn call(&mut self, name: String) -> Result<Expression, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after function name.")?;
        let arguments = self.arguments("Expect ',' or ')' after argument.")?;
        Ok(Expression::Call { name, arguments })
    }
    // Called after the opening parenthesis; consumes the closing one.
    fn arguments(&mut self, message: &str) -> Result<Vec<Expression>, ParseError> {
        let mut arguments: Vec<Expression> = Vec::new();
        if self.match_token(TokenType::RightParen) {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.expression()?);
            match self.peek().tokentype {
                TokenType::Comma => {
                    self.advance();
                }
                TokenType::RightParen => {
                    self.advance();
                    return Ok(arguments);
                }
                _ => return Err(self.error(message)),
            }
        }
    }
    fn operator(&mut self) -> Result<BinaryOperator, ParseError> {
        let token = self.advance();
        BinaryOperator::from_str(&token.lexeme)
            .map_err(|_| self.error_at_previous("Unknown operator."))
    }
    fn name(&mut self, message: &str) -> Result<String, ParseError> {
        match self.peek().tokentype {
            TokenType::Identifier | TokenType::Call => Ok(self.advance().lexeme.clone()),
            _ => Err(self.error(message)),
        }
    }
    fn end_of_line(&mut self) -> Result<(), ParseError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.error("Expect end of line."))
        }
    }
    fn consume(&mut self, tokentype: TokenType, message: &str) -> Result<&'a Token, ParseError> {
        if self.peek().tokentype == tokentype {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }
    fn match_token(&mut self, tokentype: TokenType) -> bool {
        if self.peek().tokentype == tokentype {
            self.advance();
            true
        } else {
            false
        }
    }
    fn advance(&mut self) -> &'a Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
    fn is_at_end(&self) -> bool {
        self.peek().tokentype == TokenType::EOF
    }
    fn peek(&self) -> &'a Token {
        self.tokens
            .get(self.current)
            .or_else(|| self.tokens.last())
            .unwrap_or(&END)
    }
    fn peek_next(&self) -> &'a Token {
        self.tokens
            .get(self.current + 1)
            .or_else(|| self.tokens.last())
            .unwrap_or(&END)
    }
    fn previous(&self) -> &'a Token {
        self.tokens
            .get(self.current.saturating_sub(1))
            .unwrap_or(&END)
    }
    fn error(&self, msg: &str) -> ParseError {
        Parser::error_at(self.peek(), msg)
    }
    fn error_at_previous(&self, msg: &str) -> ParseError {
        Parser::error_at(self.previous(), msg)
    }
    fn error_at(token: &Token, msg: &str) -> ParseError {
        ParseError {
            message: msg.to_string(),
            location: token.describe(),
            line: token.line,
            column: token.column,
        }
    }
}
