use crate::environment::Environment;
use crate::token::{Token, TokenType};
use log::trace;
use phf::phf_map;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("[line {line}, column {column}] Error: Unexpected character '{character}'.")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("[line {line}, column {column}] Error: Unterminated string.")]
    UnterminatedString { line: usize, column: usize },
}

// Note: current becomes self.iter.peek()?.0
struct Scanner<'a> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    environment: &'a Environment,
    start: usize,
    line: usize,
}

/// Splits one source line into tokens. Names are classified against
/// `environment`: a declared function that no global shadows is a call.
pub fn tokenize(
    source: &str,
    line: usize,
    environment: &Environment,
) -> Result<Vec<Token>, LexError> {
    let mut scanner = Scanner {
        source,
        iter: source.char_indices().peekable(),
        environment,
        start: 0,
        line,
    };
    let mut tokens: Vec<Token> = Vec::new();
    while let Some((idx, _)) = scanner.iter.peek() {
        scanner.start = *idx;
        if let Some(token) = scanner.scan_token()? {
            tokens.push(token);
        }
    }
    tokens.push(Token {
        tokentype: TokenType::EOF,
        lexeme: String::new(),
        line,
        column: source.chars().count() + 1,
    });
    trace!(
        "[line {}] tokens: {:?}",
        line,
        tokens.iter().map(|t| &t.tokentype).collect::<Vec<_>>()
    );
    Ok(tokens)
}

impl<'a> Scanner<'a> {
    fn scan_token(&mut self) -> Result<Option<Token>, LexError> {
        let (_, c) = match self.iter.next() {
            Some(x) => x,
            None => return Ok(None),
        };
        match c {
            '(' => Ok(Some(self.token(TokenType::LeftParen))),
            ')' => Ok(Some(self.token(TokenType::RightParen))),
            ',' => Ok(Some(self.token(TokenType::Comma))),
            ':' => Ok(Some(self.token(TokenType::Colon))),
            '-' => Ok(Some(self.token(TokenType::Minus))),
            '+' => Ok(Some(self.token(TokenType::Plus))),
            '*' => Ok(Some(self.token(TokenType::Star))),
            '/' => Ok(Some(self.token(TokenType::Slash))),
            '=' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::EqualEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Equal)))
                }
            }
            '<' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::LessEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Less)))
                }
            }
            '>' => {
                if self.next_if('=') {
                    Ok(Some(self.token(TokenType::GreaterEqual)))
                } else {
                    Ok(Some(self.token(TokenType::Greater)))
                }
            }
            '#' => {
                while self.iter.next().is_some() {}
                Ok(None)
            }
            ' ' | '\r' | '\t' | '\n' => Ok(None),
            '"' => Ok(Some(self.string()?)),
            '0'..='9' => Ok(Some(self.number())),
            'a'..='z' | 'A'..='Z' => Ok(Some(self.identifier())),
            _ => Err(LexError::UnexpectedCharacter {
                character: c,
                line: self.line,
                column: self.column(),
            }),
        }
    }
    fn current(&mut self) -> usize {
        match self.iter.peek() {
            None => self.source.len(),
            Some((idx, _)) => *idx,
        }
    }
    fn column(&self) -> usize {
        self.source[..self.start].chars().count() + 1
    }
    fn token(&mut self, token_type: TokenType) -> Token {
        let current = self.current();
        Token {
            tokentype: token_type,
            lexeme: self.source[self.start..current].to_string(),
            line: self.line,
            column: self.column(),
        }
    }
    fn next_if(&mut self, expected: char) -> bool {
        match self.iter.peek() {
            Some((_, c)) if *c == expected => {
                self.iter.next();
                true
            }
            _ => false,
        }
    }
    fn string(&mut self) -> Result<Token, LexError> {
        loop {
            match self.iter.next() {
                Some((_, '"')) => break,
                Some(_) => {}
                None => {
                    return Err(LexError::UnterminatedString {
                        line: self.line,
                        column: self.column(),
                    })
                }
            }
        }
        let current = self.current();
        Ok(Token {
            tokentype: TokenType::String,
            lexeme: self.source[self.start + 1..current - 1].to_string(),
            line: self.line,
            column: self.column(),
        })
    }
    fn number(&mut self) -> Token {
        while let Some((_, c)) = self.iter.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.iter.next();
        }
        self.token(TokenType::Number)
    }
    fn identifier(&mut self) -> Token {
        while let Some((_, c)) = self.iter.peek() {
            if !c.is_ascii_alphanumeric() {
                break;
            }
            self.iter.next();
        }
        let current = self.current();
        let source = self.source;
        let name = &source[self.start..current];
        match KEYWORDS.get(name) {
            Some(x) => self.token(x.clone()),
            None => {
                if self.environment.is_function(name) && !self.environment.is_global(name) {
                    self.token(TokenType::Call)
                } else {
                    self.token(TokenType::Identifier)
                }
            }
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "def" => TokenType::Def,
    "else" => TokenType::Else,
    "if" => TokenType::If,
    "local" => TokenType::Local,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
};

#[cfg(test)]
mod scanner_tests {
    use crate::environment::Environment;
    use crate::scanner::{tokenize, LexError};
    use crate::token::TokenType;

    fn types(source: &str, env: &Environment) -> Vec<TokenType> {
        tokenize(source, 1, env)
            .unwrap()
            .into_iter()
            .map(|t| t.tokentype)
            .collect()
    }

    #[test]
    fn basic_scanner_test() {
        let env = Environment::new();
        let tokens = tokenize("x = 2", 1, &env).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].tokentype, TokenType::Identifier);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[1].tokentype, TokenType::Equal);
        assert_eq!(tokens[2].tokentype, TokenType::Number);
        assert_eq!(tokens[2].lexeme, "2");
        assert_eq!(tokens[2].column, 5);
        assert_eq!(tokens[3].tokentype, TokenType::EOF);
    }

    #[test]
    fn two_character_operators() {
        let env = Environment::new();
        assert_eq!(
            types("a<=b>=c==d<e>f=g", &env),
            vec![
                TokenType::Identifier,
                TokenType::LessEqual,
                TokenType::Identifier,
                TokenType::GreaterEqual,
                TokenType::Identifier,
                TokenType::EqualEqual,
                TokenType::Identifier,
                TokenType::Less,
                TokenType::Identifier,
                TokenType::Greater,
                TokenType::Identifier,
                TokenType::Equal,
                TokenType::Identifier,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn keywords_and_comments() {
        let env = Environment::new();
        assert_eq!(
            types("if (x): # trailing", &env),
            vec![
                TokenType::If,
                TokenType::LeftParen,
                TokenType::Identifier,
                TokenType::RightParen,
                TokenType::Colon,
                TokenType::EOF,
            ]
        );
        assert_eq!(types("    # only a comment", &env), vec![TokenType::EOF]);
    }

    #[test]
    fn print_arguments_are_raw_tokens() {
        let env = Environment::new();
        let tokens = tokenize("print(\"a b\", x)", 3, &env).unwrap();
        assert_eq!(tokens[0].tokentype, TokenType::Print);
        assert_eq!(tokens[2].tokentype, TokenType::String);
        assert_eq!(tokens[2].lexeme, "a b");
        assert_eq!(tokens[3].tokentype, TokenType::Comma);
        assert_eq!(tokens[4].line, 3);
    }

    #[test]
    fn call_classification() {
        let mut env = Environment::new();
        assert_eq!(types("f", &env)[0], TokenType::Identifier);
        env.declare_function("f", vec!["p".to_string()]);
        assert_eq!(types("f", &env)[0], TokenType::Call);
        env.define_global("f", 36);
        assert_eq!(types("f", &env)[0], TokenType::Identifier);
        env.declare_function("print", vec![]);
        assert_eq!(types("print", &env)[0], TokenType::Print);
    }

    #[test]
    fn unterminated_string() {
        let env = Environment::new();
        assert_eq!(
            tokenize("print(\"oops)", 7, &env),
            Err(LexError::UnterminatedString { line: 7, column: 7 })
        );
    }

    #[test]
    fn unexpected_character() {
        let env = Environment::new();
        assert_eq!(
            tokenize("my_var = 1", 2, &env),
            Err(LexError::UnexpectedCharacter {
                character: '_',
                line: 2,
                column: 3
            })
        );
    }
}
