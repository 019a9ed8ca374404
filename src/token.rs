use strum_macros::Display;

#[rustfmt::skip]
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum TokenType {
    // Punctuation.
    LeftParen, RightParen, Comma, Colon,

    // Operators.
    Minus, Plus, Slash, Star,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,

    // Literals.
    Identifier, Call, String, Number,

    // Keywords.
    If, Else, Def, Return, Local, Print,

    EOF
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub tokentype: TokenType,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn describe(&self) -> String {
        match self.tokentype {
            TokenType::EOF => "end".to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}
