use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(i64),
    Str(String),
    Identifier {
        name: String,
        scope: Scope,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        name: String,
        arguments: Vec<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Assignment {
        target: String,
        value: Expression,
        scope: Scope,
    },
    Print(Vec<Expression>),
    /// Clauses are AND-ed together.
    Conditional {
        clauses: Vec<Expression>,
    },
    Else,
    FunctionDecl {
        name: String,
        params: Vec<String>,
    },
    Return {
        name: String,
    },
}

pub trait Visitor<T, Output> {
    fn visit(&mut self, n: &T) -> Output;
}

impl Expression {
    pub fn accept<T>(&self, v: &mut dyn Visitor<Expression, T>) -> T {
        v.visit(self)
    }
}

impl Statement {
    pub fn accept<T>(&self, v: &mut dyn Visitor<Statement, T>) -> T {
        v.visit(self)
    }
}

pub struct AstPrinter {}

impl AstPrinter {
    pub fn print_expression(&mut self, expression: &Expression) -> String {
        expression.accept::<String>(self)
    }
    pub fn print_statement(&mut self, statement: &Statement) -> String {
        statement.accept::<String>(self)
    }
    fn parenthesize(&mut self, name: &str, args: &[Expression]) -> String {
        let mut x = String::from("(");
        x.push_str(name);
        for arg in args {
            x.push_str(" ");
            x.push_str(self.print_expression(arg).as_str());
        }
        x.push_str(")");
        x
    }
}

impl Visitor<Expression, String> for AstPrinter {
    fn visit(&mut self, n: &Expression) -> String {
        match n {
            Expression::Number(x) => format!("{}", x),
            Expression::Str(x) => format!("\"{}\"", x),
            Expression::Identifier { name, scope } => match scope {
                Scope::Global => name.clone(),
                Scope::Local => format!("local.{}", name),
            },
            Expression::Binary {
                operator,
                left,
                right,
            } => format!(
                "({} {} {})",
                operator,
                self.print_expression(left),
                self.print_expression(right)
            ),
            Expression::Call { name, arguments } => {
                self.parenthesize(&format!("call {}", name), arguments)
            }
        }
    }
}

impl Visitor<Statement, String> for AstPrinter {
    fn visit(&mut self, n: &Statement) -> String {
        match n {
            Statement::Expression(e) => self.print_expression(e),
            Statement::Assignment {
                target,
                value,
                scope,
            } => match scope {
                Scope::Global => format!("(assign {} {})", target, self.print_expression(value)),
                Scope::Local => format!(
                    "(assign local.{} {})",
                    target,
                    self.print_expression(value)
                ),
            },
            Statement::Print(args) => self.parenthesize("print", args),
            Statement::Conditional { clauses } => self.parenthesize("if", clauses),
            Statement::Else => "(else)".to_string(),
            Statement::FunctionDecl { name, params } => {
                format!("(def {} ({}))", name, params.join(" "))
            }
            Statement::Return { name } => format!("(return {})", name),
        }
    }
}
