use crate::ast::{AstPrinter, BinaryOperator, Expression, Scope, Statement, Visitor};
use crate::environment::{Environment, NameError};
use crate::loader::{self, Block, Line, LoadError};
use crate::parser::{self, ParseError};
use crate::scanner::{self, LexError};
use log::{debug, info};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("Integer overflow in {left} {operator} {right}.")]
    Overflow {
        operator: BinaryOperator,
        left: i64,
        right: i64,
    },
    #[error("Function '{name}' expected {expected} arguments, got {found}.")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("String \"{value}\" cannot be used as a number.")]
    NotANumber { value: String },
    #[error("Cannot return from top-level code.")]
    ReturnOutsideFunction,
    #[error("'else' without a matching 'if'.")]
    ElseWithoutIf,
    #[error("Maximum call depth of {limit} exceeded.")]
    CallDepthExceeded { limit: usize },
    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("[line {line}] Runtime Error: {source}")]
    Runtime { line: usize, source: RuntimeError },
}

/// Upper bound on `Config::max_call_depth`. Each script call nests several
/// native frames, so deeper recursion would overflow the thread's stack.
pub const MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config { max_call_depth: 64 }
    }
}

#[derive(Debug, PartialEq)]
enum Flow {
    Normal,
    Return,
}

pub struct Interpreter<W: Write> {
    pub environment: Environment,
    bodies: BTreeMap<String, Rc<Block>>,
    out: W,
    config: Config,
    line: usize,
}

impl<W: Write> Visitor<Expression, Result<i64, ScriptError>> for Interpreter<W> {
    fn visit(&mut self, expr: &Expression) -> Result<i64, ScriptError> {
        match expr {
            Expression::Number(x) => Ok(*x),
            Expression::Str(x) => Err(self.error(RuntimeError::NotANumber { value: x.clone() })),
            Expression::Identifier { name, scope } => self.lookup(name, *scope),
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let lv = self.evaluate(left)?;
                let rv = self.evaluate(right)?;
                self.binary(*operator, lv, rv)
            }
            Expression::Call { name, arguments } => self.call(name, arguments),
        }
    }
}

impl<W: Write> Visitor<Statement, Result<i64, ScriptError>> for Interpreter<W> {
    fn visit(&mut self, stmt: &Statement) -> Result<i64, ScriptError> {
        match stmt {
            Statement::Expression(e) => self.evaluate(e),
            Statement::Assignment {
                target,
                value,
                scope,
            } => {
                let val = self.evaluate(value)?;
                match scope {
                    Scope::Global => self.environment.define_global(target, val),
                    Scope::Local => self.environment.define_local(target, val),
                }
                Ok(val)
            }
            Statement::Print(args) => {
                let mut values: Vec<String> = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Expression::Str(x) => values.push(x.clone()),
                        Expression::Number(x) => values.push(x.to_string()),
                        _ => values.push(self.evaluate(arg)?.to_string()),
                    }
                }
                writeln!(self.out, "{}", values.join(" ")).map_err(|e| self.error(e.into()))?;
                Ok(0)
            }
            Statement::Conditional { clauses } => {
                for clause in clauses {
                    if self.evaluate(clause)? == 0 {
                        return Ok(0);
                    }
                }
                Ok(1)
            }
            Statement::Else => Err(self.error(RuntimeError::ElseWithoutIf)),
            Statement::FunctionDecl { name, params } => {
                debug!("declare {}({})", name, params.join(", "));
                self.environment.declare_function(name, params.clone());
                for param in params {
                    self.environment.define_local(param, 0);
                }
                Ok(0)
            }
            Statement::Return { name } => {
                let val = self
                    .environment
                    .get_local(name)
                    .map_err(|e| self.error(e.into()))?;
                match self.environment.set_return(val) {
                    Some(function) => {
                        self.environment.define_global(&function, val);
                        Ok(val)
                    }
                    None => Err(self.error(RuntimeError::ReturnOutsideFunction)),
                }
            }
        }
    }
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W) -> Interpreter<W> {
        Interpreter::with_config(out, Config::default())
    }
    /// A `max_call_depth` above `MAX_CALL_DEPTH` is lowered to it.
    pub fn with_config(out: W, mut config: Config) -> Interpreter<W> {
        config.max_call_depth = config.max_call_depth.min(MAX_CALL_DEPTH);
        Interpreter {
            environment: Environment::new(),
            bodies: BTreeMap::new(),
            out,
            config,
            line: 0,
        }
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn output(&self) -> &W {
        &self.out
    }
    pub fn into_output(self) -> W {
        self.out
    }

    /// Loads `source` into blocks and runs it at top level. The environment
    /// survives errors, so a prompt can keep using the same interpreter.
    pub fn run(&mut self, source: &str) -> Result<(), ScriptError> {
        let block = loader::load(source)?;
        info!("running {} top-level statements", block.len());
        self.run_block(&block)
    }
    pub fn run_block(&mut self, block: &[Line]) -> Result<(), ScriptError> {
        self.execute_block(block, Scope::Global)?;
        self.out.flush().map_err(|e| self.error(e.into()))?;
        Ok(())
    }
    pub fn evaluate(&mut self, expr: &Expression) -> Result<i64, ScriptError> {
        expr.accept(self)
    }
    pub fn execute(&mut self, stmt: &Statement) -> Result<i64, ScriptError> {
        stmt.accept(self)
    }

    fn execute_block(&mut self, block: &[Line], scope: Scope) -> Result<Flow, ScriptError> {
        // Outcome of the directly preceding `if` line, consumed by `else`.
        let mut branch: Option<bool> = None;
        for line in block {
            self.line = line.number;
            let tokens = scanner::tokenize(&line.text, line.number, &self.environment)?;
            let statement = parser::parse(&tokens, scope)?;
            debug!(
                "[line {}] {}",
                line.number,
                AstPrinter {}.print_statement(&statement)
            );
            let previous = branch.take();
            let flow = match &statement {
                Statement::Conditional { .. } => {
                    let taken = self.execute(&statement)? != 0;
                    branch = Some(taken);
                    if taken {
                        self.execute_block(&line.body, scope)?
                    } else {
                        Flow::Normal
                    }
                }
                Statement::Else => match previous {
                    Some(false) => self.execute_block(&line.body, scope)?,
                    Some(true) => Flow::Normal,
                    None => return Err(self.error(RuntimeError::ElseWithoutIf)),
                },
                Statement::FunctionDecl { name, .. } => {
                    self.execute(&statement)?;
                    self.bodies.insert(name.clone(), Rc::new(line.body.clone()));
                    Flow::Normal
                }
                Statement::Return { .. } => {
                    self.execute(&statement)?;
                    Flow::Return
                }
                _ => {
                    self.execute(&statement)?;
                    Flow::Normal
                }
            };
            if flow == Flow::Return {
                return Ok(Flow::Return);
            }
        }
        Ok(Flow::Normal)
    }

    fn lookup(&self, name: &str, scope: Scope) -> Result<i64, ScriptError> {
        let value = match scope {
            Scope::Global => self.environment.get_global(name),
            Scope::Local => {
                if self.environment.is_local(name) {
                    self.environment.get_local(name)
                } else {
                    self.environment.get_global(name)
                }
            }
        };
        value.map_err(|e| self.error(e.into()))
    }

    fn binary(&self, operator: BinaryOperator, l: i64, r: i64) -> Result<i64, ScriptError> {
        let result = match operator {
            BinaryOperator::Add => l.checked_add(r),
            BinaryOperator::Subtract => l.checked_sub(r),
            BinaryOperator::Multiply => l.checked_mul(r),
            BinaryOperator::Divide => {
                if r == 0 {
                    return Err(self.error(RuntimeError::DivisionByZero));
                }
                l.checked_div(r)
            }
            BinaryOperator::Equal => Some((l == r) as i64),
            BinaryOperator::Less => Some((l < r) as i64),
            BinaryOperator::LessEqual => Some((l <= r) as i64),
            BinaryOperator::Greater => Some((l > r) as i64),
            BinaryOperator::GreaterEqual => Some((l >= r) as i64),
        };
        result.ok_or_else(|| {
            self.error(RuntimeError::Overflow {
                operator,
                left: l,
                right: r,
            })
        })
    }

    fn call(&mut self, name: &str, arguments: &[Expression]) -> Result<i64, ScriptError> {
        let params = self
            .environment
            .lookup_function(name)
            .map_err(|e| self.error(e.into()))?
            .to_vec();
        if params.len() != arguments.len() {
            return Err(self.error(RuntimeError::Arity {
                name: name.to_string(),
                expected: params.len(),
                found: arguments.len(),
            }));
        }
        if self.environment.call_depth() >= self.config.max_call_depth {
            return Err(self.error(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            }));
        }
        let mut values: Vec<i64> = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument)?);
        }
        debug!("call {}{:?}", name, values);

        let body = self.bodies.get(name).cloned().unwrap_or_default();
        self.environment.define_global(name, 0);
        self.environment.push_frame(name);
        for (param, value) in params.iter().zip(values) {
            self.environment.define_local(param, value);
        }
        let caller_line = self.line;
        let result = self.execute_block(&body, Scope::Local);
        self.line = caller_line;
        let frame = self.environment.pop_frame();
        result?;
        Ok(frame.and_then(|f| f.return_value()).unwrap_or(0))
    }

    fn error(&self, err: RuntimeError) -> ScriptError {
        ScriptError::Runtime {
            line: self.line,
            source: err,
        }
    }
}

#[cfg(test)]
mod interpreter_tests {
    use crate::ast::{BinaryOperator, Expression, Scope};
    use crate::environment::NameError;
    use crate::interpreter::{Config, Interpreter, RuntimeError, ScriptError, MAX_CALL_DEPTH};

    fn run(source: &str) -> (Interpreter<Vec<u8>>, Result<(), ScriptError>) {
        let mut interpreter = Interpreter::new(Vec::new());
        let result = interpreter.run(source);
        (interpreter, result)
    }

    fn output(source: &str) -> String {
        let (interpreter, result) = run(source);
        assert!(result.is_ok(), "{}", result.unwrap_err());
        String::from_utf8(interpreter.into_output()).unwrap()
    }

    fn runtime_error(source: &str) -> (usize, RuntimeError) {
        match run(source).1 {
            Err(ScriptError::Runtime { line, source }) => (line, source),
            other => panic!("expected a runtime error, got {:?}", other),
        }
    }

    fn binary(operator: BinaryOperator, l: i64, r: i64) -> Expression {
        Expression::Binary {
            operator,
            left: Box::new(Expression::Number(l)),
            right: Box::new(Expression::Number(r)),
        }
    }

    #[test]
    fn number_literals() {
        let mut interpreter = Interpreter::new(Vec::new());
        for n in &[0, 1, -1, 42, i64::MAX, i64::MIN] {
            assert_eq!(interpreter.evaluate(&Expression::Number(*n)).unwrap(), *n);
        }
    }

    #[test]
    fn binary_operators() {
        let mut interpreter = Interpreter::new(Vec::new());
        let cases = vec![
            (BinaryOperator::Add, 7, 3, 10),
            (BinaryOperator::Subtract, 7, 10, -3),
            (BinaryOperator::Multiply, -4, 3, -12),
            (BinaryOperator::Divide, 7, 2, 3),
            (BinaryOperator::Divide, -7, 2, -3),
            (BinaryOperator::Equal, 2, 2, 1),
            (BinaryOperator::Equal, 2, 3, 0),
            (BinaryOperator::Less, 2, 3, 1),
            (BinaryOperator::Less, 3, 3, 0),
            (BinaryOperator::LessEqual, 3, 3, 1),
            (BinaryOperator::Greater, 4, 3, 1),
            (BinaryOperator::Greater, 3, 4, 0),
            (BinaryOperator::GreaterEqual, 3, 4, 0),
            (BinaryOperator::GreaterEqual, 4, 4, 1),
        ];
        for (operator, l, r, expected) in cases {
            assert_eq!(
                interpreter.evaluate(&binary(operator, l, r)).unwrap(),
                expected,
                "{} {} {}",
                l,
                operator,
                r
            );
        }
    }

    #[test]
    fn division_by_zero() {
        let mut interpreter = Interpreter::new(Vec::new());
        let result = interpreter.evaluate(&binary(BinaryOperator::Divide, 5, 0));
        assert!(matches!(
            result,
            Err(ScriptError::Runtime {
                source: RuntimeError::DivisionByZero,
                ..
            })
        ));
        let (line, err) = runtime_error("x = 1\ny = x / 0\n");
        assert_eq!(line, 2);
        assert!(matches!(err, RuntimeError::DivisionByZero));
    }

    #[test]
    fn overflow() {
        let (_, err) = runtime_error("x = 9223372036854775807 + 1\n");
        assert!(matches!(
            err,
            RuntimeError::Overflow {
                operator: BinaryOperator::Add,
                ..
            }
        ));
    }

    #[test]
    fn write_then_read() {
        let (interpreter, result) = run("x = 3\nx = x + 1\n");
        assert!(result.is_ok());
        assert_eq!(interpreter.environment.get_global("x"), Ok(4));
    }

    #[test]
    fn local_falls_back_to_global() {
        let mut interpreter = Interpreter::new(Vec::new());
        interpreter.environment.define_global("g", 7);
        interpreter.environment.push_frame("f");
        interpreter.environment.define_local("l", 1);
        let global = Expression::Identifier {
            name: "g".to_string(),
            scope: Scope::Local,
        };
        let local = Expression::Identifier {
            name: "l".to_string(),
            scope: Scope::Local,
        };
        let missing = Expression::Identifier {
            name: "m".to_string(),
            scope: Scope::Local,
        };
        assert_eq!(interpreter.evaluate(&global).unwrap(), 7);
        assert_eq!(interpreter.evaluate(&local).unwrap(), 1);
        assert!(matches!(
            interpreter.evaluate(&missing),
            Err(ScriptError::Runtime {
                source: RuntimeError::Name(NameError::UndefinedVariable { .. }),
                ..
            })
        ));
    }

    #[test]
    fn global_scope_ignores_locals() {
        let (_, err) = runtime_error("local x = 1\nprint(x)\n");
        assert!(matches!(
            err,
            RuntimeError::Name(NameError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn arithmetic_scenario() {
        assert_eq!(output("x = 3\ny = x + 4 * 2\nprint(y)\n"), "11\n");
    }

    #[test]
    fn conditional_scenario() {
        assert_eq!(
            output("a = 5\nb = 10\nif (a < b):\n    print(\"yes\")\n"),
            "yes\n"
        );
    }

    #[test]
    fn condition_starting_with_a_group() {
        let source = "\
a = 2
if (a) == 2:
    print(\"equal\")
if (a + 1) * 2 > 5:
    print(\"greater\")
if (a + 1) * 2 > 6:
    print(\"wrong\")
else:
    print(\"not greater\")
";
        assert_eq!(output(source), "equal\ngreater\nnot greater\n");
    }

    #[test]
    fn else_branch() {
        let source = "\
a = 5
if (a > 10):
    print(\"big\")
else:
    print(\"small\")
if (a > 1, a < 10):
    print(\"between\")
else:
    print(\"outside\")
";
        assert_eq!(output(source), "small\nbetween\n");
    }

    #[test]
    fn conditional_stops_at_first_false_clause() {
        let source = "\
def mark(v):
    return v
if (0 > 1, mark(1)):
    print(\"no\")
";
        let (interpreter, result) = run(source);
        assert!(result.is_ok());
        assert!(!interpreter.environment.is_global("mark"));
        assert!(interpreter.output().is_empty());

        let (interpreter, result) = run("def mark(v):\n    return v\nif (1, mark(1)):\n    x = 1\n");
        assert!(result.is_ok());
        assert_eq!(interpreter.environment.get_global("mark"), Ok(1));
    }

    #[test]
    fn function_return_sets_sentinel() {
        let source = "\
def f(p):
    r = p * p
    return r
f(6)
y = f(5)
";
        let (interpreter, result) = run(source);
        assert!(result.is_ok());
        assert_eq!(interpreter.environment.get_global("f"), Ok(25));
        assert_eq!(interpreter.environment.get_global("y"), Ok(25));
        assert!(!interpreter.environment.is_global("r"));

        let (interpreter, result) = run("def f(p):\n    r = p * p\n    return r\nf(6)\n");
        assert!(result.is_ok());
        assert_eq!(interpreter.environment.get_global("f"), Ok(36));
    }

    #[test]
    fn parameters_bind_by_position() {
        let source = "\
def area(width, height):
    result = width * height - height
    return result
print(area(3, 4))
";
        assert_eq!(output(source), "8\n");
    }

    #[test]
    fn nested_calls_get_their_own_frames() {
        let source = "\
def inner(x):
    y = x + 1
    return y
def outer(x):
    y = inner(x * 2)
    z = y + x
    return z
print(outer(5))
";
        assert_eq!(output(source), "16\n");
    }

    #[test]
    fn return_ends_the_body() {
        let source = "\
def first(a):
    if (a > 0):
        return a
    print(\"not positive\")
    zero = 0
    return zero
print(first(3))
print(first(-3))
";
        assert_eq!(output(source), "3\nnot positive\n0\n");
    }

    #[test]
    fn print_arguments() {
        assert_eq!(
            output("x = 3\nprint(\"x is\", x, x * 2, -1)\nprint()\n"),
            "x is 3 6 -1\n\n"
        );
    }

    #[test]
    fn runtime_errors() {
        let (line, err) = runtime_error("x = 1\nelse:\n    x = 2\n");
        assert_eq!(line, 2);
        assert!(matches!(err, RuntimeError::ElseWithoutIf));

        let (_, err) = runtime_error("def f(a, b):\n    return a\nf(1)\n");
        assert!(matches!(
            err,
            RuntimeError::Arity {
                expected: 2,
                found: 1,
                ..
            }
        ));

        let (_, err) = runtime_error("g(1)\n");
        assert!(matches!(
            err,
            RuntimeError::Name(NameError::UndefinedFunction { .. })
        ));

        let (_, err) = runtime_error("x = \"text\" + 1\n");
        assert!(matches!(err, RuntimeError::NotANumber { .. }));

        let (_, err) = runtime_error("local x = 1\nlocal return x\n");
        assert!(matches!(err, RuntimeError::ReturnOutsideFunction));
    }

    #[test]
    fn error_line_comes_from_function_body() {
        let source = "\
def broken(a):
    b = a / 0
    return b
x = broken(1)
";
        let (line, err) = runtime_error(source);
        assert_eq!(line, 2);
        assert!(matches!(err, RuntimeError::DivisionByZero));
    }

    #[test]
    fn call_depth_is_bounded() {
        let mut interpreter =
            Interpreter::with_config(Vec::new(), Config { max_call_depth: 8 });
        let result = interpreter.run("def again(n):\n    r = again(n)\n    return r\nagain(1)\n");
        assert!(matches!(
            result,
            Err(ScriptError::Runtime {
                source: RuntimeError::CallDepthExceeded { limit: 8 },
                ..
            })
        ));
        assert_eq!(interpreter.environment.call_depth(), 0);
    }

    #[test]
    fn call_depth_limit_is_capped() {
        let interpreter = Interpreter::with_config(
            Vec::new(),
            Config {
                max_call_depth: 100_000,
            },
        );
        assert_eq!(interpreter.config().max_call_depth, MAX_CALL_DEPTH);
        let interpreter = Interpreter::with_config(Vec::new(), Config { max_call_depth: 3 });
        assert_eq!(interpreter.config().max_call_depth, 3);
    }

    #[test]
    fn state_survives_between_runs() {
        let mut interpreter = Interpreter::new(Vec::new());
        assert!(interpreter.run("x = 2\n").is_ok());
        assert!(interpreter.run("y = x / 0\n").is_err());
        assert!(interpreter.run("print(x * 21)\n").is_ok());
        assert_eq!(String::from_utf8(interpreter.into_output()).unwrap(), "42\n");
    }

    #[test]
    fn front_end_errors_pass_through() {
        assert!(matches!(run("x = $\n").1, Err(ScriptError::Lex(_))));
        assert!(matches!(run("x = (1\n").1, Err(ScriptError::Parse(_))));
        assert!(matches!(run("  x = 1\n").1, Err(ScriptError::Load(_))));
    }
}
