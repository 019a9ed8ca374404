pub mod ast;
pub mod environment;
pub mod interpreter;
pub mod loader;
pub mod parser;
pub mod scanner;
pub mod token;

pub use crate::environment::Environment;
pub use crate::interpreter::{Config, Interpreter, RuntimeError, ScriptError, MAX_CALL_DEPTH};
