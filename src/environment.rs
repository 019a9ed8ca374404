use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Formatter;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Undefined variable '{name}'.")]
    UndefinedVariable { name: String },
    #[error("Undefined function '{name}'.")]
    UndefinedFunction { name: String },
}

/// Local bindings of one activation. The bottom frame belongs to the script
/// itself and has no function.
#[derive(Debug, Default)]
pub struct Frame {
    pub function: Option<String>,
    values: BTreeMap<String, i64>,
    return_value: Option<i64>,
}

impl Frame {
    pub fn new(function: Option<String>) -> Frame {
        Frame {
            function,
            values: BTreeMap::new(),
            return_value: None,
        }
    }
    pub fn return_value(&self) -> Option<i64> {
        self.return_value
    }
}

#[derive(Debug)]
pub struct Environment {
    globals: BTreeMap<String, i64>,
    frames: Vec<Frame>,
    functions: BTreeMap<String, Vec<String>>,
}

impl Default for Environment {
    fn default() -> Environment {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            globals: BTreeMap::new(),
            frames: vec![Frame::new(None)],
            functions: BTreeMap::new(),
        }
    }

    pub fn define_global(&mut self, name: &str, value: i64) {
        self.globals.insert(name.to_string(), value);
    }
    pub fn get_global(&self, name: &str) -> Result<i64, NameError> {
        self.globals
            .get(name)
            .copied()
            .ok_or_else(|| NameError::UndefinedVariable {
                name: name.to_string(),
            })
    }
    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    pub fn define_local(&mut self, name: &str, value: i64) {
        self.frame_mut().values.insert(name.to_string(), value);
    }
    pub fn get_local(&self, name: &str) -> Result<i64, NameError> {
        self.frame()
            .values
            .get(name)
            .copied()
            .ok_or_else(|| NameError::UndefinedVariable {
                name: name.to_string(),
            })
    }
    pub fn is_local(&self, name: &str) -> bool {
        self.frame().values.contains_key(name)
    }

    pub fn declare_function(&mut self, name: &str, params: Vec<String>) {
        self.functions.insert(name.to_string(), params);
    }
    pub fn lookup_function(&self, name: &str) -> Result<&[String], NameError> {
        self.functions
            .get(name)
            .map(|params| params.as_slice())
            .ok_or_else(|| NameError::UndefinedFunction {
                name: name.to_string(),
            })
    }
    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn push_frame(&mut self, function: &str) {
        self.frames.push(Frame::new(Some(function.to_string())));
    }
    pub fn pop_frame(&mut self) -> Option<Frame> {
        // The script frame stays for the lifetime of the environment.
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }
    /// Stores `value` in the return slot of the innermost call and returns the
    /// name of the function it belongs to, or `None` at top level.
    pub fn set_return(&mut self, value: i64) -> Option<String> {
        if !self.in_function() {
            return None;
        }
        let frame = self.frame_mut();
        frame.return_value = Some(value);
        frame.function.clone()
    }
    pub fn call_depth(&self) -> usize {
        self.frames.len() - 1
    }
    pub fn in_function(&self) -> bool {
        self.call_depth() > 0
    }

    fn frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }
    fn frame_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Global Variables:")?;
        for (name, value) in &self.globals {
            writeln!(f, "{} : {}", name, value)?;
        }
        writeln!(f, "Local Variables:")?;
        for (name, value) in &self.frame().values {
            writeln!(f, "{} : {}", name, value)?;
        }
        writeln!(f, "Function Declarations:")?;
        for (name, params) in &self.functions {
            writeln!(f, "Function: {}({})", name, params.join(", "))?;
        }
        Ok(())
    }
}
