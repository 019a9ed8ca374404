use clap::{App, Arg, ErrorKind};
use log::info;
use minipy::interpreter::{Config, Interpreter, RuntimeError, ScriptError, MAX_CALL_DEPTH};
use num_enum::IntoPrimitive;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;

// sysexits(3)
#[derive(Debug, Clone, Copy, IntoPrimitive)]
#[repr(i32)]
enum ExitCode {
    Ok = 0,
    Usage = 64,
    DataErr = 65,
    Software = 70,
    IoErr = 74,
}

fn exit(code: ExitCode) -> ! {
    process::exit(code.into())
}

fn main() {
    env_logger::init();
    let app = App::new("minipy")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs scripts written in a small indentation-structured language")
        .arg(
            Arg::with_name("script")
                .value_name("SCRIPT")
                .help("Script to run. Starts an interactive prompt when omitted.")
                .index(1),
        )
        .arg(
            Arg::with_name("dump-env")
                .long("dump-env")
                .help("Prints variables and function declarations when done"),
        )
        .arg(
            Arg::with_name("max-depth")
                .long("max-depth")
                .value_name("N")
                .takes_value(true)
                .help("Maximum depth of nested function calls, at most 256"),
        );
    let matches = match app.get_matches_safe() {
        Ok(matches) => matches,
        Err(err) => match err.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => {
                println!("{}", err.message);
                exit(ExitCode::Ok)
            }
            _ => {
                eprintln!("{}", err.message);
                exit(ExitCode::Usage)
            }
        },
    };

    let mut config = Config::default();
    if let Some(depth) = matches.value_of("max-depth") {
        match parse_depth(depth) {
            Ok(depth) => config.max_call_depth = depth,
            Err(message) => {
                eprintln!("{}", message);
                exit(ExitCode::Usage)
            }
        }
    }
    let dump_env = matches.is_present("dump-env");

    let code = match matches.value_of("script") {
        Some(path) => run_file(path, config, dump_env),
        None => run_prompt(config, dump_env),
    };
    info!("exiting with {:?}", code);
    exit(code)
}

fn parse_depth(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(depth) if depth <= MAX_CALL_DEPTH => Ok(depth),
        Ok(_) => Err(format!(
            "--max-depth must be at most {}, got {}",
            MAX_CALL_DEPTH, value
        )),
        Err(_) => Err(format!("Invalid value for --max-depth: '{}'", value)),
    }
}

fn run_file(path: &str, config: Config, dump_env: bool) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read '{}': {}", path, err);
            return ExitCode::IoErr;
        }
    };
    info!("running {}", path);
    let mut interpreter = Interpreter::with_config(io::stdout(), config);
    let code = match interpreter.run(&source) {
        Ok(()) => ExitCode::Ok,
        Err(err) => {
            eprintln!("{}", err);
            exit_code(&err)
        }
    };
    if dump_env {
        print!("{}", interpreter.environment);
    }
    code
}

fn run_prompt(config: Config, dump_env: bool) -> ExitCode {
    let mut interpreter = Interpreter::with_config(io::stdout(), config);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let source = match read_statement(&mut lines) {
            Ok(Some(source)) => source,
            Ok(None) => break,
            Err(err) => {
                eprintln!("Could not read input: {}", err);
                return ExitCode::IoErr;
            }
        };
        if let Err(err) = interpreter.run(&source) {
            eprintln!("{}", err);
        }
    }
    println!();
    if dump_env {
        print!("{}", interpreter.environment);
    }
    ExitCode::Ok
}

// A line ending in ':' opens a block that continues until a blank line.
fn read_statement<B: BufRead>(lines: &mut io::Lines<B>) -> io::Result<Option<String>> {
    prompt("> ")?;
    let first = match lines.next() {
        Some(line) => line?,
        None => return Ok(None),
    };
    let mut source = format!("{}\n", first);
    if first.trim_end().ends_with(':') {
        loop {
            prompt("... ")?;
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    if line.trim().is_empty() {
                        break;
                    }
                    source.push_str(&line);
                    source.push('\n');
                }
                None => break,
            }
        }
    }
    Ok(Some(source))
}

fn prompt(text: &str) -> io::Result<()> {
    print!("{}", text);
    io::stdout().flush()
}

fn exit_code(err: &ScriptError) -> ExitCode {
    match err {
        ScriptError::Load(_) | ScriptError::Lex(_) | ScriptError::Parse(_) => ExitCode::DataErr,
        ScriptError::Runtime {
            source: RuntimeError::Io(_),
            ..
        } => ExitCode::IoErr,
        ScriptError::Runtime { .. } => ExitCode::Software,
    }
}

#[cfg(test)]
mod main_tests {
    use crate::{parse_depth, read_statement};
    use std::io::{BufRead, Cursor};

    #[test]
    fn block_continues_until_blank_line() {
        let mut lines = Cursor::new("def twice(a):\n    b = a * 2\n    return b\n\nprint(twice(4))\n").lines();
        assert_eq!(
            read_statement(&mut lines).unwrap(),
            Some("def twice(a):\n    b = a * 2\n    return b\n".to_string())
        );
        assert_eq!(
            read_statement(&mut lines).unwrap(),
            Some("print(twice(4))\n".to_string())
        );
        assert_eq!(read_statement(&mut lines).unwrap(), None);
    }

    #[test]
    fn end_of_input_closes_an_open_block() {
        let mut lines = Cursor::new("if (1):\n    x = 1").lines();
        assert_eq!(
            read_statement(&mut lines).unwrap(),
            Some("if (1):\n    x = 1\n".to_string())
        );
        assert_eq!(read_statement(&mut lines).unwrap(), None);
    }

    #[test]
    fn max_depth_values() {
        assert_eq!(parse_depth("10"), Ok(10));
        assert_eq!(parse_depth("256"), Ok(256));
        assert!(parse_depth("257").is_err());
        assert!(parse_depth("100000").is_err());
        assert!(parse_depth("deep").is_err());
    }
}
