use std::iter::Peekable;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("[line {line}] Error: Tabs are not allowed in indentation.")]
    TabIndentation { line: usize },
    #[error("[line {line}] Error: Unexpected indent.")]
    UnexpectedIndent { line: usize },
    #[error("[line {line}] Error: Unindent does not match any outer indentation level.")]
    InconsistentDedent { line: usize },
    #[error("[line {line}] Error: Expected an indented block.")]
    ExpectedIndent { line: usize },
}

/// One source line together with the block it opens, if it ends in ':'.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub indent: usize,
    pub text: String,
    pub body: Block,
}

pub type Block = Vec<Line>;

struct RawLine<'a> {
    number: usize,
    indent: usize,
    text: &'a str,
    opens_block: bool,
}

/// Segments `source` into nested blocks by indentation. Blank and
/// comment-only lines are dropped.
pub fn load(source: &str) -> Result<Block, LoadError> {
    let mut lines: Vec<RawLine> = Vec::new();
    for (idx, text) in source.lines().enumerate() {
        let number = idx + 1;
        let code = strip_comment(text).trim_end();
        let trimmed = code.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        let leading = &code[..code.len() - trimmed.len()];
        if leading.contains('\t') {
            return Err(LoadError::TabIndentation { line: number });
        }
        lines.push(RawLine {
            number,
            indent: leading.len(),
            text: text.trim_end(),
            opens_block: trimmed.ends_with(':'),
        });
    }
    if let Some(first) = lines.first() {
        if first.indent > 0 {
            return Err(LoadError::UnexpectedIndent { line: first.number });
        }
    }
    block(&mut lines.iter().peekable(), 0)
}

// Collects consecutive lines at exactly `indent`, recursing into deeper
// lines after each block opener.
fn block<'a, 's: 'a, I>(iter: &mut Peekable<I>, indent: usize) -> Result<Block, LoadError>
where
    I: Iterator<Item = &'a RawLine<'s>>,
{
    let mut lines: Block = Vec::new();
    while let Some(raw) = iter.peek() {
        if raw.indent < indent {
            break;
        }
        if raw.indent > indent {
            return Err(LoadError::UnexpectedIndent { line: raw.number });
        }
        let raw = match iter.next() {
            Some(raw) => raw,
            None => break,
        };
        let mut body: Block = Vec::new();
        if raw.opens_block {
            match iter.peek().map(|next| next.indent) {
                Some(child) if child > raw.indent => body = block(iter, child)?,
                _ => return Err(LoadError::ExpectedIndent { line: raw.number }),
            }
            if let Some(next) = iter.peek() {
                if next.indent > indent {
                    return Err(LoadError::InconsistentDedent { line: next.number });
                }
            }
        }
        lines.push(Line {
            number: raw.number,
            indent: raw.indent,
            text: raw.text.to_string(),
            body,
        });
    }
    Ok(lines)
}

fn strip_comment(text: &str) -> &str {
    let mut in_string = false;
    for (idx, c) in text.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &text[..idx],
            _ => {}
        }
    }
    text
}
