//! Program loader: line classification and label table

use crate::error::{Fault, FaultResult, LoadError};
use crate::opcode::Opcode;
use std::collections::HashMap;
use std::str::FromStr;

/// One decoded instruction line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Decoded mnemonic
    pub opcode: Opcode,
    /// Everything after the mnemonic, trimmed
    pub operand: String,
}

impl Instruction {
    /// Whitespace-separated immediate arguments
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.operand.split_whitespace()
    }

    /// Immediate argument at `index`
    pub fn arg(&self, index: usize) -> FaultResult<&str> {
        self.args().nth(index).ok_or(Fault::MissingImmediate {
            op: self.opcode.mnemonic(),
            index,
        })
    }

    /// Parse the immediate argument at `index`
    pub fn parse_arg<T: FromStr>(&self, index: usize) -> FaultResult<T> {
        let arg = self.arg(index)?;
        arg.parse().map_err(|_| Fault::InvalidImmediate {
            op: self.opcode.mnemonic(),
            arg: arg.to_string(),
        })
    }
}

/// A classified source line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    /// Empty after comment stripping
    Blank,
    /// `#` directive or comment, including `#pragma`
    Comment,
    /// Branch target declaration, name without the colon
    Label(String),
    /// Executable instruction
    Instruction(Instruction),
    /// Mnemonic the interpreter does not implement
    Unsupported(String),
}

/// A loaded program
///
/// Every source line keeps its position, so index `i` is source line `i + 1`.
#[derive(Clone, Debug, Default)]
pub struct Program {
    lines: Vec<Line>,
    source: Vec<String>,
    labels: HashMap<String, usize>,
}

impl Program {
    /// Load newline-delimited program text
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        Self::from_lines(text.lines())
    }

    /// Load raw bytes, which must be UTF-8 text
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let text = std::str::from_utf8(bytes).map_err(|e| LoadError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;
        Self::parse(text)
    }

    /// Load an already-split sequence of lines
    pub fn from_lines<I, S>(lines: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut program = Program::default();
        for (index, raw) in lines.into_iter().enumerate() {
            let text = strip_comment(raw.as_ref()).trim();
            let line = classify(text, index + 1)?;
            if let Line::Label(name) = &line {
                if let Some(&first) = program.labels.get(name) {
                    return Err(LoadError::DuplicateLabel {
                        label: name.clone(),
                        first: first + 1,
                        line: index + 1,
                    });
                }
                program.labels.insert(name.clone(), index);
            }
            program.lines.push(line);
            program.source.push(text.to_string());
        }
        Ok(program)
    }

    /// Line index of a label
    pub fn resolve(&self, label: &str) -> FaultResult<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| Fault::UnknownLabel(label.to_string()))
    }

    /// Classified line at `index`
    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Source text of the line at `index`, comment stripped and trimmed
    pub fn source(&self, index: usize) -> &str {
        self.source.get(index).map(String::as_str).unwrap_or("")
    }

    /// All classified lines
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Label table
    pub fn labels(&self) -> &HashMap<String, usize> {
        &self.labels
    }

    /// Number of source lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the program has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of executable instruction lines
    pub fn instruction_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, Line::Instruction(_) | Line::Unsupported(_)))
            .count()
    }
}

impl FromStr for Program {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn classify(text: &str, line: usize) -> Result<Line, LoadError> {
    if text.is_empty() {
        return Ok(Line::Blank);
    }
    if text.starts_with('#') {
        return Ok(Line::Comment);
    }
    if let Some(name) = text.strip_suffix(':') {
        if !name.contains(char::is_whitespace) {
            if name.is_empty() {
                return Err(LoadError::EmptyLabel { line });
            }
            return Ok(Line::Label(name.to_string()));
        }
    }
    let (mnemonic, operand) = match text.split_once(char::is_whitespace) {
        Some((m, rest)) => (m, rest.trim()),
        None => (text, ""),
    };
    Ok(match Opcode::from_mnemonic(mnemonic) {
        Some(opcode) => Line::Instruction(Instruction {
            opcode,
            operand: operand.to_string(),
        }),
        None => Line::Unsupported(text.to_string()),
    })
}

/// Cut a trailing `//` comment that is not inside a string literal
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
        i += 1;
    }
    line
}
