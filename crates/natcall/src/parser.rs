//! Parser for `.ffi` signature files.
//!
//! # File Format
//!
//! ```text
//! # Comment lines start with #
//!
//! # Record layouts must be declared before their first use
//! record Result { N: i32, L: f32 }
//!
//! # Function signature: name: (arg_types) -> return_type
//! fib: (i32) -> i32
//! weird_function: (i32, f32, char) -> f64
//! hello: (cstr) -> void
//! simulate: (f32, f32) -> Result
//! fib_sequence: (i32, ptr_mut<u64>, ptr_mut<u64>) -> i32
//! ```
//!
//! # Supported Types
//!
//! - `f64`, `double` - 64-bit float
//! - `f32`, `float` - 32-bit float
//! - `i32`, `int` - 32-bit signed integer
//! - `i64`, `int64` - 64-bit signed integer
//! - `char` - single byte
//! - `cstr` - null-terminated byte string
//! - `ptr_mut<u64>` - caller-owned u64 output buffer
//! - `void` - no return value
//! - any declared record name, in return position

use crate::types::{NativeType, RecordField, RecordLayout, ScalarKind, Signature};
use std::collections::HashMap;
use std::path::Path;

/// Parsed signatures and record layouts for one library.
#[derive(Debug, Clone, Default)]
pub struct SignatureFile {
    /// Function signatures indexed by name.
    pub signatures: HashMap<String, Signature>,
    /// Record layouts indexed by name.
    pub records: HashMap<String, RecordLayout>,
}

impl SignatureFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `.ffi` file from a path.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ParseError {
            line: 0,
            message: format!("Failed to read file: {e}"),
        })?;
        Self::parse(&content)
    }

    /// Parse `.ffi` content from a string.
    pub fn parse(content: &str) -> Result<Self, ParseError> {
        let mut records: HashMap<String, RecordLayout> = HashMap::new();
        let mut signatures = HashMap::new();

        for (line_num, line) in content.lines().enumerate() {
            let line_num = line_num + 1; // 1-indexed for error messages
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("record ") {
                let layout = parse_record_line(rest, line_num)?;
                records.insert(layout.name.clone(), layout);
                continue;
            }

            let sig = parse_signature_line(line, &records, line_num)?;
            signatures.insert(sig.name.clone(), sig);
        }

        Ok(Self {
            signatures,
            records,
        })
    }

    /// Get a signature by function name.
    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name)
    }

    /// Get a record layout by name.
    pub fn record(&self, name: &str) -> Option<&RecordLayout> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signatures.contains_key(name)
    }

    /// Iterate over all signatures.
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.values()
    }
}

/// Error during signature file parsing.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: {}", self.line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a record declaration body: `Name { field: kind, ... }`
/// (the `record ` prefix is already stripped).
fn parse_record_line(rest: &str, line_num: usize) -> Result<RecordLayout, ParseError> {
    let open = rest.find('{').ok_or_else(|| ParseError {
        line: line_num,
        message: "Expected '{' in record declaration".to_string(),
    })?;
    let close = rest.rfind('}').ok_or_else(|| ParseError {
        line: line_num,
        message: "Unmatched '{' in record declaration".to_string(),
    })?;
    if close < open {
        return Err(ParseError {
            line: line_num,
            message: "Unmatched '}' in record declaration".to_string(),
        });
    }

    let name = rest[..open].trim();
    if name.is_empty() {
        return Err(ParseError {
            line: line_num,
            message: "Record name cannot be empty".to_string(),
        });
    }

    let mut fields = Vec::new();
    for part in rest[open + 1..close].split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let colon = part.find(':').ok_or_else(|| ParseError {
            line: line_num,
            message: format!("Expected ':' in record field '{part}'"),
        })?;
        let field_name = part[..colon].trim();
        let kind_str = part[colon + 1..].trim();
        let kind = ScalarKind::parse(kind_str).ok_or_else(|| ParseError {
            line: line_num,
            message: format!("Unknown record field kind: '{kind_str}'"),
        })?;
        fields.push(RecordField::new(field_name, kind));
    }

    if fields.is_empty() {
        return Err(ParseError {
            line: line_num,
            message: "Record must declare at least one field".to_string(),
        });
    }

    Ok(RecordLayout::new(name, fields))
}

/// Parse a single signature line: `name: (arg_types) -> return_type`
fn parse_signature_line(
    line: &str,
    records: &HashMap<String, RecordLayout>,
    line_num: usize,
) -> Result<Signature, ParseError> {
    // Split on ':' to get name and signature
    let colon_pos = line.find(':').ok_or_else(|| ParseError {
        line: line_num,
        message: "Expected ':' after function name".to_string(),
    })?;

    let name = line[..colon_pos].trim().to_string();
    if name.is_empty() {
        return Err(ParseError {
            line: line_num,
            message: "Function name cannot be empty".to_string(),
        });
    }

    let rest = line[colon_pos + 1..].trim();

    // Parse (arg_types) -> return_type
    let (args, ret) = parse_type_signature(rest, records, line_num)?;

    Ok(Signature::new(name, args, ret))
}

/// Parse `(arg_types) -> return_type`
fn parse_type_signature(
    s: &str,
    records: &HashMap<String, RecordLayout>,
    line_num: usize,
) -> Result<(Vec<NativeType>, NativeType), ParseError> {
    if !s.starts_with('(') {
        return Err(ParseError {
            line: line_num,
            message: "Expected '(' at start of type signature".to_string(),
        });
    }

    let close_paren = find_matching_paren(s).ok_or_else(|| ParseError {
        line: line_num,
        message: "Unmatched '(' in type signature".to_string(),
    })?;

    let args_str = &s[1..close_paren];
    let rest = s[close_paren + 1..].trim();

    // Parse arrow and return type
    let rest = rest.strip_prefix("->").ok_or_else(|| ParseError {
        line: line_num,
        message: "Expected '->' after argument list".to_string(),
    })?;
    let ret_str = rest.trim();

    let args = parse_arg_list(args_str, line_num)?;

    // The return type may name a previously declared record
    let ret = match NativeType::parse(ret_str) {
        Some(ty) => ty,
        None => match records.get(ret_str) {
            Some(layout) => NativeType::Record(layout.clone()),
            None => {
                return Err(ParseError {
                    line: line_num,
                    message: format!("Unknown return type: '{ret_str}'"),
                })
            }
        },
    };

    Ok((args, ret))
}

/// Parse comma-separated argument list, tracking `<...>` depth so pointer
/// parameters split correctly.
fn parse_arg_list(s: &str, line_num: usize) -> Result<Vec<NativeType>, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(vec![]);
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0;

    for ch in s.chars() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                args.push(parse_arg(&current, line_num)?);
                current.clear();
            }
            _ => {
                current.push(ch);
            }
        }
    }

    // Don't forget the last argument
    if !current.trim().is_empty() {
        args.push(parse_arg(&current, line_num)?);
    }

    Ok(args)
}

fn parse_arg(s: &str, line_num: usize) -> Result<NativeType, ParseError> {
    let s = s.trim();
    let ty = NativeType::parse(s).ok_or_else(|| ParseError {
        line: line_num,
        message: format!("Unknown argument type: '{s}'"),
    })?;
    if matches!(ty, NativeType::Void) {
        return Err(ParseError {
            line: line_num,
            message: format!("'{ty}' is only valid in return position"),
        });
    }
    Ok(ty)
}

/// Position of the parenthesis closing the argument list, skipping any
/// `<...>` nesting inside it.
fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' | '<' => depth += 1,
            ')' | '>' if depth > 1 => depth -= 1,
            ')' if depth == 1 => return Some(i),
            _ => {}
        }
    }
    None
}
