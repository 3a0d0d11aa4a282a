//! Query tokeniser
//!
//! Parses the comma-separated postfix query text into a [`Program`].
//!
//! # Token forms
//!
//! ```text
//! name,sps,:eq,(,nf.cluster,),:by,:sum,50e3,:gt
//! ```
//!
//! - words starting with `:` are operators
//! - `(` and `)` delimit a flat word list
//! - words that read as numbers (scientific notation included) are numeric
//! - anything else is a string literal
//!
//! The tokeniser assigns no meaning to operators; an empty input is a
//! valid empty program.

use crate::sql::error::{ParseError, ParseResult};
use crate::sql::token::{Program, Tok, Token};
use nom::combinator::all_consuming;
use nom::number::complete::double;

/// Parse query text into a program
pub fn parse_program(input: &str) -> ParseResult<Program> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut program = Vec::new();
    // Open word list: collected words plus the offset of its '('
    let mut list: Option<(Vec<String>, usize)> = None;
    let mut offset = 0_usize;

    for segment in input.split(',') {
        let trimmed = segment.trim();
        let tok_offset = offset + (segment.len() - segment.trim_start().len());

        match trimmed {
            "" => return Err(ParseError::EmptyToken { offset: tok_offset }),
            "(" => {
                if list.is_some() {
                    return Err(ParseError::NestedList { offset: tok_offset });
                }
                list = Some((Vec::new(), tok_offset));
            }
            ")" => match list.take() {
                Some((words, open_offset)) => program.push(Token {
                    tok: Tok::List(words),
                    offset: open_offset,
                }),
                None => return Err(ParseError::UnbalancedClose { offset: tok_offset }),
            },
            word => match &mut list {
                Some((words, _)) => words.push(word.to_string()),
                None => program.push(Token {
                    tok: classify(word, tok_offset)?,
                    offset: tok_offset,
                }),
            },
        }

        offset += segment.len() + 1;
    }

    if let Some((_, open_offset)) = list {
        return Err(ParseError::UnbalancedOpen {
            offset: open_offset,
        });
    }
    Ok(program)
}

/// Classify one bare word as operator, number, or string
fn classify(word: &str, offset: usize) -> ParseResult<Tok> {
    if let Some(name) = word.strip_prefix(':') {
        if name.is_empty() {
            return Err(ParseError::EmptyOperator { offset });
        }
        return Ok(Tok::Op(name.to_string()));
    }

    if looks_numeric(word) {
        if let Ok((_, n)) = all_consuming(double::<&str, nom::error::Error<&str>>)(word) {
            return Ok(Tok::Num(n));
        }
        // Purely numeric characters that still fail to parse (1.2.3, 5e)
        // are malformed numbers; mixed words like ff0000 stay strings.
        if word
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        {
            return Err(ParseError::BadNumber {
                token: word.to_string(),
                offset,
            });
        }
    }

    Ok(Tok::Str(word.to_string()))
}

/// True when a word opens like a number literal
fn looks_numeric(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-') | Some('+') | Some('.') => {
            matches!(chars.next(), Some(c) if c.is_ascii_digit())
        }
        _ => false,
    }
}
