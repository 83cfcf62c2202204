//! S-expression parser producing a labeled parse tree.
//!
//! The grammar is deliberately small: a program is one or more parenthesized
//! lists, each list holds one or more atoms, and an atom is a number, a name,
//! or a nested list. Names match `[a-zA-Z/\-\*\+=><]+` and numbers match
//! `-?\d+\.?\d*`; whitespace separates atoms and is otherwise insignificant.
//!
//! The output is a tree of [`ParseNode`]s labeled `Number`, `Name`, `Op` or
//! `List` - the boundary consumed by the transformer. The parser knows
//! nothing about special forms or the atom model; it only recognizes shape.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit0, digit1, multispace0},
    combinator::{opt, recognize},
    error::ErrorKind,
    multi::many1,
    sequence::{pair, preceded, terminated},
};

use crate::ast::SYMBOL_SPECIAL_CHARS;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Label attached to every node of the parse tree.
///
/// `Name` and `Op` are interchangeable aliases for the symbol kind
/// downstream; the parser distinguishes them so that consumers can tell
/// `car` from `+` without re-lexing the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLabel {
    Number,
    Name,
    Op,
    List,
}

/// A node of the parse tree: a label, the matched text for leaves, and
/// the element nodes in order for lists.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseNode {
    pub label: NodeLabel,
    pub text: String,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    fn leaf(label: NodeLabel, text: &str) -> Self {
        ParseNode {
            label,
            text: text.to_owned(),
            children: Vec::new(),
        }
    }

    fn list(children: Vec<ParseNode>) -> Self {
        ParseNode {
            label: NodeLabel::List,
            text: String::new(),
            children,
        }
    }
}

/// Convert nom parsing errors into the structured [`ParseError`]
fn convert_nom_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            if e.code == ErrorKind::TooLarge {
                return ParseError::from_message(
                    ParseErrorKind::TooDeeplyNested,
                    format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                );
            }
            if position >= input.len() {
                ParseError::from_message(ParseErrorKind::Incomplete, "unexpected end of input")
            } else {
                ParseError::with_context(
                    ParseErrorKind::InvalidSyntax,
                    format!("invalid syntax at position {position}"),
                    input,
                    position,
                )
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "incomplete input")
        }
    }
}

/// Parse a number token: `-?\d+\.?\d*`
fn parse_number(input: &str) -> IResult<&str, ParseNode> {
    let (input, text) = recognize((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit0)),
    ))
    .parse(input)?;
    Ok((input, ParseNode::leaf(NodeLabel::Number, text)))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphabetic() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Parse a name token: `[a-zA-Z/\-\*\+=><]+`.
/// Pure operator spellings are labeled `Op`, everything else `Name`.
fn parse_name(input: &str) -> IResult<&str, ParseNode> {
    let (input, text) = take_while1(is_name_char).parse(input)?;
    let label = if text.chars().all(|c| SYMBOL_SPECIAL_CHARS.contains(c)) {
        NodeLabel::Op
    } else {
        NodeLabel::Name
    };
    Ok((input, ParseNode::leaf(label, text)))
}

/// Parse a parenthesized list of one or more atoms
fn parse_list(input: &str, depth: usize) -> IResult<&str, ParseNode> {
    let (input, _) = char('(').parse(input)?;
    let (input, children) = many1(|input| parse_atom(input, depth + 1)).parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char(')').parse(input)?;
    Ok((input, ParseNode::list(children)))
}

/// Parse one atom: a number, a name, or a nested list
fn parse_atom(input: &str, depth: usize) -> IResult<&str, ParseNode> {
    if depth >= MAX_PARSE_DEPTH {
        // Failure rather than Error: the depth limit must not be masked
        // by backtracking into the other alternatives
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    preceded(
        multispace0,
        alt((parse_number, parse_name, |input| parse_list(input, depth))),
    )
    .parse(input)
}

/// Parse a complete program: one or more parenthesized top-level forms.
pub fn parse_program(input: &str) -> Result<Vec<ParseNode>, Error> {
    match terminated(
        many1(preceded(multispace0, |input| parse_list(input, 0))),
        multispace0,
    )
    .parse(input)
    {
        Ok(("", forms)) => Ok(forms),
        Ok((remaining, _)) => {
            let offset = input.len() - remaining.len();
            Err(Error::ParseError(ParseError::with_context(
                ParseErrorKind::TrailingContent,
                "unexpected input after the last top-level form",
                input,
                offset,
            )))
        }
        Err(e) => Err(Error::ParseError(convert_nom_error(input, e))),
    }
}
