//! Tree-to-atom transformer.
//!
//! Walks the labeled parse tree produced by [`crate::parser`] into the atom
//! model consumed by the evaluator: `Number` nodes parse into number atoms,
//! `Name`/`Op` nodes become symbols, and `List` nodes become lists of their
//! transformed elements.
//!
//! Top-level forms are handed to the consumer one at a time through the
//! [`Forms`] iterator: each `next()` transforms exactly one form, so a form
//! is fully evaluated before the next one is produced and top-level forms
//! are always seen in source order.

use crate::Error;
use crate::ast::Value;
use crate::parser::{NodeLabel, ParseNode};

/// Transform one parse node into an atom.
///
/// The grammar and this transformer are co-designed: a `Number` node's text
/// always has the lexical shape of a decimal number, so a parse failure here
/// means the collaborator contract was violated. It is reported as a
/// [`Error::TransformError`] and aborts the run rather than crashing the
/// process.
pub fn transform(node: &ParseNode) -> Result<Value, Error> {
    match node.label {
        NodeLabel::Number => match node.text.parse::<f64>() {
            Ok(n) => Ok(Value::Number(n)),
            Err(_) => Err(Error::TransformError(format!(
                "number node with unparseable text: '{}'",
                node.text
            ))),
        },
        NodeLabel::Name | NodeLabel::Op => Ok(Value::Symbol(node.text.clone())),
        NodeLabel::List => {
            let elements = node
                .children
                .iter()
                .map(transform)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(elements))
        }
    }
}

/// One-at-a-time handoff of transformed top-level forms.
///
/// A synchronous generator over the parsed program: the consumer drives it,
/// and each form is transformed lazily when requested. Ordering is strict
/// source order.
pub struct Forms<'a> {
    nodes: std::slice::Iter<'a, ParseNode>,
}

impl<'a> Forms<'a> {
    pub fn new(nodes: &'a [ParseNode]) -> Self {
        Forms {
            nodes: nodes.iter(),
        }
    }
}

impl Iterator for Forms<'_> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next().map(transform)
    }
}
