//! This module defines the atom types and helper functions for representing
//! values in the interpreter. The main enum, [`Value`], covers every kind the
//! evaluator manipulates: numbers, symbols, booleans, lists, native functions
//! and user-defined procedures. Ergonomic helper functions such as [`val`],
//! [`sym`], and [`nil`] are provided for convenient atom construction in
//! tests. The module also implements conversion traits for common Rust
//! types; these conversions are what the native-function adapter uses to turn
//! host return values back into atoms.

use crate::evaluator::Environment;
use crate::evaluator::intooperation::OperationFn;
use crate::Error;

/// Type alias for number values in the interpreter (64-bit floats)
pub(crate) type NumberType = f64;

/// Allowed non-alphabetic characters in symbol names.
/// The source grammar admits names matching `[a-zA-Z/\-\*\+=><]+`.
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "/-*+=><";

/// Core atom type in the interpreter
///
/// Lists represent both code and data: a non-empty list evaluated as an
/// expression is a special form or an application, while a quoted list is
/// plain data. Atoms are never mutated in place; the only observable
/// mutation in the language is rebinding a symbol through `set`/`define`.
///
/// To build an atom in tests, use the ergonomic helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for empty lists
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Numbers (64-bit floating point)
    Number(NumberType),
    /// Symbols (identifiers and operators)
    Symbol(String),
    /// Boolean values, produced by comparison and consumed by `if`.
    /// The source grammar has no boolean literals.
    Bool(bool),
    /// Lists (the empty list represents nil)
    List(Vec<Value>),
    /// Native functions adapted to the uniform calling convention.
    /// Uses the id string for equality comparison instead of the
    /// function pointer; the id also names the operator in diagnostics.
    NativeFunction {
        id: String,
        // Stored as an Arc to allow dynamic wrapping of typed Rust
        // functions/closures. The trait object enables registering
        // strongly typed functions (e.g. fn(f64, f64) -> f64) that are
        // automatically converted to the canonical evaluator signature.
        func: std::sync::Arc<OperationFn>,
    },
    /// User-defined procedures (params, body, captured defining environment)
    Procedure {
        params: Vec<String>,
        body: Box<Value>,
        env: Environment,
    },
    /// The absent result of binding forms (`define`, `set`).
    /// These values never equal themselves or any other value and are
    /// never printed by the process surface.
    Unspecified,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::NativeFunction { id, .. } => write!(f, "NativeFunction({id})"),
            // The captured environment is deliberately omitted: a procedure
            // stored in the scope it captured would make the debug output
            // cyclic.
            Value::Procedure { params, body, .. } => {
                write!(f, "Procedure(params={params:?}, body={body:?})")
            }
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

// From trait implementations for Value - enables .into() conversion.
// These define the host-to-atom direction of the native adapter's return
// conversion: booleans become Bool, numerics become Number, text becomes
// Symbol (the language has no string kind), and sequences become List.

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Symbol(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Symbol(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_numeric {
    ($num_type:ty) => {
        impl From<$num_type> for Value {
            fn from(n: $num_type) -> Self {
                Value::Number(n as NumberType)
            }
        }
    };
}

// Generate From implementations for the numeric types a native function may
// return; everything widens losslessly into the 64-bit float representation.
impl_from_numeric!(i8);
impl_from_numeric!(i16);
impl_from_numeric!(i32);
impl_from_numeric!(u8);
impl_from_numeric!(u16);
impl_from_numeric!(u32);
impl_from_numeric!(f32);
impl_from_numeric!(NumberType); // Special case - no casting

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::List(slice.iter().cloned().map(|x| x.into()).collect())
    }
}

// A native function returning multiple values yields a List of the converted
// atoms in declaration order.

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::List(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::List(vec![a.into(), b.into(), c.into()])
    }
}

// Fallible conversions from `Value` back into primitive Rust types. These
// drive the atom-to-host direction of the adapter's parameter conversion.

impl std::convert::TryInto<NumberType> for Value {
    type Error = Error;

    fn try_into(self) -> Result<NumberType, Error> {
        if let Value::Number(n) = self {
            Ok(n)
        } else {
            Err(Error::TypeError("expected number".into()))
        }
    }
}

impl std::convert::TryInto<bool> for Value {
    type Error = Error;

    fn try_into(self) -> Result<bool, Error> {
        if let Value::Bool(b) = self {
            Ok(b)
        } else {
            Err(Error::TypeError("expected boolean".into()))
        }
    }
}

/// Helper function for creating symbols - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values - works great in mixed lists!
/// Accepts any type that can be converted to Value
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating empty lists (nil) - follows Lisp conventions
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::List(vec![])
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::NativeFunction { id, .. } => write!(f, "#<native-function:{id}>"),
            Value::Procedure { .. } => write!(f, "#<procedure>"),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::NativeFunction { id: id1, .. }, Value::NativeFunction { id: id2, .. }) => {
                // Compare native functions by id string, not function pointer
                id1 == id2
            }
            (
                Value::Procedure {
                    params: p1,
                    body: b1,
                    env: e1,
                },
                Value::Procedure {
                    params: p2,
                    body: b2,
                    env: e2,
                },
            ) => p1 == p2 && b1 == b2 && e1 == e2,
            (Value::Unspecified, _) | (_, Value::Unspecified) => false, // Unspecified never equals anything
            _ => false, // Different variants are never equal
        }
    }
}

#[cfg(test)]
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        // Test cases as (Value, Value) tuples: (helper_result, expected_value)
        let test_cases = vec![
            // Basic numbers
            (val(42), Value::Number(42.0)),
            (val(-17), Value::Number(-17.0)),
            (val(4.45), Value::Number(4.45)),
            (val(-0.5), Value::Number(-0.5)),
            // Different numeric types from macro
            (val(4294967295u32), Value::Number(4294967295.0)),
            (val(2147483647i32), Value::Number(2147483647.0)),
            (val(255u8), Value::Number(255.0)),
            (val(-128i8), Value::Number(-128.0)),
            (val(1.5f32), Value::Number(1.5)),
            // Basic booleans
            (val(true), Value::Bool(true)),
            (val(false), Value::Bool(false)),
            // Text converts to the symbol kind
            (val("hello"), Value::Symbol("hello".to_owned())),
            // Sym, from both &str and String
            (sym("foo-bar"), Value::Symbol("foo-bar".to_owned())),
            (sym("-"), Value::Symbol("-".to_owned())),
            (sym(String::from("test")), Value::Symbol("test".to_owned())),
            // Empty list (nil)
            (nil(), Value::List(vec![])),
            // Lists from arrays and vecs of primitives
            (
                val([1, 2, 3]),
                Value::List(vec![
                    Value::Number(1.0),
                    Value::Number(2.0),
                    Value::Number(3.0),
                ]),
            ),
            (
                val([true, false, true]),
                Value::List(vec![
                    Value::Bool(true),
                    Value::Bool(false),
                    Value::Bool(true),
                ]),
            ),
            // Mixed type lists using helper functions
            (
                val(vec![sym("operation"), val(42), val(true)]),
                Value::List(vec![
                    Value::Symbol("operation".to_owned()),
                    Value::Number(42.0),
                    Value::Bool(true),
                ]),
            ),
            // Multi-value returns become lists in declaration order
            (
                val((1, true)),
                Value::List(vec![Value::Number(1.0), Value::Bool(true)]),
            ),
            (
                val((1, 2.5, "x")),
                Value::List(vec![
                    Value::Number(1.0),
                    Value::Number(2.5),
                    Value::Symbol("x".to_owned()),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert!(
                !(actual != expected),
                "Test case {} failed:\n  Expected: {:?}\n  Got: {:?}",
                i + 1,
                expected,
                actual
            );
        }
    }

    #[test]
    fn test_unspecified_values() {
        // Unspecified never equals anything, including itself
        let unspec = Value::Unspecified;
        assert_ne!(unspec, unspec);
        assert_ne!(unspec, Value::Unspecified);
        assert_ne!(unspec, val(42));
    }

    #[test]
    fn test_display_representations() {
        let test_cases = vec![
            (val(3628800), "3628800"),
            (val(0.75), "0.75"),
            (val(-4.45), "-4.45"),
            (val(true), "true"),
            (val(false), "false"),
            (sym("factorial"), "factorial"),
            (nil(), "()"),
            (val([2, 3]), "(2 3)"),
            (
                val(vec![sym("+"), val(1), val(2)]),
                "(+ 1 2)",
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(format!("{value}"), expected);
        }
    }
}
