//! Built-in operations installed into the global scope.
//!
//! Two registration styles are used, matching how each primitive relates to
//! the atom model:
//!
//! - **Adapted natives**: arithmetic (`+`, `-`, `*`, `/`) and comparison
//!   (`=`) are ordinary typed Rust functions wrapped through the native
//!   adapter, which supplies arity checking and per-argument kind validation
//!   before the function runs.
//! - **Raw natives**: `car`, `cdr` and `list` operate on the generic list
//!   kind, so they are hand-written against the uniform
//!   `&[Value] -> Result<Value, Error>` calling convention and do their own
//!   checking.
//!
//! ## Error Handling
//!
//! - **Type safety**: operations reject incorrect kinds (e.g. `(+ 1 (list))`
//!   errors) before any work happens
//! - **Arity checking**: strict argument count validation for all natives
//! - **No coercion**: numbers never become booleans or symbols
//!
//! Arithmetic follows IEEE double-precision semantics: overflow and division
//! by zero produce infinities, not errors.

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::evaluator::intooperation::NumIter;
use crate::evaluator::{Arity, Environment};

//
// Adapted native implementations
//

fn builtin_add(args: NumIter<'_>) -> NumberType {
    args.sum()
}

fn builtin_sub(first: NumberType, rest: NumIter<'_>) -> NumberType {
    let mut iter = rest.peekable();

    // A single operand negates
    if iter.peek().is_none() {
        return -first;
    }

    let mut result = first;
    for n in iter {
        result -= n;
    }
    result
}

fn builtin_mul(first: NumberType, rest: NumIter<'_>) -> NumberType {
    let mut product = first;
    for n in rest {
        product *= n;
    }
    product
}

fn builtin_div(first: NumberType, rest: NumIter<'_>) -> NumberType {
    let mut iter = rest.peekable();

    // A single operand reciprocates
    if iter.peek().is_none() {
        return 1.0 / first;
    }

    let mut result = first;
    for n in iter {
        result /= n;
    }
    result
}

/// Equality is defined for numbers (exact floating-point comparison) and
/// symbols (exact string comparison); any other operand kind is a type
/// error rather than `false`.
fn builtin_eq(a: Value, b: Value) -> Result<bool, Error> {
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => Ok(x == y),
        (Value::Symbol(x), Value::Symbol(y)) => Ok(x == y),
        _ => Err(Error::TypeError(format!(
            "= is defined for numbers and symbols, got: {a} and {b}"
        ))),
    }
}

//
// Raw natives on the generic list kind
//

fn builtin_car(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::List(items)] => match items.first() {
            Some(first) => Ok(first.clone()),
            None => Err(Error::EvalError("car of empty list".into())),
        },
        [other] => Err(Error::TypeError(format!("car requires a list, got: {other}"))),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

fn builtin_cdr(args: &[Value]) -> Result<Value, Error> {
    match args {
        [Value::List(items)] => {
            if items.is_empty() {
                return Err(Error::EvalError("cdr of empty list".into()));
            }
            Ok(Value::List(items[1..].to_vec()))
        }
        [other] => Err(Error::TypeError(format!("cdr requires a list, got: {other}"))),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.to_vec()))
}

/// Register every primitive into the given scope.
pub(crate) fn install(env: &Environment) {
    // Arithmetic operations fold left to right over their operands
    env.register_variadic_native_operation::<(NumIter<'static>,), _>(
        "+",
        Arity::AtLeast(0),
        builtin_add,
    );
    env.register_variadic_native_operation::<(NumberType, NumIter<'static>), _>(
        "-",
        Arity::AtLeast(1),
        builtin_sub,
    );
    env.register_variadic_native_operation::<(NumberType, NumIter<'static>), _>(
        "*",
        Arity::AtLeast(1),
        builtin_mul,
    );
    env.register_variadic_native_operation::<(NumberType, NumIter<'static>), _>(
        "/",
        Arity::AtLeast(1),
        builtin_div,
    );
    env.register_native_operation::<(Value, Value), _>("=", builtin_eq);

    // List primitives need the generic list kind, so they use the raw
    // calling convention instead of the signature adapter
    env.register_native_function("car", builtin_car);
    env.register_native_function("cdr", builtin_cdr);
    env.register_native_function("list", builtin_list);
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use crate::evaluator::create_global_env;

    /// Helper to invoke a primitive through the global scope using the
    /// canonical erased signature (Vec<Value> -> Result<Value, Error>).
    ///
    /// This keeps tests independent of the internal typed helper
    /// function signatures while still exercising the adapter layer.
    fn call_native(name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let env = create_global_env();
        match env.get(name) {
            Some(Value::NativeFunction { func, .. }) => func(args),
            other => panic!("expected a native function for {name}, got {other:?}"),
        }
    }

    #[test]
    fn test_arithmetic_data_driven() {
        let test_cases: Vec<(&str, Vec<Value>, Value)> = vec![
            ("+", vec![], val(0)),
            ("+", vec![val(42)], val(42)),
            ("+", vec![val(1), val(2), val(3)], val(6)),
            ("+", vec![val(-5), val(10)], val(5)),
            ("+", vec![val(0.5), val(0.25)], val(0.75)),
            ("-", vec![val(10)], val(-10)),
            ("-", vec![val(10), val(3), val(2)], val(5)),
            ("-", vec![val(5), val(6)], val(-1)),
            ("*", vec![val(7)], val(7)),
            ("*", vec![val(2), val(3), val(4)], val(24)),
            ("*", vec![val(-1), val(4.45)], val(-4.45)),
            ("/", vec![val(2)], val(0.5)),
            ("/", vec![val(3), val(4)], val(0.75)),
            ("/", vec![val(24), val(2), val(3)], val(4)),
            // IEEE semantics: division by zero yields an infinity
            ("/", vec![val(1), val(0)], val(f64::INFINITY)),
            ("/", vec![val(-1), val(0)], val(f64::NEG_INFINITY)),
        ];

        for (i, (name, args, expected)) in test_cases.into_iter().enumerate() {
            let result = call_native(name, args).unwrap_or_else(|err| {
                panic!("case {}: '{name}' failed: {err}", i + 1);
            });
            assert_eq!(result, expected, "case {} for '{name}'", i + 1);
        }
    }

    #[test]
    fn test_arithmetic_error_cases() {
        // Wrong operand kind: validated before the native runs
        for name in ["+", "-", "*", "/"] {
            let err = call_native(name, vec![val(1), sym("x")]).unwrap_err();
            assert!(
                matches!(err, Error::TypeError(_)),
                "'{name}' should reject a symbol operand, got {err:?}"
            );
        }

        // Missing required first operand
        for name in ["-", "*", "/"] {
            let err = call_native(name, vec![]).unwrap_err();
            assert!(
                matches!(err, Error::ArityError { .. }),
                "'{name}' should require at least one operand, got {err:?}"
            );
        }
    }

    #[test]
    fn test_equality() {
        assert_eq!(call_native("=", vec![val(1), val(1)]).unwrap(), val(true));
        assert_eq!(call_native("=", vec![val(1), val(2)]).unwrap(), val(false));
        assert_eq!(
            call_native("=", vec![sym("a"), sym("a")]).unwrap(),
            val(true)
        );
        assert_eq!(
            call_native("=", vec![sym("a"), sym("b")]).unwrap(),
            val(false)
        );

        // Cross-kind and non-comparable-kind operands are type errors,
        // not false
        let cross = call_native("=", vec![val(1), sym("a")]).unwrap_err();
        assert!(matches!(cross, Error::TypeError(_)));
        let lists = call_native("=", vec![val([1, 2]), val([1, 2])]).unwrap_err();
        assert!(matches!(lists, Error::TypeError(_)));
        let bools = call_native("=", vec![val(true), val(true)]).unwrap_err();
        assert!(matches!(bools, Error::TypeError(_)));

        // = is binary
        let arity = call_native("=", vec![val(1)]).unwrap_err();
        assert!(matches!(arity, Error::ArityError { .. }));
        let arity = call_native("=", vec![val(1), val(1), val(1)]).unwrap_err();
        assert!(matches!(arity, Error::ArityError { .. }));
    }

    #[test]
    fn test_list_primitives() {
        assert_eq!(
            call_native("car", vec![val([1, 2, 3])]).unwrap(),
            val(1)
        );
        assert_eq!(
            call_native("cdr", vec![val([1, 2, 3])]).unwrap(),
            val([2, 3])
        );
        assert_eq!(call_native("cdr", vec![val([1])]).unwrap(), nil());
        assert_eq!(call_native("list", vec![]).unwrap(), nil());
        assert_eq!(
            call_native("list", vec![val(1), sym("a"), val(true)]).unwrap(),
            val(vec![val(1), sym("a"), val(true)])
        );

        // car/cdr of a non-list is a type error; of an empty list an
        // evaluation error
        let err = call_native("car", vec![val(1)]).unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));
        let err = call_native("cdr", vec![sym("x")]).unwrap_err();
        assert!(matches!(err, Error::TypeError(_)));
        let err = call_native("car", vec![nil()]).unwrap_err();
        assert!(matches!(err, Error::EvalError(_)));
        let err = call_native("cdr", vec![nil()]).unwrap_err();
        assert!(matches!(err, Error::EvalError(_)));

        // Wrong argument counts
        let err = call_native("car", vec![]).unwrap_err();
        assert!(matches!(err, Error::ArityError { .. }));
        let err = call_native("cdr", vec![nil(), nil()]).unwrap_err();
        assert!(matches!(err, Error::ArityError { .. }));
    }
}
