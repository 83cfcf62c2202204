//! Whole-program tests driven through the public crate surface:
//! parse, transform, and evaluate complete programs the way the CLI does.

use pretty_assertions::assert_eq;
use tailisp::Error;
use tailisp::ast::Value;
use tailisp::evaluator::{self, Environment};
use tailisp::parser::parse_program;
use tailisp::transform::Forms;

/// Run a whole program in a fresh interpreter, returning every
/// non-absent top-level result in order.
fn run_program(source: &str) -> Result<Vec<Value>, Error> {
    let env = evaluator::create_global_env();
    run_in(source, &env)
}

fn run_in(source: &str, env: &Environment) -> Result<Vec<Value>, Error> {
    let forms = parse_program(source)?;
    let mut results = Vec::new();
    for form in Forms::new(&forms) {
        let result = evaluator::eval(&form?, env)?;
        if !matches!(result, Value::Unspecified) {
            results.push(result);
        }
    }
    Ok(results)
}

/// The single result of a program expected to print exactly one value.
fn run_single(source: &str) -> Value {
    let mut results = run_program(source).expect("program should evaluate");
    assert_eq!(results.len(), 1, "expected exactly one result");
    results.pop().unwrap()
}

#[test]
fn arithmetic_matches_host_floats() {
    let result = run_single("(+ 1 2 (/ 3 4) (- 5 6) (* -1 4.45))");
    let expected = 1.0 + 2.0 + (3.0 / 4.0) + (5.0 - 6.0) + (-1.0 * 4.45);
    assert_eq!(result, Value::Number(expected));
}

#[test]
fn factorial_of_ten() {
    let result = run_single(
        "(define factorial
           (lambda (n)
             (if (= n 0) 1
                 (* n (factorial (- n 1))))))
         (factorial 10)",
    );
    assert_eq!(result, Value::Number(3628800.0));
}

#[test]
fn tail_recursion_runs_at_depth_fifty_thousand() {
    // The recursive call is the final action of the body, so the
    // trampoline reuses its loop state instead of pushing stack frames.
    // At this depth a stack frame per call would overflow the host stack.
    let result = run_single(
        "(define sum-to
           (lambda (n acc)
             (if (= n 0) acc
                 (sum-to (- n 1) (+ acc n)))))
         (sum-to 50000 0)",
    );
    assert_eq!(result, Value::Number(1250025000.0));
}

#[test]
fn tail_recursion_through_begin() {
    // The last expression of a begin is also a tail position
    let result = run_single(
        "(define x 0)
         (define spin
           (lambda (n)
             (if (= n 0) x
                 (begin (set x (+ x 1)) (spin (- n 1))))))
         (spin 20000)",
    );
    assert_eq!(result, Value::Number(20000.0));
}

#[test]
fn car_and_cdr() {
    assert_eq!(run_single("(car (list 1 2 3))"), Value::Number(1.0));
    let cdr = run_single("(cdr (list 1 2 3))");
    assert_eq!(cdr, Value::List(vec![Value::Number(2.0), Value::Number(3.0)]));
    assert_eq!(format!("{cdr}"), "(2 3)");
}

#[test]
fn two_argument_procedure() {
    let result = run_single("(define foo (lambda (a b) (+ a b))) (foo 4 5)");
    assert_eq!(result, Value::Number(9.0));
}

#[test]
fn numeric_equality() {
    assert_eq!(run_single("(= 1 1)"), Value::Bool(true));
    assert_eq!(run_single("(= 1 2)"), Value::Bool(false));
    assert_eq!(format!("{}", run_single("(= 1 1)")), "true");

    // Equality on kinds other than numbers and symbols is a type error
    let err = run_program("(= (list 1) (list 1))").unwrap_err();
    assert!(matches!(err, Error::TypeError(_)));
}

#[test]
fn top_level_define_rebinds_the_captured_scope() {
    // The closure shares the global frame; the second define rebinds that
    // same frame rather than shadowing it in a new scope, so the closure
    // observes the new value.
    let result = run_single(
        "(define x 1)
         (define f (lambda () x))
         (define x 2)
         (f)",
    );
    assert_eq!(result, Value::Number(2.0));
}

#[test]
fn parameters_shadow_without_mutating() {
    let results = run_program(
        "(define x 1)
         (define f (lambda (x) (+ x 10)))
         (f 5)
         (+ x 0)",
    )
    .unwrap();
    assert_eq!(
        results,
        vec![Value::Number(15.0), Value::Number(1.0)]
    );
}

#[test]
fn set_mutates_the_captured_frame() {
    let env = evaluator::create_global_env();
    run_in(
        "(define make-counter
           (lambda ()
             (begin (define n 0)
                    (lambda () (begin (set n (+ n 1)) n)))))
         (define counter (make-counter))",
        &env,
    )
    .unwrap();

    assert_eq!(run_in("(counter)", &env).unwrap(), vec![Value::Number(1.0)]);
    assert_eq!(run_in("(counter)", &env).unwrap(), vec![Value::Number(2.0)]);

    // Each activation captures its own frame
    run_in("(define other (make-counter))", &env).unwrap();
    assert_eq!(run_in("(other)", &env).unwrap(), vec![Value::Number(1.0)]);
    assert_eq!(run_in("(counter)", &env).unwrap(), vec![Value::Number(3.0)]);
}

#[test]
fn set_requires_an_existing_binding() {
    let err = run_program("(set x 1)").unwrap_err();
    assert_eq!(err, Error::UnboundVariable("x".to_owned()));

    // define has no such requirement and the binding then accepts set
    let results = run_program("(define x 1) (set x 3) (+ x 0)").unwrap();
    assert_eq!(results, vec![Value::Number(3.0)]);
}

#[test]
fn native_arity_and_kind_errors() {
    // Wrong count for an adapted native names the operator
    match run_program("(= 1)").unwrap_err() {
        Error::ArityError {
            expected,
            got,
            expression,
        } => {
            assert_eq!((expected, got), (2, 1));
            assert_eq!(expression.as_deref(), Some("="));
        }
        other => panic!("expected ArityError, got {other:?}"),
    }

    // Wrong kind is rejected before the native runs
    let err = run_program("(+ 1 (quote a))").unwrap_err();
    assert!(matches!(err, Error::TypeError(_)));
    let err = run_program("(car 5)").unwrap_err();
    assert!(matches!(err, Error::TypeError(_)));

    // Procedure arity mismatches surface the same error kind
    let err = run_program("(define f (lambda (a b) a)) (f 1)").unwrap_err();
    assert!(matches!(
        err,
        Error::ArityError {
            expected: 2,
            got: 1,
            ..
        }
    ));
}

#[test]
fn failures_abort_the_remaining_forms() {
    let env = evaluator::create_global_env();
    let err = run_in("(define x 1) (car x) (define x 99)", &env).unwrap_err();
    assert!(matches!(err, Error::TypeError(_)));
    // The form after the failure never ran
    assert_eq!(run_in("(+ x 0)", &env).unwrap(), vec![Value::Number(1.0)]);
}

#[test]
fn quoting_yields_data() {
    assert_eq!(
        run_single("(quote hello)"),
        Value::Symbol("hello".to_owned())
    );
    let quoted = run_single("(quote (+ 1 2))");
    assert_eq!(format!("{quoted}"), "(+ 1 2)");

    // Quoted code is plain data until applied
    let err = run_program("((quote (+ 1 2)))").unwrap_err();
    assert!(matches!(err, Error::NotCallable(_)));
}

#[test]
fn higher_order_programs() {
    let result = run_single(
        "(define compose (lambda (f g) (lambda (x) (f (g x)))))
         (define inc (lambda (x) (+ x 1)))
         (define double (lambda (x) (* x 2)))
         ((compose inc double) 10)",
    );
    assert_eq!(result, Value::Number(21.0));
}

#[test]
fn division_follows_ieee_semantics() {
    assert_eq!(run_single("(/ 1 0)"), Value::Number(f64::INFINITY));
    assert_eq!(run_single("(/ -1 0)"), Value::Number(f64::NEG_INFINITY));
    assert_eq!(run_single("(/ 3 4)"), Value::Number(0.75));
}

#[test]
fn parse_failures_surface_as_errors() {
    assert!(matches!(
        run_program("just-a-name").unwrap_err(),
        Error::ParseError(_)
    ));
    assert!(matches!(
        run_program("(+ 1 2").unwrap_err(),
        Error::ParseError(_)
    ));
}
