use crate::Error;
use crate::ast::Value;
use crate::builtins;
use self::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub mod intooperation;

/// Declared argument-count contract for a variadic native operation.
///
/// Fixed-arity natives get their count from the Rust signature; variadic
/// natives declare it explicitly at registration time and it is validated
/// on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// This many arguments or more
    AtLeast(usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    pub fn validate(&self, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(expected) => {
                if got == *expected {
                    Ok(())
                } else {
                    Err(Error::arity_error(*expected, got))
                }
            }
            Arity::AtLeast(min) => {
                if got >= *min {
                    Ok(())
                } else {
                    Err(Error::arity_error(*min, got))
                }
            }
            Arity::Any => Ok(()),
        }
    }
}

/// A lexical scope for variable bindings.
///
/// An `Environment` is a cheaply cloneable handle to a frame of bindings
/// plus an optional outer scope, forming a singly-linked chain searched
/// outward during lookup. The handle is shared, not copied: every closure
/// created while a frame was the active scope holds the same frame, so a
/// later `define` or `set` in that frame is observed by all of them. A
/// frame lives as long as its longest-lived holder.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
}

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    outer: Option<Environment>,
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        // Two environments are the same scope, not merely equal contents
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Frames can hold procedures that reference this very scope, so
        // debug output stays shallow to remain acyclic.
        let frame = self.frame.borrow();
        write!(
            f,
            "Environment({} bindings{})",
            frame.bindings.len(),
            if frame.outer.is_some() { ", outer" } else { "" }
        )
    }
}

impl Environment {
    pub(crate) fn new() -> Self {
        Environment::default()
    }

    pub(crate) fn with_outer(outer: Environment) -> Self {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                outer: Some(outer),
            })),
        }
    }

    /// Bind `name` in this scope's own frame, shadowing any outer binding.
    /// Rebinding an existing local name overwrites it in place.
    pub(crate) fn define(&self, name: impl Into<String>, value: Value) {
        self.frame.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Look `name` up by walking the chain outward from this scope.
    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        let frame = self.frame.borrow();
        if let Some(value) = frame.bindings.get(name) {
            return Some(value.clone());
        }
        frame.outer.as_ref().and_then(|outer| outer.get(name))
    }

    /// Rebind `name` in the innermost scope of the chain that already
    /// contains it. Unlike `define`, mutation must target an existing
    /// binding.
    pub(crate) fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut frame = self.frame.borrow_mut();
        if let Some(slot) = frame.bindings.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        match &frame.outer {
            Some(outer) => outer.set(name, value),
            None => Err(Error::UnboundVariable(name.to_owned())),
        }
    }

    /// Construct the activation scope for a procedure call: a new frame
    /// binding each parameter to the corresponding argument, with this
    /// scope (the procedure's captured environment) as outer.
    pub(crate) fn child_from(
        &self,
        params: &[String],
        args: Vec<Value>,
    ) -> Result<Environment, Error> {
        if params.len() != args.len() {
            return Err(Error::arity_error(params.len(), args.len()));
        }

        let child = Environment::with_outer(self.clone());
        for (param, arg) in params.iter().zip(args) {
            child.define(param.clone(), arg);
        }
        Ok(child)
    }

    /// Register a custom native function in this scope.
    ///
    /// This is the low-level API: it accepts a function that already
    /// works on `&[Value]` and returns `Result<Value, Error>`, and is
    /// responsible for its own arity and kind checking. The list
    /// primitives (`car`, `cdr`, `list`) are registered this way because
    /// they need the generic list kind. For most new code, prefer the
    /// typed API instead of manipulating `Value` directly.
    ///
    /// # Example
    /// ```
    /// use tailisp::evaluator::create_global_env;
    /// use tailisp::ast::Value;
    /// use tailisp::Error;
    ///
    /// fn my_custom_function(args: &[Value]) -> Result<Value, Error> {
    ///     println!("Custom function called with {} args", args.len());
    ///     Ok(Value::Unspecified)
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_native_function("my-func", my_custom_function);
    /// // Now (my-func) can be called from evaluated expressions
    /// ```
    pub fn register_native_function(
        &self,
        name: &str,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) {
        // Wrap the raw slice-based function into the canonical
        // `OperationFn` so it can be stored directly as a
        // `NativeFunction`.
        let f = func;
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| f(&args));

        self.define(
            name,
            Value::NativeFunction {
                id: name.to_owned(),
                func: wrapped,
            },
        );
    }

    /// Register a strongly-typed Rust function as a native operation using
    /// automatic argument extraction and result conversion.
    ///
    /// This allows writing natural Rust functions like:
    ///
    /// ```rust,ignore
    /// fn hypot(a: f64, b: f64) -> f64 { (a * a + b * b).sqrt() }
    /// let env = tailisp::evaluator::create_global_env();
    /// env.register_native_operation::<(f64, f64), _>("hypot", hypot);
    /// // Now (hypot 3 4) evaluates to 5
    /// ```
    ///
    /// Supported parameter kinds:
    /// - `f64` (number)
    /// - `bool` (boolean)
    /// - `&str` (borrowed symbol text)
    /// - `Value` (owned access to the raw atom)
    /// - `ValueIter<'_>` / `NumIter<'_>` / `BoolIter<'_>` (iterate over the
    ///   elements of a single list argument)
    ///
    /// Additional scalar parameter kinds can be supported by adding
    /// `impl TryInto<T, Error = Error> for Value` in `ast.rs`; those
    /// automatically participate via the blanket `FromParam` impl.
    ///
    /// Supported return types: any `R: Into<Value>` (`f64` and the
    /// narrower numerics, `bool`, text for symbols, sequences and tuples
    /// for lists), or `Result<R, Error>` for such an `R`. A function
    /// returning a tuple yields a list of the converted atoms in
    /// declaration order.
    ///
    /// Arity comes from the signature and is enforced automatically;
    /// conversion failures yield `TypeError` before the function runs.
    /// If you need rest-parameter / variadic behavior, use
    /// [`Environment::register_variadic_native_operation`] instead.
    pub fn register_native_operation<Args, F>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args> + 'static,
    {
        let wrapped = func.into_operation();
        self.define(
            name,
            Value::NativeFunction {
                id: name.to_owned(),
                func: wrapped,
            },
        );
    }

    /// Register a variadic native operation with explicit arity metadata.
    ///
    /// This is intended for functions whose Rust signature includes a
    /// "rest" parameter, expressed using iterator types from the
    /// adapter module:
    ///
    /// - rest of all arguments as atoms: `fn(ValueIter<'_>) -> R`
    /// - numeric tail: `fn(NumIter<'_>) -> R`
    /// - fixed prefix plus numeric tail: `fn(f64, NumIter<'_>) -> R`
    ///
    /// Fixed-arity functions should use
    /// [`Environment::register_native_operation`] instead.
    ///
    /// The provided [`Arity`] is validated against the total argument
    /// count at call time, since minimum argument counts for variadic
    /// operations are not always derivable from the Rust type signature
    /// alone. Every trailing argument is kind-checked against the rest
    /// parameter's element kind before the function is invoked.
    pub fn register_variadic_native_operation<Args, F>(&self, name: &str, arity: Arity, func: F)
    where
        F: IntoVariadicOperation<Args> + 'static,
    {
        let inner = func.into_variadic_operation();
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(args.len())?;
            inner(args)
        });

        self.define(
            name,
            Value::NativeFunction {
                id: name.to_owned(),
                func: wrapped,
            },
        );
    }

    /// Get all bindings visible from this scope.
    /// Returns a Vec of (name, value) pairs sorted by name, with inner
    /// bindings shadowing outer ones.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        // Start with outer bindings so they can be overridden by local ones
        let frame = self.frame.borrow();
        if let Some(outer) = &frame.outer {
            for (name, value) in outer.get_all_bindings() {
                bindings.insert(name, value);
            }
        }

        for (name, value) in &frame.bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Create a global environment with the built-in primitives installed.
///
/// There is no ambient interpreter state: every call returns an
/// independent instance, so separate interpreters (and tests) coexist
/// without sharing bindings.
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    builtins::install(&env);
    log::debug!(
        "created global environment with {} primitives",
        env.get_all_bindings().len()
    );
    env
}

/// Evaluate an expression against an environment.
///
/// The evaluator is a trampoline: a loop holding a mutable
/// `(expression, environment)` pair. Tail positions - the chosen branch
/// of an `if`, the final expression of a `begin`, and the body of an
/// applied procedure - reassign that pair and continue the loop, so tail
/// calls run at arbitrary depth without growing the Rust call stack.
/// Nested positions (argument evaluation, `if` tests, the non-final
/// expressions of a `begin`) recurse normally.
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    let mut expr = expr.clone();
    let mut env = env.clone();

    loop {
        let elements = match expr {
            // Self-evaluating atoms
            Value::Number(_)
            | Value::Bool(_)
            | Value::NativeFunction { .. }
            | Value::Procedure { .. }
            | Value::Unspecified => return Ok(expr),

            // Variable lookup
            Value::Symbol(name) => {
                return env.get(&name).ok_or(Error::UnboundVariable(name));
            }

            Value::List(elements) => elements,
        };

        let Some((head, operands)) = elements.split_first() else {
            return Err(Error::EvalError("cannot evaluate an empty list".to_owned()));
        };

        // Special forms are recognized on the raw head symbol, before any
        // evaluation: the six keywords are reserved words, not bindings.
        if let Value::Symbol(name) = head {
            match name.as_str() {
                "quote" => return eval_quote(operands),
                "set" => return eval_set(operands, &env),
                "define" => return eval_define(operands, &env),
                "lambda" => return eval_lambda(operands, &env),
                "if" => {
                    // Tail position: the selected branch replaces the
                    // loop state instead of pushing a stack frame
                    expr = branch_of_if(operands, &env)?;
                    continue;
                }
                "begin" => {
                    expr = tail_of_begin(operands, &env)?;
                    continue;
                }
                _ => {}
            }
        }

        // Application: evaluate every element left to right (the order is
        // observable through side-effecting natives), then apply the head.
        let mut evaluated = Vec::with_capacity(elements.len());
        for element in &elements {
            evaluated.push(eval(element, &env)?);
        }
        let callee = evaluated.remove(0);
        let args = evaluated;

        match callee {
            Value::Procedure {
                params,
                body,
                env: closure_env,
            } => {
                // The trampoline itself: the procedure body and a fresh
                // activation frame over the captured environment replace
                // the loop state, giving proper tail calls.
                env = closure_env.child_from(&params, args)?;
                expr = *body;
            }
            Value::NativeFunction { id, func } => {
                // Natives cannot re-enter the loop, so they are invoked
                // immediately rather than trampolined.
                return func(args).map_err(|error| annotate_native_error(error, &id));
            }
            other => return Err(Error::NotCallable(format!("{other}"))),
        }
    }
}

/// Attach the invoked operator's name to a failed native call, to aid
/// diagnosis of which primitive rejected its arguments.
fn annotate_native_error(error: Error, operator: &str) -> Error {
    match error {
        Error::EvalError(msg) => Error::EvalError(format!("{operator}: {msg}")),
        Error::TypeError(msg) => Error::TypeError(format!("{operator}: {msg}")),
        Error::ArityError {
            expected,
            got,
            expression: None,
        } => Error::arity_error_with_expr(expected, got, operator.to_owned()),
        other => other,
    }
}

/// Evaluate the quote special form: the operand is returned unevaluated.
fn eval_quote(operands: &[Value]) -> Result<Value, Error> {
    match operands {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::MalformedForm(format!(
            "quote takes one operand, got {}",
            operands.len()
        ))),
    }
}

/// Evaluate the set special form: rebind an existing binding in the
/// innermost scope of the chain that contains it.
fn eval_set(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    match operands {
        [Value::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            env.set(name, value)?;
            Ok(Value::Unspecified)
        }
        [_, _] => Err(Error::TypeError("set requires a symbol to rebind".to_owned())),
        _ => Err(Error::MalformedForm(format!(
            "set takes a symbol and an expression, got {} operands",
            operands.len()
        ))),
    }
}

/// Evaluate the define special form: bind in the current scope,
/// shadowing any outer binding of the same name.
fn eval_define(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    match operands {
        [Value::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            env.define(name.clone(), value);
            Ok(Value::Unspecified)
        }
        [_, _] => Err(Error::TypeError("define requires a symbol".to_owned())),
        _ => Err(Error::MalformedForm(format!(
            "define takes a symbol and an expression, got {} operands",
            operands.len()
        ))),
    }
}

/// Evaluate the lambda special form: build a procedure capturing the
/// current environment handle, so free variables resolve in the defining
/// scope at call time.
fn eval_lambda(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    match operands {
        [Value::List(param_list), body] => {
            let mut params = Vec::with_capacity(param_list.len());
            for param in param_list {
                match param {
                    Value::Symbol(name) => {
                        if params.contains(name) {
                            return Err(Error::MalformedForm(format!(
                                "duplicate parameter name: {name}"
                            )));
                        }
                        params.push(name.clone());
                    }
                    _ => {
                        return Err(Error::TypeError(
                            "lambda parameters must be symbols".to_owned(),
                        ));
                    }
                }
            }

            Ok(Value::Procedure {
                params,
                body: Box::new(body.clone()),
                env: env.clone(),
            })
        }
        [_, _] => Err(Error::TypeError(
            "lambda parameters must be a list".to_owned(),
        )),
        _ => Err(Error::MalformedForm(format!(
            "lambda takes a parameter list and a body, got {} operands",
            operands.len()
        ))),
    }
}

/// Evaluate the test of an `if` and return the branch the trampoline
/// should continue with. The chosen branch is in tail position.
fn branch_of_if(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    match operands {
        [test, consequent, alternative] => match eval(test, env)? {
            Value::Bool(true) => Ok(consequent.clone()),
            Value::Bool(false) => Ok(alternative.clone()),
            other => Err(Error::TypeError(format!(
                "if condition must be a boolean, got: {other}"
            ))),
        },
        _ => Err(Error::MalformedForm(format!(
            "if takes a test, a consequent and an alternative, got {} operands",
            operands.len()
        ))),
    }
}

/// Evaluate all but the last expression of a `begin` for effect (errors
/// short-circuit) and return the last one for the trampoline to continue
/// with. The final expression is in tail position.
fn tail_of_begin(operands: &[Value], env: &Environment) -> Result<Value, Error> {
    match operands {
        [] => Err(Error::MalformedForm(
            "begin requires at least one expression".to_owned(),
        )),
        [effects @ .., last] => {
            for expr in effects {
                eval(expr, env)?;
            }
            Ok(last.clone())
        }
    }
}
