use crate::ast::{BinaryOp, Expr, ExprKind, FunctionDecl, Stmt, UnaryOp};
use crate::diagnostic::Span;
use crate::interpreter::environment::Environment;
use crate::interpreter::error::RuntimeError;
use crate::interpreter::parser::{ParseError, TokenParser};
use crate::lexer::tokenize;
use crate::value::{format_number, Class, Function, Instance, Value};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Reserved name a `return` statement writes its value through. Double
/// underscores keep it out of the way of ordinary identifiers.
pub const RETURN_SLOT: &str = "__retval__";

/// The receiver binding visible inside method bodies.
pub const SELF_NAME: &str = "self";

const INITIALIZER: &str = "init";

/// Tree-walking evaluator. Runtime conditions never abort the program:
/// each one is recorded, the offending expression yields nil, and execution
/// continues.
pub struct Interpreter {
    env: Rc<Environment>,
    out: Box<dyn Write>,
    diagnostics: Vec<RuntimeError>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            env: Rc::new(Environment::new()),
            out,
            diagnostics: Vec::new(),
        }
    }

    pub fn run(&mut self, statements: &[Stmt]) {
        self.execute_sequence(statements);
    }

    pub fn diagnostics(&self) -> &[RuntimeError] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<RuntimeError> {
        std::mem::take(&mut self.diagnostics)
    }

    fn report(&mut self, error: RuntimeError) {
        self.diagnostics.push(error);
    }

    /// Runs statements in order, stopping as soon as the current call frame
    /// has seen a `return`. Blocks and loop bodies share their enclosing
    /// frame, so the check also unwinds out of nested statements.
    fn execute_sequence(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            if self.env.is_terminated() {
                break;
            }
            self.execute_statement(stmt);
        }
    }

    fn execute_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                self.evaluate(expr);
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr);
                let _ = writeln!(self.out, "{}", format_number(value.as_number()));
            }
            Stmt::Block(statements) => {
                self.execute_sequence(statements);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition).is_truthy() {
                    self.execute_statement(then_branch);
                } else if let Some(else_branch) = else_branch {
                    self.execute_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                while !self.env.is_terminated() && self.evaluate(condition).is_truthy() {
                    self.execute_statement(body);
                }
            }
            Stmt::Function(decl) => {
                let function = self.make_function(decl);
                self.env.set(&decl.name, Value::Function(function));
            }
            Stmt::Return(value) => {
                let result = match value {
                    Some(expr) => self.evaluate(expr),
                    None => Value::Nil,
                };
                self.env.declare(RETURN_SLOT, result);
                self.env.terminate();
            }
            Stmt::Class { name, methods } => {
                let mut table = IndexMap::new();
                for decl in methods {
                    table.insert(decl.name.to_string(), self.make_function(decl));
                }
                let class = Rc::new(Class {
                    name: Rc::clone(name),
                    methods: table,
                });
                self.env.set(name, Value::Class(class));
            }
        }
    }

    fn make_function(&self, decl: &FunctionDecl) -> Rc<Function> {
        Rc::new(Function::new(
            Rc::clone(&decl.name),
            decl.params.clone(),
            Rc::from(decl.body.as_slice()),
        ))
    }

    fn evaluate(&mut self, expr: &Expr) -> Value {
        match &expr.kind {
            ExprKind::Literal(text) => Value::Number(parse_number(text)),
            ExprKind::Identifier(name) => match self.env.get(name) {
                Some(value) => value,
                None => {
                    self.report(RuntimeError::UndefinedVariable {
                        name: name.to_string(),
                        span: expr.span,
                    });
                    Value::Nil
                }
            },
            ExprKind::Unary { op, operand } => {
                let value = self.evaluate(operand);
                match op {
                    UnaryOp::Not => Value::Number(if value.is_truthy() { 0.0 } else { 1.0 }),
                    UnaryOp::Neg => Value::Number(-value.as_number()),
                }
            }
            ExprKind::Binary { left, op, right } => {
                let left = self.evaluate(left).as_number();
                let right = self.evaluate(right).as_number();
                Value::Number(match op {
                    BinaryOp::Add => left + right,
                    BinaryOp::Sub => left - right,
                    BinaryOp::Mul => left * right,
                    // IEEE semantics: x/0 is inf, 0/0 is NaN.
                    BinaryOp::Div => left / right,
                    BinaryOp::Eq => bool_number(left == right),
                    BinaryOp::NotEq => bool_number(left != right),
                    BinaryOp::Greater => bool_number(left > right),
                    BinaryOp::GreaterEq => bool_number(left >= right),
                    BinaryOp::Less => bool_number(left < right),
                    BinaryOp::LessEq => bool_number(left <= right),
                })
            }
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value);
                self.assign(target, value.clone());
                value
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.evaluate(callee);
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.evaluate(arg));
                }
                match callee_value {
                    Value::Function(function) => {
                        self.call_function(&function, arg_values, expr.span)
                    }
                    Value::Class(class) => self.construct(class, arg_values, expr.span),
                    other => {
                        self.report(RuntimeError::NotCallable {
                            type_name: other.type_name(),
                            span: expr.span,
                        });
                        Value::Nil
                    }
                }
            }
            ExprKind::Get { object, name } => {
                let object = self.evaluate(object);
                self.get_attribute(&object, name, expr.span)
            }
        }
    }

    /// Stores `value` through an assignment target. An ill-typed target is
    /// reported and the store discarded; the assignment expression still
    /// yields the value.
    fn assign(&mut self, target: &Expr, value: Value) {
        match &target.kind {
            ExprKind::Identifier(name) => {
                self.env.set(name, value);
            }
            ExprKind::Get { object, name } => {
                let object = self.evaluate(object);
                match object {
                    Value::Instance(instance) => {
                        *instance.field_slot(name).borrow_mut() = value;
                    }
                    other => {
                        self.report(RuntimeError::IllegalAttribute {
                            type_name: other.type_name(),
                            span: target.span,
                        });
                    }
                }
            }
            // The parser rejects other targets; nothing reaches here.
            _ => {}
        }
    }

    /// Invokes a function value. The new frame parents on the environment
    /// active at the call site, so free names in the body resolve through
    /// the caller's scope chain.
    fn call_function(&mut self, function: &Function, args: Vec<Value>, span: Span) -> Value {
        if args.len() != function.params.len() {
            self.report(RuntimeError::ArityMismatch {
                name: function.name.to_string(),
                expected: function.params.len(),
                found: args.len(),
                span,
            });
            return Value::Nil;
        }

        let frame = Rc::new(Environment::with_parent(Rc::clone(&self.env)));
        for (param, arg) in function.params.iter().zip(args) {
            frame.declare(param, arg);
        }
        if let Some(receiver) = &function.receiver {
            frame.declare(SELF_NAME, receiver.clone());
        }
        frame.declare(RETURN_SLOT, Value::Nil);

        let caller_env = std::mem::replace(&mut self.env, frame);
        let body = Rc::clone(&function.body);
        self.execute_sequence(&body);
        let frame = std::mem::replace(&mut self.env, caller_env);

        frame.get(RETURN_SLOT).unwrap_or(Value::Nil)
    }

    /// Builds a fresh instance, then runs its `init` method (bound to the
    /// new instance) when the class defines one. The initializer's return
    /// value is discarded; the call yields the instance.
    fn construct(&mut self, class: Rc<Class>, args: Vec<Value>, span: Span) -> Value {
        let instance = Value::Instance(Rc::new(Instance::new(Rc::clone(&class))));
        if let Some(init) = class.method(INITIALIZER) {
            let bound = init.bind(instance.clone());
            self.call_function(&bound, args, span);
        } else if !args.is_empty() {
            self.report(RuntimeError::ArityMismatch {
                name: class.name.to_string(),
                expected: 0,
                found: args.len(),
                span,
            });
        }
        instance
    }

    /// Resolves `object.name`. On an instance, fields shadow class methods;
    /// a method comes back as a fresh value bound to this instance. On a
    /// class, methods come back unbound. Anything else has no attributes.
    fn get_attribute(&mut self, object: &Value, name: &str, span: Span) -> Value {
        match object {
            Value::Instance(instance) => {
                if let Some(slot) = instance.field(name) {
                    return slot.borrow().clone();
                }
                if let Some(method) = instance.class.method(name) {
                    return Value::Function(method.bind(object.clone()));
                }
                self.report(RuntimeError::UndefinedAttribute {
                    name: name.to_string(),
                    span,
                });
                Value::Nil
            }
            Value::Class(class) => match class.method(name) {
                Some(method) => Value::Function(Rc::clone(method)),
                None => {
                    self.report(RuntimeError::UndefinedAttribute {
                        name: name.to_string(),
                        span,
                    });
                    Value::Nil
                }
            },
            other => {
                self.report(RuntimeError::IllegalAttribute {
                    type_name: other.type_name(),
                    span,
                });
                Value::Nil
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Literal text to a number: whole-number literals parse exactly, anything
/// unparseable becomes 0.
fn parse_number(text: &str) -> f64 {
    if let Ok(n) = text.parse::<i64>() {
        return n as f64;
    }
    text.parse::<f64>().unwrap_or(0.0)
}

fn bool_number(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Everything one run of a program produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub output: String,
    pub parse_errors: Vec<ParseError>,
    pub runtime_errors: Vec<RuntimeError>,
}

impl RunOutcome {
    pub fn is_clean(&self) -> bool {
        self.parse_errors.is_empty() && self.runtime_errors.is_empty()
    }
}

/// In-memory sink shared between the interpreter and the caller.
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Tokenizes, parses, and evaluates a program, capturing its printed output.
/// Parse errors do not stop evaluation: whatever statements were recovered
/// still run.
pub fn parse_and_run(source: &str) -> RunOutcome {
    let tokens = tokenize(source);
    let parsed = TokenParser::new(tokens).parse();

    let sink = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(sink.clone()));
    interpreter.run(&parsed.statements);

    let output = String::from_utf8_lossy(&sink.0.borrow()).into_owned();
    RunOutcome {
        output,
        parse_errors: parsed.errors,
        runtime_errors: interpreter.take_diagnostics(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_lines(source: &str) -> Vec<String> {
        let outcome = parse_and_run(source);
        assert!(
            outcome.is_clean(),
            "unexpected errors: parse={:?} runtime={:?}",
            outcome.parse_errors,
            outcome.runtime_errors
        );
        outcome.output.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_print_arithmetic() {
        assert_eq!(run_lines("print 1 + 2 * 3;"), vec!["7"]);
        assert_eq!(run_lines("print (1 + 2) * 3;"), vec!["9"]);
        assert_eq!(run_lines("print 10 / 4;"), vec!["2.5"]);
    }

    #[test]
    fn test_comparisons_yield_numbers() {
        assert_eq!(run_lines("print 2 + 3 == 5;"), vec!["1"]);
        assert_eq!(run_lines("print 1 > 2;"), vec!["0"]);
        assert_eq!(run_lines("print !0;"), vec!["1"]);
    }

    #[test]
    fn test_division_follows_ieee() {
        assert_eq!(run_lines("print 1 / 0;"), vec!["inf"]);
        assert_eq!(run_lines("print 0 / 0;"), vec!["NaN"]);
    }

    #[test]
    fn test_assignment_creates_and_yields() {
        assert_eq!(run_lines("var x = 4; print x;"), vec!["4"]);
        assert_eq!(run_lines("print x = 3;"), vec!["3"]);
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(
            run_lines("var i = 3; while (i) { print i; i = i - 1; }"),
            vec!["3", "2", "1"]
        );
    }

    #[test]
    fn test_blocks_do_not_scope() {
        // A name first assigned inside a block is visible after it.
        assert_eq!(run_lines("if (1) { y = 5; } print y;"), vec!["5"]);
    }

    #[test]
    fn test_function_call_and_return() {
        assert_eq!(
            run_lines("fun add(a, b) { return a + b; } print add(2, 3);"),
            vec!["5"]
        );
    }

    #[test]
    fn test_return_unwinds_nested_statements() {
        assert_eq!(
            run_lines("fun f() { while (1) { return 7; } } print f();"),
            vec!["7"]
        );
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(run_lines("fun f() { 1 + 1; } print f();"), vec!["0"]);
    }

    #[test]
    fn test_recursion() {
        assert_eq!(
            run_lines(
                "fun f(n) { if (n <= 0) return 0; return 2 + f(n - 1); } print f(3);"
            ),
            vec!["6"]
        );
    }

    #[test]
    fn test_call_site_scoping() {
        // A free name in a function body resolves through the caller's
        // scope chain at call time.
        assert_eq!(
            run_lines("fun f() { x = 2; } var x = 1; f(); print x;"),
            vec!["2"]
        );
    }

    #[test]
    fn test_class_init_and_method() {
        assert_eq!(
            run_lines(
                "class C { fun init(v) { self.v = v; } fun get() { return self.v; } } \
                 var c = C(5); print c.get();"
            ),
            vec!["5"]
        );
    }

    #[test]
    fn test_instances_are_independent() {
        assert_eq!(
            run_lines(
                "class P { fun init(v) { self.v = v; } } \
                 var a = P(1); var b = P(2); print a.v; print b.v;"
            ),
            vec!["1", "2"]
        );
    }

    #[test]
    fn test_extracted_methods_keep_their_receivers() {
        assert_eq!(
            run_lines(
                "class P { fun init(v) { self.v = v; } fun get() { return self.v; } } \
                 var a = P(1); var b = P(2); \
                 var ga = a.get; var gb = b.get; \
                 print ga(); print gb();"
            ),
            vec!["1", "2"]
        );
    }

    #[test]
    fn test_undefined_variable_reports_and_continues() {
        let outcome = parse_and_run("print missing; print 2;");
        assert_eq!(outcome.runtime_errors.len(), 1);
        assert!(matches!(
            outcome.runtime_errors[0],
            RuntimeError::UndefinedVariable { .. }
        ));
        assert_eq!(outcome.output, "0\n2\n");
    }

    #[test]
    fn test_arity_mismatch_skips_the_body() {
        let outcome = parse_and_run("fun f(a) { x = 9; return a; } print f(); print x;");
        assert!(outcome
            .runtime_errors
            .iter()
            .any(|e| matches!(e, RuntimeError::ArityMismatch { .. })));
        // The body never ran, so both prints see nil.
        assert_eq!(outcome.output, "0\n0\n");
    }

    #[test]
    fn test_calling_a_number_reports() {
        let outcome = parse_and_run("var n = 1; print n(2);");
        assert!(matches!(
            outcome.runtime_errors[0],
            RuntimeError::NotCallable { .. }
        ));
        assert_eq!(outcome.output, "0\n");
    }

    #[test]
    fn test_attribute_on_number_reports() {
        let outcome = parse_and_run("var n = 1; print n.x;");
        assert!(matches!(
            outcome.runtime_errors[0],
            RuntimeError::IllegalAttribute { .. }
        ));
        assert_eq!(outcome.output, "0\n");
    }

    #[test]
    fn test_attribute_write_on_number_reports_but_yields_value() {
        let outcome = parse_and_run("var n = 1; print n.x = 5;");
        assert!(matches!(
            outcome.runtime_errors[0],
            RuntimeError::IllegalAttribute { .. }
        ));
        assert_eq!(outcome.output, "5\n");
    }

    #[test]
    fn test_callable_values_print_as_zero() {
        assert_eq!(run_lines("fun f() { } print f;"), vec!["0"]);
    }

    #[test]
    fn test_parse_errors_do_not_stop_recovered_statements() {
        let outcome = parse_and_run("print 1\nprint 2;");
        assert!(!outcome.parse_errors.is_empty());
        assert!(outcome.output.contains('2'));
    }
}
