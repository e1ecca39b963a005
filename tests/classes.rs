mod common;

use common::{run_lines, run_outcome};
use ivy::interpreter::RuntimeError;

#[test]
fn test_construction_runs_the_initializer() {
    assert_eq!(
        run_lines(
            "class Point { fun init(x, y) { self.x = x; self.y = y; } } \
             p = Point(3, 4); print p.x; print p.y;"
        ),
        vec!["3", "4"]
    );
}

#[test]
fn test_class_without_initializer_constructs_bare_instances() {
    assert_eq!(
        run_lines("class Bag { } b = Bag(); b.n = 7; print b.n;"),
        vec!["7"]
    );
}

#[test]
fn test_methods_see_the_receiver() {
    assert_eq!(
        run_lines(
            "class Counter { fun init() { self.n = 0; } \
             fun bump() { self.n = self.n + 1; } \
             fun value() { return self.n; } } \
             c = Counter(); c.bump(); c.bump(); print c.value();"
        ),
        vec!["2"]
    );
}

#[test]
fn test_instances_hold_independent_state() {
    assert_eq!(
        run_lines(
            "class P { fun init(v) { self.v = v; } } \
             a = P(1); b = P(2); print a.v; print b.v;"
        ),
        vec!["1", "2"]
    );
}

#[test]
fn test_extracted_methods_keep_their_receivers() {
    // Looking up the same method on two instances yields two values, each
    // bound to its own instance.
    assert_eq!(
        run_lines(
            "class P { fun init(v) { self.v = v; } fun get() { return self.v; } } \
             a = P(1); b = P(2); ga = a.get; gb = b.get; \
             print ga(); print gb();"
        ),
        vec!["1", "2"]
    );
}

#[test]
fn test_fields_shadow_methods() {
    assert_eq!(
        run_lines(
            "class C { fun get() { return 1; } } \
             c = C(); c.get = 5; print c.get;"
        ),
        vec!["5"]
    );
}

#[test]
fn test_methods_may_omit_the_fun_keyword() {
    assert_eq!(
        run_lines("class C { get() { return 9; } } print C().get();"),
        vec!["9"]
    );
}

#[test]
fn test_initializer_result_is_discarded() {
    // Construction yields the instance even when init returns something.
    assert_eq!(
        run_lines(
            "class C { fun init() { self.v = 1; return 42; } } \
             c = C(); print c.v;"
        ),
        vec!["1"]
    );
}

#[test]
fn test_methods_call_each_other_through_self() {
    assert_eq!(
        run_lines(
            "class C { fun init(v) { self.v = v; } \
             fun double() { return self.v * 2; } \
             fun quad() { return self.double() * 2; } } \
             print C(3).quad();"
        ),
        vec!["12"]
    );
}

#[test]
fn test_reading_an_unset_attribute_reports() {
    let outcome = run_outcome("class C { } c = C(); print c.missing;");
    assert!(matches!(
        outcome.runtime_errors[0],
        RuntimeError::UndefinedAttribute { .. }
    ));
    assert_eq!(outcome.output, "0\n");
}

#[test]
fn test_initializer_arity_is_checked() {
    let outcome = run_outcome("class C { fun init(a) { self.a = a; } } c = C(1, 2);");
    assert!(matches!(
        outcome.runtime_errors[0],
        RuntimeError::ArityMismatch { .. }
    ));
}

#[test]
fn test_instances_print_as_zero() {
    assert_eq!(run_lines("class C { } print C();"), vec!["0"]);
}
