//! End-to-end behavior of the whole pipeline: text in, value or error out.

use fexpr::{
    datum, evaluate, evaluate_with, CallbackMode, Context, Engine, FieldCallback, FunctionRegistry,
    MemoryStore, Value,
};

fn eval_ok(src: &str) -> String {
    let mut ctx = Context::new();
    eval_ok_ctx(src, &mut ctx)
}

fn eval_ok_ctx(src: &str, ctx: &mut Context) -> String {
    let out = evaluate(src, ctx);
    assert!(
        out.error.is_none(),
        "unexpected error for {src:?}: {:?}",
        out.error
    );
    out.value
}

fn eval_err(src: &str) -> String {
    let mut ctx = Context::new();
    let out = evaluate(src, &mut ctx);
    assert!(out.error.is_some(), "expected an error for {src:?}");
    assert!(out.value.is_empty(), "no value expected alongside an error");
    out.error.unwrap_or_default()
}

#[test]
fn power_is_left_associative() {
    assert_eq!(eval_ok("2^3^2"), "64");
}

#[test]
fn string_literal_round_trip() {
    assert_eq!(eval_ok("\"abc\""), "abc");
    assert_eq!(eval_ok("'abc'"), "abc");
}

#[test]
fn read_only_expression_is_idempotent() {
    let mut ctx = Context::new();
    ctx.set_global("a", Value::Number(3.0));
    let first = eval_ok_ctx("2*(a+1) > 3 ? 'big' : 'small'", &mut ctx);
    let second = eval_ok_ctx("2*(a+1) > 3 ? 'big' : 'small'", &mut ctx);
    assert_eq!(first, second);
    assert_eq!(first, "big");
}

#[test]
fn ternary_picks_branches() {
    assert_eq!(eval_ok("true ? 1 : 2"), "1");
    assert_eq!(eval_ok("false ? 1 : 2"), "2");
}

#[test]
fn assignment_persists_within_a_context() {
    let mut ctx = Context::new();
    assert_eq!(eval_ok_ctx("x = 5", &mut ctx), "");
    assert_eq!(eval_ok_ctx("x + 1", &mut ctx), "6");

    // A fresh context knows nothing about x.
    let error = eval_err("x + 1");
    assert!(error.contains("unknown variable 'x'"));
}

#[test]
fn assignment_contributes_nothing_to_enclosing_expression() {
    let mut ctx = Context::new();
    assert_eq!(eval_ok_ctx("(x = 5) & 'done'", &mut ctx), "done");
    assert_eq!(ctx.global("x"), Some(&Value::Number(5.0)));
}

#[test]
fn missing_parameters_are_a_parse_error_with_the_bound() {
    let error = eval_err("power(2)");
    assert!(error.contains("at least 2"), "got: {error}");
}

#[test]
fn extra_parameters_are_a_parse_error_with_the_bound() {
    let error = eval_err("abs(1; 2; 3)");
    assert!(error.contains("at most 1"), "got: {error}");
}

#[test]
fn store_resolution_and_misses() {
    let mut ctx = Context::new();
    ctx.add_store("s", MemoryStore::new().with("k", "v"));
    assert_eq!(datum::resolve(&mut ctx, "[*s:k]"), "v");
    assert_eq!(datum::resolve(&mut ctx, "[*s:missing]"), "");
}

#[test]
fn indirection_is_one_hop() {
    let mut ctx = Context::new();
    ctx.add_store("s", MemoryStore::new().with("k", "v"));
    ctx.set_global("ptr", Value::Text("[*s:k]".into()));
    assert_eq!(datum::resolve(&mut ctx, "#ptr#"), "v");
}

#[test]
fn to_boolean_heuristic() {
    assert_eq!(eval_ok("toBoolean('yes')"), "1");
    assert_eq!(eval_ok("toBoolean('NO')"), "0");
    assert_eq!(eval_ok("toBoolean('3')"), "1");
    assert_eq!(eval_ok("toBoolean('0')"), "0");
    assert_eq!(eval_ok("toBoolean('')"), "0");
}

#[test]
fn unmatched_paren_never_evaluates() {
    let error = eval_err("2*(a+1");
    assert!(error.contains("')'"));
}

// ── Beyond the headline properties ────────────────────────────────────────────

#[test]
fn precedence_tour() {
    assert_eq!(eval_ok("2 + 3 * 4"), "14");
    assert_eq!(eval_ok("(2 + 3) * 4"), "20");
    assert_eq!(eval_ok("2 * 2 ^ 3"), "16");
    assert_eq!(eval_ok("1 + 2 & 'x'"), "3x");
    assert_eq!(eval_ok("1 & 2 == '12'"), "1");
}

#[test]
fn equality_is_textual_relational_is_numeric() {
    // The asymmetry is intentional: == works on text forms, < on numbers.
    assert_eq!(eval_ok("'1.0' == 1"), "0");
    assert_eq!(eval_ok("'1.0' <= 1"), "1");
    assert_eq!(eval_ok("'02' == 2"), "0");
    assert_eq!(eval_ok("'02' >= 2"), "1");
}

#[test]
fn chained_logic() {
    assert_eq!(eval_ok("1 < 2 && 2 < 3"), "1");
    assert_eq!(eval_ok("1 > 2 || 2 > 1"), "1");
    assert_eq!(eval_ok("false && true || true"), "1");
}

#[test]
fn nested_ternary() {
    assert_eq!(eval_ok("true ? false ? 'a' : 'b' : 'c'"), "b");
}

#[test]
fn functions_compose() {
    assert_eq!(eval_ok("sum(1; 2; 3) * max(1; 2)"), "12");
    assert_eq!(eval_ok("upper(left('rust'; 1)) & 'ight'"), "Right");
    assert_eq!(eval_ok("IF(contains('abc'; 'b'); 'in'; 'out')"), "in");
}

#[test]
fn whitespace_and_newlines_are_insignificant() {
    assert_eq!(eval_ok("  1\n +\t2 "), "3");
}

#[test]
fn timestamps_flow_through_operators() {
    assert_eq!(
        eval_ok("formatDate(addDays(toTimestamp('2024-02-28'); 2); '%Y-%m-%d')"),
        "2024-03-01"
    );
    assert_eq!(eval_ok("toTimestamp('2024-01-05') & ''"), "2024-01-05T00:00:00");
    assert_eq!(
        eval_ok("toTimestamp('2024-01-05') < toTimestamp('2024-01-06')"),
        "1"
    );
}

#[test]
fn number_rendering() {
    assert_eq!(eval_ok("10 / 4"), "2.5");
    assert_eq!(eval_ok("10 / 5"), "2");
    assert_eq!(eval_ok("1 / 0"), "inf");
}

#[test]
fn evaluate_with_store_and_callback() {
    struct HostFields;
    impl FieldCallback for HostFields {
        fn resolve(
            &mut self,
            _prefix: &str,
            field: &str,
            _value: Option<&str>,
            _mode: CallbackMode,
        ) -> Result<Option<String>, String> {
            if field == "customer" {
                Ok(Some("ACME".to_owned()))
            } else {
                Ok(None)
            }
        }
    }

    let out = evaluate_with(
        "greeting & ', ' & name",
        &[("greeting", "Hello"), ("name", "Ada")],
        Some(Box::new(MemoryStore::new().with("k", "v"))),
        Some(Box::new(HostFields)),
    );
    assert_eq!(out.value, "Hello, Ada");

    // The same pieces are reachable through the addressing layer.
    let mut ctx = Context::new();
    ctx.add_store("default", MemoryStore::new().with("k", "v"));
    ctx.set_callback(HostFields);
    assert_eq!(datum::resolve(&mut ctx, "[*k]"), "v");
    assert_eq!(datum::resolve(&mut ctx, "[customer]"), "ACME");
    assert_eq!(datum::resolve(&mut ctx, "[unknown]"), "");
}

#[test]
fn multiple_eval_errors_accumulate() {
    let mut ctx = Context::new();
    let out = evaluate("a & b", &mut ctx);
    let error = out.error.expect("two unknown variables");
    assert!(error.contains("'a'"));
    assert!(error.contains("'b'"));
    assert!(error.contains("; "));
}

#[test]
fn custom_function_is_callable_and_arity_checked() {
    let mut registry = FunctionRegistry::standard();
    registry.add(fexpr::Function::new(
        "tax", 1, 2,
        "Price with tax applied.",
        &["price: the net price", "rate: tax rate (default 0.2)"],
        |_, args| {
            let price = args.first().map(Value::to_number).unwrap_or(0.0);
            let rate = args.get(1).map(Value::to_number).unwrap_or(0.2);
            Ok(Value::Number(price * (1.0 + rate)))
        },
    ));
    let engine = Engine::new(std::sync::Arc::new(registry));
    let mut ctx = Context::new();
    assert_eq!(engine.evaluate("tax(100)", &mut ctx).value, "120");
    assert_eq!(engine.evaluate("tax(100; 0.5)", &mut ctx).value, "150");
    let out = engine.evaluate("tax()", &mut ctx);
    assert!(out.error.expect("arity error").contains("at least 1"));
}

#[test]
fn case_insensitive_function_names() {
    assert_eq!(eval_ok("ABS(-3)"), "3");
    assert_eq!(eval_ok("PoWeR(2; 3)"), "8");
}

#[test]
fn parse_without_evaluating() {
    let engine = Engine::default();
    let tree = engine.parse("1 + 2 * 3");
    assert!(!tree.has_errors());
    assert!(tree.root.is_some());

    let bad = engine.parse("1 +");
    assert!(bad.has_errors());
    assert_eq!(bad.errors.len(), 1);
}
