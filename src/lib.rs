//! Embeddable formula-expression engine for document-templating hosts.
//!
//! One call tokenizes a formula string, parses it into a tree under strict
//! operator precedence, and walks the tree to a single dynamically-typed
//! result (number, boolean, text, or timestamp). Malformed input never
//! panics: lexical, grammar and evaluation problems are accumulated as
//! records and come back as one concatenated description.
//!
//! - Arithmetic (`+ - * / % ^`), text concatenation (`&`), comparisons,
//!   boolean logic, a ternary operator, and statement-level assignment.
//! - Native functions with declared arity, looked up case-insensitively in a
//!   shared catalog (`power(2; 10)` — parameters are semicolon-separated).
//! - A per-evaluation [`Context`] carrying globals, named stores, named
//!   documents, an optional host callback and an optional URL fetcher.
//! - A field-addressing layer ([`datum`]) that resolves references like
//!   `[*store:key]`, `[$document]`, `[callback-field]` and `#indirect#`
//!   outside the grammar, forgivingly.
//!
//! # Quick start
//!
//! ```rust
//! use fexpr::{evaluate, Context, Value};
//!
//! let mut ctx = Context::new();
//! ctx.set_global("a", Value::Number(3.0));
//! let out = evaluate("2*(a+1) > 3 ? 'big' : 'small'", &mut ctx);
//! assert_eq!(out.value, "big");
//! assert!(out.error.is_none());
//! ```

pub mod context;
pub mod datum;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod token;
pub mod tokenizer;
pub mod tree;
pub mod value;

use std::sync::Arc;

pub use context::{
    CallbackMode, Context, Document, FieldCallback, MemoryStore, Store, TextDocument, UrlFetcher,
};
pub use datum::{Datum, DatumKind};
pub use eval::{Evaluation, Evaluator};
pub use functions::{Function, FunctionRegistry, VARIADIC};
pub use token::{Token, TokenType};
pub use tree::{ParseError, ParseTree};
pub use value::Value;

/// What one evaluation hands back to the host: the value's text form, or a
/// concatenated error description. Exactly one of the two is meaningful —
/// whenever any error was recorded, the value is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub value: String,
    pub error: Option<String>,
}

/// The parser/evaluator pair bound to one function catalog.
///
/// Hosts that extend the catalog build their own [`FunctionRegistry`] and
/// inject it here; everyone else goes through [`evaluate`].
pub struct Engine {
    registry: Arc<FunctionRegistry>,
}

impl Engine {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Engine { registry }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Tokenize and parse one expression. The returned tree carries any
    /// accumulated errors; a tree with errors must not be evaluated.
    pub fn parse(&self, text: &str) -> ParseTree {
        parser::parse(text, &self.registry)
    }

    /// Parse and evaluate one expression against the given context.
    pub fn evaluate(&self, text: &str, ctx: &mut Context) -> EvalOutcome {
        let tree = self.parse(text);
        if tree.has_errors() {
            return EvalOutcome {
                value: String::new(),
                error: Some(tree.error_summary()),
            };
        }
        let evaluation = Evaluator::new(&self.registry).evaluate(&tree, ctx);
        match evaluation.error_summary() {
            Some(error) => EvalOutcome {
                value: String::new(),
                error: Some(error),
            },
            None => EvalOutcome {
                value: evaluation.value.to_text(),
                error: None,
            },
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(FunctionRegistry::standard_shared())
    }
}

/// Evaluate one expression with the standard catalog.
pub fn evaluate(text: &str, ctx: &mut Context) -> EvalOutcome {
    Engine::default().evaluate(text, ctx)
}

/// Evaluate one expression against a freshly built context: an environment of
/// name/value pairs loaded into the globals, an optional store registered
/// under the default store name, and an optional host callback.
pub fn evaluate_with(
    text: &str,
    environment: &[(&str, &str)],
    store: Option<Box<dyn Store>>,
    callback: Option<Box<dyn FieldCallback>>,
) -> EvalOutcome {
    let mut ctx = Context::new();
    for (name, value) in environment {
        ctx.set_global(*name, Value::Text((*value).to_owned()));
    }
    if let Some(store) = store {
        let name = ctx.default_store().to_owned();
        ctx.add_store_boxed(&name, store);
    }
    if let Some(callback) = callback {
        ctx.set_callback_boxed(callback);
    }
    Engine::default().evaluate(text, &mut ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_value_on_success() {
        let mut ctx = Context::new();
        let out = evaluate("1 + 2", &mut ctx);
        assert_eq!(out.value, "3");
        assert!(out.error.is_none());
    }

    #[test]
    fn outcome_error_on_parse_failure() {
        let mut ctx = Context::new();
        let out = evaluate("2*(", &mut ctx);
        assert!(out.value.is_empty());
        assert!(out.error.is_some());
    }

    #[test]
    fn outcome_error_on_eval_failure() {
        let mut ctx = Context::new();
        let out = evaluate("mystery()", &mut ctx);
        assert!(out.value.is_empty());
        let error = out.error.expect("error expected");
        assert!(error.contains("unknown function"));
    }

    #[test]
    fn evaluate_with_builds_a_context() {
        let out = evaluate_with("name & '!'", &[("name", "Ada")], None, None);
        assert_eq!(out.value, "Ada!");
    }

    #[test]
    fn custom_registry_through_engine() {
        let mut registry = FunctionRegistry::standard();
        registry.add(Function::new(
            "answer", 0, 0,
            "The answer.",
            &[],
            |_, _| Ok(Value::Number(42.0)),
        ));
        let engine = Engine::new(Arc::new(registry));
        let mut ctx = Context::new();
        assert_eq!(engine.evaluate("answer()", &mut ctx).value, "42");
    }
}
