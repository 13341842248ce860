//! Tree-walking evaluator.
//!
//! Walks the parse tree by production tag, coercing at every operator
//! boundary and consulting the context for variable reads and writes and the
//! registry for calls. Semantic problems (unknown function or variable,
//! unassignable left side, failed implementation) are recorded in the
//! evaluation's own error list — the tree itself stays untouched — the
//! offending subtree becomes `Void`, and its siblings still evaluate. Nodes
//! that can never head a subtree route to an internal-error record on the
//! same channel; nothing in here panics on any tree the parser can produce.
//!
//! Semantics worth calling out:
//! - arithmetic runs on `f64` under IEEE rules, so `1/0` is infinity, not an
//!   error, and `^` folds left-to-right;
//! - `==`/`!=` compare the operands' *text* forms, while `<`/`<=`/`>`/`>=`
//!   compare numerically as soon as either side is a number;
//! - the ternary fires only on a boolean condition, any other value passes
//!   through unchanged;
//! - assignment only accepts a bare variable on the left and evaluates to
//!   `Void`.

use crate::context::Context;
use crate::functions::FunctionRegistry;
use crate::token::TokenType;
use crate::tree::{codes, NodeId, ParseError, ParseTree};
use crate::value::Value;

/// The outcome of walking one tree: the value and the evaluation-time errors.
#[derive(Default)]
pub struct Evaluation {
    pub value: Value,
    pub errors: Vec<ParseError>,
}

impl Evaluation {
    /// All recorded errors joined into one description, if any.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(ParseError::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

pub struct Evaluator<'a> {
    registry: &'a FunctionRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Evaluator { registry }
    }

    /// Walk the tree. A tree with parse errors is refused up front.
    pub fn evaluate(&self, tree: &ParseTree, ctx: &mut Context) -> Evaluation {
        let mut errors = Vec::new();
        let value = match tree.root {
            Some(root) if !tree.has_errors() => self.eval_node(tree, root, ctx, &mut errors),
            _ => {
                errors.push(ParseError {
                    message: "expression has parse errors and cannot be evaluated".to_owned(),
                    code: codes::INTERNAL,
                    line: 1,
                    column: 1,
                    position: 0,
                    length: 0,
                });
                Value::Void
            }
        };
        Evaluation { value, errors }
    }

    fn eval_node(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        match tree.node(id).token.token_type {
            TokenType::Expression => self.eval_expression(tree, id, ctx, errors),
            TokenType::Assignment => self.eval_ternary(tree, id, ctx, errors),
            TokenType::ConditionalOr => self.eval_or(tree, id, ctx, errors),
            TokenType::ConditionalAnd => self.eval_and(tree, id, ctx, errors),
            TokenType::Equality => self.eval_equality(tree, id, ctx, errors),
            TokenType::Relational => self.eval_relational(tree, id, ctx, errors),
            TokenType::Concat => self.eval_concat(tree, id, ctx, errors),
            TokenType::Additive | TokenType::Multiplicative | TokenType::Power => {
                self.eval_arithmetic(tree, id, ctx, errors)
            }
            TokenType::Unary => self.eval_unary(tree, id, ctx, errors),
            TokenType::Primary => self.eval_single_child(tree, id, ctx, errors),
            TokenType::Call => self.eval_call(tree, id, ctx, errors),
            TokenType::Integer | TokenType::Real => {
                Value::Number(parse_number_literal(&tree.node(id).token.text))
            }
            TokenType::Text => Value::Text(tree.node(id).token.text.clone()),
            TokenType::Boolean => {
                Value::Bool(tree.node(id).token.text.eq_ignore_ascii_case("true"))
            }
            TokenType::Variable => {
                let name = &tree.node(id).token.text;
                match ctx.global(name) {
                    Some(v) => v.clone(),
                    None => {
                        errors.push(tree.make_error(
                            codes::UNKNOWN_VARIABLE,
                            format!("unknown variable '{name}'"),
                            &tree.node(id).token,
                        ));
                        Value::Void
                    }
                }
            }
            // Operators, punctuation, Params and the rest never head a
            // subtree; reaching one is an engine defect, reported like any
            // other error.
            _ => self.internal(tree, id, errors),
        }
    }

    fn internal(&self, tree: &ParseTree, id: NodeId, errors: &mut Vec<ParseError>) -> Value {
        let node = tree.node(id);
        errors.push(tree.make_error(
            codes::INTERNAL,
            format!("internal: node '{}' cannot be evaluated", node.label),
            &node.token,
        ));
        Value::Void
    }

    /// Pass-through for wrapper nodes with exactly one child.
    fn eval_single_child(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        match tree.children(id) {
            [child] => self.eval_node(tree, *child, ctx, errors),
            _ => self.internal(tree, id, errors),
        }
    }

    /// Expression := Assignment (`=` Assignment)?
    fn eval_expression(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        match kids {
            [single] => self.eval_node(tree, *single, ctx, errors),
            [lhs, _op, rhs] => {
                let value = self.eval_node(tree, *rhs, ctx, errors);
                match assignment_target(tree, *lhs) {
                    Target::Variable(name) => {
                        ctx.set_global(name, value);
                    }
                    Target::Call(name) => {
                        errors.push(tree.make_error(
                            codes::UNASSIGNABLE,
                            format!("cannot assign to function '{name}'"),
                            &tree.node(*lhs).token,
                        ));
                    }
                    Target::None => {
                        errors.push(tree.make_error(
                            codes::UNASSIGNABLE,
                            "left side of assignment must be a variable".to_owned(),
                            &tree.node(*lhs).token,
                        ));
                    }
                }
                Value::Void
            }
            _ => self.internal(tree, id, errors),
        }
    }

    /// Assignment := ConditionalOr (`?` Assignment `:` Assignment)?
    ///
    /// Fires only on a boolean condition; any other value passes through.
    fn eval_ternary(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        match kids {
            [single] => self.eval_node(tree, *single, ctx, errors),
            [cond, _op, then, otherwise] => {
                let picked = self.eval_node(tree, *cond, ctx, errors);
                match picked {
                    Value::Bool(true) => self.eval_node(tree, *then, ctx, errors),
                    Value::Bool(false) => self.eval_node(tree, *otherwise, ctx, errors),
                    other => other,
                }
            }
            _ => self.internal(tree, id, errors),
        }
    }

    fn eval_or(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        if kids.len() == 1 {
            return self.eval_node(tree, kids[0], ctx, errors);
        }
        if kids.is_empty() {
            return self.internal(tree, id, errors);
        }
        let mut acc = self.eval_node(tree, kids[0], ctx, errors).to_bool();
        let mut i = 1;
        while i + 1 < kids.len() && !acc {
            acc = self.eval_node(tree, kids[i + 1], ctx, errors).to_bool();
            i += 2;
        }
        Value::Bool(acc)
    }

    fn eval_and(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        if kids.len() == 1 {
            return self.eval_node(tree, kids[0], ctx, errors);
        }
        if kids.is_empty() {
            return self.internal(tree, id, errors);
        }
        let mut acc = self.eval_node(tree, kids[0], ctx, errors).to_bool();
        let mut i = 1;
        while i + 1 < kids.len() && acc {
            acc = self.eval_node(tree, kids[i + 1], ctx, errors).to_bool();
            i += 2;
        }
        Value::Bool(acc)
    }

    /// `==`/`!=` over text representations, left-folded.
    fn eval_equality(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        if kids.len() == 1 {
            return self.eval_node(tree, kids[0], ctx, errors);
        }
        if kids.is_empty() {
            return self.internal(tree, id, errors);
        }
        let mut acc = self.eval_node(tree, kids[0], ctx, errors);
        let mut i = 1;
        while i + 1 < kids.len() {
            let op = tree.node(kids[i]).token.token_type;
            let rhs = self.eval_node(tree, kids[i + 1], ctx, errors);
            let equal = acc.to_text() == rhs.to_text();
            acc = Value::Bool(match op {
                TokenType::EqEq => equal,
                TokenType::BangEq => !equal,
                _ => return self.internal(tree, kids[i], errors),
            });
            i += 2;
        }
        acc
    }

    /// `<`/`<=`/`>`/`>=`: numeric when either side is a number, else ordinal
    /// text comparison.
    fn eval_relational(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        match kids {
            [single] => self.eval_node(tree, *single, ctx, errors),
            [lhs, op, rhs] => {
                let l = self.eval_node(tree, *lhs, ctx, errors);
                let r = self.eval_node(tree, *rhs, ctx, errors);
                let ordering = if matches!(l, Value::Number(_)) || matches!(r, Value::Number(_)) {
                    l.to_number()
                        .partial_cmp(&r.to_number())
                        .unwrap_or(std::cmp::Ordering::Equal)
                } else {
                    l.to_text().cmp(&r.to_text())
                };
                let holds = match tree.node(*op).token.token_type {
                    TokenType::Less => ordering.is_lt(),
                    TokenType::LessEq => ordering.is_le(),
                    TokenType::Greater => ordering.is_gt(),
                    TokenType::GreaterEq => ordering.is_ge(),
                    _ => return self.internal(tree, *op, errors),
                };
                Value::Bool(holds)
            }
            _ => self.internal(tree, id, errors),
        }
    }

    fn eval_concat(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        if kids.len() == 1 {
            return self.eval_node(tree, kids[0], ctx, errors);
        }
        if kids.is_empty() {
            return self.internal(tree, id, errors);
        }
        let mut out = self.eval_node(tree, kids[0], ctx, errors).to_text();
        let mut i = 1;
        while i + 1 < kids.len() {
            out.push_str(&self.eval_node(tree, kids[i + 1], ctx, errors).to_text());
            i += 2;
        }
        Value::Text(out)
    }

    /// Shared left fold for `+ - * / % ^` chains on `f64`.
    fn eval_arithmetic(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        if kids.len() == 1 {
            return self.eval_node(tree, kids[0], ctx, errors);
        }
        if kids.is_empty() {
            return self.internal(tree, id, errors);
        }
        let mut acc = self.eval_node(tree, kids[0], ctx, errors).to_number();
        let mut i = 1;
        while i + 1 < kids.len() {
            let op = tree.node(kids[i]).token.token_type;
            let rhs = self.eval_node(tree, kids[i + 1], ctx, errors).to_number();
            acc = match op {
                TokenType::Plus => acc + rhs,
                TokenType::Minus => acc - rhs,
                TokenType::Star => acc * rhs,
                TokenType::Slash => acc / rhs,
                TokenType::Percent => acc % rhs,
                TokenType::Caret => acc.powf(rhs),
                _ => return self.internal(tree, kids[i], errors),
            };
            i += 2;
        }
        Value::Number(acc)
    }

    fn eval_unary(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let kids = tree.children(id);
        match kids {
            [single] => self.eval_node(tree, *single, ctx, errors),
            [op, operand] => {
                let v = self.eval_node(tree, *operand, ctx, errors);
                let op_type = tree.node(*op).token.token_type;
                if v.is_void() {
                    errors.push(tree.make_error(
                        codes::BAD_OPERAND,
                        format!("operand of '{}' has no value", op_type.name()),
                        &tree.node(*op).token,
                    ));
                    return Value::Void;
                }
                match op_type {
                    TokenType::Plus => Value::Number(v.to_number()),
                    TokenType::Minus => Value::Number(-v.to_number()),
                    TokenType::Bang => Value::Bool(!v.to_bool()),
                    _ => self.internal(tree, *op, errors),
                }
            }
            _ => self.internal(tree, id, errors),
        }
    }

    /// Call := name `(` Params? `)` — name resolved case-insensitively,
    /// parameters evaluated in order into a positional array.
    fn eval_call(
        &self,
        tree: &ParseTree,
        id: NodeId,
        ctx: &mut Context,
        errors: &mut Vec<ParseError>,
    ) -> Value {
        let name = tree.node(id).token.text.clone();
        let mut args = Vec::new();
        for &child in tree.children(id) {
            if tree.node(child).token.token_type == TokenType::Params {
                for &param in tree.children(child) {
                    args.push(self.eval_node(tree, param, ctx, errors));
                }
            }
        }
        let Some(function) = self.registry.get(&name) else {
            errors.push(tree.make_error(
                codes::UNKNOWN_FUNCTION,
                format!("unknown function '{name}'"),
                &tree.node(id).token,
            ));
            return Value::Void;
        };
        match function.invoke(ctx, &args) {
            Ok(value) => value,
            Err(message) => {
                errors.push(tree.make_error(
                    codes::FUNCTION_FAILED,
                    message,
                    &tree.node(id).token,
                ));
                Value::Void
            }
        }
    }
}

/// Decimal or `0x` hexadecimal literal text to `f64`.
fn parse_number_literal(text: &str) -> f64 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).unwrap_or(0) as f64
    } else {
        text.parse().unwrap_or(0.0)
    }
}

// ── Assignment targets ────────────────────────────────────────────────────────

enum Target {
    Variable(String),
    Call(String),
    None,
}

/// Reduce an assignment's left side to its target: a chain of single-child
/// wrappers ending in a bare variable or a call node. Anything else is not
/// assignable.
fn assignment_target(tree: &ParseTree, mut id: NodeId) -> Target {
    loop {
        let node = tree.node(id);
        match node.token.token_type {
            TokenType::Variable => return Target::Variable(node.token.text.clone()),
            TokenType::Call => return Target::Call(node.token.text.clone()),
            _ => match tree.children(id) {
                [only] => id = *only,
                _ => return Target::None,
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
