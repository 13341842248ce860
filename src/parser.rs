//! Recursive-descent expression parser.
//!
//! One method per grammar production, in strictly decreasing binding
//! strength. Each production adds one node to the tree arena; a failed
//! terminal scan records exactly one [`ParseError`] and abandons the
//! production by returning `None`, which short-circuits all the way up.
//! Nothing here panics or unwinds on malformed input.
//!
//! Precedence (highest → lowest):
//!   primary → unary → power → multiplicative → additive → concat →
//!   relational → equality → and → or → ternary → assignment
//!
//! Call parameters are separated by `;` (the comma stays available to text
//! flowing through formulas). When the called name is present in the
//! registry, the parameter count is validated against the declared arity
//! right here, so an arity violation is a parse error and the expression
//! yields no value.

use crate::functions::FunctionRegistry;
use crate::token::{Token, TokenType};
use crate::tokenizer::Tokenizer;
use crate::tree::{codes, NodeId, ParseTree};

/// Parse one expression against the given function catalog.
pub fn parse(text: &str, registry: &FunctionRegistry) -> ParseTree {
    Parser {
        tz: Tokenizer::new(text),
        registry,
        tree: ParseTree::new(text),
    }
    .run()
}

struct Parser<'a> {
    tz: Tokenizer,
    registry: &'a FunctionRegistry,
    tree: ParseTree,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> ParseTree {
        let root = self.expression();
        self.tree.root = root;

        if root.is_some() && !self.tz.at_end() {
            let at = self.tz.current().clone();
            self.tree.record_error(
                codes::TRAILING_INPUT,
                format!("unexpected {} after expression", at.describe()),
                &at,
            );
            self.tree.skipped = self.tz.drain();
        }
        if root.is_none() && !self.tree.has_errors() {
            // Every failure path records its own error; this is the backstop.
            let at = self.tz.farthest().clone();
            self.tree.record_error(
                codes::INTERNAL,
                format!("internal: parse failed near {}", at.describe()),
                &at,
            );
        }
        self.tree
    }

    // ── Node helpers ──────────────────────────────────────────────────────────

    fn begin(&mut self, tt: TokenType) -> NodeId {
        let token = Token::production(tt, self.tz.current().position);
        self.tree.add_node(token, tt.name())
    }

    fn terminal(&mut self, token: Token) -> NodeId {
        let label = token.text.clone();
        self.tree.add_node(token, label)
    }

    /// Record one error at the current token and abandon the production.
    fn fail(&mut self, code: u32, message: String) -> Option<NodeId> {
        let at = self.tz.current().clone();
        self.tree.record_error(code, message, &at);
        None
    }

    // ── Productions ───────────────────────────────────────────────────────────

    /// Expression := Assignment (`=` Assignment)?
    ///
    /// The statement-level assignment; what the left side may be is decided
    /// during evaluation.
    fn expression(&mut self) -> Option<NodeId> {
        let node = self.begin(TokenType::Expression);
        let lhs = self.assignment()?;
        self.tree.attach(node, lhs);
        if self.tz.look_ahead(&[TokenType::Assign]).is_some() {
            let op = self.tz.take();
            let op_node = self.terminal(op);
            self.tree.attach(node, op_node);
            let rhs = self.assignment()?;
            self.tree.attach(node, rhs);
        }
        Some(node)
    }

    /// Assignment := ConditionalOr (`?` Assignment `:` Assignment)?
    fn assignment(&mut self) -> Option<NodeId> {
        let node = self.begin(TokenType::Assignment);
        let cond = self.conditional_or()?;
        self.tree.attach(node, cond);
        if self.tz.look_ahead(&[TokenType::Question]).is_some() {
            let op = self.tz.take();
            let op_node = self.terminal(op);
            self.tree.attach(node, op_node);
            let then = self.assignment()?;
            self.tree.attach(node, then);
            if self.tz.scan(TokenType::Colon).is_none() {
                return self.fail(
                    codes::EXPECTED_TOKEN,
                    format!(
                        "expected ':' in conditional, found {}",
                        self.tz.current().describe()
                    ),
                );
            }
            let otherwise = self.assignment()?;
            self.tree.attach(node, otherwise);
        }
        Some(node)
    }

    fn conditional_or(&mut self) -> Option<NodeId> {
        self.chain(TokenType::ConditionalOr, &[TokenType::OrOr], Self::conditional_and)
    }

    fn conditional_and(&mut self) -> Option<NodeId> {
        self.chain(TokenType::ConditionalAnd, &[TokenType::AndAnd], Self::equality)
    }

    fn equality(&mut self) -> Option<NodeId> {
        self.chain(
            TokenType::Equality,
            &[TokenType::EqEq, TokenType::BangEq],
            Self::relational,
        )
    }

    /// Relational := Concat ((`<`|`<=`|`>`|`>=`) Concat)? — at most one.
    fn relational(&mut self) -> Option<NodeId> {
        let node = self.begin(TokenType::Relational);
        let lhs = self.concat()?;
        self.tree.attach(node, lhs);
        if self
            .tz
            .look_ahead(&[
                TokenType::Less,
                TokenType::LessEq,
                TokenType::Greater,
                TokenType::GreaterEq,
            ])
            .is_some()
        {
            let op = self.tz.take();
            let op_node = self.terminal(op);
            self.tree.attach(node, op_node);
            let rhs = self.concat()?;
            self.tree.attach(node, rhs);
        }
        Some(node)
    }

    fn concat(&mut self) -> Option<NodeId> {
        self.chain(TokenType::Concat, &[TokenType::Ampersand], Self::additive)
    }

    fn additive(&mut self) -> Option<NodeId> {
        self.chain(
            TokenType::Additive,
            &[TokenType::Plus, TokenType::Minus],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Option<NodeId> {
        self.chain(
            TokenType::Multiplicative,
            &[TokenType::Star, TokenType::Slash, TokenType::Percent],
            Self::power,
        )
    }

    /// Power := Unary (`^` Unary)* — folded left-to-right by the evaluator.
    fn power(&mut self) -> Option<NodeId> {
        self.chain(TokenType::Power, &[TokenType::Caret], Self::unary)
    }

    /// Left-associative operator chain: `next (op next)*`.
    fn chain(
        &mut self,
        tt: TokenType,
        ops: &[TokenType],
        next: fn(&mut Self) -> Option<NodeId>,
    ) -> Option<NodeId> {
        let node = self.begin(tt);
        let first = next(self)?;
        self.tree.attach(node, first);
        while self.tz.look_ahead(ops).is_some() {
            let op = self.tz.take();
            let op_node = self.terminal(op);
            self.tree.attach(node, op_node);
            let rhs = next(self)?;
            self.tree.attach(node, rhs);
        }
        Some(node)
    }

    /// Unary := Primary | (`+`|`-`|`!`) Unary
    fn unary(&mut self) -> Option<NodeId> {
        let node = self.begin(TokenType::Unary);
        if self
            .tz
            .look_ahead(&[TokenType::Plus, TokenType::Minus, TokenType::Bang])
            .is_some()
        {
            let op = self.tz.take();
            let op_node = self.terminal(op);
            self.tree.attach(node, op_node);
            let operand = self.unary()?;
            self.tree.attach(node, operand);
        } else {
            let primary = self.primary()?;
            self.tree.attach(node, primary);
        }
        Some(node)
    }

    /// Primary := Call | Variable | Literal | `(` Expression `)`
    fn primary(&mut self) -> Option<NodeId> {
        let node = self.begin(TokenType::Primary);
        if self.tz.look_ahead(&[TokenType::Function]).is_some() {
            let call = self.call()?;
            self.tree.attach(node, call);
        } else if self
            .tz
            .look_ahead(&[
                TokenType::Variable,
                TokenType::Integer,
                TokenType::Real,
                TokenType::Text,
                TokenType::Boolean,
            ])
            .is_some()
        {
            let literal = self.tz.take();
            let leaf = self.terminal(literal);
            self.tree.attach(node, leaf);
        } else if self.tz.look_ahead(&[TokenType::LParen]).is_some() {
            self.tz.take();
            let inner = self.expression()?;
            self.tree.attach(node, inner);
            if self.tz.scan(TokenType::RParen).is_none() {
                return self.fail(
                    codes::EXPECTED_TOKEN,
                    format!("expected ')', found {}", self.tz.current().describe()),
                );
            }
        } else {
            return self.fail(
                codes::EXPECTED_EXPRESSION,
                format!(
                    "expected an expression, found {}",
                    self.tz.current().describe()
                ),
            );
        }
        Some(node)
    }

    /// Call := FUNCTION `(` Params? `)`, Params := Expression (`;` Expression)*
    fn call(&mut self) -> Option<NodeId> {
        let name = match self.tz.scan(TokenType::Function) {
            Some(t) => t,
            None => {
                return self.fail(
                    codes::EXPECTED_TOKEN,
                    format!("expected a function name, found {}", self.tz.current().describe()),
                )
            }
        };
        let token = Token::new(TokenType::Call, name.text.clone(), name.position, name.length);
        let node = self.tree.add_node(token, name.text.clone());

        if self.tz.scan(TokenType::LParen).is_none() {
            return self.fail(
                codes::EXPECTED_TOKEN,
                format!("expected '(' after '{}'", name.text),
            );
        }

        let mut argc = 0;
        if self.tz.look_ahead(&[TokenType::RParen]).is_none() {
            let params = self.begin(TokenType::Params);
            loop {
                let param = self.expression()?;
                self.tree.attach(params, param);
                argc += 1;
                if self.tz.look_ahead(&[TokenType::Semicolon]).is_some() {
                    self.tz.take();
                } else {
                    break;
                }
            }
            self.tree.attach(node, params);
        }

        if self.tz.scan(TokenType::RParen).is_none() {
            return self.fail(
                codes::EXPECTED_TOKEN,
                format!(
                    "expected ')' to close the call to '{}', found {}",
                    name.text,
                    self.tz.current().describe()
                ),
            );
        }

        // Known names get their parameter count checked while the call is
        // still on the stack; unknown names are the evaluator's concern.
        if let Some(f) = self.registry.get(&name.text) {
            if argc < f.min_params() {
                return self.fail(
                    codes::BAD_ARITY,
                    format!(
                        "function '{}' expects at least {} parameter(s), got {}",
                        f.name(),
                        f.min_params(),
                        argc
                    ),
                );
            }
            if argc > f.max_params() {
                return self.fail(
                    codes::BAD_ARITY,
                    format!(
                        "function '{}' expects at most {} parameter(s), got {}",
                        f.name(),
                        f.max_params(),
                        argc
                    ),
                );
            }
        }
        Some(node)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
