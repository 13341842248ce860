//! Arena-allocated parse tree and the accumulated error record.
//!
//! Nodes live in one `Vec` and reference each other by index, so the tree has
//! no reference cycles and is trivially droppable after evaluation. Errors are
//! plain records collected in a list — nothing in the pipeline panics or
//! unwinds on malformed input.

use std::fmt;

use crate::token::{Token, TokenType};

/// Index of a node inside its [`ParseTree`] arena.
pub type NodeId = usize;

/// Numeric error codes carried by [`ParseError`].
pub mod codes {
    pub const EXPECTED_EXPRESSION: u32 = 101;
    pub const EXPECTED_TOKEN: u32 = 102;
    pub const TRAILING_INPUT: u32 = 103;
    pub const BAD_ARITY: u32 = 104;
    pub const UNKNOWN_FUNCTION: u32 = 201;
    pub const UNKNOWN_VARIABLE: u32 = 202;
    pub const UNASSIGNABLE: u32 = 203;
    pub const BAD_OPERAND: u32 = 204;
    pub const FUNCTION_FAILED: u32 = 205;
    pub const INTERNAL: u32 = 250;
}

/// One recorded diagnostic. Accumulated, never thrown.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub code: u32,
    pub line: u32,
    pub column: u32,
    pub position: usize,
    pub length: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at line {}, column {}",
            self.message, self.line, self.column
        )
    }
}

/// One parse-tree node: the token it was built from, a display label, and
/// index links to its children and parent.
#[derive(Debug, Clone)]
pub struct ParseNode {
    pub token: Token,
    pub label: String,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

/// The parse tree for one expression: node arena, error list, skipped tokens.
///
/// A tree with a non-empty error list must not be evaluated.
#[derive(Debug, Clone)]
pub struct ParseTree {
    source: String,
    nodes: Vec<ParseNode>,
    pub root: Option<NodeId>,
    pub errors: Vec<ParseError>,
    pub skipped: Vec<Token>,
}

impl ParseTree {
    pub fn new(source: &str) -> Self {
        ParseTree {
            source: source.to_owned(),
            nodes: Vec::new(),
            root: None,
            errors: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Add a node to the arena, initially detached.
    pub fn add_node(&mut self, token: Token, label: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(ParseNode {
            token,
            label: label.into(),
            children: Vec::new(),
            parent: None,
        });
        id
    }

    /// Append `child` to `parent`'s ordered child list and set its
    /// back-reference.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    pub fn node(&self, id: NodeId) -> &ParseNode {
        &self.nodes[id]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Build an error record positioned at `at`, resolving line and column
    /// from the stored source.
    pub fn make_error(&self, code: u32, message: String, at: &Token) -> ParseError {
        let (line, column) = self.line_col(at.position);
        ParseError {
            message,
            code,
            line,
            column,
            position: at.position,
            length: at.length,
        }
    }

    pub fn record_error(&mut self, code: u32, message: String, at: &Token) {
        let err = self.make_error(code, message, at);
        self.errors.push(err);
    }

    /// All recorded errors joined into one description.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(ParseError::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// 1-based line and column of a byte position in the source.
    pub fn line_col(&self, position: usize) -> (u32, u32) {
        let mut clamped = position.min(self.source.len());
        while clamped > 0 && !self.source.is_char_boundary(clamped) {
            clamped -= 1;
        }
        let before = &self.source[..clamped];
        let line = before.bytes().filter(|b| *b == b'\n').count() as u32 + 1;
        let column = (clamped - before.rfind('\n').map(|i| i + 1).unwrap_or(0)) as u32 + 1;
        (line, column)
    }

    /// Render the tree for debugging, one node per line, indented by depth.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            self.dump_node(root, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id];
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&node.label);
        if node.token.token_type == TokenType::Text {
            out.push_str(&format!(" \"{}\"", node.token.text));
        }
        out.push('\n');
        for &child in &node.children {
            self.dump_node(child, depth + 1, out);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
