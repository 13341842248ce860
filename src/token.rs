//! Token record and the closed token-type enumeration.
//!
//! `TokenType` covers both terminals (what the tokenizer produces) and the
//! grammar-production tags the parser stamps onto interior tree nodes, so a
//! parse tree is homogeneous: every node carries a `Token`.

use std::fmt;

/// Kind of a token or of a grammar production node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // ── Literals ──────────────────────────────────────────────────────────────
    /// Decimal or `0x` hexadecimal integer literal.
    Integer,
    /// Real literal with a decimal point and/or exponent.
    Real,
    /// Single- or double-quoted string literal (text holds the unquoted form).
    Text,
    /// `true` or `false`, case-insensitive.
    Boolean,

    // ── Identifiers ───────────────────────────────────────────────────────────
    /// Identifier followed by `(` — promoted during lexing.
    Function,
    /// Any other identifier.
    Variable,

    // ── Operators ─────────────────────────────────────────────────────────────
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Ampersand,
    Bang,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    EqEq,
    BangEq,
    AndAnd,
    OrOr,
    Assign,

    // ── Punctuation ───────────────────────────────────────────────────────────
    Question,
    Colon,
    Semicolon,
    LParen,
    RParen,

    /// Unrecognised input character — surfaced as a parse diagnostic, never a
    /// lexer fault.
    Unknown,
    Eof,

    // ── Production tags (interior parse-tree nodes) ───────────────────────────
    Expression,
    Assignment,
    ConditionalOr,
    ConditionalAnd,
    Equality,
    Relational,
    Concat,
    Additive,
    Multiplicative,
    Power,
    Unary,
    Primary,
    Call,
    Params,
}

impl TokenType {
    /// Display name, used for node labels and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TokenType::Integer => "integer",
            TokenType::Real => "real",
            TokenType::Text => "text",
            TokenType::Boolean => "boolean",
            TokenType::Function => "function",
            TokenType::Variable => "variable",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Star => "*",
            TokenType::Slash => "/",
            TokenType::Percent => "%",
            TokenType::Caret => "^",
            TokenType::Ampersand => "&",
            TokenType::Bang => "!",
            TokenType::Less => "<",
            TokenType::LessEq => "<=",
            TokenType::Greater => ">",
            TokenType::GreaterEq => ">=",
            TokenType::EqEq => "==",
            TokenType::BangEq => "!=",
            TokenType::AndAnd => "&&",
            TokenType::OrOr => "||",
            TokenType::Assign => "=",
            TokenType::Question => "?",
            TokenType::Colon => ":",
            TokenType::Semicolon => ";",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::Unknown => "unknown",
            TokenType::Eof => "end of input",
            TokenType::Expression => "Expression",
            TokenType::Assignment => "Assignment",
            TokenType::ConditionalOr => "ConditionalOr",
            TokenType::ConditionalAnd => "ConditionalAnd",
            TokenType::Equality => "Equality",
            TokenType::Relational => "Relational",
            TokenType::Concat => "Concat",
            TokenType::Additive => "Additive",
            TokenType::Multiplicative => "Multiplicative",
            TokenType::Power => "Power",
            TokenType::Unary => "Unary",
            TokenType::Primary => "Primary",
            TokenType::Call => "Call",
            TokenType::Params => "Params",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One lexed token, or the synthesized token of a production node.
///
/// `position`/`length` are byte offsets into the source expression. For string
/// literals `text` holds the unquoted content while the span still covers the
/// quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub text: String,
    pub position: usize,
    pub length: usize,
}

impl Token {
    pub fn new(token_type: TokenType, text: impl Into<String>, position: usize, length: usize) -> Self {
        Token {
            token_type,
            text: text.into(),
            position,
            length,
        }
    }

    /// Zero-width synthesized token for a production node.
    pub fn production(token_type: TokenType, position: usize) -> Self {
        Token {
            token_type,
            text: String::new(),
            position,
            length: 0,
        }
    }

    /// Human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        if self.token_type == TokenType::Eof || self.text.is_empty() {
            self.token_type.name().to_string()
        } else {
            format!("'{}'", self.text)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_eof() {
        let t = Token::new(TokenType::Eof, "", 3, 0);
        assert_eq!(t.describe(), "end of input");
    }

    #[test]
    fn describe_operator() {
        let t = Token::new(TokenType::Plus, "+", 0, 1);
        assert_eq!(t.describe(), "'+'");
    }

    #[test]
    fn production_token_is_zero_width() {
        let t = Token::production(TokenType::Additive, 7);
        assert_eq!(t.position, 7);
        assert_eq!(t.length, 0);
        assert!(t.text.is_empty());
    }
}
