//! Field-reference classification and resolution.
//!
//! Outside the expression grammar proper, hosts address values through a
//! small field micro-syntax — when splitting raw field text on whitespace or
//! when a host callback hands back a reference. One raw string classifies
//! into exactly one of five kinds, checked in order:
//!
//! | Form                        | Kind       | Meaning                                  |
//! |-----------------------------|------------|------------------------------------------|
//! | `[*name]` / `[*pfx:name]`   | Store      | key lookup, prefix picks the store       |
//! | `[$name]` / `[$pfx:name]`   | Document   | document content                         |
//! | `[name]`                    | Data       | delegated to the host callback           |
//! | `#name#`                    | (one hop)  | the global's value is itself a reference |
//! | `"quoted"` / `'quoted'`     | Value      | literal, quotes stripped                 |
//! | anything else               | Expression | plain global variable                    |
//!
//! Indirection expands exactly once: the value found behind `#name#` is
//! classified with indirection disabled. Every kind reads and writes
//! symmetrically, and every failure at this layer is silent — a missing
//! store, document, callback or global reads as empty text and writes as a
//! no-op, which keeps templating hosts forgiving.

use crate::context::{sanitize_name, CallbackMode, Context};
use crate::value::Value;

/// Classification of one raw field reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatumKind {
    /// Quoted literal.
    Value,
    /// Host-callback-resolved field.
    Data,
    /// Keyed store lookup.
    Store,
    /// Document content.
    Document,
    /// Plain global variable.
    Expression,
}

/// A resolved read/write reference produced by [`Datum::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datum {
    kind: DatumKind,
    prefix: String,
    name: String,
}

impl Datum {
    /// Classify a raw field string. Needs the context only to follow a
    /// `#name#` indirection through the globals.
    pub fn classify(raw: &str, ctx: &Context) -> Datum {
        Self::classify_inner(raw.trim(), ctx, true)
    }

    fn classify_inner(raw: &str, ctx: &Context, follow_indirect: bool) -> Datum {
        if let Some(inner) = strip_brackets(raw, "[*") {
            let (prefix, name) = split_prefix(inner);
            return Datum {
                kind: DatumKind::Store,
                prefix: if prefix.is_empty() {
                    ctx.default_store().to_owned()
                } else {
                    sanitize_name(prefix)
                },
                name: name.to_owned(),
            };
        }
        if let Some(inner) = strip_brackets(raw, "[$") {
            let (prefix, name) = split_prefix(inner);
            return Datum {
                kind: DatumKind::Document,
                prefix: sanitize_name(prefix),
                name: sanitize_name(name),
            };
        }
        if let Some(inner) = strip_brackets(raw, "[") {
            let (prefix, name) = split_prefix(inner);
            return Datum {
                kind: DatumKind::Data,
                prefix: prefix.to_owned(),
                name: name.to_owned(),
            };
        }
        if follow_indirect && raw.len() >= 3 && raw.starts_with('#') && raw.ends_with('#') {
            let var = &raw[1..raw.len() - 1];
            let target = ctx.global(var).map(Value::to_text).unwrap_or_default();
            return Self::classify_inner(target.trim(), ctx, false);
        }
        if let Some(inner) = strip_quotes(raw) {
            return Datum {
                kind: DatumKind::Value,
                prefix: String::new(),
                name: inner.to_owned(),
            };
        }
        Datum {
            kind: DatumKind::Expression,
            prefix: String::new(),
            name: raw.to_owned(),
        }
    }

    pub fn kind(&self) -> DatumKind {
        self.kind
    }

    /// Effective document lookup name: sanitized prefix and name folded
    /// together.
    fn document_name(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }

    /// Read the referenced value as text. Missing collaborators read as
    /// empty text.
    pub fn read(&self, ctx: &mut Context) -> String {
        match self.kind {
            DatumKind::Value => self.name.clone(),
            DatumKind::Expression => ctx
                .global(&self.name)
                .map(Value::to_text)
                .unwrap_or_default(),
            DatumKind::Store => ctx
                .store(&self.prefix)
                .and_then(|s| s.get(&self.name))
                .unwrap_or_default(),
            DatumKind::Document => {
                let doc = self.document_name();
                ctx.document(&doc).map(|d| d.value()).unwrap_or_default()
            }
            DatumKind::Data => match ctx.callback_mut() {
                Some(cb) => cb
                    .resolve(&self.prefix, &self.name, None, CallbackMode::Get)
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
                None => String::new(),
            },
        }
    }

    /// Write text through the reference. Literals and missing collaborators
    /// are a no-op.
    pub fn write(&self, ctx: &mut Context, value: &str) {
        match self.kind {
            DatumKind::Value => {}
            DatumKind::Expression => ctx.set_global(self.name.clone(), Value::Text(value.to_owned())),
            DatumKind::Store => {
                if let Some(store) = ctx.store_mut(&self.prefix) {
                    store.set(&self.name, value);
                }
            }
            DatumKind::Document => {
                let doc = self.document_name();
                if let Some(document) = ctx.document_mut(&doc) {
                    document.set_value(value);
                }
            }
            DatumKind::Data => {
                if let Some(cb) = ctx.callback_mut() {
                    let _ = cb.resolve(&self.prefix, &self.name, Some(value), CallbackMode::Set);
                }
            }
        }
    }
}

/// Resolve one raw field reference to text.
pub fn resolve(ctx: &mut Context, raw: &str) -> String {
    Datum::classify(raw, ctx).read(ctx)
}

/// Write text through one raw field reference.
pub fn assign(ctx: &mut Context, raw: &str, value: &str) {
    Datum::classify(raw, ctx).write(ctx, value);
}

/// Split raw text on whitespace and resolve every field in it.
pub fn resolve_fields(ctx: &mut Context, text: &str) -> Vec<String> {
    let fields: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
    fields.iter().map(|f| resolve(ctx, f)).collect()
}

fn strip_brackets<'a>(raw: &'a str, open: &str) -> Option<&'a str> {
    let inner = raw.strip_prefix(open)?;
    Some(inner.strip_suffix(']').unwrap_or(inner))
}

fn strip_quotes(raw: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Some(&raw[1..raw.len() - 1]);
        }
    }
    None
}

fn split_prefix(inner: &str) -> (&str, &str) {
    match inner.split_once(':') {
        Some((prefix, name)) => (prefix, name),
        None => ("", inner),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MemoryStore, TextDocument};

    fn ctx_with_store() -> Context {
        let mut ctx = Context::new();
        ctx.add_store("s", MemoryStore::new().with("k", "v"));
        ctx
    }

    #[test]
    fn classify_kinds() {
        let ctx = Context::new();
        assert_eq!(Datum::classify("[*s:k]", &ctx).kind(), DatumKind::Store);
        assert_eq!(Datum::classify("[$doc]", &ctx).kind(), DatumKind::Document);
        assert_eq!(Datum::classify("[field]", &ctx).kind(), DatumKind::Data);
        assert_eq!(Datum::classify("\"lit\"", &ctx).kind(), DatumKind::Value);
        assert_eq!(Datum::classify("plain", &ctx).kind(), DatumKind::Expression);
    }

    #[test]
    fn store_read() {
        let mut ctx = ctx_with_store();
        assert_eq!(resolve(&mut ctx, "[*s:k]"), "v");
        assert_eq!(resolve(&mut ctx, "[*s:missing]"), "");
        assert_eq!(resolve(&mut ctx, "[*nostore:k]"), "");
    }

    #[test]
    fn store_prefix_defaults_to_context_default() {
        let mut ctx = Context::new();
        ctx.set_default_store("fields");
        ctx.add_store("fields", MemoryStore::new().with("name", "Ada"));
        assert_eq!(resolve(&mut ctx, "[*name]"), "Ada");
    }

    #[test]
    fn store_write() {
        let mut ctx = ctx_with_store();
        assign(&mut ctx, "[*s:k2]", "w");
        assert_eq!(resolve(&mut ctx, "[*s:k2]"), "w");
        // Writing into a missing store is a silent no-op.
        assign(&mut ctx, "[*gone:k]", "w");
    }

    #[test]
    fn document_read_write() {
        let mut ctx = Context::new();
        ctx.add_document("body", TextDocument::new("hello"));
        assert_eq!(resolve(&mut ctx, "[$body]"), "hello");
        assign(&mut ctx, "[$body]", "bye");
        assert_eq!(resolve(&mut ctx, "[$body]"), "bye");
        assert_eq!(resolve(&mut ctx, "[$missing]"), "");
    }

    #[test]
    fn document_prefix_folds_into_name() {
        let mut ctx = Context::new();
        ctx.add_document("mailbody", TextDocument::new("hi"));
        assert_eq!(resolve(&mut ctx, "[$Mail:Body]"), "hi");
    }

    #[test]
    fn global_read_write() {
        let mut ctx = Context::new();
        assign(&mut ctx, "name", "Ada");
        assert_eq!(resolve(&mut ctx, "name"), "Ada");
        assert_eq!(resolve(&mut ctx, "other"), "");
    }

    #[test]
    fn quoted_literal() {
        let mut ctx = Context::new();
        assert_eq!(resolve(&mut ctx, "\"some text\""), "some text");
        // Writing through a literal changes nothing.
        assign(&mut ctx, "\"some text\"", "x");
        assert_eq!(resolve(&mut ctx, "\"some text\""), "some text");
    }

    #[test]
    fn indirection_single_hop() {
        let mut ctx = ctx_with_store();
        ctx.set_global("ptr", Value::Text("[*s:k]".into()));
        assert_eq!(resolve(&mut ctx, "#ptr#"), "v");
    }

    #[test]
    fn indirection_does_not_recurse() {
        let mut ctx = ctx_with_store();
        ctx.set_global("a", Value::Text("#b#".into()));
        ctx.set_global("b", Value::Text("[*s:k]".into()));
        // One hop only: the value behind `a` is treated as a plain field
        // reference, not chased through `b`.
        assert_eq!(resolve(&mut ctx, "#a#"), "");
    }

    #[test]
    fn indirection_through_missing_global() {
        let mut ctx = Context::new();
        assert_eq!(resolve(&mut ctx, "#nothing#"), "");
    }

    #[test]
    fn callback_get_and_absence() {
        struct Cb;
        impl crate::context::FieldCallback for Cb {
            fn resolve(
                &mut self,
                prefix: &str,
                field: &str,
                _value: Option<&str>,
                mode: CallbackMode,
            ) -> Result<Option<String>, String> {
                assert_eq!(mode, CallbackMode::Get);
                Ok(Some(format!("{prefix}/{field}")))
            }
        }
        let mut ctx = Context::new();
        assert_eq!(resolve(&mut ctx, "[user]"), "");
        ctx.set_callback(Cb);
        assert_eq!(resolve(&mut ctx, "[user]"), "/user");
        assert_eq!(resolve(&mut ctx, "[crm:user]"), "crm/user");
    }

    #[test]
    fn callback_failure_is_absorbed() {
        struct Failing;
        impl crate::context::FieldCallback for Failing {
            fn resolve(
                &mut self,
                _prefix: &str,
                _field: &str,
                _value: Option<&str>,
                _mode: CallbackMode,
            ) -> Result<Option<String>, String> {
                Err("host exploded".into())
            }
        }
        let mut ctx = Context::new();
        ctx.set_callback(Failing);
        assert_eq!(resolve(&mut ctx, "[user]"), "");
    }

    #[test]
    fn resolve_fields_splits_on_whitespace() {
        let mut ctx = ctx_with_store();
        ctx.set_global("name", Value::Text("Ada".into()));
        let out = resolve_fields(&mut ctx, "name [*s:k] \"lit\"");
        assert_eq!(out, vec!["Ada", "v", "lit"]);
    }
}
