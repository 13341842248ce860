//! Per-evaluation environment.
//!
//! A [`Context`] bundles everything one evaluation may touch: the assignable
//! globals map (the only thing variable tokens read and write), named
//! key/value stores, named documents, an optional host callback for
//! host-resolved fields, an optional URL fetcher for the two catalog HTTP
//! functions, and a scratch map the host can use freely. A Context lives for
//! one evaluation; hosts that share a store or document across evaluations
//! synchronize it themselves.

use std::collections::HashMap;
use std::sync::Arc;

use crate::value::Value;

/// How a host callback is being consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    Get,
    Set,
    Map,
}

/// Host capability for resolving bracketed fields (`[name]`).
///
/// Reads use [`CallbackMode::Get`]; field writes forward [`CallbackMode::Set`]
/// with the value present. `Map` is plumbed through for hosts but not issued
/// by the engine. An `Err` from the host is absorbed at the addressing
/// boundary and degrades to empty text.
pub trait FieldCallback {
    fn resolve(
        &mut self,
        prefix: &str,
        field: &str,
        value: Option<&str>,
        mode: CallbackMode,
    ) -> Result<Option<String>, String>;
}

/// A named flat key→text registry, external to the engine.
pub trait Store {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// A named handle to one piece of external text content.
pub trait Document {
    fn value(&self) -> String;
    fn set_value(&mut self, value: &str);
}

/// Blocking URL fetch delegate used by `httpGet`/`httpPost`:
/// `(url, post body or None) -> body text`.
pub type UrlFetcher = Arc<dyn Fn(&str, Option<&str>) -> Result<String, String> + Send + Sync>;

// ── In-memory collaborators ───────────────────────────────────────────────────

/// Plain in-memory [`Store`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_owned(), value.to_owned());
    }
}

/// Plain in-memory [`Document`].
#[derive(Debug, Clone, Default)]
pub struct TextDocument {
    content: String,
}

impl TextDocument {
    pub fn new(content: impl Into<String>) -> Self {
        TextDocument {
            content: content.into(),
        }
    }
}

impl Document for TextDocument {
    fn value(&self) -> String {
        self.content.clone()
    }

    fn set_value(&mut self, value: &str) {
        self.content = value.to_owned();
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

pub struct Context {
    globals: HashMap<String, Value>,
    stores: HashMap<String, Box<dyn Store>>,
    documents: HashMap<String, Box<dyn Document>>,
    callback: Option<Box<dyn FieldCallback>>,
    fetcher: Option<UrlFetcher>,
    default_store: String,
    /// Free-form host scratch space; the engine never touches it.
    pub scratch: HashMap<String, String>,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            globals: HashMap::new(),
            stores: HashMap::new(),
            documents: HashMap::new(),
            callback: None,
            fetcher: None,
            default_store: "default".to_owned(),
            scratch: HashMap::new(),
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Globals ───────────────────────────────────────────────────────────────

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.globals
    }

    // ── Stores ────────────────────────────────────────────────────────────────

    pub fn add_store(&mut self, name: &str, store: impl Store + 'static) {
        self.add_store_boxed(name, Box::new(store));
    }

    pub fn add_store_boxed(&mut self, name: &str, store: Box<dyn Store>) {
        self.stores.insert(sanitize_name(name), store);
    }

    pub fn store(&self, name: &str) -> Option<&dyn Store> {
        self.stores.get(&sanitize_name(name)).map(|b| &**b)
    }

    pub fn store_mut(&mut self, name: &str) -> Option<&mut dyn Store> {
        self.stores.get_mut(&sanitize_name(name)).map(|b| &mut **b)
    }

    /// Store consulted when a field reference names no prefix.
    pub fn default_store(&self) -> &str {
        &self.default_store
    }

    pub fn set_default_store(&mut self, name: &str) {
        self.default_store = sanitize_name(name);
    }

    // ── Documents ─────────────────────────────────────────────────────────────

    pub fn add_document(&mut self, name: &str, document: impl Document + 'static) {
        self.documents.insert(sanitize_name(name), Box::new(document));
    }

    pub fn document(&self, name: &str) -> Option<&dyn Document> {
        self.documents.get(&sanitize_name(name)).map(|b| &**b)
    }

    pub fn document_mut(&mut self, name: &str) -> Option<&mut dyn Document> {
        self.documents
            .get_mut(&sanitize_name(name))
            .map(|b| &mut **b)
    }

    // ── Callback & fetcher ────────────────────────────────────────────────────

    pub fn set_callback(&mut self, callback: impl FieldCallback + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn set_callback_boxed(&mut self, callback: Box<dyn FieldCallback>) {
        self.callback = Some(callback);
    }

    pub fn callback_mut(&mut self) -> Option<&mut dyn FieldCallback> {
        self.callback.as_deref_mut()
    }

    pub fn set_fetcher(&mut self, fetcher: UrlFetcher) {
        self.fetcher = Some(fetcher);
    }

    pub fn fetcher(&self) -> Option<&UrlFetcher> {
        self.fetcher.as_ref()
    }
}

/// Fold a store or document name to its canonical lookup form: alphanumeric
/// characters only, lower-cased. Store keys are never sanitized, names are.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
