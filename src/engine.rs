use serde::Deserialize;
use tracing::{debug, trace};

use crate::cache::LookupCache;
use crate::context::ResolutionContext;
use crate::dispatch::{Dispatcher, ResolutionResult};
use crate::errors::{FilterError, Result};
use crate::parser;
use crate::registry::ContextRegistry;
use crate::tokenizer::{self, Grammar, RawMatch};

/// Engine-wide settings, fixed for the life of a [`TextFilter`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grammar: Grammar,
    /// Joins multi-valued fields such as role names.
    pub list_separator: String,
    /// Localization component strings are looked up under.
    pub component: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grammar: Grammar::Simple,
            list_separator: ", ".to_string(),
            component: "filter_tokens".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FilterError::Config(e.to_string()))
    }

    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }
}

/// Per-call knobs. The default is always valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterOptions {
    /// Use this grammar for one call instead of the configured one.
    pub grammar: Option<Grammar>,
}

/// One document-rendering session.
///
/// The lookup cache lives as long as the filter does, so repeated calls on the
/// same instance reuse values resolved earlier.
pub struct TextFilter<'a> {
    ctx: ResolutionContext<'a>,
    config: EngineConfig,
    registry: ContextRegistry,
    cache: LookupCache,
}

impl<'a> TextFilter<'a> {
    pub fn new(ctx: ResolutionContext<'a>, config: EngineConfig) -> Self {
        Self { ctx, config, registry: ContextRegistry::with_builtins(), cache: LookupCache::new() }
    }

    pub fn with_registry(mut self, registry: ContextRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Substitute every token in `text` in one left-to-right pass.
    ///
    /// Substituted values are never scanned again. Never fails: a token that
    /// can't be resolved stays as written or becomes an inline message,
    /// depending on the grammar.
    pub fn filter(&mut self, text: &str, options: &FilterOptions) -> String {
        let grammar = options.grammar.unwrap_or(self.config.grammar);
        let registry = &self.registry;
        let mut dispatcher = Dispatcher::new(&self.ctx, &mut self.cache, &self.config);

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut count = 0usize;
        for m in tokenizer::scan(grammar, text) {
            trace!(token = m.text, start = m.span.start, "matched");
            out.push_str(&text[last..m.span.start]);
            match resolve_match(&mut dispatcher, registry, grammar, &m) {
                ResolutionResult::Resolved(v) | ResolutionResult::ErrorPlaceholder(v) => out.push_str(&v),
                ResolutionResult::Unresolved => out.push_str(m.text),
            }
            last = m.span.end;
            count += 1;
        }
        out.push_str(&text[last..]);
        debug!(?grammar, tokens = count, "filtered");

        if out.is_empty() && !text.is_empty() {
            return text.to_string();
        }
        out
    }
}

fn resolve_match(
    dispatcher: &mut Dispatcher<'_, '_>,
    registry: &ContextRegistry,
    grammar: Grammar,
    m: &RawMatch<'_>,
) -> ResolutionResult {
    match (grammar, m.groups.as_slice()) {
        (Grammar::Simple, [body]) => match parser::parse_simple(m.text, body) {
            Ok(token) => dispatcher.resolve_simple(&token),
            Err(e) => {
                debug!(token = m.text, error = %e, "left as text");
                ResolutionResult::Unresolved
            }
        },
        (Grammar::Namespaced, [context, field]) => match parser::parse_namespaced(m.text, context, field) {
            Ok(token) => dispatcher.resolve_namespaced(&token, registry),
            Err(e) => dispatcher.error_placeholder(&FilterError::from(e)),
        },
        _ => ResolutionResult::Unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Viewer;
    use crate::memory::MemoryStore;
    use crate::store::Profile;
    use pretty_assertions::assert_eq;

    fn store() -> MemoryStore {
        MemoryStore::new().with_profile(Profile {
            id: 2,
            email: "a@b.com".into(),
            phone1: String::new(),
            ..Default::default()
        })
    }

    #[test]
    fn config_defaults_and_json() {
        let cfg = EngineConfig::from_json(r#"{"grammar": "namespaced"}"#).unwrap();
        assert_eq!(cfg.grammar, Grammar::Namespaced);
        assert_eq!(cfg.list_separator, ", ");
        assert!(EngineConfig::from_json(r#"{"grammar": "jinja"}"#).is_err());
    }

    #[test]
    fn substitutes_around_plain_text() {
        let store = store();
        let ctx = ResolutionContext::new(Viewer::Authenticated(2), None, &store);
        let mut f = TextFilter::new(ctx, EngineConfig::default());
        assert_eq!(f.filter("mail: {USER_EMAIL}!", &FilterOptions::default()), "mail: a@b.com!");
    }

    #[test]
    fn empty_output_returns_input() {
        let store = store();
        let ctx = ResolutionContext::new(Viewer::Authenticated(2), None, &store);
        let mut f = TextFilter::new(ctx, EngineConfig::default());
        assert_eq!(f.filter("{USER_PHONE1}", &FilterOptions::default()), "{USER_PHONE1}");
        assert_eq!(f.filter("x{USER_PHONE1}", &FilterOptions::default()), "x");
        assert_eq!(f.filter("", &FilterOptions::default()), "");
    }

    #[test]
    fn options_override_grammar_per_call() {
        let store = store().with_metadata(2, crate::store::ContextLevel::User, "team", "Blue");
        let ctx = ResolutionContext::new(Viewer::Authenticated(2), None, &store);
        let mut f = TextFilter::new(ctx, EngineConfig::default());
        let text = "{USER_EMAIL} {{metadata::user::team}}";
        assert_eq!(f.filter(text, &FilterOptions::default()), "a@b.com {{metadata::user::team}}");
        let opts = FilterOptions { grammar: Some(Grammar::Namespaced) };
        assert_eq!(f.filter(text, &opts), "{USER_EMAIL} Blue");
    }
}
