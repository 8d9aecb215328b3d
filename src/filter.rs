//! Event filters
//!
//! A filter may veto delivery of an event. Filters are built from the
//! `filters` config section through a [`FilterRegistry`] keyed by the entry's
//! `type` tag, and evaluated in order by a [`FilterChain`].

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::FilterConfig;
use crate::error::{Error, Result};
use crate::event::RunEvent;

/// A predicate that may veto an event
pub trait Filter: Send + Sync + fmt::Debug {
    /// Return the event to keep it, `None` to drop it
    fn filter<'a>(&self, event: &'a RunEvent) -> Option<&'a RunEvent>;
}

/// Drops events whose job name equals `match`
#[derive(Debug, Clone)]
pub struct ExactMatchFilter {
    name: String,
}

impl ExactMatchFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Filter for ExactMatchFilter {
    fn filter<'a>(&self, event: &'a RunEvent) -> Option<&'a RunEvent> {
        if event.job.name == self.name { None } else { Some(event) }
    }
}

/// Drops events whose job name starts with a match of `regex`
#[derive(Debug, Clone)]
pub struct RegexFilter {
    pattern: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        // Anchor at the start only; the pattern may match a prefix of the name
        let pattern = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| Error::InvalidFilter {
            kind: "regex".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern })
    }
}

impl Filter for RegexFilter {
    fn filter<'a>(&self, event: &'a RunEvent) -> Option<&'a RunEvent> {
        if self.pattern.is_match(&event.job.name) { None } else { Some(event) }
    }
}

/// Builds a filter from its config entry
pub type FilterBuilder = fn(&FilterConfig) -> Result<Arc<dyn Filter>>;

/// Maps filter type tags to builders
#[derive(Clone)]
pub struct FilterRegistry {
    builders: HashMap<String, FilterBuilder>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("FilterRegistry").field("kinds", &kinds).finish()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("exact", build_exact);
        registry.register("regex", build_regex);
        registry
    }
}

impl FilterRegistry {
    /// A registry with no filter types
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: &str, builder: FilterBuilder) {
        self.builders.insert(kind.to_string(), builder);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// Build a filter from one config entry.
    ///
    /// Entries without a `type`, with an unregistered `type`, or that fail to
    /// build are skipped (`None`), so a bad entry never blocks emission.
    pub fn create(&self, config: &FilterConfig) -> Option<Arc<dyn Filter>> {
        let kind = config.kind.as_deref()?;

        let Some(builder) = self.builders.get(kind) else {
            log::warn!("Skipping filter with unknown type '{}'", kind);
            return None;
        };

        match builder(config) {
            Ok(filter) => Some(filter),
            Err(e) => {
                log::warn!("Skipping filter: {}", e);
                None
            }
        }
    }

    /// Build a chain from config entries, keeping only the entries that built
    pub fn build_chain(&self, configs: &[FilterConfig]) -> FilterChain {
        FilterChain::new(configs.iter().filter_map(|c| self.create(c)).collect())
    }
}

fn build_exact(config: &FilterConfig) -> Result<Arc<dyn Filter>> {
    let name = config.match_.as_deref().ok_or_else(|| Error::InvalidFilter {
        kind: "exact".to_string(),
        reason: "missing 'match'".to_string(),
    })?;
    Ok(Arc::new(ExactMatchFilter::new(name)))
}

fn build_regex(config: &FilterConfig) -> Result<Arc<dyn Filter>> {
    let pattern = config.regex.as_deref().ok_or_else(|| Error::InvalidFilter {
        kind: "regex".to_string(),
        reason: "missing 'regex'".to_string(),
    })?;
    Ok(Arc::new(RegexFilter::new(pattern)?))
}

/// Build a filter with the built-in filter types
pub fn create_filter(config: &FilterConfig) -> Option<Arc<dyn Filter>> {
    FilterRegistry::default().create(config)
}

/// Ordered, immutable list of filters with short-circuit veto
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    /// Return the event if no filter vetoes it
    pub fn apply<'a>(&self, event: &'a RunEvent) -> Option<&'a RunEvent> {
        self.filters.iter().try_fold(event, |event, filter| filter.filter(event))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Job, Run, RunState};

    fn event(name: &str) -> RunEvent {
        RunEvent::new(
            RunState::Start,
            "2021-11-03T10:53:52.427343",
            Run::new("69f4acab-b87d-4fc0-b27b-8ea950370ff3"),
            Job::new("", name),
            "",
        )
    }

    #[test]
    fn test_exact_filter() {
        let filter = ExactMatchFilter::new("job");
        assert!(filter.filter(&event("job")).is_none());
        for name in ["wrong", "job1", "1job", ""] {
            assert!(filter.filter(&event(name)).is_some(), "{name} should pass");
        }
    }

    #[test]
    fn test_regex_filter_matches_prefix() {
        let filter = RegexFilter::new("whatever.*").unwrap();
        assert!(filter.filter(&event("whatever")).is_none());
        assert!(filter.filter(&event("whatever_asdf")).is_none());
        for name in ["something_whatever_asdf", "asdf", ""] {
            assert!(filter.filter(&event(name)).is_some(), "{name} should pass");
        }
    }

    #[test]
    fn test_regex_filter_alternation_stays_anchored() {
        let filter = RegexFilter::new("a|b").unwrap();
        assert!(filter.filter(&event("bxx")).is_none());
        assert!(filter.filter(&event("xxb")).is_some());
    }

    #[test]
    fn test_create_filter_dispatch() {
        assert!(create_filter(&FilterConfig::default()).is_none());
        assert!(create_filter(&FilterConfig::exact("job")).is_some());
        assert!(create_filter(&FilterConfig::regex("job.*")).is_some());

        let unknown = FilterConfig {
            kind: Some("glob".to_string()),
            match_: Some("job*".to_string()),
            regex: None,
        };
        assert!(create_filter(&unknown).is_none());
    }

    #[test]
    fn test_create_filter_skips_incomplete_entries() {
        let missing_match = FilterConfig {
            kind: Some("exact".to_string()),
            ..Default::default()
        };
        assert!(create_filter(&missing_match).is_none());
        assert!(create_filter(&FilterConfig::regex("(unclosed")).is_none());
    }

    #[test]
    fn test_chain_short_circuits_in_order() {
        let registry = FilterRegistry::default();
        let chain = registry.build_chain(&[
            FilterConfig::exact("job"),
            FilterConfig::default(),
            FilterConfig::regex("tmp_"),
        ]);
        assert_eq!(chain.len(), 2);
        assert!(chain.apply(&event("job")).is_none());
        assert!(chain.apply(&event("tmp_table")).is_none());
        assert!(chain.apply(&event("daily")).is_some());
    }

    #[test]
    fn test_empty_chain_delivers() {
        let chain = FilterChain::default();
        assert!(chain.is_empty());
        assert!(chain.apply(&event("anything")).is_some());
    }

    #[derive(Debug)]
    struct NamespaceFilter;

    impl Filter for NamespaceFilter {
        fn filter<'a>(&self, event: &'a RunEvent) -> Option<&'a RunEvent> {
            if event.job.namespace.is_empty() { None } else { Some(event) }
        }
    }

    fn build_namespace(_: &FilterConfig) -> Result<Arc<dyn Filter>> {
        Ok(Arc::new(NamespaceFilter))
    }

    #[test]
    fn test_registry_accepts_custom_filters() {
        let mut registry = FilterRegistry::default();
        registry.register("empty-namespace", build_namespace);
        assert!(registry.kinds().any(|k| k == "empty-namespace"));

        let config = FilterConfig {
            kind: Some("empty-namespace".to_string()),
            ..Default::default()
        };
        let filter = registry.create(&config).unwrap();
        assert!(filter.filter(&event("job")).is_none());
    }
}
