use std::collections::HashMap;

use url::Url;

use super::model::SubQueryState;
use crate::provider::Source;

/// Canonical form used for deduplication: lowercase scheme and host, no
/// default port, no fragment, no trailing slash. Unparseable links are only
/// trimmed.
pub fn normalize_link(link: &str) -> String {
    let link = link.trim();
    let Ok(mut url) = Url::parse(link) else {
        return link.to_string();
    };
    url.set_fragment(None);
    let mut normalized = url.to_string();
    if url.query().is_none() {
        while normalized.ends_with('/') {
            normalized.pop();
        }
    }
    normalized
}

/// Deduplicated, numbered sources backing the collected evidence.
#[derive(Debug, Default)]
pub struct SourceList {
    sources: Vec<Source>,
    index: HashMap<String, usize>,
}

impl SourceList {
    /// Walks evidence in sub-query order; the first occurrence of a link wins.
    pub fn from_states(states: &[SubQueryState]) -> Self {
        let mut list = Self::default();
        for state in states {
            for evidence in state.evidence() {
                list.insert(&evidence.result.source);
            }
        }
        list
    }

    fn insert(&mut self, source: &Source) {
        if source.link.trim().is_empty() {
            return;
        }
        let key = normalize_link(&source.link);
        if self.index.contains_key(&key) {
            return;
        }
        self.sources.push(source.clone());
        self.index.insert(key, self.sources.len());
    }

    /// 1-based citation number for `link`.
    pub fn number_of(&self, link: &str) -> Option<usize> {
        self.index.get(&normalize_link(link)).copied()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn as_slice(&self) -> &[Source] {
        &self.sources
    }

    pub fn into_vec(self) -> Vec<Source> {
        self.sources
    }
}
