use serde::{Deserialize, Serialize};

use crate::{Event, TAG_EVENT, TAG_PUBKEY};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Relay query object. Empty lists and absent bounds do not constrain the match.
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(rename = "#e", default, skip_serializing_if = "Vec::is_empty")]
    pub event_refs: Vec<String>,
    #[serde(rename = "#p", default, skip_serializing_if = "Vec::is_empty")]
    pub pubkey_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn kind(mut self, kind: u32) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn pubkey_ref(mut self, pubkey: impl Into<String>) -> Self {
        self.pubkey_refs.push(pubkey.into());
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !self.ids.is_empty() && !self.ids.iter().any(|id| id == &event.id) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.iter().any(|author| author == &event.pubkey)
        {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.event_refs.is_empty()
            && !event
                .tag_values(TAG_EVENT)
                .any(|value| self.event_refs.iter().any(|wanted| wanted == value))
        {
            return false;
        }
        if !self.pubkey_refs.is_empty()
            && !event
                .tag_values(TAG_PUBKEY)
                .any(|value| self.pubkey_refs.iter().any(|wanted| wanted == value))
        {
            return false;
        }
        if matches!(self.since, Some(since) if event.created_at < since) {
            return false;
        }
        if matches!(self.until, Some(until) if event.created_at > until) {
            return false;
        }
        true
    }
}
