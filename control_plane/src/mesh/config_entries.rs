use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigEntryKey {
    pub kind: String,
    pub name: String,
}

impl ConfigEntryKey {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// An ordered multiset of mesh config entries keyed by (kind, name).
/// `difference` drives the Sync engine's delete-diff: entries present in
/// `self` but absent from `other`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigEntryIndex<T: Clone + PartialEq> {
    entries: BTreeMap<ConfigEntryKey, T>,
}

impl<T: Clone + PartialEq> Default for ConfigEntryIndex<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> ConfigEntryIndex<T> {
    pub fn add(&mut self, key: ConfigEntryKey, value: T) {
        self.entries.insert(key, value);
    }

    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    pub fn to_array(&self) -> Vec<(ConfigEntryKey, T)> {
        self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn difference(&self, other: &Self) -> Vec<(ConfigEntryKey, T)> {
        self.entries
            .iter()
            .filter(|(k, _)| !other.entries.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    pub external_source: String,
    pub gateway_name: String,
    pub gateway_namespace: String,
    pub route_name: Option<String>,
    pub route_namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterMatch {
    pub path_prefix: Option<String>,
    pub headers: Vec<(String, String)>,
    pub methods: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterDestination {
    pub service: String,
    pub prefix_rewrite: Option<String>,
    pub request_headers_add: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRouterRoute {
    pub r#match: Option<RouterMatch>,
    pub destination: RouterDestination,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRouterEntry {
    pub name: String,
    pub routes: Vec<ServiceRouterRoute>,
    pub meta: EntryMeta,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitterSplit {
    pub weight: f32,
    pub service: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSplitterEntry {
    pub name: String,
    pub splits: Vec<SplitterSplit>,
    pub meta: EntryMeta,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefaultsEntry {
    pub name: String,
    pub protocol: String,
    pub meta: EntryMeta,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressListenerService {
    pub name: String,
    pub hosts: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressListenerEntry {
    pub port: u16,
    pub protocol: String,
    pub services: Vec<IngressListenerService>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressGatewayConfigEntry {
    pub name: String,
    pub listeners: Vec<IngressListenerEntry>,
    pub meta: EntryMeta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentionAction {
    Allow,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentionSource {
    pub name: String,
    pub namespace: String,
    pub action: IntentionAction,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIntentionsEntry {
    pub name: String,
    pub sources: Vec<IntentionSource>,
    pub modify_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_keys_entries_not_present_in_other() {
        let mut applied = ConfigEntryIndex::default();
        applied.add(ConfigEntryKey::new("service-router", "a"), 1);
        applied.add(ConfigEntryKey::new("service-router", "b"), 2);

        let mut computed = ConfigEntryIndex::default();
        computed.add(ConfigEntryKey::new("service-router", "a"), 1);

        let removed = applied.difference(&computed);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, ConfigEntryKey::new("service-router", "b"));
    }

    #[test]
    fn to_array_is_stably_ordered() {
        let mut index = ConfigEntryIndex::default();
        index.add(ConfigEntryKey::new("service-router", "z"), 1);
        index.add(ConfigEntryKey::new("service-router", "a"), 2);
        let array = index.to_array();
        assert_eq!(array[0].0.name, "a");
        assert_eq!(array[1].0.name, "z");
    }
}
