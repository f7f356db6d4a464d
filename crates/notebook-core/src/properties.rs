use crate::model::PathName;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_TEMPLATE: &str = "Default";

/// Properties set per namespace, looked up from the most specific
/// namespace outward: the page itself, its ancestors, the root and
/// finally the defaults.
#[derive(Debug, Clone)]
pub struct NamespaceProperties {
    scopes: BTreeMap<PathName, Map<String, Value>>,
    defaults: Map<String, Value>,
}

impl Default for NamespaceProperties {
    fn default() -> Self {
        let mut defaults = Map::new();
        defaults.insert("template".to_string(), Value::from(DEFAULT_TEMPLATE));
        Self {
            scopes: BTreeMap::new(),
            defaults,
        }
    }
}

impl NamespaceProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, namespace: &PathName, key: &str, value: Value) {
        self.scopes
            .entry(namespace.clone())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn remove(&mut self, namespace: &PathName, key: &str) -> Option<Value> {
        let scope = self.scopes.get_mut(namespace)?;
        let removed = scope.remove(key);
        if scope.is_empty() {
            self.scopes.remove(namespace);
        }
        removed
    }

    pub fn get(&self, path: &PathName, key: &str) -> Option<&Value> {
        std::iter::once(path.clone())
            .chain(path.ancestors())
            .find_map(|scope| self.scopes.get(&scope).and_then(|props| props.get(key)))
            .or_else(|| self.defaults.get(key))
    }

    /// Template name for new pages at `path`.
    pub fn template_for(&self, path: &PathName) -> String {
        self.get(path, "template")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TEMPLATE)
            .to_string()
    }
}

/// Template picked for a new page, with the values it gets to fill in.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTemplate {
    pub name: String,
    pub context: Value,
}

impl PageTemplate {
    pub fn new(name: &str, path: &PathName) -> Self {
        Self {
            name: name.to_string(),
            context: json!({
                "page": {
                    "name": path.name(),
                    "basename": path.basename(),
                    "section": path.namespace(),
                    "namespace": path.namespace(),
                }
            }),
        }
    }
}
