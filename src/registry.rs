use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Anything usable as a registry discriminant.
pub trait RegistryKey: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> RegistryKey for T where T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{}

/// A rendered piece of UI: a heading plus body lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<String>,
}

impl Fragment {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            icon: None,
            lines: Vec::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.icon {
            Some(icon) => writeln!(f, "[{icon}] {}", self.title)?,
            None => writeln!(f, "{}", self.title)?,
        }
        for line in &self.lines {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

pub type Renderer<P> = Arc<dyn Fn(&P) -> Fragment + Send + Sync>;

#[derive(Clone)]
pub enum Label {
    Text(String),
    Computed(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Label {
    pub fn resolve(&self) -> String {
        match self {
            Label::Text(text) => text.clone(),
            Label::Computed(compute) => compute(),
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Label::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Text(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Label::Text(value)
    }
}

/// Handler bundle registered for one key. `P` is the props contract the
/// renderer receives for that registry.
pub struct Handler<P> {
    pub icon: String,
    pub label: Label,
    pub category: Option<String>,
    pub permission_labels: BTreeMap<String, String>,
    pub metadata: Map<String, Value>,
    renderer: Renderer<P>,
}

impl<P> Handler<P> {
    pub fn new<F>(icon: impl Into<String>, label: impl Into<Label>, renderer: F) -> Self
    where
        F: Fn(&P) -> Fragment + Send + Sync + 'static,
    {
        Self {
            icon: icon.into(),
            label: label.into(),
            category: None,
            permission_labels: BTreeMap::new(),
            metadata: Map::new(),
            renderer: Arc::new(renderer),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_permission_label(
        mut self,
        permission: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.permission_labels
            .insert(permission.into(), label.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn label_text(&self) -> String {
        self.label.resolve()
    }

    pub fn render(&self, props: &P) -> Fragment {
        (self.renderer)(props)
    }
}

impl<P> fmt::Debug for Handler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("icon", &self.icon)
            .field("label", &self.label)
            .field("category", &self.category)
            .field("permission_labels", &self.permission_labels)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGroup<K> {
    pub category: Option<String>,
    pub keys: Vec<K>,
}

/// Maps keys to handlers. Registration never fails and the last
/// registration for a key wins.
pub struct ExtensionRegistry<K, P> {
    name: &'static str,
    handlers: HashMap<K, Arc<Handler<P>>>,
    order: Vec<K>,
}

impl<K: RegistryKey, P> ExtensionRegistry<K, P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn register(&mut self, key: K, handler: Handler<P>) {
        if self
            .handlers
            .insert(key.clone(), Arc::new(handler))
            .is_some()
        {
            debug!(registry = self.name, key = %key, "Overwriting registered handler");
        } else {
            self.order.push(key);
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<Handler<P>>> {
        self.handlers.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered keys in first-registration order.
    pub fn keys(&self) -> Vec<K> {
        self.order.clone()
    }

    pub fn render(&self, key: &K, props: &P) -> Option<Fragment> {
        self.handlers.get(key).map(|handler| handler.render(props))
    }

    pub fn render_or_fallback(&self, key: &K, props: &P) -> Fragment {
        self.render(key, props).unwrap_or_else(|| {
            Fragment::new(format!("{key}")).line(format!("No {} handler registered", self.name))
        })
    }

    /// Groups `keys` by handler category. Categories appear in order of
    /// first occurrence; uncategorised or unregistered keys each form a
    /// group of their own at their position.
    pub fn groups(&self, keys: &[K]) -> Vec<KeyGroup<K>> {
        let mut groups: Vec<KeyGroup<K>> = Vec::new();
        for key in keys {
            let category = self
                .handlers
                .get(key)
                .and_then(|handler| handler.category.clone());
            match category {
                Some(category) => {
                    let existing = groups
                        .iter_mut()
                        .find(|group| group.category.as_deref() == Some(category.as_str()));
                    match existing {
                        Some(group) => group.keys.push(key.clone()),
                        None => groups.push(KeyGroup {
                            category: Some(category),
                            keys: vec![key.clone()],
                        }),
                    }
                }
                None => groups.push(KeyGroup {
                    category: None,
                    keys: vec![key.clone()],
                }),
            }
        }
        groups
    }

    pub fn list_grouped_by_category(&self, keys: &[K]) -> Vec<K> {
        self.groups(keys)
            .into_iter()
            .flat_map(|group| group.keys)
            .collect()
    }
}

impl<K: RegistryKey, P> fmt::Debug for ExtensionRegistry<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("name", &self.name)
            .field("keys", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(label: &str, category: Option<&str>) -> Handler<String> {
        let handler = Handler::new("icon", label, |props: &String| Fragment::new(props.clone()));
        match category {
            Some(category) => handler.with_category(category),
            None => handler,
        }
    }

    #[test]
    fn overwrite_keeps_original_position() {
        let mut registry = ExtensionRegistry::new("test");
        registry.register("a".to_string(), handler("A", None));
        registry.register("b".to_string(), handler("B", None));
        registry.register("a".to_string(), handler("A2", None));

        assert_eq!(registry.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.len(), 2);
        let a = registry.get(&"a".to_string()).unwrap();
        assert_eq!(a.label_text(), "A2");
    }

    #[test]
    fn grouping_follows_first_occurrence() {
        let mut registry = ExtensionRegistry::new("test");
        registry.register("deploy".to_string(), handler("Deploy", Some("cd")));
        registry.register("build".to_string(), handler("Build", Some("ci")));
        registry.register("custom".to_string(), handler("Custom", Some("cd")));
        registry.register("loose".to_string(), handler("Loose", None));

        let keys: Vec<String> = ["build", "loose", "deploy", "missing", "custom"]
            .iter()
            .map(|k| k.to_string())
            .collect();
        let ordered = registry.list_grouped_by_category(&keys);
        assert_eq!(ordered, vec!["build", "loose", "deploy", "custom", "missing"]);

        let groups = registry.groups(&keys);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[2].category.as_deref(), Some("cd"));
        assert_eq!(groups[3].category, None);
    }

    #[test]
    fn computed_label_resolves_each_time() {
        let label = Label::Computed(Arc::new(|| "dynamic".to_string()));
        assert_eq!(label.resolve(), "dynamic");
        assert_eq!(format!("{label:?}"), "Computed(..)");
    }

    #[test]
    fn fallback_render_names_missing_key() {
        let registry: ExtensionRegistry<String, String> = ExtensionRegistry::new("stage");
        let fragment = registry.render_or_fallback(&"Unknown".to_string(), &String::new());
        assert_eq!(fragment.title, "Unknown");
        assert_eq!(fragment.lines, vec!["No stage handler registered".to_string()]);
    }
}
