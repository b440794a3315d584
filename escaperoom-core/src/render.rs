//! Render targets injected into each screen.
//!
//! Screens never look elements up themselves; they address targets through
//! selectors handed to them at construction and write through [`Surface`].
//! The browser implementation applies each call to every element matching the
//! selector, the recording implementation keeps an in-memory model for tests.

use serde::Serialize;

pub trait Surface {
    /// Replace the text content (and therefore the children) of the target.
    fn set_text(&mut self, target: &str, text: &str);
    fn set_class(&mut self, target: &str, class: &str, on: bool);
    /// Remove every class that starts with `prefix`.
    fn clear_class_prefix(&mut self, target: &str, prefix: &str);
    fn set_attr(&mut self, target: &str, name: &str, value: &str);
    fn set_style(&mut self, target: &str, property: &str, value: &str);
    fn replace_children(&mut self, target: &str, children: &[Node]);
    /// Append `node` under `parent` unless an element with its id already exists.
    fn ensure_child(&mut self, parent: &str, node: &Node);
}

/// Minimal element tree used when a screen rebuilds a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Node {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn div() -> Self {
        Self::new("div")
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        for name in class.split_whitespace() {
            if !self.classes.iter().any(|c| c == name) {
                self.classes.push(name.to_string());
            }
        }
        self
    }

    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    #[must_use]
    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Depth-first search for the first descendant (or self) satisfying `pred`.
    #[must_use]
    pub fn find(&self, pred: &dyn Fn(&Self) -> bool) -> Option<&Self> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(pred))
    }

    /// Every node in this subtree, parents before children.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a Self>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

/// `#id` selector for an element id.
#[must_use]
pub fn by_id(id: &str) -> String {
    format!("#{id}")
}
