//! [`Surface`] over the live document. Every call applies to all elements
//! matching the selector; a selector matching nothing is a no-op.

use escaperoom_core::{Node, Surface};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::{Document, Element, HtmlElement};

use crate::dom::js_error_message;

pub struct DomSurface {
    document: Document,
}

impl DomSurface {
    #[must_use]
    pub const fn new(document: Document) -> Self {
        Self { document }
    }

    fn each(&self, target: &str, mut f: impl FnMut(&Element) -> Result<(), JsValue>) {
        let list = match self.document.query_selector_all(target) {
            Ok(list) => list,
            Err(err) => {
                log::warn!("invalid selector {target}: {}", js_error_message(&err));
                return;
            }
        };
        for index in 0..list.length() {
            let Some(element) = list.item(index).and_then(|n| n.dyn_into::<Element>().ok())
            else {
                continue;
            };
            if let Err(err) = f(&element) {
                log::warn!("render into {target} failed: {}", js_error_message(&err));
            }
        }
    }

    fn build(&self, node: &Node) -> Result<Element, JsValue> {
        let element = self.document.create_element(&node.tag)?;
        if let Some(id) = &node.id {
            element.set_id(id);
        }
        if !node.classes.is_empty() {
            element.set_class_name(&node.classes.join(" "));
        }
        for (name, value) in &node.attrs {
            element.set_attribute(name, value)?;
        }
        if let Some(text) = &node.text {
            element.set_text_content(Some(text));
        }
        for child in &node.children {
            let built = self.build(child)?;
            element.append_child(&built)?;
        }
        Ok(element)
    }
}

impl Surface for DomSurface {
    fn set_text(&mut self, target: &str, text: &str) {
        self.each(target, |el| {
            el.set_text_content(Some(text));
            Ok(())
        });
    }

    fn set_class(&mut self, target: &str, class: &str, on: bool) {
        self.each(target, |el| el.class_list().toggle_with_force(class, on).map(|_| ()));
    }

    fn clear_class_prefix(&mut self, target: &str, prefix: &str) {
        self.each(target, |el| {
            let list = el.class_list();
            let doomed: Vec<String> = (0..list.length())
                .filter_map(|i| list.item(i))
                .filter(|class| class.starts_with(prefix))
                .collect();
            for class in doomed {
                list.remove_1(&class)?;
            }
            Ok(())
        });
    }

    fn set_attr(&mut self, target: &str, name: &str, value: &str) {
        self.each(target, |el| el.set_attribute(name, value));
    }

    fn set_style(&mut self, target: &str, property: &str, value: &str) {
        self.each(target, |el| match el.dyn_ref::<HtmlElement>() {
            Some(html) => html.style().set_property(property, value),
            None => Ok(()),
        });
    }

    fn replace_children(&mut self, target: &str, children: &[Node]) {
        self.each(target, |el| {
            el.set_inner_html("");
            for child in children {
                let built = self.build(child)?;
                el.append_child(&built)?;
            }
            Ok(())
        });
    }

    fn ensure_child(&mut self, parent: &str, node: &Node) {
        if let Some(id) = &node.id
            && self.document.get_element_by_id(id).is_some()
        {
            return;
        }
        let parent_el = match self.document.query_selector(parent) {
            Ok(Some(el)) => el,
            Ok(None) => {
                log::debug!("{parent} missing, cannot add child");
                return;
            }
            Err(err) => {
                log::warn!("invalid selector {parent}: {}", js_error_message(&err));
                return;
            }
        };
        if let Err(err) = self
            .build(node)
            .and_then(|child| parent_el.append_child(&child))
        {
            log::warn!("could not add child to {parent}: {}", js_error_message(&err));
        }
    }
}
