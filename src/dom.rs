// Declarative element tree
//
// A small retained tree standing in for the browser DOM. Pages describe
// elements with `el(tag, attrs, children)`; front ends walk the tree to draw
// it (terminal) or serialise it (`to_html`). Text is always stored as text
// and escaped on output, so data never turns into markup.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};
use tracing::warn;

pub type Handler = Rc<dyn Fn(&Event)>;

/// Event delivered to listeners
pub struct Event {
    kind: String,
    target: ElementRef,
}

impl Event {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target(&self) -> &ElementRef {
        &self.target
    }
}

// ============================================================================
// CONSTRUCTION OPTIONS
// ============================================================================

/// Recognized construction options
///
/// `None` values are skipped without error; anything that is not one of the
/// named options travels as `Generic(name, value)`.
pub enum Attr {
    ClassName(Option<String>),
    /// Literal text content, never parsed as markup; it is the element's
    /// whole content, so `el` drops any children passed alongside it
    Text(Option<String>),
    Dataset(Vec<(String, String)>),
    Style(Vec<(String, String)>),
    /// `("onClick", handler)` binds `handler` to `click`
    On(String, Handler),
    Generic(String, Option<String>),
}

impl Attr {
    pub fn class(name: impl Into<String>) -> Self {
        Attr::ClassName(Some(name.into()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Attr::Text(Some(text.into()))
    }

    pub fn data(key: impl Into<String>, value: impl Into<String>) -> Self {
        Attr::Dataset(vec![(key.into(), value.into())])
    }

    pub fn style<K: Into<String>, V: Into<String>>(props: impl IntoIterator<Item = (K, V)>) -> Self {
        Attr::Style(props.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn on<F>(key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Attr::On(key.into(), Rc::new(handler))
    }

    pub fn attr(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attr::Generic(name.into(), Some(value.into()))
    }

    pub fn optional(name: impl Into<String>, value: Option<String>) -> Self {
        Attr::Generic(name.into(), value)
    }
}

/// `onClick` → `click`; keys without the prefix are taken as-is
pub fn event_name(key: &str) -> String {
    let stripped = key.strip_prefix("on").unwrap_or(key);
    stripped.to_ascii_lowercase()
}

/// Child slot accepted by `el` and `mount`
pub enum Child {
    Node(Node),
    Empty,
}

impl From<ElementRef> for Child {
    fn from(el: ElementRef) -> Self {
        Child::Node(Node::Element(el))
    }
}

impl From<&ElementRef> for Child {
    fn from(el: &ElementRef) -> Self {
        Child::Node(Node::Element(el.clone()))
    }
}

impl From<Option<ElementRef>> for Child {
    fn from(el: Option<ElementRef>) -> Self {
        match el {
            Some(el) => el.into(),
            None => Child::Empty,
        }
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Node(Node::Text(text.to_string()))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Node(Node::Text(text))
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Node(node)
    }
}

/// `children![a, "text", maybe_el]`
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        vec![$($crate::dom::Child::from($child)),*]
    };
}

// ============================================================================
// TREE
// ============================================================================

#[derive(Clone)]
pub enum Node {
    Element(ElementRef),
    Text(String),
}

struct Listener {
    event: String,
    handler: Handler,
    once: bool,
}

pub struct Element {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    dataset: BTreeMap<String, String>,
    style: Vec<(String, String)>,
    listeners: Vec<Listener>,
    children: Vec<Node>,
}

/// Shared handle to an element
#[derive(Clone)]
pub struct ElementRef(Rc<RefCell<Element>>);

/// Non-owning handle; listeners use it to reach their own subtree
#[derive(Clone)]
pub struct WeakElementRef(Weak<RefCell<Element>>);

impl WeakElementRef {
    pub fn upgrade(&self) -> Option<ElementRef> {
        self.0.upgrade().map(ElementRef)
    }
}

impl ElementRef {
    pub fn new(tag: &str) -> Self {
        ElementRef(Rc::new(RefCell::new(Element {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            dataset: BTreeMap::new(),
            style: Vec::new(),
            listeners: Vec::new(),
            children: Vec::new(),
        })))
    }

    pub fn downgrade(&self) -> WeakElementRef {
        WeakElementRef(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &ElementRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    // ------------------------------------------------------------------------
    // classes
    // ------------------------------------------------------------------------

    pub fn class_name(&self) -> String {
        self.0.borrow().classes.join(" ")
    }

    pub fn set_class_name(&self, value: &str) {
        self.0.borrow_mut().classes = value.split_whitespace().map(String::from).collect();
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.0.borrow().classes.iter().any(|c| c == name)
    }

    pub fn add_class(&self, name: &str) {
        if !self.has_class(name) {
            self.0.borrow_mut().classes.push(name.to_string());
        }
    }

    pub fn remove_class(&self, name: &str) {
        self.0.borrow_mut().classes.retain(|c| c != name);
    }

    pub fn toggle_class(&self, name: &str, on: bool) {
        if on {
            self.add_class(name);
        } else {
            self.remove_class(name);
        }
    }

    // ------------------------------------------------------------------------
    // attributes, dataset, style
    // ------------------------------------------------------------------------

    pub fn attr(&self, name: &str) -> Option<String> {
        self.0.borrow().attributes.get(name).cloned()
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attr(&self, name: &str) {
        self.0.borrow_mut().attributes.remove(name);
    }

    pub fn id(&self) -> Option<String> {
        self.attr("id")
    }

    /// Form value (`value` attribute)
    pub fn value(&self) -> String {
        self.attr("value").unwrap_or_default()
    }

    pub fn set_value(&self, value: &str) {
        self.set_attr("value", value);
    }

    pub fn data(&self, key: &str) -> Option<String> {
        self.0.borrow().dataset.get(key).cloned()
    }

    pub fn set_data(&self, key: &str, value: &str) {
        self.0
            .borrow_mut()
            .dataset
            .insert(key.to_string(), value.to_string());
    }

    pub fn style(&self, prop: &str) -> Option<String> {
        self.0
            .borrow()
            .style
            .iter()
            .find(|(k, _)| k == prop)
            .map(|(_, v)| v.clone())
    }

    pub fn set_style(&self, prop: &str, value: &str) {
        let mut inner = self.0.borrow_mut();
        match inner.style.iter_mut().find(|(k, _)| k == prop) {
            Some(slot) => slot.1 = value.to_string(),
            None => inner.style.push((prop.to_string(), value.to_string())),
        }
    }

    // ------------------------------------------------------------------------
    // children & text
    // ------------------------------------------------------------------------

    pub fn append(&self, child: Child) {
        if let Child::Node(node) = child {
            self.0.borrow_mut().children.push(node);
        }
    }

    pub fn append_child(&self, child: &ElementRef) {
        self.append(Child::from(child));
    }

    /// Drop every child; nothing else is released
    pub fn clear(&self) {
        self.0.borrow_mut().children.clear();
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn child_elements(&self) -> Vec<ElementRef> {
        self.0
            .borrow()
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Element(e) => Some(e.clone()),
                Node::Text(_) => None,
            })
            .collect()
    }

    /// Replace all children with one text node
    pub fn set_text(&self, text: &str) {
        let mut inner = self.0.borrow_mut();
        inner.children.clear();
        if !text.is_empty() {
            inner.children.push(Node::Text(text.to_string()));
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in self.0.borrow().children.iter() {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    // ------------------------------------------------------------------------
    // events
    // ------------------------------------------------------------------------

    pub fn add_listener(&self, event: &str, handler: Handler) {
        self.push_listener(event, handler, false);
    }

    /// Listener removed after its first delivery
    pub fn add_listener_once(&self, event: &str, handler: Handler) {
        self.push_listener(event, handler, true);
    }

    fn push_listener(&self, event: &str, handler: Handler, once: bool) {
        self.0.borrow_mut().listeners.push(Listener {
            event: event.to_string(),
            handler,
            once,
        });
    }

    pub fn has_listener(&self, event: &str) -> bool {
        self.0.borrow().listeners.iter().any(|l| l.event == event)
    }

    /// Deliver `kind` to this element's listeners; returns how many ran.
    /// Events do not bubble.
    pub fn dispatch(&self, kind: &str) -> usize {
        let handlers: Vec<Handler> = {
            let mut inner = self.0.borrow_mut();
            let matched: Vec<Handler> = inner
                .listeners
                .iter()
                .filter(|l| l.event == kind)
                .map(|l| l.handler.clone())
                .collect();
            inner.listeners.retain(|l| !(l.once && l.event == kind));
            matched
        };

        let event = Event {
            kind: kind.to_string(),
            target: self.clone(),
        };
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    // ------------------------------------------------------------------------
    // lookup
    // ------------------------------------------------------------------------

    /// Depth-first descendants matching `pred` (self excluded)
    pub fn find_all(&self, pred: &dyn Fn(&ElementRef) -> bool) -> Vec<ElementRef> {
        let mut out = Vec::new();
        self.walk(pred, &mut out);
        out
    }

    fn walk(&self, pred: &dyn Fn(&ElementRef) -> bool, out: &mut Vec<ElementRef>) {
        for child in self.child_elements() {
            if pred(&child) {
                out.push(child.clone());
            }
            child.walk(pred, out);
        }
    }

    pub fn find_first(&self, pred: &dyn Fn(&ElementRef) -> bool) -> Option<ElementRef> {
        self.find_all(pred).into_iter().next()
    }

    pub fn find_by_class(&self, class: &str) -> Vec<ElementRef> {
        self.find_all(&|e| e.has_class(class))
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<ElementRef> {
        self.find_all(&|e| e.tag() == tag)
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<ElementRef> {
        if self.id().as_deref() == Some(id) {
            return Some(self.clone());
        }
        self.find_first(&|e| e.id().as_deref() == Some(id))
    }

    // ------------------------------------------------------------------------
    // serialisation
    // ------------------------------------------------------------------------

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let inner = self.0.borrow();
        let _ = write!(out, "<{}", inner.tag);

        if !inner.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape_attr(&inner.classes.join(" ")));
        }
        for (name, value) in &inner.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
        }
        for (key, value) in &inner.dataset {
            let _ = write!(out, " data-{}=\"{}\"", key, escape_attr(value));
        }
        if !inner.style.is_empty() {
            let css = inner
                .style
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = write!(out, " style=\"{}\"", escape_attr(&css));
        }
        out.push('>');

        if VOID_TAGS.contains(&inner.tag.as_str()) {
            return;
        }

        for child in &inner.children {
            match child {
                Node::Text(t) => out.push_str(&escape_text(t)),
                Node::Element(e) => e.write_html(out),
            }
        }
        let _ = write!(out, "</{}>", inner.tag);
    }
}

const VOID_TAGS: [&str; 5] = ["input", "br", "hr", "img", "meta"];

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

// ============================================================================
// HELPERS
// ============================================================================

/// Build one element from a tag, options and children
///
/// A `Attr::text` option wins over `children`: the element holds only
/// that text.
pub fn el(tag: &str, attrs: Vec<Attr>, children: Vec<Child>) -> ElementRef {
    let element = ElementRef::new(tag);
    let mut has_text = false;

    for attr in attrs {
        match attr {
            Attr::ClassName(Some(name)) => element.set_class_name(&name),
            Attr::Text(Some(text)) => {
                element.set_text(&text);
                has_text = true;
            }
            Attr::Dataset(pairs) => {
                for (k, v) in pairs {
                    element.set_data(&k, &v);
                }
            }
            Attr::Style(props) => {
                for (k, v) in props {
                    element.set_style(&k, &v);
                }
            }
            Attr::On(key, handler) => element.add_listener(&event_name(&key), handler),
            Attr::Generic(name, Some(value)) => element.set_attr(&name, &value),
            Attr::ClassName(None) | Attr::Text(None) | Attr::Generic(_, None) => {}
        }
    }

    if has_text {
        if !children.is_empty() {
            warn!("<{}> has text content; dropping {} children", tag, children.len());
        }
        return element;
    }

    for child in children {
        element.append(child);
    }

    element
}

/// Element whose only content is `text`
pub fn text_el(tag: &str, class: &str, text: impl Into<String>) -> ElementRef {
    el(tag, vec![Attr::class(class), Attr::text(text)], vec![])
}

/// Append nodes to `parent`, skipping empty slots
pub fn mount(parent: &ElementRef, nodes: Vec<Child>) {
    for node in nodes {
        parent.append(node);
    }
}

pub fn clear(element: &ElementRef) {
    element.clear();
}

// ============================================================================
// DOCUMENT
// ============================================================================

/// Page skeleton: header, app mount point, footer
#[derive(Clone)]
pub struct Document {
    body: ElementRef,
}

impl Document {
    pub fn new() -> Self {
        let body = el(
            "body",
            vec![],
            children![
                el("header", vec![Attr::attr("id", "site-header"), Attr::class("site-header")], vec![]),
                el("main", vec![Attr::attr("id", "app")], vec![]),
                el("footer", vec![Attr::attr("id", "site-footer"), Attr::class("site-footer")], vec![]),
            ],
        );
        Self { body }
    }

    pub fn body(&self) -> &ElementRef {
        &self.body
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<ElementRef> {
        self.body.get_element_by_id(id)
    }

    /// The `#app` mount point; always present in a `Document::new()` tree
    pub fn app(&self) -> ElementRef {
        self.get_element_by_id("app")
            .unwrap_or_else(|| self.body.clone())
    }

    pub fn header(&self) -> ElementRef {
        self.get_element_by_id("site-header")
            .unwrap_or_else(|| self.body.clone())
    }

    pub fn footer(&self) -> ElementRef {
        self.get_element_by_id("site-footer")
            .unwrap_or_else(|| self.body.clone())
    }

    pub fn to_html(&self) -> String {
        format!("<!DOCTYPE html><html>{}</html>", self.body.to_html())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
