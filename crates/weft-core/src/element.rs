//! The declared element tree: plain data produced by the authoring layer
//! and consumed by reconciliation.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::hash::DefaultHashBuilder;

/// Ordered attribute map. Iteration order is insertion order so prop
/// diffs and host dumps are deterministic.
pub type AttrMap = IndexMap<String, PropValue, DefaultHashBuilder>;

/// A component is a plain function from props to a rendered element.
/// Identity (the function pointer) is what reconciliation compares.
pub type ComponentFn = fn(&Props) -> Element;

/// What an element renders as: a host node, a text node, or a component
/// invocation.
#[derive(Clone)]
pub enum ElementKind {
    Host(String),
    Text(String),
    Component(ComponentFn),
}

impl ElementKind {
    pub fn host(tag: impl Into<String>) -> Self {
        ElementKind::Host(tag.into())
    }

    /// Structural equality used by reconciliation. Host tags compare by
    /// name, text nodes always match (the value is diffed at commit),
    /// components compare by function identity.
    pub fn same_kind(&self, other: &ElementKind) -> bool {
        match (self, other) {
            (ElementKind::Host(a), ElementKind::Host(b)) => a == b,
            (ElementKind::Text(_), ElementKind::Text(_)) => true,
            (ElementKind::Component(a), ElementKind::Component(b)) => {
                *a as usize == *b as usize
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Host(tag) => write!(f, "Host({tag})"),
            ElementKind::Text(value) => write!(f, "Text({value:?})"),
            ElementKind::Component(func) => write!(f, "Component({:p})", *func as *const ()),
        }
    }
}

/// An attached event callback. Equality is pointer identity, matching how
/// the reconciler decides whether a listener changed between renders.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn()>);

impl EventHandler {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn invoke(&self) {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

#[derive(Clone, Debug)]
pub enum PropValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Handler(EventHandler),
}

impl PartialEq for PropValue {
    fn eq(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Text(a), PropValue::Text(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => a == b,
            (PropValue::Flag(a), PropValue::Flag(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Number(value as f64)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Flag(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

/// An element's props: ordered attributes (including `on…` event props)
/// plus the declared children. `children` is always present, possibly
/// empty, and never holds raw primitives — conversions into [`Element`]
/// normalize those into text elements at the boundary.
#[derive(Clone, Debug, Default)]
pub struct Props {
    pub attrs: AttrMap,
    pub children: Vec<Element>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Registers an event prop under its conventional `on…` name.
    pub fn on(mut self, event: &str, handler: impl Fn() + 'static) -> Self {
        self.attrs.insert(
            format!("on{event}"),
            PropValue::Handler(EventHandler::new(handler)),
        );
        self
    }

    pub fn handler(mut self, event: &str, handler: EventHandler) -> Self {
        self.attrs
            .insert(format!("on{event}"), PropValue::Handler(handler));
        self
    }

    /// True when a prop name follows the `on…` event convention.
    pub fn is_event(name: &str) -> bool {
        name.starts_with("on")
    }

    /// Event type carried by an event-style prop name: `onclick` → `click`.
    pub fn event_type(name: &str) -> String {
        name[2..].to_ascii_lowercase()
    }
}

#[derive(Clone, Debug)]
pub struct Element {
    pub kind: ElementKind,
    pub props: Props,
}

impl Element {
    pub fn new(kind: ElementKind, props: Props) -> Self {
        Self { kind, props }
    }

    /// A text element: no attributes, no children, just a value.
    pub fn text(value: impl fmt::Display) -> Self {
        Element {
            kind: ElementKind::Text(value.to_string()),
            props: Props::default(),
        }
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::text(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::text(value)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::text(value)
    }
}

impl From<f64> for Element {
    fn from(value: f64) -> Self {
        Element::text(value)
    }
}

/// Builds an element from a kind, props, and children. Children that are
/// not already elements (raw strings, numbers) are wrapped into text
/// elements by their `Into<Element>` conversions. The kind is not
/// validated here; an unsupported host tag surfaces as an adapter error
/// during the render that reaches it.
pub fn create_element<I>(kind: ElementKind, props: Props, children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Element>,
{
    let mut props = props;
    props.children.extend(children.into_iter().map(Into::into));
    Element { kind, props }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_children_normalize_to_text_elements() {
        let el = create_element(
            ElementKind::host("h1"),
            Props::new(),
            ["Count: ", "1"],
        );
        assert_eq!(el.props.children.len(), 2);
        for child in &el.props.children {
            assert!(matches!(child.kind, ElementKind::Text(_)));
            assert!(child.props.children.is_empty());
        }
    }

    #[test]
    fn numeric_child_carries_its_value() {
        let el = Element::from(7i64);
        match &el.kind {
            ElementKind::Text(value) => assert_eq!(value, "7"),
            other => panic!("expected text element, got {other:?}"),
        }
    }

    #[test]
    fn children_are_always_present() {
        let el = create_element(ElementKind::host("div"), Props::new(), Vec::<Element>::new());
        assert!(el.props.children.is_empty());
    }

    #[test]
    fn event_prop_names_follow_the_on_convention() {
        assert!(Props::is_event("onClick"));
        assert!(Props::is_event("onclick"));
        assert!(!Props::is_event("title"));
        assert_eq!(Props::event_type("onClick"), "click");
    }

    #[test]
    fn same_kind_compares_structurally() {
        fn a(_: &Props) -> Element {
            Element::text("a")
        }
        fn b(_: &Props) -> Element {
            Element::text("b")
        }
        assert!(ElementKind::host("div").same_kind(&ElementKind::host("div")));
        assert!(!ElementKind::host("div").same_kind(&ElementKind::host("p")));
        assert!(ElementKind::Text("x".into()).same_kind(&ElementKind::Text("y".into())));
        assert!(ElementKind::Component(a).same_kind(&ElementKind::Component(a)));
        assert!(!ElementKind::Component(a).same_kind(&ElementKind::Component(b)));
        assert!(!ElementKind::host("div").same_kind(&ElementKind::Text("div".into())));
    }

    #[test]
    fn handler_props_compare_by_identity() {
        let handler = EventHandler::new(|| {});
        let a = PropValue::Handler(handler.clone());
        let b = PropValue::Handler(handler);
        let c = PropValue::Handler(EventHandler::new(|| {}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
