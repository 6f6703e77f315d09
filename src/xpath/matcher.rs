//! Streaming matcher for identity-constraint XPath
//!
//! An [`XPathMatcher`] is fed the start/character/end events of the subtree
//! rooted at its context element and reports the elements (or attributes)
//! selected by its expression. Each union member keeps:
//! - the set of child-step positions reached by the chain of open elements
//! - a stack of those sets, pushed on element start and popped on element end
//! - a no-match depth that, while positive, skips whole subtrees cheaply
//!
//! A position set instead of a single step index keeps `.//a/b` exact when
//! `a` elements nest.

use std::mem;
use std::sync::Arc;

use crate::namespaces::QName;

use super::parsers::{LocationPath, XPathExpression};

/// What a match selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// An element; its value is its text content
    Element,
    /// An attribute of the element
    Attribute,
}

/// Value delivered for a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedValue {
    /// Element or attribute
    pub kind: MatchKind,
    /// Name of the matched node
    pub name: QName,
    /// Text content or attribute value
    pub value: String,
    /// Declared simple type of the matched node
    pub type_name: Option<QName>,
}

/// Attribute as seen by a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchAttribute {
    /// Attribute name
    pub name: QName,
    /// Attribute value
    pub value: String,
    /// Declared simple type
    pub type_name: Option<QName>,
}

impl MatchAttribute {
    /// Create a new attribute
    pub fn new(name: QName, value: impl Into<String>, type_name: Option<QName>) -> Self {
        Self {
            name,
            value: value.into(),
            type_name,
        }
    }
}

/// Element start as seen by a matcher
#[derive(Debug, Clone, Copy)]
pub struct MatchEvent<'a> {
    /// Element name
    pub name: &'a QName,
    /// Declared simple type of the element content
    pub type_name: Option<&'a QName>,
    /// Attributes of the element
    pub attributes: &'a [MatchAttribute],
}

impl<'a> MatchEvent<'a> {
    /// Create a new event
    pub fn new(name: &'a QName, attributes: &'a [MatchAttribute]) -> Self {
        Self {
            name,
            type_name: None,
            attributes,
        }
    }

    /// Set the content type
    pub fn with_type(mut self, type_name: Option<&'a QName>) -> Self {
        self.type_name = type_name;
        self
    }
}

/// Result of an element start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartMatch {
    /// The element, or one of its attributes, was selected
    pub matched: bool,
    /// Attribute value selected by the first matching union member
    pub captured: Option<MatchedValue>,
}

enum PathMatch<'a> {
    None,
    Element,
    Attribute(&'a MatchAttribute),
}

#[derive(Debug, Clone, Default)]
struct PathFrame {
    saved: Vec<usize>,
    element_match: bool,
}

#[derive(Debug, Clone, Default)]
struct PathState {
    positions: Vec<usize>,
    stack: Vec<PathFrame>,
    no_match_depth: usize,
}

impl PathState {
    fn clear(&mut self) {
        self.positions.clear();
        self.stack.clear();
        self.no_match_depth = 0;
    }

    fn start<'e>(&mut self, path: &LocationPath, event: &MatchEvent<'e>, is_context: bool) -> PathMatch<'e> {
        if self.no_match_depth > 0 {
            self.no_match_depth += 1;
            return PathMatch::None;
        }

        let steps = path.child_steps();
        let mut reached: Vec<usize> = if is_context {
            vec![0]
        } else {
            self.positions
                .iter()
                .filter(|&&i| i < steps.len() && steps[i].matches(event.name))
                .map(|&i| i + 1)
                .collect()
        };
        if path.is_descendant() && !reached.contains(&0) {
            reached.push(0);
        }
        if reached.is_empty() {
            self.no_match_depth = 1;
            return PathMatch::None;
        }

        let complete = reached.contains(&steps.len());
        let saved = mem::replace(&mut self.positions, reached);
        let mut frame = PathFrame {
            saved,
            element_match: false,
        };

        let result = if !complete {
            PathMatch::None
        } else {
            match path.attribute() {
                Some(test) => match event.attributes.iter().find(|a| test.matches(&a.name)) {
                    Some(attribute) => PathMatch::Attribute(attribute),
                    None => PathMatch::None,
                },
                None => {
                    frame.element_match = true;
                    PathMatch::Element
                }
            }
        };
        self.stack.push(frame);
        result
    }

    fn end(&mut self) -> bool {
        if self.no_match_depth > 0 {
            self.no_match_depth -= 1;
            return false;
        }
        match self.stack.pop() {
            Some(frame) => {
                self.positions = frame.saved;
                frame.element_match
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
struct ElementFrame {
    name: QName,
    type_name: Option<QName>,
    text: Option<String>,
}

/// Streaming matcher for one selector or field expression
#[derive(Debug, Clone)]
pub struct XPathMatcher {
    paths: Arc<[LocationPath]>,
    states: Vec<PathState>,
    frames: Vec<ElementFrame>,
    buffering: bool,
}

impl XPathMatcher {
    /// Create a matcher for an expression
    pub fn new(expression: &XPathExpression) -> Self {
        let paths = Arc::clone(expression.paths());
        let states = vec![PathState::default(); paths.len()];
        Self {
            paths,
            states,
            frames: Vec::new(),
            buffering: false,
        }
    }

    /// Buffer the text of matched elements (needed for fields)
    pub fn with_buffering(mut self, buffering: bool) -> Self {
        self.buffering = buffering;
        self
    }

    /// Reset to the state before the context element
    pub fn clear(&mut self) {
        for state in &mut self.states {
            state.clear();
        }
        self.frames.clear();
    }

    /// Number of open elements fed to the matcher
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Feed an element start. The first start is the context element.
    pub fn start_element(&mut self, event: &MatchEvent<'_>) -> StartMatch {
        let is_context = self.frames.is_empty();
        let mut element_match = false;
        let mut captured = None;

        for (path, state) in self.paths.iter().zip(self.states.iter_mut()) {
            match state.start(path, event, is_context) {
                PathMatch::None => {}
                PathMatch::Element => element_match = true,
                PathMatch::Attribute(attribute) => {
                    if captured.is_none() {
                        captured = Some(MatchedValue {
                            kind: MatchKind::Attribute,
                            name: attribute.name.clone(),
                            value: attribute.value.clone(),
                            type_name: attribute.type_name.clone(),
                        });
                    }
                }
            }
        }

        tracing::trace!(
            element = %event.name,
            depth = self.frames.len(),
            element_match,
            attribute_match = captured.is_some(),
            "xpath matcher start"
        );

        self.frames.push(ElementFrame {
            name: event.name.clone(),
            type_name: event.type_name.cloned(),
            text: (self.buffering && element_match).then(String::new),
        });

        StartMatch {
            matched: element_match || captured.is_some(),
            captured,
        }
    }

    /// Feed character data
    pub fn characters(&mut self, text: &str) {
        for frame in &mut self.frames {
            if let Some(buffer) = &mut frame.text {
                buffer.push_str(text);
            }
        }
    }

    /// Feed an element end; returns the element's value if it was selected
    pub fn end_element(&mut self) -> Option<MatchedValue> {
        let mut element_match = false;
        for state in &mut self.states {
            element_match |= state.end();
        }
        let frame = self.frames.pop()?;
        element_match.then(|| MatchedValue {
            kind: MatchKind::Element,
            name: frame.name,
            value: frame.text.unwrap_or_default(),
            type_name: frame.type_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::NamespaceContext;
    use crate::xpath::parsers::IdentityXPathParser;

    fn selector(xpath: &str) -> XPathMatcher {
        let expr = IdentityXPathParser::new()
            .parse(xpath, &NamespaceContext::new())
            .unwrap();
        XPathMatcher::new(&expr)
    }

    fn field(xpath: &str) -> XPathMatcher {
        let expr = IdentityXPathParser::for_field()
            .parse(xpath, &NamespaceContext::new())
            .unwrap();
        XPathMatcher::new(&expr).with_buffering(true)
    }

    fn start(matcher: &mut XPathMatcher, name: &str) -> bool {
        let name = QName::local(name);
        matcher.start_element(&MatchEvent::new(&name, &[])).matched
    }

    /// Feed `name` as a start and `/name` as an end; collect selected starts.
    fn run(matcher: &mut XPathMatcher, events: &[&str]) -> Vec<String> {
        let mut selected = Vec::new();
        for event in events {
            match event.strip_prefix('/') {
                Some(_) => {
                    matcher.end_element();
                }
                None => {
                    if start(matcher, event) {
                        selected.push(event.to_string());
                    }
                }
            }
        }
        selected
    }

    #[test]
    fn test_child_path() {
        let mut matcher = selector("item");
        let selected = run(
            &mut matcher,
            &["root", "item", "item", "/item", "/item", "other", "/other", "item", "/item", "/root"],
        );
        assert_eq!(selected, vec!["item", "item"]);
        assert_eq!(matcher.depth(), 0);
    }

    #[test]
    fn test_self_path() {
        let mut matcher = selector(".");
        assert_eq!(run(&mut matcher, &["root", "a", "/a", "/root"]), vec!["root"]);
    }

    #[test]
    fn test_descendant_path_with_nesting() {
        let mut matcher = selector(".//a/b");
        let selected = run(
            &mut matcher,
            &["root", "a", "a", "b", "/b", "/a", "c", "b", "/b", "/c", "/a", "/root"],
        );
        assert_eq!(selected, vec!["b"]);

        let mut matcher = selector(".//item");
        let selected = run(
            &mut matcher,
            &["root", "x", "item", "item", "/item", "/item", "/x", "/root"],
        );
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_union() {
        let mut matcher = selector("a | b/c");
        let selected = run(
            &mut matcher,
            &["root", "a", "/a", "b", "c", "/c", "/b", "c", "/c", "/root"],
        );
        assert_eq!(selected, vec!["a", "c"]);
    }

    #[test]
    fn test_attribute_capture() {
        let mut matcher = field("@id");
        let name = QName::local("item");
        let attributes = [MatchAttribute::new(QName::local("id"), "42", None)];
        let outcome = matcher.start_element(&MatchEvent::new(&name, &attributes));
        let captured = outcome.captured.unwrap();
        assert_eq!(captured.kind, MatchKind::Attribute);
        assert_eq!(captured.value, "42");
        assert_eq!(matcher.end_element(), None);
    }

    #[test]
    fn test_element_text_buffering() {
        let mut matcher = field("code");
        let item = QName::local("item");
        let code = QName::local("code");
        let decimal = QName::local("decimal");
        matcher.start_element(&MatchEvent::new(&item, &[]));
        matcher.characters("ignored");
        matcher.start_element(&MatchEvent::new(&code, &[]).with_type(Some(&decimal)));
        matcher.characters("1.");
        matcher.characters("50");
        let value = matcher.end_element().unwrap();
        assert_eq!(value.value, "1.50");
        assert_eq!(value.type_name, Some(decimal));
        assert_eq!(matcher.end_element(), None);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut matcher = selector("item");
        start(&mut matcher, "root");
        start(&mut matcher, "other");
        matcher.clear();
        assert_eq!(matcher.depth(), 0);
        assert_eq!(run(&mut matcher, &["root", "item", "/item", "/root"]), vec!["item"]);
    }
}
