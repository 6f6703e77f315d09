//! XSD Identity Constraints
//!
//! This module implements identity constraints for XML Schema:
//! - xs:unique - Ensures values are unique within scope
//! - xs:key - Like unique, but all field values must be present
//! - xs:keyref - References a key or unique constraint (foreign key)
//!
//! Constraints are evaluated while streaming: every activation of the
//! declaring element starts a selector matcher, every selector match opens
//! a field scope, and the scope's tuple is checked when the selected
//! element ends. Key and unique tuples are recorded in the table of the
//! declaring element's activation and carried up to its ancestors when the
//! activation closes. A keyref is resolved against the tables visible from
//! its own activation once that activation closes, so forward references
//! inside it are legal; unresolved tuples are reported at document end.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::mem;
use std::fmt;

use crate::error::{ValidationError, ViolationKind};
use crate::namespaces::{NamespaceContext, QName};
use crate::xpath::{MatchEvent, MatchedValue, XPathExpression, XPathMatcher};

use super::arena::{ElementIndex, IdentityIndex};
use super::builtins::{TypedValue, ValueContext};
use super::grammar::Grammar;

/// Type of identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityConstraintKind {
    /// xs:unique - values must be unique, but fields can be missing
    Unique,
    /// xs:key - values must be unique AND all fields must be present
    Key,
    /// xs:keyref - references a key or unique constraint
    Keyref,
}

impl fmt::Display for IdentityConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unique => "unique",
            Self::Key => "key",
            Self::Keyref => "keyref",
        };
        write!(f, "{}", s)
    }
}

/// Declared identity constraint, before compilation
#[derive(Debug, Clone)]
pub struct IdentityConstraintSource {
    /// Constraint name
    pub name: QName,
    /// Kind of constraint
    pub kind: IdentityConstraintKind,
    /// Selector XPath
    pub selector: String,
    /// Field XPaths
    pub fields: Vec<String>,
    /// Referenced key or unique constraint (for keyref)
    pub refer: Option<QName>,
    /// Prefixes in scope for the XPath expressions
    pub namespaces: NamespaceContext,
}

impl IdentityConstraintSource {
    /// Create a new identity constraint source
    pub fn new(name: QName, kind: IdentityConstraintKind, selector: impl Into<String>) -> Self {
        Self {
            name,
            kind,
            selector: selector.into(),
            fields: Vec::new(),
            refer: None,
            namespaces: NamespaceContext::new(),
        }
    }

    /// Create a unique constraint
    pub fn unique(name: QName, selector: impl Into<String>) -> Self {
        Self::new(name, IdentityConstraintKind::Unique, selector)
    }

    /// Create a key constraint
    pub fn key(name: QName, selector: impl Into<String>) -> Self {
        Self::new(name, IdentityConstraintKind::Key, selector)
    }

    /// Create a keyref constraint
    pub fn keyref(name: QName, selector: impl Into<String>, refer: QName) -> Self {
        let mut source = Self::new(name, IdentityConstraintKind::Keyref, selector);
        source.refer = Some(refer);
        source
    }

    /// Add a field
    pub fn with_field(mut self, xpath: impl Into<String>) -> Self {
        self.fields.push(xpath.into());
        self
    }

    /// Set the namespace context used to resolve prefixes
    pub fn with_namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }
}

/// Compiled identity constraint
#[derive(Debug, Clone)]
pub struct IdentityConstraint {
    /// Constraint name
    pub name: QName,
    /// Kind of constraint
    pub kind: IdentityConstraintKind,
    /// Compiled selector
    pub selector: XPathExpression,
    /// Compiled fields
    pub fields: Vec<XPathExpression>,
    /// Resolved referenced constraint (for keyref)
    pub refer: Option<IdentityIndex>,
    /// Declaring element
    pub element: ElementIndex,
}

impl IdentityConstraint {
    /// Check if this is a unique constraint
    pub fn is_unique(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Unique)
    }

    /// Check if this is a key constraint
    pub fn is_key(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Key)
    }

    /// Check if this is a keyref constraint
    pub fn is_keyref(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Keyref)
    }
}

/// A tuple of field values forming a composite key
pub type FieldTuple = Vec<TypedValue>;

fn render_tuple(tuple: &[TypedValue]) -> String {
    let values: Vec<String> = tuple.iter().map(|v| v.to_string()).collect();
    values.join(", ")
}

/// Type a matched value with the declared simple type, if any
fn typed_value(grammar: &Grammar, matched: &MatchedValue) -> TypedValue {
    let ctx = ValueContext::new().with_grammar(grammar);
    matched
        .type_name
        .as_ref()
        .and_then(|name| grammar.simple_type(name))
        .and_then(|simple_type| simple_type.validate(&matched.value, &ctx).ok())
        .unwrap_or_else(|| TypedValue::String(matched.value.clone()))
}

/// Selector matcher for one activation of a declaring element
#[derive(Debug)]
struct ActiveSelector {
    ic: IdentityIndex,
    depth: usize,
    matcher: XPathMatcher,
    table: HashSet<FieldTuple>,
}

/// Tuple slot opened by one selector match
#[derive(Debug)]
struct FieldScope {
    ic: IdentityIndex,
    selector: usize,
    depth: usize,
    path: String,
    values: Vec<Option<TypedValue>>,
    reported: Vec<bool>,
    matchers: Vec<XPathMatcher>,
}

impl FieldScope {
    fn record(
        &mut self,
        field: usize,
        value: TypedValue,
        name: &QName,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        if self.values[field].is_none() {
            self.values[field] = Some(value);
            return;
        }
        if !self.reported[field] {
            self.reported[field] = true;
            errors.push(
                ValidationError::new(
                    ViolationKind::FieldMultipleMatch,
                    format!(
                        "field {} of identity constraint '{}' matches more than one value",
                        field + 1,
                        name
                    ),
                )
                .with_name(name.clone())
                .with_value(value.to_string())
                .with_path(path),
            );
        }
    }
}

#[derive(Debug)]
struct PendingKeyref {
    ic: IdentityIndex,
    refer: IdentityIndex,
    /// Depth of the declaring element's activation
    depth: usize,
    tuple: FieldTuple,
    path: String,
}

/// Key and unique tuples visible from one open element
type NodeTable = HashMap<IdentityIndex, HashSet<FieldTuple>>;

/// Pool of cleared matchers keyed by constraint and field position
#[derive(Debug, Default)]
struct MatcherPool {
    free: HashMap<(IdentityIndex, Option<usize>), Vec<XPathMatcher>>,
}

impl MatcherPool {
    fn take(&mut self, ic: IdentityIndex, field: Option<usize>, constraint: &IdentityConstraint) -> Option<XPathMatcher> {
        if let Some(mut matcher) = self.free.get_mut(&(ic, field)).and_then(Vec::pop) {
            matcher.clear();
            return Some(matcher);
        }
        match field {
            None => Some(XPathMatcher::new(&constraint.selector)),
            Some(i) => constraint
                .fields
                .get(i)
                .map(|expr| XPathMatcher::new(expr).with_buffering(true)),
        }
    }

    fn give(&mut self, ic: IdentityIndex, field: Option<usize>, matcher: XPathMatcher) {
        self.free.entry((ic, field)).or_default().push(matcher);
    }
}

/// Streaming evaluator of the identity constraints of a grammar
#[derive(Debug)]
pub struct IdentityConstraintValidator<'g> {
    grammar: &'g Grammar,
    depth: usize,
    selectors: Vec<ActiveSelector>,
    scopes: Vec<FieldScope>,
    tables: Vec<NodeTable>,
    pending: Vec<PendingKeyref>,
    dangling: Vec<PendingKeyref>,
    pool: MatcherPool,
}

impl<'g> IdentityConstraintValidator<'g> {
    /// Create a new validator for a grammar
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            depth: 0,
            selectors: Vec::new(),
            scopes: Vec::new(),
            tables: Vec::new(),
            pending: Vec::new(),
            dangling: Vec::new(),
            pool: MatcherPool::default(),
        }
    }

    /// Reset all per-document state; pooled matchers are kept
    pub fn clear(&mut self) {
        for selector in self.selectors.drain(..) {
            self.pool.give(selector.ic, None, selector.matcher);
        }
        for scope in self.scopes.drain(..) {
            for (i, matcher) in scope.matchers.into_iter().enumerate() {
                self.pool.give(scope.ic, Some(i), matcher);
            }
        }
        self.tables.clear();
        self.pending.clear();
        self.dangling.clear();
        self.depth = 0;
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of constraints with an active selector
    pub fn active_selectors(&self) -> usize {
        self.selectors.len()
    }

    /// Process an element start. `decl` is the element's declaration, if
    /// it has one; the event carries the element's content type and its
    /// typed attributes.
    pub fn start_element(
        &mut self,
        decl: Option<ElementIndex>,
        event: &MatchEvent<'_>,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        self.depth += 1;
        self.tables.push(NodeTable::new());
        let grammar = self.grammar;

        // Fields of scopes opened by ancestors
        for scope in &mut self.scopes {
            for i in 0..scope.matchers.len() {
                let outcome = scope.matchers[i].start_element(event);
                if let Some(captured) = outcome.captured {
                    if let Some(ic) = grammar.identity_constraint(scope.ic) {
                        let value = typed_value(grammar, &captured);
                        let scope_path = scope.path.clone();
                        scope.record(i, value, &ic.name, &scope_path, errors);
                    }
                }
            }
        }

        // Constraints declared on this element
        if let Some(element) = decl.and_then(|index| grammar.element(index)) {
            for &ic in &element.identity_constraints {
                let Some(constraint) = grammar.identity_constraint(ic) else {
                    continue;
                };
                if let Some(matcher) = self.pool.take(ic, None, constraint) {
                    tracing::trace!(constraint = %constraint.name, depth = self.depth, "activate selector");
                    self.selectors.push(ActiveSelector {
                        ic,
                        depth: self.depth,
                        matcher,
                        table: HashSet::new(),
                    });
                }
            }
        }

        // Selectors; each match opens a field scope
        for index in 0..self.selectors.len() {
            let ic = self.selectors[index].ic;
            if !self.selectors[index].matcher.start_element(event).matched {
                continue;
            }
            let Some(constraint) = grammar.identity_constraint(ic) else {
                continue;
            };
            let mut scope = FieldScope {
                ic,
                selector: index,
                depth: self.depth,
                path: path.to_string(),
                values: vec![None; constraint.fields.len()],
                reported: vec![false; constraint.fields.len()],
                matchers: Vec::with_capacity(constraint.fields.len()),
            };
            for i in 0..constraint.fields.len() {
                if let Some(mut matcher) = self.pool.take(ic, Some(i), constraint) {
                    let outcome = matcher.start_element(event);
                    if let Some(captured) = outcome.captured {
                        let value = typed_value(grammar, &captured);
                        scope.record(i, value, &constraint.name, path, errors);
                    }
                    scope.matchers.push(matcher);
                }
            }
            tracing::trace!(constraint = %constraint.name, %path, "open field scope");
            self.scopes.push(scope);
        }
    }

    /// Process character data
    pub fn characters(&mut self, text: &str) {
        for scope in &mut self.scopes {
            for matcher in &mut scope.matchers {
                matcher.characters(text);
            }
        }
    }

    /// Process an element end
    pub fn end_element(&mut self, errors: &mut Vec<ValidationError>) {
        if self.depth == 0 {
            return;
        }
        let grammar = self.grammar;

        for scope in &mut self.scopes {
            for i in 0..scope.matchers.len() {
                if let Some(matched) = scope.matchers[i].end_element() {
                    if let Some(ic) = grammar.identity_constraint(scope.ic) {
                        let value = typed_value(grammar, &matched);
                        let scope_path = scope.path.clone();
                        scope.record(i, value, &ic.name, &scope_path, errors);
                    }
                }
            }
        }

        while self.scopes.last().is_some_and(|scope| scope.depth == self.depth) {
            if let Some(scope) = self.scopes.pop() {
                self.close_scope(scope, errors);
            }
        }
        self.close_table();

        for selector in &mut self.selectors {
            selector.matcher.end_element();
        }
        while self.selectors.last().is_some_and(|s| s.depth == self.depth) {
            if let Some(selector) = self.selectors.pop() {
                self.pool.give(selector.ic, None, selector.matcher);
            }
        }

        self.depth -= 1;
    }

    fn close_scope(&mut self, scope: FieldScope, errors: &mut Vec<ValidationError>) {
        let FieldScope {
            ic,
            selector,
            path,
            values,
            matchers,
            ..
        } = scope;
        for (i, matcher) in matchers.into_iter().enumerate() {
            self.pool.give(ic, Some(i), matcher);
        }
        let grammar = self.grammar;
        let Some(constraint) = grammar.identity_constraint(ic) else {
            return;
        };

        let complete = values.iter().all(Option::is_some);
        if !complete {
            if constraint.is_key() {
                let missing: Vec<String> = values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_none())
                    .map(|(i, _)| (i + 1).to_string())
                    .collect();
                errors.push(
                    ValidationError::new(
                        ViolationKind::IncompleteKey,
                        format!(
                            "missing value for field(s) {} of key '{}'",
                            missing.join(", "),
                            constraint.name
                        ),
                    )
                    .with_name(constraint.name.clone())
                    .with_path(path),
                );
            }
            return;
        }
        let tuple: FieldTuple = values.into_iter().flatten().collect();

        let Some(active) = self.selectors.get_mut(selector) else {
            return;
        };
        match (constraint.kind, constraint.refer) {
            (IdentityConstraintKind::Keyref, Some(refer)) => {
                self.pending.push(PendingKeyref {
                    ic,
                    refer,
                    depth: active.depth,
                    tuple,
                    path,
                });
            }
            (IdentityConstraintKind::Keyref, None) => {}
            _ => {
                if !active.table.insert(tuple.clone()) {
                    tracing::debug!(constraint = %constraint.name, %path, "duplicate identity tuple");
                    errors.push(
                        ValidationError::new(
                            ViolationKind::DuplicateKey,
                            format!(
                                "duplicated value ({}) for {} '{}'",
                                render_tuple(&tuple),
                                constraint.kind,
                                constraint.name
                            ),
                        )
                        .with_name(constraint.name.clone())
                        .with_value(render_tuple(&tuple))
                        .with_path(path),
                    );
                    return;
                }
                let depth = active.depth;
                if let Some(table) = depth.checked_sub(1).and_then(|i| self.tables.get_mut(i)) {
                    table.entry(ic).or_default().insert(tuple);
                }
            }
        }
    }

    /// Resolve the keyrefs of activations at the current depth, then carry
    /// the element's table up to its parent
    fn close_table(&mut self) {
        let Some(table) = self.tables.pop() else {
            return;
        };
        if self.pending.iter().any(|pending| pending.depth == self.depth) {
            let (ready, waiting): (Vec<_>, Vec<_>) = mem::take(&mut self.pending)
                .into_iter()
                .partition(|pending| pending.depth == self.depth);
            self.pending = waiting;
            for pending in ready {
                let found = table
                    .get(&pending.refer)
                    .is_some_and(|tuples| tuples.contains(&pending.tuple));
                if !found {
                    self.dangling.push(pending);
                }
            }
        }
        let Some(parent) = self.tables.last_mut() else {
            return;
        };
        for (ic, tuples) in table {
            match parent.entry(ic) {
                Entry::Occupied(mut entry) => entry.get_mut().extend(tuples),
                Entry::Vacant(entry) => {
                    entry.insert(tuples);
                }
            }
        }
    }

    /// Report unresolved keyref tuples; each one is a violation
    pub fn end_document(&mut self, errors: &mut Vec<ValidationError>) {
        let grammar = self.grammar;
        let unresolved = mem::take(&mut self.dangling)
            .into_iter()
            .chain(mem::take(&mut self.pending));
        for pending in unresolved {
            let Some(constraint) = grammar.identity_constraint(pending.ic) else {
                continue;
            };
            let refer_name = grammar
                .identity_constraint(pending.refer)
                .map(|refer| refer.name.to_string())
                .unwrap_or_default();
            errors.push(
                ValidationError::new(
                    ViolationKind::DanglingKeyref,
                    format!(
                        "value ({}) of keyref '{}' does not match any value of '{}'",
                        render_tuple(&pending.tuple),
                        constraint.name,
                        refer_name
                    ),
                )
                .with_name(constraint.name.clone())
                .with_value(render_tuple(&pending.tuple))
                .with_path(pending.path),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::validators::attributes::{AttributeSource, AttributeType};
    use crate::validators::builders::{ElementSource, GrammarBuilder};
    use crate::validators::elements::ContentSource;
    use crate::validators::particles::Particle;
    use crate::xpath::MatchAttribute;

    fn q(name: &str) -> QName {
        QName::local(name)
    }

    fn grammar(constraints: Vec<IdentityConstraintSource>) -> Grammar {
        let mut root = ElementSource::global(
            q("root"),
            ContentSource::Children(Particle::choice(vec![
                Particle::element(q("item")),
                Particle::element(q("ref")),
            ])
            .zero_or_more()),
        );
        for ic in constraints {
            root = root.with_identity_constraint(ic);
        }
        GrammarBuilder::schema(None)
            .with_element(root)
            .with_element(
                ElementSource::global(q("item"), ContentSource::Empty)
                    .with_attribute(AttributeSource::new(
                        q("id"),
                        AttributeType::Simple(QName::namespaced(crate::namespaces::XSD_NAMESPACE, "decimal")),
                    )),
            )
            .with_element(
                ElementSource::global(q("ref"), ContentSource::Empty)
                    .with_attribute(AttributeSource::new(
                        q("to"),
                        AttributeType::Simple(QName::namespaced(crate::namespaces::XSD_NAMESPACE, "decimal")),
                    )),
            )
            .compile(&Limits::default())
            .unwrap()
    }

    /// Run a flat document `<root>` + children, each given as (name, attr, value).
    /// `@id` and `@to` are typed as decimals, like their declarations.
    fn run(grammar: &Grammar, children: &[(&str, &str, &str)]) -> Vec<ValidationError> {
        run_typed(grammar, children, &["id", "to"])
    }

    /// Like `run`, typing only the attributes named in `typed`
    fn run_typed(grammar: &Grammar, children: &[(&str, &str, &str)], typed: &[&str]) -> Vec<ValidationError> {
        let mut validator = IdentityConstraintValidator::new(grammar);
        let mut errors = Vec::new();
        let root = q("root");
        validator.start_element(grammar.global_element(&root), &MatchEvent::new(&root, &[]), "/root", &mut errors);
        for (i, (name, attr, value)) in children.iter().enumerate() {
            let name = q(name);
            let decimal = QName::namespaced(crate::namespaces::XSD_NAMESPACE, "decimal");
            let type_name = typed.contains(attr).then_some(decimal);
            let attributes = [MatchAttribute::new(q(attr), *value, type_name)];
            let path = format!("/root/{}[{}]", name.local_name, i + 1);
            validator.start_element(
                grammar.global_element(&name),
                &MatchEvent::new(&name, &attributes),
                &path,
                &mut errors,
            );
            validator.end_element(&mut errors);
        }
        validator.end_element(&mut errors);
        validator.end_document(&mut errors);
        assert_eq!(validator.depth(), 0);
        errors
    }

    #[test]
    fn test_unique_accepts_distinct_values() {
        let g = grammar(vec![IdentityConstraintSource::unique(q("u"), "item").with_field("@id")]);
        let errors = run(&g, &[("item", "id", "1"), ("item", "id", "2")]);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_unique_duplicate_reported_once() {
        let g = grammar(vec![IdentityConstraintSource::unique(q("u"), "item").with_field("@id")]);
        let errors = run(&g, &[("item", "id", "1"), ("item", "id", "1")]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::DuplicateKey);
        assert_eq!(errors[0].path.as_deref(), Some("/root/item[2]"));
    }

    #[test]
    fn test_typed_comparison() {
        let g = grammar(vec![IdentityConstraintSource::unique(q("u"), "item").with_field("@id")]);
        let errors = run(&g, &[("item", "id", "1.0"), ("item", "id", "1")]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::DuplicateKey);
    }

    #[test]
    fn test_key_missing_field() {
        let g = grammar(vec![IdentityConstraintSource::key(q("k"), "item").with_field("@code")]);
        let errors = run(&g, &[("item", "id", "1")]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::IncompleteKey);

        let g = grammar(vec![IdentityConstraintSource::unique(q("u"), "item").with_field("@code")]);
        assert!(run(&g, &[("item", "id", "1"), ("item", "id", "2")]).is_empty());
    }

    #[test]
    fn test_keyref_forward_reference() {
        let g = grammar(vec![
            IdentityConstraintSource::key(q("k"), "item").with_field("@id"),
            IdentityConstraintSource::keyref(q("r"), "ref", q("k")).with_field("@to"),
        ]);
        let errors = run(&g, &[("ref", "to", "2"), ("item", "id", "1"), ("item", "id", "2")]);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_keyref_compares_typed_values() {
        let g = grammar(vec![
            IdentityConstraintSource::key(q("k"), "item").with_field("@id"),
            IdentityConstraintSource::keyref(q("r"), "ref", q("k")).with_field("@to"),
        ]);
        let children = [("item", "id", "2"), ("ref", "to", "2.0")];
        assert!(run(&g, &children).is_empty());

        // A string never equals a decimal, even with the same lexical form
        let errors = run_typed(&g, &[("item", "id", "2"), ("ref", "to", "2")], &["id"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::DanglingKeyref);
    }

    #[test]
    fn test_keyref_dangling_reported_at_end() {
        let g = grammar(vec![
            IdentityConstraintSource::key(q("k"), "item").with_field("@id"),
            IdentityConstraintSource::keyref(q("r"), "ref", q("k")).with_field("@to"),
        ]);
        let mut validator = IdentityConstraintValidator::new(&g);
        let mut errors = Vec::new();
        let root = q("root");
        let reference = q("ref");
        let attributes = [MatchAttribute::new(q("to"), "9", None)];
        validator.start_element(g.global_element(&root), &MatchEvent::new(&root, &[]), "/root", &mut errors);
        validator.start_element(
            g.global_element(&reference),
            &MatchEvent::new(&reference, &attributes),
            "/root/ref[1]",
            &mut errors,
        );
        validator.end_element(&mut errors);
        validator.end_element(&mut errors);
        assert!(errors.is_empty());

        validator.end_document(&mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::DanglingKeyref);
        assert_eq!(errors[0].value.as_deref(), Some("9"));
    }

    #[test]
    fn test_field_multiple_match() {
        let g = grammar(vec![IdentityConstraintSource::unique(q("u"), ".").with_field("item/@id")]);
        let errors = run(&g, &[("item", "id", "1"), ("item", "id", "2")]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::FieldMultipleMatch);
    }

    #[test]
    fn test_clear_isolates_documents() {
        let g = grammar(vec![IdentityConstraintSource::unique(q("u"), "item").with_field("@id")]);
        let mut validator = IdentityConstraintValidator::new(&g);
        let mut errors = Vec::new();
        let root = q("root");
        validator.start_element(g.global_element(&root), &MatchEvent::new(&root, &[]), "/root", &mut errors);
        assert_eq!(validator.active_selectors(), 1);
        validator.clear();
        assert_eq!(validator.depth(), 0);
        assert_eq!(validator.active_selectors(), 0);
        assert!(run(&g, &[("item", "id", "1")]).is_empty());
    }
}
