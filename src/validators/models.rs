//! Compiled content models
//!
//! This module provides the runtime form of content models:
//! - `Dfa` for element-only (`children`) models
//! - `AllModel` for `all` groups (unordered, counted)
//! - `MixedModel` for mixed content (presence only)
//!
//! A model is immutable and shared by all validation sessions; the
//! per-element position lives in a [`ContentState`] owned by the session.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#cvc-model-group

use crate::namespaces::QName;

use super::arena::ElementIndex;
use super::conflict::SubstitutionGroupComparator;
use super::particles::{Leaf, Occurs};
use super::wildcards::ProcessContents;

/// A model term bound to its element declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Term
    pub leaf: Leaf,
    /// Declaration of the element term, once resolved
    pub decl: Option<ElementIndex>,
}

impl Symbol {
    /// Create an unbound symbol
    pub fn new(leaf: Leaf) -> Self {
        Self { leaf, decl: None }
    }

    /// Rank of a match: exact name, substitution, wildcard
    fn rank(&self, name: &QName, comparator: Option<&dyn SubstitutionGroupComparator>) -> Option<u8> {
        match &self.leaf {
            Leaf::Element(qname) if qname == name => Some(0),
            Leaf::Element(head) => {
                let substitutable = comparator.is_some_and(|cmp| {
                    cmp.is_equivalent_to(head, name).unwrap_or_else(|err| {
                        tracing::warn!("{}; treating as no match", err);
                        false
                    })
                });
                substitutable.then_some(1)
            }
            Leaf::Wildcard(wildcard) => wildcard.allows(name).then_some(2),
        }
    }

    fn matched(&self) -> ChildMatch {
        match &self.leaf {
            Leaf::Element(_) => ChildMatch::Matched {
                decl: self.decl,
                wildcard: None,
            },
            Leaf::Wildcard(wildcard) => ChildMatch::Matched {
                decl: None,
                wildcard: Some(wildcard.process_contents),
            },
        }
    }
}

/// Pick the best-ranked candidate for a child name
fn best_match<'a, I>(
    candidates: I,
    name: &QName,
    comparator: Option<&dyn SubstitutionGroupComparator>,
) -> Option<usize>
where
    I: Iterator<Item = (usize, &'a Symbol)>,
{
    candidates
        .filter_map(|(i, symbol)| symbol.rank(name, comparator).map(|rank| (rank, i)))
        .min()
        .map(|(_, i)| i)
}

/// Outcome of offering a child element to a content model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildMatch {
    /// The child is accepted
    Matched {
        /// Declaration bound to the matching element term
        decl: Option<ElementIndex>,
        /// Process contents when a wildcard matched
        wildcard: Option<ProcessContents>,
    },
    /// The child is not allowed at this position
    Unexpected {
        /// Terms that would have been accepted
        expected: Vec<String>,
    },
    /// The model admits no children at all
    NotAllowed,
}

/// State of a deterministic automaton
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DfaState {
    transitions: Vec<(usize, usize)>,
    accepting: bool,
}

impl DfaState {
    /// Create a state from `(symbol, target)` transitions
    pub fn new(transitions: Vec<(usize, usize)>, accepting: bool) -> Self {
        Self {
            transitions,
            accepting,
        }
    }

    /// Outgoing `(symbol, target)` transitions
    pub fn transitions(&self) -> &[(usize, usize)] {
        &self.transitions
    }

    /// Check if content may end in this state
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }
}

/// Deterministic automaton of an element-only content model.
///
/// State 0 is the state before the first child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa {
    symbols: Vec<Symbol>,
    states: Vec<DfaState>,
}

impl Dfa {
    /// Create an automaton over `symbols`
    pub fn new(symbols: Vec<Leaf>, states: Vec<DfaState>) -> Self {
        Self {
            symbols: symbols.into_iter().map(Symbol::new).collect(),
            states,
        }
    }

    /// Symbols of the automaton
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Number of states
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Check if content may end in `state`
    pub fn is_accepting(&self, state: usize) -> bool {
        self.states.get(state).is_some_and(DfaState::is_accepting)
    }

    /// Follow the transition for a child name
    pub fn step(
        &self,
        state: usize,
        name: &QName,
        comparator: Option<&dyn SubstitutionGroupComparator>,
    ) -> Option<(usize, &Symbol)> {
        let transitions = self.states.get(state)?.transitions();
        let candidates = transitions
            .iter()
            .enumerate()
            .map(|(i, (symbol, _))| (i, &self.symbols[*symbol]));
        let chosen = best_match(candidates, name, comparator)?;
        let (symbol, target) = transitions[chosen];
        tracing::trace!(state, target, child = %name, "content model transition");
        Some((target, &self.symbols[symbol]))
    }

    /// Terms accepted in `state`
    pub fn expected(&self, state: usize) -> Vec<String> {
        self.states
            .get(state)
            .map(|s| {
                s.transitions()
                    .iter()
                    .map(|(symbol, _)| self.symbols[*symbol].leaf.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bind element symbols to declarations
    pub fn bind(&mut self, mut resolve: impl FnMut(&QName) -> Option<ElementIndex>) {
        bind_symbols(&mut self.symbols, &mut resolve);
    }
}

fn bind_symbols(
    symbols: &mut [Symbol],
    resolve: &mut dyn FnMut(&QName) -> Option<ElementIndex>,
) {
    for symbol in symbols {
        if let Leaf::Element(name) = &symbol.leaf {
            symbol.decl = resolve(name);
        }
    }
}

/// One member of an `all` group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllMember {
    /// Term and declaration
    pub symbol: Symbol,
    /// Occurrence bounds (basic combinations only)
    pub occurs: Occurs,
}

/// Runtime model of an `all` group: members in any order, each counted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllModel {
    members: Vec<AllMember>,
    emptiable: bool,
}

impl AllModel {
    /// Create an all model; `emptiable` when the group itself is optional
    pub fn new(members: Vec<(Leaf, Occurs)>, emptiable: bool) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|(leaf, occurs)| AllMember {
                    symbol: Symbol::new(leaf),
                    occurs,
                })
                .collect(),
            emptiable,
        }
    }

    /// Members in declaration order
    pub fn members(&self) -> &[AllMember] {
        &self.members
    }

    /// Check if the whole group may be absent
    pub fn is_emptiable(&self) -> bool {
        self.emptiable
    }

    /// Bind element members to declarations
    pub fn bind(&mut self, mut resolve: impl FnMut(&QName) -> Option<ElementIndex>) {
        for member in &mut self.members {
            if let Leaf::Element(name) = &member.symbol.leaf {
                member.symbol.decl = resolve(name);
            }
        }
    }
}

/// Runtime model of mixed content: the allowed child terms
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MixedModel {
    symbols: Vec<Symbol>,
}

impl MixedModel {
    /// Create a mixed model over `leaves`
    pub fn new(leaves: Vec<Leaf>) -> Self {
        let mut symbols: Vec<Symbol> = Vec::new();
        for leaf in leaves {
            if !symbols.iter().any(|s| s.leaf == leaf) {
                symbols.push(Symbol::new(leaf));
            }
        }
        Self { symbols }
    }

    /// Allowed terms
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Bind element terms to declarations
    pub fn bind(&mut self, mut resolve: impl FnMut(&QName) -> Option<ElementIndex>) {
        bind_symbols(&mut self.symbols, &mut resolve);
    }
}

/// Compiled content model of an element declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentModel {
    /// No children
    Empty,
    /// Anything
    Any,
    /// Text and children from a set, in any order and number
    Mixed(MixedModel),
    /// Element-only content driven by an automaton
    Children(Dfa),
    /// Element-only `all` group
    All(AllModel),
    /// Character data checked against a simple type
    Simple,
}

/// Session-local position within a content model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentState {
    /// Position in an empty model (children counted)
    Empty {
        /// Children reported so far
        children: u32,
    },
    /// No tracking
    Any,
    /// No tracking
    Mixed,
    /// Current automaton state
    Children {
        /// State number
        state: usize,
    },
    /// Occurrence count per member
    All {
        /// Counts in member order
        counts: Vec<u32>,
    },
    /// Simple content
    Simple,
}

impl ContentModel {
    /// Initial state: before the first child
    pub fn start(&self) -> ContentState {
        match self {
            ContentModel::Empty => ContentState::Empty { children: 0 },
            ContentModel::Any => ContentState::Any,
            ContentModel::Mixed(_) => ContentState::Mixed,
            ContentModel::Children(_) => ContentState::Children { state: 0 },
            ContentModel::All(all) => ContentState::All {
                counts: vec![0; all.members.len()],
            },
            ContentModel::Simple => ContentState::Simple,
        }
    }

    /// Check if character data other than whitespace is allowed
    pub fn allows_text(&self) -> bool {
        matches!(
            self,
            ContentModel::Any | ContentModel::Mixed(_) | ContentModel::Simple
        )
    }

    /// Offer a child element; the state only advances on a match
    pub fn accept_child(
        &self,
        state: &mut ContentState,
        name: &QName,
        comparator: Option<&dyn SubstitutionGroupComparator>,
    ) -> ChildMatch {
        match (self, state) {
            (ContentModel::Empty, ContentState::Empty { children }) => {
                *children += 1;
                ChildMatch::NotAllowed
            }
            (ContentModel::Simple, _) => ChildMatch::NotAllowed,
            (ContentModel::Any, _) => ChildMatch::Matched {
                decl: None,
                wildcard: Some(ProcessContents::Lax),
            },
            (ContentModel::Mixed(mixed), _) => {
                match best_match(mixed.symbols.iter().enumerate(), name, comparator) {
                    Some(i) => mixed.symbols[i].matched(),
                    None => ChildMatch::Unexpected {
                        expected: mixed.symbols.iter().map(|s| s.leaf.to_string()).collect(),
                    },
                }
            }
            (ContentModel::Children(dfa), ContentState::Children { state }) => {
                match dfa.step(*state, name, comparator) {
                    Some((target, symbol)) => {
                        *state = target;
                        symbol.matched()
                    }
                    None => ChildMatch::Unexpected {
                        expected: dfa.expected(*state),
                    },
                }
            }
            (ContentModel::All(all), ContentState::All { counts }) => {
                let open = all
                    .members
                    .iter()
                    .enumerate()
                    .filter(|(i, m)| !m.occurs.is_over(counts[*i]))
                    .map(|(i, m)| (i, &m.symbol));
                match best_match(open, name, comparator) {
                    Some(i) => {
                        counts[i] += 1;
                        all.members[i].symbol.matched()
                    }
                    None => ChildMatch::Unexpected {
                        expected: all
                            .members
                            .iter()
                            .enumerate()
                            .filter(|(i, m)| !m.occurs.is_over(counts[*i]))
                            .map(|(_, m)| m.symbol.leaf.to_string())
                            .collect(),
                    },
                }
            }
            (_, state) => {
                tracing::warn!(?state, "content state does not belong to its model");
                ChildMatch::NotAllowed
            }
        }
    }

    /// Check the end of content; on failure returns the terms still required
    pub fn finish(&self, state: &ContentState) -> Result<(), Vec<String>> {
        match (self, state) {
            (ContentModel::Children(dfa), ContentState::Children { state }) => {
                if dfa.is_accepting(*state) {
                    Ok(())
                } else {
                    Err(dfa.expected(*state))
                }
            }
            (ContentModel::All(all), ContentState::All { counts }) => {
                if all.emptiable && counts.iter().all(|c| *c == 0) {
                    return Ok(());
                }
                let missing: Vec<String> = all
                    .members
                    .iter()
                    .zip(counts)
                    .filter(|(m, c)| m.occurs.is_missing(**c))
                    .map(|(m, _)| m.symbol.leaf.to_string())
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(missing)
                }
            }
            _ => Ok(()),
        }
    }

    /// Bind element terms to declarations
    pub fn bind(&mut self, resolve: impl FnMut(&QName) -> Option<ElementIndex>) {
        match self {
            ContentModel::Mixed(mixed) => mixed.bind(resolve),
            ContentModel::Children(dfa) => dfa.bind(resolve),
            ContentModel::All(all) => all.bind(resolve),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::arena::ArenaIndex;
    use crate::validators::conflict::SubstitutionGroups;
    use crate::validators::wildcards::Wildcard;

    fn el(name: &str) -> Leaf {
        Leaf::Element(QName::local(name))
    }

    fn q(name: &str) -> QName {
        QName::local(name)
    }

    /// a b* as a hand-built automaton
    fn a_then_bs() -> Dfa {
        Dfa::new(
            vec![el("a"), el("b")],
            vec![
                DfaState::new(vec![(0, 1)], false),
                DfaState::new(vec![(1, 1)], true),
            ],
        )
    }

    #[test]
    fn test_dfa_steps() {
        let model = ContentModel::Children(a_then_bs());
        let mut state = model.start();
        assert!(model.finish(&state).is_err());
        assert!(matches!(
            model.accept_child(&mut state, &q("a"), None),
            ChildMatch::Matched { .. }
        ));
        assert!(model.finish(&state).is_ok());
        assert!(matches!(
            model.accept_child(&mut state, &q("b"), None),
            ChildMatch::Matched { .. }
        ));
        assert_eq!(
            model.accept_child(&mut state, &q("a"), None),
            ChildMatch::Unexpected {
                expected: vec!["b".to_string()]
            }
        );
        // Rejected child leaves the position unchanged
        assert_eq!(state, ContentState::Children { state: 1 });
    }

    #[test]
    fn test_dfa_substitution() {
        let mut groups = SubstitutionGroups::new();
        groups.add(q("a"), q("a2"));
        let dfa = a_then_bs();
        assert!(dfa.step(0, &q("a2"), Some(&groups)).is_some());
        assert!(dfa.step(0, &q("a2"), None).is_none());
    }

    #[test]
    fn test_bind_declarations() {
        let mut model = ContentModel::Children(a_then_bs());
        model.bind(|name| (name.local_name == "a").then(|| ElementIndex::from_raw(3)));
        let mut state = model.start();
        assert_eq!(
            model.accept_child(&mut state, &q("a"), None),
            ChildMatch::Matched {
                decl: Some(ElementIndex::from_raw(3)),
                wildcard: None
            }
        );
    }

    #[test]
    fn test_all_model_any_order_once() {
        let model = ContentModel::All(AllModel::new(
            vec![(el("a"), Occurs::once()), (el("b"), Occurs::optional())],
            false,
        ));
        let mut state = model.start();
        assert!(matches!(model.accept_child(&mut state, &q("b"), None), ChildMatch::Matched { .. }));
        assert_eq!(model.finish(&state), Err(vec!["a".to_string()]));
        assert!(matches!(model.accept_child(&mut state, &q("a"), None), ChildMatch::Matched { .. }));
        assert!(matches!(
            model.accept_child(&mut state, &q("a"), None),
            ChildMatch::Unexpected { .. }
        ));
        assert!(model.finish(&state).is_ok());
    }

    #[test]
    fn test_all_model_emptiable_group() {
        let model = ContentModel::All(AllModel::new(vec![(el("a"), Occurs::once())], true));
        assert!(model.finish(&model.start()).is_ok());
    }

    #[test]
    fn test_mixed_presence_only() {
        let model = ContentModel::Mixed(MixedModel::new(vec![el("x"), el("y"), el("x")]));
        let mut state = model.start();
        for name in ["y", "x", "x", "y"] {
            assert!(matches!(
                model.accept_child(&mut state, &q(name), None),
                ChildMatch::Matched { .. }
            ));
        }
        assert!(matches!(
            model.accept_child(&mut state, &q("z"), None),
            ChildMatch::Unexpected { .. }
        ));
        assert!(model.allows_text());
        assert!(model.finish(&state).is_ok());
    }

    #[test]
    fn test_empty_and_any() {
        let empty = ContentModel::Empty;
        let mut state = empty.start();
        assert_eq!(empty.accept_child(&mut state, &q("a"), None), ChildMatch::NotAllowed);
        assert_eq!(state, ContentState::Empty { children: 1 });
        assert!(!empty.allows_text());

        let any = ContentModel::Any;
        let mut state = any.start();
        assert!(matches!(any.accept_child(&mut state, &q("a"), None), ChildMatch::Matched { .. }));
    }

    #[test]
    fn test_exact_element_preferred_over_wildcard() {
        let dfa = Dfa::new(
            vec![Leaf::Wildcard(Wildcard::other(Some("urn:t"))), el("a")],
            vec![
                DfaState::new(vec![(0, 1), (1, 2)], false),
                DfaState::new(vec![], true),
                DfaState::new(vec![], true),
            ],
        );
        let (target, symbol) = dfa.step(0, &q("a"), None).unwrap();
        assert_eq!(target, 2);
        assert_eq!(symbol.leaf, el("a"));
    }
}
