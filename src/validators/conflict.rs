//! Particle ambiguity (Unique Particle Attribution)
//!
//! Decides whether two leaf terms reachable at the same content-model
//! position could both accept one input element. Used when compiling
//! content models (to reject ambiguous ones) and when resolving a child
//! against competing branches at runtime.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::namespaces::QName;

use super::particles::Leaf;
use super::wildcards::{NamespaceKey, Wildcard, WildcardKind};

/// Error signalled by a substitution-group comparator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("substitution comparator error: {0}")]
pub struct ComparatorError(pub String);

/// Answers substitution-group questions for the ambiguity check.
pub trait SubstitutionGroupComparator: fmt::Debug + Send + Sync {
    /// Check if `a` and `b` can stand for each other (one is in the other's
    /// substitution group)
    fn is_equivalent_to(&self, a: &QName, b: &QName) -> Result<bool, ComparatorError>;

    /// Check if `name`, or a member of its substitution group, is allowed by
    /// a wildcard with the given namespace key
    fn is_allowed_by_wildcard(
        &self,
        name: &QName,
        namespace: &NamespaceKey,
        is_other: bool,
    ) -> Result<bool, ComparatorError>;
}

/// Substitution groups declared in a grammar: head -> direct members
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionGroups {
    members: HashMap<QName, Vec<QName>>,
}

impl SubstitutionGroups {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `member` as substitutable for `head`
    pub fn add(&mut self, head: QName, member: QName) {
        let members = self.members.entry(head).or_default();
        if !members.contains(&member) {
            members.push(member);
        }
    }

    /// Check if no group is declared
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Transitive members of a head's substitution group (head excluded)
    pub fn substitutes(&self, head: &QName) -> Vec<&QName> {
        let mut seen: HashSet<&QName> = HashSet::new();
        let mut pending = vec![head];
        let mut result = Vec::new();
        while let Some(current) = pending.pop() {
            if let Some(members) = self.members.get(current) {
                for member in members {
                    if member != head && seen.insert(member) {
                        result.push(member);
                        pending.push(member);
                    }
                }
            }
        }
        result
    }

    /// Check if `name` may appear where `head` is expected
    pub fn can_substitute(&self, head: &QName, name: &QName) -> bool {
        head == name || self.substitutes(head).into_iter().any(|m| m == name)
    }
}

impl SubstitutionGroupComparator for SubstitutionGroups {
    fn is_equivalent_to(&self, a: &QName, b: &QName) -> Result<bool, ComparatorError> {
        Ok(self.can_substitute(a, b) || self.can_substitute(b, a))
    }

    fn is_allowed_by_wildcard(
        &self,
        name: &QName,
        namespace: &NamespaceKey,
        is_other: bool,
    ) -> Result<bool, ComparatorError> {
        let allowed = |candidate: &QName| {
            let same = candidate.namespace() == namespace.as_deref();
            if is_other {
                !same
            } else {
                same
            }
        };
        Ok(allowed(name) || self.substitutes(name).into_iter().any(allowed))
    }
}

/// Check if two leaf terms can ambiguously match the same element.
///
/// The relation is symmetric. A comparator error counts as "no match".
pub fn conflict(
    a: &Leaf,
    b: &Leaf,
    comparator: Option<&dyn SubstitutionGroupComparator>,
) -> bool {
    match (a, b) {
        (Leaf::Element(x), Leaf::Element(y)) => {
            if x == y {
                return true;
            }
            match comparator {
                Some(cmp) => ask(cmp.is_equivalent_to(x, y)) || ask(cmp.is_equivalent_to(y, x)),
                None => false,
            }
        }
        (Leaf::Element(name), Leaf::Wildcard(wildcard))
        | (Leaf::Wildcard(wildcard), Leaf::Element(name)) => {
            element_in_wildcard(name, wildcard, comparator)
        }
        (Leaf::Wildcard(x), Leaf::Wildcard(y)) => wildcards_overlap(&x.kind, &y.kind),
    }
}

fn element_in_wildcard(
    name: &QName,
    wildcard: &Wildcard,
    comparator: Option<&dyn SubstitutionGroupComparator>,
) -> bool {
    match &wildcard.kind {
        WildcardKind::Any => true,
        WildcardKind::AnyNamespace(ns) => {
            name.namespace() == ns.as_deref()
                || comparator.is_some_and(|cmp| ask(cmp.is_allowed_by_wildcard(name, ns, false)))
        }
        WildcardKind::AnyOther(ns) => name.namespace() != ns.as_deref(),
    }
}

/// Two `##other` wildcards always overlap, whatever namespaces they exclude.
fn wildcards_overlap(x: &WildcardKind, y: &WildcardKind) -> bool {
    match (x, y) {
        (WildcardKind::Any, _) | (_, WildcardKind::Any) => true,
        (WildcardKind::AnyNamespace(a), WildcardKind::AnyNamespace(b)) => a == b,
        (WildcardKind::AnyOther(_), WildcardKind::AnyOther(_)) => true,
        (WildcardKind::AnyNamespace(a), WildcardKind::AnyOther(b))
        | (WildcardKind::AnyOther(b), WildcardKind::AnyNamespace(a)) => a != b,
    }
}

fn ask(answer: Result<bool, ComparatorError>) -> bool {
    match answer {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("{}; treating as no match", err);
            false
        }
    }
}
