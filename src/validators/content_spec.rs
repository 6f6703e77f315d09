//! Content-spec node table
//!
//! Content models are lowered into a binary tree of [`ContentSpecNode`]s
//! stored in a [`ChunkedArena`]. Nodes link to their children by index, so
//! the table can be moved and shared without fixing up references.

use std::fmt::Write;

use crate::error::Result;
use crate::namespaces::QName;

use super::arena::{ChunkedArena, ContentSpecIndex};
use super::particles::Leaf;
use super::wildcards::{NamespaceKey, ProcessContents, Wildcard, WildcardKind};

/// Identifier of the source particle a leaf node was lowered from.
///
/// Copies produced by occurrence expansion share the id of their source.
pub type ParticleId = u32;

/// Node of a lowered content model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSpecNode {
    /// Element reference
    Leaf {
        /// Element name
        name: QName,
        /// Source particle
        particle: ParticleId,
    },
    /// `##any` wildcard
    Any {
        /// Process contents mode
        process_contents: ProcessContents,
        /// Source particle
        particle: ParticleId,
    },
    /// Wildcard excluding one namespace
    AnyOther {
        /// Excluded namespace
        namespace: NamespaceKey,
        /// Process contents mode
        process_contents: ProcessContents,
        /// Source particle
        particle: ParticleId,
    },
    /// Wildcard for one namespace
    AnyNamespace {
        /// Allowed namespace
        namespace: NamespaceKey,
        /// Process contents mode
        process_contents: ProcessContents,
        /// Source particle
        particle: ParticleId,
    },
    /// Either child
    Choice(ContentSpecIndex, ContentSpecIndex),
    /// First child then second child
    Sequence(ContentSpecIndex, ContentSpecIndex),
    /// Child zero or one time
    ZeroOrOne(ContentSpecIndex),
    /// Child any number of times
    ZeroOrMore(ContentSpecIndex),
    /// Child at least once
    OneOrMore(ContentSpecIndex),
    /// Matches only the empty sequence
    Empty,
}

impl ContentSpecNode {
    /// Build a leaf node for a term
    pub fn from_leaf(leaf: &Leaf, particle: ParticleId) -> Self {
        match leaf {
            Leaf::Element(name) => ContentSpecNode::Leaf {
                name: name.clone(),
                particle,
            },
            Leaf::Wildcard(wildcard) => {
                let process_contents = wildcard.process_contents;
                match &wildcard.kind {
                    WildcardKind::Any => ContentSpecNode::Any {
                        process_contents,
                        particle,
                    },
                    WildcardKind::AnyOther(ns) => ContentSpecNode::AnyOther {
                        namespace: ns.clone(),
                        process_contents,
                        particle,
                    },
                    WildcardKind::AnyNamespace(ns) => ContentSpecNode::AnyNamespace {
                        namespace: ns.clone(),
                        process_contents,
                        particle,
                    },
                }
            }
        }
    }

    /// Term and particle id of a leaf or wildcard node
    pub fn leaf(&self) -> Option<(Leaf, ParticleId)> {
        let wildcard = |kind, process_contents| {
            Leaf::Wildcard(Wildcard::new(kind).with_process_contents(process_contents))
        };
        match self {
            ContentSpecNode::Leaf { name, particle } => Some((Leaf::Element(name.clone()), *particle)),
            ContentSpecNode::Any {
                process_contents,
                particle,
            } => Some((wildcard(WildcardKind::Any, *process_contents), *particle)),
            ContentSpecNode::AnyOther {
                namespace,
                process_contents,
                particle,
            } => Some((
                wildcard(WildcardKind::AnyOther(namespace.clone()), *process_contents),
                *particle,
            )),
            ContentSpecNode::AnyNamespace {
                namespace,
                process_contents,
                particle,
            } => Some((
                wildcard(WildcardKind::AnyNamespace(namespace.clone()), *process_contents),
                *particle,
            )),
            _ => None,
        }
    }
}

/// Arena of content-spec nodes shared by all content models of a grammar
#[derive(Debug, Clone, Default)]
pub struct ContentSpecTable {
    nodes: ChunkedArena<ContentSpecIndex, ContentSpecNode>,
}

impl ContentSpecTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node
    pub fn add(&mut self, node: ContentSpecNode) -> Result<ContentSpecIndex> {
        self.nodes.push(node)
    }

    /// Get a node
    pub fn get(&self, index: ContentSpecIndex) -> Option<&ContentSpecNode> {
        self.nodes.get(index)
    }

    /// Get a node, treating a dangling index as an internal error
    pub fn require(&self, index: ContentSpecIndex) -> Result<&ContentSpecNode> {
        self.nodes.require(index)
    }

    /// Render the subtree rooted at `root` as an occurrence string,
    /// e.g. `(a,b?,c*)`
    pub fn render(&self, root: ContentSpecIndex) -> Result<String> {
        let mut out = String::new();
        self.render_node(root, &mut out)?;
        if !out.starts_with('(') {
            out = format!("({})", out);
        }
        Ok(out)
    }

    fn render_node(&self, index: ContentSpecIndex, out: &mut String) -> Result<()> {
        let node = self.require(index)?;
        match node {
            ContentSpecNode::Choice(..) | ContentSpecNode::Sequence(..) => {
                let separator = if matches!(node, ContentSpecNode::Choice(..)) {
                    '|'
                } else {
                    ','
                };
                let mut members = Vec::new();
                self.flatten(index, node, &mut members)?;
                out.push('(');
                for (i, member) in members.into_iter().enumerate() {
                    if i > 0 {
                        out.push(separator);
                    }
                    self.render_node(member, out)?;
                }
                out.push(')');
            }
            ContentSpecNode::ZeroOrOne(child) => self.render_repeat(*child, '?', out)?,
            ContentSpecNode::ZeroOrMore(child) => self.render_repeat(*child, '*', out)?,
            ContentSpecNode::OneOrMore(child) => self.render_repeat(*child, '+', out)?,
            ContentSpecNode::Empty => out.push_str("EMPTY"),
            leaf => {
                if let Some((term, _)) = leaf.leaf() {
                    let _ = write!(out, "{}", term);
                }
            }
        }
        Ok(())
    }

    fn render_repeat(&self, child: ContentSpecIndex, op: char, out: &mut String) -> Result<()> {
        match self.require(child)? {
            ContentSpecNode::ZeroOrOne(_)
            | ContentSpecNode::ZeroOrMore(_)
            | ContentSpecNode::OneOrMore(_) => {
                out.push('(');
                self.render_node(child, out)?;
                out.push(')');
            }
            _ => self.render_node(child, out)?,
        }
        out.push(op);
        Ok(())
    }

    /// Collect the operands of a chain of same-kind binary nodes
    fn flatten(
        &self,
        index: ContentSpecIndex,
        kind: &ContentSpecNode,
        members: &mut Vec<ContentSpecIndex>,
    ) -> Result<()> {
        let mut pending = vec![index];
        while let Some(current) = pending.pop() {
            let node = self.require(current)?;
            match (node, kind) {
                (ContentSpecNode::Choice(a, b), ContentSpecNode::Choice(..))
                | (ContentSpecNode::Sequence(a, b), ContentSpecNode::Sequence(..)) => {
                    pending.push(*b);
                    pending.push(*a);
                }
                _ => members.push(current),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(table: &mut ContentSpecTable, name: &str, particle: ParticleId) -> ContentSpecIndex {
        table
            .add(ContentSpecNode::Leaf {
                name: QName::local(name),
                particle,
            })
            .unwrap()
    }

    #[test]
    fn test_render_sequence_with_repeats() {
        let mut table = ContentSpecTable::new();
        let a = leaf(&mut table, "a", 0);
        let b = leaf(&mut table, "b", 1);
        let b_opt = table.add(ContentSpecNode::ZeroOrOne(b)).unwrap();
        let c = leaf(&mut table, "c", 2);
        let c_star = table.add(ContentSpecNode::ZeroOrMore(c)).unwrap();
        let ab = table.add(ContentSpecNode::Sequence(a, b_opt)).unwrap();
        let abc = table.add(ContentSpecNode::Sequence(ab, c_star)).unwrap();

        assert_eq!(table.render(abc).unwrap(), "(a,b?,c*)");
        assert_eq!(table.len(), 7);
    }

    #[test]
    fn test_render_choice_and_single_leaf() {
        let mut table = ContentSpecTable::new();
        let a = leaf(&mut table, "a", 0);
        let b = leaf(&mut table, "b", 1);
        let choice = table.add(ContentSpecNode::Choice(a, b)).unwrap();
        let plus = table.add(ContentSpecNode::OneOrMore(choice)).unwrap();

        assert_eq!(table.render(plus).unwrap(), "(a|b)+");
        assert_eq!(table.render(a).unwrap(), "(a)");
    }

    #[test]
    fn test_wildcard_nodes_round_trip_to_leaves() {
        let wildcard = Wildcard::other(Some("urn:x")).with_process_contents(ProcessContents::Lax);
        let node = ContentSpecNode::from_leaf(&Leaf::Wildcard(wildcard.clone()), 4);
        assert!(matches!(node, ContentSpecNode::AnyOther { .. }));
        assert_eq!(node.leaf(), Some((Leaf::Wildcard(wildcard), 4)));
        assert_eq!(ContentSpecNode::Empty.leaf(), None);
    }

    #[test]
    fn test_dangling_index_is_internal_error() {
        let table = ContentSpecTable::new();
        let mut other = ContentSpecTable::new();
        let index = leaf(&mut other, "a", 0);
        assert!(table.render(index).is_err());
    }
}
