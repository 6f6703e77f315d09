//! Content-model compilation
//!
//! Lowers declared content models into the content-spec table and builds
//! their runtime form:
//! - particles with numeric occurrence ranges are expanded into nested
//!   optional copies (`a{2,4}` becomes `a,a,(a,(a)?)?`)
//! - a position automaton is built from the tree (first/last/follow sets)
//!   and subset-constructed into a [`Dfa`]
//! - every automaton state is checked for Unique Particle Attribution
//! - `all` groups compile to an [`AllModel`]
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#cos-nonambig

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;

use crate::error::{CompileError, CompileErrorKind, Error, Result};
use crate::limits::Limits;

use super::arena::ContentSpecIndex;
use super::conflict::{conflict, SubstitutionGroupComparator};
use super::content_spec::{ContentSpecNode, ContentSpecTable, ParticleId};
use super::elements::{ContentCategory, ContentSource};
use super::models::{AllModel, ContentModel, Dfa, DfaState, MixedModel};
use super::particles::{Compositor, Leaf, Occurs, Particle, Term};

fn compile_error(kind: CompileErrorKind, message: impl Into<String>) -> Error {
    Error::Compile(CompileError::new(kind, message).into())
}

/// Limit violations are reported as compile errors of the grammar
fn limit_error(err: Error) -> Error {
    match err {
        Error::LimitExceeded(message) => compile_error(CompileErrorKind::LimitExceeded, message),
        other => other,
    }
}

/// Compiled content of an element declaration
#[derive(Debug, Clone)]
pub struct CompiledContent {
    /// Content category
    pub category: ContentCategory,
    /// Runtime model
    pub model: ContentModel,
    /// Root of the lowered tree, when the model was lowered
    pub spec: Option<ContentSpecIndex>,
}

/// First/last sets and nullability of a subtree
#[derive(Debug, Default)]
struct Facts {
    nullable: bool,
    first: BTreeSet<usize>,
    last: BTreeSet<usize>,
}

/// Compiles content sources into runtime models
pub struct ContentSpecCompiler<'a> {
    table: &'a mut ContentSpecTable,
    limits: &'a Limits,
    comparator: Option<&'a dyn SubstitutionGroupComparator>,
    next_particle: ParticleId,
}

impl<'a> ContentSpecCompiler<'a> {
    /// Create a compiler writing into `table`
    pub fn new(table: &'a mut ContentSpecTable, limits: &'a Limits) -> Self {
        Self {
            table,
            limits,
            comparator: None,
            next_particle: 0,
        }
    }

    /// Use a substitution-group comparator for the ambiguity check
    pub fn with_comparator(mut self, comparator: &'a dyn SubstitutionGroupComparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Compile a content source
    pub fn compile(&mut self, source: &ContentSource) -> Result<CompiledContent> {
        let compiled = match source {
            ContentSource::Empty => CompiledContent {
                category: ContentCategory::Empty,
                model: ContentModel::Empty,
                spec: None,
            },
            ContentSource::Any => CompiledContent {
                category: ContentCategory::Any,
                model: ContentModel::Any,
                spec: None,
            },
            ContentSource::Simple(_) => CompiledContent {
                category: ContentCategory::Simple,
                model: ContentModel::Simple,
                spec: None,
            },
            ContentSource::MixedSimple(names) => {
                let mut leaves: Vec<Leaf> = Vec::with_capacity(names.len());
                for name in names {
                    let leaf = Leaf::Element(name.clone());
                    if leaves.contains(&leaf) {
                        return Err(compile_error(
                            CompileErrorKind::DuplicateElement,
                            format!("'{}' appears more than once in mixed content", name),
                        ));
                    }
                    leaves.push(leaf);
                }
                CompiledContent {
                    category: ContentCategory::MixedSimple,
                    model: ContentModel::Mixed(MixedModel::new(leaves)),
                    spec: None,
                }
            }
            ContentSource::MixedComplex(None) => CompiledContent {
                category: ContentCategory::MixedComplex,
                model: ContentModel::Mixed(MixedModel::default()),
                spec: None,
            },
            ContentSource::MixedComplex(Some(particle)) => {
                let spec = if is_all_group(particle) {
                    self.compile_all(particle)?;
                    None
                } else {
                    let root = self.lower_root(particle)?;
                    self.build_dfa(root)?;
                    Some(root)
                };
                let mut leaves = Vec::new();
                collect_leaves(particle, &mut leaves);
                CompiledContent {
                    category: ContentCategory::MixedComplex,
                    model: ContentModel::Mixed(MixedModel::new(leaves)),
                    spec,
                }
            }
            ContentSource::Children(particle) => {
                if is_all_group(particle) {
                    CompiledContent {
                        category: ContentCategory::Children,
                        model: ContentModel::All(self.compile_all(particle)?),
                        spec: None,
                    }
                } else {
                    let root = self.lower_root(particle)?;
                    let dfa = self.build_dfa(root)?;
                    CompiledContent {
                        category: ContentCategory::Children,
                        model: ContentModel::Children(dfa),
                        spec: Some(root),
                    }
                }
            }
        };
        Ok(compiled)
    }

    fn lower_root(&mut self, particle: &Particle) -> Result<ContentSpecIndex> {
        let root = self.lower(particle)?;
        self.limits
            .check_content_spec_nodes(self.table.len())
            .map_err(limit_error)?;
        Ok(root)
    }

    fn add(&mut self, node: ContentSpecNode) -> Result<ContentSpecIndex> {
        self.table.add(node)
    }

    /// Lower a particle into the content-spec table.
    ///
    /// Groups are lowered with an explicit stack: a group is revisited
    /// after its children, whose nodes are then the top entries of
    /// `lowered`. Leaves are numbered in document order.
    pub fn lower(&mut self, particle: &Particle) -> Result<ContentSpecIndex> {
        let mut stack = vec![(particle, false)];
        let mut lowered: Vec<ContentSpecIndex> = Vec::new();

        while let Some((current, expanded)) = stack.pop() {
            if !expanded {
                current.occurs.check().map_err(|e| Error::Compile(e.into()))?;
                if current.occurs.is_empty() {
                    lowered.push(self.add(ContentSpecNode::Empty)?);
                    continue;
                }
                match &current.term {
                    Term::Leaf(leaf) => {
                        let id = self.next_particle;
                        self.next_particle += 1;
                        let node = self.add(ContentSpecNode::from_leaf(leaf, id))?;
                        lowered.push(self.apply_occurs(node, current.occurs)?);
                    }
                    Term::Group(group) => {
                        if group.compositor == Compositor::All {
                            return Err(compile_error(
                                CompileErrorKind::MisplacedAllGroup,
                                "an all group must be the only top-level particle of a content model",
                            ));
                        }
                        stack.push((current, true));
                        stack.extend(group.particles.iter().rev().map(|child| (child, false)));
                    }
                }
                continue;
            }

            let Term::Group(group) = &current.term else {
                return Err(Error::Internal("only groups are revisited".to_string()));
            };
            let split = lowered
                .len()
                .checked_sub(group.particles.len())
                .ok_or_else(|| Error::Internal("group children were not lowered".to_string()))?;
            let mut children = lowered.split_off(split).into_iter();
            let term = match children.next() {
                None => self.add(ContentSpecNode::Empty)?,
                Some(first) => {
                    let mut acc = first;
                    for child in children {
                        acc = self.add(match group.compositor {
                            Compositor::Choice => ContentSpecNode::Choice(acc, child),
                            _ => ContentSpecNode::Sequence(acc, child),
                        })?;
                    }
                    acc
                }
            };
            lowered.push(self.apply_occurs(term, current.occurs)?);
        }

        pop_node(&mut lowered)
    }

    fn apply_occurs(&mut self, node: ContentSpecIndex, occurs: Occurs) -> Result<ContentSpecIndex> {
        match (occurs.min, occurs.max) {
            (1, Some(1)) => Ok(node),
            (0, Some(1)) => self.add(ContentSpecNode::ZeroOrOne(node)),
            (0, None) => self.add(ContentSpecNode::ZeroOrMore(node)),
            (1, None) => self.add(ContentSpecNode::OneOrMore(node)),
            (min, max) => {
                self.limits
                    .check_occurs_expansion(max.unwrap_or(min))
                    .map_err(limit_error)?;

                let mut original = Some(node);
                let mut copy = |compiler: &mut Self| -> Result<ContentSpecIndex> {
                    match original.take() {
                        Some(index) => Ok(index),
                        None => compiler.duplicate(node),
                    }
                };

                let mut parts = Vec::new();
                let required = if max.is_none() { min - 1 } else { min };
                for _ in 0..required {
                    parts.push(copy(self)?);
                }
                match max {
                    None => {
                        let last = copy(self)?;
                        parts.push(self.add(ContentSpecNode::OneOrMore(last))?);
                    }
                    Some(max) if max > min => {
                        let inner = copy(self)?;
                        let mut tail = self.add(ContentSpecNode::ZeroOrOne(inner))?;
                        for _ in 1..(max - min) {
                            let head = copy(self)?;
                            let pair = self.add(ContentSpecNode::Sequence(head, tail))?;
                            tail = self.add(ContentSpecNode::ZeroOrOne(pair))?;
                        }
                        parts.push(tail);
                    }
                    Some(_) => {}
                }

                let mut parts = parts.into_iter();
                let mut acc = match parts.next() {
                    Some(first) => first,
                    None => return self.add(ContentSpecNode::Empty),
                };
                for part in parts {
                    acc = self.add(ContentSpecNode::Sequence(acc, part))?;
                }
                Ok(acc)
            }
        }
    }

    /// Deep-copy a subtree; leaf copies keep their particle id
    fn duplicate(&mut self, index: ContentSpecIndex) -> Result<ContentSpecIndex> {
        let mut stack = vec![(index, false)];
        let mut copies: Vec<ContentSpecIndex> = Vec::new();

        while let Some((current, expanded)) = stack.pop() {
            let node = self.table.require(current)?.clone();
            if !expanded {
                match node {
                    ContentSpecNode::Choice(a, b) | ContentSpecNode::Sequence(a, b) => {
                        stack.push((current, true));
                        stack.push((b, false));
                        stack.push((a, false));
                    }
                    ContentSpecNode::ZeroOrOne(child)
                    | ContentSpecNode::ZeroOrMore(child)
                    | ContentSpecNode::OneOrMore(child) => {
                        stack.push((current, true));
                        stack.push((child, false));
                    }
                    other => copies.push(self.add(other)?),
                }
                continue;
            }

            let copy = match node {
                ContentSpecNode::Choice(..) | ContentSpecNode::Sequence(..) => {
                    let b = pop_node(&mut copies)?;
                    let a = pop_node(&mut copies)?;
                    if matches!(node, ContentSpecNode::Choice(..)) {
                        ContentSpecNode::Choice(a, b)
                    } else {
                        ContentSpecNode::Sequence(a, b)
                    }
                }
                ContentSpecNode::ZeroOrOne(_) => ContentSpecNode::ZeroOrOne(pop_node(&mut copies)?),
                ContentSpecNode::ZeroOrMore(_) => ContentSpecNode::ZeroOrMore(pop_node(&mut copies)?),
                ContentSpecNode::OneOrMore(_) => ContentSpecNode::OneOrMore(pop_node(&mut copies)?),
                other => other,
            };
            copies.push(self.add(copy)?);
        }

        pop_node(&mut copies)
    }

    /// Build the automaton of a lowered tree and check it for ambiguity
    pub fn build_dfa(&self, root: ContentSpecIndex) -> Result<Dfa> {
        let mut positions: Vec<(Leaf, ParticleId)> = Vec::new();
        let mut follow: Vec<BTreeSet<usize>> = Vec::new();
        let root_facts = self.analyze(root, &mut positions, &mut follow)?;

        let end = positions.len();
        for p in &root_facts.last {
            follow[*p].insert(end);
        }
        let mut start = root_facts.first.clone();
        if root_facts.nullable {
            start.insert(end);
        }

        let mut symbols: Vec<Leaf> = Vec::new();
        let mut symbol_index: HashMap<Leaf, usize> = HashMap::new();
        let symbol_of: Vec<usize> = positions
            .iter()
            .map(|(leaf, _)| {
                *symbol_index.entry(leaf.clone()).or_insert_with(|| {
                    symbols.push(leaf.clone());
                    symbols.len() - 1
                })
            })
            .collect();

        let mut sets: Vec<BTreeSet<usize>> = vec![start.clone()];
        let mut ids: HashMap<BTreeSet<usize>, usize> = HashMap::from([(start, 0)]);
        let mut states: Vec<DfaState> = Vec::new();

        let mut current = 0;
        while current < sets.len() {
            let set = sets[current].clone();
            self.check_unique_attribution(&set, end, &positions)?;

            let mut next: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
            for &p in set.iter().filter(|p| **p != end) {
                next.entry(symbol_of[p]).or_default().extend(follow[p].iter().copied());
            }

            let mut transitions = Vec::with_capacity(next.len());
            for (symbol, target) in next {
                let id = match ids.get(&target) {
                    Some(id) => *id,
                    None => {
                        let id = sets.len();
                        self.limits.check_dfa_states(id + 1).map_err(limit_error)?;
                        ids.insert(target.clone(), id);
                        sets.push(target);
                        id
                    }
                };
                transitions.push((symbol, id));
            }
            states.push(DfaState::new(transitions, set.contains(&end)));
            current += 1;
        }

        tracing::trace!(
            positions = positions.len(),
            states = states.len(),
            "built content model automaton"
        );
        Ok(Dfa::new(symbols, states))
    }

    /// Two distinct particles reachable at the same position must not both
    /// accept one element
    fn check_unique_attribution(
        &self,
        set: &BTreeSet<usize>,
        end: usize,
        positions: &[(Leaf, ParticleId)],
    ) -> Result<()> {
        let members: Vec<usize> = set.iter().copied().filter(|p| *p != end).collect();
        for (i, &p) in members.iter().enumerate() {
            for &q in &members[i + 1..] {
                let (a, pa) = &positions[p];
                let (b, pb) = &positions[q];
                if pa != pb && conflict(a, b, self.comparator) {
                    return Err(compile_error(
                        CompileErrorKind::AmbiguousContentModel,
                        format!(
                            "content model is ambiguous: '{}' and '{}' can both match the same element",
                            a, b
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Compute first/last/follow sets bottom-up with an explicit stack
    fn analyze(
        &self,
        root: ContentSpecIndex,
        positions: &mut Vec<(Leaf, ParticleId)>,
        follow: &mut Vec<BTreeSet<usize>>,
    ) -> Result<Facts> {
        let mut done: HashMap<ContentSpecIndex, Facts> = HashMap::new();
        let mut stack = vec![(root, false)];

        let take = |done: &mut HashMap<ContentSpecIndex, Facts>, index: ContentSpecIndex| {
            done.remove(&index)
                .ok_or_else(|| Error::Internal(format!("content spec node {} not analyzed", index)))
        };

        while let Some((index, expanded)) = stack.pop() {
            let node = self.table.require(index)?;
            if !expanded {
                stack.push((index, true));
                match node {
                    ContentSpecNode::Choice(a, b) | ContentSpecNode::Sequence(a, b) => {
                        stack.push((*b, false));
                        stack.push((*a, false));
                    }
                    ContentSpecNode::ZeroOrOne(child)
                    | ContentSpecNode::ZeroOrMore(child)
                    | ContentSpecNode::OneOrMore(child) => stack.push((*child, false)),
                    _ => {}
                }
                continue;
            }

            let facts = match node {
                ContentSpecNode::Empty => Facts {
                    nullable: true,
                    ..Facts::default()
                },
                ContentSpecNode::Choice(a, b) => {
                    let fa = take(&mut done, *a)?;
                    let fb = take(&mut done, *b)?;
                    Facts {
                        nullable: fa.nullable || fb.nullable,
                        first: fa.first.union(&fb.first).copied().collect(),
                        last: fa.last.union(&fb.last).copied().collect(),
                    }
                }
                ContentSpecNode::Sequence(a, b) => {
                    let fa = take(&mut done, *a)?;
                    let fb = take(&mut done, *b)?;
                    for p in &fa.last {
                        follow[*p].extend(fb.first.iter().copied());
                    }
                    let mut first = fa.first.clone();
                    if fa.nullable {
                        first.extend(fb.first.iter().copied());
                    }
                    let mut last = fb.last.clone();
                    if fb.nullable {
                        last.extend(fa.last.iter().copied());
                    }
                    Facts {
                        nullable: fa.nullable && fb.nullable,
                        first,
                        last,
                    }
                }
                ContentSpecNode::ZeroOrOne(child) => {
                    let mut facts = take(&mut done, *child)?;
                    facts.nullable = true;
                    facts
                }
                ContentSpecNode::ZeroOrMore(child) | ContentSpecNode::OneOrMore(child) => {
                    let mut facts = take(&mut done, *child)?;
                    for p in &facts.last {
                        follow[*p].extend(facts.first.iter().copied());
                    }
                    if matches!(node, ContentSpecNode::ZeroOrMore(_)) {
                        facts.nullable = true;
                    }
                    facts
                }
                leaf => {
                    let (term, particle) = leaf
                        .leaf()
                        .ok_or_else(|| Error::Internal(format!("unexpected node {:?}", leaf)))?;
                    let position = positions.len();
                    positions.push((term, particle));
                    follow.push(BTreeSet::new());
                    Facts {
                        nullable: false,
                        first: BTreeSet::from([position]),
                        last: BTreeSet::from([position]),
                    }
                }
            };
            done.insert(index, facts);
        }

        take(&mut done, root)
    }

    /// Compile a top-level `all` group
    pub fn compile_all(&self, particle: &Particle) -> Result<AllModel> {
        let group = match &particle.term {
            Term::Group(group) if group.compositor == Compositor::All => group,
            _ => {
                return Err(compile_error(
                    CompileErrorKind::MisplacedAllGroup,
                    "expected an all group",
                ))
            }
        };
        if particle.occurs.min > 1 || particle.occurs.max != Some(1) {
            return Err(compile_error(
                CompileErrorKind::UnsupportedAllOccurrence,
                format!("all group occurrence must be 0..1 or 1..1, found {}", particle.occurs),
            ));
        }

        let mut members: Vec<(Leaf, Occurs)> = Vec::with_capacity(group.particles.len());
        for child in &group.particles {
            let leaf = match &child.term {
                Term::Leaf(leaf) => leaf.clone(),
                Term::Group(_) => {
                    return Err(compile_error(
                        CompileErrorKind::MisplacedAllGroup,
                        "an all group may only contain element and wildcard particles",
                    ))
                }
            };
            child.occurs.check().map_err(|e| Error::Compile(e.into()))?;
            if !child.occurs.is_basic() {
                return Err(compile_error(
                    CompileErrorKind::UnsupportedAllOccurrence,
                    format!(
                        "occurrence '{}' of '{}' in an all group is not supported",
                        child.occurs, leaf
                    ),
                ));
            }
            if let Some((other, _)) = members.iter().find(|(m, _)| conflict(m, &leaf, self.comparator)) {
                return Err(compile_error(
                    CompileErrorKind::AmbiguousContentModel,
                    format!(
                        "all group is ambiguous: '{}' and '{}' can both match the same element",
                        other, leaf
                    ),
                ));
            }
            members.push((leaf, child.occurs));
        }
        Ok(AllModel::new(members, particle.occurs.min == 0))
    }

    /// Render a particle as an occurrence string, e.g. `(a,b?,c*)`.
    ///
    /// An `all` group renders as the choice of all orderings of its
    /// members, which is only done up to `max_all_permutation_particles`.
    pub fn render(particle: &Particle, limits: &Limits) -> Result<String> {
        let mut out = String::new();
        render_particle(particle, limits, &mut out)?;
        if !out.starts_with('(') {
            out = format!("({})", out);
        }
        Ok(out)
    }
}

fn pop_node(nodes: &mut Vec<ContentSpecIndex>) -> Result<ContentSpecIndex> {
    nodes
        .pop()
        .ok_or_else(|| Error::Internal("content spec operand stack is empty".to_string()))
}

fn is_all_group(particle: &Particle) -> bool {
    matches!(&particle.term, Term::Group(group) if group.compositor == Compositor::All)
}

fn collect_leaves(particle: &Particle, out: &mut Vec<Leaf>) {
    let mut pending = vec![particle];
    while let Some(current) = pending.pop() {
        match &current.term {
            Term::Leaf(leaf) => out.push(leaf.clone()),
            Term::Group(group) => pending.extend(group.particles.iter().rev()),
        }
    }
}

fn render_particle(particle: &Particle, limits: &Limits, out: &mut String) -> Result<()> {
    match &particle.term {
        Term::Leaf(leaf) => {
            let _ = write!(out, "{}", leaf);
        }
        Term::Group(group) => {
            let mut members = Vec::with_capacity(group.particles.len());
            for child in &group.particles {
                if group.compositor == Compositor::All && !child.occurs.is_basic() {
                    return Err(compile_error(
                        CompileErrorKind::UnsupportedAllOccurrence,
                        format!("occurrence '{}' in an all group is not supported", child.occurs),
                    ));
                }
                let mut rendered = String::new();
                render_particle(child, limits, &mut rendered)?;
                members.push(rendered);
            }
            match group.compositor {
                Compositor::Sequence => {
                    let _ = write!(out, "({})", members.join(","));
                }
                Compositor::Choice => {
                    let _ = write!(out, "({})", members.join("|"));
                }
                Compositor::All => {
                    limits
                        .check_all_permutation(members.len())
                        .map_err(limit_error)?;
                    let orderings: Vec<String> = permutations(&members)
                        .into_iter()
                        .map(|ordering| format!("({})", ordering.join(",")))
                        .collect();
                    let _ = write!(out, "({})", orderings.join("|"));
                }
            }
        }
    }
    let _ = write!(out, "{}", particle.occurs);
    Ok(())
}

fn permutations(items: &[String]) -> Vec<Vec<String>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut result = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            result.push(tail);
        }
    }
    result
}
