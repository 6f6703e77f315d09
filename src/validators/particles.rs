//! Particles, model groups and terms
//!
//! This module implements the source form of content models: a particle is
//! a term with occurrence bounds, a term is an element name, a wildcard or
//! a nested model group (sequence, choice or all).
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#p

use std::fmt;

use crate::error::{CompileError, CompileErrorKind};
use crate::namespaces::QName;

use super::wildcards::Wildcard;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle is empty (maxOccurs == 0)
    pub fn is_empty(&self) -> bool {
        self.max == Some(0)
    }

    /// Check if particle has maxOccurs == 1
    pub fn is_single(&self) -> bool {
        self.max == Some(1)
    }

    /// Check if occurrence count is under the minimum
    pub fn is_missing(&self, count: u32) -> bool {
        count < self.min
    }

    /// Check if occurrence count is at or over the maximum
    pub fn is_over(&self, count: u32) -> bool {
        match self.max {
            Some(max) => count >= max,
            None => false,
        }
    }

    /// Check if the bounds are one of the four basic combinations
    /// (min in {0, 1}, max in {1, unbounded})
    pub fn is_basic(&self) -> bool {
        self.min <= 1 && matches!(self.max, Some(1) | None)
    }

    /// Validate that min <= max
    pub fn check(&self) -> Result<(), CompileError> {
        match self.max {
            Some(max) if self.min > max => Err(CompileError::new(
                CompileErrorKind::InvalidOccurs,
                format!("minOccurs {} is greater than maxOccurs {}", self.min, max),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (1, Some(1)) => Ok(()),
            (0, Some(1)) => write!(f, "?"),
            (0, None) => write!(f, "*"),
            (1, None) => write!(f, "+"),
            (min, None) => write!(f, "{{{},}}", min),
            (min, Some(max)) => write!(f, "{{{},{}}}", min, max),
        }
    }
}

/// Parse minOccurs/maxOccurs from attribute values
pub fn parse_occurs(
    min_occurs: Option<&str>,
    max_occurs: Option<&str>,
) -> Result<Occurs, CompileError> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.trim().parse::<u32>().map_err(|_| {
            CompileError::new(
                CompileErrorKind::InvalidOccurs,
                "minOccurs value is not a valid non-negative integer",
            )
        })?;
    }

    if let Some(max_str) = max_occurs {
        let max_str = max_str.trim();
        if max_str == "unbounded" {
            occurs.max = None;
        } else {
            occurs.max = Some(max_str.parse::<u32>().map_err(|_| {
                CompileError::new(
                    CompileErrorKind::InvalidOccurs,
                    "maxOccurs value must be a non-negative integer or 'unbounded'",
                )
            })?);
        }
    }

    occurs.check()?;
    Ok(occurs)
}

/// Model group compositor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compositor {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set of particles, each at most once
    All,
}

impl fmt::Display for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Leaf term: what a single child element is matched against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Leaf {
    /// Definite element name
    Element(QName),
    /// Wildcard
    Wildcard(Wildcard),
}

impl Leaf {
    /// Check if a child name is accepted by this leaf (without substitution)
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            Leaf::Element(qname) => qname == name,
            Leaf::Wildcard(wildcard) => wildcard.allows(name),
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Element(name) => write!(f, "{}", name),
            Leaf::Wildcard(wildcard) => write!(f, "{}", wildcard),
        }
    }
}

/// Model group: a compositor over ordered child particles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
    /// Compositor (sequence, choice, all)
    pub compositor: Compositor,
    /// Child particles in declaration order
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    /// Create a new model group
    pub fn new(compositor: Compositor, particles: Vec<Particle>) -> Self {
        Self {
            compositor,
            particles,
        }
    }
}

/// Term of a particle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Element or wildcard
    Leaf(Leaf),
    /// Nested model group
    Group(ModelGroup),
}

/// A term with occurrence bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    /// The term
    pub term: Term,
    /// Occurrence constraints
    pub occurs: Occurs,
}

impl Particle {
    /// Create a particle occurring exactly once
    pub fn new(term: Term) -> Self {
        Self {
            term,
            occurs: Occurs::once(),
        }
    }

    /// Element particle
    pub fn element(name: QName) -> Self {
        Self::new(Term::Leaf(Leaf::Element(name)))
    }

    /// Element particle with a name in no namespace
    pub fn local(name: &str) -> Self {
        Self::element(QName::local(name))
    }

    /// Wildcard particle
    pub fn wildcard(wildcard: Wildcard) -> Self {
        Self::new(Term::Leaf(Leaf::Wildcard(wildcard)))
    }

    /// Sequence group particle
    pub fn sequence(particles: impl IntoIterator<Item = Particle>) -> Self {
        Self::group(Compositor::Sequence, particles)
    }

    /// Choice group particle
    pub fn choice(particles: impl IntoIterator<Item = Particle>) -> Self {
        Self::group(Compositor::Choice, particles)
    }

    /// All group particle
    pub fn all(particles: impl IntoIterator<Item = Particle>) -> Self {
        Self::group(Compositor::All, particles)
    }

    /// Group particle with the given compositor
    pub fn group(compositor: Compositor, particles: impl IntoIterator<Item = Particle>) -> Self {
        Self::new(Term::Group(ModelGroup::new(
            compositor,
            particles.into_iter().collect(),
        )))
    }

    /// Set the occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Shorthand for (0, 1)
    pub fn optional(self) -> Self {
        self.with_occurs(Occurs::optional())
    }

    /// Shorthand for (0, unbounded)
    pub fn zero_or_more(self) -> Self {
        self.with_occurs(Occurs::zero_or_more())
    }

    /// Shorthand for (1, unbounded)
    pub fn one_or_more(self) -> Self {
        self.with_occurs(Occurs::one_or_more())
    }

    /// Check if the particle accepts the empty sequence
    pub fn is_emptiable(&self) -> bool {
        if self.occurs.is_emptiable() || self.occurs.is_empty() {
            return true;
        }
        match &self.term {
            Term::Leaf(_) => false,
            Term::Group(group) => match group.compositor {
                Compositor::Choice => group.particles.iter().any(Particle::is_emptiable),
                Compositor::Sequence | Compositor::All => {
                    group.particles.iter().all(Particle::is_emptiable)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_presets() {
        assert_eq!(Occurs::once(), Occurs::new(1, Some(1)));
        assert_eq!(Occurs::optional(), Occurs::new(0, Some(1)));
        assert_eq!(Occurs::zero_or_more(), Occurs::new(0, None));
        assert_eq!(Occurs::one_or_more(), Occurs::new(1, None));
    }

    #[test]
    fn test_occurs_counting() {
        let occurs = Occurs::new(2, Some(5));
        assert!(occurs.is_missing(1));
        assert!(!occurs.is_missing(2));
        assert!(!occurs.is_over(4));
        assert!(occurs.is_over(5));
    }

    #[test]
    fn test_occurs_basic() {
        assert!(Occurs::once().is_basic());
        assert!(Occurs::optional().is_basic());
        assert!(Occurs::zero_or_more().is_basic());
        assert!(Occurs::one_or_more().is_basic());
        assert!(!Occurs::new(2, Some(3)).is_basic());
        assert!(!Occurs::new(0, Some(2)).is_basic());
    }

    #[test]
    fn test_occurs_display() {
        assert_eq!(Occurs::once().to_string(), "");
        assert_eq!(Occurs::optional().to_string(), "?");
        assert_eq!(Occurs::zero_or_more().to_string(), "*");
        assert_eq!(Occurs::one_or_more().to_string(), "+");
        assert_eq!(Occurs::new(2, Some(4)).to_string(), "{2,4}");
    }

    #[test]
    fn test_parse_occurs() {
        assert_eq!(parse_occurs(None, None).unwrap(), Occurs::once());
        assert_eq!(parse_occurs(Some("0"), Some("5")).unwrap(), Occurs::new(0, Some(5)));
        assert_eq!(
            parse_occurs(Some("1"), Some("unbounded")).unwrap(),
            Occurs::one_or_more()
        );
        assert!(parse_occurs(Some("abc"), None).is_err());
        assert!(parse_occurs(None, Some("abc")).is_err());
        assert!(parse_occurs(Some("5"), Some("3")).is_err());
        assert!(parse_occurs(Some("5"), None).is_err());
    }

    #[test]
    fn test_particle_emptiable() {
        let seq = Particle::sequence([Particle::local("a").optional(), Particle::local("b").zero_or_more()]);
        assert!(seq.is_emptiable());

        let seq = Particle::sequence([Particle::local("a"), Particle::local("b").optional()]);
        assert!(!seq.is_emptiable());

        let choice = Particle::choice([Particle::local("a"), Particle::local("b").optional()]);
        assert!(choice.is_emptiable());
    }

    #[test]
    fn test_leaf_matches() {
        let leaf = Leaf::Element(QName::local("a"));
        assert!(leaf.matches(&QName::local("a")));
        assert!(!leaf.matches(&QName::local("b")));

        let wildcard = Leaf::Wildcard(Wildcard::namespace(Some("urn:x")));
        assert!(wildcard.matches(&QName::namespaced("urn:x", "anything")));
    }
}
