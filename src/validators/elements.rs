//! Element declarations
//!
//! This module implements the compiled element declaration of a grammar
//! and the content sources it is compiled from.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Element_Declarations

use std::fmt;

use crate::namespaces::QName;

use super::arena::{AttributeIndex, ContentSpecIndex, IdentityIndex};
use super::models::ContentModel;
use super::particles::Particle;
use super::wildcards::Wildcard;

/// The scope of an element declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Global element declaration
    #[default]
    Global,
    /// Local element declaration, scoped by an enclosing definition
    Local(u32),
}

impl Scope {
    /// Check if this is the global scope
    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Local(id) => write!(f, "local({})", id),
        }
    }
}

/// Content-model category of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCategory {
    /// No children, no text
    Empty,
    /// Any well-formed content
    Any,
    /// DTD mixed content: `(#PCDATA|a|b)*`
    MixedSimple,
    /// Schema mixed content over a model group
    MixedComplex,
    /// Element-only content
    Children,
    /// Text checked against a simple type
    Simple,
}

impl ContentCategory {
    /// Check if the category admits character data
    pub fn allows_text(&self) -> bool {
        !matches!(self, ContentCategory::Empty | ContentCategory::Children)
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "EMPTY",
            Self::Any => "ANY",
            Self::MixedSimple => "MIXED_SIMPLE",
            Self::MixedComplex => "MIXED_COMPLEX",
            Self::Children => "CHILDREN",
            Self::Simple => "SIMPLE",
        };
        write!(f, "{}", s)
    }
}

/// Declared content of an element, before compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    /// `EMPTY`
    Empty,
    /// `ANY`
    Any,
    /// `(#PCDATA|a|b)*`
    MixedSimple(Vec<QName>),
    /// Mixed complex type; `None` for text-only mixed content
    MixedComplex(Option<Particle>),
    /// Element-only content model
    Children(Particle),
    /// Simple content of the named type
    Simple(QName),
}

/// Compiled element declaration
#[derive(Debug, Clone)]
pub struct ElementDeclaration {
    /// Element name
    pub name: QName,

    /// Scope the declaration belongs to
    pub scope: Scope,

    /// Scope in which declarations of child elements are looked up first
    pub children_scope: Scope,

    /// Content-model category
    pub category: ContentCategory,

    /// Compiled content model
    pub model: ContentModel,

    /// Root of the lowered content tree, if any
    pub content_spec: Option<ContentSpecIndex>,

    /// Simple type of the content, for simple content
    pub simple_type: Option<QName>,

    /// Fixed value of simple content
    pub fixed: Option<String>,

    /// Declared attributes
    pub attributes: Vec<AttributeIndex>,

    /// Wildcard for undeclared attributes
    pub attribute_wildcard: Option<Wildcard>,

    /// Identity constraints in declaration order
    pub identity_constraints: Vec<IdentityIndex>,
}

impl ElementDeclaration {
    /// Create a new declaration with empty content
    pub fn new(name: QName, scope: Scope) -> Self {
        Self {
            name,
            scope,
            children_scope: scope,
            category: ContentCategory::Empty,
            model: ContentModel::Empty,
            content_spec: None,
            simple_type: None,
            fixed: None,
            attributes: Vec::new(),
            attribute_wildcard: None,
            identity_constraints: Vec::new(),
        }
    }

    /// Check if the declaration is global
    pub fn is_global(&self) -> bool {
        self.scope.is_global()
    }

    /// Check if the content admits character data
    pub fn allows_text(&self) -> bool {
        self.category.allows_text()
    }

    /// Check if an attribute name is allowed by the attribute wildcard
    pub fn allows_attribute(&self, name: &QName) -> bool {
        self.attribute_wildcard
            .as_ref()
            .is_some_and(|wildcard| wildcard.allows(name))
    }
}
