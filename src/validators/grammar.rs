//! Compiled grammars
//!
//! A [`Grammar`] holds the element and attribute declarations, content-spec
//! nodes, identity constraints and user simple types of one compilation
//! unit (a DTD or a schema target namespace). It is built once by
//! [`GrammarBuilder`](super::builders::GrammarBuilder) and never mutated
//! afterwards, so it can be shared between validation sessions.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::namespaces::QName;

use super::arena::{AttributeIndex, ChunkedArena, ElementIndex, IdentityIndex};
use super::attributes::AttributeDeclaration;
use super::builtins::{builtin_for, BuiltinType, SimpleTypeValidator};
use super::conflict::{SubstitutionGroupComparator, SubstitutionGroups};
use super::content_spec::ContentSpecTable;
use super::elements::{ContentCategory, ElementDeclaration, Scope};
use super::facets::SimpleTypeDefinition;
use super::identities::IdentityConstraint;
use super::models::ContentModel;

/// Kind of grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarKind {
    /// Document type definition
    Dtd,
    /// XML Schema
    Schema,
}

impl fmt::Display for GrammarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dtd => write!(f, "DTD"),
            Self::Schema => write!(f, "Schema"),
        }
    }
}

/// Identifying description of a grammar.
///
/// Two descriptions are equal iff they have the same kind and key; the
/// "no namespace" schema key is a distinct value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrammarDescription {
    /// DTD keyed by its root element name
    Dtd {
        /// Root element name
        root_element: String,
    },
    /// Schema keyed by its target namespace
    Schema {
        /// Target namespace (`None` for no namespace)
        target_namespace: Option<String>,
    },
}

impl GrammarDescription {
    /// Description of a DTD
    pub fn dtd(root_element: impl Into<String>) -> Self {
        Self::Dtd {
            root_element: root_element.into(),
        }
    }

    /// Description of a schema
    pub fn schema(target_namespace: Option<&str>) -> Self {
        Self::Schema {
            target_namespace: target_namespace.map(String::from),
        }
    }

    /// Grammar kind
    pub fn kind(&self) -> GrammarKind {
        match self {
            Self::Dtd { .. } => GrammarKind::Dtd,
            Self::Schema { .. } => GrammarKind::Schema,
        }
    }

    /// Key value: root element name or target namespace
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Dtd { root_element } => Some(root_element),
            Self::Schema { target_namespace } => target_namespace.as_deref(),
        }
    }
}

impl fmt::Display for GrammarDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dtd { root_element } => write!(f, "DTD <{}>", root_element),
            Self::Schema {
                target_namespace: Some(ns),
            } => write!(f, "Schema {{{}}}", ns),
            Self::Schema {
                target_namespace: None,
            } => write!(f, "Schema (no namespace)"),
        }
    }
}

/// Compiled grammar
pub struct Grammar {
    pub(crate) description: GrammarDescription,
    pub(crate) elements: ChunkedArena<ElementIndex, ElementDeclaration>,
    pub(crate) attributes: ChunkedArena<AttributeIndex, AttributeDeclaration>,
    pub(crate) identities: ChunkedArena<IdentityIndex, IdentityConstraint>,
    pub(crate) element_lookup: IndexMap<(Scope, QName), ElementIndex>,
    pub(crate) identity_lookup: IndexMap<QName, IdentityIndex>,
    pub(crate) content_specs: ContentSpecTable,
    pub(crate) simple_types: IndexMap<QName, SimpleTypeDefinition>,
    pub(crate) substitution_groups: SubstitutionGroups,
    pub(crate) comparator: Option<Arc<dyn SubstitutionGroupComparator>>,
}

impl Grammar {
    /// Create an empty grammar
    pub(crate) fn new(description: GrammarDescription) -> Self {
        Self {
            description,
            elements: ChunkedArena::new(),
            attributes: ChunkedArena::new(),
            identities: ChunkedArena::new(),
            element_lookup: IndexMap::new(),
            identity_lookup: IndexMap::new(),
            content_specs: ContentSpecTable::new(),
            simple_types: IndexMap::new(),
            substitution_groups: SubstitutionGroups::new(),
            comparator: None,
        }
    }

    /// Identifying description
    pub fn description(&self) -> &GrammarDescription {
        &self.description
    }

    /// Grammar kind
    pub fn kind(&self) -> GrammarKind {
        self.description.kind()
    }

    /// Get an element declaration
    pub fn element(&self, index: ElementIndex) -> Option<&ElementDeclaration> {
        self.elements.get(index)
    }

    /// Iterate over element declarations in declaration order
    pub fn elements(&self) -> impl Iterator<Item = (ElementIndex, &ElementDeclaration)> {
        self.elements.iter()
    }

    /// Number of element declarations
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Get an attribute declaration
    pub fn attribute(&self, index: AttributeIndex) -> Option<&AttributeDeclaration> {
        self.attributes.get(index)
    }

    /// Get an identity constraint
    pub fn identity_constraint(&self, index: IdentityIndex) -> Option<&IdentityConstraint> {
        self.identities.get(index)
    }

    /// Iterate over identity constraints in declaration order
    pub fn identity_constraints(&self) -> impl Iterator<Item = (IdentityIndex, &IdentityConstraint)> {
        self.identities.iter()
    }

    /// Find an identity constraint by name
    pub fn find_identity_constraint(&self, name: &QName) -> Option<IdentityIndex> {
        self.identity_lookup.get(name).copied()
    }

    /// Look up a declaration in one scope
    pub fn lookup_element(&self, scope: Scope, name: &QName) -> Option<ElementIndex> {
        self.element_lookup.get(&(scope, name.clone())).copied()
    }

    /// Look up a global declaration
    pub fn global_element(&self, name: &QName) -> Option<ElementIndex> {
        self.lookup_element(Scope::Global, name)
    }

    /// Resolve a child name: the given scope first, then global
    pub fn resolve_child(&self, scope: Scope, name: &QName) -> Option<ElementIndex> {
        match scope {
            Scope::Local(_) => self
                .lookup_element(scope, name)
                .or_else(|| self.global_element(name)),
            Scope::Global => self.global_element(name),
        }
    }

    /// Find a declared attribute of an element
    pub fn find_attribute(&self, element: &ElementDeclaration, name: &QName) -> Option<AttributeIndex> {
        element
            .attributes
            .iter()
            .copied()
            .find(|index| self.attribute(*index).is_some_and(|decl| decl.name == *name))
    }

    /// Content-spec node table
    pub fn content_specs(&self) -> &ContentSpecTable {
        &self.content_specs
    }

    /// Resolve a simple type: user-defined types first, then built-ins
    pub fn simple_type(&self, name: &QName) -> Option<&dyn SimpleTypeValidator> {
        match self.simple_types.get(name) {
            Some(definition) => Some(definition as &dyn SimpleTypeValidator),
            None => builtin_for(name).map(|builtin| builtin as &dyn SimpleTypeValidator),
        }
    }

    /// Built-in type a simple type is ultimately derived from
    pub fn builtin_root(&self, name: &QName) -> Option<&'static BuiltinType> {
        let mut current = name;
        for _ in 0..=self.simple_types.len() {
            match self.simple_types.get(current) {
                Some(definition) => current = definition.base(),
                None => return builtin_for(current),
            }
        }
        None
    }

    /// Declared substitution groups
    pub fn substitution_groups(&self) -> &SubstitutionGroups {
        &self.substitution_groups
    }

    /// Comparator used for substitution-group questions
    pub fn comparator(&self) -> Option<&dyn SubstitutionGroupComparator> {
        match &self.comparator {
            Some(comparator) => Some(comparator.as_ref()),
            None if !self.substitution_groups.is_empty() => {
                Some(&self.substitution_groups as &dyn SubstitutionGroupComparator)
            }
            None => None,
        }
    }

    /// Render the content model of an element, e.g. `(a,b?,c*)`,
    /// `(#PCDATA|x|y)*`, `EMPTY` or `ANY`
    pub fn content_model_string(&self, index: ElementIndex) -> Result<String> {
        let decl = self.elements.require(index)?;
        let rendered = match (&decl.category, &decl.model) {
            (ContentCategory::Empty, _) => "EMPTY".to_string(),
            (ContentCategory::Any, _) => "ANY".to_string(),
            (ContentCategory::Simple, _) => match &decl.simple_type {
                Some(name) => format!("{{{}}}", name),
                None => "(#PCDATA)".to_string(),
            },
            (ContentCategory::MixedSimple, ContentModel::Mixed(mixed))
            | (ContentCategory::MixedComplex, ContentModel::Mixed(mixed))
                if decl.content_spec.is_none() =>
            {
                if mixed.symbols().is_empty() {
                    "(#PCDATA)".to_string()
                } else {
                    let names: Vec<String> =
                        mixed.symbols().iter().map(|s| s.leaf.to_string()).collect();
                    format!("(#PCDATA|{})*", names.join("|"))
                }
            }
            (ContentCategory::Children, ContentModel::All(all)) => {
                let members: Vec<String> = all
                    .members()
                    .iter()
                    .map(|m| format!("{}{}", m.symbol.leaf, m.occurs))
                    .collect();
                format!("&({})", members.join(","))
            }
            _ => match decl.content_spec {
                Some(root) => self.content_specs.render(root)?,
                None => "EMPTY".to_string(),
            },
        };
        Ok(rendered)
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("description", &self.description)
            .field("elements", &self.elements.len())
            .field("attributes", &self.attributes.len())
            .field("identity_constraints", &self.identities.len())
            .field("content_spec_nodes", &self.content_specs.len())
            .field("simple_types", &self.simple_types.len())
            .finish()
    }
}
