//! Grammar compilation and validation
//!
//! Declarations are collected by a [`GrammarBuilder`] and compiled into an
//! immutable [`Grammar`]: content models become DFAs (or counted `all`
//! models), simple types get their facets, identity constraints their
//! compiled XPath expressions. A [`DocumentValidator`] then checks
//! documents against the grammar one event at a time.

// Storage
pub mod arena;

// Content models
pub mod wildcards;
pub mod particles;
pub mod conflict;
pub mod content_spec;
pub mod models;
pub mod compiler;

// Simple types
pub mod builtins;
pub mod facets;

// Declarations
pub mod elements;
pub mod attributes;
pub mod identities;
pub mod grammar;
pub mod builders;

// Document validation
pub mod content;
pub mod validation;

pub use arena::{
    ArenaIndex, AttributeIndex, ChunkedArena, ContentSpecIndex, ElementIndex, IdentityIndex,
};
pub use attributes::{
    validate_attributes, Attribute, AttributeDeclaration, AttributeSource, AttributeType,
    DefaultKind, EffectiveAttribute, IdTable,
};
pub use builders::{ElementSource, GrammarBuilder};
pub use builtins::{
    builtin_for, builtin_type, builtin_types, BuiltinType, InvalidValue, SimpleTypeValidator,
    TypedValue, ValueContext,
};
pub use compiler::{CompiledContent, ContentSpecCompiler};
pub use conflict::{conflict, ComparatorError, SubstitutionGroupComparator, SubstitutionGroups};
pub use content::{ContentModelValidator, ElementStart, FrameMode};
pub use content_spec::{ContentSpecNode, ContentSpecTable};
pub use elements::{ContentCategory, ContentSource, ElementDeclaration, Scope};
pub use facets::{
    AssertionContext, AssertionEvaluator, CompiledPattern, Facet, FacetSource, PatternEngine,
    RegexPatternEngine, SharedPatternEngine, SimpleTypeDefinition, SimpleTypeSource, Variety,
    WhiteSpace,
};
pub use grammar::{Grammar, GrammarDescription, GrammarKind};
pub use identities::{
    FieldTuple, IdentityConstraint, IdentityConstraintKind, IdentityConstraintSource,
    IdentityConstraintValidator,
};
pub use models::{ChildMatch, ContentModel, ContentState, Dfa};
pub use particles::{parse_occurs, Compositor, Leaf, ModelGroup, Occurs, Particle, Term};
pub use validation::{DocumentValidator, Outcome, ValidationOptions, ValidationReport};
pub use wildcards::{ProcessContents, Wildcard, WildcardKind};
