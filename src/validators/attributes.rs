//! Attribute declarations and attribute validation
//!
//! This module implements declared attributes of a grammar and the checks
//! applied to the attributes of an element start:
//! - required attributes present, undeclared attributes rejected
//! - values valid against the declared type and enumeration
//! - `#FIXED` values matched
//! - ID uniqueness and IDREF resolution
//!
//! Reference: https://www.w3.org/TR/xml/#attdecls

use std::collections::HashSet;
use std::fmt;

use crate::error::{ValidationError, ViolationKind};
use crate::namespaces::{QName, XMLNS_NAMESPACE, XSD_NAMESPACE, XSI_NAMESPACE};

use super::arena::ElementIndex;
use super::builtins::ValueContext;
use super::elements::ElementDeclaration;
use super::grammar::Grammar;

/// Attribute of an element start event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Resolved attribute name
    pub name: QName,
    /// Attribute value, entity references expanded
    pub value: String,
}

impl Attribute {
    /// Create a new attribute
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    /// Attribute without a namespace
    pub fn local(name: &str, value: impl Into<String>) -> Self {
        Self::new(QName::local(name), value)
    }

    /// Check if this is a namespace declaration or an `xsi:` attribute
    pub fn is_reserved(&self) -> bool {
        match self.name.namespace() {
            Some(ns) => ns == XMLNS_NAMESPACE || ns == XSI_NAMESPACE,
            None => self.name.local_name == "xmlns" || self.name.local_name.starts_with("xmlns:"),
        }
    }
}

/// Declared attribute type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    /// Character data
    CData,
    /// Unique identifier
    Id,
    /// Reference to an ID
    IdRef,
    /// List of references
    IdRefs,
    /// Name token
    NmToken,
    /// List of name tokens
    NmTokens,
    /// Unparsed entity name
    Entity,
    /// List of entity names
    Entities,
    /// One of the listed notations
    Notation(Vec<String>),
    /// One of the listed tokens
    Enumeration(Vec<String>),
    /// Named simple type
    Simple(QName),
}

impl AttributeType {
    /// Name of the simple type validating the value
    pub fn type_name(&self) -> QName {
        let local = match self {
            AttributeType::CData => "string",
            AttributeType::Id => "ID",
            AttributeType::IdRef => "IDREF",
            AttributeType::IdRefs => "IDREFS",
            AttributeType::NmToken | AttributeType::Enumeration(_) => "NMTOKEN",
            AttributeType::NmTokens => "NMTOKENS",
            AttributeType::Entity => "ENTITY",
            AttributeType::Entities => "ENTITIES",
            AttributeType::Notation(_) => "NOTATION",
            AttributeType::Simple(name) => return name.clone(),
        };
        QName::namespaced(XSD_NAMESPACE, local)
    }

    /// Check if values are whitespace-separated lists
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            AttributeType::IdRefs | AttributeType::NmTokens | AttributeType::Entities
        )
    }

    /// Enumerated values, if the type is an enumeration
    pub fn enumeration(&self) -> Option<&[String]> {
        match self {
            AttributeType::Notation(values) | AttributeType::Enumeration(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::CData => write!(f, "CDATA"),
            AttributeType::Id => write!(f, "ID"),
            AttributeType::IdRef => write!(f, "IDREF"),
            AttributeType::IdRefs => write!(f, "IDREFS"),
            AttributeType::NmToken => write!(f, "NMTOKEN"),
            AttributeType::NmTokens => write!(f, "NMTOKENS"),
            AttributeType::Entity => write!(f, "ENTITY"),
            AttributeType::Entities => write!(f, "ENTITIES"),
            AttributeType::Notation(values) => write!(f, "NOTATION ({})", values.join("|")),
            AttributeType::Enumeration(values) => write!(f, "({})", values.join("|")),
            AttributeType::Simple(name) => write!(f, "{}", name),
        }
    }
}

/// Default-value kind of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DefaultKind {
    /// `#REQUIRED` / use="required"
    Required,
    /// `#IMPLIED` / optional without default
    #[default]
    Implied,
    /// `#FIXED "value"`
    Fixed(String),
    /// Default literal
    Default(String),
}

impl DefaultKind {
    /// The fixed or default literal
    pub fn value(&self) -> Option<&str> {
        match self {
            DefaultKind::Fixed(value) | DefaultKind::Default(value) => Some(value),
            _ => None,
        }
    }
}

/// Attribute declaration as written in a grammar source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSource {
    /// Attribute name
    pub name: QName,
    /// Declared type
    pub attribute_type: AttributeType,
    /// Default-value kind
    pub default: DefaultKind,
}

impl AttributeSource {
    /// Create an optional attribute
    pub fn new(name: QName, attribute_type: AttributeType) -> Self {
        Self {
            name,
            attribute_type,
            default: DefaultKind::Implied,
        }
    }

    /// Optional CDATA attribute without a namespace
    pub fn local(name: &str) -> Self {
        Self::new(QName::local(name), AttributeType::CData)
    }

    /// Mark the attribute as required
    pub fn required(mut self) -> Self {
        self.default = DefaultKind::Required;
        self
    }

    /// Give the attribute a fixed value
    pub fn fixed(mut self, value: impl Into<String>) -> Self {
        self.default = DefaultKind::Fixed(value.into());
        self
    }

    /// Give the attribute a default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = DefaultKind::Default(value.into());
        self
    }

    /// Set the declared type
    pub fn with_type(mut self, attribute_type: AttributeType) -> Self {
        self.attribute_type = attribute_type;
        self
    }
}

/// Compiled attribute declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDeclaration {
    /// Attribute name
    pub name: QName,
    /// Declared type
    pub attribute_type: AttributeType,
    /// Whether values are lists
    pub list: bool,
    /// Default-value kind
    pub default: DefaultKind,
    /// Owning element
    pub element: ElementIndex,
}

impl AttributeDeclaration {
    /// Create a declaration owned by `element`
    pub fn new(source: &AttributeSource, element: ElementIndex) -> Self {
        Self {
            name: source.name.clone(),
            attribute_type: source.attribute_type.clone(),
            list: source.attribute_type.is_list(),
            default: source.default.clone(),
            element,
        }
    }

    /// Check if the attribute must be present
    pub fn is_required(&self) -> bool {
        self.default == DefaultKind::Required
    }

    /// Check the fixed or default literal against the declared type
    pub fn check_default(&self, grammar: &Grammar) -> Result<(), String> {
        let Some(literal) = self.default.value() else {
            return Ok(());
        };
        let type_name = self.attribute_type.type_name();
        let validator = grammar
            .simple_type(&type_name)
            .ok_or_else(|| format!("unknown type '{}'", type_name))?;
        let ctx = ValueContext::new().with_grammar(grammar);
        validator.validate(literal, &ctx).map_err(|e| e.reason)?;
        if let Some(values) = self.attribute_type.enumeration() {
            let normalized = validator.white_space().normalize(literal);
            if !values.iter().any(|v| *v == normalized) {
                return Err(format!("'{}' is not one of ({})", normalized, values.join("|")));
            }
        }
        Ok(())
    }
}

/// Attribute as seen by identity constraints: present in the event or
/// supplied from a default, typed by its declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveAttribute {
    /// Attribute name
    pub name: QName,
    /// Value as written, or the declared default
    pub value: String,
    /// Declared type name, `None` when undeclared
    pub type_name: Option<QName>,
    /// Whether the value was supplied from the declaration
    pub defaulted: bool,
}

/// Role of a value in ID/IDREF checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdRole {
    None,
    Id,
    IdRef,
    IdRefs,
}

/// IDs declared in a document and the references made to them
#[derive(Debug, Clone, Default)]
pub struct IdTable {
    ids: HashSet<String>,
    references: Vec<(String, String)>,
}

impl IdTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all IDs and references
    pub fn clear(&mut self) {
        self.ids.clear();
        self.references.clear();
    }

    /// Declare an ID; returns false if it was already declared
    pub fn declare(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    /// Record a reference made at `path`
    pub fn reference(&mut self, id: &str, path: &str) {
        self.references.push((id.to_string(), path.to_string()));
    }

    /// Check if an ID was declared
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// References to undeclared IDs, with the path they were made at
    pub fn dangling(&self) -> impl Iterator<Item = (&str, &str)> {
        self.references
            .iter()
            .filter(|(id, _)| !self.ids.contains(id))
            .map(|(id, path)| (id.as_str(), path.as_str()))
    }
}

/// Validate the attributes of an element start.
///
/// Returns the effective attributes: those of the event in event order,
/// reserved ones left out, followed by absent attributes that declare a
/// default or fixed value. ID bookkeeping is skipped when `ids` is `None`.
pub fn validate_attributes(
    grammar: &Grammar,
    element: &ElementDeclaration,
    attributes: &[Attribute],
    ctx: &ValueContext<'_>,
    mut ids: Option<&mut IdTable>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Vec<EffectiveAttribute> {
    let mut effective = Vec::with_capacity(attributes.len());
    let present = |attribute: &Attribute, type_name: Option<QName>| EffectiveAttribute {
        name: attribute.name.clone(),
        value: attribute.value.clone(),
        type_name,
        defaulted: false,
    };

    for attribute in attributes {
        if attribute.is_reserved() {
            continue;
        }
        let Some(index) = grammar.find_attribute(element, &attribute.name) else {
            if !element.allows_attribute(&attribute.name) {
                errors.push(
                    ValidationError::new(
                        ViolationKind::UndeclaredAttribute,
                        format!(
                            "attribute '{}' is not declared for element '{}'",
                            attribute.name, element.name
                        ),
                    )
                    .with_name(attribute.name.clone())
                    .with_path(path),
                );
            }
            effective.push(present(attribute, None));
            continue;
        };
        let Some(decl) = grammar.attribute(index) else {
            effective.push(present(attribute, None));
            continue;
        };

        if let Err(error) = check_value(grammar, decl, &attribute.value, ctx, ids.as_deref_mut(), path) {
            errors.push(error.with_name(attribute.name.clone()).with_path(path));
        }
        effective.push(present(attribute, Some(decl.attribute_type.type_name())));
    }

    for index in &element.attributes {
        let Some(decl) = grammar.attribute(*index) else {
            continue;
        };
        if attributes.iter().any(|a| a.name == decl.name) {
            continue;
        }
        if decl.is_required() {
            errors.push(
                ValidationError::new(
                    ViolationKind::MissingAttribute,
                    format!(
                        "required attribute '{}' of element '{}' is missing",
                        decl.name, element.name
                    ),
                )
                .with_name(decl.name.clone())
                .with_path(path),
            );
        } else if let Some(value) = decl.default.value() {
            effective.push(EffectiveAttribute {
                name: decl.name.clone(),
                value: value.to_string(),
                type_name: Some(decl.attribute_type.type_name()),
                defaulted: true,
            });
        }
    }

    effective
}

fn check_value(
    grammar: &Grammar,
    decl: &AttributeDeclaration,
    value: &str,
    ctx: &ValueContext<'_>,
    ids: Option<&mut IdTable>,
    path: &str,
) -> Result<(), ValidationError> {
    let type_name = decl.attribute_type.type_name();
    let invalid = |reason: String| {
        ValidationError::new(
            ViolationKind::InvalidAttributeValue,
            format!("invalid value for attribute '{}': {}", decl.name, reason),
        )
        .with_value(value)
    };

    let validator = grammar
        .simple_type(&type_name)
        .ok_or_else(|| invalid(format!("unknown type '{}'", type_name)))?;
    let normalized = validator.white_space().normalize(value);
    validator
        .validate(value, ctx)
        .map_err(|e| invalid(e.reason))?;

    if let Some(values) = decl.attribute_type.enumeration() {
        if !values.iter().any(|v| *v == normalized) {
            return Err(invalid(format!(
                "'{}' is not one of ({})",
                normalized,
                values.join("|")
            )));
        }
    }

    if let DefaultKind::Fixed(fixed) = &decl.default {
        if normalized != validator.white_space().normalize(fixed) {
            return Err(ValidationError::new(
                ViolationKind::FixedValueMismatch,
                format!(
                    "attribute '{}' must have the fixed value '{}'",
                    decl.name, fixed
                ),
            )
            .with_value(value));
        }
    }

    if let Some(ids) = ids {
        match id_role(grammar, &type_name) {
            IdRole::Id => {
                if !ids.declare(&normalized) {
                    return Err(ValidationError::new(
                        ViolationKind::DuplicateId,
                        format!("ID '{}' is already declared", normalized),
                    )
                    .with_value(normalized));
                }
            }
            IdRole::IdRef => ids.reference(&normalized, path),
            IdRole::IdRefs => {
                for id in normalized.split_whitespace() {
                    ids.reference(id, path);
                }
            }
            IdRole::None => {}
        }
    }
    Ok(())
}

fn id_role(grammar: &Grammar, type_name: &QName) -> IdRole {
    match grammar.builtin_root(type_name) {
        Some(builtin) if builtin.derives_from("ID") => IdRole::Id,
        Some(builtin) if builtin.derives_from("IDREF") => IdRole::IdRef,
        Some(builtin) if builtin.derives_from("IDREFS") => IdRole::IdRefs,
        _ => IdRole::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::validators::arena::ArenaIndex;
    use crate::validators::builders::{ElementSource, GrammarBuilder};
    use crate::validators::elements::ContentSource;

    fn grammar() -> Grammar {
        GrammarBuilder::dtd("doc")
            .with_element(
                ElementSource::global(QName::local("doc"), ContentSource::Empty)
                    .with_attribute(AttributeSource::local("id").with_type(AttributeType::Id))
                    .with_attribute(AttributeSource::local("ref").with_type(AttributeType::IdRefs))
                    .with_attribute(AttributeSource::local("version").fixed("1.0"))
                    .with_attribute(
                        AttributeSource::local("kind")
                            .with_type(AttributeType::Enumeration(vec!["a".into(), "b".into()]))
                            .required(),
                    ),
            )
            .compile(&Limits::default())
            .unwrap()
    }

    fn effective(
        grammar: &Grammar,
        attributes: &[Attribute],
        ids: &mut IdTable,
    ) -> (Vec<EffectiveAttribute>, Vec<ValidationError>) {
        let element = grammar.global_element(&QName::local("doc")).unwrap();
        let decl = grammar.element(element).unwrap();
        let ctx = ValueContext::new().with_grammar(grammar);
        let mut errors = Vec::new();
        let effective = validate_attributes(grammar, decl, attributes, &ctx, Some(ids), "/doc", &mut errors);
        (effective, errors)
    }

    fn check(grammar: &Grammar, attributes: &[Attribute], ids: &mut IdTable) -> Vec<ValidationError> {
        effective(grammar, attributes, ids).1
    }

    #[test]
    fn test_valid_attributes() {
        let grammar = grammar();
        let mut ids = IdTable::new();
        let errors = check(
            &grammar,
            &[
                Attribute::local("id", "x1"),
                Attribute::local("kind", " b "),
                Attribute::local("version", "1.0"),
                Attribute::new(QName::namespaced(XSI_NAMESPACE, "noNamespaceSchemaLocation"), "a.xsd"),
            ],
            &mut ids,
        );
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(ids.contains("x1"));
    }

    #[test]
    fn test_attribute_violations() {
        let grammar = grammar();
        let mut ids = IdTable::new();
        let errors = check(
            &grammar,
            &[
                Attribute::local("id", "1bad"),
                Attribute::local("version", "2.0"),
                Attribute::local("extra", "x"),
            ],
            &mut ids,
        );
        let kinds: Vec<ViolationKind> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::InvalidAttributeValue,
                ViolationKind::FixedValueMismatch,
                ViolationKind::UndeclaredAttribute,
                ViolationKind::MissingAttribute,
            ]
        );
    }

    #[test]
    fn test_enumeration_mismatch() {
        let grammar = grammar();
        let mut ids = IdTable::new();
        let errors = check(&grammar, &[Attribute::local("kind", "c")], &mut ids);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ViolationKind::InvalidAttributeValue);
    }

    #[test]
    fn test_id_table() {
        let grammar = grammar();
        let mut ids = IdTable::new();
        let first = check(
            &grammar,
            &[Attribute::local("id", "a"), Attribute::local("kind", "a"), Attribute::local("ref", "a b")],
            &mut ids,
        );
        assert!(first.is_empty());
        let second = check(&grammar, &[Attribute::local("id", "a"), Attribute::local("kind", "a")], &mut ids);
        assert_eq!(second[0].kind, ViolationKind::DuplicateId);

        let dangling: Vec<&str> = ids.dangling().map(|(id, _)| id).collect();
        assert_eq!(dangling, vec!["b"]);

        ids.clear();
        assert!(!ids.contains("a"));
    }

    #[test]
    fn test_defaults_supplied() {
        let grammar = GrammarBuilder::dtd("doc")
            .with_element(
                ElementSource::global(QName::local("doc"), ContentSource::Empty)
                    .with_attribute(AttributeSource::local("lang").with_default("en"))
                    .with_attribute(AttributeSource::local("version").fixed("1.0"))
                    .with_attribute(AttributeSource::local("note")),
            )
            .compile(&Limits::default())
            .unwrap();
        let mut ids = IdTable::new();

        let (attributes, errors) = effective(
            &grammar,
            &[
                Attribute::local("lang", "fr"),
                Attribute::local("xmlns", "urn:x"),
            ],
            &mut ids,
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let found: Vec<(&str, &str, bool)> = attributes
            .iter()
            .map(|a| (a.name.local_name.as_str(), a.value.as_str(), a.defaulted))
            .collect();
        assert_eq!(found, vec![("lang", "fr", false), ("version", "1.0", true)]);
        assert_eq!(
            attributes[1].type_name,
            Some(QName::namespaced(XSD_NAMESPACE, "string"))
        );
    }

    #[test]
    fn test_default_literal_checked() {
        let int = QName::namespaced(XSD_NAMESPACE, "int");
        let source = AttributeSource::new(QName::local("size"), AttributeType::Simple(int));
        let grammar = GrammarBuilder::schema(None).compile(&Limits::default()).unwrap();
        let element = ElementIndex::from_raw(0);

        let valid = AttributeDeclaration::new(&source.clone().with_default("12"), element);
        assert_eq!(valid.check_default(&grammar), Ok(()));
        let invalid = AttributeDeclaration::new(&source.clone().fixed("not-a-number"), element);
        assert!(invalid.check_default(&grammar).is_err());

        let choice = AttributeSource::local("kind")
            .with_type(AttributeType::Enumeration(vec!["a".into(), "b".into()]))
            .with_default("c");
        assert!(AttributeDeclaration::new(&choice, element).check_default(&grammar).is_err());
        assert_eq!(AttributeDeclaration::new(&source, element).check_default(&grammar), Ok(()));
    }

    #[test]
    fn test_reserved_attributes() {
        assert!(Attribute::local("xmlns", "urn:x").is_reserved());
        assert!(Attribute::new(QName::namespaced(XMLNS_NAMESPACE, "p"), "urn:x").is_reserved());
        assert!(!Attribute::local("id", "x").is_reserved());
        assert_eq!(AttributeType::Enumeration(vec!["a".into(), "b".into()]).to_string(), "(a|b)");
        assert!(AttributeType::IdRefs.is_list());
    }
}
