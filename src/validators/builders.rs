//! Grammar builders
//!
//! This module collects source declarations (elements, attributes, simple
//! types, substitution groups and identity constraints) and compiles them
//! into an immutable [`Grammar`]. Compilation runs in phases, each phase
//! relying only on what the previous ones produced:
//!
//! 1. simple types, in declaration order
//! 2. substitution groups
//! 3. element declarations and their lookup keys
//! 4. attribute declarations
//! 5. content models (lowering, DFA construction, UPA check)
//! 6. identity constraints, then keyref resolution
//!
//! All compile errors are collected; arena exhaustion aborts immediately.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{CompileError, CompileErrorKind, CompileErrors, Error, Result};
use crate::limits::Limits;
use crate::namespaces::QName;
use crate::xpath::IdentityXPathParser;

use super::arena::{ElementIndex, IdentityIndex};
use super::attributes::{AttributeDeclaration, AttributeSource, AttributeType};
use super::builtins::{builtin_for, ValueContext};
use super::compiler::ContentSpecCompiler;
use super::conflict::{SubstitutionGroupComparator, SubstitutionGroups};
use super::elements::{ContentSource, ElementDeclaration, Scope};
use super::facets::{RegexPatternEngine, SharedPatternEngine, SimpleTypeDefinition, SimpleTypeSource};
use super::grammar::{Grammar, GrammarDescription};
use super::identities::{IdentityConstraint, IdentityConstraintKind, IdentityConstraintSource};
use super::wildcards::Wildcard;

/// Element declaration as written in a grammar source
#[derive(Debug, Clone)]
pub struct ElementSource {
    /// Element name
    pub name: QName,
    /// Declaration scope
    pub scope: Scope,
    /// Scope searched first for child declarations
    pub children_scope: Scope,
    /// Declared content
    pub content: ContentSource,
    /// Declared attributes
    pub attributes: Vec<AttributeSource>,
    /// Identity constraints
    pub identity_constraints: Vec<IdentityConstraintSource>,
    /// Wildcard for undeclared attributes
    pub attribute_wildcard: Option<Wildcard>,
    /// Fixed value of simple content
    pub fixed: Option<String>,
}

impl ElementSource {
    fn new(name: QName, scope: Scope, content: ContentSource) -> Self {
        Self {
            name,
            scope,
            children_scope: scope,
            content,
            attributes: Vec::new(),
            identity_constraints: Vec::new(),
            attribute_wildcard: None,
            fixed: None,
        }
    }

    /// Create a global element declaration
    pub fn global(name: QName, content: ContentSource) -> Self {
        Self::new(name, Scope::Global, content)
    }

    /// Create a local element declaration in scope `scope_id`
    pub fn local(name: QName, scope_id: u32, content: ContentSource) -> Self {
        Self::new(name, Scope::Local(scope_id), content)
    }

    /// Set the scope searched first for child declarations
    pub fn with_children_scope(mut self, scope: Scope) -> Self {
        self.children_scope = scope;
        self
    }

    /// Add an attribute declaration
    pub fn with_attribute(mut self, attribute: AttributeSource) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add an identity constraint
    pub fn with_identity_constraint(mut self, constraint: IdentityConstraintSource) -> Self {
        self.identity_constraints.push(constraint);
        self
    }

    /// Allow undeclared attributes matching a wildcard
    pub fn with_attribute_wildcard(mut self, wildcard: Wildcard) -> Self {
        self.attribute_wildcard = Some(wildcard);
        self
    }

    /// Set the fixed value of simple content
    pub fn with_fixed(mut self, value: impl Into<String>) -> Self {
        self.fixed = Some(value.into());
        self
    }
}

/// Collects source declarations and compiles them into a [`Grammar`]
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    description: GrammarDescription,
    elements: Vec<ElementSource>,
    simple_types: Vec<SimpleTypeSource>,
    substitutions: Vec<(QName, QName)>,
    comparator: Option<Arc<dyn SubstitutionGroupComparator>>,
    pattern_engine: SharedPatternEngine,
}

impl GrammarBuilder {
    /// Create a builder for a grammar
    pub fn new(description: GrammarDescription) -> Self {
        Self {
            description,
            elements: Vec::new(),
            simple_types: Vec::new(),
            substitutions: Vec::new(),
            comparator: None,
            pattern_engine: Arc::new(RegexPatternEngine),
        }
    }

    /// Create a builder for a DTD grammar with the given root element
    pub fn dtd(root_element: impl Into<String>) -> Self {
        Self::new(GrammarDescription::dtd(root_element))
    }

    /// Create a builder for a schema grammar
    pub fn schema(target_namespace: Option<&str>) -> Self {
        Self::new(GrammarDescription::schema(target_namespace))
    }

    /// Add an element declaration
    pub fn with_element(mut self, element: ElementSource) -> Self {
        self.elements.push(element);
        self
    }

    /// Add a simple type definition
    pub fn with_simple_type(mut self, simple_type: SimpleTypeSource) -> Self {
        self.simple_types.push(simple_type);
        self
    }

    /// Declare `member` as a member of the substitution group of `head`
    pub fn with_substitution(mut self, head: QName, member: QName) -> Self {
        self.substitutions.push((head, member));
        self
    }

    /// Use an external substitution-group comparator instead of the
    /// declared substitution groups
    pub fn with_comparator(mut self, comparator: Arc<dyn SubstitutionGroupComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Use a pattern engine for `pattern` facets
    pub fn with_pattern_engine(mut self, engine: SharedPatternEngine) -> Self {
        self.pattern_engine = engine;
        self
    }

    /// Description of the grammar being built
    pub fn description(&self) -> &GrammarDescription {
        &self.description
    }

    /// Compile the declarations into a grammar.
    ///
    /// Compile errors are collected and returned together as
    /// [`Error::Compile`]; the grammar is only produced when there are none.
    pub fn compile(&self, limits: &Limits) -> Result<Grammar> {
        let mut grammar = Grammar::new(self.description.clone());
        let mut errors = CompileErrors::new();

        self.compile_simple_types(&mut grammar, &mut errors);

        let mut substitutions = SubstitutionGroups::new();
        for (head, member) in &self.substitutions {
            substitutions.add(head.clone(), member.clone());
        }
        grammar.substitution_groups = substitutions.clone();
        grammar.comparator = self.comparator.clone();

        let indices = self.declare_elements(&mut grammar, &mut errors)?;
        self.declare_attributes(&mut grammar, &indices, &mut errors)?;

        let comparator: Option<&dyn SubstitutionGroupComparator> = match &self.comparator {
            Some(comparator) => Some(comparator.as_ref()),
            None if !substitutions.is_empty() => Some(&substitutions),
            None => None,
        };
        self.compile_content(&mut grammar, &indices, comparator, limits, &mut errors)?;
        self.compile_identity_constraints(&mut grammar, &indices, &mut errors)?;

        if !errors.is_empty() {
            tracing::debug!(
                grammar = %self.description,
                errors = errors.len(),
                "grammar compilation failed"
            );
            return Err(Error::Compile(errors));
        }

        tracing::debug!(
            grammar = %self.description,
            elements = grammar.element_count(),
            content_specs = grammar.content_specs.len(),
            "compiled grammar"
        );
        Ok(grammar)
    }

    fn compile_simple_types(&self, grammar: &mut Grammar, errors: &mut CompileErrors) {
        for source in &self.simple_types {
            let component = format!("simple type '{}'", source.name);
            if grammar.simple_types.contains_key(&source.name) || builtin_for(&source.name).is_some() {
                errors.push(
                    CompileError::new(
                        CompileErrorKind::DuplicateType,
                        format!("type '{}' is already defined", source.name),
                    )
                    .with_component(component),
                );
                continue;
            }

            let compiled = {
                let ctx = ValueContext::new().with_grammar(grammar);
                match grammar.simple_type(&source.base) {
                    Some(base) => SimpleTypeDefinition::compile(
                        source,
                        base,
                        self.pattern_engine.as_ref(),
                        &ctx,
                    ),
                    None => Err(CompileError::new(
                        CompileErrorKind::UnresolvedReference,
                        format!("unknown base type '{}'", source.base),
                    )
                    .with_component(component)),
                }
            };
            match compiled {
                Ok(definition) => {
                    grammar.simple_types.insert(source.name.clone(), definition);
                }
                Err(err) => errors.push(err),
            }
        }
    }

    fn declare_elements(
        &self,
        grammar: &mut Grammar,
        errors: &mut CompileErrors,
    ) -> Result<Vec<Option<ElementIndex>>> {
        let mut indices = Vec::with_capacity(self.elements.len());
        for source in &self.elements {
            let component = format!("element '{}'", source.name);
            let key = (source.scope, source.name.clone());
            if grammar.element_lookup.contains_key(&key) {
                errors.push(
                    CompileError::new(
                        CompileErrorKind::DuplicateElement,
                        format!("element '{}' is declared twice in {} scope", source.name, source.scope),
                    )
                    .with_component(component),
                );
                indices.push(None);
                continue;
            }

            let mut decl = ElementDeclaration::new(source.name.clone(), source.scope);
            decl.children_scope = source.children_scope;
            decl.attribute_wildcard = source.attribute_wildcard.clone();
            decl.fixed = source.fixed.clone();
            if let ContentSource::Simple(type_name) = &source.content {
                if grammar.simple_type(type_name).is_none() {
                    errors.push(
                        CompileError::new(
                            CompileErrorKind::UnresolvedReference,
                            format!("unknown simple type '{}'", type_name),
                        )
                        .with_component(component),
                    );
                }
                decl.simple_type = Some(type_name.clone());
            }

            let index = grammar.elements.push(decl)?;
            grammar.element_lookup.insert(key, index);
            indices.push(Some(index));
        }
        Ok(indices)
    }

    fn declare_attributes(
        &self,
        grammar: &mut Grammar,
        indices: &[Option<ElementIndex>],
        errors: &mut CompileErrors,
    ) -> Result<()> {
        for (source, index) in self.elements.iter().zip(indices) {
            let Some(index) = *index else {
                continue;
            };
            let component = format!("element '{}'", source.name);
            let mut seen: HashSet<&QName> = HashSet::new();
            let mut declared = Vec::with_capacity(source.attributes.len());

            for attribute in &source.attributes {
                if !seen.insert(&attribute.name) {
                    errors.push(
                        CompileError::new(
                            CompileErrorKind::DuplicateAttribute,
                            format!("attribute '{}' is declared twice", attribute.name),
                        )
                        .with_component(component.clone()),
                    );
                    continue;
                }
                if let AttributeType::Simple(type_name) = &attribute.attribute_type {
                    if grammar.simple_type(type_name).is_none() {
                        errors.push(
                            CompileError::new(
                                CompileErrorKind::UnresolvedReference,
                                format!(
                                    "unknown simple type '{}' of attribute '{}'",
                                    type_name, attribute.name
                                ),
                            )
                            .with_component(component.clone()),
                        );
                        continue;
                    }
                }
                let decl = AttributeDeclaration::new(attribute, index);
                if let Err(reason) = decl.check_default(grammar) {
                    errors.push(
                        CompileError::new(
                            CompileErrorKind::InvalidFacet,
                            format!("invalid value constraint of attribute '{}': {}", attribute.name, reason),
                        )
                        .with_component(component.clone()),
                    );
                    continue;
                }
                declared.push(grammar.attributes.push(decl)?);
            }

            if let Some(decl) = grammar.elements.get_mut(index) {
                decl.attributes = declared;
            }
        }
        Ok(())
    }

    fn compile_content(
        &self,
        grammar: &mut Grammar,
        indices: &[Option<ElementIndex>],
        comparator: Option<&dyn SubstitutionGroupComparator>,
        limits: &Limits,
        errors: &mut CompileErrors,
    ) -> Result<()> {
        for (source, index) in self.elements.iter().zip(indices) {
            let Some(index) = *index else {
                continue;
            };
            let component = format!("element '{}'", source.name);

            let compiled = {
                let mut compiler = ContentSpecCompiler::new(&mut grammar.content_specs, limits);
                if let Some(comparator) = comparator {
                    compiler = compiler.with_comparator(comparator);
                }
                compiler.compile(&source.content)
            };
            let mut compiled = match compiled {
                Ok(compiled) => compiled,
                Err(Error::Compile(failures)) => {
                    for failure in failures {
                        errors.push(failure.with_component(component.clone()));
                    }
                    continue;
                }
                Err(fatal) => return Err(fatal),
            };

            let children_scope = source.children_scope;
            compiled
                .model
                .bind(|name| grammar.resolve_child(children_scope, name));

            if let Some(decl) = grammar.elements.get_mut(index) {
                decl.category = compiled.category;
                decl.model = compiled.model;
                decl.content_spec = compiled.spec;
            }
        }
        Ok(())
    }

    fn compile_identity_constraints(
        &self,
        grammar: &mut Grammar,
        indices: &[Option<ElementIndex>],
        errors: &mut CompileErrors,
    ) -> Result<()> {
        let mut keyrefs: Vec<(IdentityIndex, &QName)> = Vec::new();

        for (source, index) in self.elements.iter().zip(indices) {
            let Some(index) = *index else {
                continue;
            };
            let mut declared = Vec::with_capacity(source.identity_constraints.len());

            for constraint in &source.identity_constraints {
                let component = format!("{} '{}'", constraint.kind, constraint.name);
                let xpath_error = |message: String| {
                    CompileError::new(CompileErrorKind::InvalidXPath, message)
                        .with_component(component.clone())
                };

                if grammar.identity_lookup.contains_key(&constraint.name) {
                    errors.push(
                        CompileError::new(
                            CompileErrorKind::DuplicateIdentityConstraint,
                            format!("identity constraint '{}' is declared twice", constraint.name),
                        )
                        .with_component(component.clone()),
                    );
                    continue;
                }

                let selector = match IdentityXPathParser::new()
                    .parse(&constraint.selector, &constraint.namespaces)
                {
                    Ok(selector) => selector,
                    Err(err) => {
                        errors.push(xpath_error(format!(
                            "invalid selector '{}': {}",
                            constraint.selector, err
                        )));
                        continue;
                    }
                };
                if constraint.fields.is_empty() {
                    errors.push(xpath_error("at least one field is required".to_string()));
                    continue;
                }
                let mut fields = Vec::with_capacity(constraint.fields.len());
                for field in &constraint.fields {
                    match IdentityXPathParser::for_field().parse(field, &constraint.namespaces) {
                        Ok(expr) => fields.push(expr),
                        Err(err) => {
                            errors.push(xpath_error(format!("invalid field '{}': {}", field, err)))
                        }
                    }
                }
                if fields.len() != constraint.fields.len() {
                    continue;
                }

                let refer = match (constraint.kind, &constraint.refer) {
                    (IdentityConstraintKind::Keyref, None) => {
                        errors.push(
                            CompileError::new(
                                CompileErrorKind::UnresolvedReference,
                                "keyref requires a referenced key",
                            )
                            .with_component(component.clone()),
                        );
                        continue;
                    }
                    (IdentityConstraintKind::Keyref, Some(refer)) => Some(refer),
                    _ => None,
                };

                let ic = grammar.identities.push(IdentityConstraint {
                    name: constraint.name.clone(),
                    kind: constraint.kind,
                    selector,
                    fields,
                    refer: None,
                    element: index,
                })?;
                grammar.identity_lookup.insert(constraint.name.clone(), ic);
                declared.push(ic);
                if let Some(refer) = refer {
                    keyrefs.push((ic, refer));
                }
            }

            if let Some(decl) = grammar.elements.get_mut(index) {
                decl.identity_constraints = declared;
            }
        }

        for (ic, refer) in keyrefs {
            let Some(keyref) = grammar.identities.get(ic) else {
                continue;
            };
            let component = format!("keyref '{}'", keyref.name);
            let field_count = keyref.fields.len();

            let target = grammar.find_identity_constraint(refer).and_then(|target| {
                grammar
                    .identities
                    .get(target)
                    .map(|constraint| (target, constraint))
            });
            let resolved = match target {
                None => Err(format!("unknown identity constraint '{}'", refer)),
                Some((_, constraint)) if constraint.is_keyref() => {
                    Err(format!("'{}' is a keyref, not a key or unique constraint", refer))
                }
                Some((_, constraint)) if constraint.fields.len() != field_count => Err(format!(
                    "field count {} differs from the {} fields of '{}'",
                    field_count,
                    constraint.fields.len(),
                    refer
                )),
                Some((target, _)) => Ok(target),
            };
            match resolved {
                Ok(target) => {
                    if let Some(keyref) = grammar.identities.get_mut(ic) {
                        keyref.refer = Some(target);
                    }
                }
                Err(message) => errors.push(
                    CompileError::new(CompileErrorKind::UnresolvedReference, message)
                        .with_component(component),
                ),
            }
        }
        Ok(())
    }
}
