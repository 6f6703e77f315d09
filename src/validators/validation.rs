//! Document validation
//!
//! [`DocumentValidator`] drives the content-model validator, attribute
//! checks, ID/IDREF bookkeeping and identity constraints from one stream of
//! document events. Every event call reports whether it produced new
//! violations; the complete list is returned by
//! [`DocumentValidator::end_document`].

use std::fmt;
use std::mem;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result, ValidationError, ViolationKind};
use crate::limits::Limits;
use crate::namespaces::QName;
use crate::xpath::{MatchAttribute, MatchEvent};

use super::attributes::{validate_attributes, Attribute, EffectiveAttribute, IdTable};
use super::builtins::ValueContext;
use super::content::ContentModelValidator;
use super::facets::AssertionEvaluator;
use super::grammar::Grammar;
use super::identities::IdentityConstraintValidator;

/// Options of a validation session
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Whether to check identity constraints
    pub identity_constraints: bool,
    /// Whether to check ID uniqueness and IDREF resolution
    pub id_idref: bool,
    /// Whether to check the root element against a DTD grammar's root
    pub validate_root: bool,
    /// Document limits
    pub limits: Limits,
    /// Evaluator for assertion facets; assertions are skipped without one
    pub assertions: Option<Arc<dyn AssertionEvaluator>>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            identity_constraints: true,
            id_idref: true,
            validate_root: true,
            limits: Limits::default(),
            assertions: None,
        }
    }
}

impl ValidationOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable identity constraints
    pub fn with_identity_constraints(mut self, enabled: bool) -> Self {
        self.identity_constraints = enabled;
        self
    }

    /// Enable or disable ID/IDREF checks
    pub fn with_id_idref(mut self, enabled: bool) -> Self {
        self.id_idref = enabled;
        self
    }

    /// Enable or disable the root element check
    pub fn with_root_validation(mut self, enabled: bool) -> Self {
        self.validate_root = enabled;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the assertion evaluator
    pub fn with_assertions(mut self, assertions: Arc<dyn AssertionEvaluator>) -> Self {
        self.assertions = Some(assertions);
        self
    }
}

/// Result of one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// No new violation
    Accepted,
    /// At least one new violation was recorded
    Violated,
}

impl Outcome {
    /// Check if the event was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }
}

/// Violations of one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// True when no violation was recorded
    pub valid: bool,
    /// Violations in the order they were found
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// Build a report from collected violations
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Count violations of one kind
    pub fn count(&self, kind: ViolationKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// Serialize the report as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Internal(e.to_string()))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            return write!(f, "document is valid");
        }
        write!(f, "document is not valid ({} errors)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n- {}", error.message)?;
            if let Some(ref path) = error.path {
                write!(f, " at {}", path)?;
            }
        }
        Ok(())
    }
}

/// Validates one document at a time against a grammar
#[derive(Debug)]
pub struct DocumentValidator<'g> {
    grammar: &'g Grammar,
    options: ValidationOptions,
    content: ContentModelValidator<'g>,
    identities: IdentityConstraintValidator<'g>,
    ids: IdTable,
    errors: Vec<ValidationError>,
}

impl<'g> DocumentValidator<'g> {
    /// Create a validator with default options
    pub fn new(grammar: &'g Grammar) -> Self {
        Self::with_options(grammar, ValidationOptions::default())
    }

    /// Create a validator with the given options
    pub fn with_options(grammar: &'g Grammar, options: ValidationOptions) -> Self {
        let content = ContentModelValidator::new(grammar)
            .with_limits(options.limits.clone())
            .with_root_validation(options.validate_root);
        Self {
            grammar,
            options,
            content,
            identities: IdentityConstraintValidator::new(grammar),
            ids: IdTable::new(),
            errors: Vec::new(),
        }
    }

    /// Grammar validated against
    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Options in effect
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.content.depth()
    }

    /// Violations recorded so far
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Begin a new document; all state of a previous document is dropped
    pub fn start_document(&mut self) {
        self.content.clear();
        self.identities.clear();
        self.ids.clear();
        self.errors.clear();
        tracing::debug!(grammar = %self.grammar.description(), "start document");
    }

    fn outcome(&self, before: usize) -> Outcome {
        if self.errors.len() > before {
            Outcome::Violated
        } else {
            Outcome::Accepted
        }
    }

    /// Process an element start with its attributes
    pub fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<Outcome> {
        let before = self.errors.len();
        let grammar = self.grammar;
        let start = self.content.start_element(name, &mut self.errors)?;
        let decl = start.mode.declaration().and_then(|index| grammar.element(index));

        let mut ctx = ValueContext::new().with_grammar(grammar);
        if let Some(assertions) = self.options.assertions.as_deref() {
            ctx = ctx.with_assertions(assertions);
        }

        let effective = match decl {
            Some(decl) => {
                let ids = if self.options.id_idref {
                    Some(&mut self.ids)
                } else {
                    None
                };
                validate_attributes(grammar, decl, attributes, &ctx, ids, &start.path, &mut self.errors)
            }
            None => attributes
                .iter()
                .filter(|attribute| !attribute.is_reserved())
                .map(|attribute| EffectiveAttribute {
                    name: attribute.name.clone(),
                    value: attribute.value.clone(),
                    type_name: None,
                    defaulted: false,
                })
                .collect(),
        };

        if self.options.identity_constraints {
            let typed: Vec<MatchAttribute> = effective
                .into_iter()
                .map(|attribute| MatchAttribute::new(attribute.name, attribute.value, attribute.type_name))
                .collect();
            let event = MatchEvent::new(name, &typed)
                .with_type(decl.and_then(|decl| decl.simple_type.as_ref()));
            self.identities
                .start_element(start.mode.declaration(), &event, &start.path, &mut self.errors);
        }

        Ok(self.outcome(before))
    }

    /// Process character data
    pub fn characters(&mut self, text: &str) -> Result<Outcome> {
        let before = self.errors.len();
        self.content.characters(text, &mut self.errors)?;
        if self.options.identity_constraints {
            self.identities.characters(text);
        }
        Ok(self.outcome(before))
    }

    /// Process an element end
    pub fn end_element(&mut self, name: &QName) -> Result<Outcome> {
        let before = self.errors.len();
        let mut ctx = ValueContext::new().with_grammar(self.grammar);
        if let Some(assertions) = self.options.assertions.as_deref() {
            ctx = ctx.with_assertions(assertions);
        }
        self.content.end_element(name, &ctx, &mut self.errors)?;
        if self.options.identity_constraints {
            self.identities.end_element(&mut self.errors);
        }
        Ok(self.outcome(before))
    }

    /// Finish the document: resolve keyrefs and IDREFs and return the report
    pub fn end_document(&mut self) -> Result<ValidationReport> {
        if self.content.depth() > 0 {
            return Err(Error::Xml(format!(
                "document ended with {} unclosed element(s)",
                self.content.depth()
            )));
        }
        if self.options.identity_constraints {
            self.identities.end_document(&mut self.errors);
        }
        if self.options.id_idref {
            for (id, path) in self.ids.dangling() {
                self.errors.push(
                    ValidationError::new(
                        ViolationKind::DanglingIdref,
                        format!("IDREF '{}' does not match any ID", id),
                    )
                    .with_value(id)
                    .with_path(path),
                );
            }
        }

        let report = ValidationReport::new(mem::take(&mut self.errors));
        tracing::debug!(
            grammar = %self.grammar.description(),
            valid = report.valid,
            errors = report.errors.len(),
            "end document"
        );
        Ok(report)
    }
}
