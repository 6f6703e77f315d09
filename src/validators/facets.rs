//! Facets and user-defined simple types
//!
//! A user simple type restricts a base type (built-in or user-defined) with
//! constraining facets, or builds a list of a base item type. Pattern
//! facets go through a [`PatternEngine`] and assertion facets through an
//! optional [`AssertionEvaluator`]; both are pluggable.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-2/#rf-facets

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{CompileError, CompileErrorKind};
use crate::namespaces::QName;

use super::builtins::{builtin_for, InvalidValue, SimpleTypeValidator, TypedValue, ValueContext};

/// White space handling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WhiteSpace {
    /// Preserve all white space
    #[default]
    Preserve,
    /// Replace tabs and newlines with spaces
    Replace,
    /// Replace and collapse multiple spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from string value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => s.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => s.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// A compiled pattern facet
pub trait CompiledPattern: fmt::Debug + Send + Sync {
    /// Pattern source text
    fn source(&self) -> &str;

    /// Check if the whole value matches
    fn matches(&self, value: &str) -> bool;
}

/// Compiles pattern facets
pub trait PatternEngine: fmt::Debug + Send + Sync {
    /// Compile a pattern, returning a readable reason on failure
    fn compile(&self, pattern: &str) -> Result<Box<dyn CompiledPattern>, String>;
}

/// Pattern engine backed by the `regex` crate.
///
/// Patterns are implicitly anchored at both ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexPatternEngine;

#[derive(Debug)]
struct RegexPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern for RegexPattern {
    fn source(&self) -> &str {
        &self.source
    }

    fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PatternEngine for RegexPatternEngine {
    fn compile(&self, pattern: &str) -> Result<Box<dyn CompiledPattern>, String> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| e.to_string())?;
        Ok(Box::new(RegexPattern {
            source: pattern.to_string(),
            regex,
        }))
    }
}

/// What an assertion is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct AssertionContext<'a> {
    /// Type carrying the assertion
    pub type_name: &'a QName,
    /// Normalized lexical value
    pub lexical: &'a str,
}

/// Evaluates XSD 1.1 assertion facets
pub trait AssertionEvaluator: fmt::Debug + Send + Sync {
    /// Evaluate a boolean expression; `bindings` carries `$value`
    fn evaluate(
        &self,
        expression: &str,
        context: &AssertionContext<'_>,
        bindings: &[(&str, &TypedValue)],
    ) -> Result<bool, String>;
}

/// Facet as declared, before compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetSource {
    /// Allowed values
    Enumeration(Vec<String>),
    /// Regular expression the lexical value must match
    Pattern(String),
    /// Exact length
    Length(usize),
    /// Minimum length
    MinLength(usize),
    /// Maximum length
    MaxLength(usize),
    /// Inclusive lower bound
    MinInclusive(String),
    /// Inclusive upper bound
    MaxInclusive(String),
    /// Exclusive lower bound
    MinExclusive(String),
    /// Exclusive upper bound
    MaxExclusive(String),
    /// White space handling
    WhiteSpace(WhiteSpace),
    /// XSD 1.1 assertion expression
    Assertion(String),
}

/// Compiled facet
#[derive(Debug)]
pub enum Facet {
    /// Allowed values
    Enumeration(Vec<TypedValue>),
    /// Patterns of one derivation step (any may match)
    Pattern(Vec<Box<dyn CompiledPattern>>),
    /// Exact length
    Length(usize),
    /// Minimum length
    MinLength(usize),
    /// Maximum length
    MaxLength(usize),
    /// Inclusive lower bound
    MinInclusive(TypedValue),
    /// Inclusive upper bound
    MaxInclusive(TypedValue),
    /// Exclusive lower bound
    MinExclusive(TypedValue),
    /// Exclusive upper bound
    MaxExclusive(TypedValue),
    /// Assertion expression
    Assertion(String),
}

/// Variety of a user simple type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variety {
    /// Restriction of an atomic base
    #[default]
    Atomic,
    /// Whitespace-separated list of the base item type
    List,
}

/// User simple type as declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTypeSource {
    /// Type name
    pub name: QName,
    /// Base type (item type for lists)
    pub base: QName,
    /// Variety
    pub variety: Variety,
    /// Facets in declaration order
    pub facets: Vec<FacetSource>,
}

impl SimpleTypeSource {
    /// Restriction of `base`
    pub fn restriction(name: QName, base: QName) -> Self {
        Self {
            name,
            base,
            variety: Variety::Atomic,
            facets: Vec::new(),
        }
    }

    /// List of `item_type`
    pub fn list(name: QName, item_type: QName) -> Self {
        Self {
            name,
            base: item_type,
            variety: Variety::List,
            facets: Vec::new(),
        }
    }

    /// Add a facet
    pub fn with_facet(mut self, facet: FacetSource) -> Self {
        self.facets.push(facet);
        self
    }
}

/// Compiled user simple type
#[derive(Debug)]
pub struct SimpleTypeDefinition {
    name: QName,
    base: QName,
    variety: Variety,
    white_space: WhiteSpace,
    facets: Vec<Facet>,
}

impl SimpleTypeDefinition {
    /// Compile a declared type against its already resolved base
    pub fn compile(
        source: &SimpleTypeSource,
        base: &dyn SimpleTypeValidator,
        engine: &dyn PatternEngine,
        ctx: &ValueContext<'_>,
    ) -> Result<Self, CompileError> {
        let white_space = match source.variety {
            Variety::Atomic => base.white_space(),
            Variety::List => WhiteSpace::Collapse,
        };
        let mut definition = Self {
            name: source.name.clone(),
            base: source.base.clone(),
            variety: source.variety,
            white_space,
            facets: Vec::new(),
        };

        let mut patterns = Vec::new();
        let facet_error = |message: String| {
            CompileError::new(CompileErrorKind::InvalidFacet, message)
                .with_component(format!("simple type '{}'", source.name))
        };
        let bound = |definition: &Self, lexical: &str| {
            definition
                .typed_value(base, &definition.white_space.normalize(lexical), ctx)
                .map_err(|e| facet_error(format!("invalid bound '{}': {}", lexical, e)))
        };

        for facet in &source.facets {
            let compiled = match facet {
                FacetSource::WhiteSpace(ws) => {
                    definition.white_space = *ws;
                    continue;
                }
                FacetSource::Pattern(pattern) => {
                    patterns.push(engine.compile(pattern).map_err(|e| {
                        facet_error(format!("invalid pattern '{}': {}", pattern, e))
                    })?);
                    continue;
                }
                FacetSource::Enumeration(values) => Facet::Enumeration(
                    values
                        .iter()
                        .map(|v| bound(&definition, v))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                FacetSource::Length(n) => Facet::Length(*n),
                FacetSource::MinLength(n) => Facet::MinLength(*n),
                FacetSource::MaxLength(n) => Facet::MaxLength(*n),
                FacetSource::MinInclusive(v) => Facet::MinInclusive(bound(&definition, v)?),
                FacetSource::MaxInclusive(v) => Facet::MaxInclusive(bound(&definition, v)?),
                FacetSource::MinExclusive(v) => Facet::MinExclusive(bound(&definition, v)?),
                FacetSource::MaxExclusive(v) => Facet::MaxExclusive(bound(&definition, v)?),
                FacetSource::Assertion(expr) => Facet::Assertion(expr.clone()),
            };
            definition.facets.push(compiled);
        }

        if !patterns.is_empty() {
            definition.facets.push(Facet::Pattern(patterns));
        }
        Ok(definition)
    }

    /// Base type name (item type for lists)
    pub fn base(&self) -> &QName {
        &self.base
    }

    /// Variety
    pub fn variety(&self) -> Variety {
        self.variety
    }

    /// Compiled facets
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Enumerated values, if an enumeration facet is declared
    pub fn enumeration(&self) -> Option<&[TypedValue]> {
        self.facets.iter().find_map(|facet| match facet {
            Facet::Enumeration(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    fn resolve_base<'a>(&self, ctx: &ValueContext<'a>) -> Option<&'a dyn SimpleTypeValidator> {
        ctx.grammar
            .and_then(|grammar| grammar.simple_type(&self.base))
            .or_else(|| builtin_for(&self.base).map(|b| b as &dyn SimpleTypeValidator))
    }

    fn typed_value(
        &self,
        base: &dyn SimpleTypeValidator,
        normalized: &str,
        ctx: &ValueContext<'_>,
    ) -> Result<TypedValue, InvalidValue> {
        match self.variety {
            Variety::Atomic => base.validate(normalized, ctx),
            Variety::List => normalized
                .split_whitespace()
                .map(|item| base.validate(item, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(TypedValue::List),
        }
    }

    fn check_facets(
        &self,
        normalized: &str,
        value: &TypedValue,
        ctx: &ValueContext<'_>,
    ) -> Result<(), InvalidValue> {
        let length = || value.length().unwrap_or_else(|| normalized.chars().count());
        let out_of_range = |facet: &str, bound: &TypedValue| {
            InvalidValue::new(format!("value '{}' violates {} {}", normalized, facet, bound))
        };

        for facet in &self.facets {
            match facet {
                Facet::Enumeration(values) => {
                    if !values.contains(value) {
                        return Err(InvalidValue::new(format!(
                            "value '{}' is not in the enumeration of '{}'",
                            normalized, self.name
                        )));
                    }
                }
                Facet::Pattern(patterns) => {
                    if !patterns.iter().any(|p| p.matches(normalized)) {
                        let sources: Vec<&str> = patterns.iter().map(|p| p.source()).collect();
                        return Err(InvalidValue::new(format!(
                            "value '{}' does not match pattern '{}'",
                            normalized,
                            sources.join("|")
                        )));
                    }
                }
                Facet::Length(n) if length() != *n => {
                    return Err(InvalidValue::new(format!(
                        "length of '{}' is not {}",
                        normalized, n
                    )));
                }
                Facet::MinLength(n) if length() < *n => {
                    return Err(InvalidValue::new(format!(
                        "length of '{}' is less than {}",
                        normalized, n
                    )));
                }
                Facet::MaxLength(n) if length() > *n => {
                    return Err(InvalidValue::new(format!(
                        "length of '{}' is greater than {}",
                        normalized, n
                    )));
                }
                Facet::MinInclusive(bound) => {
                    if !matches!(value.compare(bound), Some(o) if o.is_ge()) {
                        return Err(out_of_range("minInclusive", bound));
                    }
                }
                Facet::MaxInclusive(bound) => {
                    if !matches!(value.compare(bound), Some(o) if o.is_le()) {
                        return Err(out_of_range("maxInclusive", bound));
                    }
                }
                Facet::MinExclusive(bound) => {
                    if !matches!(value.compare(bound), Some(o) if o.is_gt()) {
                        return Err(out_of_range("minExclusive", bound));
                    }
                }
                Facet::MaxExclusive(bound) => {
                    if !matches!(value.compare(bound), Some(o) if o.is_lt()) {
                        return Err(out_of_range("maxExclusive", bound));
                    }
                }
                Facet::Assertion(expression) => match ctx.assertions {
                    Some(evaluator) => {
                        let context = AssertionContext {
                            type_name: &self.name,
                            lexical: normalized,
                        };
                        match evaluator.evaluate(expression, &context, &[("value", value)]) {
                            Ok(true) => {}
                            Ok(false) => {
                                return Err(InvalidValue::new(format!(
                                    "value '{}' fails assertion '{}'",
                                    normalized, expression
                                )))
                            }
                            Err(reason) => {
                                return Err(InvalidValue::new(format!(
                                    "assertion '{}' could not be evaluated: {}",
                                    expression, reason
                                )))
                            }
                        }
                    }
                    None => tracing::trace!(%expression, "no assertion evaluator; skipped"),
                },
                Facet::Length(_) | Facet::MinLength(_) | Facet::MaxLength(_) => {}
            }
        }
        Ok(())
    }
}

impl SimpleTypeValidator for SimpleTypeDefinition {
    fn name(&self) -> QName {
        self.name.clone()
    }

    fn white_space(&self) -> WhiteSpace {
        self.white_space
    }

    fn validate(&self, lexical: &str, ctx: &ValueContext<'_>) -> Result<TypedValue, InvalidValue> {
        let normalized = self.white_space.normalize(lexical);
        let base = self.resolve_base(ctx).ok_or_else(|| {
            InvalidValue::new(format!("base type '{}' of '{}' is unknown", self.base, self.name))
        })?;
        let value = self.typed_value(base, &normalized, ctx)?;
        self.check_facets(&normalized, &value, ctx)?;
        Ok(value)
    }
}

/// Shared handle to a pattern engine
pub type SharedPatternEngine = Arc<dyn PatternEngine>;
