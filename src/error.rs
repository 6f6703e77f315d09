//! Error types for xmlgrammar
//!
//! This module defines the fatal error type returned by fallible operations,
//! the grammar compile errors, and the structured violation records produced
//! while validating a document.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::namespaces::QName;

/// Result type alias using xmlgrammar Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlgrammar operations.
///
/// Validation violations are *not* errors in this sense: they are collected
/// as [`ValidationError`] records and never unwind a traversal. Only the
/// conditions below abort an operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Grammar compilation failed
    #[error("compile error: {0}")]
    Compile(#[from] CompileErrors),

    /// Internal invariant broken (grammar pool corruption, bad handle, ...)
    #[error("internal error: {0}")]
    Internal(String),

    /// Arena or table allocation failed
    #[error("capacity error: {0}")]
    Capacity(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// XML event source error
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Category of a grammar compile error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompileErrorKind {
    /// Two particles reachable at the same point match the same element (UPA)
    AmbiguousContentModel,
    /// An `all` group mixes occurrence ranges outside {0,1}x{1,unbounded}
    UnsupportedAllOccurrence,
    /// An `all` group nested inside another group
    MisplacedAllGroup,
    /// Identity constraint declared twice
    DuplicateIdentityConstraint,
    /// Element declared twice in the same scope
    DuplicateElement,
    /// Attribute declared twice on the same element
    DuplicateAttribute,
    /// Simple type declared twice, or shadowing a built-in type
    DuplicateType,
    /// Reference to an undeclared type or constraint
    UnresolvedReference,
    /// Selector or field expression outside the restricted XPath subset
    InvalidXPath,
    /// Facet value or pattern that cannot be compiled
    InvalidFacet,
    /// Occurrence bounds that are inconsistent (min > max)
    InvalidOccurs,
    /// A configured limit was exceeded while compiling
    LimitExceeded,
}

/// A single grammar compile error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    /// Error category
    pub kind: CompileErrorKind,
    /// Error message
    pub message: String,
    /// Grammar component that caused the error
    pub component: Option<String>,
}

impl CompileError {
    /// Create a new compile error
    pub fn new(kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            component: None,
        }
    }

    /// Set the component the error refers to
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref component) = self.component {
            write!(f, " (in {})", component)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// All errors produced while compiling one grammar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    /// Create an empty collection
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add an error
    pub fn push(&mut self, error: CompileError) {
        self.0.push(error);
    }

    /// Number of errors
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no error was recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the errors
    pub fn iter(&self) -> std::slice::Iter<'_, CompileError> {
        self.0.iter()
    }

    /// Check if any error has the given kind
    pub fn has_kind(&self, kind: CompileErrorKind) -> bool {
        self.0.iter().any(|e| e.kind == kind)
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.0 {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

impl From<CompileError> for CompileErrors {
    fn from(error: CompileError) -> Self {
        Self(vec![error])
    }
}

impl IntoIterator for CompileErrors {
    type Item = CompileError;
    type IntoIter = std::vec::IntoIter<CompileError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Category of a validation violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationKind {
    /// Child element not allowed at this position of the content model
    UnexpectedElement,
    /// Element ended before all mandatory children were seen
    IncompleteContent,
    /// Child element inside an EMPTY or simple-content element
    ElementNotAllowed,
    /// Character data where only element content is allowed
    TextNotAllowed,
    /// No declaration found for an element that must be declared
    UndeclaredElement,
    /// No declaration found for an attribute
    UndeclaredAttribute,
    /// Required attribute missing
    MissingAttribute,
    /// Attribute value not valid for its declared type
    InvalidAttributeValue,
    /// Value differs from the declared fixed value
    FixedValueMismatch,
    /// Character data not valid for the declared simple type
    InvalidValue,
    /// ID value used twice
    DuplicateId,
    /// IDREF pointing at no ID
    DanglingIdref,
    /// Duplicate tuple for a key/unique constraint
    DuplicateKey,
    /// Key tuple with an absent field
    IncompleteKey,
    /// A field expression matched more than one node in one scope
    FieldMultipleMatch,
    /// Keyref tuple with no matching key/unique tuple
    DanglingKeyref,
    /// Root element does not match the grammar
    RootMismatch,
}

/// A structured validation violation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Violation category
    pub kind: ViolationKind,
    /// Error message
    pub message: String,
    /// Offending element or attribute name
    pub name: Option<QName>,
    /// Offending value
    pub value: Option<String>,
    /// Path to the element where validation failed
    pub path: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            name: None,
            value: None,
            path: None,
        }
    }

    /// Set the offending name
    pub fn with_name(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Set the offending value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref value) = self.value {
            write!(f, "\n\nValue: {}", value)?;
        }

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new(ViolationKind::DuplicateKey, "duplicate key value")
            .with_value("1")
            .with_path("/root/item[2]");

        let msg = format!("{}", err);
        assert!(msg.contains("duplicate key value"));
        assert!(msg.contains("Value: 1"));
        assert!(msg.contains("Path: /root/item[2]"));
    }

    #[test]
    fn test_compile_errors_display() {
        let mut errors = CompileErrors::new();
        errors.push(
            CompileError::new(CompileErrorKind::AmbiguousContentModel, "ambiguous")
                .with_component("element 'a'"),
        );
        errors.push(CompileError::new(CompileErrorKind::InvalidXPath, "bad xpath"));

        let msg = errors.to_string();
        assert!(msg.contains("ambiguous (in element 'a')"));
        assert!(msg.contains("bad xpath"));
        assert!(errors.has_kind(CompileErrorKind::InvalidXPath));
        assert!(!errors.has_kind(CompileErrorKind::DuplicateElement));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = CompileErrors::from(CompileError::new(
            CompileErrorKind::InvalidOccurs,
            "min > max",
        ))
        .into();
        assert!(matches!(err, Error::Compile(_)));
    }

    #[test]
    fn test_violation_serializes() {
        let err = ValidationError::new(ViolationKind::DanglingKeyref, "missing")
            .with_name(QName::local("ref"));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"DanglingKeyref\""));
        assert!(json.contains("\"local_name\":\"ref\""));
    }
}
