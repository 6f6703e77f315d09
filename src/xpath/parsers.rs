//! XPath parser for identity constraints
//!
//! Selectors and fields use a restricted XPath subset:
//!
//! ```text
//! Selector ::= Path ( '|' Path )*
//! Path     ::= ('.//')? Step ( '/' Step )*
//! Step     ::= '.' | ('child::')? NameTest
//! Field    ::= ('.//')? ( Step '/' )* ( Step | ('@' | 'attribute::') NameTest )
//! NameTest ::= QName | '*' | NCName ':' '*'
//! ```
//!
//! Every path is evaluated relative to the element it is activated on, so
//! `.` steps are no-ops and a leading `.//` allows any number of levels
//! between the context element and the first child step.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#coss-identity-constraint

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::names::{is_valid_ncname, is_valid_qname};
use crate::namespaces::{NamespaceContext, QName};

/// Identity-constraint XPath parse error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XPathParseError {
    /// Empty expression or empty union member
    #[error("empty XPath expression")]
    Empty,
    /// Empty step between two slashes
    #[error("empty step in '{0}'")]
    EmptyStep(String),
    /// Axis outside child, attribute and self
    #[error("unsupported axis '{0}'")]
    UnsupportedAxis(String),
    /// Malformed name test
    #[error("invalid name test '{0}'")]
    InvalidNameTest(String),
    /// Attribute step not at the end of a field path
    #[error("attribute step must be the last step: '{0}'")]
    MisplacedAttribute(String),
    /// Attribute step in a selector
    #[error("attribute steps are not allowed in selectors: '{0}'")]
    AttributeInSelector(String),
    /// `//` anywhere but at the start of a path
    #[error("'//' is only allowed at the start of a path: '{0}'")]
    MisplacedDescendant(String),
    /// Prefix not bound in the namespace context
    #[error("unknown namespace prefix '{0}'")]
    UnknownPrefix(String),
}

/// Name test of a step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameTest {
    /// Exact qualified name
    Name(QName),
    /// `*`
    Any,
    /// `prefix:*`
    Namespace(Option<String>),
}

impl NameTest {
    /// Check if a name passes the test
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            NameTest::Name(expected) => expected == name,
            NameTest::Any => true,
            NameTest::Namespace(ns) => name.namespace() == ns.as_deref(),
        }
    }
}

impl fmt::Display for NameTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTest::Name(name) => write!(f, "{}", name),
            NameTest::Any => write!(f, "*"),
            NameTest::Namespace(Some(ns)) => write!(f, "{{{}}}*", ns),
            NameTest::Namespace(None) => write!(f, "{{}}*"),
        }
    }
}

/// One union member of a selector or field expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPath {
    descendant: bool,
    children: Vec<NameTest>,
    attribute: Option<NameTest>,
}

impl LocationPath {
    /// Check if the path starts with `.//`
    pub fn is_descendant(&self) -> bool {
        self.descendant
    }

    /// Child steps in order
    pub fn child_steps(&self) -> &[NameTest] {
        &self.children
    }

    /// Final attribute step, if any
    pub fn attribute(&self) -> Option<&NameTest> {
        self.attribute.as_ref()
    }
}

impl fmt::Display for LocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if self.descendant { ".//" } else { "./" })?;
        let mut steps: Vec<String> = self.children.iter().map(|s| s.to_string()).collect();
        if let Some(attribute) = &self.attribute {
            steps.push(format!("@{}", attribute));
        }
        if steps.is_empty() {
            steps.push(".".to_string());
        }
        write!(f, "{}", steps.join("/"))
    }
}

/// Parsed selector or field expression
#[derive(Debug, Clone)]
pub struct XPathExpression {
    source: String,
    paths: Arc<[LocationPath]>,
}

impl XPathExpression {
    /// Expression as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Union members
    pub fn paths(&self) -> &Arc<[LocationPath]> {
        &self.paths
    }
}

impl PartialEq for XPathExpression {
    fn eq(&self, other: &Self) -> bool {
        self.paths == other.paths
    }
}

impl Eq for XPathExpression {}

impl fmt::Display for XPathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Parser for identity constraint XPath (xs:selector, xs:field)
#[derive(Debug, Clone, Default)]
pub struct IdentityXPathParser {
    allow_attributes: bool,
}

impl IdentityXPathParser {
    /// Create a new parser for selector expressions
    pub fn new() -> Self {
        Self {
            allow_attributes: false,
        }
    }

    /// Create a parser for field expressions (allows a final attribute step)
    pub fn for_field() -> Self {
        Self {
            allow_attributes: true,
        }
    }

    /// Parse an expression; prefixes are resolved in `namespaces`, whose
    /// default namespace applies to unprefixed element names
    pub fn parse(
        &self,
        xpath: &str,
        namespaces: &NamespaceContext,
    ) -> Result<XPathExpression, XPathParseError> {
        if xpath.trim().is_empty() {
            return Err(XPathParseError::Empty);
        }
        let paths = xpath
            .split('|')
            .map(|member| self.parse_path(member, namespaces))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(XPathExpression {
            source: xpath.to_string(),
            paths: paths.into(),
        })
    }

    fn parse_path(
        &self,
        member: &str,
        namespaces: &NamespaceContext,
    ) -> Result<LocationPath, XPathParseError> {
        let text = member.trim();
        if text.is_empty() {
            return Err(XPathParseError::Empty);
        }
        let (descendant, rest) = match text.strip_prefix(".//") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, text),
        };

        let mut path = LocationPath {
            descendant,
            children: Vec::new(),
            attribute: None,
        };
        let segments: Vec<&str> = rest.split('/').map(str::trim).collect();
        let last = segments.len() - 1;

        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(if rest.contains("//") || (i == 0 && rest.starts_with('/')) {
                    XPathParseError::MisplacedDescendant(text.to_string())
                } else {
                    XPathParseError::EmptyStep(text.to_string())
                });
            }
            if *segment == "." || *segment == "self::node()" {
                continue;
            }
            if let Some(name) = segment
                .strip_prefix('@')
                .or_else(|| segment.strip_prefix("attribute::"))
            {
                if !self.allow_attributes {
                    return Err(XPathParseError::AttributeInSelector(text.to_string()));
                }
                if i != last {
                    return Err(XPathParseError::MisplacedAttribute(text.to_string()));
                }
                path.attribute = Some(parse_name_test(name.trim(), namespaces, true)?);
                continue;
            }
            let name = segment.strip_prefix("child::").unwrap_or(segment).trim();
            if let Some((axis, _)) = name.split_once("::") {
                return Err(XPathParseError::UnsupportedAxis(axis.to_string()));
            }
            path.children.push(parse_name_test(name, namespaces, false)?);
        }
        Ok(path)
    }
}

fn parse_name_test(
    name: &str,
    namespaces: &NamespaceContext,
    attribute: bool,
) -> Result<NameTest, XPathParseError> {
    if name == "*" {
        return Ok(NameTest::Any);
    }
    if let Some(prefix) = name.strip_suffix(":*") {
        if !is_valid_ncname(prefix) {
            return Err(XPathParseError::InvalidNameTest(name.to_string()));
        }
        let ns = namespaces
            .get_namespace(prefix)
            .ok_or_else(|| XPathParseError::UnknownPrefix(prefix.to_string()))?;
        return Ok(NameTest::Namespace(Some(ns.to_string())));
    }
    if !is_valid_qname(name) {
        return Err(XPathParseError::InvalidNameTest(name.to_string()));
    }
    let qname = match name.split_once(':') {
        Some((prefix, local)) => {
            let ns = namespaces
                .get_namespace(prefix)
                .ok_or_else(|| XPathParseError::UnknownPrefix(prefix.to_string()))?;
            QName::namespaced(ns, local)
        }
        None if attribute => QName::local(name),
        None => QName::new(namespaces.get_default_namespace(), name),
    };
    Ok(NameTest::Name(qname))
}
