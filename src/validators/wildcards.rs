//! Wildcard terms
//!
//! This module implements the wildcard terms of content models:
//! - `any` - matches an element in any namespace
//! - `any-namespace(ns)` - matches an element in exactly one namespace
//! - `any-other(ns)` - matches an element in any namespace but one
//!
//! A namespace list such as `namespace="a b ##local"` is lowered into one
//! `any-namespace` wildcard per entry, which the compiler turns into a choice.

use std::fmt;

use crate::error::{CompileError, CompileErrorKind};
use crate::namespaces::QName;

/// Namespace key carried by a wildcard (`None` is "no namespace")
pub type NamespaceKey = Option<String>;

/// Process contents mode for wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessContents {
    /// Validate strictly - element/attribute must be declared
    #[default]
    Strict,
    /// Validate if declaration found, otherwise accept
    Lax,
    /// Skip validation entirely
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lax => write!(f, "lax"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Namespace constraint of a wildcard.
///
/// The `AnyNamespace` and `AnyOther` variants always carry their key; the
/// "no namespace" key is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WildcardKind {
    /// Any namespace is allowed (`##any`)
    Any,
    /// Only the given namespace is allowed
    AnyNamespace(NamespaceKey),
    /// Any namespace except the given one (`##other`)
    AnyOther(NamespaceKey),
}

impl WildcardKind {
    /// Check if a namespace is allowed by this constraint
    pub fn allows_namespace(&self, namespace: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::AnyNamespace(ns) => ns.as_deref() == namespace,
            Self::AnyOther(ns) => ns.as_deref() != namespace,
        }
    }
}

impl fmt::Display for WildcardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "##any"),
            Self::AnyNamespace(Some(ns)) => write!(f, "{{{}}}*", ns),
            Self::AnyNamespace(None) => write!(f, "##local"),
            Self::AnyOther(Some(ns)) => write!(f, "##other({})", ns),
            Self::AnyOther(None) => write!(f, "##other(##local)"),
        }
    }
}

/// Wildcard term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Wildcard {
    /// Namespace constraint
    pub kind: WildcardKind,
    /// Process contents mode
    pub process_contents: ProcessContents,
}

impl Wildcard {
    /// Create a wildcard with strict processing
    pub fn new(kind: WildcardKind) -> Self {
        Self {
            kind,
            process_contents: ProcessContents::Strict,
        }
    }

    /// `##any`
    pub fn any() -> Self {
        Self::new(WildcardKind::Any)
    }

    /// Wildcard restricted to one namespace
    pub fn namespace(namespace: Option<&str>) -> Self {
        Self::new(WildcardKind::AnyNamespace(namespace.map(String::from)))
    }

    /// Wildcard excluding one namespace
    pub fn other(namespace: Option<&str>) -> Self {
        Self::new(WildcardKind::AnyOther(namespace.map(String::from)))
    }

    /// Set the process contents mode
    pub fn with_process_contents(mut self, process_contents: ProcessContents) -> Self {
        self.process_contents = process_contents;
        self
    }

    /// Check if a namespace is allowed
    pub fn allows_namespace(&self, namespace: Option<&str>) -> bool {
        self.kind.allows_namespace(namespace)
    }

    /// Check if an element or attribute name matches this wildcard
    pub fn allows(&self, name: &QName) -> bool {
        self.allows_namespace(name.namespace())
    }

    /// Lower a `namespace` attribute value into wildcard terms.
    ///
    /// `##any` and `##other` yield a single wildcard; a list yields one
    /// `any-namespace` wildcard per entry (an empty list matches nothing).
    pub fn from_namespace_attr(
        value: &str,
        target_namespace: Option<&str>,
        process_contents: ProcessContents,
    ) -> Result<Vec<Self>, CompileError> {
        let make = |kind| Self {
            kind,
            process_contents,
        };

        match value.trim() {
            "##any" => Ok(vec![make(WildcardKind::Any)]),
            "##other" => Ok(vec![make(WildcardKind::AnyOther(
                target_namespace.map(String::from),
            ))]),
            list => {
                let mut wildcards: Vec<Self> = Vec::new();
                for ns in list.split_whitespace() {
                    let key = match ns {
                        "##local" => None,
                        "##targetNamespace" => target_namespace.map(String::from),
                        s if s.starts_with("##") => {
                            return Err(CompileError::new(
                                CompileErrorKind::InvalidFacet,
                                format!("wrong value '{}' in 'namespace' attribute", s),
                            ));
                        }
                        uri => Some(uri.to_string()),
                    };
                    let wildcard = make(WildcardKind::AnyNamespace(key));
                    if !wildcards.contains(&wildcard) {
                        wildcards.push(wildcard);
                    }
                }
                Ok(wildcards)
            }
        }
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}
