//! # xmlgrammar
//!
//! Grammar-driven validation of XML documents: compiled DTD and XML Schema
//! content models, identity constraints and a shared grammar pool.
//!
//! ## Features
//!
//! - Content models compiled into DFAs with Unique Particle Attribution
//!   checking
//! - Counted `all` groups, mixed content, wildcards and substitution groups
//! - Attribute validation with ID/IDREF tracking
//! - Built-in datatypes and restricted simple types with facets
//! - `xs:key`, `xs:unique` and `xs:keyref` over the identity XPath subset
//! - A thread-safe pool of compiled grammars
//! - Streaming (`quick-xml`) and tree (`roxmltree`) event sources
//!
//! ## Example
//!
//! ```rust
//! use xmlgrammar::documents::validate_str;
//! use xmlgrammar::validators::{ContentSource, DocumentValidator, ElementSource, GrammarBuilder, Particle};
//! use xmlgrammar::{Limits, QName};
//!
//! let grammar = GrammarBuilder::dtd("list")
//!     .with_element(ElementSource::global(
//!         QName::local("list"),
//!         ContentSource::Children(Particle::local("item").one_or_more()),
//!     ))
//!     .with_element(ElementSource::global(QName::local("item"), ContentSource::Empty))
//!     .compile(&Limits::default())?;
//!
//! let mut validator = DocumentValidator::new(&grammar);
//! let report = validate_str(&mut validator, "<list><item/><item/></list>")?;
//! assert!(report.valid);
//! # Ok::<(), xmlgrammar::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names
pub mod namespaces;
pub mod names;

// Grammars and validation
pub mod validators;
pub mod xpath;

// Sharing and drivers
pub mod pool;
pub mod session;
pub mod documents;

pub use error::{
    CompileError, CompileErrorKind, CompileErrors, Error, Result, ValidationError, ViolationKind,
};
pub use limits::Limits;
pub use namespaces::{NamespaceContext, QName};
pub use pool::GrammarPool;
pub use session::ValidationSession;
pub use validators::{
    DocumentValidator, Grammar, GrammarBuilder, GrammarDescription, GrammarKind, Outcome,
    ValidationOptions, ValidationReport,
};
