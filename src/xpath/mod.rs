//! XPath support for identity constraints
//!
//! Identity constraints select nodes with a restricted XPath subset:
//!
//! ```text
//! Selector ::= Path ( '|' Path )*
//! Path     ::= ('.//')? Step ( '/' Step )*
//! Field    ::= ('.//')? ( Step '/' )* ( Step | '@' NameTest )
//! Step     ::= '.' | NameTest
//! NameTest ::= QName | '*' | NCName ':' '*'
//! ```
//!
//! [`IdentityXPathParser`] compiles expressions into [`XPathExpression`]s,
//! and [`XPathMatcher`] evaluates them incrementally over element events.

mod matcher;
mod parsers;

pub use matcher::{MatchAttribute, MatchEvent, MatchKind, MatchedValue, StartMatch, XPathMatcher};
pub use parsers::{
    IdentityXPathParser, LocationPath, NameTest, XPathExpression, XPathParseError,
};
