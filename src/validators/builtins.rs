//! Built-in datatypes
//!
//! The registry of built-in simple types used by attribute declarations,
//! simple-content elements and identity-constraint field typing. Each type
//! maps a lexical value into a [`TypedValue`], the value space used for
//! facet checks and key comparison.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-2/#built-in-datatypes

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

use crate::names::{is_valid_name, is_valid_ncname, is_valid_nmtoken, is_valid_qname, split_qname};
use crate::namespaces::{NamespaceContext, QName, XSD_NAMESPACE};

use super::facets::{AssertionEvaluator, WhiteSpace};
use super::grammar::Grammar;

/// Lexical value rejected by a simple type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct InvalidValue {
    /// Why the value was rejected
    pub reason: String,
}

impl InvalidValue {
    /// Create a new invalid value error
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Value in the value space of a simple type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypedValue {
    /// String-derived value (after whitespace normalization)
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Decimal or integer value, normalized (no trailing zeros)
    Decimal(Decimal),
    /// Float or double value, stored as its bit pattern
    Double(u64),
    /// Date with an optional timezone offset in minutes
    Date {
        /// Calendar date
        value: NaiveDate,
        /// Timezone offset in minutes
        timezone: Option<i32>,
    },
    /// Date and time, normalized to UTC when a timezone was given
    DateTime {
        /// Date and time
        value: NaiveDateTime,
        /// Whether a timezone was given
        timezoned: bool,
    },
    /// Time of day, normalized to UTC when a timezone was given
    Time {
        /// Time of day
        value: NaiveTime,
        /// Whether a timezone was given
        timezoned: bool,
    },
    /// Binary data (base64Binary, hexBinary)
    Binary(Vec<u8>),
    /// URI reference
    Uri(String),
    /// Resolved qualified name
    QName(QName),
    /// List of item values
    List(Vec<TypedValue>),
}

impl TypedValue {
    /// Build a double value
    pub fn double(value: f64) -> Self {
        // 0.0 and -0.0 are equal in the value space
        let value = if value == 0.0 { 0.0 } else { value };
        TypedValue::Double(value.to_bits())
    }

    /// Order two values of the same ordered type
    pub fn compare(&self, other: &TypedValue) -> Option<Ordering> {
        match (self, other) {
            (TypedValue::Decimal(a), TypedValue::Decimal(b)) => Some(a.cmp(b)),
            (TypedValue::Double(a), TypedValue::Double(b)) => {
                f64::from_bits(*a).partial_cmp(&f64::from_bits(*b))
            }
            (
                TypedValue::Date { value: a, timezone: ta },
                TypedValue::Date { value: b, timezone: tb },
            ) if ta.is_some() == tb.is_some() => Some(a.cmp(b)),
            (
                TypedValue::DateTime { value: a, timezoned: ta },
                TypedValue::DateTime { value: b, timezoned: tb },
            ) if ta == tb => Some(a.cmp(b)),
            (
                TypedValue::Time { value: a, timezoned: ta },
                TypedValue::Time { value: b, timezoned: tb },
            ) if ta == tb => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Length of the value as measured by the length facets
    pub fn length(&self) -> Option<usize> {
        match self {
            TypedValue::String(s) | TypedValue::Uri(s) => Some(s.chars().count()),
            TypedValue::Binary(bytes) => Some(bytes.len()),
            TypedValue::List(items) => Some(items.len()),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) | TypedValue::Uri(s) => write!(f, "{}", s),
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::Decimal(d) => write!(f, "{}", d),
            TypedValue::Double(bits) => write!(f, "{}", f64::from_bits(*bits)),
            TypedValue::Date { value, .. } => write!(f, "{}", value),
            TypedValue::DateTime { value, .. } => write!(f, "{}", value),
            TypedValue::Time { value, .. } => write!(f, "{}", value),
            TypedValue::Binary(bytes) => write!(f, "[{} bytes]", bytes.len()),
            TypedValue::QName(name) => write!(f, "{}", name),
            TypedValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// Context handed to simple-type validators
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueContext<'a> {
    /// Grammar used to resolve user-defined base types
    pub grammar: Option<&'a Grammar>,
    /// In-scope namespaces for QName values
    pub namespaces: Option<&'a NamespaceContext>,
    /// Evaluator for assertion facets
    pub assertions: Option<&'a dyn AssertionEvaluator>,
}

impl<'a> ValueContext<'a> {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grammar
    pub fn with_grammar(mut self, grammar: &'a Grammar) -> Self {
        self.grammar = Some(grammar);
        self
    }

    /// Set the namespace context
    pub fn with_namespaces(mut self, namespaces: &'a NamespaceContext) -> Self {
        self.namespaces = Some(namespaces);
        self
    }

    /// Set the assertion evaluator
    pub fn with_assertions(mut self, assertions: &'a dyn AssertionEvaluator) -> Self {
        self.assertions = Some(assertions);
        self
    }
}

/// A simple type: maps a lexical value to a typed value or rejects it
pub trait SimpleTypeValidator: fmt::Debug + Send + Sync {
    /// Qualified name of the type
    fn name(&self) -> QName;

    /// Whitespace normalization applied before validation
    fn white_space(&self) -> WhiteSpace;

    /// Validate a lexical value
    fn validate(&self, lexical: &str, ctx: &ValueContext<'_>) -> Result<TypedValue, InvalidValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinKind {
    AnySimple,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NcName,
    Nmtoken,
    Boolean,
    Decimal,
    Integer { min: Option<i128>, max: Option<i128> },
    Double,
    Date,
    DateTime,
    Time,
    AnyUri,
    Base64Binary,
    HexBinary,
    QName,
    List(&'static str),
}

/// Definition of a built-in type
#[derive(Debug, Clone)]
pub struct BuiltinType {
    name: &'static str,
    base: Option<&'static str>,
    white_space: WhiteSpace,
    kind: BuiltinKind,
}

impl BuiltinType {
    const fn new(
        name: &'static str,
        base: Option<&'static str>,
        white_space: WhiteSpace,
        kind: BuiltinKind,
    ) -> Self {
        Self {
            name,
            base,
            white_space,
            kind,
        }
    }

    /// Local name of the type
    pub fn local_name(&self) -> &'static str {
        self.name
    }

    /// Local name of the base type
    pub fn base(&self) -> Option<&'static str> {
        self.base
    }

    /// Check if the type is a list type (NMTOKENS, IDREFS, ENTITIES)
    pub fn is_list(&self) -> bool {
        matches!(self.kind, BuiltinKind::List(_))
    }

    /// Check if the type is derived from `ancestor` (or is `ancestor`)
    pub fn derives_from(&self, ancestor: &str) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty.name == ancestor {
                return true;
            }
            current = ty.base.and_then(builtin_type);
        }
        false
    }

    fn check(&self, value: &str, ctx: &ValueContext<'_>) -> Result<TypedValue, InvalidValue> {
        match self.kind {
            BuiltinKind::AnySimple | BuiltinKind::String => Ok(TypedValue::String(value.to_string())),
            BuiltinKind::NormalizedString | BuiltinKind::Token => {
                Ok(TypedValue::String(value.to_string()))
            }
            BuiltinKind::Language => {
                if LANGUAGE.is_match(value) {
                    Ok(TypedValue::String(value.to_string()))
                } else {
                    Err(InvalidValue::new(format!("'{}' is not a valid language tag", value)))
                }
            }
            BuiltinKind::Name => lexical(value, is_valid_name(value), "Name"),
            BuiltinKind::NcName => lexical(value, is_valid_ncname(value), self.name),
            BuiltinKind::Nmtoken => lexical(value, is_valid_nmtoken(value), "NMTOKEN"),
            BuiltinKind::Boolean => parse_boolean(value),
            BuiltinKind::Decimal => parse_decimal(value).map(TypedValue::Decimal),
            BuiltinKind::Integer { min, max } => parse_integer(value, self.name, min, max),
            BuiltinKind::Double => parse_double(value),
            BuiltinKind::Date => parse_date(value),
            BuiltinKind::DateTime => parse_date_time(value),
            BuiltinKind::Time => parse_time(value),
            BuiltinKind::AnyUri => parse_any_uri(value),
            BuiltinKind::Base64Binary => parse_base64(value),
            BuiltinKind::HexBinary => parse_hex(value),
            BuiltinKind::QName => parse_qname(value, ctx),
            BuiltinKind::List(item) => {
                let item_type = builtin_type(item)
                    .ok_or_else(|| InvalidValue::new(format!("unknown item type '{}'", item)))?;
                let items = value
                    .split_whitespace()
                    .map(|token| item_type.validate(token, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                if items.is_empty() {
                    return Err(InvalidValue::new(format!("{} value must not be empty", self.name)));
                }
                Ok(TypedValue::List(items))
            }
        }
    }
}

impl SimpleTypeValidator for BuiltinType {
    fn name(&self) -> QName {
        QName::namespaced(XSD_NAMESPACE, self.name)
    }

    fn white_space(&self) -> WhiteSpace {
        self.white_space
    }

    fn validate(&self, lexical: &str, ctx: &ValueContext<'_>) -> Result<TypedValue, InvalidValue> {
        let normalized = self.white_space.normalize(lexical);
        self.check(&normalized, ctx)
    }
}

static LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").unwrap());

static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap());

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());

static DOUBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?|-?INF|\+INF|NaN)$").unwrap()
});

fn lexical(value: &str, valid: bool, type_name: &str) -> Result<TypedValue, InvalidValue> {
    if valid {
        Ok(TypedValue::String(value.to_string()))
    } else {
        Err(InvalidValue::new(format!("'{}' is not a valid {}", value, type_name)))
    }
}

fn parse_boolean(value: &str) -> Result<TypedValue, InvalidValue> {
    match value {
        "true" | "1" => Ok(TypedValue::Boolean(true)),
        "false" | "0" => Ok(TypedValue::Boolean(false)),
        _ => Err(InvalidValue::new(format!("'{}' is not a valid boolean", value))),
    }
}

/// Parse an xs:decimal lexical value
pub fn parse_decimal(value: &str) -> Result<Decimal, InvalidValue> {
    if !DECIMAL.is_match(value) {
        return Err(InvalidValue::new(format!("'{}' is not a valid decimal", value)));
    }
    let unsigned = value.strip_prefix('+').unwrap_or(value);
    let (negative, digits) = match unsigned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, unsigned),
    };
    let mut digits = digits.trim_end_matches('.').to_string();
    if digits.starts_with('.') {
        digits.insert(0, '0');
    }
    let parsed = Decimal::from_str(&digits)
        .map_err(|e| InvalidValue::new(format!("decimal '{}' out of range: {}", value, e)))?;
    let parsed = if negative { -parsed } else { parsed };
    Ok(parsed.normalize())
}

fn parse_integer(
    value: &str,
    type_name: &str,
    min: Option<i128>,
    max: Option<i128>,
) -> Result<TypedValue, InvalidValue> {
    if !INTEGER.is_match(value) {
        return Err(InvalidValue::new(format!("'{}' is not a valid {}", value, type_name)));
    }
    let parsed = parse_decimal(value)?;
    if let Some(min) = min {
        if parsed < Decimal::from_i128_with_scale(min, 0) {
            return Err(InvalidValue::new(format!(
                "{} is below the minimum {} of {}",
                value, min, type_name
            )));
        }
    }
    if let Some(max) = max {
        if parsed > Decimal::from_i128_with_scale(max, 0) {
            return Err(InvalidValue::new(format!(
                "{} is above the maximum {} of {}",
                value, max, type_name
            )));
        }
    }
    Ok(TypedValue::Decimal(parsed))
}

fn parse_double(value: &str) -> Result<TypedValue, InvalidValue> {
    if !DOUBLE.is_match(value) {
        return Err(InvalidValue::new(format!("'{}' is not a valid double", value)));
    }
    let parsed = match value {
        "INF" | "+INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        "NaN" => f64::NAN,
        _ => value
            .parse::<f64>()
            .map_err(|e| InvalidValue::new(format!("'{}' is not a valid double: {}", value, e)))?,
    };
    Ok(TypedValue::double(parsed))
}

/// Split a trailing timezone (`Z` or `+hh:mm`) into an offset in minutes
fn split_timezone(value: &str) -> Result<(&str, Option<i32>), InvalidValue> {
    if let Some(rest) = value.strip_suffix('Z') {
        return Ok((rest, Some(0)));
    }
    let bytes = value.as_bytes();
    let len = bytes.len();
    if len >= 6 && matches!(bytes[len - 6], b'+' | b'-') && bytes[len - 3] == b':' {
        let hours: i32 = value[len - 5..len - 3]
            .parse()
            .map_err(|_| InvalidValue::new(format!("invalid timezone in '{}'", value)))?;
        let minutes: i32 = value[len - 2..]
            .parse()
            .map_err(|_| InvalidValue::new(format!("invalid timezone in '{}'", value)))?;
        if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
            return Err(InvalidValue::new(format!("timezone out of range in '{}'", value)));
        }
        let offset = hours * 60 + minutes;
        let offset = if bytes[len - 6] == b'-' { -offset } else { offset };
        return Ok((&value[..len - 6], Some(offset)));
    }
    Ok((value, None))
}

fn parse_date(value: &str) -> Result<TypedValue, InvalidValue> {
    let (date, timezone) = split_timezone(value)?;
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| InvalidValue::new(format!("'{}' is not a valid date: {}", value, e)))?;
    Ok(TypedValue::Date {
        value: parsed,
        timezone,
    })
}

fn parse_date_time(value: &str) -> Result<TypedValue, InvalidValue> {
    let (date_time, timezone) = split_timezone(value)?;
    let parsed = NaiveDateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| InvalidValue::new(format!("'{}' is not a valid dateTime: {}", value, e)))?;
    let normalized = match timezone {
        Some(offset) => parsed
            .checked_sub_signed(Duration::minutes(offset as i64))
            .ok_or_else(|| InvalidValue::new(format!("dateTime '{}' out of range", value)))?,
        None => parsed,
    };
    Ok(TypedValue::DateTime {
        value: normalized,
        timezoned: timezone.is_some(),
    })
}

fn parse_time(value: &str) -> Result<TypedValue, InvalidValue> {
    let (time, timezone) = split_timezone(value)?;
    let parsed = NaiveTime::parse_from_str(time, "%H:%M:%S%.f")
        .map_err(|e| InvalidValue::new(format!("'{}' is not a valid time: {}", value, e)))?;
    let normalized = match timezone {
        Some(offset) => parsed.overflowing_sub_signed(Duration::minutes(offset as i64)).0,
        None => parsed,
    };
    Ok(TypedValue::Time {
        value: normalized,
        timezoned: timezone.is_some(),
    })
}

fn parse_any_uri(value: &str) -> Result<TypedValue, InvalidValue> {
    if value.chars().any(|c| c.is_whitespace()) {
        return Err(InvalidValue::new(format!("'{}' is not a valid anyURI", value)));
    }
    match Url::parse(value) {
        Ok(_) => Ok(TypedValue::Uri(value.to_string())),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("http://relative.invalid/")
                .map_err(|e| InvalidValue::new(e.to_string()))?;
            base.join(value)
                .map(|_| TypedValue::Uri(value.to_string()))
                .map_err(|e| InvalidValue::new(format!("'{}' is not a valid anyURI: {}", value, e)))
        }
        Err(e) => Err(InvalidValue::new(format!("'{}' is not a valid anyURI: {}", value, e))),
    }
}

fn parse_base64(value: &str) -> Result<TypedValue, InvalidValue> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map(TypedValue::Binary)
        .map_err(|e| InvalidValue::new(format!("invalid base64Binary value: {}", e)))
}

fn parse_hex(value: &str) -> Result<TypedValue, InvalidValue> {
    if value.len() % 2 != 0 {
        return Err(InvalidValue::new("hexBinary value must have an even number of digits"));
    }
    let mut bytes = Vec::with_capacity(value.len() / 2);
    let digits = value.as_bytes();
    for pair in digits.chunks(2) {
        let text = std::str::from_utf8(pair)
            .map_err(|_| InvalidValue::new("invalid hexBinary value"))?;
        let byte = u8::from_str_radix(text, 16)
            .map_err(|_| InvalidValue::new(format!("invalid hexBinary digits '{}'", text)))?;
        bytes.push(byte);
    }
    Ok(TypedValue::Binary(bytes))
}

fn parse_qname(value: &str, ctx: &ValueContext<'_>) -> Result<TypedValue, InvalidValue> {
    if !is_valid_qname(value) {
        return Err(InvalidValue::new(format!("'{}' is not a valid QName", value)));
    }
    match ctx.namespaces {
        Some(namespaces) => namespaces
            .resolve(value)
            .map(TypedValue::QName)
            .map_err(|e| InvalidValue::new(e.message)),
        None => {
            let (_, local) = split_qname(value);
            Ok(TypedValue::QName(QName::local(local)))
        }
    }
}

macro_rules! builtin {
    ($name:literal, $base:expr, $ws:ident, $kind:expr) => {
        BuiltinType::new($name, $base, WhiteSpace::$ws, $kind)
    };
}

static BUILTIN_TYPES: Lazy<IndexMap<&'static str, BuiltinType>> = Lazy::new(|| {
    use BuiltinKind as K;

    let int = |min: i128, max: i128| K::Integer {
        min: Some(min),
        max: Some(max),
    };

    let types = [
        builtin!("anySimpleType", None, Preserve, K::AnySimple),
        builtin!("string", Some("anySimpleType"), Preserve, K::String),
        builtin!("normalizedString", Some("string"), Replace, K::NormalizedString),
        builtin!("token", Some("normalizedString"), Collapse, K::Token),
        builtin!("language", Some("token"), Collapse, K::Language),
        builtin!("Name", Some("token"), Collapse, K::Name),
        builtin!("NCName", Some("Name"), Collapse, K::NcName),
        builtin!("ID", Some("NCName"), Collapse, K::NcName),
        builtin!("IDREF", Some("NCName"), Collapse, K::NcName),
        builtin!("ENTITY", Some("NCName"), Collapse, K::NcName),
        builtin!("NMTOKEN", Some("token"), Collapse, K::Nmtoken),
        builtin!("NMTOKENS", Some("anySimpleType"), Collapse, K::List("NMTOKEN")),
        builtin!("IDREFS", Some("anySimpleType"), Collapse, K::List("IDREF")),
        builtin!("ENTITIES", Some("anySimpleType"), Collapse, K::List("ENTITY")),
        builtin!("boolean", Some("anySimpleType"), Collapse, K::Boolean),
        builtin!("decimal", Some("anySimpleType"), Collapse, K::Decimal),
        builtin!("integer", Some("decimal"), Collapse, K::Integer { min: None, max: None }),
        builtin!(
            "nonNegativeInteger",
            Some("integer"),
            Collapse,
            K::Integer { min: Some(0), max: None }
        ),
        builtin!(
            "positiveInteger",
            Some("nonNegativeInteger"),
            Collapse,
            K::Integer { min: Some(1), max: None }
        ),
        builtin!(
            "nonPositiveInteger",
            Some("integer"),
            Collapse,
            K::Integer { min: None, max: Some(0) }
        ),
        builtin!(
            "negativeInteger",
            Some("nonPositiveInteger"),
            Collapse,
            K::Integer { min: None, max: Some(-1) }
        ),
        builtin!("long", Some("integer"), Collapse, int(i64::MIN as i128, i64::MAX as i128)),
        builtin!("int", Some("long"), Collapse, int(i32::MIN as i128, i32::MAX as i128)),
        builtin!("short", Some("int"), Collapse, int(i16::MIN as i128, i16::MAX as i128)),
        builtin!("byte", Some("short"), Collapse, int(i8::MIN as i128, i8::MAX as i128)),
        builtin!("unsignedLong", Some("nonNegativeInteger"), Collapse, int(0, u64::MAX as i128)),
        builtin!("unsignedInt", Some("unsignedLong"), Collapse, int(0, u32::MAX as i128)),
        builtin!("unsignedShort", Some("unsignedInt"), Collapse, int(0, u16::MAX as i128)),
        builtin!("unsignedByte", Some("unsignedShort"), Collapse, int(0, u8::MAX as i128)),
        builtin!("double", Some("anySimpleType"), Collapse, K::Double),
        builtin!("float", Some("anySimpleType"), Collapse, K::Double),
        builtin!("date", Some("anySimpleType"), Collapse, K::Date),
        builtin!("dateTime", Some("anySimpleType"), Collapse, K::DateTime),
        builtin!("time", Some("anySimpleType"), Collapse, K::Time),
        builtin!("anyURI", Some("anySimpleType"), Collapse, K::AnyUri),
        builtin!("base64Binary", Some("anySimpleType"), Collapse, K::Base64Binary),
        builtin!("hexBinary", Some("anySimpleType"), Collapse, K::HexBinary),
        builtin!("QName", Some("anySimpleType"), Collapse, K::QName),
        builtin!("NOTATION", Some("anySimpleType"), Collapse, K::QName),
    ];

    types.into_iter().map(|ty| (ty.name, ty)).collect()
});

/// Look up a built-in type by local name
pub fn builtin_type(local_name: &str) -> Option<&'static BuiltinType> {
    BUILTIN_TYPES.get(local_name)
}

/// Look up a built-in type by qualified name.
///
/// Names in the XSD namespace and unqualified names (as used by DTD
/// attribute types) are both accepted.
pub fn builtin_for(name: &QName) -> Option<&'static BuiltinType> {
    match name.namespace() {
        None | Some(XSD_NAMESPACE) => builtin_type(&name.local_name),
        Some(_) => None,
    }
}

/// Iterate over all built-in types in registration order
pub fn builtin_types() -> impl Iterator<Item = &'static BuiltinType> {
    BUILTIN_TYPES.values()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(name: &str, value: &str) -> Result<TypedValue, InvalidValue> {
        builtin_type(name).unwrap().validate(value, &ValueContext::new())
    }

    #[test]
    fn test_registry_lookup() {
        assert!(builtin_type("string").is_some());
        assert!(builtin_type("unknown").is_none());
        assert!(builtin_for(&QName::namespaced(XSD_NAMESPACE, "int")).is_some());
        assert!(builtin_for(&QName::local("ID")).is_some());
        assert!(builtin_for(&QName::namespaced("urn:other", "int")).is_none());
        assert!(builtin_types().count() > 30);
    }

    #[test]
    fn test_derivation_chain() {
        let byte = builtin_type("byte").unwrap();
        assert!(byte.derives_from("integer"));
        assert!(byte.derives_from("decimal"));
        assert!(!byte.derives_from("string"));
    }

    #[test]
    fn test_string_types_normalize() {
        assert_eq!(
            validate("token", "  a \t b  ").unwrap(),
            TypedValue::String("a b".to_string())
        );
        assert_eq!(
            validate("normalizedString", "a\nb").unwrap(),
            TypedValue::String("a b".to_string())
        );
        assert!(validate("NCName", "a:b").is_err());
        assert!(validate("NMTOKEN", "a b").is_err());
        assert!(validate("language", "en-US").is_ok());
    }

    #[test]
    fn test_decimal_values_compare_by_value() {
        assert_eq!(validate("decimal", "1.0").unwrap(), validate("decimal", "1").unwrap());
        assert_eq!(validate("decimal", "+.5").unwrap(), validate("decimal", "0.50").unwrap());
        assert!(validate("decimal", "1e3").is_err());
    }

    #[test]
    fn test_integer_bounds() {
        assert!(validate("integer", "123456789012345678901234").is_ok());
        assert!(validate("integer", "1.5").is_err());
        assert!(validate("byte", "127").is_ok());
        assert!(validate("byte", "128").is_err());
        assert!(validate("positiveInteger", "0").is_err());
        assert!(validate("unsignedInt", "-1").is_err());
    }

    #[test]
    fn test_boolean_and_double() {
        assert_eq!(validate("boolean", "1").unwrap(), TypedValue::Boolean(true));
        assert!(validate("boolean", "yes").is_err());
        assert_eq!(validate("double", "1e0").unwrap(), validate("double", "1.0").unwrap());
        assert!(validate("double", "INF").is_ok());
        assert!(validate("double", "abc").is_err());
    }

    #[test]
    fn test_dates() {
        assert!(validate("date", "2024-02-29").is_ok());
        assert!(validate("date", "2023-02-29").is_err());
        assert!(validate("date", "2024-01-01Z").is_ok());
        assert!(validate("date", "2024-01-01+05:30").is_ok());
        assert_eq!(
            validate("dateTime", "2024-01-01T12:00:00Z").unwrap(),
            validate("dateTime", "2024-01-01T13:00:00+01:00").unwrap()
        );
        assert!(validate("dateTime", "2024-01-01").is_err());
        assert!(validate("time", "23:59:59.5").is_ok());
    }

    #[test]
    fn test_uri_and_binary() {
        assert!(validate("anyURI", "http://example.com/a").is_ok());
        assert!(validate("anyURI", "relative/path").is_ok());
        assert!(validate("anyURI", "has space").is_err());
        assert_eq!(
            validate("base64Binary", "aGVs bG8=").unwrap(),
            TypedValue::Binary(b"hello".to_vec())
        );
        assert_eq!(validate("hexBinary", "0aFF").unwrap(), TypedValue::Binary(vec![10, 255]));
        assert!(validate("hexBinary", "abc").is_err());
    }

    #[test]
    fn test_list_types() {
        assert_eq!(
            validate("IDREFS", " a  b ").unwrap(),
            TypedValue::List(vec![
                TypedValue::String("a".to_string()),
                TypedValue::String("b".to_string())
            ])
        );
        assert!(validate("NMTOKENS", "").is_err());
        assert!(builtin_type("IDREFS").unwrap().is_list());
    }

    #[test]
    fn test_qname_resolution() {
        let ns = NamespaceContext::new().with_prefix("p", "urn:p");
        let ctx = ValueContext::new().with_namespaces(&ns);
        let value = builtin_type("QName").unwrap().validate("p:x", &ctx).unwrap();
        assert_eq!(value, TypedValue::QName(QName::namespaced("urn:p", "x")));
        assert!(builtin_type("QName").unwrap().validate("q:x", &ctx).is_err());
    }

    #[test]
    fn test_compare() {
        let a = validate("decimal", "1.5").unwrap();
        let b = validate("decimal", "2").unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(a.compare(&TypedValue::Boolean(true)), None);
    }
}
