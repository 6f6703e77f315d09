//! Event sources for document validation
//!
//! These adapters translate parsed XML into [`DocumentValidator`] events:
//! [`validate_str`] streams with `quick-xml`, [`validate_tree`] walks a
//! `roxmltree` document. Neither makes validation decisions of its own.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName as XmlName, ResolveResult};
use quick_xml::NsReader;
use roxmltree::{Node, ParsingOptions};

use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::validators::{Attribute, DocumentValidator, ValidationReport};

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::Xml(format!("invalid UTF-8 in name: {}", e)))
}

fn namespace(resolved: ResolveResult<'_>) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?.to_string())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(Error::Xml(format!(
            "unknown namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn element_name(reader: &NsReader<&[u8]>, name: XmlName<'_>) -> Result<QName> {
    let (resolved, local) = reader.resolve_element(name);
    Ok(QName::new(namespace(resolved)?, utf8(local.as_ref())?))
}

fn is_namespace_declaration(key: &[u8]) -> bool {
    key == b"xmlns" || key.starts_with(b"xmlns:")
}

fn start_event(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<(QName, Vec<Attribute>)> {
    let name = element_name(reader, start.name())?;
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::Xml(format!("malformed attribute: {}", e)))?;
        if is_namespace_declaration(attribute.key.as_ref()) {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attribute.key);
        let attribute_name = QName::new(namespace(resolved)?, utf8(local.as_ref())?);
        let value = attribute.unescape_value()?;
        attributes.push(Attribute::new(attribute_name, value.into_owned()));
    }
    Ok((name, attributes))
}

/// Validate a document given as a string, streaming it through `quick-xml`
pub fn validate_str(validator: &mut DocumentValidator<'_>, xml: &str) -> Result<ValidationReport> {
    let mut reader = NsReader::from_str(xml);
    validator.start_document();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let (name, attributes) = start_event(&reader, &start)?;
                validator.start_element(&name, &attributes)?;
            }
            Event::Empty(start) => {
                let (name, attributes) = start_event(&reader, &start)?;
                validator.start_element(&name, &attributes)?;
                validator.end_element(&name)?;
            }
            Event::End(end) => {
                let name = element_name(&reader, end.name())?;
                validator.end_element(&name)?;
            }
            Event::Text(text) => {
                if validator_in_element(validator) {
                    validator.characters(&text.unescape()?)?;
                }
            }
            Event::CData(data) => {
                validator.characters(&String::from_utf8_lossy(&data.into_inner()))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    validator.end_document()
}

// Whitespace around the root element is prolog/epilog, not content.
fn validator_in_element(validator: &DocumentValidator<'_>) -> bool {
    validator.depth() > 0
}

/// Validate a parsed `roxmltree` document
pub fn validate_tree(validator: &mut DocumentValidator<'_>, document: &roxmltree::Document<'_>) -> Result<ValidationReport> {
    validator.start_document();

    // (node, closing); children are pushed reversed so they pop in order
    let mut stack: Vec<(Node<'_, '_>, bool)> = document.root().children().rev().map(|n| (n, false)).collect();
    while let Some((node, closing)) = stack.pop() {
        if node.is_element() {
            let tag = node.tag_name();
            let name = QName::new(tag.namespace(), tag.name());
            if closing {
                validator.end_element(&name)?;
                continue;
            }
            let attributes: Vec<Attribute> = node
                .attributes()
                .map(|a| Attribute::new(QName::new(a.namespace(), a.name()), a.value()))
                .collect();
            validator.start_element(&name, &attributes)?;
            stack.push((node, true));
            stack.extend(node.children().rev().map(|child| (child, false)));
        } else if node.is_text() && validator.depth() > 0 {
            if let Some(text) = node.text() {
                validator.characters(text)?;
            }
        }
    }

    validator.end_document()
}

/// Parse a string with `roxmltree` and validate the tree
pub fn validate_document(validator: &mut DocumentValidator<'_>, xml: &str) -> Result<ValidationReport> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let document = roxmltree::Document::parse_with_options(xml, options)?;
    validate_tree(validator, &document)
}

/// Read a file and validate it as a stream
pub fn validate_file(validator: &mut DocumentValidator<'_>, path: impl AsRef<Path>) -> Result<ValidationReport> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "validate file");
    let xml = std::fs::read_to_string(path)?;
    validate_str(validator, &xml)
}
