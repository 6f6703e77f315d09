//! Streaming content-model validation
//!
//! [`ContentModelValidator`] keeps one frame per open element. Each frame
//! holds the element's position in its compiled content model, so the
//! grammar itself is never mutated and can be shared between sessions.
//!
//! Violations are collected and never stop the traversal: an unexpected
//! child is still resolved against the grammar so that its own content can
//! be checked.

use std::collections::HashMap;

use crate::error::{Error, Result, ValidationError, ViolationKind};
use crate::limits::Limits;
use crate::namespaces::QName;

use super::arena::ElementIndex;
use super::builtins::ValueContext;
use super::elements::{ContentCategory, ElementDeclaration};
use super::grammar::{Grammar, GrammarDescription, GrammarKind};
use super::models::{ChildMatch, ContentState};
use super::wildcards::ProcessContents;

/// How an open element is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Checked against a declaration
    Declared(ElementIndex),
    /// No declaration; children are checked when they have one
    Lax,
    /// Not validated, including descendants
    Skip,
}

impl FrameMode {
    /// Declaration used for the element, if any
    pub fn declaration(&self) -> Option<ElementIndex> {
        match self {
            FrameMode::Declared(index) => Some(*index),
            _ => None,
        }
    }
}

/// Result of an element start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementStart {
    /// Validation mode chosen for the element
    pub mode: FrameMode,
    /// Path of the element, e.g. `/root/item[2]`
    pub path: String,
}

#[derive(Debug)]
struct Frame {
    name: QName,
    mode: FrameMode,
    state: ContentState,
    text: String,
    children: HashMap<QName, u32>,
    path: String,
    text_reported: bool,
}

fn is_xml_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}

fn expected_list(expected: &[String]) -> String {
    if expected.is_empty() {
        "no more elements".to_string()
    } else {
        expected.join(", ")
    }
}

/// Per-session content-model state machine
#[derive(Debug)]
pub struct ContentModelValidator<'g> {
    grammar: &'g Grammar,
    limits: Limits,
    validate_root: bool,
    frames: Vec<Frame>,
}

impl<'g> ContentModelValidator<'g> {
    /// Create a new validator for a grammar
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            limits: Limits::default(),
            validate_root: true,
            frames: Vec::new(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Check the root element name of DTD grammars
    pub fn with_root_validation(mut self, validate_root: bool) -> Self {
        self.validate_root = validate_root;
        self
    }

    /// Drop all open frames
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Path of the innermost open element
    pub fn current_path(&self) -> Option<&str> {
        self.frames.last().map(|frame| frame.path.as_str())
    }

    fn declaration(&self, index: ElementIndex) -> Result<&'g ElementDeclaration> {
        self.grammar
            .element(index)
            .ok_or_else(|| Error::Internal(format!("no element declaration {}", index)))
    }

    /// Process an element start
    pub fn start_element(&mut self, name: &QName, errors: &mut Vec<ValidationError>) -> Result<ElementStart> {
        self.limits.check_depth(self.frames.len() + 1)?;
        let grammar = self.grammar;

        let (mode, path) = match self.frames.last_mut() {
            None => {
                let path = format!("/{}", name.local_name);
                (root_mode(grammar, name, self.validate_root, &path, errors), path)
            }
            Some(parent) => {
                let count = parent.children.entry(name.clone()).or_insert(0);
                *count += 1;
                let path = format!("{}/{}[{}]", parent.path, name.local_name, count);
                (child_mode(grammar, parent, name, &path, errors)?, path)
            }
        };

        let state = match mode {
            FrameMode::Declared(index) => self.declaration(index)?.model.start(),
            _ => ContentState::Any,
        };
        tracing::trace!(element = %name, %path, ?mode, "start element");

        self.frames.push(Frame {
            name: name.clone(),
            mode,
            state,
            text: String::new(),
            children: HashMap::new(),
            path: path.clone(),
            text_reported: false,
        });
        Ok(ElementStart { mode, path })
    }

    /// Process character data of the innermost open element
    pub fn characters(&mut self, text: &str, errors: &mut Vec<ValidationError>) -> Result<()> {
        let grammar = self.grammar;
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        let FrameMode::Declared(index) = frame.mode else {
            return Ok(());
        };
        let decl = grammar
            .element(index)
            .ok_or_else(|| Error::Internal(format!("no element declaration {}", index)))?;

        if decl.category == ContentCategory::Simple {
            frame.text.push_str(text);
        } else if !decl.allows_text() && !frame.text_reported && !is_xml_whitespace(text) {
            frame.text_reported = true;
            errors.push(
                ValidationError::new(
                    ViolationKind::TextNotAllowed,
                    format!("character data is not allowed in element '{}' ({})", decl.name, decl.category),
                )
                .with_name(frame.name.clone())
                .with_value(text.trim())
                .with_path(frame.path.clone()),
            );
        }
        Ok(())
    }

    /// Process an element end
    pub fn end_element(
        &mut self,
        name: &QName,
        ctx: &ValueContext<'_>,
        errors: &mut Vec<ValidationError>,
    ) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::Xml(format!("end tag '{}' without an open element", name)))?;
        if frame.name != *name {
            return Err(Error::Xml(format!(
                "end tag '{}' does not match start tag '{}'",
                name, frame.name
            )));
        }
        let FrameMode::Declared(index) = frame.mode else {
            return Ok(());
        };
        let decl = self.declaration(index)?;

        if let Err(expected) = decl.model.finish(&frame.state) {
            errors.push(
                ValidationError::new(
                    ViolationKind::IncompleteContent,
                    format!(
                        "content of element '{}' is incomplete; expected {}",
                        decl.name,
                        expected_list(&expected)
                    ),
                )
                .with_name(frame.name.clone())
                .with_path(frame.path.clone()),
            );
        }

        if decl.category == ContentCategory::Simple {
            self.check_simple_content(decl, &frame, ctx, errors);
        }
        Ok(())
    }

    fn check_simple_content(
        &self,
        decl: &ElementDeclaration,
        frame: &Frame,
        ctx: &ValueContext<'_>,
        errors: &mut Vec<ValidationError>,
    ) {
        let simple_type = decl
            .simple_type
            .as_ref()
            .and_then(|type_name| self.grammar.simple_type(type_name));
        let Some(simple_type) = simple_type else {
            return;
        };

        let value = match simple_type.validate(&frame.text, ctx) {
            Ok(value) => value,
            Err(err) => {
                errors.push(
                    ValidationError::new(
                        ViolationKind::InvalidValue,
                        format!(
                            "invalid value for element '{}' of type '{}': {}",
                            decl.name,
                            simple_type.name(),
                            err.reason
                        ),
                    )
                    .with_name(frame.name.clone())
                    .with_value(frame.text.clone())
                    .with_path(frame.path.clone()),
                );
                return;
            }
        };

        if let Some(fixed) = &decl.fixed {
            let matches = match simple_type.validate(fixed, ctx) {
                Ok(expected) => expected == value,
                Err(_) => simple_type.white_space().normalize(fixed)
                    == simple_type.white_space().normalize(&frame.text),
            };
            if !matches {
                errors.push(
                    ValidationError::new(
                        ViolationKind::FixedValueMismatch,
                        format!("value of element '{}' must be '{}'", decl.name, fixed),
                    )
                    .with_name(frame.name.clone())
                    .with_value(frame.text.clone())
                    .with_path(frame.path.clone()),
                );
            }
        }
    }
}

fn undeclared(name: &QName, path: &str) -> ValidationError {
    ValidationError::new(
        ViolationKind::UndeclaredElement,
        format!("element '{}' is not declared", name),
    )
    .with_name(name.clone())
    .with_path(path)
}

fn root_mode(
    grammar: &Grammar,
    name: &QName,
    validate_root: bool,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> FrameMode {
    if validate_root {
        if let GrammarDescription::Dtd { root_element } = grammar.description() {
            if *root_element != name.local_name {
                errors.push(
                    ValidationError::new(
                        ViolationKind::RootMismatch,
                        format!("root element '{}' does not match '{}'", name, root_element),
                    )
                    .with_name(name.clone())
                    .with_path(path),
                );
            }
        }
    }
    match grammar.global_element(name) {
        Some(index) => FrameMode::Declared(index),
        None => {
            errors.push(undeclared(name, path));
            FrameMode::Lax
        }
    }
}

fn child_mode(
    grammar: &Grammar,
    parent: &mut Frame,
    name: &QName,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Result<FrameMode> {
    let index = match parent.mode {
        FrameMode::Skip => return Ok(FrameMode::Skip),
        FrameMode::Lax => {
            return Ok(grammar
                .global_element(name)
                .map_or(FrameMode::Lax, FrameMode::Declared))
        }
        FrameMode::Declared(index) => index,
    };
    let decl = grammar
        .element(index)
        .ok_or_else(|| Error::Internal(format!("no element declaration {}", index)))?;
    let resolve = || grammar.resolve_child(decl.children_scope, name);

    let mode = match decl.model.accept_child(&mut parent.state, name, grammar.comparator()) {
        ChildMatch::Matched {
            wildcard: Some(process_contents),
            ..
        } => {
            let process_contents = match grammar.kind() {
                GrammarKind::Dtd => ProcessContents::Strict,
                GrammarKind::Schema => process_contents,
            };
            match (process_contents, grammar.global_element(name)) {
                (ProcessContents::Skip, _) => FrameMode::Skip,
                (_, Some(index)) => FrameMode::Declared(index),
                (ProcessContents::Lax, None) => FrameMode::Lax,
                (ProcessContents::Strict, None) => {
                    errors.push(undeclared(name, path));
                    FrameMode::Lax
                }
            }
        }
        ChildMatch::Matched {
            decl: Some(bound), ..
        } => {
            let same = grammar.element(bound).is_some_and(|d| d.name == *name);
            if same {
                FrameMode::Declared(bound)
            } else {
                // Substitution group member
                FrameMode::Declared(grammar.global_element(name).unwrap_or(bound))
            }
        }
        ChildMatch::Matched { decl: None, .. } => match resolve() {
            Some(index) => FrameMode::Declared(index),
            None => {
                errors.push(undeclared(name, path));
                FrameMode::Lax
            }
        },
        ChildMatch::Unexpected { expected } => {
            errors.push(
                ValidationError::new(
                    ViolationKind::UnexpectedElement,
                    format!(
                        "unexpected child element '{}' in '{}'; expected {}",
                        name,
                        decl.name,
                        expected_list(&expected)
                    ),
                )
                .with_name(name.clone())
                .with_path(path),
            );
            resolve().map_or(FrameMode::Lax, FrameMode::Declared)
        }
        ChildMatch::NotAllowed => {
            errors.push(
                ValidationError::new(
                    ViolationKind::ElementNotAllowed,
                    format!(
                        "element '{}' ({}) does not allow child elements",
                        decl.name, decl.category
                    ),
                )
                .with_name(name.clone())
                .with_path(path),
            );
            resolve().map_or(FrameMode::Lax, FrameMode::Declared)
        }
    };
    Ok(mode)
}
