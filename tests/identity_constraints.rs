//! key, unique and keyref evaluation over whole documents

use pretty_assertions::assert_eq;
use xmlgrammar::documents::{validate_document, validate_str};
use xmlgrammar::validators::{
    AttributeSource, ContentSource, ElementSource, IdentityConstraintSource, Particle,
    ValidationOptions,
};
use xmlgrammar::{
    CompileErrorKind, DocumentValidator, Error, Grammar, GrammarBuilder, Limits, NamespaceContext,
    QName, ViolationKind,
};

const NS: &str = "urn:library";
const XS: &str = "http://www.w3.org/2001/XMLSchema";

fn l(name: &str) -> QName {
    QName::namespaced(NS, name)
}

fn prefixes() -> NamespaceContext {
    NamespaceContext::new().with_prefix("l", NS)
}

fn library() -> Grammar {
    GrammarBuilder::schema(Some(NS))
        .with_element(
            ElementSource::global(
                l("library"),
                ContentSource::Children(Particle::sequence([
                    Particle::element(l("book")).zero_or_more(),
                    Particle::element(l("loans")).optional(),
                ])),
            )
            .with_identity_constraint(
                IdentityConstraintSource::key(l("bookKey"), "l:book")
                    .with_field("@isbn")
                    .with_namespaces(prefixes()),
            )
            .with_identity_constraint(
                IdentityConstraintSource::unique(l("shelfPosition"), "l:book")
                    .with_field("@shelf")
                    .with_field("l:pos")
                    .with_namespaces(prefixes()),
            )
            .with_identity_constraint(
                IdentityConstraintSource::keyref(l("loanBook"), "l:loans/l:loan", l("bookKey"))
                    .with_field("@book")
                    .with_namespaces(prefixes()),
            ),
        )
        .with_element(
            ElementSource::global(
                l("book"),
                ContentSource::Children(Particle::sequence([
                    Particle::element(l("title")),
                    Particle::element(l("pos")).optional(),
                ])),
            )
            .with_attribute(AttributeSource::local("isbn"))
            .with_attribute(AttributeSource::local("shelf")),
        )
        .with_element(ElementSource::global(
            l("title"),
            ContentSource::Simple(QName::namespaced(XS, "string")),
        ))
        .with_element(ElementSource::global(
            l("pos"),
            ContentSource::Simple(QName::namespaced(XS, "decimal")),
        ))
        .with_element(ElementSource::global(
            l("loans"),
            ContentSource::Children(Particle::element(l("loan")).zero_or_more()),
        ))
        .with_element(
            ElementSource::global(l("loan"), ContentSource::Empty)
                .with_attribute(AttributeSource::local("book").required()),
        )
        .compile(&Limits::default())
        .unwrap()
}

fn kinds(grammar: &Grammar, xml: &str) -> Vec<ViolationKind> {
    let mut validator = DocumentValidator::new(grammar);
    validate_str(&mut validator, xml)
        .unwrap()
        .errors
        .into_iter()
        .map(|e| e.kind)
        .collect()
}

#[test]
fn test_valid_library() {
    let grammar = library();
    let xml = r#"<library xmlns="urn:library">
  <book isbn="1" shelf="A"><title>One</title><pos>1</pos></book>
  <book isbn="2" shelf="A"><title>Two</title><pos>2</pos></book>
  <book isbn="3"><title>Three</title></book>
  <loans><loan book="3"/><loan book="1"/></loans>
</library>"#;
    assert_eq!(kinds(&grammar, xml), vec![]);
}

#[test]
fn test_duplicate_key() {
    let grammar = library();
    let xml = r#"<library xmlns="urn:library">
  <book isbn="1"><title>One</title></book>
  <book isbn="1"><title>Again</title></book>
</library>"#;
    let mut validator = DocumentValidator::new(&grammar);
    let report = validate_str(&mut validator, xml).unwrap();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, ViolationKind::DuplicateKey);
    assert_eq!(report.errors[0].path.as_deref(), Some("/library/book[2]"));
}

#[test]
fn test_unique_compares_typed_values() {
    let grammar = library();
    let xml = r#"<library xmlns="urn:library">
  <book isbn="1" shelf="A"><title>One</title><pos>1.0</pos></book>
  <book isbn="2" shelf="A"><title>Two</title><pos>1</pos></book>
  <book isbn="3" shelf="B"><title>Three</title><pos>1</pos></book>
</library>"#;
    assert_eq!(kinds(&grammar, xml), vec![ViolationKind::DuplicateKey]);
}

#[test]
fn test_missing_key_field() {
    let grammar = library();
    let xml = r#"<library xmlns="urn:library"><book><title>x</title></book></library>"#;
    assert_eq!(kinds(&grammar, xml), vec![ViolationKind::IncompleteKey]);
}

#[test]
fn test_keyref_resolution() {
    let grammar = library();
    let xml = r#"<library xmlns="urn:library">
  <book isbn="1"><title>One</title></book>
  <loans><loan book="1"/><loan book="9"/><loan book="9"/></loans>
</library>"#;
    let mut validator = DocumentValidator::new(&grammar);
    let report = validate_str(&mut validator, xml).unwrap();
    assert_eq!(report.count(ViolationKind::DanglingKeyref), 2);
    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.errors[0].path.as_deref(), Some("/library/loans[1]/loan[2]"));
}

#[test]
fn test_identity_constraints_can_be_disabled() {
    let grammar = library();
    let xml = r#"<library xmlns="urn:library">
  <book isbn="1"><title>One</title></book>
  <book isbn="1"><title>Again</title></book>
  <loans><loan book="9"/></loans>
</library>"#;
    let options = ValidationOptions::new().with_identity_constraints(false);
    let mut validator = DocumentValidator::with_options(&grammar, options);
    assert!(validate_str(&mut validator, xml).unwrap().valid);
}

#[test]
fn test_scopes_are_per_selector_element() {
    let q = QName::local;
    let grammar = GrammarBuilder::schema(None)
        .with_element(ElementSource::global(
            q("doc"),
            ContentSource::Children(Particle::local("section").zero_or_more()),
        ))
        .with_element(
            ElementSource::global(
                q("section"),
                ContentSource::Children(Particle::sequence([
                    Particle::local("item").zero_or_more(),
                    Particle::local("section").zero_or_more(),
                ])),
            )
            .with_identity_constraint(
                IdentityConstraintSource::unique(q("itemId"), "item").with_field("@id"),
            ),
        )
        .with_element(
            ElementSource::global(q("item"), ContentSource::Empty)
                .with_attribute(AttributeSource::local("id")),
        )
        .compile(&Limits::default())
        .unwrap();

    let separate = r#"<doc>
  <section><item id="1"/><item id="2"/></section>
  <section><item id="1"/><section><item id="1"/></section></section>
</doc>"#;
    assert_eq!(kinds(&grammar, separate), vec![]);

    let clash = r#"<doc><section><item id="1"/><section/><item id="1"/></section></doc>"#;
    let mut validator = DocumentValidator::new(&grammar);
    // Out-of-order item is unexpected but still feeds the constraint
    let report = validate_document(&mut validator, clash).unwrap();
    assert_eq!(report.count(ViolationKind::DuplicateKey), 1);
}

fn sections() -> Grammar {
    let q = QName::local;
    GrammarBuilder::schema(None)
        .with_element(ElementSource::global(
            q("doc"),
            ContentSource::Children(Particle::local("section").zero_or_more()),
        ))
        .with_element(
            ElementSource::global(
                q("section"),
                ContentSource::Children(
                    Particle::choice([
                        Particle::local("item"),
                        Particle::local("ref"),
                        Particle::local("section"),
                    ])
                    .zero_or_more(),
                ),
            )
            .with_identity_constraint(IdentityConstraintSource::key(q("itemKey"), ".//item").with_field("@id"))
            .with_identity_constraint(
                IdentityConstraintSource::keyref(q("itemRef"), "ref", q("itemKey")).with_field("@to"),
            ),
        )
        .with_element(
            ElementSource::global(q("item"), ContentSource::Empty)
                .with_attribute(AttributeSource::local("id")),
        )
        .with_element(
            ElementSource::global(q("ref"), ContentSource::Empty)
                .with_attribute(AttributeSource::local("to")),
        )
        .compile(&Limits::default())
        .unwrap()
}

#[test]
fn test_keyref_sees_only_its_own_activation() {
    let grammar = sections();
    let sibling = r#"<doc><section><item id="A"/></section><section><ref to="A"/></section></doc>"#;
    let mut validator = DocumentValidator::new(&grammar);
    let report = validate_document(&mut validator, sibling).unwrap();
    assert_eq!(report.errors.len(), 1, "{}", report);
    assert_eq!(report.errors[0].kind, ViolationKind::DanglingKeyref);
    assert_eq!(report.errors[0].path.as_deref(), Some("/doc/section[2]/ref[1]"));

    // Tuples of nested activations are carried up to the enclosing one
    let nested = r#"<doc><section><ref to="B"/><section><item id="B"/></section></section></doc>"#;
    assert_eq!(kinds(&grammar, nested), vec![]);

    // but never down into a nested activation
    let outer = r#"<doc><section><item id="C"/><section><ref to="C"/></section></section></doc>"#;
    assert_eq!(kinds(&grammar, outer), vec![ViolationKind::DanglingKeyref]);
}

#[test]
fn test_constraint_compile_errors() {
    let q = QName::local;
    let result = GrammarBuilder::schema(None)
        .with_element(
            ElementSource::global(q("a"), ContentSource::Empty)
                .with_identity_constraint(IdentityConstraintSource::key(q("k"), "x").with_field("@id"))
                .with_identity_constraint(IdentityConstraintSource::unique(q("k"), "y").with_field("@id")),
        )
        .with_element(
            ElementSource::global(q("b"), ContentSource::Empty)
                .with_identity_constraint(IdentityConstraintSource::unique(q("bad"), "x/@id").with_field("@id")),
        )
        .compile(&Limits::default());

    match result {
        Err(Error::Compile(errors)) => {
            assert!(errors.has_kind(CompileErrorKind::DuplicateIdentityConstraint));
            assert!(errors.has_kind(CompileErrorKind::InvalidXPath));
        }
        other => panic!("expected compile errors, got {:?}", other),
    }
}
