//! Content-model validation through the public API
//!
//! Grammars are built with `GrammarBuilder`, documents are streamed through
//! `validate_str`.

use pretty_assertions::assert_eq;
use xmlgrammar::documents::validate_str;
use xmlgrammar::validators::{
    AttributeSource, AttributeType, ContentSource, ElementSource, Particle, ProcessContents,
    Wildcard,
};
use xmlgrammar::{
    CompileErrorKind, DocumentValidator, Error, Grammar, GrammarBuilder, Limits, QName,
    ViolationKind,
};

fn q(name: &str) -> QName {
    QName::local(name)
}

/// `<!ELEMENT doc (head, (para | list)*, foot?)>` and friends
fn article_dtd() -> Grammar {
    GrammarBuilder::dtd("doc")
        .with_element(ElementSource::global(
            q("doc"),
            ContentSource::Children(Particle::sequence([
                Particle::local("head"),
                Particle::choice([Particle::local("para"), Particle::local("list")]).zero_or_more(),
                Particle::local("foot").optional(),
            ])),
        ))
        .with_element(ElementSource::global(q("head"), ContentSource::MixedSimple(vec![])))
        .with_element(ElementSource::global(
            q("para"),
            ContentSource::MixedSimple(vec![q("em"), q("code")]),
        ))
        .with_element(ElementSource::global(
            q("list"),
            ContentSource::Children(Particle::local("item").one_or_more()),
        ))
        .with_element(ElementSource::global(q("item"), ContentSource::MixedSimple(vec![])))
        .with_element(ElementSource::global(q("em"), ContentSource::MixedSimple(vec![])))
        .with_element(ElementSource::global(q("code"), ContentSource::MixedSimple(vec![])))
        .with_element(
            ElementSource::global(q("foot"), ContentSource::Empty)
                .with_attribute(AttributeSource::local("rev").required())
                .with_attribute(
                    AttributeSource::local("status")
                        .with_type(AttributeType::Enumeration(vec!["draft".into(), "final".into()])),
                ),
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
fn test_valid_article() {
    let grammar = article_dtd();
    let xml = r#"<!DOCTYPE doc>
<doc>
  <head>Title</head>
  <para>Some <em>text</em> and <code>code</code>.</para>
  <list><item>one</item><item>two</item></list>
  <para/>
  <foot rev="3" status="final"/>
</doc>"#;
    assert_eq!(kinds(&grammar, xml), vec![]);
}

#[test]
fn test_content_violations() {
    let grammar = article_dtd();

    assert_eq!(
        kinds(&grammar, "<doc><para/></doc>"),
        vec![ViolationKind::UnexpectedElement, ViolationKind::IncompleteContent]
    );
    assert_eq!(
        kinds(&grammar, "<doc><head/><list/></doc>"),
        vec![ViolationKind::IncompleteContent]
    );
    assert_eq!(
        kinds(&grammar, "<doc><head/>stray</doc>"),
        vec![ViolationKind::TextNotAllowed]
    );
    assert_eq!(
        kinds(&grammar, "<doc><head/><foot rev=\"1\"><em/></foot></doc>"),
        vec![ViolationKind::ElementNotAllowed]
    );
    assert_eq!(
        kinds(&grammar, "<doc><head/><para><list/></para></doc>"),
        vec![ViolationKind::UnexpectedElement, ViolationKind::IncompleteContent]
    );
}

#[test]
fn test_attribute_violations() {
    let grammar = article_dtd();
    assert_eq!(
        kinds(&grammar, r#"<doc><head/><foot status="lost" extra="1"/></doc>"#),
        vec![
            ViolationKind::InvalidAttributeValue,
            ViolationKind::UndeclaredAttribute,
            ViolationKind::MissingAttribute,
        ]
    );
}

#[test]
fn test_root_mismatch() {
    let grammar = article_dtd();
    let found = kinds(&grammar, "<list><item/></list>");
    assert_eq!(found, vec![ViolationKind::RootMismatch]);
}

#[test]
fn test_error_paths() {
    let grammar = article_dtd();
    let mut validator = DocumentValidator::new(&grammar);
    let report = validate_str(
        &mut validator,
        "<doc><head/><list><item/></list><list><item><x/></item></list></doc>",
    )
    .unwrap();
    let paths: Vec<_> = report.errors.iter().filter_map(|e| e.path.as_deref()).collect();
    assert!(paths.contains(&"/doc/list[2]/item[1]/x[1]"), "{:?}", paths);
}

#[test]
fn test_content_model_strings() {
    let grammar = article_dtd();
    let model = |name: &str| {
        let index = grammar.global_element(&q(name)).unwrap();
        grammar.content_model_string(index).unwrap()
    };
    assert_eq!(model("doc"), "(head,(para|list)*,foot?)");
    assert_eq!(model("para"), "(#PCDATA|em|code)*");
    assert_eq!(model("list"), "(item+)");
    assert_eq!(model("foot"), "EMPTY");
}

#[test]
fn test_ambiguous_grammar_not_compiled() {
    let result = GrammarBuilder::schema(None)
        .with_element(ElementSource::global(
            q("root"),
            ContentSource::Children(Particle::sequence([
                Particle::local("a").zero_or_more(),
                Particle::local("a"),
            ])),
        ))
        .with_element(ElementSource::global(
            q("other"),
            ContentSource::Children(Particle::choice([
                Particle::local("b"),
                Particle::wildcard(Wildcard::any().with_process_contents(ProcessContents::Lax)),
            ])),
        ))
        .compile(&Limits::default());

    match result {
        Err(Error::Compile(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(errors
                .iter()
                .all(|e| e.kind == CompileErrorKind::AmbiguousContentModel));
        }
        other => panic!("expected compile errors, got {:?}", other),
    }
}

#[test]
fn test_wildcards() {
    let grammar = GrammarBuilder::schema(Some("urn:main"))
        .with_element(ElementSource::global(
            QName::namespaced("urn:main", "root"),
            ContentSource::Children(Particle::sequence([
                Particle::wildcard(
                    Wildcard::other(Some("urn:main")).with_process_contents(ProcessContents::Skip),
                )
                .zero_or_more(),
                Particle::wildcard(
                    Wildcard::namespace(Some("urn:main")).with_process_contents(ProcessContents::Strict),
                )
                .optional(),
            ])),
        ))
        .with_element(ElementSource::global(
            QName::namespaced("urn:main", "known"),
            ContentSource::Empty,
        ))
        .compile(&Limits::default())
        .unwrap();

    let valid = r#"<m:root xmlns:m="urn:main" xmlns:o="urn:other">
  <o:anything><o:nested junk="1">text</o:nested></o:anything>
  <m:known/>
</m:root>"#;
    assert_eq!(kinds(&grammar, valid), vec![]);

    let undeclared = r#"<m:root xmlns:m="urn:main"><m:unknown/></m:root>"#;
    assert_eq!(kinds(&grammar, undeclared), vec![ViolationKind::UndeclaredElement]);
}

#[test]
fn test_all_group_documents() {
    let grammar = GrammarBuilder::schema(None)
        .with_element(ElementSource::global(
            q("person"),
            ContentSource::Children(Particle::all([
                Particle::local("name"),
                Particle::local("age").optional(),
            ])),
        ))
        .with_element(ElementSource::global(q("name"), ContentSource::Empty))
        .with_element(ElementSource::global(q("age"), ContentSource::Empty))
        .compile(&Limits::default())
        .unwrap();

    assert_eq!(kinds(&grammar, "<person><age/><name/></person>"), vec![]);
    assert_eq!(kinds(&grammar, "<person><name/></person>"), vec![]);
    assert_eq!(
        kinds(&grammar, "<person><age/></person>"),
        vec![ViolationKind::IncompleteContent]
    );
    assert_eq!(
        kinds(&grammar, "<person><name/><name/></person>"),
        vec![ViolationKind::UnexpectedElement]
    );
}
