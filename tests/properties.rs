//! Property tests for particle conflicts and content models

use proptest::prelude::*;
use xmlgrammar::validators::{
    conflict, ContentSource, ElementSource, Leaf, Particle, SubstitutionGroupComparator,
    SubstitutionGroups, Wildcard, WildcardKind,
};
use xmlgrammar::{DocumentValidator, GrammarBuilder, Limits, QName, ViolationKind};

fn namespace() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("urn:a".to_string())),
        Just(Some("urn:b".to_string())),
    ]
}

fn qname() -> impl Strategy<Value = QName> {
    (namespace(), prop::sample::select(vec!["x", "y", "z"]))
        .prop_map(|(ns, local)| QName::new(ns, local))
}

fn wildcard_kind() -> impl Strategy<Value = WildcardKind> {
    prop_oneof![
        Just(WildcardKind::Any),
        namespace().prop_map(WildcardKind::AnyNamespace),
        namespace().prop_map(WildcardKind::AnyOther),
    ]
}

fn leaf() -> impl Strategy<Value = Leaf> {
    prop_oneof![
        qname().prop_map(Leaf::Element),
        wildcard_kind().prop_map(|kind| Leaf::Wildcard(Wildcard::new(kind))),
    ]
}

fn substitution_groups() -> SubstitutionGroups {
    let mut groups = SubstitutionGroups::new();
    groups.add(QName::local("x"), QName::local("y"));
    groups.add(QName::namespaced("urn:a", "x"), QName::namespaced("urn:b", "z"));
    groups
}

proptest! {
    #[test]
    fn test_conflict_is_symmetric(a in leaf(), b in leaf()) {
        prop_assert_eq!(conflict(&a, &b, None), conflict(&b, &a, None));

        let groups = substitution_groups();
        let comparator: &dyn SubstitutionGroupComparator = &groups;
        prop_assert_eq!(
            conflict(&a, &b, Some(comparator)),
            conflict(&b, &a, Some(comparator))
        );
    }

    #[test]
    fn test_leaf_conflicts_with_itself(a in leaf()) {
        prop_assert!(conflict(&a, &a, None));
    }

    #[test]
    fn test_element_conflicts_with_wildcard_iff_allowed(name in qname(), kind in wildcard_kind()) {
        let wildcard = Wildcard::new(kind);
        let allowed = wildcard.allows(&name);
        prop_assert_eq!(
            conflict(&Leaf::Element(name), &Leaf::Wildcard(wildcard), None),
            allowed
        );
    }

    #[test]
    fn test_any_wildcard_is_total(name in qname()) {
        prop_assert!(Wildcard::any().allows(&name));
        prop_assert!(conflict(&Leaf::Element(name), &Leaf::Wildcard(Wildcard::any()), None));
    }

    #[test]
    fn test_sequence_model_language(children in prop::collection::vec(
        prop::sample::select(vec!["a", "b", "c"]), 0..6
    )) {
        let grammar = GrammarBuilder::schema(None)
            .with_element(ElementSource::global(
                QName::local("root"),
                ContentSource::Children(Particle::sequence([
                    Particle::local("a"),
                    Particle::local("b").optional(),
                    Particle::local("c").zero_or_more(),
                ])),
            ))
            .with_element(ElementSource::global(QName::local("a"), ContentSource::Empty))
            .with_element(ElementSource::global(QName::local("b"), ContentSource::Empty))
            .with_element(ElementSource::global(QName::local("c"), ContentSource::Empty))
            .compile(&Limits::default())
            .unwrap();

        let joined: String = children.concat();
        let expected = regex::Regex::new("^ab?c*$").unwrap().is_match(&joined);

        let mut validator = DocumentValidator::new(&grammar);
        validator.start_document();
        validator.start_element(&QName::local("root"), &[]).unwrap();
        for child in &children {
            validator.start_element(&QName::local(*child), &[]).unwrap();
            validator.end_element(&QName::local(*child)).unwrap();
        }
        validator.end_element(&QName::local("root")).unwrap();
        let report = validator.end_document().unwrap();

        prop_assert_eq!(report.valid, expected);
        prop_assert!(report.errors.iter().all(|e| matches!(
            e.kind,
            ViolationKind::UnexpectedElement | ViolationKind::IncompleteContent
        )));
    }
}
