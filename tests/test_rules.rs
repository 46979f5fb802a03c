//! Rule generation over small hand-built corpora.
//!
//! These tests exercise `rules::compute_rules` through the public API only, the way a
//! caller holding already-decoded entities would use it. Each scenario builds its
//! entities with the `item`/`string` helpers and compares the emitted rules after
//! sorting, since emission order is unspecified.
//!
//! # Laws Checked
//!
//! - **Deduplication** -- repeated claims, qualifiers or references never push a count
//!   above one per entity
//! - **Bounds** -- confidence is in (0, 1] and count never exceeds the context total
//! - **No self rules** -- a property never suggests itself
//! - **Idempotence** -- the same corpus, in any order, gives the same rule set

use propsuggest::datatype::Datatype;
use propsuggest::models::{Claim, ContextType, Entity, Rule, Snak};
use propsuggest::rules::{compute_rules, try_compute_rules};

fn snak(property: u32, datatype: Datatype, value: &str) -> Snak {
    Snak::new(property, datatype, value).unwrap()
}

fn item(property: u32, value: &str) -> Claim {
    Claim::bare(snak(property, Datatype::WikibaseItem, value))
}

fn string(property: u32, value: &str) -> Claim {
    Claim::bare(snak(property, Datatype::String, value))
}

fn sorted(rules: impl Iterator<Item = Rule>) -> Vec<Rule> {
    let mut rules: Vec<Rule> = rules.collect();
    rules.sort_by_key(|r| {
        (
            r.context_type.as_str(),
            r.context_property,
            r.context_value,
            r.target_property,
        )
    });
    rules
}

/// A corpus mixing every kind of context, with deliberate repetition.
fn mixed_corpus() -> Vec<Entity> {
    vec![
        Entity::new(
            "Q1",
            vec![
                item(31, "Q5"),
                item(31, "Q5"),
                string(373, "a"),
                string(373, "b"),
                Claim::new(
                    snak(39, Datatype::WikibaseItem, "Q30185"),
                    vec![
                        snak(580, Datatype::Time, "+2001-01-01T00:00:00Z"),
                        snak(580, Datatype::Time, "+2005-01-01T00:00:00Z"),
                        snak(582, Datatype::Time, "+2009-01-01T00:00:00Z"),
                    ],
                    vec![snak(143, Datatype::WikibaseItem, "Q328")],
                ),
            ],
        ),
        Entity::new("Q2", vec![item(31, "Q5"), item(21, "Q6581097")]),
        Entity::new(
            "Q3",
            vec![
                item(31, "Q515"),
                Claim::new(
                    snak(39, Datatype::WikibaseItem, "Q30185"),
                    vec![snak(580, Datatype::Time, "+1990-01-01T00:00:00Z")],
                    vec![],
                ),
            ],
        ),
        Entity::new("Q4", vec![item(21, "not-an-id"), string(373, "c")]),
    ]
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[test]
fn value_and_property_contexts() {
    let entities = vec![
        Entity::new("Q51", vec![item(31, "Q5107"), string(373, "Africa")]),
        Entity::new("Q52", vec![item(31, "Q5107")]),
        Entity::new("Q53", vec![item(31, "Q1337")]),
    ];
    let rules = sorted(compute_rules(entities));

    assert!(rules.contains(&Rule::new(31, Some(5107), 373, 1, 0.5, ContextType::Item)));
    assert!(rules.contains(&Rule::new(373, None, 31, 1, 1.0, ContextType::Item)));
    assert!(rules.contains(&Rule::new(31, None, 373, 1, 1.0 / 3.0, ContextType::Item)));
    assert!(rules.iter().all(|r| r.context_value != Some(1337)));
    assert_eq!(rules.len(), 3);
}

#[test]
fn repeated_values_count_once() {
    let entities = vec![Entity::new(
        "Q51",
        vec![string(373, "Africa"), string(373, "Afrika"), item(31, "Q5107")],
    )];
    let rules = sorted(compute_rules(entities));

    assert_eq!(
        rules,
        vec![
            Rule::new(31, None, 373, 1, 1.0, ContextType::Item),
            Rule::new(31, Some(5107), 373, 1, 1.0, ContextType::Item),
            Rule::new(373, None, 31, 1, 1.0, ContextType::Item),
        ]
    );
}

#[test]
fn qualifier_and_reference_contexts() {
    let entities = vec![Entity::new(
        "Q51",
        vec![Claim::new(
            snak(31, Datatype::WikibaseItem, "Q5107"),
            vec![snak(12, Datatype::String, "x"), snak(13, Datatype::String, "y")],
            vec![snak(22, Datatype::String, "z"), snak(23, Datatype::Url, "http://example.org")],
        )],
    )];
    let rules = sorted(compute_rules(entities));

    assert_eq!(
        rules,
        vec![
            Rule::new(31, None, 12, 1, 1.0, ContextType::Qualifier),
            Rule::new(31, None, 13, 1, 1.0, ContextType::Qualifier),
            Rule::new(31, None, 22, 1, 1.0, ContextType::Reference),
            Rule::new(31, None, 23, 1, 1.0, ContextType::Reference),
        ]
    );
}

// ---------------------------------------------------------------------------
// Laws over a mixed corpus
// ---------------------------------------------------------------------------

#[test]
fn confidence_is_bounded() {
    for rule in compute_rules(mixed_corpus()) {
        assert!(rule.count >= 1);
        assert!(rule.confidence > 0.0 && rule.confidence <= 1.0, "{:?}", rule);
    }
}

#[test]
fn no_rule_targets_its_own_context() {
    assert!(compute_rules(mixed_corpus()).all(|r| r.target_property != r.context_property));
}

#[test]
fn repetition_never_inflates_counts() {
    let rules = sorted(compute_rules(mixed_corpus()));

    // 580 appears twice under 39 in Q1 and once in Q3; 39 is held by two entities
    let start_time = rules
        .iter()
        .find(|r| r.context_type == ContextType::Qualifier && r.target_property == 580)
        .unwrap();
    assert_eq!(start_time.count, 2);
    assert_eq!(start_time.confidence, 1.0);

    // 31 = Q5 appears twice in Q1 and once in Q2
    let human_gender = rules
        .iter()
        .find(|r| r.context_value == Some(5) && r.target_property == 21)
        .unwrap();
    assert_eq!(human_gender.count, 1);
    assert_eq!(human_gender.confidence, 0.5);
}

#[test]
fn unparseable_item_values_only_lose_their_value_context() {
    let rules = sorted(compute_rules(mixed_corpus()));
    assert!(rules
        .iter()
        .all(|r| !(r.context_property == 21 && r.context_value.is_some() && r.context_value != Some(6581097))));
    assert!(rules.contains(&Rule::new(373, None, 21, 1, 0.5, ContextType::Item)));
}

#[test]
fn rule_set_is_independent_of_entity_order() {
    let forward = sorted(compute_rules(mixed_corpus()));
    let mut reversed_corpus = mixed_corpus();
    reversed_corpus.reverse();
    let reversed = sorted(compute_rules(reversed_corpus));

    assert_eq!(forward, reversed);
    assert_eq!(forward, sorted(compute_rules(mixed_corpus())));
}

#[test]
fn failing_stream_yields_no_rules() {
    let entities: Vec<Result<Entity, String>> = mixed_corpus()
        .into_iter()
        .map(Ok)
        .chain(std::iter::once(Err("interrupted".to_string())))
        .collect();
    match try_compute_rules(entities) {
        Ok(_) => panic!("expected the stream error"),
        Err(e) => assert_eq!(e, "interrupted"),
    }
}
