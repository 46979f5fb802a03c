//! Co-occurrence counting and rule emission.
//!
//! Every entity contributes at most one count per (context, target) pair, however
//! many claims, qualifiers or references realize it. Rules are only produced once
//! the whole input has been observed, since confidence needs final context totals.

use crate::models::{ContextType, Entity, Rule};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

static ITEM_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+([0-9]+)$").expect("item id pattern is valid"));

/// Numeric part of an entity identifier such as `Q5107`.
pub fn numeric_id(value: &str) -> Option<u64> {
    ITEM_ID_REGEX
        .captures(value.trim())
        .and_then(|caps| caps[1].parse().ok())
}

/// Total occurrences of one context and the per-target co-occurrence counts.
#[derive(Debug, Default, Clone)]
struct ContextCounts {
    total: u64,
    targets: FxHashMap<u32, u64>,
}

impl ContextCounts {
    fn observe(&mut self, context_property: u32, targets: &[u32]) {
        self.total += 1;
        for &target in targets {
            if target != context_property {
                *self.targets.entry(target).or_insert(0) += 1;
            }
        }
    }
}

trait ContextKey: Copy {
    fn split(self) -> (u32, Option<u64>);
}

impl ContextKey for u32 {
    fn split(self) -> (u32, Option<u64>) {
        (self, None)
    }
}

impl ContextKey for (u32, u64) {
    fn split(self) -> (u32, Option<u64>) {
        (self.0, Some(self.1))
    }
}

/// Per-entity contexts, each deduplicated and sorted.
#[derive(Debug, Default)]
struct EntityContexts {
    properties: Vec<u32>,
    item_values: Vec<(u32, u64)>,
    qualifiers: Vec<(u32, u32)>,
    references: Vec<(u32, u32)>,
    skipped_item_values: u64,
}

impl EntityContexts {
    fn extract(entity: &Entity) -> Self {
        let mut contexts = Self::default();

        for claim in entity.claims() {
            let main = claim.main_snak();
            let property = main.property_id();
            contexts.properties.push(property);

            if main.datatype().is_item_reference() {
                match numeric_id(main.value()) {
                    Some(id) => contexts.item_values.push((property, id)),
                    None => {
                        debug!(
                            entity = entity.id(),
                            property,
                            value = main.value(),
                            "Skipping item value without numeric id"
                        );
                        contexts.skipped_item_values += 1;
                    }
                }
            }

            contexts
                .qualifiers
                .extend(claim.qualifiers().iter().map(|q| (property, q.property_id())));
            contexts
                .references
                .extend(claim.references().iter().map(|r| (property, r.property_id())));
        }

        dedup(&mut contexts.properties);
        dedup(&mut contexts.item_values);
        dedup(&mut contexts.qualifiers);
        dedup(&mut contexts.references);
        contexts
    }
}

fn dedup<T: Ord>(values: &mut Vec<T>) {
    values.sort_unstable();
    values.dedup();
}

/// Accumulates the four count tables over a single pass of entities.
#[derive(Debug, Default)]
pub struct RuleGenerator {
    item_without_value: FxHashMap<u32, ContextCounts>,
    item_with_value: FxHashMap<(u32, u64), ContextCounts>,
    qualifier: FxHashMap<u32, ContextCounts>,
    reference: FxHashMap<u32, ContextCounts>,
    entities_observed: u64,
    skipped_item_values: u64,
}

impl RuleGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities_observed(&self) -> u64 {
        self.entities_observed
    }

    /// Item-valued claims whose value had no parseable numeric id.
    pub fn skipped_item_values(&self) -> u64 {
        self.skipped_item_values
    }

    pub fn observe(&mut self, entity: &Entity) {
        let contexts = EntityContexts::extract(entity);
        self.entities_observed += 1;
        self.skipped_item_values += contexts.skipped_item_values;

        for &property in &contexts.properties {
            self.item_without_value
                .entry(property)
                .or_default()
                .observe(property, &contexts.properties);
        }

        for &(property, value) in &contexts.item_values {
            self.item_with_value
                .entry((property, value))
                .or_default()
                .observe(property, &contexts.properties);
        }

        // Qualifier and reference contexts occur once per entity holding the main property,
        // whether or not that entity's statements carry any qualifiers or references.
        for &property in &contexts.properties {
            self.qualifier.entry(property).or_default().total += 1;
            self.reference.entry(property).or_default().total += 1;
        }
        count_attached(&mut self.qualifier, &contexts.qualifiers);
        count_attached(&mut self.reference, &contexts.references);
    }

    /// Consumes the count tables and yields one rule per (context, target) pair.
    pub fn into_rules(self) -> impl Iterator<Item = Rule> {
        info!(
            entities = self.entities_observed,
            property_contexts = self.item_without_value.len(),
            value_contexts = self.item_with_value.len(),
            skipped_item_values = self.skipped_item_values,
            "Count tables complete"
        );

        emit(self.item_without_value, ContextType::Item)
            .chain(emit(self.item_with_value, ContextType::Item))
            .chain(emit(self.qualifier, ContextType::Qualifier))
            .chain(emit(self.reference, ContextType::Reference))
    }
}

fn count_attached(table: &mut FxHashMap<u32, ContextCounts>, pairs: &[(u32, u32)]) {
    for &(property, attached) in pairs {
        if property == attached {
            continue;
        }
        *table
            .entry(property)
            .or_default()
            .targets
            .entry(attached)
            .or_insert(0) += 1;
    }
}

fn emit<K: ContextKey>(
    table: FxHashMap<K, ContextCounts>,
    context_type: ContextType,
) -> impl Iterator<Item = Rule> {
    table.into_iter().flat_map(move |(key, counts)| {
        let (context_property, context_value) = key.split();
        let total = counts.total;
        counts.targets.into_iter().map(move |(target_property, count)| {
            Rule::new(
                context_property,
                context_value,
                target_property,
                count,
                count as f64 / total as f64,
                context_type,
            )
        })
    })
}

/// Counts every entity, then yields the rules.
pub fn compute_rules<I>(entities: I) -> impl Iterator<Item = Rule>
where
    I: IntoIterator<Item = Entity>,
{
    let mut generator = RuleGenerator::new();
    for entity in entities {
        generator.observe(&entity);
    }
    generator.into_rules()
}

/// Like [`compute_rules`] over a fallible stream. The first error discards all counts.
pub fn try_compute_rules<I, E>(entities: I) -> Result<impl Iterator<Item = Rule>, E>
where
    I: IntoIterator<Item = Result<Entity, E>>,
{
    let mut generator = RuleGenerator::new();
    for entity in entities {
        generator.observe(&entity?);
    }
    Ok(generator.into_rules())
}
