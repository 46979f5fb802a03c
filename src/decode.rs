//! Normalization of raw dump snaks into [`Snak`] values.
//!
//! Two dialects are handled: the object form of current JSON dumps
//! (`{"snaktype": .., "property": "P31", "datatype": .., "datavalue": {..}}`) and the
//! array form stored in page text of older XML dumps (`["value", 31, "string", ".."]`).
//! A snak that cannot be decoded is logged and dropped; a claim whose main snak
//! cannot be decoded is dropped with it.

use crate::datatype::Datatype;
use crate::error::SnakError;
use crate::models::{Claim, Entity, Snak};
use crate::stats::ReadStats;
use serde_json::Value;
use tracing::{debug, warn};

fn parse_property(raw: &str) -> Result<u32, SnakError> {
    raw.strip_prefix('P')
        .and_then(|digits| digits.parse::<u32>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| SnakError::InvalidProperty(raw.to_string()))
}

/// A scalar field rendered as text; numbers keep their JSON spelling.
fn scalar(value: &Value, key: &'static str) -> Result<String, SnakError> {
    match value.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(SnakError::MissingField(key)),
    }
}

fn entity_reference(datatype: Datatype, value: &Value) -> Result<String, SnakError> {
    let expected = datatype
        .entity_type()
        .ok_or(SnakError::UnexpectedValue(datatype.as_str()))?;
    let found = value
        .get("entity-type")
        .and_then(Value::as_str)
        .ok_or(SnakError::MissingField("entity-type"))?;
    if found != expected {
        return Err(SnakError::EntityTypeMismatch {
            expected,
            found: found.to_string(),
        });
    }

    if let Some(id) = value.get("id").and_then(Value::as_str) {
        return Ok(id.to_string());
    }

    // Old dumps only carry the numeric id.
    let prefix = match datatype {
        Datatype::WikibaseItem => 'Q',
        Datatype::WikibaseProperty => 'P',
        Datatype::WikibaseLexeme => 'L',
        _ => return Err(SnakError::MissingField("id")),
    };
    value
        .get("numeric-id")
        .and_then(Value::as_u64)
        .map(|n| format!("{prefix}{n}"))
        .ok_or(SnakError::MissingField("numeric-id"))
}

/// Renders a datavalue as the printable scalar stored on a [`Snak`].
pub fn normalize_value(datatype: Datatype, value: &Value) -> Result<String, SnakError> {
    match datatype {
        Datatype::String
        | Datatype::ExternalId
        | Datatype::Url
        | Datatype::Media
        | Datatype::GeoShape
        | Datatype::Math
        | Datatype::TabularData
        | Datatype::MusicalNotation => value
            .as_str()
            .map(str::to_string)
            .ok_or(SnakError::UnexpectedValue(datatype.as_str())),
        Datatype::WikibaseItem
        | Datatype::WikibaseProperty
        | Datatype::WikibaseLexeme
        | Datatype::WikibaseSense
        | Datatype::WikibaseForm => entity_reference(datatype, value),
        Datatype::Time => scalar(value, "time"),
        Datatype::Quantity => scalar(value, "amount"),
        Datatype::GlobeCoordinate => Ok(format!(
            "N{}, E{}",
            scalar(value, "latitude")?,
            scalar(value, "longitude")?
        )),
        Datatype::MonolingualText => Ok(format!(
            "{} ({})",
            scalar(value, "text")?,
            scalar(value, "language")?
        )),
        Datatype::Unknown => Err(SnakError::UnexpectedValue(datatype.as_str())),
    }
}

fn resolve_datatype(tag: &str) -> Result<Datatype, SnakError> {
    if tag == "bad" {
        return Err(SnakError::BadDatatype);
    }
    Datatype::from_tag(tag).ok_or_else(|| SnakError::UnknownDatatype(tag.to_string()))
}

/// Decodes a snak object from a JSON dump.
pub fn decode_snak(raw: &Value) -> Result<Snak, SnakError> {
    let property = raw
        .get("property")
        .and_then(Value::as_str)
        .ok_or(SnakError::MissingField("property"))?;
    let property_id = parse_property(property)?;
    let snaktype = raw
        .get("snaktype")
        .and_then(Value::as_str)
        .ok_or(SnakError::MissingField("snaktype"))?;

    if snaktype != "value" {
        return Snak::new(property_id, Datatype::Unknown, snaktype);
    }

    let tag = raw
        .get("datatype")
        .and_then(Value::as_str)
        .ok_or(SnakError::MissingDatatype)?;
    let datatype = resolve_datatype(tag)?;
    let value = raw
        .get("datavalue")
        .and_then(|dv| dv.get("value"))
        .ok_or(SnakError::MissingField("datavalue"))?;

    Snak::new(property_id, datatype, normalize_value(datatype, value)?)
}

/// Decodes an array-form snak from the page text of an XML dump.
pub fn decode_legacy_snak(raw: &Value) -> Result<Snak, SnakError> {
    let parts = raw
        .as_array()
        .ok_or(SnakError::UnexpectedValue("snak"))?;
    let snaktype = parts
        .first()
        .and_then(Value::as_str)
        .ok_or(SnakError::MissingField("snaktype"))?;
    let property_id = match parts.get(1) {
        Some(p) => p
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| SnakError::InvalidProperty(p.to_string()))?,
        None => return Err(SnakError::MissingField("property")),
    };

    if snaktype != "value" {
        return Snak::new(property_id, Datatype::Unknown, snaktype);
    }

    let tag = parts
        .get(2)
        .and_then(Value::as_str)
        .ok_or(SnakError::MissingDatatype)?;
    let datatype = resolve_datatype(tag)?;
    let value = parts.get(3).ok_or(SnakError::MissingField("value"))?;

    Snak::new(property_id, datatype, normalize_value(datatype, value)?)
}

/// Snak objects grouped by property, visited in property-key order.
fn grouped_snaks(groups: Option<&Value>) -> impl Iterator<Item = &Value> {
    groups
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.values())
        .filter_map(Value::as_array)
        .flatten()
}

fn keep_snak(result: Result<Snak, SnakError>, entity_id: &str, stats: &ReadStats) -> Option<Snak> {
    match result {
        Ok(snak) => Some(snak),
        Err(e) => {
            log_rejected(&e, entity_id, "Dropping malformed snak");
            stats.inc_snaks_dropped();
            None
        }
    }
}

fn log_rejected(error: &SnakError, entity_id: &str, message: &str) {
    match error {
        SnakError::BadDatatype => debug!(entity = entity_id, error = %error, "{}", message),
        _ => warn!(entity = entity_id, error = %error, "{}", message),
    }
}

fn push_claim(
    claims: &mut Vec<Claim>,
    main: Result<Snak, SnakError>,
    qualifiers: Vec<Snak>,
    references: Vec<Snak>,
    entity_id: &str,
    stats: &ReadStats,
) {
    match main {
        Ok(main_snak) => claims.push(Claim::new(main_snak, qualifiers, references)),
        Err(e) => {
            log_rejected(&e, entity_id, "Dropping claim with malformed main snak");
            stats.inc_claims_dropped();
        }
    }
}

pub(crate) fn finish_entity(id: String, claims: Vec<Claim>, stats: &ReadStats) -> Entity {
    stats.inc_entities();
    stats.add_claims(claims.len() as u64);
    Entity::new(id, claims)
}

/// Builds an entity from the `claims` object of a JSON dump record.
///
/// `claims` maps property keys to statement lists and is walked in key order.
pub fn decode_claims<'a>(
    id: String,
    statements: impl IntoIterator<Item = &'a Value>,
    stats: &ReadStats,
) -> Entity {
    let mut claims = Vec::new();

    for statement in statements {
        let references = statement
            .get("references")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .flat_map(|group| grouped_snaks(group.get("snaks")))
            .filter_map(|snak| keep_snak(decode_snak(snak), &id, stats))
            .collect();
        let qualifiers = grouped_snaks(statement.get("qualifiers"))
            .filter_map(|snak| keep_snak(decode_snak(snak), &id, stats))
            .collect();
        let main = statement
            .get("mainsnak")
            .ok_or(SnakError::MissingField("mainsnak"))
            .and_then(decode_snak);

        push_claim(&mut claims, main, qualifiers, references, &id, stats);
    }

    finish_entity(id, claims, stats)
}

/// Builds an entity from the legacy `claims` list (`{"m": .., "q": [..], "refs": [[..]]}`).
pub fn decode_legacy_claims(id: String, statements: &[Value], stats: &ReadStats) -> Entity {
    let mut claims = Vec::new();

    for statement in statements {
        let references = statement
            .get("refs")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|snak| keep_snak(decode_legacy_snak(snak), &id, stats))
            .collect();
        let qualifiers = statement
            .get("q")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|snak| keep_snak(decode_legacy_snak(snak), &id, stats))
            .collect();
        let main = statement
            .get("m")
            .ok_or(SnakError::MissingField("m"))
            .and_then(decode_legacy_snak);

        push_claim(&mut claims, main, qualifiers, references, &id, stats);
    }

    finish_entity(id, claims, stats)
}
