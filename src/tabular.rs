//! Flat row format for bulk loading.
//!
//! One row per snak: `entity id, row kind, property id, datatype, value`. Rows of a
//! claim's qualifiers and references follow the claim's own row. There is no header.
//!
//! The datatype column always holds the canonical tag from [`Datatype::as_str`]. Legacy
//! spellings found in old dumps are normalized on the way in, so `globecoordinate`
//! is written as `globe-coordinate` and `wikibase-entityid` as `wikibase-item`.

use crate::config::CSV_BUFFER_SIZE;
use crate::datatype::Datatype;
use crate::decode::finish_entity;
use crate::error::{ReadError, SnakError};
use crate::export::partial_path;
use crate::models::{Claim, Entity, Snak};
use crate::stats::ReadStats;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Claim,
    Qualifier,
    Reference,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Claim => "claim",
            RowKind::Qualifier => "qualifier",
            RowKind::Reference => "reference",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "claim" => Some(RowKind::Claim),
            "qualifier" => Some(RowKind::Qualifier),
            "reference" => Some(RowKind::Reference),
            _ => None,
        }
    }
}

pub struct EntityCsvWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl<W: Write> EntityCsvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: WriterBuilder::new().has_headers(false).from_writer(inner),
            rows: 0,
        }
    }

    pub fn write_entity(&mut self, entity: &Entity) -> Result<(), csv::Error> {
        for claim in entity.claims() {
            self.write_row(entity.id(), RowKind::Claim, claim.main_snak())?;
            for qualifier in claim.qualifiers() {
                self.write_row(entity.id(), RowKind::Qualifier, qualifier)?;
            }
            for reference in claim.references() {
                self.write_row(entity.id(), RowKind::Reference, reference)?;
            }
        }
        Ok(())
    }

    fn write_row(&mut self, id: &str, kind: RowKind, snak: &Snak) -> Result<(), csv::Error> {
        let mut property = itoa::Buffer::new();
        self.writer.write_record([
            id,
            kind.as_str(),
            property.format(snak.property_id()),
            snak.datatype().as_str(),
            snak.value(),
        ])?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> Result<W, csv::IntoInnerError<csv::Writer<W>>> {
        self.writer.into_inner()
    }
}

/// Converts a whole entity stream into a row file at `path`, returning the number of
/// rows written. A read error aborts the conversion and leaves no file behind.
pub fn write_entities_csv<I, E>(path: &Path, entities: I) -> Result<u64>
where
    I: IntoIterator<Item = Result<Entity, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let partial = partial_path(path);
    let file = File::create(&partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;
    let mut writer = EntityCsvWriter::new(BufWriter::with_capacity(CSV_BUFFER_SIZE, file));

    let written = entities.into_iter().try_for_each(|entity| -> Result<()> {
        let entity = entity.context("Entity stream failed")?;
        writer.write_entity(&entity)?;
        Ok(())
    });
    let written = written.and_then(|()| {
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", partial.display()))
    });
    if let Err(e) = written {
        drop(writer);
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    let rows = writer.rows();
    drop(writer);
    fs::rename(&partial, path)
        .with_context(|| format!("Failed to move rows into place at {}", path.display()))?;
    info!(rows, path = %path.display(), "Entity rows written");
    Ok(rows)
}

struct PendingClaim {
    main: Snak,
    qualifiers: Vec<Snak>,
    references: Vec<Snak>,
}

struct PendingEntity {
    id: String,
    claims: Vec<PendingClaim>,
    /// False after a dropped claim row, so its qualifier/reference rows are dropped too.
    accepts_attachments: bool,
}

impl PendingEntity {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            claims: Vec::new(),
            accepts_attachments: false,
        }
    }

    fn finish(self, stats: &ReadStats) -> Entity {
        let claims = self
            .claims
            .into_iter()
            .map(|c| Claim::new(c.main, c.qualifiers, c.references))
            .collect();
        finish_entity(self.id, claims, stats)
    }
}

fn parse_snak(record: &StringRecord) -> Result<Snak, SnakError> {
    let property = record.get(2).ok_or(SnakError::MissingField("property"))?;
    let property_id = property
        .parse::<u32>()
        .map_err(|_| SnakError::InvalidProperty(property.to_string()))?;
    let tag = record.get(3).ok_or(SnakError::MissingDatatype)?;
    let datatype =
        Datatype::from_tag(tag).ok_or_else(|| SnakError::UnknownDatatype(tag.to_string()))?;
    let value = record.get(4).ok_or(SnakError::MissingField("value"))?;
    Snak::new(property_id, datatype, value)
}

/// Reads rows back into entities, grouping consecutive rows with the same entity id.
pub struct EntityCsvReader<R: Read> {
    reader: csv::Reader<R>,
    record: StringRecord,
    pending: Option<PendingEntity>,
    stats: Arc<ReadStats>,
    done: bool,
}

impl<R: Read> EntityCsvReader<R> {
    pub fn new(inner: R, stats: Arc<ReadStats>) -> Self {
        Self {
            reader: ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(inner),
            record: StringRecord::new(),
            pending: None,
            stats,
            done: false,
        }
    }

    /// Adds the current record to the pending entity, returning the previous entity
    /// when this record starts a new one.
    fn absorb_record(&mut self) -> Option<Entity> {
        let (Some(id), Some(label)) = (self.record.get(0), self.record.get(1)) else {
            warn!(row = ?self.record, "Dropping short row");
            self.stats.inc_snaks_dropped();
            return None;
        };

        let starts_new = self.pending.as_ref().is_some_and(|p| p.id != id);
        let finished = if starts_new { self.pending.take() } else { None };
        let pending = self.pending.get_or_insert_with(|| PendingEntity::new(id));

        let Some(kind) = RowKind::from_label(label) else {
            warn!(entity = %pending.id, label, "Dropping row with unknown kind");
            self.stats.inc_snaks_dropped();
            return finished.map(|e| e.finish(&self.stats));
        };

        match (kind, parse_snak(&self.record)) {
            (RowKind::Claim, Ok(main)) => {
                pending.claims.push(PendingClaim {
                    main,
                    qualifiers: Vec::new(),
                    references: Vec::new(),
                });
                pending.accepts_attachments = true;
            }
            (RowKind::Claim, Err(e)) => {
                warn!(entity = %pending.id, error = %e, "Dropping claim row");
                pending.accepts_attachments = false;
                self.stats.inc_claims_dropped();
            }
            (_, Err(e)) => {
                warn!(entity = %pending.id, error = %e, "Dropping malformed row");
                self.stats.inc_snaks_dropped();
            }
            (attached_kind, Ok(snak)) => match pending.claims.last_mut() {
                Some(claim) if pending.accepts_attachments => {
                    if attached_kind == RowKind::Qualifier {
                        claim.qualifiers.push(snak);
                    } else {
                        claim.references.push(snak);
                    }
                }
                _ => {
                    warn!(entity = %pending.id, kind = attached_kind.as_str(), "Dropping row without owning claim");
                    self.stats.inc_snaks_dropped();
                }
            },
        }

        finished.map(|e| e.finish(&self.stats))
    }
}

impl<R: Read> Iterator for EntityCsvReader<R> {
    type Item = Result<Entity, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(true) => {
                    if let Some(entity) = self.absorb_record() {
                        return Some(Ok(entity));
                    }
                }
                Ok(false) => {
                    self.done = true;
                    return self.pending.take().map(|e| Ok(e.finish(&self.stats)));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn snak(property: u32, datatype: Datatype, value: &str) -> Snak {
        Snak::new(property, datatype, value).unwrap()
    }

    fn write(entities: &[Entity]) -> String {
        let mut writer = EntityCsvWriter::new(Vec::new());
        for entity in entities {
            writer.write_entity(entity).unwrap();
        }
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    fn read(csv: &str) -> (Vec<Entity>, Arc<ReadStats>) {
        let stats = Arc::new(ReadStats::new());
        let entities = EntityCsvReader::new(Cursor::new(csv.to_string()), stats.clone())
            .map(|e| e.unwrap())
            .collect();
        (entities, stats)
    }

    fn sample() -> Entity {
        Entity::new(
            "Q51",
            vec![
                Claim::bare(snak(31, Datatype::WikibaseItem, "Q5107")),
                Claim::new(
                    snak(373, Datatype::String, "Europe"),
                    vec![snak(1, Datatype::String, "qual")],
                    vec![snak(2, Datatype::String, "ref")],
                ),
            ],
        )
    }

    #[test]
    fn writes_rows_in_claim_order() {
        let out = write(&[sample()]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Q51,claim,31,wikibase-item,Q5107",
                "Q51,claim,373,string,Europe",
                "Q51,qualifier,1,string,qual",
                "Q51,reference,2,string,ref",
            ]
        );
    }

    #[test]
    fn quotes_values_with_commas() {
        let entity = Entity::new(
            "Q64",
            vec![Claim::bare(snak(625, Datatype::GlobeCoordinate, "N52.5, E13.4"))],
        );
        assert_eq!(write(&[entity]), "Q64,claim,625,globe-coordinate,\"N52.5, E13.4\"\n");
    }

    #[test]
    fn writer_counts_rows() {
        let mut writer = EntityCsvWriter::new(Vec::new());
        writer.write_entity(&sample()).unwrap();
        writer.write_entity(&Entity::new("Q1", vec![])).unwrap();
        assert_eq!(writer.rows(), 4);
    }

    #[test]
    fn reader_rebuilds_written_entities() {
        let entities = vec![
            sample(),
            Entity::new("Q52", vec![Claim::bare(snak(31, Datatype::Unknown, "novalue"))]),
        ];
        let (read_back, stats) = read(&write(&entities));
        assert_eq!(read_back, entities);
        assert_eq!(stats.entities(), 2);
        assert_eq!(stats.claims(), 3);
    }

    #[test]
    fn reader_drops_orphan_and_malformed_rows() {
        let csv = "\
Q1,qualifier,5,string,orphan
Q1,claim,31,wikibase-item,Q5
Q1,claim,0,string,zero
Q1,reference,7,string,belongs-to-dropped-claim
Q1,qualifier,580,hologram,x
Q1,reference,143,wikibase-item,Q328
Q2,claim,373,string,x
";
        let (entities, stats) = read(csv);
        assert_eq!(entities.len(), 2);

        let first = &entities[0];
        assert_eq!(first.claims().len(), 1);
        assert!(first.claims()[0].qualifiers().is_empty());
        assert!(first.claims()[0].references().is_empty());

        assert_eq!(entities[1].id(), "Q2");
        assert_eq!(stats.claims_dropped(), 1);
        assert_eq!(stats.snaks_dropped(), 4);
    }

    #[test]
    fn failed_stream_leaves_no_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("entities.csv");
        let entities = vec![
            Ok(sample()),
            Err(ReadError::Io(std::io::Error::other("truncated"))),
        ];
        assert!(write_entities_csv(&path, entities).is_err());
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn writes_entity_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("entities.csv");
        let rows = write_entities_csv(&path, vec![Ok::<_, ReadError>(sample())]).unwrap();
        assert_eq!(rows, 4);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Q51,claim,31,wikibase-item,Q5107\n"));
    }

    #[test]
    fn legacy_datatype_tags_are_written_canonically() {
        let coordinate = crate::decode::decode_legacy_snak(&serde_json::json!([
            "value",
            625,
            "globecoordinate",
            {"latitude": 52.5, "longitude": 13.4}
        ]))
        .unwrap();
        let capital = crate::decode::decode_legacy_snak(&serde_json::json!([
            "value",
            36,
            "wikibase-entityid",
            {"entity-type": "item", "numeric-id": 64}
        ]))
        .unwrap();
        let entity = Entity::new("Q183", vec![Claim::bare(coordinate), Claim::bare(capital)]);

        assert_eq!(
            write(&[entity]),
            "Q183,claim,625,globe-coordinate,\"N52.5, E13.4\"\nQ183,claim,36,wikibase-item,Q64\n"
        );
    }

    #[test]
    fn row_kind_labels() {
        for kind in [RowKind::Claim, RowKind::Qualifier, RowKind::Reference] {
            assert_eq!(RowKind::from_label(kind.as_str()), Some(kind));
        }
        assert_eq!(RowKind::from_label("statement"), None);
    }
}
