use crate::config::{JSON_ITEM_TYPE, PROGRESS_INTERVAL};
use crate::decode::decode_claims;
use crate::error::ReadError;
use crate::input::ByteProgress;
use crate::models::Entity;
use crate::stats::ReadStats;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, warn};

/// Statements keyed by property id (`"P31"`), in key order.
type StatementGroups = BTreeMap<String, Vec<Value>>;

#[derive(Deserialize)]
struct RawEntity {
    id: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default, deserialize_with = "groups_or_empty")]
    claims: StatementGroups,
}

/// Empty claim maps are serialized as `[]` in Wikidata dumps.
fn groups_or_empty<'de, D>(deserializer: D) -> Result<StatementGroups, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum GroupsOrList {
        Groups(StatementGroups),
        List(IgnoredAny),
    }

    Ok(match GroupsOrList::deserialize(deserializer)? {
        GroupsOrList::Groups(groups) => groups,
        GroupsOrList::List(_) => StatementGroups::new(),
    })
}

/// Entity-bearing lines of a JSON dump, with array brackets and trailing commas removed.
///
/// Lines are raw bytes; a record that is not valid UTF-8 fails later, in
/// [`decode_json_line`], without ending the stream.
pub struct JsonLines<R> {
    reader: R,
    buf: Vec<u8>,
    records: u64,
    progress: ByteProgress,
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = Result<Vec<u8>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }

            let line = self.buf.trim_ascii();
            if !line.starts_with(b"{") {
                continue;
            }

            self.records += 1;
            if self.records % PROGRESS_INTERVAL == 0 {
                self.progress.log(self.records);
            }
            let line = line.strip_suffix(b",").unwrap_or(line);
            return Some(Ok(line.to_vec()));
        }
    }
}

/// Streams items out of a Wikidata JSON dump.
pub struct JsonDumpReader<R> {
    lines: JsonLines<R>,
    stats: Arc<ReadStats>,
}

impl<R: BufRead> JsonDumpReader<R> {
    pub fn new(reader: R, progress: ByteProgress, stats: Arc<ReadStats>) -> Self {
        Self {
            lines: Self::lines(reader, progress),
            stats,
        }
    }

    /// Raw record lines, for callers that decode them elsewhere.
    pub fn lines(reader: R, progress: ByteProgress) -> JsonLines<R> {
        JsonLines {
            reader,
            buf: Vec::new(),
            records: 0,
            progress,
        }
    }
}

/// Decodes one dump line. Returns `None` for non-item records and for lines that are
/// not valid JSON (including invalid UTF-8).
pub fn decode_json_line(line: &[u8], stats: &ReadStats) -> Option<Entity> {
    let raw: RawEntity = match serde_json::from_slice(line) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Skipping malformed JSON record");
            stats.inc_records_skipped();
            return None;
        }
    };

    let RawEntity {
        id,
        entity_type,
        claims,
    } = raw;
    if entity_type != JSON_ITEM_TYPE {
        debug!(id = %id, entity_type = %entity_type, "Skipping non-item record");
        stats.inc_records_skipped();
        return None;
    }

    Some(decode_claims(id, claims.values().flatten(), stats))
}

impl<R: BufRead> Iterator for JsonDumpReader<R> {
    type Item = Result<Entity, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) => {
                    if let Some(entity) = decode_json_line(&line, &self.stats) {
                        return Some(Ok(entity));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::AtomicU64;

    fn progress() -> ByteProgress {
        ByteProgress::new(Arc::new(AtomicU64::new(0)))
    }

    fn read_all(dump: &str) -> (Vec<Entity>, Arc<ReadStats>) {
        let stats = Arc::new(ReadStats::new());
        let reader = JsonDumpReader::new(Cursor::new(dump.to_string()), progress(), stats.clone());
        let entities = reader.map(|e| e.unwrap()).collect();
        (entities, stats)
    }

    const DUMP: &str = r#"[
{"type":"item","id":"Q15","claims":{"P373":[{"mainsnak":{"snaktype":"value","property":"P373","datatype":"string","datavalue":{"value":"Africa","type":"string"}},"type":"statement","rank":"normal"}],"P31":[{"mainsnak":{"snaktype":"value","property":"P31","datatype":"wikibase-item","datavalue":{"value":{"entity-type":"item","numeric-id":5107,"id":"Q5107"},"type":"wikibase-entityid"}},"type":"statement","rank":"normal"}]}},
{"type":"property","id":"P31","datatype":"wikibase-item","claims":{}},
{"type":"item","id":"Q16","claims":[]},
{"type":"item","id":"Q17"}
]
"#;

    #[test]
    fn reads_items_and_skips_other_records() {
        let (entities, stats) = read_all(DUMP);
        let ids: Vec<&str> = entities.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["Q15", "Q16", "Q17"]);
        assert_eq!(stats.entities(), 3);
        assert_eq!(stats.records_skipped(), 1);
    }

    #[test]
    fn claims_follow_property_key_order() {
        let (entities, _) = read_all(DUMP);
        let properties: Vec<u32> = entities[0]
            .claims()
            .iter()
            .map(|c| c.property_id())
            .collect();
        // "P31" sorts before "P373"
        assert_eq!(properties, vec![31, 373]);
        assert_eq!(entities[0].claims()[0].main_snak().value(), "Q5107");
    }

    #[test]
    fn empty_claims_in_either_shape() {
        let (entities, _) = read_all(DUMP);
        assert!(entities[1].claims().is_empty());
        assert!(entities[2].claims().is_empty());
    }

    #[test]
    fn malformed_line_is_skipped() {
        let dump = "[\n{\"type\":\"item\",\"id\":\"Q1\",\"claims\":{\n{\"type\":\"item\",\"id\":\"Q2\"}\n]\n";
        let (entities, stats) = read_all(dump);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id(), "Q2");
        assert_eq!(stats.records_skipped(), 1);
    }

    #[test]
    fn lines_strip_trailing_commas() {
        let dump = "[\n{\"a\":1},\r\n{\"b\":2}\n]\n";
        let lines: Vec<Vec<u8>> = JsonDumpReader::lines(Cursor::new(dump), progress())
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
    }

    #[test]
    fn invalid_utf8_record_is_skipped() {
        let mut dump = b"[\n{\"type\":\"item\",\"id\":\"Q1\"},\n".to_vec();
        dump.extend_from_slice(b"{\"type\":\"item\",\"id\":\"Q2\xff\xfe\"},\n");
        dump.extend_from_slice(b"{\"type\":\"item\",\"id\":\"Q3\"}\n]\n");

        let stats = Arc::new(ReadStats::new());
        let results: Vec<Result<Entity, ReadError>> =
            JsonDumpReader::new(Cursor::new(dump), progress(), stats.clone()).collect();

        assert!(results.iter().all(|r| r.is_ok()));
        let ids: Vec<&str> = results
            .iter()
            .map(|r| r.as_ref().unwrap().id())
            .collect();
        assert_eq!(ids, vec!["Q1", "Q3"]);
        assert_eq!(stats.records_skipped(), 1);
    }
}
