use crate::config::{PROGRESS_INTERVAL, XML_ITEM_MODEL};
use crate::decode::{decode_claims, decode_legacy_claims};
use crate::error::ReadError;
use crate::input::ByteProgress;
use crate::models::Entity;
use crate::stats::ReadStats;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::Value;
use std::io::BufRead;
use std::sync::Arc;
use tracing::warn;

/// An item page: its title (the entity id) and the JSON held in its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlPage {
    pub title: String,
    pub text: String,
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Model,
    Text,
}

/// Item pages of a MediaWiki XML export, in dump order.
pub struct XmlPages<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    pages: u64,
    progress: ByteProgress,
    done: bool,
}

impl<R: BufRead> XmlPages<R> {
    fn next_page(&mut self) -> Result<Option<XmlPage>, ReadError> {
        let mut field = None;
        let mut title = String::new();
        let mut model = String::new();
        let mut text = String::new();

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    field = match e.local_name().as_ref() {
                        b"title" => Some(Field::Title),
                        b"model" => Some(Field::Model),
                        b"text" => Some(Field::Text),
                        b"page" => {
                            title.clear();
                            model.clear();
                            text.clear();
                            None
                        }
                        _ => None,
                    };
                }
                Event::Text(t) => {
                    if let Some(f) = field {
                        let content = t.unescape()?;
                        match f {
                            Field::Title => title.push_str(&content),
                            Field::Model => model.push_str(&content),
                            Field::Text => text.push_str(&content),
                        }
                    }
                }
                Event::CData(c) => {
                    if let Some(Field::Text) = field {
                        text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::End(e) => {
                    field = None;
                    if e.local_name().as_ref() == b"page" {
                        self.pages += 1;
                        if self.pages % PROGRESS_INTERVAL == 0 {
                            self.progress.log(self.pages);
                        }
                        if model == XML_ITEM_MODEL {
                            return Ok(Some(XmlPage {
                                title: std::mem::take(&mut title),
                                text: std::mem::take(&mut text),
                            }));
                        }
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for XmlPages<R> {
    type Item = Result<XmlPage, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_page() {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Streams items out of a MediaWiki XML dump of an entity wiki.
pub struct XmlDumpReader<R> {
    pages: XmlPages<R>,
    stats: Arc<ReadStats>,
}

impl<R: BufRead> XmlDumpReader<R> {
    pub fn new(reader: R, progress: ByteProgress, stats: Arc<ReadStats>) -> Self {
        Self {
            pages: Self::pages(reader, progress),
            stats,
        }
    }

    pub fn pages(reader: R, progress: ByteProgress) -> XmlPages<R> {
        let mut reader = Reader::from_reader(reader);
        reader.trim_text(true);
        XmlPages {
            reader,
            buf: Vec::new(),
            pages: 0,
            progress,
            done: false,
        }
    }
}

/// Decodes the JSON text of an item page.
///
/// Old exports store claims as a list of `{m, q, refs}` objects; newer ones use the
/// same property-keyed object as the JSON dumps. Both are accepted.
pub fn decode_xml_page(page: XmlPage, stats: &ReadStats) -> Option<Entity> {
    let data: Value = match serde_json::from_str(&page.text) {
        Ok(data) => data,
        Err(e) => {
            warn!(title = %page.title, error = %e, "Skipping page with malformed item JSON");
            stats.inc_records_skipped();
            return None;
        }
    };

    let entity = match data.get("claims") {
        Some(Value::Array(statements)) => decode_legacy_claims(page.title, statements, stats),
        Some(Value::Object(groups)) => decode_claims(
            page.title,
            groups.values().filter_map(Value::as_array).flatten(),
            stats,
        ),
        Some(_) => {
            warn!(title = %page.title, "Skipping page with unexpected claims shape");
            stats.inc_records_skipped();
            return None;
        }
        None => decode_legacy_claims(page.title, &[], stats),
    };
    Some(entity)
}

impl<R: BufRead> Iterator for XmlDumpReader<R> {
    type Item = Result<Entity, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.pages.next()? {
                Ok(page) => {
                    if let Some(entity) = decode_xml_page(page, &self.stats) {
                        return Some(Ok(entity));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
