use crate::cancel::{Cancellable, CancelToken};
use crate::config::READ_BUFFER_SIZE;
use crate::error::ReadError;
use crate::json_reader::{decode_json_line, JsonDumpReader};
use crate::models::Entity;
use crate::pool::decode_parallel;
use crate::stats::ReadStats;
use crate::tabular::EntityCsvReader;
use crate::xml_reader::{decode_xml_page, XmlDumpReader};
use anyhow::{bail, Context, Result};
use bzip2::read::MultiBzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// A lazily decoded sequence of entities, ended early by the first error.
pub type EntityStream = Box<dyn Iterator<Item = Result<Entity, ReadError>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DumpFormat {
    /// One JSON entity per line
    Json,
    /// MediaWiki XML export with item JSON in page text
    Xml,
    /// Rows previously written by `convert`
    Csv,
}

impl DumpFormat {
    /// Guesses the format from the file name, ignoring a trailing `.bz2`.
    pub fn detect(path: &str) -> Option<Self> {
        let name = path.strip_suffix(".bz2").unwrap_or(path);
        match Path::new(name).extension()?.to_str()? {
            "json" | "jsonl" => Some(DumpFormat::Json),
            "xml" => Some(DumpFormat::Xml),
            "csv" => Some(DumpFormat::Csv),
            _ => None,
        }
    }
}

/// Counts bytes pulled from the underlying (compressed) file for progress reporting.
pub struct CountingReader<R> {
    inner: R,
    bytes: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.bytes)
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Logs how far into the input file a reader has got.
#[derive(Clone)]
pub struct ByteProgress {
    bytes: Arc<AtomicU64>,
}

impl ByteProgress {
    pub fn new(bytes: Arc<AtomicU64>) -> Self {
        Self { bytes }
    }

    pub fn megabytes(&self) -> f64 {
        self.bytes.load(Ordering::Relaxed) as f64 / (1024.0 * 1024.0)
    }

    pub fn log(&self, records: u64) {
        info!(records, "processed {:.2}MB", self.megabytes());
    }
}

/// Opens a dump, decompressing `.bz2` files transparently.
pub fn open_dump(path: &str) -> Result<(Box<dyn BufRead + Send>, ByteProgress)> {
    let file = File::open(path).with_context(|| format!("Failed to open dump at: {}", path))?;
    let counting = CountingReader::new(file);
    let progress = ByteProgress::new(counting.counter());

    let reader: Box<dyn BufRead + Send> = if path.ends_with(".bz2") {
        Box::new(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            MultiBzDecoder::new(counting),
        ))
    } else {
        Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, counting))
    };

    Ok((reader, progress))
}

/// Opens `path` as a stream of entities in the given (or detected) format.
///
/// With `threads > 1`, dump records are decoded on a worker pool and may arrive out
/// of dump order. Tabular input is always read serially.
pub fn open_entities(
    path: &str,
    format: Option<DumpFormat>,
    threads: usize,
    cancel: CancelToken,
    stats: Arc<ReadStats>,
) -> Result<EntityStream> {
    let format = match format.or_else(|| DumpFormat::detect(path)) {
        Some(f) => f,
        None => bail!("Cannot detect input format of {}; pass --format", path),
    };
    let (reader, progress) = open_dump(path)?;

    info!(path, ?format, threads, "Opening entity stream");

    let stream: EntityStream = match (format, threads > 1) {
        (DumpFormat::Json, false) => Box::new(Cancellable::new(
            JsonDumpReader::new(reader, progress, stats),
            cancel,
        )),
        (DumpFormat::Json, true) => {
            let lines = JsonDumpReader::lines(reader, progress);
            Box::new(decode_parallel(lines, threads, cancel, move |line| {
                decode_json_line(&line, &stats)
            })?)
        }
        (DumpFormat::Xml, false) => Box::new(Cancellable::new(
            XmlDumpReader::new(reader, progress, stats),
            cancel,
        )),
        (DumpFormat::Xml, true) => {
            let pages = XmlDumpReader::pages(reader, progress);
            Box::new(decode_parallel(pages, threads, cancel, move |page| {
                decode_xml_page(page, &stats)
            })?)
        }
        (DumpFormat::Csv, _) => Box::new(Cancellable::new(
            EntityCsvReader::new(reader, stats),
            cancel,
        )),
    };

    Ok(stream)
}
