//! Propsuggest: property suggestion rules from Wikibase entity dumps
//!
//! This crate streams items out of a Wikidata-style dump and counts how often
//! properties co-occur, producing association rules ("entities with P31 = Q5 usually
//! also have P21") for a property suggester:
//!
//! 1. **Reading** -- Decode JSON-lines or MediaWiki XML dumps (optionally `.bz2`)
//!    into [`models::Entity`] values, dropping malformed snaks and claims with a log line
//! 2. **Converting** (optional) -- Flatten entities into a headerless row file that can
//!    be loaded in bulk or read back later instead of the dump
//! 3. **Counting** -- A single pass fills four count tables: property contexts, item-value
//!    contexts, qualifier contexts and reference contexts
//! 4. **Emitting** -- Each (context, target) pair becomes a [`models::Rule`] with its
//!    support count and confidence, written as the CSV the suggester imports
//!
//! # Architecture
//!
//! - **Streaming readers** -- Dumps are never loaded into memory; entities are decoded
//!   one record at a time
//! - **Parallel decoding** -- With `--threads > 1`, records are decoded on a rayon pool
//!   behind a bounded channel
//! - **Cancellation** -- Ctrl-C flips a shared token; the stream ends with an error and
//!   no rules file is written
//! - **Atomic counters** -- Lock-free read statistics shared across decode workers
//!
//! # Key Modules
//!
//! - [`input`] -- Dump opening, `.bz2` decompression, format detection
//! - [`json_reader`] -- JSON dump reader
//! - [`xml_reader`] -- MediaWiki XML dump reader
//! - [`decode`] -- Snak and claim decoding for both claim dialects
//! - [`pool`] -- Bounded parallel decoding
//! - [`rules`] -- Count tables and rule emission
//! - [`tabular`] -- Flat entity rows (writer and reader)
//! - [`export`] -- Rules CSV output
//! - [`models`] -- Core data types (Snak, Claim, Entity, Rule)
//! - [`datatype`] -- Wikibase datatype tags
//! - [`cancel`] -- Cancellation token and Ctrl-C listener
//! - [`stats`] -- Thread-safe read counters
//! - [`error`] -- Reader and snak error types
//! - [`config`] -- Constants for reading and writing
//!
//! # Example Usage
//!
//! ```bash
//! # Rules straight from a compressed JSON dump, decoding on 8 threads
//! propsuggest rules -i latest-all.json.bz2 -o rules.csv --threads 8
//!
//! # Convert once, then compute rules from the row file
//! propsuggest convert -i latest-all.json.bz2 -o entities.csv
//! propsuggest rules -i entities.csv -o rules.csv
//! ```

pub mod cancel;
pub mod config;
pub mod datatype;
pub mod decode;
pub mod error;
pub mod export;
pub mod input;
pub mod json_reader;
pub mod models;
pub mod pool;
pub mod rules;
pub mod stats;
pub mod tabular;
pub mod xml_reader;
