/// Progress update interval (log/tick every N records)
pub const PROGRESS_INTERVAL: u64 = 3000;

/// Buffer size for CSV writers
pub const CSV_BUFFER_SIZE: usize = 128 * 1024;

/// Buffer size for dump readers
pub const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Decoded entities allowed in flight between the worker pool and the consumer
pub const DECODE_CHANNEL_BOUND: usize = 1024;

/// Page content model carrying item JSON in XML dumps
pub const XML_ITEM_MODEL: &str = "wikibase-item";

/// Entity type accepted from JSON dumps
pub const JSON_ITEM_TYPE: &str = "item";

/// Header expected by the suggester's rule table importer
pub const RULES_CSV_HEADER: [&str; 6] = ["pid1", "qid1", "pid2", "count", "probability", "context"];

/// Exit status after an interrupt, as shells report SIGINT
pub const INTERRUPTED_EXIT_CODE: u8 = 130;
