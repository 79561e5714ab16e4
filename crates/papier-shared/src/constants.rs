/// Application name
pub const APP_NAME: &str = "Papier";

/// File extension for message files (matched case-insensitively)
pub const MESSAGE_EXTENSION: &str = "md";

/// Marker line delimiting the header block of a message document
pub const HEADER_DELIMITER: &str = "---";

/// Length of the random id segment in a message filename
pub const MESSAGE_ID_LEN: usize = 6;

/// Timestamp segment of a message filename, UTC
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// `date` / `edited` header fields, ISO-8601 UTC at second precision
pub const HEADER_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Directory documents that are never messages, whatever they contain
pub const RESERVED_FILENAMES: [&str; 3] = ["schema.md", "agent.md", "readme.md"];

/// Maximum number of messages retained per cached channel
pub const CHANNEL_RETENTION_LIMIT: usize = 500;

/// Age (seconds) past which a cached channel snapshot is considered stale
pub const DEFAULT_STALENESS_SECS: i64 = 60;

/// Interval between conditional change probes, per open channel
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
