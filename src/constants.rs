//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Pipeline defaults (overridable through `[pipeline]` config)
pub mod pipeline {
    /// Concurrent source units / rows during extraction
    pub const EXTRACTION_CONCURRENCY: usize = 5;

    /// Candidates scored concurrently per filtering batch
    pub const FILTER_BATCH_SIZE: usize = 10;

    /// Minimum relevance score to stay in consideration
    pub const RELEVANCE_THRESHOLD: f64 = 0.5;

    /// Candidates advancing to deep analysis
    pub const SHORTLIST_SIZE: usize = 5;

    /// Leading characters of a document sent to the extractor
    pub const MAX_DOCUMENT_CHARS: usize = 8000;

    /// Timeout for fetching remote decks and sheets
    pub const FETCH_TIMEOUT_SECS: u64 = 60;
}

/// Progress milestones (percent) written at stage boundaries
pub mod progress {
    pub const PARSING_START: u8 = 10;
    pub const PARSING_END: u8 = 30;
    pub const FILTERING_START: u8 = 40;
    pub const FILTERING_END: u8 = 50;
    pub const DD_START: u8 = 60;
    pub const DD_END: u8 = 90;
    pub const AGGREGATING: u8 = 90;
    pub const COMPLETED: u8 = 100;
}

/// Text-generation backend constants
pub mod llm {
    /// OpenRouter chat-completions base
    pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

    /// OpenAI chat-completions base
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

    /// Default cap on in-flight backend requests across all stages
    pub const MAX_CONCURRENT_REQUESTS: usize = 8;

    /// Transient-failure retries; per-item failures are not retried by default
    pub const DEFAULT_MAX_RETRIES: usize = 0;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Characters of raw output kept in error previews
    pub const RAW_PREVIEW_CHARS: usize = 200;
}

/// Tabular source constants
pub mod tabular {
    /// Google Sheets CSV export URL template (`{id}` is replaced by the sheet id)
    pub const SHEETS_EXPORT_URL: &str =
        "https://docs.google.com/spreadsheets/d/{id}/export?format=csv";

    /// Sheet id inside a Google Sheets URL
    pub const SHEET_ID_PATTERN: &str = r"/spreadsheets/d/([a-zA-Z0-9_-]+)";
}

/// Storage constants
pub mod storage {
    /// Project data directory
    pub const DATA_DIR: &str = ".dealsift";

    /// Database path relative to the data directory
    pub const DB_FILE: &str = "dealsift.db";

    /// SQLite busy timeout (milliseconds)
    pub const BUSY_TIMEOUT_MS: u32 = 5000;
}
