//! Configuration constants for the quiz engine
//!
//! This module contains the limits and defaults used throughout the
//! crate to keep stored questions, round configuration and judge calls
//! within consistent boundaries.

/// Question content limits
pub mod question {
    /// Maximum length of a question text in characters
    pub const MAX_TEXT_LENGTH: usize = 500;
    /// Maximum length of a correct answer in characters
    pub const MAX_ANSWER_LENGTH: usize = 200;
    /// Maximum number of acceptable keywords per question
    pub const MAX_KEYWORD_COUNT: usize = 16;
    /// Maximum length of a single keyword in characters
    pub const MAX_KEYWORD_LENGTH: usize = 100;
}

/// Question bank persistence
pub mod bank {
    /// Storage key holding the custom question array
    pub const CUSTOM_QUESTIONS_KEY: &str = "custom_questions";
}

/// Round and game limits
pub mod round {
    /// Maximum number of questions a single round may ask
    pub const MAX_QUESTIONS: usize = 10;
    /// Minimum time in seconds to answer a question
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum time in seconds to answer a question
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Points a party needs to win the game unless configured otherwise
    pub const DEFAULT_WIN_THRESHOLD: u32 = 10;
    /// Largest configurable win threshold
    pub const MAX_WIN_THRESHOLD: u32 = 100;
}

/// Answer matching
pub mod matching {
    /// Share of keywords or answer words that must be present for a fuzzy match
    pub const FUZZY_OVERLAP: f64 = 0.5;
    /// Number of leading characters two words must share to count as the same stem
    pub const STEM_LENGTH: usize = 4;
    /// Words shorter than this are ignored by the fuzzy overlap
    pub const MIN_WORD_LENGTH: usize = 3;
}

/// Remote answer judge
pub mod judge {
    /// Default bound in seconds on a single judge round trip
    pub const DEFAULT_TIMEOUT: u64 = 15;
    /// Minimum configurable judge timeout in seconds
    pub const MIN_TIMEOUT: u64 = 1;
    /// Maximum configurable judge timeout in seconds
    pub const MAX_TIMEOUT: u64 = 120;
    /// Default chat model asked to judge answers
    pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
    /// Default OpenAI-compatible API base
    pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1";
    /// Longest error body kept in a status error
    pub const MAX_ERROR_BODY: usize = 512;
}
