//! Built-in question set shipped with the crate
//!
//! The questions are embedded as JSON and parsed once on first use.

use once_cell_serde::sync::OnceCell;
use tracing::error;

use crate::question::Question;

const BUILT_IN_JSON: &str = include_str!("../data/questions.json");

static BUILT_IN: OnceCell<Vec<Question>> = OnceCell::new();

/// Returns the read-only built-in questions in shipping order
pub fn questions() -> &'static [Question] {
    BUILT_IN.get_or_init(|| {
        serde_json::from_str(BUILT_IN_JSON).unwrap_or_else(|e| {
            error!("built-in question set is malformed: {e}");
            Vec::new()
        })
    })
}
