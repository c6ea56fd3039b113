//! Lenient parsing of model replies

use super::Verdict;

/// Feedback used when the verdict had to be guessed from free text
pub const APPROXIMATE_FEEDBACK: &str = "Результат определён приблизительно.";

/// Removes a surrounding Markdown code fence, if any
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string, e.g. ```json
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn parse_object(text: &str) -> Option<Verdict> {
    if let Ok(verdict) = serde_json::from_str::<Verdict>(text) {
        return Some(verdict);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Reads a verdict from a model reply
///
/// Strict JSON is preferred, after stripping code fences and any text around
/// the outermost object. Failing that, the reply is scanned for an
/// affirmative `"isCorrect": true` marker and the feedback is replaced with
/// [`APPROXIMATE_FEEDBACK`].
pub fn parse_verdict(reply: &str) -> Verdict {
    if let Some(verdict) = parse_object(strip_code_fence(reply)).or_else(|| parse_object(reply)) {
        return verdict;
    }

    let compact = reply
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    Verdict {
        is_correct: compact.contains("\"iscorrect\":true"),
        feedback: APPROXIMATE_FEEDBACK.to_owned(),
    }
}
