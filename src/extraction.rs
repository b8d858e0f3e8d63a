//! Recovery of a JSON payload embedded in free-form model output.
//!
//! Models wrap their answer in prose, markdown fences or both, so the payload
//! has to be located before it can be parsed. The search is deliberately
//! permissive and takes the first candidate found scanning left to right; a
//! brace-heavy aside that precedes the real payload will be picked instead of
//! it.

use serde_json::Value;
use thiserror::Error;

/// Key that marks a full-deck payload.
pub const SLIDES_ANCHOR: &str = "\"slides\"";

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("model response did not include JSON")]
    NotFound,
    #[error("model response JSON was cut off before the closing brace")]
    Unterminated,
    #[error("model response JSON could not be parsed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Finds and parses the JSON object embedded in `raw`.
///
/// With an `anchor`, only candidates containing that literal (e.g.
/// [`SLIDES_ANCHOR`]) qualify; without one the first object wins.
pub fn extract(raw: &str, anchor: Option<&str>) -> Result<Value, ExtractionError> {
    let candidate = locate(raw, anchor)?;
    log::debug!("Extracted {} byte JSON candidate", candidate.len());
    Ok(serde_json::from_str(candidate)?)
}

fn locate<'a>(raw: &'a str, anchor: Option<&str>) -> Result<&'a str, ExtractionError> {
    if let Some(fenced) = fenced_block(raw) {
        if anchor.map_or(true, |a| fenced.contains(a)) {
            return Ok(fenced);
        }
    }

    let mut unterminated = false;
    for (start, _) in raw.match_indices('{') {
        match balanced_span(&raw[start..]) {
            Some(span) => {
                if anchor.map_or(true, |a| span.contains(a)) {
                    return Ok(span);
                }
            }
            None => {
                // Every later brace sits inside this unterminated span.
                unterminated = true;
                break;
            }
        }
    }

    if unterminated {
        Err(ExtractionError::Unterminated)
    } else {
        Err(ExtractionError::NotFound)
    }
}

/// Inner text of the first ```json fence, if it is closed.
fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find(JSON_FENCE)?;
    let body = &raw[open + JSON_FENCE.len()..];
    let close = body.find(FENCE)?;
    Some(body[..close].trim())
}

/// The `{...}` span at the start of `text`, matched with string awareness.
fn balanced_span(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deck() -> Value {
        json!({
            "title": "Solar energy",
            "slides": [
                {"title": "Intro", "content": ["Sun {power}", "Panels"], "layout": "title"},
                {"title": "Costs", "content": ["Falling"]}
            ]
        })
    }

    #[test]
    fn clean_json_is_returned_unchanged() {
        let raw = serde_json::to_string(&deck()).unwrap();
        assert_eq!(extract(&raw, Some(SLIDES_ANCHOR)).unwrap(), deck());
        assert_eq!(extract(&raw, None).unwrap(), deck());
    }

    #[test]
    fn fenced_payload_amid_prose_is_recovered() {
        let raw = format!(
            "here you go:\n```json\n{}\n```\nthanks",
            serde_json::to_string(&deck()).unwrap()
        );
        assert_eq!(extract(&raw, Some(SLIDES_ANCHOR)).unwrap(), deck());
    }

    #[test]
    fn unfenced_payload_with_trailing_prose_is_recovered() {
        let raw = format!(
            "Sure! {}\nLet me know if you want changes {{or not}}.",
            serde_json::to_string_pretty(&deck()).unwrap()
        );
        assert_eq!(extract(&raw, Some(SLIDES_ANCHOR)).unwrap(), deck());
    }

    #[test]
    fn anchor_skips_leading_objects_without_the_key() {
        let raw = r#"Format: {"note": "draft"} then {"slides": [{"title": "A", "content": ["b"]}]}"#;
        let value = extract(raw, Some(SLIDES_ANCHOR)).unwrap();
        assert_eq!(value["slides"][0]["title"], "A");
    }

    #[test]
    fn without_anchor_first_object_wins() {
        let raw = r#"{"title": "First"} {"title": "Second"}"#;
        assert_eq!(extract(raw, None).unwrap()["title"], "First");
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_span() {
        let raw = r#"{"title": "Close } early", "content": ["a \" } b"]}"#;
        let value = extract(raw, None).unwrap();
        assert_eq!(value["title"], "Close } early");
    }

    #[test]
    fn missing_payload_is_not_found() {
        assert!(matches!(
            extract("no json at all", None),
            Err(ExtractionError::NotFound)
        ));
        assert!(matches!(
            extract(r#"{"title": "x"}"#, Some(SLIDES_ANCHOR)),
            Err(ExtractionError::NotFound)
        ));
    }

    #[test]
    fn truncated_payload_is_unterminated() {
        assert!(matches!(
            extract(r#"{"slides": [{"title": "A""#, Some(SLIDES_ANCHOR)),
            Err(ExtractionError::Unterminated)
        ));
    }

    #[test]
    fn broken_fence_is_malformed() {
        let raw = "```json\n{\"title\": \"A\", }\n```";
        assert!(matches!(extract(raw, None), Err(ExtractionError::Malformed(_))));
    }
}
