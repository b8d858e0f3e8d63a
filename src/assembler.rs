//! Turns an extracted payload into a complete, valid [`Presentation`].

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{Presentation, Slide, SlideLayout};

pub const DEGRADED_DESCRIPTION: &str = "AI Generated Presentation";
const DEGRADED_MAX_BULLETS: usize = 5;
const EMPTY_RESPONSE_BULLET: &str = "The model returned no usable content for this topic.";
const BULLET_GLYPHS: &[char] = &['-', '•'];

/// Removes a leading bullet glyph and surrounding whitespace from one line.
///
/// `*` only counts as a bullet when whitespace follows it, so `**bold**` and
/// `*italic*` openings are kept.
pub fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(BULLET_GLYPHS) {
        return rest.trim();
    }
    match line.strip_prefix('*') {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => line,
    }
}

/// Coerces a model-supplied `content` value into a list of bullets.
///
/// Arrays keep their order with blank entries dropped; a single string is
/// split into lines. Bullet glyphs are stripped either way.
pub fn normalize_content(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(strip_bullet(s).to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(text)) => split_lines(text),
        _ => Vec::new(),
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Builds a deck from the extracted payload, falling back to a single
/// degraded slide built from `raw_text` when the payload has no usable slides.
pub fn assemble(parsed: Option<&Value>, raw_text: &str, topic: &str) -> Presentation {
    match parsed.and_then(|p| try_assemble(p, topic)) {
        Some(presentation) => presentation,
        None => {
            log::warn!("No usable slides in model response, building degraded presentation for '{}'", topic);
            degraded_presentation(raw_text, topic)
        }
    }
}

/// Builds a deck from a payload's `slides` array. `None` when no entry
/// survives normalization.
fn try_assemble(parsed: &Value, topic: &str) -> Option<Presentation> {
    let now = Utc::now();
    let deck_id = Uuid::new_v4().to_string();

    let entries = parsed.get("slides").and_then(Value::as_array)?;

    let mut slides: Vec<Slide> = entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let content = normalize_content(obj.get("content"));
            if content.is_empty() {
                log::warn!("Dropping slide without bullet content");
                return None;
            }
            Some(Slide {
                id: Uuid::new_v4().to_string(),
                presentation_id: Some(deck_id.clone()),
                title: non_empty_str(obj.get("title")).unwrap_or_default().to_string(),
                content,
                layout: obj
                    .get("layout")
                    .and_then(Value::as_str)
                    .and_then(SlideLayout::parse)
                    .unwrap_or_default(),
                order: 0,
                created_at: Some(now),
                updated_at: None,
            })
        })
        .collect();

    if slides.is_empty() {
        return None;
    }

    for (index, slide) in slides.iter_mut().enumerate() {
        slide.order = index;
        if slide.title.is_empty() {
            slide.title = format!("Slide {}", index + 1);
        }
    }

    Some(Presentation {
        id: deck_id,
        title: non_empty_str(parsed.get("title")).unwrap_or(topic).to_string(),
        description: non_empty_str(parsed.get("description")).map(str::to_string),
        slides,
        created_at: Some(now),
        updated_at: None,
    })
}

/// Single-slide deck titled with the topic, bullets taken from the first
/// non-empty lines of the raw model text.
fn degraded_presentation(raw_text: &str, topic: &str) -> Presentation {
    let now = Utc::now();
    let deck_id = Uuid::new_v4().to_string();
    let mut content: Vec<String> = split_lines(raw_text)
        .into_iter()
        .take(DEGRADED_MAX_BULLETS)
        .collect();
    if content.is_empty() {
        content.push(EMPTY_RESPONSE_BULLET.to_string());
    }

    let title = match topic.trim() {
        "" => "Untitled presentation".to_string(),
        t => t.to_string(),
    };

    Presentation {
        id: deck_id.clone(),
        title: title.clone(),
        description: Some(DEGRADED_DESCRIPTION.to_string()),
        slides: vec![Slide {
            id: Uuid::new_v4().to_string(),
            presentation_id: Some(deck_id),
            title,
            content,
            layout: SlideLayout::Content,
            order: 0,
            created_at: Some(now),
            updated_at: None,
        }],
        created_at: Some(now),
        updated_at: None,
    }
}
