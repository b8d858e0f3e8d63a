//! Prompt composition for deck generation and single-slide edits.

use crate::api::PromptMessage;
use crate::models::Presentation;

const GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert presentation creator. Your task is to create professional, informative presentations based on user topics.

When given a topic, you should:
1. Research and gather information about the topic
2. Structure the content into logical slides
3. Create engaging titles and bullet points
4. Return the presentation in JSON format

Return your response in this exact JSON format:
{
  "title": "Presentation Title",
  "description": "Brief description",
  "slides": [
    {
      "title": "Slide Title",
      "content": ["Bullet point 1", "Bullet point 2", "Bullet point 3"],
      "layout": "content",
      "order": 0
    }
  ]
}

Guidelines:
- Create 5-8 slides
- Use clear, concise language
- Include an introduction slide, content slides, and a conclusion slide
- Each content slide should have 3-5 bullet points
- Make it professional and informative"#;

const EDIT_SYSTEM_PROMPT: &str = "You are an expert presentation copywriter. Edit the target slide to follow the user's instruction while keeping tone and format consistent with the rest of the presentation.
- Maintain clear, concise bullet points (3-5 bullets preferred).
- Bullets should be sentence fragments, not full paragraphs.
- Avoid markdown or numbering; plain text only.
- Return only JSON. Do not include explanations.";

const EDIT_OUTPUT_SHAPE: &str = r#"Return JSON in this shape:
{
  "title": "Updated slide title",
  "content": ["Bullet point one", "Bullet point two"]
}"#;

pub fn generation_messages(topic: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system(GENERATION_SYSTEM_PROMPT),
        PromptMessage::user(format!(
            "User's topic: {topic}\n\nPlease create a comprehensive presentation about this topic."
        )),
    ]
}

/// One block per slide: `Slide N: title` followed by indented bullets.
pub fn deck_outline(presentation: &Presentation) -> String {
    presentation
        .slides
        .iter()
        .enumerate()
        .map(|(index, slide)| {
            let bullets = slide
                .content
                .iter()
                .map(|point| format!("  - {point}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Slide {}: {}\n{}", index + 1, slide.title, bullets)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Caller guarantees `slide_index` is in bounds.
pub fn edit_messages(
    presentation: &Presentation,
    slide_index: usize,
    instruction: &str,
) -> Vec<PromptMessage> {
    let target = &presentation.slides[slide_index];
    let target_json = serde_json::to_string_pretty(&serde_json::json!({
        "title": target.title,
        "content": target.content,
        "layout": target.layout,
        "order": target.order,
    }))
    .unwrap_or_default();

    let user_prompt = format!(
        "Presentation title: {}\nPresentation description: {}\n\nCurrent presentation overview:\n{}\n\nTarget slide (Slide {}):\n{}\n\nInstruction: {}\n\n{}",
        presentation.title,
        presentation.description.as_deref().unwrap_or("(none)"),
        deck_outline(presentation),
        slide_index + 1,
        target_json,
        instruction.trim(),
        EDIT_OUTPUT_SHAPE,
    );

    vec![PromptMessage::system(EDIT_SYSTEM_PROMPT), PromptMessage::user(user_prompt)]
}
