mod common;

use actix_web::{http::StatusCode, test, App};

use common::{setup_state, ScriptedProvider, DECK_REPLY};
use slidesmith_lib::models::{ReasoningKind, SlideLayout};
use slidesmith_lib::orchestrator::GenerationEvent;
use slidesmith_lib::sse::{Frame, FrameDecoder};

fn decode(body: &[u8]) -> Vec<Frame> {
    let text = std::str::from_utf8(body).expect("stream is UTF-8");
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(text);
    assert!(decoder.pending().is_empty(), "stream ended mid-frame");
    frames
}

fn progress_messages(frames: &[Frame]) -> Vec<String> {
    frames
        .iter()
        .filter_map(|f| match f {
            Frame::Event(GenerationEvent::Progress { message }) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[actix_web::test]
async fn test_generation_streams_ordered_events_and_one_deck() {
    let provider = ScriptedProvider::replying(DECK_REPLY);
    let (_dir, state) = setup_state(provider.clone()).await;
    let app = test::init_service(App::new().app_data(state).configure(slidesmith_lib::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .set_json(serde_json::json!({ "prompt": "Solar energy" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );

    let frames = decode(&test::read_body(resp).await);
    assert_eq!(provider.calls(), 1);

    let kinds: Vec<ReasoningKind> = frames
        .iter()
        .filter_map(|f| match f {
            Frame::Event(GenerationEvent::Reasoning { step }) => Some(step.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![ReasoningKind::Thinking, ReasoningKind::Searching, ReasoningKind::Generating]
    );

    assert_eq!(
        progress_messages(&frames),
        vec![
            "Generating presentation content...",
            "Processing AI response...",
            "Creating 3 slides...",
            "Generating slide 1/3...",
            "Generating slide 3/3...",
            "Generating layouts...",
            "Finalizing presentation...",
        ]
    );

    // Exactly one presentation, immediately followed by the terminator.
    let decks: Vec<usize> = frames
        .iter()
        .enumerate()
        .filter(|(_, f)| matches!(f, Frame::Event(GenerationEvent::Presentation { .. })))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(decks.len(), 1);
    assert_eq!(decks[0], frames.len() - 2);
    assert_eq!(frames.last(), Some(&Frame::Done));

    let Frame::Event(GenerationEvent::Presentation { presentation }) = &frames[decks[0]] else {
        unreachable!()
    };
    assert_eq!(presentation.title, "Solar Energy");
    assert_eq!(presentation.slides.len(), 3);
    for (index, slide) in presentation.slides.iter().enumerate() {
        assert_eq!(slide.order, index);
        assert_eq!(slide.presentation_id.as_deref(), Some(presentation.id.as_str()));
    }
    assert_eq!(presentation.slides[0].layout, SlideLayout::Title);
    assert_eq!(presentation.slides[2].layout, SlideLayout::Content);
    assert_eq!(
        presentation.slides[1].content,
        vec!["Panels capture light", "Inverters convert DC to AC"]
    );
    assert_eq!(presentation.slides[2].content, vec!["Lower bills", "**Zero** emissions"]);
}

#[actix_web::test]
async fn test_unstructured_reply_yields_degraded_single_slide() {
    let reply = "Solar power is great.\n- It is renewable\n- It is cheap\n\nThanks!";
    let provider = ScriptedProvider::replying(reply);
    let (_dir, state) = setup_state(provider).await;
    let app = test::init_service(App::new().app_data(state).configure(slidesmith_lib::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .set_json(serde_json::json!({ "prompt": "  Solar power  " }))
        .to_request();
    let frames = decode(&test::call_and_read_body(&app, req).await);

    // No assembly narration on the degraded path.
    assert!(!progress_messages(&frames).iter().any(|m| m.starts_with("Creating")));

    let deck = frames
        .iter()
        .find_map(|f| match f {
            Frame::Event(GenerationEvent::Presentation { presentation }) => Some(presentation.clone()),
            _ => None,
        })
        .expect("a presentation event");
    assert_eq!(deck.title, "Solar power");
    assert_eq!(deck.description.as_deref(), Some("AI Generated Presentation"));
    assert_eq!(deck.slides.len(), 1);
    assert_eq!(
        deck.slides[0].content,
        vec!["Solar power is great.", "It is renewable", "It is cheap", "Thanks!"]
    );
    assert_eq!(frames.last(), Some(&Frame::Done));
}

#[actix_web::test]
async fn test_model_failure_ends_stream_with_error_event() {
    let provider = ScriptedProvider::failing("upstream unavailable");
    let (_dir, state) = setup_state(provider).await;
    let app = test::init_service(App::new().app_data(state).configure(slidesmith_lib::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .set_json(serde_json::json!({ "prompt": "Solar energy" }))
        .to_request();
    let frames = decode(&test::call_and_read_body(&app, req).await);

    match frames.last() {
        Some(Frame::Event(GenerationEvent::Error { error })) => assert!(error.contains("upstream unavailable")),
        other => panic!("expected a terminal error event, got {other:?}"),
    }
    assert!(!frames.contains(&Frame::Done));
    assert!(!frames
        .iter()
        .any(|f| matches!(f, Frame::Event(GenerationEvent::Presentation { .. }))));
}

#[actix_web::test]
async fn test_blank_prompt_is_rejected_without_model_call() {
    let provider = ScriptedProvider::replying(DECK_REPLY);
    let (_dir, state) = setup_state(provider.clone()).await;
    let app = test::init_service(App::new().app_data(state).configure(slidesmith_lib::configure)).await;

    for body in [serde_json::json!({ "prompt": "   " }), serde_json::json!({})] {
        let req = test::TestRequest::post().uri("/api/generate").set_json(body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Prompt is required");
    }
    assert_eq!(provider.calls(), 0);
}

#[actix_web::test]
async fn test_malformed_json_body_is_a_bad_request() {
    let provider = ScriptedProvider::replying(DECK_REPLY);
    let (_dir, state) = setup_state(provider).await;
    let app = test::init_service(App::new().app_data(state).configure(slidesmith_lib::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/generate")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON payload"));
}
