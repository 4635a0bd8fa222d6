//! Transcript export end to end.

use std::sync::Arc;

use pearl::conversation::ConversationManager;
use pearl::prompt::PromptTemplate;
use pearl::providers::scripted::ScriptedModel;

fn manager(model: ScriptedModel) -> ConversationManager {
    let template = PromptTemplate::builtin("interview").expect("builtin template");
    ConversationManager::new(Arc::new(model), template)
}

#[tokio::test]
async fn katarina_interview_exports_question_then_answer() {
    let mut m = manager(ScriptedModel::new(["I teach mathematics."]));
    m.install_persona("Katarina is a 40-year-old math teacher")
        .expect("install");
    m.submit_message("What subject do you teach?")
        .await
        .expect("answer");

    let text = m.export_transcript();
    let lines: Vec<&str> = text.lines().collect();
    let q = lines
        .iter()
        .position(|l| *l == "What subject do you teach?")
        .expect("question line");
    assert_eq!(lines.get(q + 1), Some(&"I teach mathematics."));
    assert!(!text.contains("Katarina"));
}

#[tokio::test]
async fn two_exchanges_give_two_pairs_in_order() {
    let mut m = manager(ScriptedModel::new(["A", "B"]));
    m.install_persona("Katarina").expect("install");
    m.submit_message("first").await.expect("A");
    m.submit_message("second").await.expect("B");

    assert_eq!(m.history().len(), 5);
    let transcript = m.transcript();
    assert_eq!(transcript.exchanges, 2);
    assert!(transcript.skipped.is_empty());
    assert_eq!(transcript.text, "first\nA\nsecond\nB\n");
}

#[tokio::test]
async fn export_is_idempotent() {
    let mut m = manager(ScriptedModel::new(["A"]).then_fail("down"));
    m.install_persona("Katarina").expect("install");
    m.submit_message("q1").await.expect("A");
    let _ = m.submit_message("q2").await;

    let first = m.export_transcript();
    let second = m.export_transcript();
    assert_eq!(first, second);
    assert_eq!(first, "q1\nA\n");
}

#[tokio::test]
async fn failed_question_is_reported_as_skipped() {
    let mut m = manager(ScriptedModel::new(Vec::<String>::new()).then_fail("down"));
    m.install_persona("Katarina").expect("install");
    let _ = m.submit_message("unanswered").await;

    let transcript = m.transcript();
    assert!(transcript.is_empty());
    assert_eq!(transcript.skipped.len(), 1);
    assert_eq!(transcript.skipped[0].index, 1);
}

#[test]
fn empty_session_exports_empty_text() {
    let m = manager(ScriptedModel::new(Vec::<String>::new()));
    assert_eq!(m.export_transcript(), "");
}

#[tokio::test]
async fn escaped_newlines_expand_in_export() {
    let mut m = manager(ScriptedModel::new(["line one\\nline two"]));
    m.install_persona("Katarina").expect("install");
    m.submit_message("multi\\npart").await.expect("answer");

    assert_eq!(m.export_transcript(), "multi\npart\nline one\nline two\n");
}
