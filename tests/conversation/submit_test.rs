//! Message submission and history growth.

use std::sync::Arc;

use pearl::conversation::{ChatError, ConversationManager, MISSING_MESSAGE, MISSING_PERSONA};
use pearl::prompt::PromptTemplate;
use pearl::providers::scripted::ScriptedModel;
use pearl::providers::{ModelClient, ModelError};
use pearl::session::Role;

fn manager_with(model: ScriptedModel) -> (ConversationManager, Arc<ScriptedModel>) {
    let model = Arc::new(model);
    let client: Arc<dyn ModelClient> = model.clone();
    let template = PromptTemplate::builtin("interview").expect("builtin template");
    (ConversationManager::new(client, template), model)
}

#[tokio::test]
async fn submit_without_persona_is_rejected() {
    let (mut m, model) = manager_with(ScriptedModel::new(["never"]));
    let err = m.submit_message("hello").await.expect_err("needs persona");
    assert!(matches!(err, ChatError::Validation(MISSING_PERSONA)));
    assert!(m.history().is_empty());
    assert!(model.prompts().is_empty(), "model must not be called");
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let (mut m, model) = manager_with(ScriptedModel::new(["never"]));
    m.install_persona("Katarina").expect("install");
    let err = m.submit_message("  ").await.expect_err("needs text");
    assert!(matches!(err, ChatError::Validation(MISSING_MESSAGE)));
    assert_eq!(m.history().len(), 1);
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn each_success_appends_human_then_ai() {
    let replies = ["one", "two", "three", "four"];
    let (mut m, _model) = manager_with(ScriptedModel::new(replies));
    m.install_persona("Katarina").expect("install");

    for (i, reply) in replies.iter().enumerate() {
        let before = m.history().len();
        let question = format!("question {i}");
        let answer = m.submit_message(&question).await.expect("answer");

        assert_eq!(&answer, reply);
        assert_eq!(m.history().len(), before + 2);
        let human = &m.history()[before];
        let ai = &m.history()[before + 1];
        assert_eq!(human.role, Role::Human);
        assert_eq!(human.content, question);
        assert_eq!(ai.role, Role::Ai);
        assert_eq!(ai.content, *reply);
    }
}

#[tokio::test]
async fn model_failure_keeps_question_marked_failed() {
    let model = ScriptedModel::new(["A"]).then_fail("backend down");
    let (mut m, _model) = manager_with(model);
    m.install_persona("Katarina").expect("install");
    m.submit_message("q1").await.expect("first answer");
    let before = m.history().len();

    let err = m.submit_message("q2").await.expect_err("second call fails");

    assert!(matches!(err, ChatError::Model(ModelError::Unavailable(_))));
    assert_eq!(m.history().len(), before + 1);
    let last = m.history().last().expect("turn appended");
    assert_eq!(last.role, Role::Human);
    assert_eq!(last.content, "q2");
    assert!(last.failed);
}

#[tokio::test]
async fn conversation_continues_after_failure() {
    let model = ScriptedModel::new(Vec::<String>::new())
        .then_fail("timeout")
        .then_reply("recovered");
    let (mut m, model) = manager_with(model);
    m.install_persona("Katarina").expect("install");

    assert!(m.submit_message("lost question").await.is_err());
    let reply = m.submit_message("asked again").await.expect("answer");

    assert_eq!(reply, "recovered");
    assert_eq!(m.history().len(), 4);
    let second_prompt = &model.prompts()[1];
    assert!(!second_prompt.contains("lost question"));
}

#[tokio::test]
async fn set_model_keeps_history() {
    let (mut m, _model) = manager_with(ScriptedModel::new(["A"]));
    m.install_persona("Katarina").expect("install");
    m.submit_message("q1").await.expect("a1");

    m.set_model(Arc::new(ScriptedModel::echo()));
    let reply = m.submit_message("q2").await.expect("echo");

    assert_eq!(m.model_id(), "offline");
    assert_eq!(reply, "(offline) You asked: q2");
    assert_eq!(m.history().len(), 5);
}
