//! Behaviour every `ModelClient` must share.

use std::sync::Arc;

use pearl::providers::scripted::ScriptedModel;
use pearl::providers::{sanitize_backend_output, ModelClient, ModelError};

#[test]
fn model_client_is_object_safe_and_shareable() {
    fn assert_send_sync<T: Send + Sync + ?Sized>() {}
    assert_send_sync::<dyn ModelClient>();
    let _shared: Arc<dyn ModelClient> = Arc::new(ScriptedModel::echo());
}

#[tokio::test]
async fn clients_shared_across_tasks_keep_call_order() {
    let model = Arc::new(ScriptedModel::new(["one", "two"]));
    let client: Arc<dyn ModelClient> = model.clone();

    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.generate("p1").await }
    })
    .await
    .expect("task joins")
    .expect("first reply");
    let second = client.generate("p2").await.expect("second reply");

    assert_eq!(first, "one");
    assert_eq!(second, "two");
    assert_eq!(model.prompts(), vec!["p1", "p2"]);
}

#[test]
fn model_errors_render_for_users() {
    let err = ModelError::Timeout { seconds: 30 };
    assert_eq!(err.to_string(), "model call timed out after 30s");
    let err = ModelError::Exit {
        code: Some(2),
        stderr: "bad flag".to_owned(),
    };
    assert_eq!(
        err.to_string(),
        "model backend exited with status Some(2): bad flag"
    );
}

#[test]
fn backend_output_never_leaks_keys() {
    let raw = "error: invalid key sk-ant-REDACTED";
    let clean = sanitize_backend_output(raw);
    assert!(!clean.contains("abcdefghijklmnop"));
    assert!(clean.starts_with("error: invalid key"));
}
