//! Session persistence through a key-value store.

use std::sync::Arc;

use pearl::conversation::{ChatError, ConversationManager};
use pearl::prompt::PromptTemplate;
use pearl::providers::scripted::ScriptedModel;
use pearl::session::store::{MemoryStore, SessionStore, StoreError, HISTORY_KEY, PERSONA_KEY};
use pearl::session::{Role, SessionState};

fn template() -> PromptTemplate {
    PromptTemplate::builtin("interview").expect("builtin template")
}

#[tokio::test]
async fn state_survives_a_new_manager_over_the_same_store() {
    let mut m = ConversationManager::new(Arc::new(ScriptedModel::new(["A"])), template());
    m.install_persona("Katarina").expect("install");
    m.submit_message("q1").await.expect("answer");
    let store = m.store().clone();

    let resumed =
        ConversationManager::with_store(Arc::new(ScriptedModel::new(["B"])), template(), store);

    assert_eq!(resumed.persona(), Some("Katarina"));
    assert_eq!(resumed.state(), SessionState::PersonaActive);
    assert_eq!(resumed.history().len(), 3);
    assert_eq!(resumed.export_transcript(), "q1\nA\n");
}

#[test]
fn store_keys_are_written_on_install() {
    let mut m = ConversationManager::new(Arc::new(ScriptedModel::echo()), template());
    m.install_persona("Katarina").expect("install");

    assert_eq!(m.store().get(PERSONA_KEY).as_deref(), Some("Katarina"));
    let history = m.store().get(HISTORY_KEY).expect("history stored");
    assert!(history.contains("\"persona\""));
}

#[test]
fn irregular_stored_items_are_skipped() {
    let mut store = MemoryStore::new();
    store
        .set(PERSONA_KEY, "Katarina".to_owned())
        .expect("set persona");
    let history = r#"[
        {"role":"persona","content":"Katarina","at":"2024-05-01T10:00:00Z"},
        {"role":"human","content":"q1","at":"2024-05-01T10:01:00Z"},
        {"bogus":true},
        {"role":"ai","content":"a1","at":"2024-05-01T10:01:05Z"},
        {"role":"persona","content":"intruder","at":"2024-05-01T10:02:00Z"}
    ]"#;
    store
        .set(HISTORY_KEY, history.to_owned())
        .expect("set history");

    let m = ConversationManager::with_store(Arc::new(ScriptedModel::echo()), template(), store);

    let roles: Vec<Role> = m.history().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::Persona, Role::Human, Role::Ai]);
    assert_eq!(m.export_transcript(), "q1\na1\n");
}

#[test]
fn empty_store_starts_fresh() {
    let m = ConversationManager::with_store(
        Arc::new(ScriptedModel::echo()),
        template(),
        MemoryStore::new(),
    );
    assert_eq!(m.state(), SessionState::Empty);
    assert!(m.history().is_empty());
}

#[derive(Debug, Default)]
struct RejectingStore;

impl SessionStore for RejectingStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&mut self, key: &str, _value: String) -> Result<(), StoreError> {
        Err(StoreError::Write {
            key: key.to_owned(),
            detail: "read-only".to_owned(),
        })
    }

    fn clear(&mut self) {}
}

#[test]
fn store_write_failure_is_surfaced() {
    let mut m =
        ConversationManager::with_store(Arc::new(ScriptedModel::echo()), template(), RejectingStore);
    let err = m.install_persona("Katarina").expect_err("write fails");
    assert!(matches!(err, ChatError::Store(StoreError::Write { .. })));
}

/// Memory store that rejects the listed `set` calls (1-based).
#[derive(Debug, Default)]
struct FlakyStore {
    inner: MemoryStore,
    sets: usize,
    failing: Vec<usize>,
}

impl FlakyStore {
    fn failing_on(calls: &[usize]) -> Self {
        Self {
            failing: calls.to_vec(),
            ..Self::default()
        }
    }
}

impl SessionStore for FlakyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.sets += 1;
        if self.failing.contains(&self.sets) {
            return Err(StoreError::Write {
                key: key.to_owned(),
                detail: "down".to_owned(),
            });
        }
        self.inner.set(key, value)
    }

    fn clear(&mut self) {
        self.inner.clear();
    }
}

#[tokio::test]
async fn question_is_dropped_when_it_cannot_be_saved() {
    let model = Arc::new(ScriptedModel::new(["A"]));
    let client: Arc<dyn pearl::providers::ModelClient> = model.clone();
    let template = PromptTemplate::parse("{history}|{input}").expect("parse");
    // Install writes sets 1-2; the question's first write is set 3.
    let mut m = ConversationManager::with_store(client, template, FlakyStore::failing_on(&[3]));
    m.install_persona("P").expect("install");

    let err = m.submit_message("q1").await.expect_err("store rejects question");
    assert!(matches!(err, ChatError::Store(StoreError::Write { .. })));
    assert_eq!(m.history().len(), 1);
    assert!(model.prompts().is_empty(), "model must not be called");

    let reply = m.submit_message("q2").await.expect("store recovered");
    assert_eq!(reply, "A");
    assert_eq!(model.prompts(), vec!["|q2"]);
    assert_eq!(m.export_transcript(), "q2\nA\n");
}

#[tokio::test]
async fn rejected_persona_keeps_previous_session() {
    // Old persona: sets 1-2, exchange: sets 3-6, new persona: set 7.
    let store = FlakyStore::failing_on(&[7]);
    let mut m = ConversationManager::with_store(
        Arc::new(ScriptedModel::new(["A"])),
        template(),
        store,
    );
    m.install_persona("Old").expect("install");
    m.submit_message("q").await.expect("answer");

    let err = m.install_persona("New").expect_err("store rejects persona");

    assert!(matches!(err, ChatError::Store(_)));
    assert_eq!(m.persona(), Some("Old"));
    assert_eq!(m.history().len(), 3);
    assert!(m.archived().is_empty());
    assert_eq!(m.store().get(PERSONA_KEY).as_deref(), Some("Old"));
}

#[tokio::test]
async fn answer_is_returned_when_its_save_fails() {
    // Persona: sets 1-2, question: sets 3-4, answer: set 5.
    let store = FlakyStore::failing_on(&[5]);
    let mut m = ConversationManager::with_store(
        Arc::new(ScriptedModel::new(["I teach mathematics."])),
        template(),
        store,
    );
    m.install_persona("Katarina").expect("install");

    let reply = m.submit_message("What do you teach?").await.expect("answer kept");

    assert_eq!(reply, "I teach mathematics.");
    assert_eq!(m.history().len(), 3);
    assert_eq!(m.export_transcript(), "What do you teach?\nI teach mathematics.\n");
}
