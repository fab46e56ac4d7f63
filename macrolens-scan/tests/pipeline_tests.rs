//! End-to-end scan pipeline tests
//!
//! Inference is stubbed through [`InferenceBackend`]; history runs on the
//! in-memory store or a real SQLite file in a temp folder.

use async_trait::async_trait;
use chrono::Utc;
use macrolens_common::db::{init_database, KeyValueStore, MemoryStore, SqliteSettingsStore};
use macrolens_common::history::HISTORY_KEY;
use macrolens_common::inference::{EncodedImage, InferenceBackend, InferenceError};
use macrolens_common::{Confidence, Credential, Error, HistoryStore};
use macrolens_scan::orchestrator::{MSG_INVALID_KEY, MSG_NO_IMAGE, MSG_UNREADABLE};
use macrolens_scan::{ingest_file, Dispatch, ScanError, ScanSession, ScanState};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

const CHICKEN_SALAD: &str = r#"{"foodName":"Grilled chicken salad","servingSize":"1 bowl ~350g","calories":420,"protein":38,"carbs":18,"fat":22,"fiber":6,"sugar":4,"confidence":"high","notes":"Estimate based on visible dressing."}"#;

const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

/// Canned upstream that records how often it was called
struct StubBackend {
    outcome: Result<String, InferenceError>,
    calls: AtomicUsize,
}

impl StubBackend {
    fn new(outcome: Result<String, InferenceError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for StubBackend {
    fn requires_credential(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        image: &EncodedImage,
        credential: Option<&Credential>,
    ) -> Result<String, InferenceError> {
        assert!(!image.is_empty());
        assert!(credential.is_some());
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Settings storage that fails every call
struct UnavailableStore;

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> macrolens_common::Result<Option<String>> {
        Err(Error::Internal("disk unavailable".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str) -> macrolens_common::Result<()> {
        Err(Error::Internal("disk unavailable".to_string()))
    }

    async fn remove(&self, _key: &str) -> macrolens_common::Result<()> {
        Err(Error::Internal("disk unavailable".to_string()))
    }
}

fn photo() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(JPEG_HEADER).unwrap();
    file.flush().unwrap();
    file
}

async fn session_with(
    backend: Arc<StubBackend>,
    store: Arc<dyn KeyValueStore>,
) -> ScanSession {
    let history = HistoryStore::load(store, 20).await;
    ScanSession::new(backend, Credential::new("sk-ant-api03-test"), history)
}

async fn ready_session(backend: Arc<StubBackend>, photo: &NamedTempFile) -> ScanSession {
    let mut session = session_with(backend, Arc::new(MemoryStore::new())).await;
    let image = ingest_file(photo.path(), None).await.unwrap().unwrap();
    assert!(session.accept_image(image));
    session
}

#[tokio::test]
async fn test_compliant_answer_succeeds_and_records_history() {
    let backend = StubBackend::new(Ok(format!("```json\n{}\n```", CHICKEN_SALAD)));
    let file = photo();
    let mut session = ready_session(Arc::clone(&backend), &file).await;
    let before = Utc::now();

    session.analyze().await.unwrap();

    let record = session.state().record().expect("scan should succeed");
    assert_eq!(record.food_name, "Grilled chicken salad");
    assert_eq!(record.calories, 420.0);
    assert_eq!(record.confidence, Confidence::High);

    assert_eq!(session.history().len(), 1);
    let entry = session.history().latest().unwrap();
    assert_eq!(&entry.record, record);
    assert!(entry.timestamp >= before - chrono::Duration::milliseconds(1));
    assert_eq!(
        entry.thumbnail_path(),
        Some(file.path().canonicalize().unwrap().as_path())
    );
    assert_eq!(backend.calls(), 1);

    session.acknowledge();
    assert_eq!(session.state(), &ScanState::Idle);
}

#[tokio::test]
async fn test_auth_error_fails_with_key_message() {
    let backend = StubBackend::new(Err(InferenceError::Auth(
        "invalid x-api-key".to_string(),
    )));
    let file = photo();
    let mut session = ready_session(backend, &file).await;

    session.analyze().await.unwrap();

    let error = session.state().error().expect("scan should fail");
    assert!(matches!(error, ScanError::AuthError(_)));
    assert_eq!(error.user_message(), MSG_INVALID_KEY);
    assert!(session.history().is_empty());
    assert!(session.state().image().is_some());
}

#[tokio::test]
async fn test_non_json_answer_fails_as_malformed() {
    let backend = StubBackend::new(Ok("Looks like a tasty salad!".to_string()));
    let file = photo();
    let mut session = ready_session(backend, &file).await;

    session.analyze().await.unwrap();

    let error = session.state().error().expect("scan should fail");
    assert!(matches!(error, ScanError::MalformedResponse(_)));
    assert_eq!(error.user_message(), MSG_UNREADABLE);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_partial_record_is_rejected() {
    let backend = StubBackend::new(Ok(
        r#"{"foodName":"Toast","servingSize":"1 slice","calories":90,"confidence":"low"}"#
            .to_string(),
    ));
    let file = photo();
    let mut session = ready_session(backend, &file).await;

    session.analyze().await.unwrap();

    assert!(matches!(
        session.state().error(),
        Some(ScanError::MalformedResponse(_))
    ));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_analyze_while_analyzing_sends_nothing() {
    let backend = StubBackend::new(Ok(CHICKEN_SALAD.to_string()));
    let file = photo();
    let mut session = ready_session(Arc::clone(&backend), &file).await;

    let first = session.begin_analysis().unwrap();
    assert!(matches!(first, Dispatch::Started(_)));

    session.analyze().await.unwrap();
    assert_eq!(session.begin_analysis(), Ok(Dispatch::AlreadyRunning));
    assert_eq!(backend.calls(), 0);
    assert!(session.state().is_analyzing());

    session
        .complete_analysis(Ok(CHICKEN_SALAD.to_string()))
        .await;
    assert!(session.state().record().is_some());
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_retry_after_failure_resubmits_same_image() {
    let backend = StubBackend::new(Err(InferenceError::Transport(
        "operation timed out".to_string(),
    )));
    let file = photo();
    let mut session = ready_session(Arc::clone(&backend), &file).await;

    session.analyze().await.unwrap();
    let image = session.state().image().cloned();
    session.acknowledge();
    assert_eq!(session.state().name(), "image_ready");

    session.analyze().await.unwrap();
    assert_eq!(backend.calls(), 2);
    assert_eq!(session.state().image().cloned(), image);
}

#[tokio::test]
async fn test_non_image_input_is_a_no_op() {
    let backend = StubBackend::new(Ok(CHICKEN_SALAD.to_string()));
    let mut session = session_with(Arc::clone(&backend), Arc::new(MemoryStore::new())).await;

    let mut notes = NamedTempFile::new().unwrap();
    notes.write_all(b"breakfast: oatmeal\n").unwrap();
    notes.flush().unwrap();

    assert!(ingest_file(notes.path(), None).await.unwrap().is_none());
    assert!(ingest_file(notes.path(), Some("text/plain")).await.unwrap().is_none());

    let refusal = session.analyze().await.unwrap_err();
    assert_eq!(refusal, ScanError::NoImage);
    assert_eq!(refusal.user_message(), MSG_NO_IMAGE);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_history_survives_restart_and_clears() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("macrolens.db");
    let file = photo();

    {
        let pool = init_database(&db_path).await.unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteSettingsStore::new(pool.clone()));
        let backend = StubBackend::new(Ok(CHICKEN_SALAD.to_string()));
        let mut session = session_with(backend, store).await;

        for _ in 0..3 {
            let image = ingest_file(file.path(), None).await.unwrap().unwrap();
            session.accept_image(image);
            session.analyze().await.unwrap();
        }
        assert_eq!(session.history().len(), 3);
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteSettingsStore::new(pool.clone()));
    let mut history = HistoryStore::load(Arc::clone(&store), 20).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history.latest().unwrap().record.food_name, "Grilled chicken salad");

    history.clear().await;
    assert!(history.is_empty());
    assert_eq!(store.get(HISTORY_KEY).await.unwrap(), None);
    assert!(HistoryStore::load(store, 20).await.is_empty());
}

#[tokio::test]
async fn test_scan_succeeds_when_storage_is_unavailable() {
    let backend = StubBackend::new(Ok(CHICKEN_SALAD.to_string()));
    let file = photo();
    let mut session = session_with(Arc::clone(&backend), Arc::new(UnavailableStore)).await;
    assert!(session.history().is_empty());

    let image = ingest_file(file.path(), None).await.unwrap().unwrap();
    session.accept_image(image);
    session.analyze().await.unwrap();

    assert_eq!(session.state().name(), "succeeded");
    assert_eq!(session.history().len(), 1);
    assert_eq!(backend.calls(), 1);
}
