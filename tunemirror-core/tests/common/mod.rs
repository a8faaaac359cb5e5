// Shared fixtures for the core integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;
use tunemirror_core::data::Database;
use tunemirror_scanner::{FetchError, TuneEntry, Tunebook, TunebookSource};

pub fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

pub fn tune(id: u32, rhythm: &str) -> TuneEntry {
    TuneEntry {
        id,
        name: format!("Tune {}", id),
        url: format!("https://thesession.org/tunes/{}", id),
        rhythm: rhythm.to_string(),
    }
}

pub fn reels(ids: &[u32]) -> Vec<TuneEntry> {
    ids.iter().map(|&id| tune(id, "reel")).collect()
}

/// Store a member's tunebook the way the scanner would.
pub fn seed(db: &mut Database, member_id: u32, tunes: &[TuneEntry]) {
    let known = db.known_tune_ids().unwrap();
    db.store_tunebook(member_id, tunes, &known).unwrap();
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Tunes(Vec<TuneEntry>),
    /// Tunebook reported under a different member id.
    Reassigned(u32, Vec<TuneEntry>),
    Status(u16),
    Transient,
}

/// A `TunebookSource` answering from a script. Unscripted ids are 404s.
#[derive(Default)]
pub struct FakeSource {
    script: HashMap<u32, Scripted>,
    calls: Mutex<Vec<u32>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: u32, response: Scripted) -> Self {
        self.script.insert(id, response);
        self
    }

    pub fn with_tunes(self, id: u32, tunes: Vec<TuneEntry>) -> Self {
        self.with(id, Scripted::Tunes(tunes))
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

/// A genuine transport error: connecting to a port nothing listens on.
pub async fn transient_error() -> FetchError {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = reqwest::Client::new()
        .get(format!("http://{}/", addr))
        .send()
        .await
        .unwrap_err();
    FetchError::Transient(err)
}

impl TunebookSource for FakeSource {
    async fn fetch_tunebook(&self, member_id: u32) -> Result<Tunebook, FetchError> {
        self.calls.lock().unwrap().push(member_id);

        match self.script.get(&member_id).cloned() {
            Some(Scripted::Tunes(tunes)) => Ok(Tunebook {
                requested_id: member_id,
                member_id,
                tunes,
            }),
            Some(Scripted::Reassigned(actual, tunes)) => Ok(Tunebook {
                requested_id: member_id,
                member_id: actual,
                tunes,
            }),
            Some(Scripted::Status(status)) if status == 404 || status == 410 => {
                Err(FetchError::NotFound { status })
            }
            Some(Scripted::Status(status)) => Err(FetchError::Status { status, page: 1 }),
            Some(Scripted::Transient) => Err(transient_error().await),
            None => Err(FetchError::NotFound { status: 404 }),
        }
    }
}
