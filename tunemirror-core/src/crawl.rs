use crate::data::Database;
use crate::error::ScanError;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tunemirror_scanner::{FailureKind, Tunebook, TunebookSource};

pub const DEFAULT_MISS_THRESHOLD: u32 = 20;
/// Rough upper bound on member ids the remote has handed out so far.
pub const DEFAULT_HIGH_WATER_MARK: u32 = 187_000;

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Explicit first id; `None` resumes from the store.
    pub start_id: Option<u32>,
    pub high_water_mark: u32,
    pub miss_threshold: u32,
    /// Stop after this many identifiers have been attempted.
    pub limit: Option<u32>,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            start_id: None,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            miss_threshold: DEFAULT_MISS_THRESHOLD,
            limit: None,
            show_progress_bars: false,
        }
    }
}

/// What happened to one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Stored {
        member_id: u32,
        tunes: usize,
        new_tunes: usize,
        new_bookmarks: usize,
    },
    Empty,
    NotFound,
    Transient,
    Fatal,
    /// The remote answered with a different member id that is already in
    /// the store. Nothing is written.
    Conflict { member_id: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSignal {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MissThreshold,
    Limit,
    /// `u32::MAX` was the last identifier attempted.
    IdSpaceExhausted,
}

fn resume_point(db: &Database) -> rusqlite::Result<u32> {
    Ok(db.max_user_id()?.map_or(1, |max| max.saturating_add(1)))
}

/// Position and termination state of a crawl over the member id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    pub current_id: u32,
    pub miss_count: u32,
    pub high_water_mark: u32,
    pub threshold: u32,
}

impl ScanState {
    pub fn new(start_id: u32, high_water_mark: u32, threshold: u32) -> Self {
        Self {
            current_id: start_id.max(1),
            miss_count: 0,
            high_water_mark,
            threshold: threshold.max(1),
        }
    }

    /// Start right after the highest member id already stored, or at 1.
    pub fn resume(db: &Database, high_water_mark: u32, threshold: u32) -> rusqlite::Result<Self> {
        Ok(Self::new(resume_point(db)?, high_water_mark, threshold))
    }

    pub fn is_beyond_high_water_mark(&self) -> bool {
        self.current_id > self.high_water_mark
    }

    /// Fold the outcome for `current_id` into the state and advance.
    ///
    /// Only a not-found beyond the high-water mark counts as a miss.
    /// A transient fault leaves the counter alone. Any other answer from the
    /// remote, including an unexpected status, resets it.
    pub fn record(&mut self, outcome: &ScanOutcome) -> ScanSignal {
        match outcome {
            ScanOutcome::NotFound if self.is_beyond_high_water_mark() => self.miss_count += 1,
            ScanOutcome::Transient => {}
            _ => self.miss_count = 0,
        }

        let Some(next_id) = self.current_id.checked_add(1) else {
            return ScanSignal::Stop;
        };
        self.current_id = next_id;

        if self.miss_count >= self.threshold {
            ScanSignal::Stop
        } else {
            ScanSignal::Continue
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub start_id: u32,
    /// First identifier not attempted by this run.
    pub next_id: u32,
    pub attempted: u32,
    pub stored_users: u32,
    pub new_tunes: usize,
    pub new_bookmarks: usize,
    pub empty: u32,
    pub not_found: u32,
    pub transient: u32,
    pub fatal: u32,
    pub conflicts: u32,
    pub stop_reason: Option<StopReason>,
    /// Where a run without `start_id` picks up: after the highest stored member.
    pub resume_id: u32,
}

impl ScanSummary {
    fn starting_at(start_id: u32) -> Self {
        Self {
            start_id,
            next_id: start_id,
            attempted: 0,
            stored_users: 0,
            new_tunes: 0,
            new_bookmarks: 0,
            empty: 0,
            not_found: 0,
            transient: 0,
            fatal: 0,
            conflicts: 0,
            stop_reason: None,
            resume_id: start_id,
        }
    }

    fn tally(&mut self, outcome: &ScanOutcome) {
        self.attempted += 1;
        match outcome {
            ScanOutcome::Stored {
                new_tunes,
                new_bookmarks,
                ..
            } => {
                self.stored_users += 1;
                self.new_tunes += new_tunes;
                self.new_bookmarks += new_bookmarks;
            }
            ScanOutcome::Empty => self.empty += 1,
            ScanOutcome::NotFound => self.not_found += 1,
            ScanOutcome::Transient => self.transient += 1,
            ScanOutcome::Fatal => self.fatal += 1,
            ScanOutcome::Conflict { .. } => self.conflicts += 1,
        }
    }
}

/// Callback invoked after each identifier with the id and its outcome
pub type ScanProgressCallback = Arc<dyn Fn(u32, &ScanOutcome) + Send + Sync>;

/// Sequential crawler over the member id space: one identifier, one full
/// tunebook fetch, one commit, then the next.
pub struct IdSpaceScanner<'a, S> {
    db: &'a mut Database,
    source: &'a S,
    state: ScanState,
    known_tunes: HashSet<u32>,
    limit: Option<u32>,
    progress_callback: Option<ScanProgressCallback>,
    summary: ScanSummary,
}

impl<'a, S: TunebookSource> IdSpaceScanner<'a, S> {
    pub fn new(db: &'a mut Database, source: &'a S, state: ScanState) -> rusqlite::Result<Self> {
        let known_tunes = db.known_tune_ids()?;
        debug!("Loaded {} known tune ids", known_tunes.len());
        Ok(Self {
            db,
            source,
            state,
            known_tunes,
            limit: None,
            progress_callback: None,
            summary: ScanSummary::starting_at(state.current_id),
        })
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_progress_callback(mut self, callback: ScanProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    /// Attempt the current identifier and advance past it.
    pub async fn step(&mut self) -> Result<(ScanOutcome, ScanSignal), ScanError> {
        let id = self.state.current_id;

        let outcome = match self.source.fetch_tunebook(id).await {
            Ok(tunebook) if tunebook.is_empty() => {
                debug!("ID {}: empty tunebook", id);
                ScanOutcome::Empty
            }
            Ok(tunebook) => self.persist(&tunebook)?,
            Err(e) => match e.kind() {
                FailureKind::NotFound => ScanOutcome::NotFound,
                FailureKind::Transient => {
                    warn!("ID {}: {}. Skipping.", id, e);
                    ScanOutcome::Transient
                }
                FailureKind::Fatal => {
                    warn!("ID {}: {}. Abandoning this id.", id, e);
                    ScanOutcome::Fatal
                }
            },
        };

        let beyond = self.state.is_beyond_high_water_mark();
        let signal = self.state.record(&outcome);
        self.summary.tally(&outcome);
        self.summary.next_id = self.state.current_id;

        if outcome == ScanOutcome::NotFound {
            if beyond {
                info!(
                    "ID {} not found. (Consecutive misses: {}/{})",
                    id, self.state.miss_count, self.state.threshold
                );
            } else {
                debug!("ID {} not found (below high-water mark)", id);
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback(id, &outcome);
        }

        Ok((outcome, signal))
    }

    fn persist(&mut self, tunebook: &Tunebook) -> Result<ScanOutcome, ScanError> {
        let member_id = tunebook.member_id;

        if member_id != tunebook.requested_id {
            if self.db.user_exists(member_id)? {
                warn!(
                    "ID {}: remote reports member id {}, which is already stored. Not merging.",
                    tunebook.requested_id, member_id
                );
                return Ok(ScanOutcome::Conflict { member_id });
            }
            warn!(
                "ID {}: remote reports member id {}; storing under that id",
                tunebook.requested_id, member_id
            );
        }

        let commit = self
            .db
            .store_tunebook(member_id, &tunebook.tunes, &self.known_tunes)?;
        self.known_tunes.extend(tunebook.tune_ids());

        info!(
            "User ID {}: {} tunes committed ({} new tunes, {} new bookmarks)",
            member_id,
            tunebook.tunes.len(),
            commit.new_tunes,
            commit.new_bookmarks
        );

        Ok(ScanOutcome::Stored {
            member_id,
            tunes: tunebook.tunes.len(),
            new_tunes: commit.new_tunes,
            new_bookmarks: commit.new_bookmarks,
        })
    }

    /// Scan until the miss threshold (or the optional limit) is reached.
    pub async fn run(mut self) -> Result<ScanSummary, ScanError> {
        loop {
            if let Some(limit) = self.limit
                && self.summary.attempted >= limit
            {
                self.summary.stop_reason = Some(StopReason::Limit);
                break;
            }

            let (_, signal) = self.step().await?;
            if signal == ScanSignal::Stop {
                if self.state.miss_count >= self.state.threshold {
                    info!(
                        "{} consecutive misses beyond ID {}. Stopping.",
                        self.state.threshold, self.state.high_water_mark
                    );
                    self.summary.stop_reason = Some(StopReason::MissThreshold);
                } else {
                    info!("Reached the last member id. Stopping.");
                    self.summary.stop_reason = Some(StopReason::IdSpaceExhausted);
                }
                break;
            }
        }

        self.summary.resume_id = resume_point(&*self.db)?;
        Ok(self.summary)
    }
}

/// Execute a crawl with the given options against `db`.
pub async fn execute_crawl<S: TunebookSource>(
    options: CrawlOptions,
    db: &mut Database,
    source: &S,
    progress_callback: Option<ScanProgressCallback>,
) -> Result<ScanSummary, ScanError> {
    let CrawlOptions {
        start_id,
        high_water_mark,
        miss_threshold,
        limit,
        show_progress_bars,
    } = options;

    let state = match start_id {
        Some(id) => ScanState::new(id, high_water_mark, miss_threshold),
        None => ScanState::resume(db, high_water_mark, miss_threshold)?,
    };
    info!("Starting data collection from User ID {}", state.current_id);

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Scanning ID: {}", state.current_id));
        Some(Arc::new(pb))
    } else {
        None
    };

    let callback: Option<ScanProgressCallback> = match (progress_bar.clone(), progress_callback) {
        (Some(pb), user_cb) => {
            let stored = Arc::new(std::sync::atomic::AtomicU32::new(0));
            Some(Arc::new(move |id: u32, outcome: &ScanOutcome| {
                if matches!(outcome, ScanOutcome::Stored { .. }) {
                    stored.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
                pb.set_message(format!(
                    "Scanning ID: {} ({} members stored)",
                    id + 1,
                    stored.load(std::sync::atomic::Ordering::Relaxed)
                ));
                if let Some(ref cb) = user_cb {
                    cb(id, outcome);
                }
            }))
        }
        (None, user_cb) => user_cb,
    };

    let mut scanner = IdSpaceScanner::new(db, source, state)?.with_limit(limit);
    if let Some(cb) = callback {
        scanner = scanner.with_progress_callback(cb);
    }

    let result = scanner.run().await;

    if let Some(ref pb) = progress_bar {
        match &result {
            Ok(summary) => pb.finish_with_message(format!(
                "Data collection finished. {} ids scanned, {} members stored",
                summary.attempted, summary.stored_users
            )),
            Err(_) => pb.abandon_with_message("Data collection aborted"),
        }
    }

    result
}
