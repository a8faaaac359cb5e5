use rusqlite::{
    Connection, OpenFlags, OptionalExtension, Result, params, params_from_iter,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tunemirror_scanner::TuneEntry;

/// The local association store: members, tunes, rhythms and the
/// member-to-tune bookmark relation. Every write is an idempotent insert.
pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: i64,
    pub tunes: i64,
    pub rhythms: i64,
    pub bookmarks: i64,
}

/// What the store knows about one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberLookup {
    Bookmarks(Vec<u32>),
    NoBookmarks,
    Unknown,
}

/// Rows actually inserted by one tunebook commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub new_user: bool,
    pub new_rhythms: usize,
    pub new_tunes: usize,
    pub new_bookmarks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Neighbor {
    pub member_id: u32,
    pub shared_tunes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub tune_id: u32,
    pub name: String,
    pub rhythm: String,
    pub overlap_score: u32,
    pub global_popularity: u32,
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

impl Database {
    pub fn drop(path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL lets a recommend/inspect process read while a crawl writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an existing store without creating or migrating anything.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Database { conn })
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS rhythms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tunes (
    tune_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    tune_url TEXT NOT NULL,
    rhythm_id INTEGER NOT NULL,
    FOREIGN KEY(rhythm_id) REFERENCES rhythms(id)
);

-- Member bookmarks
CREATE TABLE IF NOT EXISTS tunebooks (
    user_id INTEGER NOT NULL,
    tune_id INTEGER NOT NULL,
    PRIMARY KEY (user_id, tune_id),
    FOREIGN KEY(user_id) REFERENCES users(user_id),
    FOREIGN KEY(tune_id) REFERENCES tunes(tune_id)
);

CREATE INDEX IF NOT EXISTS idx_tunebooks_tune ON tunebooks(tune_id);
            ",
        )?;
        Ok(())
    }

    // Scanner read path

    pub fn max_user_id(&self) -> Result<Option<u32>> {
        self.conn
            .query_row("SELECT MAX(user_id) FROM users", [], |row| row.get(0))
    }

    pub fn user_exists(&self, member_id: u32) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM users WHERE user_id = ?1",
                params![member_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn known_tune_ids(&self) -> Result<HashSet<u32>> {
        let mut stmt = self.conn.prepare("SELECT tune_id FROM tunes")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<u32>>>()?;
        Ok(ids)
    }

    // Scanner write path

    /// Persist one member's complete tunebook in a single transaction.
    ///
    /// Tunes listed in `known_tunes` skip the rhythm/tune upserts; their
    /// bookmarks are still inserted. If any statement fails the transaction
    /// is dropped and rolled back, leaving no partial member state.
    pub fn store_tunebook(
        &mut self,
        member_id: u32,
        tunes: &[TuneEntry],
        known_tunes: &HashSet<u32>,
    ) -> Result<CommitSummary> {
        let tx = self.conn.transaction()?;
        let mut summary = CommitSummary {
            new_user: tx.execute(
                "INSERT OR IGNORE INTO users (user_id) VALUES (?1)",
                params![member_id],
            )? > 0,
            ..CommitSummary::default()
        };

        for tune in tunes {
            if !known_tunes.contains(&tune.id) {
                let (rhythm_id, created) = get_or_create_rhythm(&tx, &tune.rhythm)?;
                if created {
                    summary.new_rhythms += 1;
                }
                summary.new_tunes += tx.execute(
                    "INSERT OR IGNORE INTO tunes (tune_id, name, tune_url, rhythm_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![tune.id, &tune.name, &tune.url, rhythm_id],
                )?;
            }

            summary.new_bookmarks += tx.execute(
                "INSERT OR IGNORE INTO tunebooks (user_id, tune_id) VALUES (?1, ?2)",
                params![member_id, tune.id],
            )?;
        }

        tx.commit()?;
        Ok(summary)
    }

    // Inspection

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<i64> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
        };

        Ok(StoreStats {
            users: count("users")?,
            tunes: count("tunes")?,
            rhythms: count("rhythms")?,
            bookmarks: count("tunebooks")?,
        })
    }

    pub fn tunes_for_user(&self, member_id: u32) -> Result<Vec<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tune_id FROM tunebooks WHERE user_id = ?1 ORDER BY tune_id")?;
        let ids = stmt
            .query_map(params![member_id], |row| row.get(0))?
            .collect::<Result<Vec<u32>>>()?;
        Ok(ids)
    }

    pub fn inspect_member(&self, member_id: u32) -> Result<MemberLookup> {
        let tunes = self.tunes_for_user(member_id)?;
        if !tunes.is_empty() {
            return Ok(MemberLookup::Bookmarks(tunes));
        }
        if self.user_exists(member_id)? {
            Ok(MemberLookup::NoBookmarks)
        } else {
            Ok(MemberLookup::Unknown)
        }
    }

    // Recommender read path

    /// Members other than `target` ranked by how many of `tunes` they share
    /// with it. Members with no shared tune never appear. Ties at the cutoff
    /// go to the lower member id.
    pub fn find_neighbors(&self, target: u32, tunes: &[u32], limit: usize) -> Result<Vec<Neighbor>> {
        if tunes.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT user_id, COUNT(tune_id) AS shared
             FROM tunebooks
             WHERE tune_id IN ({}) AND user_id != ?
             GROUP BY user_id
             ORDER BY shared DESC, user_id ASC
             LIMIT ?",
            placeholders(tunes.len())
        );

        let mut values: Vec<i64> = tunes.iter().map(|&id| i64::from(id)).collect();
        values.push(i64::from(target));
        values.push(i64::try_from(limit).unwrap_or(i64::MAX));

        let mut stmt = self.conn.prepare(&sql)?;
        let neighbors = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(Neighbor {
                    member_id: row.get(0)?,
                    shared_tunes: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(neighbors)
    }

    /// Every tune bookmarked by at least one of `neighbors` and not in
    /// `exclude`, with its neighbour count and store-wide bookmark count.
    /// Rows come back in tune id order.
    pub fn candidate_tunes(&self, neighbors: &[u32], exclude: &[u32]) -> Result<Vec<CandidateRow>> {
        if neighbors.is_empty() {
            return Ok(Vec::new());
        }

        let exclusion = if exclude.is_empty() {
            String::new()
        } else {
            format!("AND tb.tune_id NOT IN ({})", placeholders(exclude.len()))
        };
        let sql = format!(
            "SELECT
                t.tune_id,
                t.name,
                r.name AS rhythm_name,
                COUNT(tb.user_id) AS overlap_score,
                (SELECT COUNT(*) FROM tunebooks WHERE tune_id = t.tune_id) AS global_popularity
             FROM tunebooks tb
             JOIN tunes t ON tb.tune_id = t.tune_id
             JOIN rhythms r ON t.rhythm_id = r.id
             WHERE tb.user_id IN ({})
               {}
             GROUP BY t.tune_id, t.name, r.name
             ORDER BY t.tune_id ASC",
            placeholders(neighbors.len()),
            exclusion
        );

        let values: Vec<i64> = neighbors
            .iter()
            .chain(exclude.iter())
            .map(|&id| i64::from(id))
            .collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(CandidateRow {
                    tune_id: row.get(0)?,
                    name: row.get(1)?,
                    rhythm: row.get(2)?,
                    overlap_score: row.get(3)?,
                    global_popularity: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

/// Returns the rhythm's key and whether it was created by this call.
fn get_or_create_rhythm(conn: &Connection, name: &str) -> Result<(i64, bool)> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM rhythms WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => Ok((id, false)),
        None => {
            conn.execute("INSERT INTO rhythms (name) VALUES (?1)", params![name])?;
            Ok((conn.last_insert_rowid(), true))
        }
    }
}
