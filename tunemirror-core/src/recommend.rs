use crate::data::{Database, Neighbor};
use crate::error::RecommendError;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};
use tunemirror_scanner::TunebookSource;

pub const DEFAULT_NEIGHBOR_COUNT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub tune_id: u32,
    pub name: String,
    /// How many of the selected neighbours bookmarked this tune.
    pub overlap_score: u32,
    /// Bookmarks across the whole store.
    pub global_popularity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Recommendations {
    pub neighbors: Vec<Neighbor>,
    /// Ranked candidates per rhythm name.
    pub by_rhythm: BTreeMap<String, Vec<Recommendation>>,
}

impl Recommendations {
    pub fn is_empty(&self) -> bool {
        self.by_rhythm.values().all(Vec::is_empty)
    }

    pub fn has_neighbors(&self) -> bool {
        !self.neighbors.is_empty()
    }

    pub fn total(&self) -> usize {
        self.by_rhythm.values().map(Vec::len).sum()
    }

    pub fn rhythm(&self, name: &str) -> &[Recommendation] {
        self.by_rhythm.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// User-based collaborative filtering over the local store. Read-only.
pub struct Recommender<'a> {
    db: &'a Database,
    neighbor_count: usize,
}

impl<'a> Recommender<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            neighbor_count: DEFAULT_NEIGHBOR_COUNT,
        }
    }

    pub fn with_neighbor_count(mut self, k: usize) -> Self {
        self.neighbor_count = k;
        self
    }

    pub fn recommend(
        &self,
        target_member: u32,
        target_tunes: &HashSet<u32>,
    ) -> rusqlite::Result<Recommendations> {
        if target_tunes.is_empty() {
            return Ok(Recommendations::default());
        }

        let mut tunes: Vec<u32> = target_tunes.iter().copied().collect();
        tunes.sort_unstable();

        let neighbors = self
            .db
            .find_neighbors(target_member, &tunes, self.neighbor_count)?;
        if neighbors.is_empty() {
            debug!("No store member shares a tune with {}", target_member);
            return Ok(Recommendations::default());
        }
        info!("Found {} similar members in the store", neighbors.len());

        let neighbor_ids: Vec<u32> = neighbors.iter().map(|n| n.member_id).collect();
        let candidates = self.db.candidate_tunes(&neighbor_ids, &tunes)?;

        let mut by_rhythm: BTreeMap<String, Vec<Recommendation>> = BTreeMap::new();
        for row in candidates {
            by_rhythm.entry(row.rhythm).or_default().push(Recommendation {
                tune_id: row.tune_id,
                name: row.name,
                overlap_score: row.overlap_score,
                global_popularity: row.global_popularity,
            });
        }

        // Stable: equal keys keep the tune id order the rows arrived in.
        for list in by_rhythm.values_mut() {
            list.sort_by(|a, b| {
                b.overlap_score
                    .cmp(&a.overlap_score)
                    .then(b.global_popularity.cmp(&a.global_popularity))
            });
        }

        Ok(Recommendations {
            neighbors,
            by_rhythm,
        })
    }
}

/// Recommendations for a member together with the size of the live
/// tunebook they were computed from.
#[derive(Debug, Clone, Serialize)]
pub struct MemberRecommendations {
    pub member_id: u32,
    pub bookmarked: usize,
    pub recommendations: Recommendations,
}

/// Fetch `member_id`'s current tunebook from `source` and recommend against
/// the store. Fetch failures are returned as-is; there is no fallback to
/// the stored copy.
pub async fn recommend_for_member<S: TunebookSource>(
    source: &S,
    db: &Database,
    member_id: u32,
    neighbor_count: usize,
) -> Result<MemberRecommendations, RecommendError> {
    info!("Fetching the latest tunebook for member {}", member_id);
    let tunebook = source.fetch_tunebook(member_id).await?;
    let target_tunes: HashSet<u32> = tunebook.tune_ids().collect();
    info!("-> {} bookmarked tunes", target_tunes.len());

    let recommendations = Recommender::new(db)
        .with_neighbor_count(neighbor_count)
        .recommend(tunebook.member_id, &target_tunes)?;

    Ok(MemberRecommendations {
        member_id: tunebook.member_id,
        bookmarked: target_tunes.len(),
        recommendations,
    })
}
