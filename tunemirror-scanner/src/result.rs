use serde::{Deserialize, Serialize};

/// One page of `/members/{id}/tunebook?format=json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunebookPage {
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub tunes: Vec<TuneEntry>,
}

fn default_pages() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneEntry {
    pub id: u32,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub rhythm: String,
}

/// A member's complete tunebook, reassembled from every page.
#[derive(Debug, Clone)]
pub struct Tunebook {
    /// The id the request was made for.
    pub requested_id: u32,
    /// The id the remote reports in `member.id`; this is the one to persist.
    pub member_id: u32,
    pub tunes: Vec<TuneEntry>,
}

impl Tunebook {
    pub fn is_empty(&self) -> bool {
        self.tunes.is_empty()
    }

    pub fn tune_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.tunes.iter().map(|t| t.id)
    }
}
