use crate::crawl::{ScanSummary, StopReason};
use crate::data::{MemberLookup, StoreStats};
use crate::recommend::MemberRecommendations;

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

/// Rhythms shown first, in this order. Everything else follows alphabetically.
pub const DISPLAY_ORDER: [&str; 4] = ["reel", "jig", "polka", "hornpipe"];

/// Ids shown by the inspection report before it elides the rest.
const INSPECT_PREVIEW: usize = 10;

/// Rhythm names in presentation order.
pub fn ordered_rhythms<'a, I>(rhythms: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut rest: Vec<&str> = Vec::new();
    let mut present: Vec<&str> = Vec::new();
    for rhythm in rhythms {
        if DISPLAY_ORDER.contains(&rhythm) {
            present.push(rhythm);
        } else {
            rest.push(rhythm);
        }
    }

    let mut ordered: Vec<&str> = DISPLAY_ORDER
        .iter()
        .copied()
        .filter(|r| present.contains(r))
        .collect();
    rest.sort_unstable();
    rest.dedup();
    ordered.extend(rest);
    ordered
}

/// Render recommendations, each rhythm truncated to `max_display` tunes.
pub fn generate_recommendation_report(result: &MemberRecommendations, max_display: usize) -> String {
    let recs = &result.recommendations;
    let mut report = String::new();

    if result.bookmarked == 0 {
        report.push_str(&format!(
            "Member {} has an empty tunebook; there is nothing to compare against.\n",
            result.member_id
        ));
        return report;
    }
    if !recs.has_neighbors() {
        report.push_str(&format!(
            "No members in the local store share any tunes with member {}.\n",
            result.member_id
        ));
        return report;
    }
    if recs.is_empty() {
        report.push_str(&format!(
            "No recommendations could be computed for member {}: similar members have nothing new to offer.\n",
            result.member_id
        ));
        return report;
    }

    report.push_str(DIVIDER);
    report.push_str(&format!("# Recommended tunes for member {}\n", result.member_id));
    report.push_str(&format!(
        "  Based on {} bookmarked tunes and {} similar members\n",
        result.bookmarked,
        recs.neighbors.len()
    ));
    report.push_str(DIVIDER);

    for rhythm in ordered_rhythms(recs.by_rhythm.keys().map(String::as_str)) {
        let tunes = recs.rhythm(rhythm);
        if tunes.is_empty() {
            continue;
        }
        report.push_str(&format!("\n## {}\n", rhythm));
        for tune in tunes.iter().take(max_display) {
            report.push_str(&format!(
                "  - {} (overlap: {}, bookmarks: {})\n",
                tune.name, tune.overlap_score, tune.global_popularity
            ));
        }
    }

    report
}

pub fn generate_scan_report(summary: &ScanSummary) -> String {
    let mut report = String::new();
    report.push_str(DIVIDER);
    report.push_str("# Crawl summary:\n");
    report.push_str(&format!(
        "  IDs scanned: {} ({} to {})\n",
        summary.attempted,
        summary.start_id,
        summary.next_id.saturating_sub(1).max(summary.start_id)
    ));
    report.push_str(&format!("  Members stored: {}\n", summary.stored_users));
    report.push_str(&format!("  New tunes: {}\n", summary.new_tunes));
    report.push_str(&format!("  New bookmarks: {}\n", summary.new_bookmarks));
    report.push_str(&format!("  Empty tunebooks: {}\n", summary.empty));
    report.push_str(&format!("  Not found: {}\n", summary.not_found));
    report.push_str(&format!("  Skipped (transient): {}\n", summary.transient));
    report.push_str(&format!("  Abandoned (unexpected status): {}\n", summary.fatal));
    if summary.conflicts > 0 {
        report.push_str(&format!("  Member id conflicts: {}\n", summary.conflicts));
    }

    let stop = match summary.stop_reason {
        Some(StopReason::MissThreshold) => "consecutive-miss threshold reached",
        Some(StopReason::Limit) => "id limit reached",
        Some(StopReason::IdSpaceExhausted) => "last member id reached",
        None => "interrupted",
    };
    report.push_str(&format!("  Stopped: {}\n", stop));
    report.push_str(&format!("  Next run resumes at ID {}\n", summary.resume_id));
    report.push_str(DIVIDER);
    report
}

pub fn generate_inspection_report(stats: &StoreStats, member_id: u32, lookup: &MemberLookup) -> String {
    let mut report = String::new();
    report.push_str("# Store\n");
    report.push_str(&format!("  Members: {}\n", stats.users));
    report.push_str(&format!("  Tunes: {}\n", stats.tunes));
    report.push_str(&format!("  Rhythms: {}\n", stats.rhythms));
    report.push_str(&format!("  Bookmarks: {}\n", stats.bookmarks));
    report.push_str(&"-".repeat(35));
    report.push('\n');

    match lookup {
        MemberLookup::Bookmarks(tunes) => {
            report.push_str(&format!("# Member {}\n", member_id));
            report.push_str(&format!("  Bookmarked tunes: {}\n", tunes.len()));
            let preview: Vec<String> = tunes
                .iter()
                .take(INSPECT_PREVIEW)
                .map(u32::to_string)
                .collect();
            if tunes.len() > INSPECT_PREVIEW {
                report.push_str(&format!(
                    "  Tune ids (first {}): {}, ...\n",
                    INSPECT_PREVIEW,
                    preview.join(", ")
                ));
            } else {
                report.push_str(&format!("  Tune ids: {}\n", preview.join(", ")));
            }
        }
        MemberLookup::NoBookmarks => {
            report.push_str(&format!(
                "Member {} is stored but has no bookmarks.\n",
                member_id
            ));
        }
        MemberLookup::Unknown => {
            report.push_str(&format!("Member {} is not in the store.\n", member_id));
        }
    }

    report
}
