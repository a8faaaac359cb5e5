// Tests for report rendering

use std::collections::BTreeMap;
use tunemirror_core::crawl::{ScanSummary, StopReason};
use tunemirror_core::data::{MemberLookup, Neighbor, StoreStats};
use tunemirror_core::recommend::{MemberRecommendations, Recommendation, Recommendations};
use tunemirror_core::report::{
    generate_inspection_report, generate_recommendation_report, generate_scan_report,
    ordered_rhythms,
};

fn rec(tune_id: u32, overlap_score: u32) -> Recommendation {
    Recommendation {
        tune_id,
        name: format!("Tune {}", tune_id),
        overlap_score,
        global_popularity: overlap_score + 1,
    }
}

fn result(bookmarked: usize, neighbors: usize, lists: &[(&str, Vec<Recommendation>)]) -> MemberRecommendations {
    let by_rhythm: BTreeMap<String, Vec<Recommendation>> = lists
        .iter()
        .map(|(rhythm, recs)| (rhythm.to_string(), recs.clone()))
        .collect();
    MemberRecommendations {
        member_id: 42,
        bookmarked,
        recommendations: Recommendations {
            neighbors: (0..neighbors as u32)
                .map(|i| Neighbor {
                    member_id: 100 + i,
                    shared_tunes: 1,
                })
                .collect(),
            by_rhythm,
        },
    }
}

fn summary() -> ScanSummary {
    ScanSummary {
        start_id: 10,
        next_id: 25,
        attempted: 15,
        stored_users: 4,
        new_tunes: 30,
        new_bookmarks: 50,
        empty: 2,
        not_found: 8,
        transient: 1,
        fatal: 0,
        conflicts: 0,
        stop_reason: Some(StopReason::MissThreshold),
        resume_id: 22,
    }
}

// ============================================================================
// Rhythm Ordering Tests
// ============================================================================

#[test]
fn test_preferred_rhythms_come_first() {
    let ordered = ordered_rhythms(["waltz", "jig", "slide", "reel", "hornpipe"]);
    assert_eq!(ordered, vec!["reel", "jig", "hornpipe", "slide", "waltz"]);
}

#[test]
fn test_unlisted_rhythms_are_alphabetical() {
    let ordered = ordered_rhythms(["strathspey", "barndance", "mazurka"]);
    assert_eq!(ordered, vec!["barndance", "mazurka", "strathspey"]);
}

// ============================================================================
// Recommendation Report Tests
// ============================================================================

#[test]
fn test_report_sections_in_display_order() {
    let result = result(
        3,
        2,
        &[
            ("slip jig", vec![rec(7, 1)]),
            ("jig", vec![rec(5, 2)]),
            ("reel", vec![rec(1, 2), rec(2, 1)]),
        ],
    );

    let report = generate_recommendation_report(&result, 5);

    assert!(report.contains("# Recommended tunes for member 42"));
    let reel = report.find("## reel").unwrap();
    let jig = report.find("## jig").unwrap();
    let slip = report.find("## slip jig").unwrap();
    assert!(reel < jig && jig < slip);
    assert!(report.contains("  - Tune 1 (overlap: 2, bookmarks: 3)"));
}

#[test]
fn test_report_truncates_each_rhythm() {
    let reels: Vec<Recommendation> = (1..=8).map(|id| rec(id, 9 - id)).collect();
    let result = result(3, 2, &[("reel", reels)]);

    let report = generate_recommendation_report(&result, 5);

    assert!(report.contains("Tune 5 "));
    assert!(!report.contains("Tune 6 "));
    assert_eq!(report.matches("  - ").count(), 5);
}

#[test]
fn test_report_skips_empty_rhythms() {
    let result = result(3, 2, &[("reel", vec![rec(1, 1)]), ("jig", vec![])]);

    let report = generate_recommendation_report(&result, 5);

    assert!(report.contains("## reel"));
    assert!(!report.contains("## jig"));
}

#[test]
fn test_report_for_empty_tunebook() {
    let report = generate_recommendation_report(&result(0, 0, &[]), 5);
    assert!(report.contains("Member 42 has an empty tunebook"));
}

#[test]
fn test_report_without_neighbors() {
    let report = generate_recommendation_report(&result(4, 0, &[]), 5);
    assert!(report.contains("No members in the local store share any tunes with member 42"));
}

#[test]
fn test_report_with_nothing_new() {
    let report = generate_recommendation_report(&result(4, 3, &[]), 5);
    assert!(report.contains("No recommendations could be computed for member 42"));
}

// ============================================================================
// Scan Report Tests
// ============================================================================

#[test]
fn test_scan_report() {
    let report = generate_scan_report(&summary());

    assert!(report.contains("IDs scanned: 15 (10 to 24)"));
    assert!(report.contains("Members stored: 4"));
    assert!(report.contains("Stopped: consecutive-miss threshold reached"));
    // Resume point follows the store, not the last id attempted.
    assert!(report.contains("Next run resumes at ID 22"));
    assert!(!report.contains("conflicts"));
}

#[test]
fn test_scan_report_limit_and_conflicts() {
    let mut summary = summary();
    summary.stop_reason = Some(StopReason::Limit);
    summary.conflicts = 2;

    let report = generate_scan_report(&summary);

    assert!(report.contains("Stopped: id limit reached"));
    assert!(report.contains("Member id conflicts: 2"));
}

#[test]
fn test_scan_report_end_of_id_space() {
    let mut summary = summary();
    summary.stop_reason = Some(StopReason::IdSpaceExhausted);

    let report = generate_scan_report(&summary);

    assert!(report.contains("Stopped: last member id reached"));
}

// ============================================================================
// Inspection Report Tests
// ============================================================================

#[test]
fn test_inspection_preview_is_elided() {
    let stats = StoreStats {
        users: 3,
        tunes: 12,
        rhythms: 2,
        bookmarks: 20,
    };
    let lookup = MemberLookup::Bookmarks((1..=12).collect());

    let report = generate_inspection_report(&stats, 9, &lookup);

    assert!(report.contains("Members: 3"));
    assert!(report.contains("Bookmarks: 20"));
    assert!(report.contains("Bookmarked tunes: 12"));
    assert!(report.contains("Tune ids (first 10): 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, ..."));
}

#[test]
fn test_inspection_short_list() {
    let lookup = MemberLookup::Bookmarks(vec![3, 8]);
    let report = generate_inspection_report(&StoreStats::default(), 9, &lookup);
    assert!(report.contains("Tune ids: 3, 8\n"));
}

#[test]
fn test_inspection_of_missing_members() {
    let stats = StoreStats::default();

    let report = generate_inspection_report(&stats, 9, &MemberLookup::NoBookmarks);
    assert!(report.contains("Member 9 is stored but has no bookmarks."));

    let report = generate_inspection_report(&stats, 9, &MemberLookup::Unknown);
    assert!(report.contains("Member 9 is not in the store."));
}
