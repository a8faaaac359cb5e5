use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::borrow::Cow;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use tunemirror_core::crawl::{CrawlOptions, execute_crawl};
use tunemirror_core::data::Database;
use tunemirror_core::error::RecommendError;
use tunemirror_core::recommend::{MemberRecommendations, recommend_for_member};
use tunemirror_core::report::{
    generate_inspection_report, generate_recommendation_report, generate_scan_report,
};
use tunemirror_scanner::client::DEFAULT_REQUEST_DELAY;
use tunemirror_scanner::{CatalogClient, RetryPolicy};

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/tunemirror/";
pub const DB_FILE_NAME: &str = "tunemirror.db";

/// Attempts for the one-shot target fetch of `recommend`.
const RECOMMEND_FETCH_ATTEMPTS: u32 = 5;
const RECOMMEND_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

// Path helpers

pub fn expand_path(raw: &str) -> PathBuf {
    let expanded: Cow<'_, str> = shellexpand::tilde(raw);
    PathBuf::from(expanded.as_ref())
}

pub fn default_db_path() -> PathBuf {
    expand_path(DEFAULT_CONFIG_DIR).join(DB_FILE_NAME)
}

/// The `--db` argument with `~` expanded, or the default location.
pub fn resolve_db_path(db_arg: Option<&String>) -> PathBuf {
    db_arg.map_or_else(default_db_path, |raw| expand_path(raw))
}

/// Create `config_dir` and an empty store inside it. With `overwrite`, an
/// existing store is deleted first; otherwise it is opened as-is.
pub fn init_store(config_dir: &Path, overwrite: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(config_dir).with_context(|| {
        format!(
            "Failed to create config directory {}",
            config_dir.display()
        )
    })?;

    let db_path = config_dir.join(DB_FILE_NAME);
    if overwrite && Database::exists(&db_path) {
        Database::drop(&db_path)
            .with_context(|| format!("Failed to delete {}", db_path.display()))?;
    }

    Database::new(&db_path)
        .with_context(|| format!("Failed to create database at {}", db_path.display()))?;
    Ok(db_path)
}

// Output helpers

/// The line printed when the target tunebook could not be fetched.
pub fn fetch_failure_message(member_id: u32, err: &RecommendError) -> String {
    if err.is_unknown_member() {
        format!(
            "Member {} does not exist or their tunebook is private.",
            member_id
        )
    } else {
        format!("Could not get recommendations for member {}: {}", member_id, err)
    }
}

pub fn render_recommendations(
    result: &MemberRecommendations,
    max_display: usize,
    json: bool,
) -> Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(result)
            .context("Failed to serialize recommendations")?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(generate_recommendation_report(result, max_display))
    }
}

/// Install the fmt subscriber on stderr so reports and JSON on stdout stay
/// clean. `--verbose` lowers the level to debug.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "✗".red().bold(), msg);
    std::process::exit(1);
}

fn require_store(db_path: &Path) {
    if !Database::exists(db_path) {
        fail(format!(
            "No database at {}. Run `tunemirror init` first.",
            db_path.display()
        ));
    }
}

fn build_client(args: &ArgMatches, retry: RetryPolicy) -> CatalogClient {
    let base_url = args
        .get_one::<String>("base-url")
        .map_or(tunemirror_scanner::client::DEFAULT_BASE_URL, String::as_str);
    let timeout = args
        .get_one::<u64>("timeout")
        .copied()
        .unwrap_or(tunemirror_scanner::client::DEFAULT_TIMEOUT_SECS);
    let delay = args
        .get_one::<u64>("delay-ms")
        .map_or(DEFAULT_REQUEST_DELAY, |&ms| Duration::from_millis(ms));

    match CatalogClient::with_timeout(base_url, timeout) {
        Ok(client) => client.with_request_delay(delay).with_retry_policy(retry),
        Err(e) => fail(e),
    }
}

// Handlers

pub fn handle_init(args: &ArgMatches) {
    print_divider();
    println!("{}", "  TUNEMIRROR INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let raw_dir = args
        .get_one::<String>("PATH")
        .map_or(DEFAULT_CONFIG_DIR, String::as_str);
    let force = args.get_flag("force");
    let config_dir = expand_path(raw_dir);
    let db_path = config_dir.join(DB_FILE_NAME);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    let mut overwrite = force;
    if Database::exists(&db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            db_path.display().to_string().bright_white()
        );
        println!();

        let response = match print_prompt("Delete it and start over? [y/N]:") {
            Ok(response) => response,
            Err(e) => fail(format!("Failed to read response: {}", e)),
        };
        println!();

        overwrite = response == "y" || response == "yes";
        if !overwrite {
            println!("{} Keeping the existing database", "→".blue());
        }
    }

    match init_store(&config_dir, overwrite) {
        Ok(db_path) => {
            println!("{} tunemirror initialization complete!", "✓".green().bold());
            println!(
                "{} Database: {}",
                "✓".green().bold(),
                db_path.display().to_string().bright_white()
            );
        }
        Err(e) => fail(format!("{:#}", e)),
    }
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) {
    let db_path = resolve_db_path(args.get_one::<String>("db"));
    require_store(&db_path);

    // Misses decide termination; the scanner never retries an id itself.
    let client = build_client(args, RetryPolicy::none());

    let defaults = CrawlOptions::default();
    let options = CrawlOptions {
        start_id: args.get_one::<u32>("start-id").copied(),
        high_water_mark: args
            .get_one::<u32>("high-water-mark")
            .copied()
            .unwrap_or(defaults.high_water_mark),
        miss_threshold: args
            .get_one::<u32>("miss-threshold")
            .copied()
            .unwrap_or(defaults.miss_threshold),
        limit: args.get_one::<u32>("limit").copied(),
        show_progress_bars: !quiet,
    };

    let mut db = match Database::new(&db_path) {
        Ok(db) => db,
        Err(e) => fail(format!("Failed to open {}: {}", db_path.display(), e)),
    };

    println!(
        "\nCrawling {} into {}",
        args.get_one::<String>("base-url")
            .map_or("", String::as_str)
            .bright_white(),
        db_path.display()
    );
    println!(
        "Miss threshold: {} beyond ID {}",
        options.miss_threshold, options.high_water_mark
    );
    println!(
        "Request delay: {}ms, timeout: {}s\n",
        client.request_delay().as_millis(),
        client.timeout_secs()
    );

    match execute_crawl(options, &mut db, &client, None).await {
        Ok(summary) => {
            println!("\n{} Crawl complete!\n", "✓".green().bold());
            print!("{}", generate_scan_report(&summary));
        }
        Err(e) => fail(format!("Crawl failed: {}", e)),
    }
}

pub async fn handle_recommend(args: &ArgMatches) {
    let Some(&member_id) = args.get_one::<u32>("MEMBER_ID") else {
        fail("A member id is required");
    };
    let max_display = args.get_one::<usize>("COUNT").copied().unwrap_or(5);
    let neighbor_count = args
        .get_one::<usize>("neighbors")
        .copied()
        .unwrap_or(tunemirror_core::recommend::DEFAULT_NEIGHBOR_COUNT);
    let json = args.get_flag("json");

    let db_path = resolve_db_path(args.get_one::<String>("db"));
    require_store(&db_path);
    let db = match Database::open_read_only(&db_path) {
        Ok(db) => db,
        Err(e) => fail(format!("Failed to open {}: {}", db_path.display(), e)),
    };

    let client = build_client(
        args,
        RetryPolicy::exponential(RECOMMEND_FETCH_ATTEMPTS, RECOMMEND_INITIAL_BACKOFF),
    );

    let result = match recommend_for_member(&client, &db, member_id, neighbor_count).await {
        Ok(result) => result,
        Err(e) => fail(fetch_failure_message(member_id, &e)),
    };

    match render_recommendations(&result, max_display, json) {
        Ok(out) => print!("{}", out),
        Err(e) => fail(format!("{:#}", e)),
    }
}

pub fn handle_inspect(args: &ArgMatches) {
    let Some(&member_id) = args.get_one::<u32>("MEMBER_ID") else {
        fail("A member id is required");
    };
    let db_path = resolve_db_path(args.get_one::<String>("db"));
    require_store(&db_path);

    let db = match Database::open_read_only(&db_path) {
        Ok(db) => db,
        Err(e) => fail(format!("Failed to open {}: {}", db_path.display(), e)),
    };

    let report = db
        .stats()
        .and_then(|stats| Ok((stats, db.inspect_member(member_id)?)))
        .map(|(stats, lookup)| generate_inspection_report(&stats, member_id, &lookup));

    match report {
        Ok(report) => print!("{}", report),
        Err(e) => fail(format!("Failed to read the store: {}", e)),
    }
}
