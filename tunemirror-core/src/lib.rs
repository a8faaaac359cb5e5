pub mod crawl;
pub mod data;
pub mod error;
pub mod recommend;
pub mod report;

use colored::Colorize;

const BANNER: &str = r#"
  _                              _
 | |_ _   _ _ __   ___ _ __ ___ (_)_ __ _ __ ___  _ __
 | __| | | | '_ \ / _ \ '_ ` _ \| | '__| '__/ _ \| '__|
 | |_| |_| | | | |  __/ | | | | | | |  | | | (_) | |
  \__|\__,_|_| |_|\___|_| |_| |_|_|_|  |_|  \___/|_|
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_green());
    println!(
        "  {} v{}\n",
        "a local mirror of thesession.org tunebooks".bright_white(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
}
