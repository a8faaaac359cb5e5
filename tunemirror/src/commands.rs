use crate::CLAP_STYLING;
use clap::{arg, command};
use tunemirror_scanner::client::DEFAULT_BASE_URL;

fn db_arg() -> clap::Arg {
    arg!(--"db" <PATH>)
        .required(false)
        .help("Path to the tunemirror database (default: ~/.config/tunemirror/tunemirror.db)")
}

fn base_url_arg() -> clap::Arg {
    arg!(--"base-url" <URL>)
        .required(false)
        .help("Root of the remote catalog")
        .default_value(DEFAULT_BASE_URL)
}

fn timeout_arg() -> clap::Arg {
    arg!(--"timeout" <SECONDS>)
        .required(false)
        .help("Per-request timeout in seconds")
        .value_parser(clap::value_parser!(u64))
        .default_value("15")
}

fn delay_arg() -> clap::Arg {
    arg!(--"delay-ms" <MILLIS>)
        .required(false)
        .help("Pause before every request, in milliseconds")
        .value_parser(clap::value_parser!(u64))
        .default_value("300")
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("tunemirror")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("tunemirror")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and progress output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"verbose" "Log every request at debug level")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the tunemirror database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to store the tunemirror database in")
                        .default_value("~/.config/tunemirror/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Deletes any existing database at the location without asking.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Walk the member id space, storing every public tunebook. Resumes after \
                the highest member already stored.",
                )
                .arg(db_arg())
                .arg(base_url_arg())
                .arg(
                    arg!(--"start-id" <ID>)
                        .required(false)
                        .help("Start at this member id instead of resuming")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                )
                .arg(
                    arg!(--"limit" <COUNT>)
                        .required(false)
                        .help("Stop after attempting this many ids")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                )
                .arg(timeout_arg())
                .arg(delay_arg())
                .arg(
                    arg!(--"miss-threshold" <COUNT>)
                        .required(false)
                        .help("Consecutive not-found ids beyond the high-water mark before stopping")
                        .value_parser(clap::value_parser!(u32).range(1..))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"high-water-mark" <ID>)
                        .required(false)
                        .help("Ids at or below this never count as misses")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("187000"),
                ),
        )
        .subcommand(
            command!("recommend")
                .about(
                    "Fetch a member's current tunebook and recommend tunes that similar \
                members in the local store have bookmarked",
                )
                .arg(
                    arg!(<MEMBER_ID>)
                        .help("The member to recommend for")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!([COUNT])
                        .required(false)
                        .help("Tunes to show per rhythm")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                )
                .arg(db_arg())
                .arg(
                    arg!(-n --"neighbors" <K>)
                        .required(false)
                        .help("How many similar members to draw from")
                        .value_parser(clap::builder::RangedU64ValueParser::<usize>::new().range(1..))
                        .default_value("50"),
                )
                .arg(base_url_arg())
                .arg(timeout_arg())
                .arg(delay_arg())
                .arg(
                    arg!(--"json" "Print the full result as JSON")
                        .required(false)
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("inspect")
                .about("Show store totals and what the store holds for one member")
                .arg(
                    arg!(<MEMBER_ID>)
                        .help("The member to look up")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(db_arg()),
        )
}
