use clap::Parser;
use log::LevelFilter;

mod commands;
mod log;

use commands::Subcommand;

/// Command-line tools for a legacy visual-novel engine's asset formats:
/// archive unpacking, animation/PCM codecs, and the script patcher.
#[derive(Parser, Debug)]
#[clap(name = "sgs", version, author)]
struct SgsArgs {
    /// Increase log verbosity; may be repeated (-v, -vv, -vvv).
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all log output below warnings.
    #[clap(short, long, global = true)]
    quiet: bool,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

fn main() {
    let args = SgsArgs::parse();

    let default_level = if args.quiet {
        LevelFilter::Warn
    } else {
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    env_logger::builder()
        .filter_level(default_level)
        .parse_env("SGS_LOG")
        .format(log::formatter)
        .init();

    if let Err(e) = args.subcommand.run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
