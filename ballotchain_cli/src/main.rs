use ballotchain::{BallotBox, Config, FileStore, Ledger, LedgerLock, VoterRegistry};
use clap::{App, AppSettings, Arg, SubCommand};
use log::LevelFilter;
use std::path::PathBuf;

mod command_chain;
mod command_keygen;
mod command_poll;
mod command_vote;

use command_chain::*;
use command_keygen::*;
use command_poll::*;
use command_vote::*;

fn main() {
    let matches = App::new("Ballotchain CLI")
        .version("0.1")
        .author("Patrick Hayes <patrick.d.hayes@gmail.com>")
        .about("Casts, seals and tallies anonymous votes on a local proof-of-work ledger")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("ledger")
                .long("ledger")
                .takes_value(true)
                .help("Ledger file - can also be set with BALLOTCHAIN_LEDGER_PATH"),
        )
        .arg(
            Arg::with_name("difficulty")
                .long("difficulty")
                .takes_value(true)
                .help(
                    "Leading zero hex digits required of block hashes \
                     - can also be set with BALLOTCHAIN_DIFFICULTY",
                ),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("keygen")
                .about("Generate a poll id and key pair")
                .arg(
                    Arg::with_name("poll-id")
                        .long("poll-id")
                        .takes_value(true)
                        .help("Use this poll id instead of a random one"),
                ),
        )
        .subcommand(
            SubCommand::with_name("token")
                .about("Print the voter token for an identifier in a poll")
                .arg(Arg::with_name("POLL-ID").index(1).required(true))
                .arg(Arg::with_name("IDENTIFIER").index(2).required(true)),
        )
        .subcommand(
            SubCommand::with_name("vote")
                .about("Cast a vote and seal it into the ledger")
                .arg(Arg::with_name("POLL-ID").index(1).required(true))
                .arg(
                    Arg::with_name("IDENTIFIER")
                        .index(2)
                        .required(true)
                        .help("Voter identifier, never stored"),
                )
                .arg(Arg::with_name("CHOICE").index(3).required(true))
                .arg(
                    Arg::with_name("public-key")
                        .long("public-key")
                        .takes_value(true)
                        .required(true)
                        .help("The poll's public key"),
                ),
        )
        .subcommand(
            SubCommand::with_name("close")
                .about("Seal outstanding votes and print the tally")
                .arg(Arg::with_name("POLL-ID").index(1).required(true))
                .arg(
                    Arg::with_name("OPTIONS")
                        .index(2)
                        .multiple(true)
                        .required(true)
                        .help("Poll options, in display order"),
                )
                .arg(
                    Arg::with_name("secret-key")
                        .long("secret-key")
                        .takes_value(true)
                        .help(
                            "The poll's secret key, or a file containing it \
                             - can also be set with BALLOTCHAIN_SECRET_KEY",
                        ),
                ),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("Check that a receipt's vote is in the ledger")
                .arg(Arg::with_name("POLL-ID").index(1).required(true))
                .arg(Arg::with_name("RECEIPT").index(2).required(true)),
        )
        .subcommand(SubCommand::with_name("stats").about("Print ledger statistics"))
        .subcommand(
            SubCommand::with_name("validate")
                .about("Check every block's hash, link and proof-of-work"),
        )
        .subcommand(
            SubCommand::with_name("blocks")
                .about("Print blocks as JSON")
                .arg(
                    Arg::with_name("HASH")
                        .index(1)
                        .help("Print only the block with this hash"),
                )
                .arg(
                    Arg::with_name("poll-id")
                        .long("poll-id")
                        .takes_value(true)
                        .help("Print only blocks for this poll"),
                ),
        )
        .get_matches();

    let level = match matches.occurrences_of("v") {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    init_logger(level);

    let config = config(&matches);

    // Subcommands
    match matches.subcommand() {
        ("keygen", Some(matches)) => command_keygen(matches),
        ("token", Some(matches)) => command_token(matches),
        ("vote", Some(matches)) => command_vote(matches, &config),
        ("close", Some(matches)) => command_close(matches, &config),
        ("verify", Some(matches)) => command_verify(matches, &config),
        ("stats", Some(_)) => command_stats(&config),
        ("validate", Some(_)) => command_validate(&config),
        ("blocks", Some(matches)) => command_blocks(matches, &config),
        _ => unreachable!(),
    }
}

fn init_logger(level: Option<LevelFilter>) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

/// Environment configuration, with command-line flags taking precedence
fn config(matches: &clap::ArgMatches) -> Config {
    let mut config = Config::from_env().unwrap_or_else(|e| exit(e));

    if let Some(ledger) = matches.value_of("ledger") {
        config.ledger_path = PathBuf::from(expand(ledger));
    }
    if let Some(difficulty) = matches.value_of("difficulty") {
        config.difficulty = difficulty.parse().unwrap_or_else(|_| {
            eprintln!("ballotchain: --difficulty must be a non-negative integer");
            std::process::exit(1);
        });
    }

    config.validate().unwrap_or_else(|e| exit(e));
    config
}

/// Serialize this command against other processes using the same ledger
pub fn lock_ledger(config: &Config) -> LedgerLock {
    FileStore::new(&config.ledger_path)
        .lock()
        .unwrap_or_else(|e| exit(e))
}

pub fn open_ledger(config: &Config) -> Ledger<FileStore> {
    Ledger::open_with_limit(
        FileStore::new(&config.ledger_path),
        config.difficulty,
        config.max_mining_attempts,
    )
    .unwrap_or_else(|e| exit(e))
}

/// Open the ledger together with the voter registry persisted next to it
pub fn open_ballot_box(config: &Config) -> BallotBox<FileStore> {
    let snapshot = ballotchain::read_json(&config.registry_path())
        .unwrap_or_else(|e| exit(e))
        .unwrap_or_default();

    BallotBox::new(
        open_ledger(config),
        VoterRegistry::restore(snapshot),
        config.seal_threshold,
    )
    .unwrap_or_else(|e| exit(e))
}

pub fn save_registry(config: &Config, registry: &VoterRegistry) {
    ballotchain::write_json_atomic(&config.registry_path(), &registry.snapshot())
        .unwrap_or_else(|e| exit(e));
}

pub fn print_json<T: serde::Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| exit(e));
    println!("{}", json);
}

pub fn exit<E: std::fmt::Display, T>(e: E) -> T {
    eprintln!("{}", e);
    std::process::exit(1);
}

pub fn expand(input: &str) -> String {
    shellexpand::full(input)
        .map(|expanded| expanded.into_owned())
        .unwrap_or_else(|e| exit(e))
}
