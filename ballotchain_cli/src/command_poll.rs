use super::{exit, expand, lock_ledger, open_ballot_box, open_ledger, print_json};
use ballotchain::{verify_receipt, Config};
use std::path::Path;

pub fn command_close(matches: &clap::ArgMatches, config: &Config) {
    // Unwraps are OK, both these args are required
    let poll_id = expand(matches.value_of("POLL-ID").unwrap());
    let options: Vec<String> = matches.values_of("OPTIONS").unwrap().map(String::from).collect();

    let env_var = std::env::var("BALLOTCHAIN_SECRET_KEY");
    let secret_key = match matches.value_of("secret-key") {
        Some(secret_key) => expand(secret_key),
        None => env_var.unwrap_or_else(|_| {
            eprintln!(
                "Please provide the poll secret key either via --secret-key \
                 or BALLOTCHAIN_SECRET_KEY"
            );
            std::process::exit(1);
        }),
    };

    // Accept a path to a key file as well as the key itself
    let secret_key = if Path::new(&secret_key).is_file() {
        std::fs::read_to_string(&secret_key)
            .unwrap_or_else(|e| {
                eprintln!("ballotchain close: unable to read {}: {}", secret_key, e);
                std::process::exit(1);
            })
            .trim()
            .to_owned()
    } else {
        secret_key
    };

    let _lock = lock_ledger(config);
    let ballot_box = open_ballot_box(config);
    let tally = ballot_box
        .close_poll(&poll_id, &options, &secret_key)
        .unwrap_or_else(|e| exit(e));

    print_json(&tally);
}

pub fn command_verify(matches: &clap::ArgMatches, config: &Config) {
    // Unwraps are OK, both these args are required
    let poll_id = expand(matches.value_of("POLL-ID").unwrap());
    let receipt = matches.value_of("RECEIPT").unwrap();

    let _lock = lock_ledger(config);
    let ledger = open_ledger(config);
    if verify_receipt(receipt, &ledger.votes_for(&poll_id)) {
        println!("verified: vote is recorded in poll {}", poll_id);
    } else {
        eprintln!("not verified: no matching vote in poll {}", poll_id);
        std::process::exit(1);
    }
}
