use super::{exit, expand, lock_ledger, open_ballot_box, print_json, save_registry};
use ballotchain::{derive_token, Config};

pub fn command_vote(matches: &clap::ArgMatches, config: &Config) {
    // Unwraps are OK, these args are required
    let poll_id = expand(matches.value_of("POLL-ID").unwrap());
    let identifier = matches.value_of("IDENTIFIER").unwrap();
    let choice = matches.value_of("CHOICE").unwrap();
    let public_key = expand(matches.value_of("public-key").unwrap());

    let _lock = lock_ledger(config);
    let ballot_box = open_ballot_box(config);

    let cast = ballot_box
        .cast_vote(&poll_id, identifier, choice, &public_key)
        .unwrap_or_else(|e| exit(e));

    // The voter is on disk before their vote can reach the chain
    save_registry(config, ballot_box.registry());

    // Pending votes live only as long as this process
    if let Err(e) = ballot_box.seal_pending(&poll_id) {
        ballot_box
            .registry()
            .unregister(&poll_id, &derive_token(identifier, &poll_id));
        save_registry(config, ballot_box.registry());
        exit::<_, ()>(e);
    }

    print_json(&cast);
}
