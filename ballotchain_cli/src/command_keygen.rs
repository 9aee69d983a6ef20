use super::expand;
use ballotchain::{derive_token, PollKeyPair};

pub fn command_keygen(matches: &clap::ArgMatches) {
    let poll_id = match matches.value_of("poll-id") {
        Some(poll_id) => expand(poll_id),
        None => uuid::Uuid::new_v4().to_string(),
    };

    let keys = PollKeyPair::generate();

    println!("poll-id: {}", poll_id);
    println!("secret-key: {}", keys.secret_key);
    println!("public-key: {}", keys.public_key);
}

pub fn command_token(matches: &clap::ArgMatches) {
    // Unwraps are OK, both these args are required
    let poll_id = expand(matches.value_of("POLL-ID").unwrap());
    let identifier = expand(matches.value_of("IDENTIFIER").unwrap());

    let token = derive_token(&identifier, &poll_id);

    println!("token: {}", token);
    println!("partial: {}", token.partial());
}
