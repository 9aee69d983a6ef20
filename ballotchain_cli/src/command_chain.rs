use super::{lock_ledger, open_ledger, print_json};
use ballotchain::{check_block, Block, Config};

pub fn command_stats(config: &Config) {
    let _lock = lock_ledger(config);
    let ledger = open_ledger(config);
    print_json(&ledger.stats());
}

pub fn command_validate(config: &Config) {
    let _lock = lock_ledger(config);
    let ledger = open_ledger(config);
    if ledger.validate() {
        println!("valid: {} blocks", ledger.len());
        return;
    }

    // Re-walk the chain to report the first bad block
    let blocks = ledger.blocks();
    let failure = blocks
        .iter()
        .enumerate()
        .find_map(|(i, block)| {
            let previous = i.checked_sub(1).map(|p| &blocks[p]);
            check_block(block, previous, ledger.difficulty()).err()
        });

    match failure {
        Some(e) => eprintln!("invalid: {}", e),
        None => eprintln!("invalid"),
    }
    std::process::exit(1);
}

pub fn command_blocks(matches: &clap::ArgMatches, config: &Config) {
    let _lock = lock_ledger(config);
    let ledger = open_ledger(config);

    if let Some(hash) = matches.value_of("HASH") {
        match ledger.block_by_hash(hash) {
            Some(block) => print_json(&block),
            None => {
                eprintln!("ballotchain blocks: no block with hash {}", hash);
                std::process::exit(1);
            }
        }
        return;
    }

    let blocks: Vec<Block> = match matches.value_of("poll-id") {
        Some(poll_id) => ledger
            .blocks()
            .into_iter()
            .filter(|block| block.poll_id == poll_id)
            .collect(),
        None => ledger.blocks(),
    };
    print_json(&blocks);
}
