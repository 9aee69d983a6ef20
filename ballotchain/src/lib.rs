#[macro_use]
extern crate serde;

mod ballot_box;
mod block;
mod cipher;
mod config;
mod error;
mod ledger;
mod receipt;
mod registry;
mod sealer;
mod serde_b64;
mod store;
mod util;
mod vote;

pub use ballot_box::*;
pub use block::*;
pub use cipher::*;
pub use config::*;
pub use error::*;
pub use ledger::*;
pub use receipt::*;
pub use registry::*;
pub use sealer::*;
pub use store::*;
pub use util::*;
pub use vote::*;

#[cfg(test)]
mod tests;
