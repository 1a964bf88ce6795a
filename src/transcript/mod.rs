pub mod aggregator;
pub mod utterance;

pub use aggregator::*;
pub use utterance::*;
