pub mod backend;
pub mod channel;
pub mod delivery;
