pub mod audio;
pub mod config;
pub mod error;
pub mod history;
pub mod kernel;
pub mod services;
pub mod transcript;
pub mod tree;

// Re-export specific items for convenient access
pub use config::SessionConfig;
pub use error::SessionError;
pub use kernel::reactor::SessionController;
