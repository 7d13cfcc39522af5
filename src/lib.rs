pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod token_store;

// Re-export main types for convenience
pub use api::{ChatBackend, ChatClient};
pub use config::ChatConfig;
pub use error::{ChatError, ChatResult};
pub use models::*;
pub use session::{ChatSession, ChatState, SessionEvent};
pub use token_store::TokenStore;
