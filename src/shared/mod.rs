pub mod config;
pub mod llm;
pub mod logging;
pub mod sandbox;
pub mod state;

pub use state::AppState;
