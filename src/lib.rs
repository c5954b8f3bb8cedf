pub mod attribution;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod expectancy;
pub mod export;
pub mod leaderboard;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod qualify;
pub mod roster;
pub mod source;
pub mod state_key;
pub mod stats;
pub mod store;
pub mod synthetic;

pub use config::EngineConfig;
pub use error::EngineError;
