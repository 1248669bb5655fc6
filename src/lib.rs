//! Free-text weather questions answered through a language-model intent parser,
//! WeatherAPI.com and a short rolling query history.

pub mod config;
pub mod error;
pub mod history;
pub mod intent;
pub mod kv;
pub mod limerick;
pub mod models;
pub mod server;
pub mod service;
pub mod transport;
pub mod weather;

pub use config::Config;
pub use error::{Result, WeatherChatError};
pub use history::HistoryStore;
pub use service::ChatService;
