pub mod app;
pub mod capture;
pub mod cli;
pub mod config;
pub mod input;
pub mod instance;
pub mod rewrite;

pub use app::RewordApp;
pub use config::Config;
