pub mod batch;
pub mod config;
pub mod credentials;
pub mod documents;
pub mod error;
pub mod export;
pub mod generate;
pub mod model;
pub mod prompt;
pub mod remote;
pub mod server;
pub mod vertex;
