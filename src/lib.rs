pub mod client;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod log;
pub mod output;
pub mod parser;
pub mod poller;
pub mod store;
