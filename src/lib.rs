pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod console;
pub mod global;
pub mod media;
pub mod room;
pub mod session;
pub mod token;
