pub mod app;
pub mod config;
pub mod error;
pub mod gpu;
pub mod report;
