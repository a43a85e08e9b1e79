pub mod analyze;
pub mod cli;
pub mod collab;
pub mod config;
pub mod error;
pub mod extract;
pub mod interpret;
pub mod metadata;
pub mod pipeline;
pub mod postprocess;
pub mod render;
pub mod report;
pub mod runner;
pub mod util;
