// src/ingest/providers/mod.rs
pub mod json_file;
pub mod fixed;

pub use fixed::StaticSource;
pub use json_file::JsonFileSource;
