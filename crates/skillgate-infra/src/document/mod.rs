//! File-backed implementations of the configuration document port.

pub mod json_file;

pub use json_file::JsonFileDocumentStore;
