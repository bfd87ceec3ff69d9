pub mod commit_files;
pub mod connectors;
pub mod models;
pub mod uploader;
