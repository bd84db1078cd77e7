pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fasta;
pub mod filter;
pub mod flatten;
pub mod http;
pub mod jgi;
pub mod layout;
pub mod listing;
pub mod manifest;
pub mod output;
pub mod reconcile;
pub mod rename;
pub mod table;
