pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod filter;
pub mod fs_util;
pub mod grid;
pub mod normalize;
pub mod output;
pub mod providers;
pub mod query;
pub mod records;
pub mod transport;
