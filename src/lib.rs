pub mod accumulator;
pub mod backfill;
pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod finalize;
pub mod hook;
pub mod instrument;
pub mod matcher;
pub mod model;
pub mod report;
pub mod session;
pub mod summary;
pub mod threshold;
