// src/lib.rs

//! Chanfeed Library
//!
//! Incremental crawler that merges public channel previews into one RSS feed.

pub mod config;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
