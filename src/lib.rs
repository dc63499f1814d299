//! Franking Cache Library
//!
//! Scrapes ASX dividend tables, computes trailing-12-month weighted franking
//! and keeps a JSON cache file in sync, writing it only when figures change.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod lock;
pub mod refresh;
