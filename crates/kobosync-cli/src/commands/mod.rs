//! Command handlers

pub mod config;
pub mod readwise;
pub mod status;
pub mod sync;
