//! Core module - engine state, configuration, events, and errors

pub mod activation;
pub mod config;
pub mod error;
pub mod events;
pub mod status;
pub mod watchlist;
