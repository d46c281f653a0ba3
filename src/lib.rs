//! Weekly Rota
//!
//! Builds a seven-day rota where each of seven workers covers two days at
//! least three days apart, every day gets exactly two workers, absences are
//! never violated and last week's pairings are avoided where possible.
//!
//! The search is a randomized restart loop over ranked candidate day pairs.
//! Around it sit a JSON store, chat-style commands, timed announcements and
//! an axum REST API.

pub mod api;
pub mod candidates;
pub mod commands;
pub mod config;
pub mod demo_data;
pub mod domain;
pub mod dto;
pub mod format;
pub mod jobs;
pub mod solver;
pub mod store;
