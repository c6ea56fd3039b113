//! # Viktorina Library
//!
//! Core logic of a two-party Bible quiz: a question bank merging built-in
//! and custom questions with write-through persistence, a round and score
//! engine driving each round through its phases with cancellable
//! countdowns, and an answer judge that asks a remote AI service and falls
//! back to local matching.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::new_without_default)]

pub mod bank;
pub mod builtin;
pub mod constants;
pub mod game;
pub mod judge;
pub mod question;
pub mod round;
pub mod scoreboard;
pub mod settings;
pub mod storage;
pub mod timer;

pub use bank::QuestionBank;
pub use game::Game;
pub use question::{Category, Difficulty, MatchType, Question};
