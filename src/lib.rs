//! Grade aggregation and reporting for a class gradebook.
//!
//! Everything here is a pure function of the book, a [`semester::Semester`]
//! and a selection passed in by the caller. The only side effects are the
//! file writers in [`export`], [`pdf`] and [`store`], and the outbound call
//! made by [`comment::GeminiGenerator`].

pub mod averages;
pub mod charts;
pub mod comment;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod pdf;
pub mod report;
pub mod semester;
pub mod store;
pub mod transliterate;
