//! shelfcheck — which of my to-read books are on the shelf at the
//! public library right now?
//!
//! Aggregates a user's "to-read" shelf from a book-tracking service
//! with live availability scraped from a library catalog, and reports
//! per book whether any physical copy is currently available.

pub mod aggregate;
pub mod availability;
pub mod catalog;
pub mod config;
pub mod fanout;
pub mod fetch;
pub mod rest;
pub mod shelf;
pub mod types;
