//! Core types, the draw engine, and trait definitions for Tinsel gift
//! exchanges.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::GroupStore`], mail transports implement
//! [`notify::Notifier`], and [`exchange::Exchange`] ties them together.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod draw;
pub mod error;
pub mod exchange;
pub mod group;
pub mod notify;
pub mod participant;
pub mod session;
pub mod store;

pub use error::{Error, Result};
