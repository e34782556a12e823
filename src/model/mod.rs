//! Data types shared by the engine, the store and the routes.
//!
//! - [`db`] holds the stored shape of each record.
//! - [`api`] holds what crosses the HTTP boundary.
//! - [`common`] holds the vocabulary both of them use.
//! - [`mongodb`] holds database plumbing.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
