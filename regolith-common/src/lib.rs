//! # Regolith Common Library
//!
//! Shared code for the Regolith analysis backend:
//! - Error types used across handlers and services
//! - Tagged identifiers (private vs shared namespace)
//! - Object store key layout
//! - Wire models (jobs, quantifications, regions, expressions,
//!   view states, collections, visibility)

pub mod error;
pub mod ident;
pub mod models;
pub mod paths;
pub mod time;

pub use error::{Error, Result};
pub use ident::ItemId;
