//! # Sparkify Common Library
//!
//! Shared code for the Sparkify ETL workspace including:
//! - Row models for raw song/log records and the star-schema tables
//! - Lenient field coercion used by the explicit read schemas
//! - Configuration loading and credential resolution
//! - Pure timestamp derivation helpers

pub mod coerce;
pub mod config;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
