//! # geoloc Common Library
//!
//! Shared code for the geoloc tools including:
//! - Error type
//! - Configuration loading and database path resolution
//! - SQLite schema, models and queries for the country → state →
//!   borough → city → zip hierarchy
//! - The record store interface consumed by the importer

pub mod config;
pub mod db;
pub mod error;
pub mod store;

pub use error::{Error, Result};
pub use store::{EntityKind, Field, FieldMap, FieldValue, GeoStore, SqliteGeoStore};
