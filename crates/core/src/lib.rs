//! Core domain types and shared logic for the image gallery.
//!
//! This crate defines the data model used across all other crates:
//! - Image records and their index encoding
//! - Record identifiers
//! - MIME validation and blob naming
//! - Caller identity and token hashing
//! - Configuration

pub mod config;
pub mod error;
pub mod id;
pub mod media;
pub mod record;
pub mod token;

pub use error::{Error, Result};
pub use id::RecordId;
pub use record::{
    IMAGES_LIST_KEY, ImageRecord, MalformedRecord, RecordLookup, UNDEFINED_MARKER, decode, encode,
    lookup,
};
pub use token::{Identity, Role};
