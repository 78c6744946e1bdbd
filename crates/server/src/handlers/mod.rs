//! HTTP request handlers.

pub mod admin;
pub mod auth;
pub mod blobs;
pub mod images;
pub mod uploads;

pub use admin::*;
pub use auth::*;
pub use blobs::*;
pub use images::*;
pub use uploads::*;
