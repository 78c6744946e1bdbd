//! Repository traits for the index store.

pub mod keys;
pub mod lists;

pub use keys::KeyRepo;
pub use lists::{ListRepo, resolve_range};
