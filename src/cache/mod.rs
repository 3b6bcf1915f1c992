//! In-process caches for inline query results and profile photos

pub mod inline;
pub mod photo;

pub use inline::InlineQueryCache;
pub use photo::{PhotoLookup, ProfilePhotoCache};
