//! URL handling for item keys
//!
//! Item keys are canonical URLs: two hrefs that point at the same item must
//! produce the same key so deduplication works across pages and resumed runs.

mod normalize;

pub use normalize::{canonicalize, resolve_key};
