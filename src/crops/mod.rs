//! Categorized crop aggregates
//!
//! One aggregate row exists per `(class, subject, course, module)` taxonomy
//! tuple; it holds the ordered URL lists for the four crop categories.

mod store;
mod types;

pub use store::CropRepository;
pub use types::{AggregateView, CategoryUrls, CropCategory, TaxonomyKey};
