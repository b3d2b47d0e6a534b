//! Data models for the records service.
//!
//! Records are schema-less; the per-collection column layout lives on [`Collection`].

mod collection;
mod record;
mod sync;

pub use collection::*;
pub use record::*;
pub use sync::*;
