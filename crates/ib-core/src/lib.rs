//! ib-core: records, values, type tags, relation classification,
//! configuration and the model event bus.
//!
//! This crate is the foundational dependency of `ib-db` and the `ironbean`
//! facade. It performs no I/O against the database.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod model;
pub mod naming;
pub mod relation;
pub mod types;
pub mod value;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::{IdMode, RecordId};
pub use model::{Element, Model, ModelState, Related};
pub use relation::RelationKind;
pub use types::TypeTag;
pub use value::Value;
