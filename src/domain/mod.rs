//! Catalog domain: document paths, category/product documents, events.
pub mod aggregates;
pub mod events;
pub mod value_objects;
