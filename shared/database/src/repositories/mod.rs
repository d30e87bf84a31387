//! Repository module for database CRUD operations
//!
//! Typed repositories over the catalog tables.

pub mod part;
pub mod bom;

pub use part::PartRepository;
pub use bom::BomRepository;
