//! # Bomwright Core Domain Models
//!
//! Domain types shared by the import pipeline, the pricing engine and the
//! catalog store.
//!
//! ## Key Models
//!
//! - **Part**: a catalog record keyed by part number, with its pricing model
//! - **PricingRule**: a pricing model together with the data it needs
//! - **ImportCandidate**: a staged, validated row of an import session
//! - **Bom** / **BomItem**: BOM headers and their snapshotted line items
//! - **PartFilter**: multi-select and free-text catalog search criteria

pub mod part;
pub mod pricing;
pub mod import;
pub mod bom;
pub mod filter;

#[cfg(test)]
pub mod property_tests;

pub use part::*;
pub use pricing::*;
pub use import::*;
pub use bom::*;
pub use filter::*;
