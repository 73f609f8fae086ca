//! Core data structures flowing through the preparation pipeline.
//!
//! - [`types`] – Periodic table elements and bond orders.
//! - [`molecule`] – Tensor form of a parsed molecule ([`MoleculeInfo`]) and
//!   padding helpers.
//! - [`leaving_group`] – Vocabulary entries and the gate/bridge descriptors
//!   attached to them.
//! - [`record`] – The padded per-example unit written to disk.
//!
//! [`MoleculeInfo`]: molecule::MoleculeInfo

pub mod leaving_group;
pub mod molecule;
pub mod record;
pub mod types;
