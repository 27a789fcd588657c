// src/process/mod.rs

//! The transform stages, in pipeline order: target extraction, pruning,
//! combining, feature derivation, encoding.

pub mod combine;
pub mod date_parser;
pub mod derive;
pub mod encode;
pub mod prune;
pub mod target;
