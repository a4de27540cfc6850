//! Normalization and training-set construction for differential peak
//! calling on replicate ChIP-seq coverage of two conditions.
//!
//! A run bins the genome ([`data_structs::BinLayout`]), counts reads of
//! every replicate ([`io::CoverageSource`]), normalizes the coverage
//! ([`tools::gc`], [`tools::input`], [`tools::tmm`]) and selects putative
//! differential regions ([`tools::scoring`]) from which a labelled training
//! set is drawn ([`tools::training`]). [`pipeline`] ties the stages
//! together.

pub mod config;
pub mod data_structs;
pub mod errors;
pub mod exports;
pub mod io;
pub mod pipeline;
pub mod prelude;
pub mod tools;
pub mod utils;
