//! This module provides the normalization and selection steps applied to
//! replicate coverage before differential peak calling.
//!
//! Steps are listed in the order the pipeline runs them:
//!
//! - [`gc`]: GC-content bias correction of IP and input coverage, with a
//!   per-run cached GC profile.
//! - [`input`]: input-DNA subtraction, using predefined factors or factors
//!   estimated with signal extraction scaling.
//! - [`tmm`]: trimmed mean of M-values scaling factors for every replicate.
//! - [`scoring`]: per-bin score and selection of putative regions of
//!   interest.
//! - [`training`]: balanced three-class training set construction with
//!   threshold relaxation and resampling.
pub mod gc;
pub mod input;
pub mod scoring;
pub mod tmm;
pub mod training;
