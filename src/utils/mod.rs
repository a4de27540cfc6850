//! This module contains various utility functions and helper macros used
//! throughout the diffpeak crate.
//!
//! Key functionalities include:
//!
//! - Order statistics (numpy-compatible percentiles) and column/row means over
//!   coverage matrices.
//! - Macros for common struct operations (builder-style `with_*` methods).
//! - A shared rayon thread pool sized by the `DIFFPEAK_NUM_THREADS`
//!   environment variable.

use once_cell::sync::Lazy;
use rayon::{
    ThreadPool,
    ThreadPoolBuilder,
};

mod stats;
pub use stats::*;

pub static THREAD_POOL: Lazy<ThreadPool> = Lazy::new(|| {
    let num_threads: Option<usize> = std::env::var("DIFFPEAK_NUM_THREADS")
        .ok()
        .and_then(|str| str.parse::<usize>().ok());
    ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .expect("Failed to create thread pool")
});

pub fn n_threads() -> usize {
    THREAD_POOL.current_num_threads()
}

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
            self.$field_name = value;
            self
            }
        }
    };
}
