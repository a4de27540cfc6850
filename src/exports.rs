//! Re-exports of the crates that appear in the public API of `diffpeak`,
//! so downstream binaries can stay on exactly the same versions.

pub use {anyhow,
         bio,
         itertools,
         log,
         ndarray,
         pretty_env_logger,
         rand,
         rayon,
         serde,
         serde_json,
         statrs};
