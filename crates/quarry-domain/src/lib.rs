//! Pure decision logic for quarry.
//!
//! Nothing in this crate touches the filesystem or spawns processes: it
//! answers "which flags are safe", "which extra options apply here" and
//! "what kind of failure was that" from values handed to it.

pub mod classify;
pub mod overrides;
pub mod version;

pub use classify::{
    classify, default_matchers, Classification, ClassifyError, ErrorMatcher, UNKNOWN_CATEGORY,
};
pub use overrides::{OverrideError, OverrideTree};
pub use version::{parse_version, version_above, VersionError};
