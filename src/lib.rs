//! Chat-completions client that falls back across models.

pub mod commands;
pub mod config;
pub mod fallback;
pub mod logging;
pub mod render;

/// Version string with the commit and build time stamped in by `build.rs`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("FC_GIT_SHA"),
    ", built: ",
    env!("FC_BUILD_TS"),
    ")"
);
