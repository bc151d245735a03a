//! Command implementations shared by the `fallchat` and `fcask` binaries.

/// One-shot question.
pub mod ask;
/// Interactive chat session.
pub mod chat;
pub mod config;
pub mod options;
/// Text-to-speech.
pub mod speak;
