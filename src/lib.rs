//! Voice Capture API Library
//!
//! Structured capture state for voice-agent personas: schema-driven records,
//! the operations a hosted language model invokes on them, persistence of
//! finalized records and the HTTP service exposing it all.

pub mod agents;
pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
