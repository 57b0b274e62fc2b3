//! # Wiring Support
//!
//! Shared utilities for the wiring crates.
//!
//! This crate provides:
//! - Text rendering for error messages and build diagnostics
//! - "Did you mean?" suggestions for mistyped service ids and references

pub mod rendering;
