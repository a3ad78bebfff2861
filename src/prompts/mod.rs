//! Prompt module for LLM-based operations.
//!
//! This module provides prompt templates for the abstract summarizer.

pub mod abstract_summary;

pub use abstract_summary::*;
