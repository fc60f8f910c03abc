//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine edits and store calls into use-case level APIs.
//! - Keep gateway and CLI layers decoupled from storage details.

pub mod category_service;
