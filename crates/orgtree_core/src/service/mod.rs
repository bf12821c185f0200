//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository reads, hierarchy components and publishing into
//!   request-level APIs.
//! - Keep CLI and other callers decoupled from storage details.

pub mod entity_service;
