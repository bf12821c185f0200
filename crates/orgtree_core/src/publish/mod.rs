//! Outbound change publishing.
//!
//! # Responsibility
//! - Model the hand-off of computed changes as a narrow enqueue interface.
//! - Apply published batches to the entity store on the consuming side.
//!
//! # Invariants
//! - `enqueue` never blocks and never reports failure to the producer.
//! - Neither side retries; failed batches are logged and counted.

pub mod persister;
pub mod queue;
