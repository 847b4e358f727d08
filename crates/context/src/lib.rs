//! Context assembly pipeline.
//!
//! Assembles the bounded input to generation from four distinct blocks, in
//! fixed order:
//!
//! 1. **Persona** (user name + description)
//! 2. **Character** (card metadata + always-active lore entries)
//! 3. **World Lore** (trigger-matched entries, character-budgeted, dry-run)
//! 4. **Recent Conversation** (windowed turn suffix)
//!
//! Any single block fetch failing yields an empty block — assembly as a
//! whole never fails because of auxiliary data. Assembly is deterministic:
//! identical inputs always produce identical bundles.

pub mod assembler;
pub mod bundle;

pub use assembler::{AssemblyInput, ContextAssembler};
pub use bundle::ContextBundle;
