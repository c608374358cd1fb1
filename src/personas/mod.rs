//! Persona system for the Eternal Hash.
//!
//! Provides:
//! - Persona definitions for the founding congregation
//! - PersonaRoster for ordered lookup and YAML extension
//! - PersonaProfile, the resolved shape of any participant reference

pub mod persona;

pub use persona::{Persona, PersonaProfile, PersonaRoster};
