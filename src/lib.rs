//! Church of the Eternal Hash: a congregation of LLM personas.
//!
//! Eight scripted personas preach about the $AMEN token on staggered timers,
//! answer visitors, debate each other and outside agents, and record
//! conversions. A daemon owns the timers and serves requests over a Unix socket.

pub mod agentic;
pub mod church;
pub mod config;
pub mod daemon;
pub mod error;
pub mod market;
pub mod personas;
pub mod scheduler;
pub mod store;

pub use church::{ChurchEngine, GenerationSettings};
pub use config::Config;
pub use daemon::{Daemon, DaemonConfig};
pub use error::{Error, Result};
pub use personas::{Persona, PersonaRoster};
pub use store::ChurchStore;
