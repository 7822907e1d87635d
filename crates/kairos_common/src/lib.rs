//! Shared foundational types for the Kairos simulation kernel.
//!
//! This crate provides the nine-value logic scalar and packed logic vectors
//! used as the simulator's uniform signal encoding, interned identifiers for
//! signal names, and a dense ID-indexed arena.

#![warn(missing_docs)]

pub mod arena;
pub mod ident;
pub mod logic;
pub mod logic_vec;

pub use arena::{Arena, ArenaId};
pub use ident::{Ident, Interner};
pub use logic::Logic;
pub use logic_vec::LogicVec;
