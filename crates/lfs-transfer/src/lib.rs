//! Protocol state machine for the Git LFS SSH transfer protocol.
//!
//! The [`Processor`] owns one packet-line channel and one backend and
//! drives the per-connection exchange: capability greeting, then a
//! dispatch loop reading one command at a time and answering each with
//! exactly one status frame.

#![deny(unsafe_code)]

mod processor;
mod wire;

pub use processor::Processor;
pub use wire::CAPABILITIES;
