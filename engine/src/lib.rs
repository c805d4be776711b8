//! Protocol and state-machine core of the NAND programmer command engine.
//!
//! This crate has no knowledge of any particular microcontroller, bus, or
//! transport; it is driven entirely through the collaborator traits in
//! [`transport`], [`nand`], [`badblock`], and [`chip`]. A firmware binary
//! wires real peripherals to those traits and calls [`engine::Engine::tick`]
//! from its main loop.
#![cfg_attr(not(test), no_std)]

pub mod badblock;
pub mod chip;
pub mod engine;
pub mod erase;
pub mod error;
pub mod geometry;
pub mod nand;
pub mod read;
pub mod transport;
pub mod wire;
pub mod write;

pub use engine::Engine;
pub use error::{ErrorCode, HandlerError, HandlerResult};
