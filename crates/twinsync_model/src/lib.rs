//! # twinsync model
//!
//! Data types shared by the twinsync engine and its collaborators.
//!
//! This crate provides:
//! - A tagged attribute [`Value`] (number, bool, text, list)
//! - [`EntityId`] and the device-class [`Domain`] parsed from it
//! - Immutable [`EntityState`] snapshots as reported by a state store
//! - [`ActionRequest`], the unit of work sent to an external executor
//! - Well-known attribute keys, state tokens and action names
//!
//! The engine only ever holds copies of [`EntityState`]; the state store that
//! produced them stays the owner of the real device state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod entity;
mod error;
mod value;

pub mod attrs;
pub mod services;
pub mod states;

pub use action::ActionRequest;
pub use entity::{Domain, EntityId, EntityState};
pub use error::{ValueError, ValueResult};
pub use value::Value;
