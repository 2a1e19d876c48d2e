//! # teal-primitives
//!
//! Primitive types for the tealsim stack machine.
//!
//! This crate provides the account address type used by `addr` immediates and
//! by the simulated application-call transaction, together with the base32
//! codec its text form is built on.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod base32;

pub use address::{Address, AddressError};
pub use base32::{decode as base32_decode, encode as base32_encode, Base32Error};

/// Application identifier type
pub type AppId = u64;
