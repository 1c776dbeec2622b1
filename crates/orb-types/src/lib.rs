//! Foundation types for the Orb object runtime.
//!
//! This crate provides the identity and value primitives every other Orb
//! crate depends on.
//!
//! # Key Types
//!
//! - [`Oid`] — 96-bit object identifier with a fixed-width base-62
//!   canonical form, rejection-sampled generation, hashing, and bucket
//!   sharding
//! - [`Value`] — the closed runtime value model (scalars plus object
//!   references), convertible to and from persisted JSON
//! - [`SpaceId`] — persistence partition identifier (never part of an
//!   object's identity)

pub mod error;
pub mod oid;
pub mod space;
pub mod value;

pub use error::{OidParseError, ValueFromJsonError};
pub use oid::Oid;
pub use space::SpaceId;
pub use value::Value;
