//! URL handling module for Sumi-Harvest
//!
//! This module provides the two value types the crawl is built on:
//! - [`Address`]: an absolute http(s) URL compared by its exact serialized form
//! - [`Origin`]: the scheme/host/port triple that bounds a crawl

mod address;
mod origin;

pub use address::Address;
pub use origin::Origin;
