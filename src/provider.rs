//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the authorization
//! and token endpoints, client authentication preferences, and provider quirks (scope
//! delimiter, extra authorization parameters). `client_secret` loads a descriptor together with
//! the client credentials from a Google-style client secret file. `strategy` defines
//! [`ProviderStrategy`], which maps token endpoint failures into the broker error taxonomy.

pub mod client_secret;
pub mod descriptor;
pub mod strategy;

pub use client_secret::*;
pub use descriptor::*;
pub use strategy::*;
