//! # OpenID Connect Provider
//!
//! Discovery, key sets and the two authenticated provider calls
//! (client-credentials grant and RFC 7662 introspection).
//!
//! ## Caching
//!
//! Two independent policies apply:
//!
//! - The discovery document is memoized per [`ProviderClient`] instance
//! - Discovery and JWKS responses go through a TTL response cache
//!   (default 1 hour) that can be shared between instances
//!
//! Introspection and token requests are never cached. The provider time
//! request bypasses the cache so the `Date` header is fresh.

mod client;
mod metadata;

pub use client::{DISCOVERY_PATH, ProviderClient};
pub use metadata::ProviderMetadata;
