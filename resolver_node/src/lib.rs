//! Agent interface resolver.
//!
//! Maps an on-chain agent registration to a servable JSON interface
//! descriptor: the registered contract's `metadataURI()` points into a
//! content store, the referenced metadata names a model archive, and the
//! archive carries the protobuf definition set the agent speaks. Every
//! stage is cached on disk so repeat lookups never leave the node.

pub mod api;
pub mod config;
pub mod registry;
pub mod resolver;
pub mod storage;
