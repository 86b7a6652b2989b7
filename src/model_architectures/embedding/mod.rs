//! Attribute-specific embedding models
//!
//! Two attention-embedding variants plus the triplet comparator used for
//! ranking-loss training. Both variants consume the same backbone contract and
//! share the pooling primitives and shape constants below.

pub mod asenet;
pub mod asenet_v2;
pub mod config;
pub mod pooling;
pub mod registry;
pub mod triplet;

#[cfg(test)]
pub(crate) mod test_utils;

/// Channel count of the backbone feature map.
pub const FEATURE_CHANNELS: usize = 1024;
/// Channel count of the projected attention space.
pub const ATTN_CHANNELS: usize = 512;
/// Spatial edge of the backbone feature map.
pub const FEATURE_MAP_SIZE: usize = 14;
/// Flattened spatial locations the attention softmax runs over.
pub const SPATIAL_LOCATIONS: usize = FEATURE_MAP_SIZE * FEATURE_MAP_SIZE;

pub use asenet::AseNet;
pub use asenet_v2::AseNetV2;
pub use config::AsenConfig;
pub use registry::{EmbeddingVariant, ModelKind};
pub use triplet::TripletNet;
