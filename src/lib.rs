//! Attribute-Specific Embedding Networks (ASEN) for Candle
//!
//! This library defines attribute-conditioned visual similarity models: given an
//! image batch and a selected attribute (e.g. "color", "category"), they produce
//! embedding vectors whose distances reflect similarity with respect to that
//! attribute alone.
//!
//! ## Models
//! - **ASENet**: one-hot attribute conditioning; spatial attention over the
//!   backbone feature map followed by a sigmoid channel gate.
//! - **ASENet_V2**: learned attribute embedding with scaled dot-product spatial
//!   attention.
//! - **Tripletnet**: wraps one embedding net and scores (anchor, negative,
//!   positive) triplets for margin ranking losses.
//!
//! The convolutional backbone is pluggable behind the [`Backbone`] trait; any
//! feature extractor producing a `(batch, 1024, 14, 14)` map works. Training,
//! data loading and checkpoint writing live outside this crate.

pub mod core;
pub mod model_architectures;

pub use crate::core::unified_error::{UnifiedError, UnifiedResult};

pub use crate::model_architectures::embedding::{
    AseNet, AseNetV2, AsenConfig, EmbeddingVariant, ModelKind, TripletNet,
};
pub use crate::model_architectures::traits::{AttributeEmbedding, Backbone};
