//! Shared contracts between the embedding models and their collaborators

use candle_core::Tensor;

use crate::core::UnifiedResult;

/// Opaque convolutional feature extractor.
///
/// Maps an image batch `(batch, 3, H, W)` to a spatial feature map
/// `(batch, 1024, 14, 14)`. Any implementor honoring that shape contract is
/// pluggable; a wrong output shape faults at the first shape-dependent op of
/// the attention head.
pub trait Backbone: Send + Sync {
    fn forward(&self, images: &Tensor) -> candle_core::Result<Tensor>;
}

/// Attribute-conditioned embedding model.
///
/// `attributes` is a `(batch,)` integer tensor selecting, per item, the
/// attribute along which similarity is measured. Values must lie in
/// `[0, n_attributes)`; out-of-range values surface as the framework's index
/// error.
pub trait AttributeEmbedding {
    /// Embed an image batch under the selected attributes.
    ///
    /// With `normalize` the rows of the result have unit Euclidean norm.
    fn embed(&self, images: &Tensor, attributes: &Tensor, normalize: bool)
        -> UnifiedResult<Tensor>;

    /// Post-softmax spatial attention masks, for visualization.
    ///
    /// All singleton dims are squeezed: `(batch, 14, 14)` for batch > 1,
    /// `(14, 14)` for a single-item batch.
    fn get_heatmaps(&self, images: &Tensor, attributes: &Tensor) -> UnifiedResult<Tensor>;

    /// Width of the returned embedding vectors.
    fn embedding_size(&self) -> usize;
}
