//! Triplet comparator for ranking-loss training
//!
//! Runs one shared embedding net over (anchor, negative, positive) under a
//! single attribute selector and reduces to two per-item similarity scores.
//! The margin ranking loss itself lives in the training loop, not here.

use candle_core::{Tensor, D};

use crate::core::{from_candle_error, UnifiedResult};
use crate::model_architectures::traits::AttributeEmbedding;

/// Wraps one attribute embedding net; the three forward passes share its
/// parameters.
pub struct TripletNet<E: AttributeEmbedding> {
    embeddingnet: E,
}

impl<E: AttributeEmbedding> TripletNet<E> {
    pub fn new(embeddingnet: E) -> Self {
        Self { embeddingnet }
    }

    pub fn embeddingnet(&self) -> &E {
        &self.embeddingnet
    }

    /// Score a triplet batch under one attribute selector.
    ///
    /// Returns `(sim_anchor_negative, sim_anchor_positive)`, each `(batch,)`.
    /// Embeddings are L2-normalized, so both scores are cosine similarities in
    /// `[-1, 1]`; a ranking loss should push the positive score above the
    /// negative one by a margin.
    pub fn compare(
        &self,
        anchor: &Tensor,
        negative: &Tensor,
        positive: &Tensor,
        attributes: &Tensor,
    ) -> UnifiedResult<(Tensor, Tensor)> {
        let embedded_x = self.embeddingnet.embed(anchor, attributes, true)?;
        let embedded_y = self.embeddingnet.embed(negative, attributes, true)?;
        let embedded_z = self.embeddingnet.embed(positive, attributes, true)?;

        let sim_a = dot_rows(&embedded_x, &embedded_y)
            .map_err(|e| from_candle_error(e, "triplet similarity", None))?;
        let sim_b = dot_rows(&embedded_x, &embedded_z)
            .map_err(|e| from_candle_error(e, "triplet similarity", None))?;

        Ok((sim_a, sim_b))
    }
}

/// Per-item dot product of two `(batch, dim)` tensors.
fn dot_rows(a: &Tensor, b: &Tensor) -> candle_core::Result<Tensor> {
    (a * b)?.sum(D::Minus1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_architectures::embedding::test_utils::{
        attribute_ids, test_backbone, test_images, varmap_builder,
    };
    use crate::model_architectures::embedding::{AseNet, AsenConfig};
    use candle_core::Device;

    fn build_net() -> TripletNet<AseNet> {
        let device = Device::Cpu;
        let (_varmap, vb) = varmap_builder(&device);
        let backbone = test_backbone(vb.pp("backbone")).unwrap();
        let config = AsenConfig {
            embedding_size: 1024,
            n_attributes: 3,
        };
        TripletNet::new(AseNet::new(backbone, &config, vb.pp("asen")).unwrap())
    }

    fn triplet_batch(device: &Device) -> (Tensor, Tensor, Tensor) {
        let images = test_images(6, device).unwrap();
        (
            images.narrow(0, 0, 2).unwrap(),
            images.narrow(0, 2, 2).unwrap(),
            images.narrow(0, 4, 2).unwrap(),
        )
    }

    #[test]
    fn test_compare_scores_are_cosine_bounded() {
        let device = Device::Cpu;
        let net = build_net();
        let (anchor, negative, positive) = triplet_batch(&device);
        let attributes = attribute_ids(&[0, 1], &device).unwrap();

        let (sim_a, sim_b) = net.compare(&anchor, &negative, &positive, &attributes).unwrap();
        assert_eq!(sim_a.dims(), &[2]);
        assert_eq!(sim_b.dims(), &[2]);

        for sim in [sim_a, sim_b] {
            for value in sim.to_vec1::<f32>().unwrap() {
                assert!(value >= -1.0 - 1e-5 && value <= 1.0 + 1e-5, "sim={}", value);
            }
        }
    }

    #[test]
    fn test_compare_swaps_with_argument_order() {
        let device = Device::Cpu;
        let net = build_net();
        let (anchor, negative, positive) = triplet_batch(&device);
        let attributes = attribute_ids(&[2, 0], &device).unwrap();

        let (sim_a, sim_b) = net.compare(&anchor, &negative, &positive, &attributes).unwrap();
        let (swapped_a, swapped_b) = net.compare(&anchor, &positive, &negative, &attributes).unwrap();

        assert_eq!(
            sim_a.to_vec1::<f32>().unwrap(),
            swapped_b.to_vec1::<f32>().unwrap()
        );
        assert_eq!(
            sim_b.to_vec1::<f32>().unwrap(),
            swapped_a.to_vec1::<f32>().unwrap()
        );
    }

    #[test]
    fn test_anchor_against_itself_scores_one() {
        let device = Device::Cpu;
        let net = build_net();
        let (anchor, negative, _positive) = triplet_batch(&device);
        let attributes = attribute_ids(&[1, 1], &device).unwrap();

        let (_sim_a, sim_b) = net.compare(&anchor, &negative, &anchor, &attributes).unwrap();
        for value in sim_b.to_vec1::<f32>().unwrap() {
            assert!((value - 1.0).abs() < 1e-5, "self-similarity={}", value);
        }
    }
}
