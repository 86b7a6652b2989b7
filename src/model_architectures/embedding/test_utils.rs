//! Shared fixtures for the embedding model tests

use std::sync::Arc;

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder, VarMap};

use crate::model_architectures::traits::Backbone;

use super::{FEATURE_CHANNELS, FEATURE_MAP_SIZE};

/// 1x1-conv projection standing in for a real backbone. Feed it 14x14 test
/// images so the output grid already matches the feature-map contract.
pub(crate) struct ProjectionBackbone {
    proj: Conv2d,
}

impl Backbone for ProjectionBackbone {
    fn forward(&self, images: &Tensor) -> Result<Tensor> {
        self.proj.forward(images)
    }
}

pub(crate) fn varmap_builder(device: &Device) -> (VarMap, VarBuilder<'static>) {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    (varmap, vb)
}

pub(crate) fn test_backbone(vb: VarBuilder) -> Result<Arc<dyn Backbone>> {
    let proj = candle_nn::conv2d(3, FEATURE_CHANNELS, 1, Conv2dConfig::default(), vb.pp("proj"))?;
    Ok(Arc::new(ProjectionBackbone { proj }))
}

/// Deterministic image batch with values spread over [-0.5, 0.5).
pub(crate) fn test_images(batch: usize, device: &Device) -> Result<Tensor> {
    let n = batch * 3 * FEATURE_MAP_SIZE * FEATURE_MAP_SIZE;
    Tensor::arange(0f32, n as f32, device)?
        .affine(1.0 / n as f64, -0.5)?
        .reshape((batch, 3, FEATURE_MAP_SIZE, FEATURE_MAP_SIZE))
}

pub(crate) fn attribute_ids(ids: &[u32], device: &Device) -> Result<Tensor> {
    Tensor::from_vec(ids.to_vec(), ids.len(), device)
}
