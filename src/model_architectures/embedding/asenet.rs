//! ASENet: one-hot conditioned attribute-specific embedding
//!
//! The attribute selector is one-hot encoded and projected twice with
//! independent weights: once into the 512-wide spatial-attention space, once
//! into the 1024-wide channel-gate space. Spatial attention is computed on a
//! tanh-bounded 1x1-conv projection of the backbone map, but the pooling runs
//! over the original 1024-channel map.
//!
//! Parameter names (`conv1`, `mask_fc1`, `fc1`, `feature_fc`, ...) mirror the
//! reference state dict so converted checkpoints load without remapping.

use std::sync::Arc;

use candle_core::{DType, Device, Module, Result, Tensor, D};
use candle_nn::encoding::one_hot;
use candle_nn::ops::{sigmoid, softmax};
use candle_nn::{Conv2d, Conv2dConfig, Linear, VarBuilder};
use tracing::{debug, info};

use crate::core::{from_candle_error, UnifiedResult};
use crate::model_architectures::traits::{AttributeEmbedding, Backbone};

use super::config::AsenConfig;
use super::pooling::{attention_pool, l2_normalize, squeeze_singletons};
use super::{ATTN_CHANNELS, FEATURE_CHANNELS, FEATURE_MAP_SIZE};

/// Attribute-specific embedding network, one-hot conditioning variant.
pub struct AseNet {
    backbone: Arc<dyn Backbone>,
    mask_fc1: Linear,
    mask_fc2: Linear,
    fc1: Linear,
    fc2: Linear,
    feature_fc: Linear,
    conv1: Conv2d,
    conv2: Conv2d,
    n_attributes: usize,
    device: Device,
}

impl AseNet {
    /// Build a fresh model over `vb` (typically `VarMap`-backed for training,
    /// or safetensors-backed through [`AseNet::load`]).
    pub fn new(
        backbone: Arc<dyn Backbone>,
        config: &AsenConfig,
        vb: VarBuilder,
    ) -> UnifiedResult<Self> {
        config.validate()?;
        let init = |e| from_candle_error(e, "create ASENet layers", None);

        let mask_fc1 =
            candle_nn::linear_no_bias(config.n_attributes, ATTN_CHANNELS, vb.pp("mask_fc1"))
                .map_err(init)?;
        let mask_fc2 =
            candle_nn::linear_no_bias(config.n_attributes, FEATURE_CHANNELS, vb.pp("mask_fc2"))
                .map_err(init)?;
        let fc1 = candle_nn::linear(2 * FEATURE_CHANNELS, ATTN_CHANNELS, vb.pp("fc1"))
            .map_err(init)?;
        let fc2 = candle_nn::linear(ATTN_CHANNELS, FEATURE_CHANNELS, vb.pp("fc2"))
            .map_err(init)?;
        // Fixed 1024-wide output, matching the reference weights; the
        // embedding_size parameter only drives the V2 projection.
        let feature_fc = candle_nn::linear(FEATURE_CHANNELS, FEATURE_CHANNELS, vb.pp("feature_fc"))
            .map_err(init)?;
        let conv1 = candle_nn::conv2d(
            FEATURE_CHANNELS,
            ATTN_CHANNELS,
            1,
            Conv2dConfig::default(),
            vb.pp("conv1"),
        )
        .map_err(init)?;
        let conv2 = candle_nn::conv2d(ATTN_CHANNELS, 1, 1, Conv2dConfig::default(), vb.pp("conv2"))
            .map_err(init)?;

        debug!(
            "constructed ASENet (n_attributes={}, embedding width={})",
            config.n_attributes, FEATURE_CHANNELS
        );

        Ok(Self {
            backbone,
            mask_fc1,
            mask_fc2,
            fc1,
            fc2,
            feature_fc,
            conv1,
            conv2,
            n_attributes: config.n_attributes,
            device: vb.device().clone(),
        })
    }

    /// Load weights from `<model_path>/model.safetensors`.
    pub fn load(
        model_path: &str,
        backbone: Arc<dyn Backbone>,
        config: &AsenConfig,
        device: &Device,
    ) -> UnifiedResult<Self> {
        let safetensors_path = format!("{}/model.safetensors", model_path);
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[safetensors_path.clone()], DType::F32, device)
                .map_err(|e| {
                    from_candle_error(
                        e,
                        &format!("failed to load safetensors from {}", safetensors_path),
                        Some(model_path),
                    )
                })?
        };

        info!("loading ASENet weights from {}", model_path);

        // Try loading with different prefixes
        Self::new(backbone.clone(), config, vb.clone())
            .or_else(|_| Self::new(backbone.clone(), config, vb.pp("model")))
            .or_else(|_| Self::new(backbone, config, vb.pp("_orig_mod")))
    }

    pub fn n_attributes(&self) -> usize {
        self.n_attributes
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Embed an image batch under the selected attributes.
    pub fn embed(
        &self,
        images: &Tensor,
        attributes: &Tensor,
        normalize: bool,
    ) -> UnifiedResult<Tensor> {
        self.embed_impl(images, attributes, normalize)
            .map_err(|e| from_candle_error(e, "ASENet embed", None))
    }

    /// Spatial attention masks only, squeezed of singleton dims.
    pub fn get_heatmaps(&self, images: &Tensor, attributes: &Tensor) -> UnifiedResult<Tensor> {
        self.heatmaps_impl(images, attributes)
            .map_err(|e| from_candle_error(e, "ASENet heatmaps", None))
    }

    fn embed_impl(&self, images: &Tensor, attributes: &Tensor, normalize: bool) -> Result<Tensor> {
        let features = self.backbone.forward(images)?;
        let onehot = self.one_hot_attributes(attributes)?;

        let attmap = self.spatial_attention(&features, &onehot)?;
        // Pool the original 1024-channel map, not the conv1 projection.
        let pooled = attention_pool(&features, &attmap)?;

        let gate = self.channel_gate(&pooled, &onehot)?;
        let embedding = self.feature_fc.forward(&(&pooled * &gate)?)?;

        if normalize {
            l2_normalize(&embedding)
        } else {
            Ok(embedding)
        }
    }

    fn heatmaps_impl(&self, images: &Tensor, attributes: &Tensor) -> Result<Tensor> {
        let features = self.backbone.forward(images)?;
        let onehot = self.one_hot_attributes(attributes)?;
        let attmap = self.spatial_attention(&features, &onehot)?;
        squeeze_singletons(&attmap)
    }

    /// One-hot encode the `(batch,)` selector on the construction device.
    fn one_hot_attributes(&self, attributes: &Tensor) -> Result<Tensor> {
        let onehot = one_hot(attributes.clone(), self.n_attributes, 1f32, 0f32)?;
        onehot.to_device(&self.device)
    }

    /// Post-softmax `(batch, 1, 14, 14)` attention mask.
    fn spatial_attention(&self, features: &Tensor, onehot: &Tensor) -> Result<Tensor> {
        let img_embedding = self.conv1.forward(features)?.tanh()?;

        let mask = self.mask_fc1.forward(onehot)?.tanh()?;
        let (b, c) = mask.dims2()?;
        let mask = mask.reshape((b, c, 1, 1))?;

        let attmap = img_embedding.broadcast_mul(&mask)?;
        let attmap = self.conv2.forward(&attmap)?.tanh()?;
        let attmap = attmap.flatten_from(2)?;
        let attmap = softmax(&attmap, D::Minus1)?;
        attmap.reshape((b, 1, FEATURE_MAP_SIZE, FEATURE_MAP_SIZE))
    }

    /// Sigmoid channel gate over the pooled feature vector.
    fn channel_gate(&self, pooled: &Tensor, onehot: &Tensor) -> Result<Tensor> {
        let mask = self.mask_fc2.forward(onehot)?.relu()?;
        let gate = Tensor::cat(&[pooled, &mask], 1)?;
        let gate = self.fc1.forward(&gate)?.relu()?;
        let gate = self.fc2.forward(&gate)?;
        sigmoid(&gate)
    }
}

impl AttributeEmbedding for AseNet {
    fn embed(
        &self,
        images: &Tensor,
        attributes: &Tensor,
        normalize: bool,
    ) -> UnifiedResult<Tensor> {
        AseNet::embed(self, images, attributes, normalize)
    }

    fn get_heatmaps(&self, images: &Tensor, attributes: &Tensor) -> UnifiedResult<Tensor> {
        AseNet::get_heatmaps(self, images, attributes)
    }

    fn embedding_size(&self) -> usize {
        FEATURE_CHANNELS
    }
}
