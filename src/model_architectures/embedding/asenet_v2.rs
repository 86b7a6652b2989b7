//! ASENet_V2: learned attribute embedding with scaled dot-product attention
//!
//! The attribute selector indexes a learned 512-wide embedding table instead of
//! being one-hot projected. Spatial attention logits are the per-location dot
//! product between the transformed attribute query and a batch-normalized
//! 1x1-conv projection of the backbone map, scaled by `1/sqrt(512)` before the
//! softmax. As in the first variant, pooling runs over the original
//! 1024-channel backbone map, so the channel gate concatenation is
//! 1024 + 512 = 1536 wide, the declared `fc1` input width.

use std::sync::Arc;

use candle_core::{DType, Device, Module, Result, Tensor, D};
use candle_nn::ops::{sigmoid, softmax};
use candle_nn::{
    BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, Embedding, Linear, ModuleT, VarBuilder,
};
use tracing::{debug, info};

use crate::core::{from_candle_error, UnifiedResult};
use crate::model_architectures::traits::{AttributeEmbedding, Backbone};

use super::config::AsenConfig;
use super::pooling::{attention_pool, l2_normalize, squeeze_singletons};
use super::{ATTN_CHANNELS, FEATURE_CHANNELS, FEATURE_MAP_SIZE};

/// Declared input width of the first channel-gate layer: pooled backbone
/// features (1024) concatenated with the transformed attribute vector (512).
pub const CHANNEL_FC1_IN: usize = 1536;

/// Attribute-specific embedding network, learned-attribute-embedding variant.
pub struct AseNetV2 {
    backbone: Arc<dyn Backbone>,
    attr_embedding: Embedding,
    attr_transform1: Linear,
    attr_transform2: Linear,
    conv1: Conv2d,
    img_bn1: BatchNorm,
    fc1: Linear,
    fc2: Linear,
    feature_fc: Linear,
    embedding_size: usize,
    n_attributes: usize,
    device: Device,
}

impl AseNetV2 {
    pub fn new(
        backbone: Arc<dyn Backbone>,
        config: &AsenConfig,
        vb: VarBuilder,
    ) -> UnifiedResult<Self> {
        config.validate()?;
        let init = |e| from_candle_error(e, "create ASENet_V2 layers", None);

        let attr_embedding =
            candle_nn::embedding(config.n_attributes, ATTN_CHANNELS, vb.pp("attr_embedding"))
                .map_err(init)?;
        let attr_transform1 =
            candle_nn::linear(ATTN_CHANNELS, ATTN_CHANNELS, vb.pp("attr_transform1"))
                .map_err(init)?;
        let attr_transform2 =
            candle_nn::linear(ATTN_CHANNELS, ATTN_CHANNELS, vb.pp("attr_transform2"))
                .map_err(init)?;
        let conv1 = candle_nn::conv2d(
            FEATURE_CHANNELS,
            ATTN_CHANNELS,
            1,
            Conv2dConfig::default(),
            vb.pp("conv1"),
        )
        .map_err(init)?;
        let img_bn1 =
            candle_nn::batch_norm(ATTN_CHANNELS, BatchNormConfig::default(), vb.pp("img_bn1"))
                .map_err(init)?;
        let fc1 = candle_nn::linear(CHANNEL_FC1_IN, ATTN_CHANNELS, vb.pp("fc1")).map_err(init)?;
        let fc2 = candle_nn::linear(ATTN_CHANNELS, FEATURE_CHANNELS, vb.pp("fc2"))
            .map_err(init)?;
        let feature_fc =
            candle_nn::linear(FEATURE_CHANNELS, config.embedding_size, vb.pp("feature_fc"))
                .map_err(init)?;

        debug!(
            "constructed ASENet_V2 (n_attributes={}, embedding_size={})",
            config.n_attributes, config.embedding_size
        );

        Ok(Self {
            backbone,
            attr_embedding,
            attr_transform1,
            attr_transform2,
            conv1,
            img_bn1,
            fc1,
            fc2,
            feature_fc,
            embedding_size: config.embedding_size,
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

        info!("loading ASENet_V2 weights from {}", model_path);

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

    /// Embed an image batch under the selected attributes (eval-mode batch
    /// norm; see [`AseNetV2::embed_t`] for the training path).
    pub fn embed(
        &self,
        images: &Tensor,
        attributes: &Tensor,
        normalize: bool,
    ) -> UnifiedResult<Tensor> {
        self.embed_t(images, attributes, normalize, false)
    }

    /// Embed with an explicit train flag so a training loop can run the
    /// projection batch norm on batch statistics.
    pub fn embed_t(
        &self,
        images: &Tensor,
        attributes: &Tensor,
        normalize: bool,
        train: bool,
    ) -> UnifiedResult<Tensor> {
        self.embed_impl(images, attributes, normalize, train)
            .map_err(|e| from_candle_error(e, "ASENet_V2 embed", None))
    }

    /// Spatial attention masks only, squeezed of singleton dims.
    pub fn get_heatmaps(&self, images: &Tensor, attributes: &Tensor) -> UnifiedResult<Tensor> {
        self.heatmaps_impl(images, attributes)
            .map_err(|e| from_candle_error(e, "ASENet_V2 heatmaps", None))
    }

    fn embed_impl(
        &self,
        images: &Tensor,
        attributes: &Tensor,
        normalize: bool,
        train: bool,
    ) -> Result<Tensor> {
        let features = self.backbone.forward(images)?;

        let attmap = self.spatial_attention(&features, attributes, train)?;
        // Pool the original 1024-channel map; the conv1 projection only feeds
        // the attention logits.
        let pooled = attention_pool(&features, &attmap)?;

        let gate = self.channel_gate(&pooled, attributes)?;
        let embedding = self.feature_fc.forward(&(&pooled * &gate)?)?;

        if normalize {
            l2_normalize(&embedding)
        } else {
            Ok(embedding)
        }
    }

    fn heatmaps_impl(&self, images: &Tensor, attributes: &Tensor) -> Result<Tensor> {
        let features = self.backbone.forward(images)?;
        let attmap = self.spatial_attention(&features, attributes, false)?;
        squeeze_singletons(&attmap)
    }

    /// Scaled dot-product spatial attention, `(batch, 1, 14, 14)` post-softmax.
    fn spatial_attention(
        &self,
        features: &Tensor,
        attributes: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let img = self.conv1.forward(features)?;
        let img = self.img_bn1.forward_t(&img, train)?;
        let img = img.tanh()?;

        let attr = self.attr_embedding.forward(attributes)?;
        let attr = self.attr_transform1.forward(&attr)?.tanh()?;
        let (b, c) = attr.dims2()?;
        let attr = attr.reshape((b, c, 1, 1))?;

        // Dot product per location, scaled by 1/sqrt(512).
        let attmap = img.broadcast_mul(&attr)?.sum_keepdim(1)?;
        let attmap = (attmap / (ATTN_CHANNELS as f64).sqrt())?;
        let attmap = attmap.flatten_from(2)?;
        let attmap = softmax(&attmap, D::Minus1)?;
        attmap.reshape((b, 1, FEATURE_MAP_SIZE, FEATURE_MAP_SIZE))
    }

    /// Sigmoid channel gate conditioned on a second, independent attribute
    /// transform.
    fn channel_gate(&self, pooled: &Tensor, attributes: &Tensor) -> Result<Tensor> {
        let attr = self.attr_embedding.forward(attributes)?;
        let attr = self.attr_transform2.forward(&attr)?.relu()?;
        let gate = Tensor::cat(&[pooled, &attr], 1)?;
        let gate = self.fc1.forward(&gate)?.relu()?;
        let gate = self.fc2.forward(&gate)?;
        sigmoid(&gate)
    }
}

impl AttributeEmbedding for AseNetV2 {
    fn embed(
        &self,
        images: &Tensor,
        attributes: &Tensor,
        normalize: bool,
    ) -> UnifiedResult<Tensor> {
        AseNetV2::embed(self, images, attributes, normalize)
    }

    fn get_heatmaps(&self, images: &Tensor, attributes: &Tensor) -> UnifiedResult<Tensor> {
        AseNetV2::get_heatmaps(self, images, attributes)
    }

    fn embedding_size(&self) -> usize {
        self.embedding_size
    }
}
