//! Closed registry of constructible model kinds
//!
//! Lookup by name is an exhaustive match over a tagged enumeration; an
//! unrecognized key is a typed validation error rather than a panic.

use std::sync::Arc;

use candle_core::Tensor;
use candle_nn::VarBuilder;

use crate::core::{UnifiedError, UnifiedResult};
use crate::model_architectures::traits::{AttributeEmbedding, Backbone};

use super::asenet::AseNet;
use super::asenet_v2::AseNetV2;
use super::config::AsenConfig;

/// The three constructible model kinds, keyed by their registry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Tripletnet,
    AseNet,
    AseNetV2,
}

impl ModelKind {
    /// Resolve a registry key.
    pub fn from_name(name: &str) -> UnifiedResult<Self> {
        match name {
            "Tripletnet" => Ok(Self::Tripletnet),
            "ASENet" => Ok(Self::AseNet),
            "ASENet_V2" => Ok(Self::AseNetV2),
            other => Err(UnifiedError::Validation {
                field: "model".to_string(),
                expected: "one of \"Tripletnet\", \"ASENet\", \"ASENet_V2\"".to_string(),
                actual: other.to_string(),
                context: Some("model registry lookup".to_string()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tripletnet => "Tripletnet",
            Self::AseNet => "ASENet",
            Self::AseNetV2 => "ASENet_V2",
        }
    }
}

/// Tagged union over the two embedding architectures.
///
/// `ModelKind::Tripletnet` names the comparator wrapper, not an embedding
/// net; build one of these and hand it to
/// [`TripletNet::new`](super::triplet::TripletNet::new) instead.
pub enum EmbeddingVariant {
    AseNet(AseNet),
    AseNetV2(AseNetV2),
}

impl EmbeddingVariant {
    pub fn build(
        kind: ModelKind,
        backbone: Arc<dyn Backbone>,
        config: &AsenConfig,
        vb: VarBuilder,
    ) -> UnifiedResult<Self> {
        match kind {
            ModelKind::AseNet => Ok(Self::AseNet(AseNet::new(backbone, config, vb)?)),
            ModelKind::AseNetV2 => Ok(Self::AseNetV2(AseNetV2::new(backbone, config, vb)?)),
            ModelKind::Tripletnet => Err(UnifiedError::Validation {
                field: "model".to_string(),
                expected: "an embedding model kind".to_string(),
                actual: "Tripletnet".to_string(),
                context: Some("wrap an embedding net with TripletNet::new instead".to_string()),
            }),
        }
    }
}

impl AttributeEmbedding for EmbeddingVariant {
    fn embed(
        &self,
        images: &Tensor,
        attributes: &Tensor,
        normalize: bool,
    ) -> UnifiedResult<Tensor> {
        match self {
            Self::AseNet(model) => model.embed(images, attributes, normalize),
            Self::AseNetV2(model) => model.embed(images, attributes, normalize),
        }
    }

    fn get_heatmaps(&self, images: &Tensor, attributes: &Tensor) -> UnifiedResult<Tensor> {
        match self {
            Self::AseNet(model) => model.get_heatmaps(images, attributes),
            Self::AseNetV2(model) => model.get_heatmaps(images, attributes),
        }
    }

    fn embedding_size(&self) -> usize {
        match self {
            Self::AseNet(model) => AttributeEmbedding::embedding_size(model),
            Self::AseNetV2(model) => AttributeEmbedding::embedding_size(model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_architectures::embedding::test_utils::{test_backbone, varmap_builder};
    use candle_core::Device;

    #[test]
    fn test_known_names_resolve() {
        assert_eq!(ModelKind::from_name("Tripletnet").unwrap(), ModelKind::Tripletnet);
        assert_eq!(ModelKind::from_name("ASENet").unwrap(), ModelKind::AseNet);
        assert_eq!(ModelKind::from_name("ASENet_V2").unwrap(), ModelKind::AseNetV2);
    }

    #[test]
    fn test_names_round_trip() {
        for kind in [ModelKind::Tripletnet, ModelKind::AseNet, ModelKind::AseNetV2] {
            assert_eq!(ModelKind::from_name(kind.name()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_name_is_typed_error() {
        match ModelKind::from_name("ASENet_V3") {
            Err(UnifiedError::Validation { field, actual, .. }) => {
                assert_eq!(field, "model");
                assert_eq!(actual, "ASENet_V3");
            }
            other => panic!("unexpected result: {:?}", other.map(|k| k.name())),
        }
    }

    #[test]
    fn test_build_embedding_variants() {
        let device = Device::Cpu;
        let (_varmap, vb) = varmap_builder(&device);
        let backbone = test_backbone(vb.pp("backbone")).unwrap();
        let config = AsenConfig {
            embedding_size: 64,
            n_attributes: 3,
        };

        let v1 = EmbeddingVariant::build(
            ModelKind::AseNet,
            backbone.clone(),
            &config,
            vb.pp("v1"),
        )
        .unwrap();
        assert!(matches!(v1, EmbeddingVariant::AseNet(_)));

        let v2 = EmbeddingVariant::build(
            ModelKind::AseNetV2,
            backbone.clone(),
            &config,
            vb.pp("v2"),
        )
        .unwrap();
        assert!(matches!(v2, EmbeddingVariant::AseNetV2(_)));

        assert!(EmbeddingVariant::build(
            ModelKind::Tripletnet,
            backbone,
            &config,
            vb.pp("triplet"),
        )
        .is_err());
    }
}
