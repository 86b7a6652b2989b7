//! Pooling primitives shared by the embedding variants

use candle_core::{Result, Tensor, D};

/// L2-normalize the rows of a `(N, D)` tensor.
///
/// No epsilon guard: an all-zero row divides by zero and yields non-finite
/// values, which propagate downstream instead of being raised.
pub fn l2_normalize(x: &Tensor) -> Result<Tensor> {
    let norm = x.sqr()?.sum_keepdim(1)?.sqrt()?;
    x.broadcast_div(&norm)
}

/// Attention-weighted spatial pooling.
///
/// `features (B, C, H, W)` weighted by `mask (B, 1, H, W)` and summed over the
/// grid to `(B, C)`. The mask is a post-softmax distribution, so the sum needs
/// no renormalization.
pub fn attention_pool(features: &Tensor, mask: &Tensor) -> Result<Tensor> {
    features.broadcast_mul(mask)?.flatten_from(2)?.sum(D::Minus1)
}

/// Remove every singleton dimension, mirroring `squeeze()` semantics of the
/// reference weights' framework.
pub(crate) fn squeeze_singletons(t: &Tensor) -> Result<Tensor> {
    let mut t = t.clone();
    while let Some(i) = t.dims().iter().position(|&d| d == 1) {
        t = t.squeeze(i)?;
    }
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    #[test]
    fn test_l2_normalize() {
        let device = Device::Cpu;
        let embeddings =
            Tensor::from_vec(vec![1.0f32, 0.0, 0.0, 3.0, 4.0, 0.0], (2, 3), &device).unwrap();
        let normalized = l2_normalize(&embeddings).unwrap();
        let rows: Vec<Vec<f32>> = normalized.to_vec2().unwrap();

        // First row: [1, 0, 0] -> [1, 0, 0]
        assert!((rows[0][0] - 1.0).abs() < 1e-6);

        // Second row: [3, 4, 0] -> [0.6, 0.8, 0]
        assert!((rows[1][0] - 0.6).abs() < 1e-6);
        assert!((rows[1][1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_uniform_mask_is_mean_pooling() {
        let device = Device::Cpu;
        let features = Tensor::arange(0f32, 2.0 * 3.0 * 4.0, &device)
            .unwrap()
            .reshape((1, 2, 3, 4))
            .unwrap();
        let mask = Tensor::full(1.0f32 / 12.0, (1, 1, 3, 4), &device).unwrap();

        let pooled: Vec<Vec<f32>> = attention_pool(&features, &mask)
            .unwrap()
            .to_vec2()
            .unwrap();

        // Mean of 0..12 is 5.5; of 12..24 is 17.5.
        assert!((pooled[0][0] - 5.5).abs() < 1e-5);
        assert!((pooled[0][1] - 17.5).abs() < 1e-5);
    }

    #[test]
    fn test_squeeze_singletons() {
        let device = Device::Cpu;
        let t = Tensor::zeros((2, 1, 14, 14), candle_core::DType::F32, &device).unwrap();
        assert_eq!(squeeze_singletons(&t).unwrap().dims(), &[2, 14, 14]);

        let t = Tensor::zeros((1, 1, 14, 14), candle_core::DType::F32, &device).unwrap();
        assert_eq!(squeeze_singletons(&t).unwrap().dims(), &[14, 14]);
    }
}
