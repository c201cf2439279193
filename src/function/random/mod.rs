//! Random tensors.
//!
//! A seed selects a host [`StdRng`] stream, which makes the draws
//! reproducible across backends. Without a seed, the backend RNG is used.

use burn::tensor::{backend::Backend, Distribution, Tensor, TensorData};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{StandardNormal, Uniform};

/// Uniform samples in `[0, 1)`.
pub fn random_uniform<B: Backend, const D: usize>(
    shape: [usize; D],
    seed: Option<u64>,
    device: &B::Device,
) -> Tensor<B, D> {
    match seed {
        Some(seed) => {
            let count = shape.iter().product::<usize>();
            let samples = StdRng::seed_from_u64(seed)
                .sample_iter(Uniform::new(0.0f32, 1.0))
                .take(count)
                .collect::<Vec<_>>();
            Tensor::from_data(TensorData::new(samples, shape), device)
        }
        None => Tensor::random(shape, Distribution::Uniform(0.0, 1.0), device),
    }
}

/// Standard normal samples.
pub fn random_normal<B: Backend, const D: usize>(
    shape: [usize; D],
    seed: Option<u64>,
    device: &B::Device,
) -> Tensor<B, D> {
    match seed {
        Some(seed) => {
            let count = shape.iter().product::<usize>();
            let samples = StdRng::seed_from_u64(seed)
                .sample_iter::<f32, _>(StandardNormal)
                .take(count)
                .collect::<Vec<_>>();
            Tensor::from_data(TensorData::new(samples, shape), device)
        }
        None => Tensor::random(shape, Distribution::Normal(0.0, 1.0), device),
    }
}
