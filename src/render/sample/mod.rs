//! Sampling depths and points along rays.

pub use crate::ray::RayBatch;
pub use burn::tensor::{backend::Backend, Int, Tensor};

use crate::function::random::random_uniform;
use std::fmt;

/// Stratified sampler of depths along rays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaySampler {
    /// `S`
    pub num_samples: usize,
    /// Jittering every sample within its stratum.
    pub stratified: bool,
    /// Spacing the samples linearly in disparity.
    pub inverse_depth: bool,
}

/// Depths and points sampled along rays.
#[derive(Clone)]
pub struct SampleSet<B: Backend> {
    /// Depths, non-decreasing along each ray.
    ///
    /// The shape is `[N, S]`.
    pub z_vals: Tensor<B, 2>,
    /// `origin + direction * depth`
    ///
    /// The shape is `[N, S, 3]`.
    pub points: Tensor<B, 3>,
}

impl RaySampler {
    /// Sampling `S` depths and points along each ray.
    ///
    /// With a seed, the stratified jitter is reproducible.
    pub fn sample<B: Backend>(
        &self,
        rays: &RayBatch<B>,
        seed: Option<u64>,
    ) -> SampleSet<B> {
        let mut z_vals = self.depths(rays);
        if self.stratified {
            z_vals = Self::stratify(z_vals, seed);
        }

        SampleSet::along(rays, z_vals)
    }

    /// Evenly spaced depths between the near and far bounds.
    ///
    /// The shape is `[N, S]`.
    pub fn depths<B: Backend>(
        &self,
        rays: &RayBatch<B>,
    ) -> Tensor<B, 2> {
        // N
        let ray_count = rays.ray_count();
        // S
        let sample_count = self.num_samples;
        let device = &rays.device();

        // [N, S]
        let t_vals = Tensor::<B, 1, Int>::arange(0..sample_count as i64, device)
            .float()
            .div_scalar(sample_count.saturating_sub(1).max(1) as f32)
            .unsqueeze::<2>()
            .expand([ray_count, sample_count]);
        let t_vals_inv = t_vals.to_owned().neg().add_scalar(1.0);

        if self.inverse_depth {
            (rays.nears.to_owned().recip() * t_vals_inv
                + rays.fars.to_owned().recip() * t_vals)
                .recip()
        } else {
            rays.nears.to_owned() * t_vals_inv + rays.fars.to_owned() * t_vals
        }
    }

    /// Jittering every depth uniformly within the interval between
    /// its neighboring midpoints.
    ///
    /// The first and last intervals are bounded by the original depths.
    pub fn stratify<B: Backend>(
        z_vals: Tensor<B, 2>,
        seed: Option<u64>,
    ) -> Tensor<B, 2> {
        let [ray_count, sample_count] = z_vals.dims();
        if sample_count < 2 {
            return z_vals;
        }

        // [N, S - 1]
        let mids = midpoints(z_vals.to_owned());
        // [N, S]
        let uppers = Tensor::cat(
            vec![
                mids.to_owned(),
                z_vals
                    .to_owned()
                    .slice([0..ray_count, sample_count - 1..sample_count]),
            ],
            1,
        );
        let lowers =
            Tensor::cat(vec![z_vals.slice([0..ray_count, 0..1]), mids], 1);
        let t_rand =
            random_uniform([ray_count, sample_count], seed, &lowers.device());

        lowers.to_owned() + (uppers - lowers) * t_rand
    }
}

impl<B: Backend> SampleSet<B> {
    /// Placing the points at the given depths along the rays.
    pub fn along(
        rays: &RayBatch<B>,
        z_vals: Tensor<B, 2>,
    ) -> Self {
        let points = points_along(rays, z_vals.to_owned());
        Self { z_vals, points }
    }

    /// `N`
    #[inline]
    pub fn ray_count(&self) -> usize {
        self.z_vals.dims()[0]
    }

    /// `S`
    #[inline]
    pub fn sample_count(&self) -> usize {
        self.z_vals.dims()[1]
    }
}

/// Midpoints between consecutive depths.
///
/// The shape is `[N, S - 1]`.
pub fn midpoints<B: Backend>(z_vals: Tensor<B, 2>) -> Tensor<B, 2> {
    let [ray_count, sample_count] = z_vals.dims();
    let z_vals_lower = z_vals.to_owned().slice([0..ray_count, 0..sample_count - 1]);
    let z_vals_upper = z_vals.slice([0..ray_count, 1..sample_count]);
    (z_vals_lower + z_vals_upper).mul_scalar(0.5)
}

/// `origin + direction * depth`
///
/// The shape is `[N, S, 3]`.
pub fn points_along<B: Backend>(
    rays: &RayBatch<B>,
    z_vals: Tensor<B, 2>,
) -> Tensor<B, 3> {
    let [ray_count, sample_count] = z_vals.dims();
    let z_vals = z_vals
        .unsqueeze_dim::<3>(2)
        .expand([ray_count, sample_count, 3]);
    let origins = rays.origins.to_owned().unsqueeze_dim::<3>(1);
    let directions = rays.directions.to_owned().unsqueeze_dim::<3>(1);

    z_vals * directions + origins
}

impl<B: Backend> fmt::Debug for SampleSet<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("SampleSet<{}>", B::name()))
            .field("z_vals.dims()", &self.z_vals.dims())
            .field("points.dims()", &self.points.dims())
            .finish()
    }
}
