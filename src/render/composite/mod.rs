//! Volumetric compositing of raw predictions along rays.

pub use burn::tensor::{backend::Backend, Tensor};

use crate::{
    function::{random::random_normal, tensor_extensions::TensorFloatExtension},
    preset::render::*,
};
use burn::tensor::activation;
use std::fmt;

/// Emission-absorption compositor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VolumetricCompositor {
    /// Standard deviation of the noise added to raw densities.
    pub raw_noise_std: f32,
    /// Compositing the residual transmittance against white.
    pub white_background: bool,
}

/// Integrated values of each ray.
#[derive(Clone)]
pub struct CompositeOutput<B: Backend> {
    /// The shape is `[N, 3]`.
    pub rgb: Tensor<B, 2>,
    /// `1 / depth`
    ///
    /// The shape is `[N]`.
    pub disparity: Tensor<B, 1>,
    /// Sum of weights.
    ///
    /// The shape is `[N]`.
    pub accumulated_opacity: Tensor<B, 1>,
    /// Weighted sum of depths.
    ///
    /// The shape is `[N]`.
    pub depth: Tensor<B, 1>,
    /// `alpha * transmittance` of every sample.
    ///
    /// The shape is `[N, S]`.
    pub weights: Tensor<B, 2>,
}

impl VolumetricCompositor {
    /// Compositing raw predictions into ray colors.
    ///
    /// ## Arguments
    ///
    /// * `raw` - `[N, S, 4]`, the raw colors (3) and raw densities (1).
    /// * `z_vals` - `[N, S]`, ascending along each ray.
    /// * `directions` - `[N, 3]`, the ray directions.
    /// * `seed` - Seeding the density noise for reproducibility.
    ///
    /// ## Details
    ///
    /// Degenerate rays never fail here. Their outputs are finite whenever
    /// the inputs are finite.
    pub fn composite<B: Backend>(
        &self,
        raw: Tensor<B, 3>,
        z_vals: Tensor<B, 2>,
        directions: Tensor<B, 2>,
        seed: Option<u64>,
    ) -> CompositeOutput<B> {
        let [ray_count, sample_count, _] = raw.dims();
        let device = &raw.device();

        if ray_count == 0 {
            return CompositeOutput {
                rgb: Tensor::zeros([0, 3], device),
                disparity: Tensor::zeros([0], device),
                accumulated_opacity: Tensor::zeros([0], device),
                depth: Tensor::zeros([0], device),
                weights: Tensor::zeros([0, sample_count], device),
            };
        }

        // [N, S]
        let distances = {
            let sentinels =
                Tensor::full([ray_count, 1], DISTANCE_SENTINEL, device);
            let distances = if sample_count > 1 {
                let z_vals_lower = z_vals
                    .to_owned()
                    .slice([0..ray_count, 0..sample_count - 1]);
                let z_vals_upper =
                    z_vals.to_owned().slice([0..ray_count, 1..sample_count]);
                Tensor::cat(vec![z_vals_upper - z_vals_lower, sentinels], 1)
            } else {
                sentinels
            };
            // [N, 1]
            let direction_norms = directions.powf_scalar(2.0).sum_dim(1).sqrt();
            distances * direction_norms
        };

        // [N, S, 3]
        let colors = activation::sigmoid(
            raw.to_owned().slice([0..ray_count, 0..sample_count, 0..3]),
        );

        // [N, S]
        let mut densities = raw
            .slice([0..ray_count, 0..sample_count, 3..4])
            .reshape([ray_count, sample_count]);
        if self.raw_noise_std > 0.0 {
            densities = densities
                + random_normal([ray_count, sample_count], seed, device)
                    .mul_scalar(self.raw_noise_std);
        }

        // [N, S]
        let alphas = (activation::relu(densities).neg() * distances)
            .exp()
            .neg()
            .add_scalar(1.0);

        // [N, S]
        let transmittances = alphas
            .to_owned()
            .neg()
            .add_scalar(1.0)
            .add_scalar(TRANSMITTANCE_EPSILON)
            .prod_cumulative_exclusive(1);

        // [N, S]
        let weights = alphas * transmittances;

        // [N, 3]
        let mut rgb = (weights.to_owned().unsqueeze_dim::<3>(2) * colors)
            .sum_dim(1)
            .reshape([ray_count, 3]);
        // [N, 1]
        let depth = (weights.to_owned() * z_vals).sum_dim(1);
        // [N, 1]
        let accumulated_opacity = weights.to_owned().sum_dim(1);
        // [N, 1]
        let disparity = depth
            .to_owned()
            .div(accumulated_opacity.to_owned().clamp_min(DISPARITY_EPSILON))
            .clamp_min(DISPARITY_EPSILON)
            .recip();

        if self.white_background {
            rgb = rgb + accumulated_opacity.to_owned().neg().add_scalar(1.0);
        }

        CompositeOutput {
            rgb,
            disparity: disparity.squeeze(1),
            accumulated_opacity: accumulated_opacity.squeeze(1),
            depth: depth.squeeze(1),
            weights,
        }
    }
}

impl<B: Backend> fmt::Debug for CompositeOutput<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("CompositeOutput<{}>", B::name()))
            .field("rgb.dims()", &self.rgb.dims())
            .field("disparity.dims()", &self.disparity.dims())
            .field(
                "accumulated_opacity.dims()",
                &self.accumulated_opacity.dims(),
            )
            .field("depth.dims()", &self.depth.dims())
            .field("weights.dims()", &self.weights.dims())
            .finish()
    }
}
