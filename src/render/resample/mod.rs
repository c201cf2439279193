//! Importance resampling by inverting the CDF of coarse weights.

pub use burn::tensor::{backend::Backend, Int, Tensor};

use crate::{
    function::{random::random_uniform, tensor_extensions::TensorFloatExtension},
    preset::render::{CDF_BRACKET_EPSILON, PDF_EPSILON},
};

/// Drawing depths from the piecewise-constant distribution of weights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImportanceResampler {
    /// `K`
    pub num_samples: usize,
    /// Using the bin centers `(i + 0.5) / K` as quantiles instead of
    /// random ones.
    ///
    /// These never reach `0` or `1`, so they differ from the endpoint-inclusive
    /// `linspace(0, 1, K)` grid. No depth lands on the outermost bin edges.
    pub deterministic: bool,
}

impl ImportanceResampler {
    /// Drawing `K` depths per ray.
    ///
    /// ## Arguments
    ///
    /// * `z_mids` - `[N, M + 1]`, the bin edges, i.e.,
    ///   the midpoints between consecutive coarse depths.
    /// * `weights` - `[N, M]`, the interior coarse weights of each bin.
    /// * `seed` - Seeding the random quantiles.
    ///
    /// ## Returns
    ///
    /// `[N, K]`, the depths within `[z_mids[0], z_mids[M]]`, not sorted.
    ///
    /// ## Details
    ///
    /// Rays without any weight yield nearly uniform samples.
    pub fn resample<B: Backend>(
        &self,
        z_mids: Tensor<B, 2>,
        weights: Tensor<B, 2>,
        seed: Option<u64>,
    ) -> Tensor<B, 2> {
        // (N, M)
        let [ray_count, bin_count] = weights.dims();
        // K
        let sample_count = self.num_samples;
        let device = &weights.device();

        if sample_count == 0 || ray_count == 0 {
            return Tensor::zeros([ray_count, sample_count], device);
        }

        debug_assert_eq!(
            z_mids.dims(),
            [ray_count, bin_count + 1],
            "z_mids should have one more column than weights",
        );

        // [N, M + 1]
        let cdf = {
            let weights = weights.add_scalar(PDF_EPSILON);
            let pdf = weights.to_owned().div(weights.sum_dim(1));
            let cdf = pdf.sum_cumulative(1).clamp_max(1.0);
            Tensor::cat(vec![Tensor::zeros([ray_count, 1], device), cdf], 1)
        };

        // [N, K]
        let quantiles = if self.deterministic {
            Tensor::<B, 1, Int>::arange(0..sample_count as i64, device)
                .float()
                .add_scalar(0.5)
                .div_scalar(sample_count as f32)
                .unsqueeze::<2>()
                .expand([ray_count, sample_count])
        } else {
            random_uniform([ray_count, sample_count], seed, device)
        };

        // [N, K], the count of CDF values no more than each quantile
        let indexes = {
            let shape = [ray_count, sample_count, bin_count + 1];
            let quantiles =
                quantiles.to_owned().unsqueeze_dim::<3>(2).expand(shape);
            let cdf = cdf.to_owned().unsqueeze_dim::<3>(1).expand(shape);
            quantiles
                .greater_equal(cdf)
                .int()
                .sum_dim(2)
                .reshape([ray_count, sample_count])
        };
        let indexes_below = indexes.to_owned().sub_scalar(1).clamp_min(0);
        let indexes_above = indexes.clamp_max(bin_count as i64);

        // [N, K]
        let cdf_below = cdf.to_owned().gather(1, indexes_below.to_owned());
        let cdf_above = cdf.gather(1, indexes_above.to_owned());
        let z_mids_below = z_mids.to_owned().gather(1, indexes_below);
        let z_mids_above = z_mids.gather(1, indexes_above);

        // [N, K]
        let denominators = {
            let denominators = cdf_above - cdf_below.to_owned();
            let is_flat = denominators.to_owned().lower_elem(CDF_BRACKET_EPSILON);
            denominators.mask_fill(is_flat, 1.0)
        };
        let t_vals = ((quantiles - cdf_below) / denominators).clamp(0.0, 1.0);

        z_mids_below.to_owned() + t_vals * (z_mids_above - z_mids_below)
    }
}
