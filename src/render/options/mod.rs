//! Render options.

pub use crate::error::Error;
pub use burn::config::Config;

use crate::preset::render::CHUNK_SIZE_DEFAULT;

/// Options of the coarse-to-fine volumetric rendering.
#[derive(Config, Debug, PartialEq)]
pub struct RenderOptions {
    /// Samples per ray of the coarse pass.
    #[config(default = 64)]
    pub num_coarse_samples: usize,
    /// Importance samples per ray of the fine pass.
    ///
    /// `0` disables the fine pass.
    #[config(default = 128)]
    pub num_fine_samples: usize,
    /// Jittering the coarse samples within their strata.
    ///
    /// Without it, the quantiles of importance sampling are evenly spaced.
    #[config(default = true)]
    pub stratified: bool,
    /// Sampling linearly in disparity rather than in depth.
    #[config(default = false)]
    pub inverse_depth: bool,
    /// Standard deviation of the noise added to raw densities.
    #[config(default = 0.0)]
    pub raw_noise_std: f32,
    /// Compositing against a white backdrop.
    #[config(default = false)]
    pub white_background: bool,
    /// Reproducible rendering.
    ///
    /// The quantiles of importance sampling are evenly spaced, and
    /// every random draw comes from a host RNG seeded by [`Self::seed`].
    #[config(default = false)]
    pub deterministic: bool,
    /// Seed of the random draws when [`Self::deterministic`] is set.
    #[config(default = 0)]
    pub seed: u64,
    /// Maximum number of flattened samples per scene function call.
    #[config(default = "CHUNK_SIZE_DEFAULT")]
    pub chunk_size: usize,
    #[config(default = false)]
    pub return_points: bool,
    #[config(default = false)]
    pub return_raw: bool,
    #[config(default = false)]
    pub return_warp_jacobian: bool,
    #[config(default = false)]
    pub return_weights: bool,
}

impl RenderOptions {
    /// The options for evaluation, without any jitter or noise.
    pub fn for_evaluation(&self) -> Self {
        self.to_owned()
            .with_stratified(false)
            .with_raw_noise_std(0.0)
            .with_deterministic(true)
    }

    /// The seed of a draw site, if the rendering is deterministic.
    #[inline]
    pub fn seed_of(
        &self,
        stream: u64,
    ) -> Option<u64> {
        self.deterministic.then(|| self.seed.wrapping_add(stream))
    }

    /// `true` if the fine pass runs.
    #[inline]
    pub fn is_fine_enabled(&self) -> bool {
        self.num_fine_samples > 0
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.num_coarse_samples == 0 {
            return Err(Error::Validation(
                "num_coarse_samples".into(),
                "positive".into(),
            ));
        }
        if self.is_fine_enabled() && self.num_coarse_samples < 3 {
            return Err(Error::Validation(
                "num_coarse_samples".into(),
                format!(
                    "at least 3 for {} fine samples, but got {}",
                    self.num_fine_samples, self.num_coarse_samples
                ),
            ));
        }
        if self.chunk_size == 0 {
            return Err(Error::Validation("chunk_size".into(), "positive".into()));
        }
        if !self.raw_noise_std.is_finite() || self.raw_noise_std < 0.0 {
            return Err(Error::Validation(
                "raw_noise_std".into(),
                format!("finite and non-negative, but got {}", self.raw_noise_std),
            ));
        }

        Ok(())
    }
}

impl Default for RenderOptions {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
