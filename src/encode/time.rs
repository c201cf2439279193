//! Time encoding.

pub use super::*;
pub use burn::nn::{Linear, Relu};

use burn::nn::{Initializer, LinearConfig};

/// The configuration for [`TimeEncoder`].
#[derive(Config, Copy, Debug)]
pub struct TimeEncoderConfig {
    /// Encoding the times with annealed bands.
    #[config(default = "SinusoidalEncoderConfig::new(8)")]
    pub time_encoder: SinusoidalEncoderConfig,
    /// The number of hidden layers.
    #[config(default = 1)]
    pub depth: usize,
    /// The width of hidden layers.
    #[config(default = 64)]
    pub width: usize,
    /// `D`
    #[config(default = 8)]
    pub dim_output: usize,
}

/// Mapping scalar times to latent codes.
///
/// `MLP(encode(time, alpha))`
#[derive(Debug, Module)]
pub struct TimeEncoder<B: Backend> {
    pub time_encoder: AnnealedSinusoidalEncoder,
    pub hidden: Vec<Linear<B>>,
    pub output: Linear<B>,
    pub activation: Relu,
}

impl TimeEncoderConfig {
    /// Initialize from the configuration.
    ///
    /// The output layer starts near zero.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> TimeEncoder<B> {
        let time_encoder = self.time_encoder.init_annealed();
        let dim_input = time_encoder.dim_output(1);

        let hidden = (0..self.depth)
            .map(|index| {
                let dim_input = if index == 0 { dim_input } else { self.width };
                LinearConfig::new(dim_input, self.width).init(device)
            })
            .collect::<Vec<_>>();
        let dim_hidden = if self.depth == 0 { dim_input } else { self.width };
        let output = LinearConfig::new(dim_hidden, self.dim_output)
            .with_initializer(Initializer::Uniform {
                min: 0.0,
                max: 0.05,
            })
            .init(device);

        TimeEncoder {
            time_encoder,
            hidden,
            output,
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> TimeEncoder<B> {
    /// `D`
    #[inline]
    pub fn dim_output(&self) -> usize {
        self.output.weight.dims()[1]
    }

    /// Encoding the times.
    ///
    /// Every band is eased in if `alpha` is absent.
    ///
    /// ## Shapes
    ///
    /// * `times` - `[N, 1]`
    /// * `output` - `[N, D]`
    pub fn forward(
        &self,
        times: Tensor<B, 2>,
        alpha: Option<f32>,
    ) -> Tensor<B, 2> {
        let alpha = alpha.unwrap_or(self.time_encoder.base.num_freqs as f32);

        let mut hidden = self.time_encoder.forward(times, alpha);
        for layer in &self.hidden {
            hidden = self.activation.forward(layer.forward(hidden));
        }

        self.output.forward(hidden)
    }
}

impl Default for TimeEncoderConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
