//! Sinusoidal positional encoding.

pub use super::*;

use std::f32::consts::{FRAC_PI_2, PI};

/// The configuration for [`SinusoidalEncoder`].
#[derive(Config, Copy, Debug, PartialEq)]
pub struct SinusoidalEncoderConfig {
    /// `F`, the number of frequency bands.
    pub num_freqs: usize,
    /// Exponent of the lowest frequency.
    #[config(default = 0.0)]
    pub min_freq_log2: f32,
    /// Exponent of the highest frequency, `F - 1` if absent.
    pub max_freq_log2: Option<f32>,
    /// Scaling the input before encoding.
    #[config(default = 1.0)]
    pub scale: f32,
    /// Prepending the input to the features.
    #[config(default = true)]
    pub use_identity: bool,
}

/// Encoding each channel `x` with `sin(scale * x * 2^b)` and
/// `cos(scale * x * 2^b)` for every band `b`.
///
/// ## Details
///
/// The features are ordered as `[F, 2, C]` per input, after the optional
/// identity.
#[derive(Clone, Copy, Debug, Module)]
pub struct SinusoidalEncoder {
    pub num_freqs: usize,
    pub min_freq_log2: f32,
    pub max_freq_log2: f32,
    pub scale: f32,
    pub use_identity: bool,
}

/// [`SinusoidalEncoder`] easing in its bands one by one.
///
/// The band `j` is weighted by `0.5 * (1 + cos(pi * clip(alpha - j, 0, 1) + pi))`.
#[derive(Clone, Copy, Debug, Module)]
pub struct AnnealedSinusoidalEncoder {
    pub base: SinusoidalEncoder,
}

impl SinusoidalEncoderConfig {
    /// Initialize from the configuration.
    pub fn init(&self) -> SinusoidalEncoder {
        SinusoidalEncoder {
            num_freqs: self.num_freqs,
            min_freq_log2: self.min_freq_log2,
            max_freq_log2: self
                .max_freq_log2
                .unwrap_or(self.num_freqs.saturating_sub(1) as f32),
            scale: self.scale,
            use_identity: self.use_identity,
        }
    }

    /// Initialize the annealed encoder from the configuration.
    pub fn init_annealed(&self) -> AnnealedSinusoidalEncoder {
        AnnealedSinusoidalEncoder { base: self.init() }
    }
}

impl SinusoidalEncoder {
    /// `C * (2 * F + 1)` with identity, otherwise `C * 2 * F`
    pub fn dim_output(
        &self,
        dim_input: usize,
    ) -> usize {
        if self.num_freqs == 0 {
            return dim_input;
        }
        dim_input * (2 * self.num_freqs + self.use_identity as usize)
    }

    /// The exponents of the frequency bands.
    pub fn bands(&self) -> Vec<f32> {
        linspace(self.min_freq_log2, self.max_freq_log2, self.num_freqs)
    }

    /// Applies the encoding on the input tensor.
    ///
    /// ## Shapes
    ///
    /// * `input` - `[M, C]`
    /// * `output` - [`[M, dim_output]`](Self::dim_output)
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        self.forward_windowed(input, None)
    }

    fn forward_windowed<B: Backend>(
        &self,
        input: Tensor<B, 2>,
        window: Option<Vec<f32>>,
    ) -> Tensor<B, 2> {
        // F
        let band_count = self.num_freqs;
        if band_count == 0 {
            return input;
        }

        // (M, C)
        let [count, channel_count] = input.dims();
        let device = &input.device();

        // [1, F, 1]
        let freqs = Tensor::<B, 1>::from_data(
            TensorData::new(
                self.bands().into_iter().map(f32::exp2).collect(),
                [band_count],
            ),
            device,
        )
        .reshape([1, band_count, 1]);

        // [M, F, C]
        let angles = (input
            .to_owned()
            .unsqueeze_dim::<3>(1)
            .expand([count, band_count, channel_count])
            * freqs)
            .mul_scalar(self.scale);

        // [M, F, 2, C]
        let mut features =
            Tensor::stack::<4>(vec![angles.to_owned(), angles.add_scalar(FRAC_PI_2)], 2)
                .sin();
        if let Some(window) = window {
            let window = Tensor::<B, 1>::from_data(
                TensorData::new(window, [band_count]),
                device,
            )
            .reshape([1, band_count, 1, 1]);
            features = features * window;
        }

        // [M, F * 2 * C]
        let features = features.flatten::<2>(1, 3);

        if self.use_identity {
            Tensor::cat(vec![input, features], 1)
        } else {
            features
        }
    }
}

impl AnnealedSinusoidalEncoder {
    /// `0.5 * (1 + cos(pi * clip(alpha - j, 0, 1) + pi))` of every band `j`.
    pub fn window(
        &self,
        alpha: f32,
    ) -> Vec<f32> {
        self.base
            .bands()
            .into_iter()
            .map(|band| {
                let x = (alpha - band).clamp(0.0, 1.0);
                0.5 * (1.0 + (PI * x + PI).cos())
            })
            .collect()
    }

    #[inline]
    pub fn dim_output(
        &self,
        dim_input: usize,
    ) -> usize {
        self.base.dim_output(dim_input)
    }

    /// Applies the annealed encoding on the input tensor.
    ///
    /// `alpha` is usually between `0` and `F`.
    /// All bands are fully eased in with `alpha = F`.
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 2>,
        alpha: f32,
    ) -> Tensor<B, 2> {
        self.base.forward_windowed(input, Some(self.window(alpha)))
    }
}

fn linspace(
    start: f32,
    end: f32,
    count: usize,
) -> Vec<f32> {
    match count {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f32;
            (0..count).map(|index| start + step * index as f32).collect()
        }
    }
}

impl Default for SinusoidalEncoderConfig {
    #[inline]
    fn default() -> Self {
        Self::new(10)
    }
}
