//! Translation warp field.

pub use super::*;
pub use crate::encode::{
    AnnealedSinusoidalEncoder, GloEncoder, GloEncoderConfig, SinusoidalEncoderConfig,
    TimeEncoder, TimeEncoderConfig,
};
pub use burn::nn::{Linear, Relu};

use crate::preset::render::JACOBIAN_STEP;
use burn::nn::{Initializer, LinearConfig};

/// The configuration for [`TranslationField`].
#[derive(Config, Copy, Debug)]
pub struct TranslationFieldConfig {
    /// Encoding the points with annealed bands.
    #[config(default = "SinusoidalEncoderConfig::new(8)")]
    pub point_encoder: SinusoidalEncoderConfig,
    /// `C`, the width of the precomputed warp codes.
    ///
    /// It is ignored if there is a metadata encoder.
    #[config(default = 8)]
    pub dim_metadata: usize,
    /// Encoding the warp metadata of the rays.
    ///
    /// The precomputed warp codes are used if it is absent.
    pub metadata_encoder: Option<WarpMetadataEncoderConfig>,
    /// The number of hidden layers.
    #[config(default = 6)]
    pub depth: usize,
    /// The width of hidden layers.
    #[config(default = 128)]
    pub width: usize,
    /// The bound of the uniform initialization of the output layer.
    #[config(default = 1e-5)]
    pub output_init_scale: f64,
}

/// The source of the per-ray warp metadata.
#[derive(Config, Copy, Debug)]
pub enum WarpMetadataEncoderConfig {
    /// Latent codes looked up by [`warp_ids`](crate::ray::RayMetadata::warp_ids).
    Glo(GloEncoderConfig),
    /// Latent codes encoded from [`times`](crate::ray::RayMetadata::times).
    Time(TimeEncoderConfig),
}

/// Warping each point by a predicted translation.
///
/// `warped = point + MLP(encode(point, alpha), metadata)`
#[derive(Debug, Module)]
pub struct TranslationField<B: Backend> {
    pub point_encoder: AnnealedSinusoidalEncoder,
    pub warp_encoder: Option<GloEncoder<B>>,
    pub time_encoder: Option<TimeEncoder<B>>,
    pub hidden: Vec<Linear<B>>,
    pub output: Linear<B>,
    pub activation: Relu,
    pub dim_metadata: usize,
}

impl TranslationFieldConfig {
    /// Initialize from the configuration.
    ///
    /// The translations start near zero.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> TranslationField<B> {
        let point_encoder = self.point_encoder.init_annealed();
        let (warp_encoder, time_encoder) = match self.metadata_encoder {
            Some(WarpMetadataEncoderConfig::Glo(config)) => {
                (Some(config.init(device)), None)
            },
            Some(WarpMetadataEncoderConfig::Time(config)) => {
                (None, Some(config.init(device)))
            },
            None => (None, None),
        };
        let dim_metadata = match (&warp_encoder, &time_encoder) {
            (Some(encoder), _) => encoder.dim_output(),
            (_, Some(encoder)) => encoder.dim_output(),
            _ => self.dim_metadata,
        };
        let dim_input = point_encoder.dim_output(3) + dim_metadata;

        let hidden = (0..self.depth)
            .map(|index| {
                let dim_input = if index == 0 { dim_input } else { self.width };
                LinearConfig::new(dim_input, self.width).init(device)
            })
            .collect::<Vec<_>>();
        let dim_hidden = if self.depth == 0 { dim_input } else { self.width };
        let output = LinearConfig::new(dim_hidden, 3)
            .with_initializer(Initializer::Uniform {
                min: -self.output_init_scale,
                max: self.output_init_scale,
            })
            .init(device);

        TranslationField {
            point_encoder,
            warp_encoder,
            time_encoder,
            hidden,
            output,
            activation: Relu::new(),
            dim_metadata,
        }
    }
}

impl<B: Backend> TranslationField<B> {
    /// Predicting the translations of the points.
    ///
    /// ## Shapes
    ///
    /// * `points` - `[M, 3]`
    /// * `metadata` - `[M, C]`
    /// * `output` - `[M, 3]`
    pub fn translate(
        &self,
        points: Tensor<B, 2>,
        metadata: Tensor<B, 2>,
        alpha: f32,
    ) -> Tensor<B, 2> {
        let mut hidden = Tensor::cat(
            vec![self.point_encoder.forward(points, alpha), metadata],
            1,
        );
        for layer in &self.hidden {
            hidden = self.activation.forward(layer.forward(hidden));
        }

        self.output.forward(hidden)
    }

    /// The Jacobian by central differences, indexed by `[M, output, input]`.
    fn jacobian(
        &self,
        points: Tensor<B, 2>,
        metadata: Tensor<B, 2>,
        alpha: f32,
    ) -> Tensor<B, 3> {
        let device = &points.device();
        let step = JACOBIAN_STEP;

        // [M, 3] * 3
        let columns = (0..3)
            .map(|axis| {
                let mut offset = [0.0f32; 3];
                offset[axis] = step;
                let offset = Tensor::<B, 1>::from_data(
                    TensorData::new(offset.to_vec(), [3]),
                    device,
                )
                .unsqueeze::<2>();

                let points_forward = points.to_owned() + offset.to_owned();
                let points_backward = points.to_owned() - offset;
                let warped_forward = points_forward.to_owned()
                    + self.translate(points_forward, metadata.to_owned(), alpha);
                let warped_backward = points_backward.to_owned()
                    + self.translate(points_backward, metadata.to_owned(), alpha);

                (warped_forward - warped_backward).div_scalar(2.0 * step)
            })
            .collect::<Vec<_>>();

        Tensor::stack(columns, 2)
    }
}

impl<B: Backend> WarpField<B> for TranslationField<B> {
    fn warp(
        &self,
        points: Tensor<B, 3>,
        metadata: Tensor<B, 3>,
        params: &WarpParams,
        want_jacobian: bool,
    ) -> WarpOutput<B> {
        // (N, S, C)
        let [ray_count, sample_count, metadata_count] = metadata.dims();
        // M
        let point_count = ray_count * sample_count;

        let points = points.reshape([point_count, 3]);
        let metadata = metadata.reshape([point_count, metadata_count]);

        let translations =
            self.translate(points.to_owned(), metadata.to_owned(), params.alpha);
        let jacobian = want_jacobian.then(|| {
            self.jacobian(points.to_owned(), metadata, params.alpha)
                .reshape([ray_count, sample_count, 3, 3])
        });

        WarpOutput {
            warped_points: (points + translations).reshape([ray_count, sample_count, 3]),
            jacobian,
        }
    }

    /// Encoding the warp ids or the times, or else taking the warp codes.
    fn encode_metadata(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Tensor<B, 2>, Error> {
        let metadata = &rays.metadata;

        if let Some(encoder) = &self.warp_encoder {
            return encoder.lookup(metadata.warp_ids.as_ref(), "warp_ids");
        }

        if let Some(encoder) = &self.time_encoder {
            let times = metadata
                .times
                .to_owned()
                .ok_or_else(|| Error::MissingMetadata("times".into()))?;
            return Ok(encoder.forward(times, None));
        }

        let codes = metadata
            .warp_codes
            .to_owned()
            .ok_or_else(|| Error::MissingMetadata("warp_codes".into()))?;
        let dims = codes.dims();
        let dims_expected = [rays.ray_count(), self.dim_metadata];
        if dims != dims_expected {
            return Err(Error::MismatchedShape(
                "metadata.warp_codes".into(),
                format!("{dims_expected:?}"),
                format!("{dims:?}"),
            ));
        }

        Ok(codes)
    }
}

impl Default for TranslationFieldConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
