//! Deformations from scene-time points to canonical points.

pub mod translation;

pub use crate::{error::Error, ray::RayBatch};
pub use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Tensor, TensorData},
};
pub use translation::{
    TranslationField, TranslationFieldConfig, WarpMetadataEncoderConfig,
};

/// A field deforming sample points.
pub trait WarpField<B: Backend> {
    /// Warping the points under the per-sample metadata.
    ///
    /// ## Shapes
    ///
    /// * `points` - `[N, S, 3]`
    /// * `metadata` - `[N, S, C]`
    fn warp(
        &self,
        points: Tensor<B, 3>,
        metadata: Tensor<B, 3>,
        params: &WarpParams,
        want_jacobian: bool,
    ) -> WarpOutput<B>;

    /// The per-ray warp metadata of the rays.
    ///
    /// It defaults to the precomputed
    /// [`warp_codes`](crate::ray::RayMetadata::warp_codes).
    ///
    /// ## Errors
    ///
    /// * [`Error::MissingMetadata`] if the metadata needed is absent.
    ///
    /// ## Shapes
    ///
    /// * `output` - `[N, C]`
    fn encode_metadata(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Tensor<B, 2>, Error> {
        rays.metadata
            .warp_codes
            .to_owned()
            .ok_or_else(|| Error::MissingMetadata("warp_codes".into()))
    }
}

/// Parameters of a warp call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WarpParams {
    /// The annealing progress of the positional encoding.
    pub alpha: f32,
}

/// The output of [`WarpField::warp`].
#[derive(Clone, Debug)]
pub struct WarpOutput<B: Backend> {
    /// The shape is `[N, S, 3]`.
    pub warped_points: Tensor<B, 3>,
    /// `d warped / d points`, indexed by `[.., output axis, input axis]`.
    ///
    /// The shape is `[N, S, 3, 3]`.
    pub jacobian: Option<Tensor<B, 4>>,
}

/// The no-op warp.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IdentityWarp;

impl<B: Backend> WarpField<B> for IdentityWarp {
    fn warp(
        &self,
        points: Tensor<B, 3>,
        _metadata: Tensor<B, 3>,
        _params: &WarpParams,
        want_jacobian: bool,
    ) -> WarpOutput<B> {
        let [ray_count, sample_count, _] = points.dims();
        let jacobian = want_jacobian.then(|| {
            Tensor::<B, 2>::from_data(
                TensorData::new(vec![1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0], [3, 3]),
                &points.device(),
            )
            .reshape([1, 1, 3, 3])
            .expand([ray_count, sample_count, 3, 3])
        });

        WarpOutput {
            warped_points: points,
            jacobian,
        }
    }

    /// No metadata is needed.
    fn encode_metadata(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Tensor<B, 2>, Error> {
        Ok(Tensor::zeros([rays.ray_count(), 0], &rays.device()))
    }
}

impl<B: Backend, W: WarpField<B> + ?Sized> WarpField<B> for &W {
    #[inline]
    fn warp(
        &self,
        points: Tensor<B, 3>,
        metadata: Tensor<B, 3>,
        params: &WarpParams,
        want_jacobian: bool,
    ) -> WarpOutput<B> {
        (**self).warp(points, metadata, params, want_jacobian)
    }

    #[inline]
    fn encode_metadata(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Tensor<B, 2>, Error> {
        (**self).encode_metadata(rays)
    }
}

impl Default for WarpParams {
    /// Every encoding band is eased in.
    #[inline]
    fn default() -> Self {
        Self {
            alpha: f32::INFINITY,
        }
    }
}
