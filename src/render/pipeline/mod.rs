//! Coarse-to-fine rendering pipeline.

pub use crate::{
    condition::{Conditioning, Conditions},
    error::Error,
    ray::RayBatch,
    render::{
        composite::{CompositeOutput, VolumetricCompositor},
        diagnostic::{Diagnostics, RenderPass},
        options::RenderOptions,
        resample::ImportanceResampler,
        sample::{midpoints, RaySampler, SampleSet},
    },
    scene::{SceneEvaluator, SceneFunction},
    warp::{IdentityWarp, WarpField, WarpParams},
};
pub use burn::tensor::{backend::Backend, Tensor};

use crate::preset::render::{
    SEED_STREAM_NOISE_COARSE, SEED_STREAM_NOISE_FINE, SEED_STREAM_RESAMPLE,
    SEED_STREAM_STRATIFIED,
};
use std::fmt;

/// Rendering rays with a coarse pass and an optional fine pass.
///
/// ## Details
///
/// The fine pass samples depths from the coarse weights,
/// then renders the merged coarse and fine samples.
pub struct RenderPipeline<B: Backend, F, W = IdentityWarp> {
    pub options: RenderOptions,
    pub conditioning: Conditioning<B>,
    pub coarse: F,
    pub fine: Option<F>,
    pub warp: W,
}

/// The stages of [`RenderPipeline::render`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RenderStage {
    Init,
    CoarseSampled,
    CoarseEvaluated,
    CoarseComposited,
    FineSampled,
    FineEvaluated,
    FineComposited,
    Done,
}

/// The outputs of a pass, ordered as the rays.
#[derive(Clone)]
pub struct RayRenderOutput<B: Backend> {
    /// The shape is `[N, 3]`.
    pub rgb: Tensor<B, 2>,
    /// The shape is `[N]`.
    pub disparity: Tensor<B, 1>,
    /// The shape is `[N]`.
    pub accumulated_opacity: Tensor<B, 1>,
    /// The shape is `[N]`.
    pub depth: Tensor<B, 1>,
    /// The depths rendered by the pass.
    ///
    /// The shape is `[N, S]`.
    pub z_vals: Tensor<B, 2>,
    /// The shape is `[N, S]`.
    pub weights: Option<Tensor<B, 2>>,
    /// The shape is `[N, S, 4]`.
    pub raw: Option<Tensor<B, 3>>,
    /// The shape is `[N, S, 3]`.
    pub points: Option<Tensor<B, 3>>,
    /// The shape is `[N, S, 3]`.
    pub warped_points: Option<Tensor<B, 3>>,
    /// The shape is `[N, S, 3, 3]`.
    pub warp_jacobian: Option<Tensor<B, 4>>,
    /// The standard deviation of the fine importance samples.
    ///
    /// It is only set on the coarse output when the fine pass runs.
    ///
    /// The shape is `[N]`.
    pub z_std: Option<Tensor<B, 1>>,
}

/// The outputs of [`RenderPipeline::render`].
#[derive(Clone)]
pub struct RenderPipelineOutput<B: Backend> {
    pub coarse: RayRenderOutput<B>,
    pub fine: Option<RayRenderOutput<B>>,
    pub diagnostics: Diagnostics,
}

impl<B: Backend, F: SceneFunction<B>> RenderPipeline<B, F> {
    /// Building a pipeline without warping.
    ///
    /// ## Errors
    ///
    /// * [`Error::Validation`] if the options are invalid,
    ///   or the conditioning does not match the scene functions.
    /// * [`Error::MissingFineField`] if the fine pass is enabled
    ///   without a fine scene function.
    pub fn new(
        options: RenderOptions,
        conditioning: Conditioning<B>,
        coarse: F,
        fine: Option<F>,
    ) -> Result<Self, Error> {
        options.validate()?;

        if options.is_fine_enabled() && fine.is_none() {
            return Err(Error::MissingFineField(options.num_fine_samples));
        }

        let dims = conditioning.dims();
        for field in std::iter::once(&coarse).chain(fine.as_ref()) {
            let dims_expected = field.dim_conditions();
            if dims_expected != dims {
                return Err(Error::Validation(
                    "conditioning widths".into(),
                    format!("{dims_expected:?} for the scene function, but got {dims:?}"),
                ));
            }
        }

        Ok(Self {
            options,
            conditioning,
            coarse,
            fine,
            warp: IdentityWarp,
        })
    }
}

impl<B: Backend, F: SceneFunction<B>, W: WarpField<B>> RenderPipeline<B, F, W> {
    /// Replacing the warp field.
    pub fn with_warp<V: WarpField<B>>(
        self,
        warp: V,
    ) -> RenderPipeline<B, F, V> {
        RenderPipeline {
            options: self.options,
            conditioning: self.conditioning,
            coarse: self.coarse,
            fine: self.fine,
            warp,
        }
    }

    /// Rendering the rays.
    ///
    /// ## Errors
    ///
    /// * [`Error::MismatchedShape`] if the ray batch is inconsistent.
    /// * [`Error::MissingMetadata`] if the conditioning or
    ///   the warp field needs metadata absent from the rays.
    ///
    /// Numerically degenerate rays never fail. They are reported in
    /// [`RenderPipelineOutput::diagnostics`].
    ///
    /// An empty batch renders to empty outputs without querying any field.
    pub fn render(
        &self,
        rays: &RayBatch<B>,
        params: &WarpParams,
    ) -> Result<RenderPipelineOutput<B>, Error> {
        rays.validate()?;

        if rays.ray_count() == 0 {
            return Ok(self.render_empty(&rays.device()));
        }

        let options = &self.options;
        let conditions = self.conditioning.assemble(rays)?;
        let warp_metadata = self.warp.encode_metadata(rays)?;
        let mut diagnostics = Diagnostics::default();

        log::debug!(
            target: "warpnerf_renderer::render",
            "render > {} rays, {} coarse and {} fine samples per ray",
            rays.ray_count(),
            options.num_coarse_samples,
            options.num_fine_samples,
        );

        // Coarse pass

        let samples = self
            .sampler()
            .sample(rays, options.seed_of(SEED_STREAM_STRATIFIED));
        transit(RenderStage::Init, RenderStage::CoarseSampled);

        let (mut coarse, coarse_weights) = self.run_pass(
            RenderPass::Coarse,
            &self.coarse,
            rays,
            samples,
            conditions.to_owned(),
            warp_metadata.to_owned(),
            params,
        );

        // Fine pass

        let fine = match self.fine.as_ref().filter(|_| options.is_fine_enabled()) {
            Some(field) => {
                let z_samples = self.resample(&coarse.z_vals, coarse_weights);

                // Merging into a fresh sequence
                let z_vals =
                    Tensor::cat(vec![coarse.z_vals.to_owned(), z_samples.to_owned()], 1)
                        .sort(1);
                let samples = SampleSet::along(rays, z_vals);
                transit(RenderStage::CoarseComposited, RenderStage::FineSampled);

                coarse.z_std = Some(standard_deviation(z_samples));

                let (fine, _) = self.run_pass(
                    RenderPass::Fine,
                    field,
                    rays,
                    samples,
                    conditions,
                    warp_metadata,
                    params,
                );
                transit(RenderStage::FineComposited, RenderStage::Done);

                Some(fine)
            }
            None => {
                transit(RenderStage::CoarseComposited, RenderStage::Done);
                None
            }
        };

        coarse.inspect(RenderPass::Coarse, &mut diagnostics);
        if let Some(fine) = &fine {
            fine.inspect(RenderPass::Fine, &mut diagnostics);
        }

        Ok(RenderPipelineOutput {
            coarse,
            fine,
            diagnostics,
        })
    }

    /// Warping, evaluating and compositing the samples.
    ///
    /// It also returns the weights.
    #[allow(clippy::too_many_arguments)]
    fn run_pass(
        &self,
        pass: RenderPass,
        field: &F,
        rays: &RayBatch<B>,
        samples: SampleSet<B>,
        conditions: Conditions<B>,
        warp_metadata: Tensor<B, 2>,
        params: &WarpParams,
    ) -> (RayRenderOutput<B>, Tensor<B, 2>) {
        let options = &self.options;
        let (stage_sampled, stage_evaluated, stage_composited, seed_noise) = match pass {
            RenderPass::Coarse => (
                RenderStage::CoarseSampled,
                RenderStage::CoarseEvaluated,
                RenderStage::CoarseComposited,
                options.seed_of(SEED_STREAM_NOISE_COARSE),
            ),
            RenderPass::Fine => (
                RenderStage::FineSampled,
                RenderStage::FineEvaluated,
                RenderStage::FineComposited,
                options.seed_of(SEED_STREAM_NOISE_FINE),
            ),
        };
        let SampleSet { z_vals, points } = samples;

        // Warping the points again in each pass
        let [ray_count, sample_count, _] = points.dims();
        let [_, metadata_count] = warp_metadata.dims();
        let warp = self.warp.warp(
            points.to_owned(),
            warp_metadata
                .unsqueeze_dim::<3>(1)
                .expand([ray_count, sample_count, metadata_count]),
            params,
            options.return_warp_jacobian,
        );

        let raw = self.evaluator().evaluate(
            field,
            warp.warped_points.to_owned(),
            conditions,
        );
        transit(stage_sampled, stage_evaluated);

        let CompositeOutput {
            rgb,
            disparity,
            accumulated_opacity,
            depth,
            weights,
        } = self.compositor().composite(
            raw.to_owned(),
            z_vals.to_owned(),
            rays.directions.to_owned(),
            seed_noise,
        );
        transit(stage_evaluated, stage_composited);

        let output = RayRenderOutput {
            rgb,
            disparity,
            accumulated_opacity,
            depth,
            z_vals,
            weights: options.return_weights.then(|| weights.to_owned()),
            raw: options.return_raw.then_some(raw),
            points: options.return_points.then_some(points),
            warped_points: options.return_points.then_some(warp.warped_points),
            warp_jacobian: warp.jacobian,
            z_std: None,
        };

        (output, weights)
    }

    /// The outputs of an empty batch, shaped as if it were rendered.
    fn render_empty(
        &self,
        device: &B::Device,
    ) -> RenderPipelineOutput<B> {
        let options = &self.options;
        let fine_enabled = self.fine.is_some() && options.is_fine_enabled();

        log::debug!(target: "warpnerf_renderer::render", "render > 0 rays");

        let mut coarse =
            RayRenderOutput::empty(options.num_coarse_samples, options, device);
        let fine = fine_enabled.then(|| {
            coarse.z_std = Some(Tensor::zeros([0], device));
            RayRenderOutput::empty(
                options.num_coarse_samples + options.num_fine_samples,
                options,
                device,
            )
        });
        transit(RenderStage::Init, RenderStage::Done);

        RenderPipelineOutput {
            coarse,
            fine,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Drawing the fine depths from the interior coarse weights.
    ///
    /// The shape is `[N, K]`.
    fn resample(
        &self,
        z_vals: &Tensor<B, 2>,
        weights: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [ray_count, sample_count] = weights.dims();

        // [N, S - 1]
        let z_mids = midpoints(z_vals.to_owned());
        // [N, S - 2]
        let weights = weights.slice([0..ray_count, 1..sample_count - 1]);

        self.resampler()
            .resample(z_mids, weights, self.options.seed_of(SEED_STREAM_RESAMPLE))
            .detach()
    }

    pub fn sampler(&self) -> RaySampler {
        RaySampler {
            num_samples: self.options.num_coarse_samples,
            stratified: self.options.stratified,
            inverse_depth: self.options.inverse_depth,
        }
    }

    pub fn evaluator(&self) -> SceneEvaluator {
        SceneEvaluator {
            chunk_size: self.options.chunk_size,
        }
    }

    pub fn compositor(&self) -> VolumetricCompositor {
        VolumetricCompositor {
            raw_noise_std: self.options.raw_noise_std,
            white_background: self.options.white_background,
        }
    }

    /// The quantiles are evenly spaced if the rendering is deterministic
    /// or the coarse samples are not stratified.
    pub fn resampler(&self) -> ImportanceResampler {
        ImportanceResampler {
            num_samples: self.options.num_fine_samples,
            deterministic: self.options.deterministic || !self.options.stratified,
        }
    }
}

impl<B: Backend> RayRenderOutput<B> {
    /// The outputs of no rays with `S` samples each.
    pub fn empty(
        sample_count: usize,
        options: &RenderOptions,
        device: &B::Device,
    ) -> Self {
        Self {
            rgb: Tensor::zeros([0, 3], device),
            disparity: Tensor::zeros([0], device),
            accumulated_opacity: Tensor::zeros([0], device),
            depth: Tensor::zeros([0], device),
            z_vals: Tensor::zeros([0, sample_count], device),
            weights: options
                .return_weights
                .then(|| Tensor::zeros([0, sample_count], device)),
            raw: options
                .return_raw
                .then(|| Tensor::zeros([0, sample_count, 4], device)),
            points: options
                .return_points
                .then(|| Tensor::zeros([0, sample_count, 3], device)),
            warped_points: options
                .return_points
                .then(|| Tensor::zeros([0, sample_count, 3], device)),
            warp_jacobian: options
                .return_warp_jacobian
                .then(|| Tensor::zeros([0, sample_count, 3, 3], device)),
            z_std: None,
        }
    }

    /// Inspecting every field for NaN or Inf values.
    pub fn inspect(
        &self,
        pass: RenderPass,
        diagnostics: &mut Diagnostics,
    ) {
        diagnostics
            .inspect(pass, "rgb", &self.rgb)
            .inspect(pass, "disparity", &self.disparity)
            .inspect(pass, "accumulated_opacity", &self.accumulated_opacity)
            .inspect(pass, "depth", &self.depth);
        if let Some(z_std) = &self.z_std {
            diagnostics.inspect(pass, "z_std", z_std);
        }
        if let Some(weights) = &self.weights {
            diagnostics.inspect(pass, "weights", weights);
        }
        if let Some(raw) = &self.raw {
            diagnostics.inspect(pass, "raw", raw);
        }
    }

    /// `N`
    #[inline]
    pub fn ray_count(&self) -> usize {
        self.rgb.dims()[0]
    }
}

impl<B: Backend> RenderPipelineOutput<B> {
    /// The fine output if any, otherwise the coarse output.
    #[inline]
    pub fn output(&self) -> &RayRenderOutput<B> {
        self.fine.as_ref().unwrap_or(&self.coarse)
    }
}

/// The population standard deviation along each row.
fn standard_deviation<B: Backend>(values: Tensor<B, 2>) -> Tensor<B, 1> {
    let deviations = values.to_owned() - values.mean_dim(1);
    deviations.powf_scalar(2.0).mean_dim(1).sqrt().squeeze(1)
}

#[inline]
fn transit(
    from: RenderStage,
    to: RenderStage,
) {
    log::debug!(target: "warpnerf_renderer::render", "{from} -> {to}");
}

impl fmt::Display for RenderStage {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl<B: Backend, F, W: fmt::Debug> fmt::Debug for RenderPipeline<B, F, W> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("RenderPipeline<{}>", B::name()))
            .field("options", &self.options)
            .field("conditioning", &self.conditioning)
            .field("fine", &self.fine.is_some())
            .field("warp", &self.warp)
            .finish()
    }
}

impl<B: Backend> fmt::Debug for RayRenderOutput<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("RayRenderOutput<{}>", B::name()))
            .field("rgb.dims()", &self.rgb.dims())
            .field("z_vals.dims()", &self.z_vals.dims())
            .field("weights", &self.weights.is_some())
            .field("raw", &self.raw.is_some())
            .field("points", &self.points.is_some())
            .field("warped_points", &self.warped_points.is_some())
            .field("warp_jacobian", &self.warp_jacobian.is_some())
            .field("z_std", &self.z_std.is_some())
            .finish()
    }
}

impl<B: Backend> fmt::Debug for RenderPipelineOutput<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("RenderPipelineOutput")
            .field("coarse", &self.coarse)
            .field("fine", &self.fine)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}
