use burn::{
    backend::NdArray,
    tensor::{backend::Backend, Tensor},
};
use warpnerf_renderer::{
    condition::{
        AppearanceCondition, CameraCondition, ConditionTarget, Conditioning, Conditions,
        ViewDirectionCondition,
    },
    encode::{GloEncoderConfig, SinusoidalEncoderConfig, TimeEncoderConfig},
    error::Error,
    ray::{RayBatch, RayMetadata},
    render::{RenderOptions, RenderPass, RenderPipeline},
    scene::{NerfMlpConfig, SceneFunction},
    warp::{TranslationFieldConfig, WarpMetadataEncoderConfig, WarpParams},
};

type B = NdArray<f32>;

/// Constant raw colors and densities everywhere.
struct Constant {
    rgb: f32,
    density: f32,
}

/// A dense shell around `z = 0.5`.
struct Shell;

impl<B: Backend> SceneFunction<B> for Constant {
    fn query(
        &self,
        points: Tensor<B, 2>,
        _conditions: Conditions<B>,
    ) -> Tensor<B, 2> {
        let [count, _] = points.dims();
        let device = &points.device();

        Tensor::cat(
            vec![
                Tensor::full([count, 3], self.rgb, device),
                Tensor::full([count, 1], self.density, device),
            ],
            1,
        )
    }
}

impl<B: Backend> SceneFunction<B> for Shell {
    fn query(
        &self,
        points: Tensor<B, 2>,
        _conditions: Conditions<B>,
    ) -> Tensor<B, 2> {
        let [count, _] = points.dims();
        let density = points
            .to_owned()
            .slice([0..count, 2..3])
            .sub_scalar(0.5)
            .abs()
            .mul_scalar(-4.0)
            .add_scalar(1.0)
            .clamp_min(0.0)
            .mul_scalar(20.0);

        Tensor::cat(vec![points, density], 1)
    }
}

fn rays_along_z(count: usize) -> RayBatch<B> {
    let device = &Default::default();
    let directions = Tensor::<B, 2>::from_data([[0.0, 0.0, 1.0]], device)
        .expand([count, 3]);

    RayBatch::new(Tensor::zeros([count, 3], device), directions, 0.0, 1.0).unwrap()
}

#[test]
fn render_constant_field_without_fine_pass() {
    let options = RenderOptions::new()
        .with_num_coarse_samples(8)
        .with_num_fine_samples(0)
        .with_stratified(false)
        .with_return_weights(true);
    let pipeline = RenderPipeline::<B, _>::new(
        options,
        Conditioning::new(),
        Constant {
            rgb: 0.0,
            density: 1.0,
        },
        None,
    )
    .unwrap();

    let output = pipeline.render(&rays_along_z(4), &WarpParams::default()).unwrap();
    assert!(output.fine.is_none());
    assert!(output.diagnostics.is_healthy());
    assert!(output.coarse.z_std.is_none());

    let coarse = output.coarse;
    let decay = (-1.0f32 / 7.0).exp();
    let weights = coarse.weights.unwrap().into_data().to_vec::<f32>().unwrap();
    assert_eq!(weights.len(), 4 * 8);
    for weights in weights.chunks(8) {
        assert!((weights[0] - (1.0 - decay)).abs() < 1e-6, "{weights:?}");
        for index in 1..7 {
            let ratio = weights[index] / weights[index - 1];
            assert!((ratio - decay).abs() < 1e-5, "{weights:?}");
        }
        let sum = weights.iter().sum::<f32>();
        assert!(sum <= 1.0 + 1e-6, "{weights:?}");
        assert!(weights.iter().all(|weight| *weight >= 0.0), "{weights:?}");
    }

    let opacities = coarse.accumulated_opacity.into_data().to_vec::<f32>().unwrap();
    assert!(opacities.iter().all(|opacity| (opacity - 1.0).abs() < 1e-5));

    let rgb = coarse.rgb.into_data().to_vec::<f32>().unwrap();
    assert!(rgb.iter().all(|value| (value - 0.5).abs() < 1e-5), "{rgb:?}");

    let disparity = coarse.disparity.into_data().to_vec::<f32>().unwrap();
    let depth = coarse.depth.into_data().to_vec::<f32>().unwrap();
    depth.iter().zip(disparity).for_each(|(depth, disparity)| {
        assert!(*depth > 0.0 && *depth < 1.0);
        assert!((depth * disparity - 1.0).abs() < 1e-4);
    });
}

#[test]
fn render_fine_pass_deterministically() {
    let options = RenderOptions::new()
        .with_num_coarse_samples(16)
        .with_num_fine_samples(32)
        .with_raw_noise_std(0.5)
        .with_deterministic(true)
        .with_seed(42);
    let render = || {
        RenderPipeline::<B, _>::new(
            options.to_owned(),
            Conditioning::new(),
            Shell,
            Some(Shell),
        )
        .unwrap()
        .render(&rays_along_z(3), &WarpParams::default())
        .unwrap()
    };

    let output_1 = render();
    let output_2 = render();
    let fine_1 = output_1.fine.unwrap();
    let fine_2 = output_2.fine.unwrap();

    assert_eq!(fine_1.z_vals.dims(), [3, 16 + 32]);
    fine_1
        .z_vals
        .to_owned()
        .into_data()
        .assert_eq(&fine_2.z_vals.into_data(), true);
    fine_1
        .rgb
        .to_owned()
        .into_data()
        .assert_eq(&fine_2.rgb.into_data(), true);
    fine_1
        .depth
        .to_owned()
        .into_data()
        .assert_eq(&fine_2.depth.into_data(), true);
    output_1
        .coarse
        .z_vals
        .into_data()
        .assert_eq(&output_2.coarse.z_vals.into_data(), true);

    // The merged depths are sorted along each ray.
    let z_vals = fine_1.z_vals.into_data().to_vec::<f32>().unwrap();
    for z_vals in z_vals.chunks(16 + 32) {
        assert!(z_vals.windows(2).all(|pair| pair[0] <= pair[1]), "{z_vals:?}");
        assert!(z_vals.iter().all(|z| (0.0..=1.0).contains(z)), "{z_vals:?}");
    }

    let z_std = output_1.coarse.z_std.unwrap().into_data().to_vec::<f32>().unwrap();
    assert_eq!(z_std.len(), 3);
    assert!(z_std.iter().all(|z_std| *z_std > 0.0 && *z_std < 0.5), "{z_std:?}");
    assert!(fine_1.z_std.is_none());
}

#[test]
fn render_fine_samples_near_density() {
    let options = RenderOptions::new()
        .with_num_coarse_samples(32)
        .with_num_fine_samples(64)
        .for_evaluation();
    let pipeline =
        RenderPipeline::<B, _>::new(options, Conditioning::new(), Shell, Some(Shell)).unwrap();

    let output = pipeline.render(&rays_along_z(2), &WarpParams::default()).unwrap();
    let z_vals = output.fine.unwrap().z_vals.into_data().to_vec::<f32>().unwrap();

    for z_vals in z_vals.chunks(32 + 64) {
        let count_near = z_vals
            .iter()
            .filter(|z| (0.25..=0.75).contains(*z))
            .count();
        // All coarse samples spread evenly, while most fine samples gather
        // in front of the shell.
        assert!(count_near > 48, "{count_near}: {z_vals:?}");
    }
}

#[test]
fn new_without_fine_field() {
    let options = RenderOptions::new().with_num_fine_samples(4);
    let result = RenderPipeline::<B, _>::new(
        options,
        Conditioning::new(),
        Constant {
            rgb: 0.0,
            density: 1.0,
        },
        None,
    );

    assert!(matches!(result, Err(Error::MissingFineField(4))));
}

#[test]
fn new_with_mismatched_conditioning() {
    let device = &Default::default();
    let options = RenderOptions::new().with_num_fine_samples(0);
    let field = NerfMlpConfig::new()
        .with_point_encoder(SinusoidalEncoderConfig::new(2))
        .with_dim_rgb_condition(4)
        .with_trunk_depth(2)
        .with_trunk_width(8)
        .init::<B>(device);
    let result = RenderPipeline::<B, _>::new(options, Conditioning::new(), field, None);

    assert!(matches!(result, Err(Error::Validation(..))));
}

#[test]
fn render_nerf_with_conditioning() {
    let device = &Default::default();
    let view_encoder = SinusoidalEncoderConfig::new(2);
    let conditioning = Conditioning::<B>::new()
        .with_targets(
            CameraCondition {
                encoder: GloEncoderConfig::new(2, 3).init(device),
            },
            [ConditionTarget::Trunk],
        )
        .with_targets(
            AppearanceCondition {
                encoder: GloEncoderConfig::new(4, 2).init(device),
            },
            [ConditionTarget::Alpha, ConditionTarget::Rgb],
        )
        .with(ViewDirectionCondition {
            encoder: view_encoder.init(),
        });
    let config = NerfMlpConfig::new()
        .with_point_encoder(SinusoidalEncoderConfig::new(4))
        .with_dim_conditions(conditioning.dims())
        .with_trunk_depth(4)
        .with_trunk_width(16)
        .with_trunk_skip(2)
        .with_rgb_branch_width(8);
    let options = RenderOptions::new()
        .with_num_coarse_samples(8)
        .with_num_fine_samples(8)
        .with_chunk_size(10)
        .with_return_raw(true)
        .for_evaluation();

    let pipeline = RenderPipeline::<B, _>::new(
        options,
        conditioning,
        config.init(device),
        Some(config.init(device)),
    )
    .unwrap();

    let rays = rays_along_z(5);
    let error = pipeline.render(&rays, &WarpParams::default()).unwrap_err();
    assert!(matches!(error, Error::MissingMetadata(..)), "{error}");

    let rays = rays
        .with_metadata(RayMetadata {
            appearance_ids: Some(Tensor::from_data([0, 1, 2, 3, 0], device)),
            camera_ids: Some(Tensor::from_data([1, 1, 0, 0, 1], device)),
            ..Default::default()
        })
        .unwrap();
    let output = pipeline.render(&rays, &WarpParams::default()).unwrap();

    assert!(output.diagnostics.is_healthy(), "{:?}", output.diagnostics);
    assert_eq!(output.coarse.raw.as_ref().unwrap().dims(), [5, 8, 4]);
    let fine = output.output();
    assert_eq!(fine.raw.as_ref().unwrap().dims(), [5, 16, 4]);
    assert_eq!(fine.rgb.dims(), [5, 3]);
    assert_eq!(fine.ray_count(), 5);
    let rgb = fine.rgb.to_owned().into_data().to_vec::<f32>().unwrap();
    assert!(rgb.iter().all(|value| (0.0..=1.0).contains(value)), "{rgb:?}");
}

#[test]
fn render_with_translation_warp() {
    let device = &Default::default();
    let options = RenderOptions::new()
        .with_num_coarse_samples(6)
        .with_num_fine_samples(4)
        .with_return_points(true)
        .with_return_warp_jacobian(true)
        .for_evaluation();
    let warp = TranslationFieldConfig::new()
        .with_point_encoder(SinusoidalEncoderConfig::new(3))
        .with_dim_metadata(2)
        .with_depth(2)
        .with_width(8)
        .init::<B>(device);
    let pipeline = RenderPipeline::<B, _>::new(options, Conditioning::new(), Shell, Some(Shell))
        .unwrap()
        .with_warp(warp);

    let rays = rays_along_z(3);
    let params = WarpParams { alpha: 1.5 };
    let error = pipeline.render(&rays, &params).unwrap_err();
    assert!(
        matches!(&error, Error::MissingMetadata(name) if name == "warp_codes"),
        "{error}"
    );

    let rays = rays
        .with_metadata(RayMetadata {
            warp_codes: Some(Tensor::zeros([3, 2], device)),
            ..Default::default()
        })
        .unwrap();
    let output = pipeline.render(&rays, &params).unwrap();

    let coarse = output.coarse;
    assert_eq!(coarse.points.unwrap().dims(), [3, 6, 3]);
    assert_eq!(coarse.warped_points.unwrap().dims(), [3, 6, 3]);
    assert_eq!(coarse.warp_jacobian.unwrap().dims(), [3, 6, 3, 3]);

    let fine = output.fine.unwrap();
    assert_eq!(fine.warped_points.unwrap().dims(), [3, 10, 3]);
    assert_eq!(fine.warp_jacobian.unwrap().dims(), [3, 10, 3, 3]);
    assert!(fine.weights.is_none());
    assert!(fine.raw.is_none());
}

#[test]
fn render_reports_numerical_issues() {
    let options = RenderOptions::new()
        .with_num_coarse_samples(4)
        .with_num_fine_samples(0)
        .for_evaluation();
    let pipeline = RenderPipeline::<B, _>::new(
        options,
        Conditioning::new(),
        Constant {
            rgb: f32::NAN,
            density: 1.0,
        },
        None,
    )
    .unwrap();

    let output = pipeline.render(&rays_along_z(2), &WarpParams::default()).unwrap();
    let issues = &output.diagnostics.issues;

    assert!(!output.diagnostics.is_healthy());
    assert!(issues.iter().all(|issue| issue.pass == RenderPass::Coarse));
    assert!(issues.iter().any(|issue| issue.field == "rgb" && issue.has_nan));
    assert_eq!(output.coarse.rgb.dims(), [2, 3]);
}

#[test]
fn render_backward_through_both_passes() {
    use burn::nn::{Initializer, LinearConfig};
    use warpnerf_renderer::preset::backend::Autodiff;

    type AB = Autodiff<B>;
    let device = &Default::default();

    let config = NerfMlpConfig::new()
        .with_point_encoder(SinusoidalEncoderConfig::new(2))
        .with_trunk_depth(2)
        .with_trunk_width(8)
        .with_rgb_branch_depth(0);
    // Positive densities from the non-negative trunk features
    let init = || {
        let mut field = config.init::<AB>(device);
        field.density = LinearConfig::new(8, 1)
            .with_initializer(Initializer::Constant { value: 0.5 })
            .init(device);
        field
    };
    let options = RenderOptions::new()
        .with_num_coarse_samples(8)
        .with_num_fine_samples(8)
        .with_deterministic(true);
    let pipeline =
        RenderPipeline::<AB, _>::new(options, Conditioning::new(), init(), Some(init())).unwrap();

    let directions =
        Tensor::<AB, 2>::from_data([[0.0, 0.0, 1.0]], device).expand([2, 3]);
    let rays =
        RayBatch::new(Tensor::zeros([2, 3], device), directions, 0.0, 1.0).unwrap();
    let output = pipeline.render(&rays, &WarpParams::default()).unwrap();

    let loss = output.coarse.rgb.sum() + output.fine.unwrap().rgb.sum();
    let grads = loss.backward();

    let coarse_grad = pipeline.coarse.rgb.weight.grad(&grads).unwrap();
    let fine_grad = pipeline.fine.as_ref().unwrap().rgb.weight.grad(&grads).unwrap();
    assert_eq!(coarse_grad.dims(), [8, 3]);
    assert_eq!(fine_grad.dims(), [8, 3]);

    for grad in [coarse_grad, fine_grad] {
        let grad = grad.into_data().to_vec::<f32>().unwrap();
        assert!(grad.iter().all(|value| value.is_finite()), "{grad:?}");
        assert!(grad.iter().any(|value| *value != 0.0), "{grad:?}");
    }
}

#[test]
fn render_empty_batch() {
    let device = &Default::default();
    let options = RenderOptions::new()
        .with_num_coarse_samples(8)
        .with_num_fine_samples(4)
        .with_return_weights(true)
        .with_return_raw(true)
        .with_return_points(true)
        .with_return_warp_jacobian(true);
    let pipeline =
        RenderPipeline::<B, _>::new(options, Conditioning::new(), Shell, Some(Shell)).unwrap();

    let rays = RayBatch::<B>::new(
        Tensor::zeros([0, 3], device),
        Tensor::zeros([0, 3], device),
        0.0,
        1.0,
    )
    .unwrap();
    let output = pipeline.render(&rays, &WarpParams::default()).unwrap();

    assert!(output.diagnostics.is_healthy());
    let coarse = output.coarse;
    assert_eq!(coarse.ray_count(), 0);
    assert_eq!(coarse.rgb.dims(), [0, 3]);
    assert_eq!(coarse.disparity.dims(), [0]);
    assert_eq!(coarse.accumulated_opacity.dims(), [0]);
    assert_eq!(coarse.depth.dims(), [0]);
    assert_eq!(coarse.z_vals.dims(), [0, 8]);
    assert_eq!(coarse.weights.unwrap().dims(), [0, 8]);
    assert_eq!(coarse.raw.unwrap().dims(), [0, 8, 4]);
    assert_eq!(coarse.z_std.unwrap().dims(), [0]);

    let fine = output.fine.unwrap();
    assert_eq!(fine.rgb.dims(), [0, 3]);
    assert_eq!(fine.z_vals.dims(), [0, 12]);
    assert_eq!(fine.points.unwrap().dims(), [0, 12, 3]);
    assert_eq!(fine.warped_points.unwrap().dims(), [0, 12, 3]);
    assert_eq!(fine.warp_jacobian.unwrap().dims(), [0, 12, 3, 3]);
    assert!(fine.z_std.is_none());
}

#[test]
fn render_identity_warp_jacobian() {
    let options = RenderOptions::new()
        .with_num_coarse_samples(4)
        .with_num_fine_samples(0)
        .with_return_points(true)
        .with_return_warp_jacobian(true)
        .for_evaluation();
    let pipeline = RenderPipeline::<B, _>::new(options, Conditioning::new(), Shell, None).unwrap();

    let output = pipeline.render(&rays_along_z(2), &WarpParams::default()).unwrap();
    let coarse = output.coarse;

    coarse
        .warped_points
        .unwrap()
        .into_data()
        .assert_eq(&coarse.points.unwrap().into_data(), true);
    let jacobian = coarse.warp_jacobian.unwrap();
    assert_eq!(jacobian.dims(), [2, 4, 3, 3]);
    let jacobian = jacobian.into_data().to_vec::<f32>().unwrap();
    jacobian.chunks(9).for_each(|matrix| {
        assert_eq!(matrix, [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    });
}

#[test]
fn render_with_time_encoded_warp() {
    let device = &Default::default();
    let options = RenderOptions::new()
        .with_num_coarse_samples(6)
        .with_num_fine_samples(0)
        .with_return_points(true)
        .for_evaluation();
    let warp = TranslationFieldConfig::new()
        .with_point_encoder(SinusoidalEncoderConfig::new(3))
        .with_metadata_encoder(Some(WarpMetadataEncoderConfig::Time(
            TimeEncoderConfig::new()
                .with_time_encoder(SinusoidalEncoderConfig::new(2))
                .with_width(8)
                .with_dim_output(4),
        )))
        .with_depth(2)
        .with_width(8)
        .init::<B>(device);
    let pipeline = RenderPipeline::<B, _>::new(options, Conditioning::new(), Shell, None)
        .unwrap()
        .with_warp(warp);

    let rays = rays_along_z(2);
    let error = pipeline.render(&rays, &WarpParams::default()).unwrap_err();
    assert!(
        matches!(&error, Error::MissingMetadata(name) if name == "times"),
        "{error}"
    );

    let rays = rays
        .with_metadata(RayMetadata {
            times: Some(Tensor::from_data([[0.0], [1.0]], device)),
            ..Default::default()
        })
        .unwrap();
    let output = pipeline.render(&rays, &WarpParams::default()).unwrap();

    assert!(output.diagnostics.is_healthy(), "{:?}", output.diagnostics);
    assert_eq!(output.coarse.warped_points.unwrap().dims(), [2, 6, 3]);
}
