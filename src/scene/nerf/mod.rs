//! Neural radiance field.

pub use super::*;
pub use crate::encode::{SinusoidalEncoder, SinusoidalEncoderConfig};
pub use burn::nn::{Linear, Relu};

use burn::nn::LinearConfig;

/// The configuration for [`NerfMlp`].
#[derive(Config, Copy, Debug)]
pub struct NerfMlpConfig {
    /// Encoding the query points.
    #[config(default = "SinusoidalEncoderConfig::new(10)")]
    pub point_encoder: SinusoidalEncoderConfig,
    /// The width of the conditions fed to the trunk with the encoded points.
    #[config(default = 0)]
    pub dim_trunk_condition: usize,
    /// The width of the conditions fed to the density head.
    #[config(default = 0)]
    pub dim_alpha_condition: usize,
    /// The width of the conditions fed to the color branch.
    #[config(default = 0)]
    pub dim_rgb_condition: usize,
    /// The number of trunk layers.
    #[config(default = 8)]
    pub trunk_depth: usize,
    /// The width of trunk layers.
    #[config(default = 256)]
    pub trunk_width: usize,
    /// The trunk layer receiving the trunk input again.
    ///
    /// No skip connection if it is `0` or not less than the depth.
    #[config(default = 4)]
    pub trunk_skip: usize,
    /// The number of hidden layers in the color branch.
    #[config(default = 1)]
    pub rgb_branch_depth: usize,
    /// The width of hidden layers in the color branch.
    #[config(default = 128)]
    pub rgb_branch_width: usize,
}

/// Multi-layer perceptron predicting raw colors and densities.
///
/// ## Details
///
/// The trunk sees the encoded points and the trunk conditions.
/// The density comes from the trunk alone, or from the bottleneck and the
/// alpha conditions if there are any.
/// The color branch sees the bottleneck and the rgb conditions.
#[derive(Debug, Module)]
pub struct NerfMlp<B: Backend> {
    pub point_encoder: SinusoidalEncoder,
    /// Trunk layers before the skip connection.
    pub trunk_head: Vec<Linear<B>>,
    /// Trunk layers after the skip connection.
    pub trunk_tail: Vec<Linear<B>>,
    pub density: Linear<B>,
    pub bottleneck: Linear<B>,
    pub rgb_branch: Vec<Linear<B>>,
    pub rgb: Linear<B>,
    pub activation: Relu,
    pub dim_trunk_condition: usize,
    pub dim_alpha_condition: usize,
    pub dim_rgb_condition: usize,
}

impl NerfMlpConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> NerfMlp<B> {
        let point_encoder = self.point_encoder.init();
        let dim_input = point_encoder.dim_output(3) + self.dim_trunk_condition;
        let width = self.trunk_width;
        let skip = match self.trunk_skip {
            skip if skip > 0 && skip < self.trunk_depth => skip,
            _ => self.trunk_depth,
        };

        let trunk_head = (0..skip)
            .map(|index| {
                let dim_layer = if index == 0 { dim_input } else { width };
                LinearConfig::new(dim_layer, width).init(device)
            })
            .collect::<Vec<_>>();
        let trunk_tail = (skip..self.trunk_depth)
            .map(|index| {
                let dim_layer = if index == skip {
                    width + dim_input
                } else {
                    width
                };
                LinearConfig::new(dim_layer, width).init(device)
            })
            .collect::<Vec<_>>();
        let dim_trunk = if self.trunk_depth == 0 {
            dim_input
        } else {
            width
        };

        let dim_density = if self.dim_alpha_condition > 0 {
            width + self.dim_alpha_condition
        } else {
            dim_trunk
        };
        let density = LinearConfig::new(dim_density, 1).init(device);
        let bottleneck = LinearConfig::new(dim_trunk, width).init(device);
        let rgb_branch = (0..self.rgb_branch_depth)
            .map(|index| {
                let dim_layer = if index == 0 {
                    width + self.dim_rgb_condition
                } else {
                    self.rgb_branch_width
                };
                LinearConfig::new(dim_layer, self.rgb_branch_width).init(device)
            })
            .collect::<Vec<_>>();
        let dim_branch = if self.rgb_branch_depth == 0 {
            width + self.dim_rgb_condition
        } else {
            self.rgb_branch_width
        };
        let rgb = LinearConfig::new(dim_branch, 3).init(device);

        NerfMlp {
            point_encoder,
            trunk_head,
            trunk_tail,
            density,
            bottleneck,
            rgb_branch,
            rgb,
            activation: Relu::new(),
            dim_trunk_condition: self.dim_trunk_condition,
            dim_alpha_condition: self.dim_alpha_condition,
            dim_rgb_condition: self.dim_rgb_condition,
        }
    }

    /// Setting the condition widths of every target.
    pub fn with_dim_conditions(
        self,
        dims: ConditionDims,
    ) -> Self {
        self.with_dim_trunk_condition(dims.trunk)
            .with_dim_alpha_condition(dims.alpha)
            .with_dim_rgb_condition(dims.rgb)
    }
}

impl<B: Backend> NerfMlp<B> {
    /// Applies the forward pass on the points.
    ///
    /// Every target with a non-zero width in the configuration
    /// expects its conditions.
    ///
    /// ## Shapes
    ///
    /// * `points` - `[M, 3]`
    /// * `conditions.trunk` - [`[M, dim_trunk_condition]`](NerfMlpConfig::dim_trunk_condition)
    /// * `conditions.alpha` - [`[M, dim_alpha_condition]`](NerfMlpConfig::dim_alpha_condition)
    /// * `conditions.rgb` - [`[M, dim_rgb_condition]`](NerfMlpConfig::dim_rgb_condition)
    /// * `output` - `[M, 4]`
    pub fn forward(
        &self,
        points: Tensor<B, 2>,
        conditions: Conditions<B>,
    ) -> Tensor<B, 2> {
        let Conditions { trunk, alpha, rgb } = conditions;

        let mut inputs = self.point_encoder.forward(points);
        if let Some(trunk) = trunk {
            inputs = Tensor::cat(vec![inputs, trunk], 1);
        }

        let mut trunk = inputs.to_owned();
        for layer in &self.trunk_head {
            trunk = self.activation.forward(layer.forward(trunk));
        }
        if !self.trunk_tail.is_empty() {
            trunk = Tensor::cat(vec![trunk, inputs], 1);
            for layer in &self.trunk_tail {
                trunk = self.activation.forward(layer.forward(trunk));
            }
        }

        let bottleneck = self.bottleneck.forward(trunk.to_owned());

        // [M, 1]
        let density = match alpha {
            Some(alpha) => self
                .density
                .forward(Tensor::cat(vec![bottleneck.to_owned(), alpha], 1)),
            None => self.density.forward(trunk),
        };

        let mut branch = bottleneck;
        if let Some(rgb) = rgb {
            branch = Tensor::cat(vec![branch, rgb], 1);
        }
        for layer in &self.rgb_branch {
            branch = self.activation.forward(layer.forward(branch));
        }

        // [M, 3]
        let rgb = self.rgb.forward(branch);

        Tensor::cat(vec![rgb, density], 1)
    }
}

impl<B: Backend> SceneFunction<B> for NerfMlp<B> {
    #[inline]
    fn query(
        &self,
        points: Tensor<B, 2>,
        conditions: Conditions<B>,
    ) -> Tensor<B, 2> {
        self.forward(points, conditions)
    }

    #[inline]
    fn dim_conditions(&self) -> ConditionDims {
        ConditionDims {
            trunk: self.dim_trunk_condition,
            alpha: self.dim_alpha_condition,
            rgb: self.dim_rgb_condition,
        }
    }
}

impl Default for NerfMlpConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
