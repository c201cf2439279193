//! Volumetric rendering along rays.

pub mod composite;
pub mod diagnostic;
pub mod options;
pub mod pipeline;
pub mod resample;
pub mod sample;

pub use composite::{CompositeOutput, VolumetricCompositor};
pub use diagnostic::{Diagnostics, NumericalIssue, RenderPass};
pub use options::RenderOptions;
pub use pipeline::{RayRenderOutput, RenderPipeline, RenderPipelineOutput, RenderStage};
pub use resample::ImportanceResampler;
pub use sample::{RaySampler, SampleSet};
