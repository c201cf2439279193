//! Backend presets.

pub use burn::{
    backend::wgpu::{WgpuDevice, WgpuRuntime},
    tensor::backend::{AutodiffBackend, Backend},
};

/// Differentiable backend for training drivers.
pub type Autodiff<B> = burn::backend::Autodiff<B>;

/// GPU backend through WGPU.
pub type Wgpu = burn_jit::JitBackend<WgpuRuntime, f32, i32>;

pub type WgpuAutodiff = Autodiff<Wgpu>;
