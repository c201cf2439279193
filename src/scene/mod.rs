//! Scene fields queried by the renderer.

pub mod evaluate;
pub mod nerf;

pub use crate::condition::{ConditionDims, Conditions};
pub use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Tensor},
};
pub use evaluate::SceneEvaluator;
pub use nerf::{NerfMlp, NerfMlpConfig};

/// A field mapping points to raw colors and densities.
pub trait SceneFunction<B: Backend> {
    /// Querying the raw outputs at the points.
    ///
    /// ## Shapes
    ///
    /// * `points` - `[M, 3]`
    /// * `conditions` - `[M, C]` per target
    /// * `output` - `[M, 4]`, raw RGB then raw density
    fn query(
        &self,
        points: Tensor<B, 2>,
        conditions: Conditions<B>,
    ) -> Tensor<B, 2>;

    /// The condition widths per target expected by [`Self::query`].
    fn dim_conditions(&self) -> ConditionDims {
        ConditionDims::default()
    }
}

impl<B: Backend, F: SceneFunction<B> + ?Sized> SceneFunction<B> for &F {
    #[inline]
    fn query(
        &self,
        points: Tensor<B, 2>,
        conditions: Conditions<B>,
    ) -> Tensor<B, 2> {
        (**self).query(points, conditions)
    }

    #[inline]
    fn dim_conditions(&self) -> ConditionDims {
        (**self).dim_conditions()
    }
}
