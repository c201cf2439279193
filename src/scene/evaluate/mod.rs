//! Evaluating scene fields in chunks.

pub use super::*;

use crate::preset::render::CHUNK_SIZE_DEFAULT;
use humansize::{format_size, BINARY};

/// Evaluator bounding the number of points queried at once.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneEvaluator {
    /// The maximum number of points per query.
    pub chunk_size: usize,
}

impl SceneEvaluator {
    /// Querying the field at every point, one chunk after another.
    ///
    /// The per-ray conditions of each target are repeated for each sample
    /// of the ray. The output is independent of the chunk size.
    ///
    /// ## Shapes
    ///
    /// * `points` - `[N, S, 3]`
    /// * `conditions` - `[N, C]` per target
    /// * `output` - `[N, S, 4]`
    pub fn evaluate<B: Backend, F: SceneFunction<B> + ?Sized>(
        &self,
        field: &F,
        points: Tensor<B, 3>,
        conditions: Conditions<B>,
    ) -> Tensor<B, 3> {
        // (N, S)
        let [ray_count, sample_count, _] = points.dims();
        // M
        let point_count = ray_count * sample_count;
        let chunk_size = self.chunk_size.max(1);
        let device = &points.device();

        if point_count == 0 {
            return Tensor::zeros([ray_count, sample_count, 4], device);
        }

        // [M, 3]
        let points = points.reshape([point_count, 3]);
        // [M, C] per target
        let conditions = conditions.map(|condition| {
            let [_, condition_count] = condition.dims();
            condition
                .unsqueeze_dim::<3>(1)
                .expand([ray_count, sample_count, condition_count])
                .reshape([point_count, condition_count])
        });

        let chunk_count = point_count.div_ceil(chunk_size);
        let dims = conditions.dims();
        let dim_input = 3 + dims.trunk + dims.alpha + dims.rgb;
        log::debug!(
            target: "warpnerf_renderer::scene",
            "evaluate > {point_count} points in {chunk_count} chunks of at most {}",
            format_size(
                chunk_size.min(point_count)
                    * dim_input
                    * core::mem::size_of::<B::FloatElem>(),
                BINARY.decimal_places(1),
            ),
        );

        let outputs = (0..point_count)
            .step_by(chunk_size)
            .map(|start| {
                let range = start..(start + chunk_size).min(point_count);
                field.query(
                    points.to_owned().slice([range.to_owned()]),
                    conditions.slice(range),
                )
            })
            .collect::<Vec<_>>();

        // [N, S, 4]
        let output = Tensor::cat(outputs, 0);
        let channel_count = output.dims()[1];
        output.reshape([ray_count, sample_count, channel_count])
    }
}

impl Default for SceneEvaluator {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE_DEFAULT,
        }
    }
}
