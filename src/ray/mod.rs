//! Ray batches.

pub use crate::error::Error;
pub use burn::tensor::{backend::Backend, Int, Tensor};

use std::{fmt, ops::Range};

/// A batch of rays.
///
/// The ray order is preserved by every rendering stage.
#[derive(Clone)]
pub struct RayBatch<B: Backend> {
    /// Ray origins.
    ///
    /// The shape is `[N, 3]`.
    pub origins: Tensor<B, 2>,
    /// Ray directions, not necessarily normalized.
    ///
    /// The shape is `[N, 3]`.
    pub directions: Tensor<B, 2>,
    /// Near bounds.
    ///
    /// The shape is `[N, 1]`.
    pub nears: Tensor<B, 2>,
    /// Far bounds.
    ///
    /// The shape is `[N, 1]`.
    pub fars: Tensor<B, 2>,
    /// Unit view directions.
    ///
    /// The shape is `[N, 3]`.
    pub view_directions: Option<Tensor<B, 2>>,
    /// Per-ray metadata.
    pub metadata: RayMetadata<B>,
}

/// Per-ray metadata of the frame each ray belongs to.
#[derive(Clone)]
pub struct RayMetadata<B: Backend> {
    /// Appearance ids. The shape is `[N]`.
    pub appearance_ids: Option<Tensor<B, 1, Int>>,
    /// Camera ids. The shape is `[N]`.
    pub camera_ids: Option<Tensor<B, 1, Int>>,
    /// Warp ids, encoded by the warp field. The shape is `[N]`.
    pub warp_ids: Option<Tensor<B, 1, Int>>,
    /// Frame times, encoded by the warp field. The shape is `[N, 1]`.
    pub times: Option<Tensor<B, 2>>,
    /// Encoded warp latent codes. The shape is `[N, C]`.
    pub warp_codes: Option<Tensor<B, 2>>,
}

impl<B: Backend> RayBatch<B> {
    /// Rays sharing the same scalar bounds.
    ///
    /// `near > far` is not rejected, but the rendered weights are undefined.
    pub fn new(
        origins: Tensor<B, 2>,
        directions: Tensor<B, 2>,
        near: f32,
        far: f32,
    ) -> Result<Self, Error> {
        let [ray_count, _] = origins.dims();
        let device = origins.device();
        let nears = Tensor::full([ray_count, 1], near, &device);
        let fars = Tensor::full([ray_count, 1], far, &device);

        Self::with_bounds(origins, directions, nears, fars)
    }

    /// Rays with per-ray bounds of shape `[N, 1]`.
    pub fn with_bounds(
        origins: Tensor<B, 2>,
        directions: Tensor<B, 2>,
        nears: Tensor<B, 2>,
        fars: Tensor<B, 2>,
    ) -> Result<Self, Error> {
        let rays = Self {
            origins,
            directions,
            nears,
            fars,
            view_directions: None,
            metadata: Default::default(),
        };
        rays.validate()?;

        Ok(rays)
    }

    /// Setting the view directions, which are normalized here.
    pub fn with_view_directions(
        mut self,
        view_directions: Tensor<B, 2>,
    ) -> Result<Self, Error> {
        self.view_directions = Some(Self::normalize(view_directions));
        self.validate()?;
        Ok(self)
    }

    pub fn with_metadata(
        mut self,
        metadata: RayMetadata<B>,
    ) -> Result<Self, Error> {
        self.metadata = metadata;
        self.validate()?;
        Ok(self)
    }

    /// `N`
    #[inline]
    pub fn ray_count(&self) -> usize {
        self.origins.dims()[0]
    }

    #[inline]
    pub fn device(&self) -> B::Device {
        self.origins.device()
    }

    /// The unit view directions, falling back to the normalized ray directions.
    ///
    /// The shape is `[N, 3]`.
    pub fn view_directions_or_default(&self) -> Tensor<B, 2> {
        match &self.view_directions {
            Some(view_directions) => view_directions.to_owned(),
            None => Self::normalize(self.directions.to_owned()),
        }
    }

    /// The rays in `range`, with their metadata.
    pub fn slice(
        &self,
        range: Range<usize>,
    ) -> Self {
        let ray_count = self.ray_count();
        let start = range.start.min(ray_count);
        let end = range.end.clamp(start, ray_count);
        let rows = [start..end, 0..3];

        Self {
            origins: self.origins.to_owned().slice(rows.to_owned()),
            directions: self.directions.to_owned().slice(rows.to_owned()),
            nears: self.nears.to_owned().slice([start..end, 0..1]),
            fars: self.fars.to_owned().slice([start..end, 0..1]),
            view_directions: self
                .view_directions
                .as_ref()
                .map(|v| v.to_owned().slice(rows.to_owned())),
            metadata: self.metadata.slice(start..end),
        }
    }

    /// Checking that every member agrees on the ray count.
    pub fn validate(&self) -> Result<(), Error> {
        let ray_count = self.ray_count();

        check_dims("origins", &self.origins.dims(), &[ray_count, 3])?;
        check_dims("directions", &self.directions.dims(), &[ray_count, 3])?;
        check_dims("nears", &self.nears.dims(), &[ray_count, 1])?;
        check_dims("fars", &self.fars.dims(), &[ray_count, 1])?;
        if let Some(view_directions) = &self.view_directions {
            check_dims(
                "view_directions",
                &view_directions.dims(),
                &[ray_count, 3],
            )?;
        }
        if let Some(ids) = &self.metadata.appearance_ids {
            check_dims("metadata.appearance_ids", &ids.dims(), &[ray_count])?;
        }
        if let Some(ids) = &self.metadata.camera_ids {
            check_dims("metadata.camera_ids", &ids.dims(), &[ray_count])?;
        }
        if let Some(ids) = &self.metadata.warp_ids {
            check_dims("metadata.warp_ids", &ids.dims(), &[ray_count])?;
        }
        if let Some(times) = &self.metadata.times {
            check_dims("metadata.times", &times.dims(), &[ray_count, 1])?;
        }
        if let Some(codes) = &self.metadata.warp_codes {
            let [count, channel_count] = codes.dims();
            check_dims(
                "metadata.warp_codes",
                &[count, channel_count],
                &[ray_count, channel_count],
            )?;
        }

        Ok(())
    }

    /// Scaling the vectors of shape `[N, 3]` to unit length.
    pub fn normalize(vectors: Tensor<B, 2>) -> Tensor<B, 2> {
        vectors
            .to_owned()
            .div(vectors.powf_scalar(2.0).sum_dim(1).sqrt())
    }
}

impl<B: Backend> RayMetadata<B> {
    pub fn slice(
        &self,
        range: Range<usize>,
    ) -> Self {
        Self {
            appearance_ids: self
                .appearance_ids
                .as_ref()
                .map(|ids| ids.to_owned().slice([range.to_owned()])),
            camera_ids: self
                .camera_ids
                .as_ref()
                .map(|ids| ids.to_owned().slice([range.to_owned()])),
            warp_ids: self
                .warp_ids
                .as_ref()
                .map(|ids| ids.to_owned().slice([range.to_owned()])),
            times: self
                .times
                .as_ref()
                .map(|times| times.to_owned().slice([range.to_owned(), 0..1])),
            warp_codes: self.warp_codes.as_ref().map(|codes| {
                let [_, channel_count] = codes.dims();
                codes.to_owned().slice([range.to_owned(), 0..channel_count])
            }),
        }
    }
}

fn check_dims(
    name: &str,
    dims: &[usize],
    target: &[usize],
) -> Result<(), Error> {
    if dims == target {
        Ok(())
    } else {
        Err(Error::MismatchedShape(
            name.into(),
            format!("{target:?}"),
            format!("{dims:?}"),
        ))
    }
}

impl<B: Backend> Default for RayMetadata<B> {
    fn default() -> Self {
        Self {
            appearance_ids: None,
            camera_ids: None,
            warp_ids: None,
            times: None,
            warp_codes: None,
        }
    }
}

impl<B: Backend> fmt::Debug for RayBatch<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("RayBatch<{}>", B::name()))
            .field("origins.dims()", &self.origins.dims())
            .field("directions.dims()", &self.directions.dims())
            .field("nears.dims()", &self.nears.dims())
            .field("fars.dims()", &self.fars.dims())
            .field(
                "view_directions.dims()",
                &self.view_directions.as_ref().map(Tensor::dims),
            )
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl<B: Backend> fmt::Debug for RayMetadata<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("RayMetadata")
            .field(
                "appearance_ids.dims()",
                &self.appearance_ids.as_ref().map(Tensor::dims),
            )
            .field(
                "camera_ids.dims()",
                &self.camera_ids.as_ref().map(Tensor::dims),
            )
            .field(
                "warp_ids.dims()",
                &self.warp_ids.as_ref().map(Tensor::dims),
            )
            .field("times.dims()", &self.times.as_ref().map(Tensor::dims))
            .field(
                "warp_codes.dims()",
                &self.warp_codes.as_ref().map(Tensor::dims),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn new_with_scalar_bounds() {
        use super::*;
        use burn::{backend::NdArray, tensor::TensorData};

        type B = NdArray<f32>;
        let device = &Default::default();

        let origins = Tensor::<B, 2>::zeros([3, 3], device);
        let directions = Tensor::<B, 2>::from_data(
            [[0.0, 0.0, 2.0], [3.0, 0.0, 4.0], [0.0, -1.0, 0.0]],
            device,
        );
        let rays = RayBatch::new(origins, directions, 0.5, 4.0).unwrap();

        assert_eq!(rays.ray_count(), 3);
        rays.nears
            .to_owned()
            .into_data()
            .assert_eq(&TensorData::from([[0.5f32], [0.5], [0.5]]), true);
        rays.fars
            .to_owned()
            .into_data()
            .assert_eq(&TensorData::from([[4.0f32], [4.0], [4.0]]), true);

        rays.view_directions_or_default().into_data().assert_approx_eq(
            &TensorData::from([
                [0.0f32, 0.0, 1.0],
                [0.6, 0.0, 0.8],
                [0.0, -1.0, 0.0],
            ]),
            6,
        );
    }

    #[test]
    fn with_bounds_rejects_mismatched_shapes() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let origins = Tensor::<B, 2>::zeros([4, 3], device);
        let directions = Tensor::<B, 2>::ones([4, 3], device);
        let nears = Tensor::<B, 2>::zeros([3, 1], device);
        let fars = Tensor::<B, 2>::ones([4, 1], device);

        let error =
            RayBatch::with_bounds(origins, directions, nears, fars).unwrap_err();
        assert!(
            matches!(error, Error::MismatchedShape(ref name, _, _) if name == "nears"),
            "{error}"
        );
    }

    #[test]
    fn with_metadata_rejects_mismatched_ids() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let rays = RayBatch::new(
            Tensor::<B, 2>::zeros([2, 3], device),
            Tensor::<B, 2>::ones([2, 3], device),
            0.0,
            1.0,
        )
        .unwrap();
        let metadata = RayMetadata {
            appearance_ids: Some(Tensor::<B, 1, Int>::from_data([0, 1, 2], device)),
            ..Default::default()
        };

        assert!(rays.to_owned().with_metadata(metadata).is_err());

        let metadata = RayMetadata {
            times: Some(Tensor::<B, 2>::zeros([2, 2], device)),
            ..Default::default()
        };
        let error = rays.with_metadata(metadata).unwrap_err();
        assert!(
            matches!(error, Error::MismatchedShape(ref name, _, _) if name == "metadata.times"),
            "{error}"
        );
    }

    #[test]
    fn slice() {
        use super::*;
        use burn::{backend::NdArray, tensor::TensorData};

        type B = NdArray<f32>;
        let device = &Default::default();

        let origins = Tensor::<B, 2>::from_data(
            [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]],
            device,
        );
        let directions = Tensor::<B, 2>::ones([3, 3], device);
        let metadata = RayMetadata {
            camera_ids: Some(Tensor::<B, 1, Int>::from_data([4, 5, 6], device)),
            warp_ids: Some(Tensor::<B, 1, Int>::from_data([7, 8, 9], device)),
            times: Some(Tensor::<B, 2>::from_data([[0.0], [0.5], [1.0]], device)),
            warp_codes: Some(Tensor::<B, 2>::from_data(
                [[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]],
                device,
            )),
            ..Default::default()
        };
        let rays = RayBatch::new(origins, directions, 0.0, 1.0)
            .unwrap()
            .with_metadata(metadata)
            .unwrap();

        let sliced = rays.slice(1..5);

        assert_eq!(sliced.ray_count(), 2);
        sliced.validate().unwrap();
        sliced.origins.into_data().assert_eq(
            &TensorData::from([[1.0f32, 1.0, 1.0], [2.0, 2.0, 2.0]]),
            true,
        );
        assert_eq!(
            sliced
                .metadata
                .camera_ids
                .unwrap()
                .into_data()
                .to_vec::<i64>()
                .unwrap(),
            vec![5, 6]
        );
        assert_eq!(
            sliced
                .metadata
                .warp_ids
                .unwrap()
                .into_data()
                .to_vec::<i64>()
                .unwrap(),
            vec![8, 9]
        );
        sliced
            .metadata
            .times
            .unwrap()
            .into_data()
            .assert_eq(&TensorData::from([[0.5f32], [1.0]]), true);
        sliced.metadata.warp_codes.unwrap().into_data().assert_approx_eq(
            &TensorData::from([[0.3f32, 0.4], [0.5, 0.6]]),
            6,
        );
    }
}
