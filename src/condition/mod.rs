//! Per-ray conditioning assembled from ordered contributors.

pub use crate::{
    encode::{GloEncoder, SinusoidalEncoder},
    error::Error,
    ray::RayBatch,
};
pub use burn::tensor::{backend::Backend, Tensor};

use std::{fmt, ops::Range};

/// A named source of per-ray conditioning.
pub trait ConditionContributor<B: Backend> {
    /// The name reported in errors and logs.
    fn name(&self) -> &str;

    /// The width of the contribution.
    fn dim_output(&self) -> usize;

    /// Computing the contribution of every ray.
    ///
    /// The shape is `[N, dim_output]`.
    fn contribute(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Tensor<B, 2>, Error>;
}

/// Where a contribution enters the scene field.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConditionTarget {
    /// The input of the trunk, next to the encoded points.
    Trunk,
    /// The density head, after the bottleneck.
    Alpha,
    /// The color branch, after the bottleneck.
    Rgb,
}

/// The condition widths per target.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ConditionDims {
    pub trunk: usize,
    pub alpha: usize,
    pub rgb: usize,
}

/// The per-ray or per-point conditions per target.
///
/// A target without contributions is `None`.
#[derive(Clone)]
pub struct Conditions<B: Backend> {
    pub trunk: Option<Tensor<B, 2>>,
    pub alpha: Option<Tensor<B, 2>>,
    pub rgb: Option<Tensor<B, 2>>,
}

/// Appearance codes looked up by [`appearance_ids`](crate::ray::RayMetadata::appearance_ids).
#[derive(Debug)]
pub struct AppearanceCondition<B: Backend> {
    pub encoder: GloEncoder<B>,
}

/// Camera codes looked up by [`camera_ids`](crate::ray::RayMetadata::camera_ids).
#[derive(Debug)]
pub struct CameraCondition<B: Backend> {
    pub encoder: GloEncoder<B>,
}

/// Encoded unit view directions.
#[derive(Clone, Debug)]
pub struct ViewDirectionCondition {
    pub encoder: SinusoidalEncoder,
}

/// Contributors concatenated per target in their declared order.
pub struct Conditioning<B: Backend> {
    pub sources: Vec<ConditionSource<B>>,
}

/// A contributor and the targets it feeds.
pub struct ConditionSource<B: Backend> {
    pub contributor: Box<dyn ConditionContributor<B>>,
    pub targets: Vec<ConditionTarget>,
}

impl ConditionDims {
    #[inline]
    pub fn get(
        &self,
        target: ConditionTarget,
    ) -> usize {
        match target {
            ConditionTarget::Trunk => self.trunk,
            ConditionTarget::Alpha => self.alpha,
            ConditionTarget::Rgb => self.rgb,
        }
    }

    #[inline]
    pub fn get_mut(
        &mut self,
        target: ConditionTarget,
    ) -> &mut usize {
        match target {
            ConditionTarget::Trunk => &mut self.trunk,
            ConditionTarget::Alpha => &mut self.alpha,
            ConditionTarget::Rgb => &mut self.rgb,
        }
    }
}

impl<B: Backend> Conditions<B> {
    #[inline]
    pub fn new() -> Self {
        Self {
            trunk: None,
            alpha: None,
            rgb: None,
        }
    }

    #[inline]
    pub fn get(
        &self,
        target: ConditionTarget,
    ) -> Option<&Tensor<B, 2>> {
        match target {
            ConditionTarget::Trunk => self.trunk.as_ref(),
            ConditionTarget::Alpha => self.alpha.as_ref(),
            ConditionTarget::Rgb => self.rgb.as_ref(),
        }
    }

    /// The widths of the present conditions.
    pub fn dims(&self) -> ConditionDims {
        let dim = |condition: &Option<Tensor<B, 2>>| {
            condition.as_ref().map_or(0, |condition| condition.dims()[1])
        };
        ConditionDims {
            trunk: dim(&self.trunk),
            alpha: dim(&self.alpha),
            rgb: dim(&self.rgb),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trunk.is_none() && self.alpha.is_none() && self.rgb.is_none()
    }

    /// Applying `f` to every present condition.
    pub fn map(
        self,
        mut f: impl FnMut(Tensor<B, 2>) -> Tensor<B, 2>,
    ) -> Self {
        Self {
            trunk: self.trunk.map(&mut f),
            alpha: self.alpha.map(&mut f),
            rgb: self.rgb.map(&mut f),
        }
    }

    /// The rows in `range` of every present condition.
    pub fn slice(
        &self,
        range: Range<usize>,
    ) -> Self {
        self.to_owned()
            .map(|condition| condition.slice([range.to_owned()]))
    }
}

impl<B: Backend> Conditioning<B> {
    #[inline]
    pub fn new() -> Self {
        Self { sources: vec![] }
    }

    /// Appending a contributor for the color branch.
    #[inline]
    pub fn with(
        self,
        contributor: impl ConditionContributor<B> + 'static,
    ) -> Self {
        self.with_targets(contributor, [ConditionTarget::Rgb])
    }

    /// Appending a contributor for each of the targets.
    pub fn with_targets(
        mut self,
        contributor: impl ConditionContributor<B> + 'static,
        targets: impl IntoIterator<Item = ConditionTarget>,
    ) -> Self {
        let targets = targets.into_iter().fold(vec![], |mut targets, target| {
            if !targets.contains(&target) {
                targets.push(target);
            }
            targets
        });
        self.sources.push(ConditionSource {
            contributor: Box::new(contributor),
            targets,
        });
        self
    }

    /// The total widths of the contributions per target.
    pub fn dims(&self) -> ConditionDims {
        self.sources
            .iter()
            .fold(ConditionDims::default(), |mut dims, source| {
                let dim = source.contributor.dim_output();
                source.targets.iter().for_each(|target| {
                    *dims.get_mut(*target) += dim;
                });
                dims
            })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Concatenating the contributions per ray and per target.
    ///
    /// Each contributor is computed once even if it feeds several targets.
    ///
    /// ## Shapes
    ///
    /// * `output.trunk` - `[N, dims.trunk]`
    /// * `output.alpha` - `[N, dims.alpha]`
    /// * `output.rgb` - `[N, dims.rgb]`
    pub fn assemble(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Conditions<B>, Error> {
        let ray_count = rays.ray_count();
        let mut trunk = vec![];
        let mut alpha = vec![];
        let mut rgb = vec![];

        for source in &self.sources {
            if source.targets.is_empty() {
                continue;
            }

            let contributor = &source.contributor;
            let contribution = contributor.contribute(rays)?;
            let dims = contribution.dims();
            let dims_expected = [ray_count, contributor.dim_output()];
            if dims != dims_expected {
                return Err(Error::MismatchedShape(
                    format!("condition {}", contributor.name()),
                    format!("{dims_expected:?}"),
                    format!("{dims:?}"),
                ));
            }

            for target in &source.targets {
                let contributions = match target {
                    ConditionTarget::Trunk => &mut trunk,
                    ConditionTarget::Alpha => &mut alpha,
                    ConditionTarget::Rgb => &mut rgb,
                };
                contributions.push(contribution.to_owned());
            }
        }

        let cat = |contributions: Vec<Tensor<B, 2>>| {
            (!contributions.is_empty()).then(|| Tensor::cat(contributions, 1))
        };
        Ok(Conditions {
            trunk: cat(trunk),
            alpha: cat(alpha),
            rgb: cat(rgb),
        })
    }
}

impl<B: Backend> ConditionContributor<B> for ViewDirectionCondition {
    fn name(&self) -> &str {
        "view_directions"
    }

    fn dim_output(&self) -> usize {
        self.encoder.dim_output(3)
    }

    fn contribute(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Tensor<B, 2>, Error> {
        Ok(self.encoder.forward(rays.view_directions_or_default()))
    }
}

impl<B: Backend> ConditionContributor<B> for AppearanceCondition<B> {
    fn name(&self) -> &str {
        "appearance_ids"
    }

    fn dim_output(&self) -> usize {
        self.encoder.dim_output()
    }

    fn contribute(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Tensor<B, 2>, Error> {
        self.encoder.lookup(
            rays.metadata.appearance_ids.as_ref(),
            ConditionContributor::<B>::name(self),
        )
    }
}

impl<B: Backend> ConditionContributor<B> for CameraCondition<B> {
    fn name(&self) -> &str {
        "camera_ids"
    }

    fn dim_output(&self) -> usize {
        self.encoder.dim_output()
    }

    fn contribute(
        &self,
        rays: &RayBatch<B>,
    ) -> Result<Tensor<B, 2>, Error> {
        self.encoder.lookup(
            rays.metadata.camera_ids.as_ref(),
            ConditionContributor::<B>::name(self),
        )
    }
}

impl<B: Backend> Default for Conditions<B> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for Conditions<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct(&format!("Conditions<{}>", B::name()))
            .field("dims", &self.dims())
            .finish()
    }
}

impl<B: Backend> Default for Conditioning<B> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> fmt::Debug for Conditioning<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Conditioning")
            .field(
                "sources",
                &self
                    .sources
                    .iter()
                    .map(|source| (source.contributor.name(), &source.targets))
                    .collect::<Vec<_>>(),
            )
            .field("dims", &self.dims())
            .finish()
    }
}
