//! Numerical health reports.
//!
//! Non-finite outputs are reported here and logged, but never raised.

pub use burn::tensor::{backend::Backend, Tensor};

use rayon::prelude::*;
use std::fmt;

/// The pass of the rendering.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RenderPass {
    Coarse,
    Fine,
}

/// An output field containing non-finite values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NumericalIssue {
    pub pass: RenderPass,
    pub field: &'static str,
    pub has_inf: bool,
    pub has_nan: bool,
}

/// The health report of a rendering call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Diagnostics {
    pub issues: Vec<NumericalIssue>,
}

impl Diagnostics {
    /// Inspecting a field for NaN or Inf values.
    ///
    /// It reads the tensor back to the host.
    pub fn inspect<B: Backend, const D: usize>(
        &mut self,
        pass: RenderPass,
        field: &'static str,
        tensor: &Tensor<B, D>,
    ) -> &mut Self {
        let data = tensor.to_owned().into_data().convert::<f32>();
        let values = match data.as_slice::<f32>() {
            Ok(values) => values,
            Err(error) => {
                log::warn!(
                    target: "warpnerf_renderer::render",
                    "[Numerical Error] {pass} {field} is unreadable: {error:?}",
                );
                return self;
            }
        };

        let has_nan = values.par_iter().any(|value| value.is_nan());
        let has_inf = values.par_iter().any(|value| value.is_infinite());

        if has_nan || has_inf {
            let issue = NumericalIssue {
                pass,
                field,
                has_inf,
                has_nan,
            };
            log::warn!(target: "warpnerf_renderer::render", "{issue}");
            self.issues.push(issue);
        }

        self
    }

    /// `true` if no field contains NaN or Inf.
    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for RenderPass {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Coarse => f.write_str("coarse"),
            Self::Fine => f.write_str("fine"),
        }
    }
}

impl fmt::Display for NumericalIssue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let kind = match (self.has_nan, self.has_inf) {
            (true, true) => "nan and inf",
            (true, false) => "nan",
            (false, true) => "inf",
            (false, false) => "no non-finite value",
        };
        write!(
            f,
            "[Numerical Error] {} {} contains {kind}",
            self.pass, self.field
        )
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn inspect_finite() {
        use super::*;
        use burn::backend::NdArray;

        let device = &Default::default();
        let tensor = Tensor::<NdArray<f32>, 2>::from_data([[0.0, 1e30], [-1.0, 2.0]], device);

        let mut diagnostics = Diagnostics::default();
        diagnostics.inspect(RenderPass::Coarse, "rgb", &tensor);

        assert!(diagnostics.is_healthy());
    }

    #[test]
    fn inspect_non_finite() {
        use super::*;
        use burn::backend::NdArray;

        let device = &Default::default();
        let with_nan = Tensor::<NdArray<f32>, 1>::from_data([0.0, f32::NAN], device);
        let with_inf = Tensor::<NdArray<f32>, 1>::from_data([f32::INFINITY, 1.0], device);
        let with_both = Tensor::<NdArray<f32>, 1>::from_data(
            [f32::NEG_INFINITY, f32::NAN],
            device,
        );

        let mut diagnostics = Diagnostics::default();
        diagnostics
            .inspect(RenderPass::Coarse, "disparity", &with_nan)
            .inspect(RenderPass::Fine, "depth", &with_inf)
            .inspect(RenderPass::Fine, "rgb", &with_both);

        assert!(!diagnostics.is_healthy());
        assert_eq!(
            diagnostics.issues,
            vec![
                NumericalIssue {
                    pass: RenderPass::Coarse,
                    field: "disparity",
                    has_inf: false,
                    has_nan: true,
                },
                NumericalIssue {
                    pass: RenderPass::Fine,
                    field: "depth",
                    has_inf: true,
                    has_nan: false,
                },
                NumericalIssue {
                    pass: RenderPass::Fine,
                    field: "rgb",
                    has_inf: true,
                    has_nan: true,
                },
            ]
        );
        assert_eq!(
            diagnostics.issues[0].to_string(),
            "[Numerical Error] coarse disparity contains nan"
        );
    }
}
