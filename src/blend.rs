//! Barycentric blending of transport fields onto a source cloud.
//!
//! `output = source * u + Σ_k (source + field_k) * w_k` with `u = 1 - Σ w_k`,
//! which reduces to `source + Σ_k field_k * w_k`. Weights are not restricted
//! to the simplex: negative weights or a sum above one extrapolate past the
//! source or the targets. Nothing is clamped here.

use crate::cloud::{ColorPointCloud, DisplacementField};
use crate::{Error, Result};
use tracing::warn;

/// A source cloud and the weighted fields to apply to it.
#[derive(Debug, Clone)]
pub struct BlendRequest {
    pub source: ColorPointCloud,
    pub fields: Vec<(DisplacementField, f32)>,
}

impl BlendRequest {
    pub fn new(source: ColorPointCloud) -> Self {
        Self {
            source,
            fields: Vec::new(),
        }
    }

    /// Add a field with its weight.
    pub fn with_field(mut self, field: DisplacementField, weight: f32) -> Self {
        self.fields.push((field, weight));
        self
    }

    /// The implicit weight of the untouched source, `1 - Σ w_k`.
    pub fn source_weight(&self) -> f32 {
        source_weight(self.fields.iter().map(|(_, w)| *w))
    }

    /// Produce the blended cloud.
    pub fn blend(&self) -> Result<ColorPointCloud> {
        let pairs: Vec<(&DisplacementField, f32)> = self.fields.iter().map(|(f, w)| (f, *w)).collect();
        blend(&self.source, &pairs)
    }
}

/// `1 - Σ weights`.
pub fn source_weight(weights: impl IntoIterator<Item = f32>) -> f32 {
    1.0 - weights.into_iter().sum::<f32>()
}

/// Apply each `(field, weight)` pair to a copy of `source`.
pub fn blend(source: &ColorPointCloud, fields: &[(&DisplacementField, f32)]) -> Result<ColorPointCloud> {
    for (field, weight) in fields {
        if field.len() != source.len() {
            return Err(Error::ShapeMismatch(source.len(), field.len()));
        }
        if !weight.is_finite() {
            return Err(Error::InvalidConfig(format!("blend weight must be finite, got {weight}")));
        }
    }

    let u = source_weight(fields.iter().map(|(_, w)| *w));
    if fields.iter().any(|(_, w)| *w < 0.0) || u < 0.0 {
        warn!(source_weight = u, "weights fall outside the simplex; extrapolating");
    }

    let mut out = source.clone();
    for (field, weight) in fields {
        if *weight != 0.0 {
            out.displace(field, *weight)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cloud() -> ColorPointCloud {
        ColorPointCloud::from_points(&[[10.0, 20.0, 30.0], [200.0, 100.0, 0.0]])
    }

    fn field() -> DisplacementField {
        let to = ColorPointCloud::from_points(&[[15.0, 10.0, 30.0], [255.0, 90.0, 50.0]]);
        DisplacementField::between(&cloud(), &to).unwrap()
    }

    #[test]
    fn weight_zero_is_identity() {
        let f = field();
        assert_eq!(blend(&cloud(), &[(&f, 0.0)]).unwrap(), cloud());
    }

    #[test]
    fn weight_one_reaches_source_plus_field() {
        let f = field();
        let out = blend(&cloud(), &[(&f, 1.0)]).unwrap();
        assert_eq!(out.point(0), [15.0, 10.0, 30.0]);
        assert_eq!(out.point(1), [255.0, 90.0, 50.0]);
    }

    #[test]
    fn extrapolation_is_not_clamped() {
        let f = field();
        let out = blend(&cloud(), &[(&f, 2.0)]).unwrap();
        assert_eq!(out.point(1), [310.0, 80.0, 100.0]);
        assert_eq!(BlendRequest::new(cloud()).with_field(f, 2.0).source_weight(), -1.0);
    }

    #[test]
    fn rejects_mismatched_field() {
        let f = DisplacementField::zeros(3);
        assert!(matches!(blend(&cloud(), &[(&f, 0.5)]), Err(Error::ShapeMismatch(2, 3))));
    }

    #[test]
    fn rejects_non_finite_weight() {
        let f = field();
        assert!(matches!(blend(&cloud(), &[(&f, f32::NAN)]), Err(Error::InvalidConfig(_))));
    }

    proptest! {
        #[test]
        fn two_fields_match_explicit_barycenter(
            w1 in -1.0f32..2.0,
            w2 in -1.0f32..2.0,
            d in prop::array::uniform3(-50.0f32..50.0),
        ) {
            let src = cloud();
            let f1 = field();
            let shifted = ColorPointCloud::from_points(&[
                [10.0 + d[0], 20.0 + d[1], 30.0 + d[2]],
                [200.0 + d[0], 100.0 + d[1], d[2]],
            ]);
            let f2 = DisplacementField::between(&src, &shifted).unwrap();
            let req = BlendRequest::new(src.clone()).with_field(f1.clone(), w1).with_field(f2.clone(), w2);
            let out = req.blend().unwrap();
            let u = req.source_weight();
            for i in 0..src.len() {
                let s = src.point(i);
                let a = f1.vector(i);
                let b = f2.vector(i);
                let o = out.point(i);
                for c in 0..3 {
                    let want = s[c] * u + (s[c] + a[c]) * w1 + (s[c] + b[c]) * w2;
                    prop_assert!((o[c] - want).abs() < 1e-2, "{} vs {}", o[c], want);
                }
            }
        }
    }
}
