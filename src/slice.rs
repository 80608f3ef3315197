//! One-dimensional transport along a single direction.
//!
//! On the line, the optimal coupling between two equal-size uniform point
//! sets is the monotone rearrangement: the `i`-th smallest source projection
//! goes to the `i`-th smallest target projection. The step below computes
//! that matching and turns each scalar gap back into a 3-vector along the
//! direction.
//!
//! Ties in projection value are broken by point index, which makes the
//! permutation a pure function of the projections.

use crate::cloud::ColorPointCloud;
use crate::direction::Direction;
use ndarray::{Array2, ArrayView2};

/// Working buffers for one batch worker.
///
/// Allocated once per solve and reused on every iteration.
#[derive(Debug, Clone)]
pub struct SliceWorkspace {
    current_proj: Vec<f32>,
    target_proj: Vec<f32>,
    current_perm: Vec<usize>,
    target_perm: Vec<usize>,
    contribution: Array2<f32>,
}

impl SliceWorkspace {
    /// Buffers for clouds of `n` points.
    pub fn new(n: usize) -> Self {
        Self {
            current_proj: vec![0.0; n],
            target_proj: vec![0.0; n],
            current_perm: (0..n).collect(),
            target_perm: (0..n).collect(),
            contribution: Array2::zeros((n, 3)),
        }
    }

    /// Number of points these buffers were sized for.
    pub fn len(&self) -> usize {
        self.current_proj.len()
    }

    /// `true` if sized for empty clouds.
    pub fn is_empty(&self) -> bool {
        self.current_proj.is_empty()
    }

    /// The contribution written by the last [`transport_step`].
    pub fn contribution(&self) -> ArrayView2<'_, f32> {
        self.contribution.view()
    }

    /// Source indices in ascending projection order from the last step.
    pub fn current_permutation(&self) -> &[usize] {
        &self.current_perm
    }

    /// Target indices in ascending projection order from the last step.
    pub fn target_permutation(&self) -> &[usize] {
        &self.target_perm
    }
}

/// Match `current` to `target` along `direction` and write the displacement
/// contribution into `ws`.
///
/// For rank `i`, the current point at `current_perm[i]` receives
/// `(target_proj[target_perm[i]] - current_proj[current_perm[i]]) * direction`.
///
/// Panics if the two clouds or the workspace differ in length; the solver
/// checks this once when the job is built.
pub fn transport_step(
    current: &ArrayView2<'_, f32>,
    target: &ArrayView2<'_, f32>,
    direction: Direction,
    ws: &mut SliceWorkspace,
) {
    let n = ws.len();
    assert_eq!(current.nrows(), n, "current cloud length mismatch");
    assert_eq!(target.nrows(), n, "target cloud length mismatch");

    project_into(current, direction, &mut ws.current_proj);
    project_into(target, direction, &mut ws.target_proj);

    argsort_into(&ws.current_proj, &mut ws.current_perm);
    argsort_into(&ws.target_proj, &mut ws.target_perm);

    let d = direction.components();
    for (&ci, &ti) in ws.current_perm.iter().zip(&ws.target_perm) {
        let gap = ws.target_proj[ti] - ws.current_proj[ci];
        let mut row = ws.contribution.row_mut(ci);
        row[0] = gap * d[0];
        row[1] = gap * d[1];
        row[2] = gap * d[2];
    }
}

/// Allocating form of [`transport_step`], returning the contribution.
pub fn transport_contribution(
    current: &ColorPointCloud,
    target: &ColorPointCloud,
    direction: Direction,
) -> Array2<f32> {
    let mut ws = SliceWorkspace::new(current.len());
    transport_step(&current.view(), &target.view(), direction, &mut ws);
    ws.contribution
}

fn project_into(points: &ArrayView2<'_, f32>, direction: Direction, out: &mut [f32]) {
    let d = direction.components();
    for (o, p) in out.iter_mut().zip(points.outer_iter()) {
        *o = d[0] * p[0] + d[1] * p[1] + d[2] * p[2];
    }
}

/// Sort `perm` by `(keys[i], i)` ascending.
///
/// `perm` must already hold a permutation of `0..keys.len()`; its current
/// order does not affect the result.
fn argsort_into(keys: &[f32], perm: &mut [usize]) {
    perm.sort_unstable_by(|&a, &b| keys[a].total_cmp(&keys[b]).then(a.cmp(&b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn x_axis() -> Direction {
        Direction::new([1.0, 0.0, 0.0]).unwrap()
    }

    #[test]
    fn two_point_matching_is_sorted_pairing() {
        let current = ColorPointCloud::from_points(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]);
        let target = ColorPointCloud::from_points(&[[5.0, 0.0, 0.0], [5.0, 0.0, 0.0]]);
        let c = transport_contribution(&current, &target, x_axis());
        assert_eq!(c.row(0).to_vec(), vec![5.0, 0.0, 0.0]);
        assert_eq!(c.row(1).to_vec(), vec![-5.0, 0.0, 0.0]);
    }

    #[test]
    fn crossed_pairs_are_uncrossed() {
        let current = ColorPointCloud::from_points(&[[3.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let target = ColorPointCloud::from_points(&[[20.0, 0.0, 0.0], [10.0, 0.0, 0.0]]);
        let c = transport_contribution(&current, &target, x_axis());
        // 1 -> 10 and 3 -> 20
        assert_eq!(c.row(1).to_vec(), vec![9.0, 0.0, 0.0]);
        assert_eq!(c.row(0).to_vec(), vec![17.0, 0.0, 0.0]);
    }

    #[test]
    fn ties_break_by_index() {
        let keys = [1.0, 0.0, 1.0, 0.0];
        let mut perm = vec![3, 2, 1, 0];
        argsort_into(&keys, &mut perm);
        assert_eq!(perm, vec![1, 3, 0, 2]);
    }

    #[test]
    fn contribution_lies_along_direction() {
        let d = Direction::new([1.0, 2.0, -2.0]).unwrap();
        let current = ColorPointCloud::from_points(&[[10.0, 20.0, 30.0], [0.0, 5.0, 1.0]]);
        let target = ColorPointCloud::from_points(&[[100.0, 0.0, 0.0], [0.0, 100.0, 0.0]]);
        let c = transport_contribution(&current, &target, d);
        let dc = d.components();
        for row in c.outer_iter() {
            // row is a scalar multiple of d
            let s = row[0] * dc[0] + row[1] * dc[1] + row[2] * dc[2];
            for k in 0..3 {
                assert!((row[k] - s * dc[k]).abs() < 1e-3);
            }
        }
    }

    proptest! {
        #[test]
        fn constant_clouds_need_no_displacement(
            c in prop::array::uniform3(-300.0f32..300.0),
            v in prop::array::uniform3(-1.0f32..1.0),
            n in 1usize..32,
        ) {
            prop_assume!(Direction::new(v).is_some());
            let d = Direction::new(v).unwrap();
            let pts = vec![c; n];
            let a = ColorPointCloud::from_points(&pts);
            let b = ColorPointCloud::from_points(&pts);
            let out = transport_contribution(&a, &b, d);
            prop_assert!(out.iter().all(|&x| x == 0.0));
        }

        #[test]
        fn permutations_are_bijections(
            pts in prop::collection::vec(prop::array::uniform3(0.0f32..255.0), 1..64),
            v in prop::array::uniform3(-1.0f32..1.0),
        ) {
            prop_assume!(Direction::new(v).is_some());
            let d = Direction::new(v).unwrap();
            let a = ColorPointCloud::from_points(&pts);
            let mut rev = pts.clone();
            rev.reverse();
            let b = ColorPointCloud::from_points(&rev);
            let mut ws = SliceWorkspace::new(a.len());
            transport_step(&a.view(), &b.view(), d, &mut ws);
            for perm in [ws.current_permutation(), ws.target_permutation()] {
                let mut seen = vec![false; perm.len()];
                for &i in perm {
                    prop_assert!(!seen[i]);
                    seen[i] = true;
                }
            }
        }

        #[test]
        fn matched_projections_equal_target_quantiles(
            pts in prop::collection::vec(prop::array::uniform3(0.0f32..255.0), 1..48),
            tgt_seed in prop::collection::vec(prop::array::uniform3(0.0f32..255.0), 48),
        ) {
            let n = pts.len();
            let a = ColorPointCloud::from_points(&pts);
            let b = ColorPointCloud::from_points(&tgt_seed[..n]);
            let d = x_axis();
            let c = transport_contribution(&a, &b, d);
            let mut moved: Vec<f32> = (0..n).map(|i| pts[i][0] + c[[i, 0]]).collect();
            let mut want: Vec<f32> = tgt_seed[..n].iter().map(|p| p[0]).collect();
            moved.sort_by(|x, y| x.total_cmp(y));
            want.sort_by(|x, y| x.total_cmp(y));
            for (m, w) in moved.iter().zip(&want) {
                prop_assert!((m - w).abs() < 1e-3);
            }
        }
    }
}
