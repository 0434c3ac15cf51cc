//! Bounded minimizers over two parameters.
//! Objective values that are not finite, such as the ones on the boundary where some
//! probability is zero, are regarded as +infinity.

/// Minimize a function in a box.
pub trait Minimizer: Send + Sync {
    /// Return the point in [lower, upper] minimizing `f`, starting from `init`.
    fn minimize(
        &self,
        f: &dyn Fn(&[f64; 2]) -> f64,
        init: [f64; 2],
        lower: [f64; 2],
        upper: [f64; 2],
    ) -> [f64; 2];
}

#[derive(Debug, Clone, Copy)]
pub struct BfgsConfig {
    /// Maximum number of the iterations.
    pub max_iter: usize,
    /// Stop when the relative decrease of the objective is smaller than this value.
    pub tolerance: f64,
    /// Stop when the projected gradient is smaller than this value.
    pub gradient_tolerance: f64,
    /// Step width of the finite difference.
    pub epsilon: f64,
    /// Length of the very first step.
    pub initial_step: f64,
}

impl BfgsConfig {
    pub fn new(
        max_iter: usize,
        tolerance: f64,
        gradient_tolerance: f64,
        epsilon: f64,
        initial_step: f64,
    ) -> Self {
        Self {
            max_iter,
            tolerance,
            gradient_tolerance,
            epsilon,
            initial_step,
        }
    }
}

impl std::default::Default for BfgsConfig {
    fn default() -> Self {
        Self::new(200, 1e-10, 1e-5, 1e-6, 0.05)
    }
}

/// Quasi-Newton minimizer with box constraints. The gradient is approximated by finite differences.
/// A variable sitting on its bound and pushed outward by the gradient is fixed in the iteration.
#[derive(Debug, Clone, Default)]
pub struct BoundedBfgs {
    pub config: BfgsConfig,
}

impl BoundedBfgs {
    pub fn new(config: BfgsConfig) -> Self {
        Self { config }
    }
    fn gradient<F: Fn(&[f64; 2]) -> f64>(
        &self,
        f: &F,
        x: &[f64; 2],
        fx: f64,
        lower: &[f64; 2],
        upper: &[f64; 2],
    ) -> [f64; 2] {
        let mut grad = [0f64; 2];
        for i in 0..2 {
            let h = self.config.epsilon * x[i].abs().max(1f64);
            let (mut left, mut right) = (*x, *x);
            left[i] = (x[i] - h).max(lower[i]);
            right[i] = (x[i] + h).min(upper[i]);
            let (fl, fr) = (f(&left), f(&right));
            grad[i] = match (fl.is_finite(), fr.is_finite()) {
                (true, true) if left[i] < right[i] => (fr - fl) / (right[i] - left[i]),
                (true, _) if left[i] < x[i] => (fx - fl) / (x[i] - left[i]),
                (_, true) if x[i] < right[i] => (fr - fx) / (right[i] - x[i]),
                _ => 0f64,
            };
        }
        grad
    }
}

fn project(x: [f64; 2], lower: &[f64; 2], upper: &[f64; 2]) -> [f64; 2] {
    [
        x[0].max(lower[0]).min(upper[0]),
        x[1].max(lower[1]).min(upper[1]),
    ]
}

fn dot(x: &[f64; 2], y: &[f64; 2]) -> f64 {
    x[0] * y[0] + x[1] * y[1]
}

const IDENTITY: [[f64; 2]; 2] = [[1f64, 0f64], [0f64, 1f64]];

// Inverse Hessian update: H <- (I - r s y^T) H (I - r y s^T) + r s s^T, where r = 1/(y^T s).
fn bfgs_update(h: &[[f64; 2]; 2], s: &[f64; 2], y: &[f64; 2]) -> [[f64; 2]; 2] {
    let r = 1f64 / dot(s, y);
    let hy = [dot(&h[0], y), dot(&h[1], y)];
    let yhy = dot(y, &hy);
    let mut next = [[0f64; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            next[i][j] = h[i][j] - r * (s[i] * hy[j] + hy[i] * s[j])
                + (r * r * yhy + r) * s[i] * s[j];
        }
    }
    next
}

impl Minimizer for BoundedBfgs {
    fn minimize(
        &self,
        f: &dyn Fn(&[f64; 2]) -> f64,
        init: [f64; 2],
        lower: [f64; 2],
        upper: [f64; 2],
    ) -> [f64; 2] {
        let eval = |x: &[f64; 2]| match f(x) {
            v if v.is_finite() => v,
            _ => f64::INFINITY,
        };
        let center = [(lower[0] + upper[0]) / 2f64, (lower[1] + upper[1]) / 2f64];
        let mut x = project(init, &lower, &upper);
        let mut fx = eval(&x);
        // Pull the start toward the center until the objective becomes finite.
        for _ in 0..50 {
            if fx.is_finite() {
                break;
            }
            x = [(x[0] + center[0]) / 2f64, (x[1] + center[1]) / 2f64];
            fx = eval(&x);
        }
        if !fx.is_finite() {
            warn!("The objective is not finite around {:?}", init);
            return x;
        }
        let mut grad = self.gradient(&eval, &x, fx, &lower, &upper);
        let mut hessian = IDENTITY;
        let mut scaled = false;
        let mut prev_free = [true, true];
        for t in 0..self.config.max_iter {
            // Fix variables on the bounds pushed outward.
            let free = [0usize, 1].map(|i| {
                !((x[i] <= lower[i] && 0f64 < grad[i]) || (upper[i] <= x[i] && grad[i] < 0f64))
            });
            let pgrad = [0usize, 1].map(|i| if free[i] { grad[i] } else { 0f64 });
            if dot(&pgrad, &pgrad).sqrt() < self.config.gradient_tolerance {
                trace!("BFGS\tConverged by gradient\t{}", t);
                break;
            }
            if free != prev_free {
                hessian = IDENTITY;
                scaled = false;
                prev_free = free;
            }
            let mut dir = [0usize, 1].map(|i| {
                if free[i] {
                    -dot(&hessian[i], &pgrad)
                } else {
                    0f64
                }
            });
            if 0f64 <= dot(&dir, &pgrad) {
                hessian = IDENTITY;
                scaled = false;
                dir = [-pgrad[0], -pgrad[1]];
            }
            if !scaled {
                let norm = dir[0].abs().max(dir[1].abs());
                dir.iter_mut()
                    .for_each(|d| *d *= self.config.initial_step / norm);
            }
            // Backtracking line search along the projected path.
            let mut step = 1f64;
            let mut accepted = None;
            while 1e-12 < step {
                let next = project(
                    [x[0] + step * dir[0], x[1] + step * dir[1]],
                    &lower,
                    &upper,
                );
                let f_next = eval(&next);
                let decrease = dot(&grad, &[x[0] - next[0], x[1] - next[1]]);
                if f_next.is_finite() && f_next <= fx - 1e-4 * decrease && next != x {
                    accepted = Some((next, f_next));
                    break;
                }
                step /= 2f64;
            }
            let (next, f_next) = match accepted {
                Some(res) => res,
                None => {
                    trace!("BFGS\tNo descent\t{}", t);
                    break;
                }
            };
            let next_grad = self.gradient(&eval, &next, f_next, &lower, &upper);
            let s = [next[0] - x[0], next[1] - x[1]];
            let y = [next_grad[0] - grad[0], next_grad[1] - grad[1]];
            let sy = dot(&s, &y);
            if f64::EPSILON < sy {
                if !scaled {
                    let gamma = sy / dot(&y, &y);
                    hessian = [[gamma, 0f64], [0f64, gamma]];
                    scaled = true;
                }
                hessian = bfgs_update(&hessian, &s, &y);
            }
            let converged = (fx - f_next).abs() <= self.config.tolerance * (1f64 + fx.abs());
            trace!("BFGS\t{}\t{:?}\t{:.6}", t, next, f_next);
            x = next;
            fx = f_next;
            grad = next_grad;
            if converged {
                break;
            }
        }
        x
    }
}

/// Coarse-to-fine grid search. Deterministic, and robust to multiple local minima,
/// but it takes `(resolution + 1)^2 * (refine + 1)` evaluations.
#[derive(Debug, Clone, Copy)]
pub struct GridSearch {
    /// Number of intervals along each axis.
    pub resolution: usize,
    /// Number of the refinement around the best point.
    pub refine: usize,
}

impl GridSearch {
    pub fn new(resolution: usize, refine: usize) -> Self {
        assert!(0 < resolution);
        Self { resolution, refine }
    }
}

impl std::default::Default for GridSearch {
    fn default() -> Self {
        Self::new(8, 4)
    }
}

impl Minimizer for GridSearch {
    fn minimize(
        &self,
        f: &dyn Fn(&[f64; 2]) -> f64,
        init: [f64; 2],
        lower: [f64; 2],
        upper: [f64; 2],
    ) -> [f64; 2] {
        let mut best = project(init, &lower, &upper);
        let mut best_value = match f(&best) {
            v if v.is_finite() => v,
            _ => f64::INFINITY,
        };
        let (mut lo, mut hi) = (lower, upper);
        for _ in 0..=self.refine {
            let width = [
                (hi[0] - lo[0]) / self.resolution as f64,
                (hi[1] - lo[1]) / self.resolution as f64,
            ];
            for i in 0..=self.resolution {
                for j in 0..=self.resolution {
                    let x = [lo[0] + width[0] * i as f64, lo[1] + width[1] * j as f64];
                    let value = f(&x);
                    if value.is_finite() && value < best_value {
                        best = x;
                        best_value = value;
                    }
                }
            }
            lo = [
                (best[0] - width[0]).max(lower[0]),
                (best[1] - width[1]).max(lower[1]),
            ];
            hi = [
                (best[0] + width[0]).min(upper[0]),
                (best[1] + width[1]).min(upper[1]),
            ];
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn quadratic(x: &[f64; 2]) -> f64 {
        (x[0] - 0.3).powi(2) + 10f64 * (x[1] - 0.7).powi(2) + (x[0] - 0.3) * (x[1] - 0.7)
    }
    #[test]
    fn bfgs_interior() {
        let opt = BoundedBfgs::default();
        let x = opt.minimize(&quadratic, [0.9, 0.1], [0f64; 2], [1f64; 2]);
        assert!((x[0] - 0.3).abs() < 1e-3, "{:?}", x);
        assert!((x[1] - 0.7).abs() < 1e-3, "{:?}", x);
    }
    #[test]
    fn bfgs_on_bound() {
        let opt = BoundedBfgs::default();
        let f = |x: &[f64; 2]| (x[0] - 1.5).powi(2) + (x[1] + 0.5).powi(2);
        let x = opt.minimize(&f, [0.5, 0.5], [0f64; 2], [1f64; 2]);
        assert!((x[0] - 1.0).abs() < 1e-6, "{:?}", x);
        assert!(x[1].abs() < 1e-6, "{:?}", x);
    }
    #[test]
    fn bfgs_infinite_boundary() {
        let opt = BoundedBfgs::default();
        // -log-likelihood-like function which is +inf at zero.
        let f = |x: &[f64; 2]| -(x[0].ln() * 3f64 + (1f64 - x[0]).ln() * 7f64) + (x[1] - 0.2).powi(2);
        let x = opt.minimize(&f, [0f64, 1f64], [0f64; 2], [1f64; 2]);
        assert!((x[0] - 0.3).abs() < 1e-3, "{:?}", x);
        assert!((x[1] - 0.2).abs() < 1e-3, "{:?}", x);
    }
    #[test]
    fn grid() {
        let opt = GridSearch::default();
        let x = opt.minimize(&quadratic, [0.5, 0.5], [0f64; 2], [1f64; 2]);
        assert!((x[0] - 0.3).abs() < 1e-3, "{:?}", x);
        assert!((x[1] - 0.7).abs() < 1e-3, "{:?}", x);
    }
    #[test]
    fn bfgs_update_satisfies_secant() {
        let h = bfgs_update(&IDENTITY, &[0.1, 0.2], &[0.3, 0.5]);
        let hy = [dot(&h[0], &[0.3, 0.5]), dot(&h[1], &[0.3, 0.5])];
        assert!((hy[0] - 0.1).abs() < 1e-12);
        assert!((hy[1] - 0.2).abs() < 1e-12);
    }
}
