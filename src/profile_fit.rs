//! # Gaussian profile fitting and emittance conversion
//!
//! Each amplitude row of an [`Acquisition`](crate::align::Acquisition) is an
//! amplitude-vs-position curve of one bunch slot. This module conditions the curve
//! (sign flip, baseline removal, area normalization), fits a four-parameter Gaussian
//! density model to it by Levenberg–Marquardt nonlinear least squares, and converts
//! the fitted width into a normalized emittance with its 1-σ uncertainty.
//!
//! ## Model
//!
//! ```text
//! f(x; p) = p0 + p1 · exp(-(x - p2)² / (2·p3²)) / (p3·√2π)
//! ```
//!
//! `p0` is a baseline offset, `p1` the integrated amplitude, `p2` the mean and `p3`
//! the width. The model is even under `(p1, p3) → (-p1, -p3)`; the fit
//! parameterizes the width by its logarithm, so reported widths are positive.
//!
//! A fit that fails to converge is reported as an invalid [`FitResult`] carrying NaN
//! width and emittance, never as an error aborting the batch: negative or NaN
//! `emit_gauss` is the failure marker callers must check for.

use std::f64::consts::PI;

use log::warn;
use nalgebra::{DMatrix, DVector, Matrix2, Matrix4, Vector2, Vector4};

use crate::align::Acquisition;
use crate::bws_errors::BwsError;
use crate::constants::{Gev, Millimeter, Seconds, Slot, EMIT_UNIT_SCALE, PROTON_MASS_GEV};

/// Initial parameter guess `[offset, amplitude, mean, width]` of the Gaussian fit.
pub const GAUSS_FIT_INIT: [f64; 4] = [0.0, 1.0, 0.0, 1000.0];

const MAX_ITERATIONS: usize = 300;
const COST_TOLERANCE: f64 = 1e-12;
const STEP_TOLERANCE: f64 = 1e-10;
const GRADIENT_TOLERANCE: f64 = 1e-12;
const STALL_TOLERANCE: f64 = 1e-6;
const COST_FLOOR: f64 = 1e-24;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;

/// Reconstructed profile and fitted emittance of one `(acquisition, slot)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// Acquisition timestamp.
    pub time: Seconds,
    /// Timestamp of the matched beta/emittance sample.
    pub time_reference: Seconds,
    /// Beam energy \[GeV\] used for the conversion.
    pub energy: Gev,
    /// Wire sampling positions \[mm\].
    pub position: Vec<Millimeter>,
    /// Conditioned amplitude row: sign-normalized, baseline at zero.
    pub amplitude_raw: Vec<f64>,
    /// Probability-density-normalized amplitude row (unit area).
    pub amplitude_normalized: Vec<f64>,
    /// Beta function \[m\] at the scanner.
    pub beta: f64,
    /// Externally computed reference emittance for this slot.
    pub emit_reference: f64,
    /// Normalized emittance from the Gaussian width; NaN or negative on fit failure.
    pub emit_gauss: f64,
    /// 1-σ uncertainty of `emit_gauss`; NaN on fit failure.
    pub emit_gauss_error: f64,
    /// Fitted model parameters `[offset, amplitude, mean, width]`.
    pub fit_params: Vector4<f64>,
    /// Covariance of the fitted parameters.
    pub fit_covariance: Matrix4<f64>,
}

impl FitResult {
    /// Whether the Gaussian fit produced a physical emittance.
    pub fn is_valid(&self) -> bool {
        self.emit_gauss.is_finite() && self.emit_gauss >= 0.0
    }
}

/// Four-parameter Gaussian density model, `p = [offset, amplitude, mean, width]`.
pub fn gauss_pdf(x: f64, p: &Vector4<f64>) -> f64 {
    let u = (x - p[2]) / p[3];
    p[0] + p[1] * (-0.5 * u * u).exp() / (p[3] * (2.0 * PI).sqrt())
}

/// Convert a geometric emittance into a normalized one for a given beam energy.
///
/// The normalization factor is the relativistic `β·γ` of a proton at `energy_gev`.
pub fn emitnorm(eps: f64, energy_gev: Gev) -> f64 {
    let gamma = energy_gev / PROTON_MASS_GEV;
    let beta_rel = (1.0 - 1.0 / (gamma * gamma)).sqrt();
    eps * beta_rel * gamma
}

/// Condition an amplitude row and normalize it to a probability density.
///
/// Steps, in order:
/// 1. If the peak (by absolute value) is negative, negate the whole row; the
///    profile sign is instrument-dependent and must be positive-going.
/// 2. Subtract the row minimum so the baseline floor is zero.
/// 3. Divide by the trapezoid-style area `Σ |Δx_i|·y_i` over consecutive position
///    deltas, excluding the last sample.
///
/// Return
/// ----------
/// * `(conditioned, normalized)`: the row after steps 1–2, and after step 3.
pub fn normalize_profile(position: &[Millimeter], amplitude: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut row = amplitude.to_vec();

    let peak = row
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if peak < 0.0 {
        for y in &mut row {
            *y = -*y;
        }
    }

    let floor = row.iter().copied().fold(f64::INFINITY, f64::min);
    for y in &mut row {
        *y -= floor;
    }

    let area: f64 = position
        .windows(2)
        .zip(&row)
        .map(|(dx, y)| (dx[1] - dx[0]).abs() * y)
        .sum();
    let normalized = row.iter().map(|y| y / area).collect();

    (row, normalized)
}

/// Fit the Gaussian density model to `(position, amplitude)` by damped least squares.
///
/// The model is linear in `p0` and `p1`, so those two are profiled out exactly at
/// every step (variable projection) and the damped iteration runs over `(mean,
/// ln width)` only, with a forward-difference Jacobian of the projected residuals.
/// The cost is nearly independent of the width while the model is flat over the
/// scan window, so before iterating, a geometric sweep halves the width from
/// [`GAUSS_FIT_INIT`] down to a fraction of the sampling pitch and starts from the
/// cheapest candidate.
///
/// At least five samples are required: the covariance is scaled by the residual
/// variance `SSR / (n - 4)`, which an exactly-determined fit leaves undefined.
/// Too few samples, non-finite data, degenerate positions, or non-convergence
/// within the iteration budget all fail with [`BwsError::FitDivergence`].
///
/// Return
/// ----------
/// * `(params, covariance)`; the covariance is `(JᵀJ)⁻¹` scaled by the residual
///   variance, the width entry sits at index `(3, 3)`.
pub fn fit_gauss(
    position: &[Millimeter],
    amplitude: &[f64],
) -> Result<(Vector4<f64>, Matrix4<f64>), BwsError> {
    let n = position.len();
    if n <= 4 || amplitude.len() != n {
        return Err(BwsError::FitDivergence);
    }

    let x = DVector::from_column_slice(position);
    let y = DVector::from_column_slice(amplitude);

    let min_spacing = position
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .filter(|d| *d > 0.0)
        .fold(f64::INFINITY, f64::min);
    if !min_spacing.is_finite() {
        return Err(BwsError::FitDivergence);
    }

    let mean0 = GAUSS_FIT_INIT[2];
    let mut width = GAUSS_FIT_INIT[3];
    let mut best_width = width;
    let mut fit = project_linear(&x, &y, mean0, width).ok_or(BwsError::FitDivergence)?;
    while width > 0.25 * min_spacing {
        width *= 0.5;
        if let Some(trial) = project_linear(&x, &y, mean0, width) {
            if trial.cost < fit.cost {
                best_width = width;
                fit = trial;
            }
        }
    }

    let mut v = Vector2::new(mean0, best_width.ln());
    let mut lambda = LAMBDA_INIT;
    let mut converged = false;

    for _ in 0..MAX_ITERATIONS {
        if fit.cost <= COST_FLOOR * y.norm_squared().max(f64::MIN_POSITIVE) {
            converged = true;
            break;
        }
        let jac = projected_jacobian(&x, &y, &v, &fit).ok_or(BwsError::FitDivergence)?;
        if scaled_gradient(&jac, &fit) < GRADIENT_TOLERANCE {
            converged = true;
            break;
        }
        let c0 = jac.column(0);
        let c1 = jac.column(1);
        let jtj = Matrix2::new(c0.norm_squared(), c0.dot(&c1), c0.dot(&c1), c1.norm_squared());
        let gradient = Vector2::new(c0.dot(&fit.residuals), c1.dot(&fit.residuals));

        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj;
            for k in 0..2 {
                damped[(k, k)] = jtj[(k, k)] + lambda * jtj[(k, k)].max(f64::MIN_POSITIVE);
            }
            let Some(inv) = damped.try_inverse() else {
                lambda *= 10.0;
                continue;
            };
            let step = -(inv * gradient);
            let candidate = v + step;
            match project_linear(&x, &y, candidate[0], candidate[1].exp()) {
                Some(trial) if trial.cost < fit.cost => {
                    if fit.cost - trial.cost <= COST_TOLERANCE * fit.cost
                        || step.norm() <= STEP_TOLERANCE * (1.0 + v.norm())
                    {
                        converged = true;
                    }
                    v = candidate;
                    fit = trial;
                    lambda = (lambda * 0.3).max(1e-12);
                    accepted = true;
                    break;
                }
                _ => lambda *= 10.0,
            }
        }
        if !accepted {
            // damping exhausted: only a stationary point counts as converged
            converged = scaled_gradient(&jac, &fit) < STALL_TOLERANCE;
            break;
        }
        if converged {
            break;
        }
    }

    if !converged {
        return Err(BwsError::FitDivergence);
    }

    let p = Vector4::new(fit.offset, fit.amplitude, v[0], v[1].exp());

    let jac = jacobian(&x, &p);
    let jtj: Matrix4<f64> = (jac.transpose() * &jac)
        .fixed_view::<4, 4>(0, 0)
        .into_owned();
    let inv = jtj.try_inverse().ok_or(BwsError::FitDivergence)?;
    let residual_variance = fit.cost / (n - 4) as f64;
    Ok((p, inv * residual_variance))
}

/// Conditionally optimal linear parameters and residuals at a fixed `(mean, width)`.
struct ProjectedFit {
    offset: f64,
    amplitude: f64,
    cost: f64,
    residuals: DVector<f64>,
}

/// Solve the linear-subproblem least squares of `(offset, amplitude)` exactly.
///
/// Centered regression on the basis curve: immune to the near-collinearity of the
/// constant column and an almost-flat basis at very large widths. `None` when the
/// cost is not finite.
fn project_linear(
    x: &DVector<f64>,
    y: &DVector<f64>,
    mean: f64,
    width: f64,
) -> Option<ProjectedFit> {
    let basis = x.map(|xi| {
        let u = (xi - mean) / width;
        (-0.5 * u * u).exp() / (width * (2.0 * PI).sqrt())
    });
    let basis_mean = basis.mean();
    let y_mean = y.mean();
    let mut sbb = 0.0;
    let mut sby = 0.0;
    for i in 0..x.len() {
        let centered = basis[i] - basis_mean;
        sbb += centered * centered;
        sby += centered * (y[i] - y_mean);
    }
    let amplitude = if sbb > 0.0 { sby / sbb } else { 0.0 };
    let offset = y_mean - amplitude * basis_mean;
    let residuals =
        DVector::from_fn(x.len(), |i, _| offset + amplitude * basis[i] - y[i]);
    let cost = residuals.norm_squared();
    cost.is_finite().then(|| ProjectedFit {
        offset,
        amplitude,
        cost,
        residuals,
    })
}

/// Forward-difference Jacobian of the projected residuals over `(mean, ln width)`.
fn projected_jacobian(
    x: &DVector<f64>,
    y: &DVector<f64>,
    v: &Vector2<f64>,
    fit: &ProjectedFit,
) -> Option<DMatrix<f64>> {
    let mut jac = DMatrix::zeros(x.len(), 2);
    for k in 0..2 {
        let h = 1e-6 * (1.0 + v[k].abs());
        let mut shifted = *v;
        shifted[k] += h;
        let bumped = project_linear(x, y, shifted[0], shifted[1].exp())?;
        for i in 0..x.len() {
            jac[(i, k)] = (bumped.residuals[i] - fit.residuals[i]) / h;
        }
    }
    Some(jac)
}

/// Largest cosine between a Jacobian column and the residual vector; the
/// scale-free stationarity measure of the damped iteration.
fn scaled_gradient(jac: &DMatrix<f64>, fit: &ProjectedFit) -> f64 {
    let r_norm = fit.cost.sqrt();
    (0..jac.ncols())
        .map(|k| {
            let col = jac.column(k);
            let denom = col.norm() * r_norm;
            if denom > 0.0 {
                col.dot(&fit.residuals).abs() / denom
            } else {
                0.0
            }
        })
        .fold(0.0, f64::max)
}

fn jacobian(x: &DVector<f64>, p: &Vector4<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(x.len(), 4, |i, j| {
        let u = (x[i] - p[2]) / p[3];
        let phi = (-0.5 * u * u).exp() / (p[3] * (2.0 * PI).sqrt());
        match j {
            0 => 1.0,
            1 => phi,
            2 => p[1] * phi * u / p[3],
            _ => p[1] * phi * (u * u - 1.0) / p[3],
        }
    })
}

/// Fit one `(acquisition, slot)` amplitude row and derive its normalized emittance.
///
/// Pure function of its inputs. A diverging fit yields an invalid record (NaN
/// parameters and emittance) instead of an error, so one bad profile never aborts
/// the batch.
///
/// Arguments
/// -----------------
/// * `acquisition`: the fully aligned wire-scanner pass.
/// * `slot`: the bunch slot this row belongs to (diagnostics only).
/// * `row_index`: index of the amplitude row inside the acquisition.
pub fn fit_profile(acquisition: &Acquisition, slot: Slot, row_index: usize) -> FitResult {
    let (amplitude_raw, amplitude_normalized) =
        normalize_profile(&acquisition.position, &acquisition.amplitudes[row_index]);

    let (fit_params, fit_covariance, emit_gauss, emit_gauss_error) =
        match fit_gauss(&acquisition.position, &amplitude_normalized) {
            Ok((p, cov)) => {
                let sigma = p[3];
                let sigma_err = cov[(3, 3)].sqrt();
                let emit = emitnorm(sigma * sigma / acquisition.beta, acquisition.energy)
                    * EMIT_UNIT_SCALE;
                let emit_err =
                    emitnorm(2.0 * sigma * sigma_err / acquisition.beta, acquisition.energy)
                        * EMIT_UNIT_SCALE;
                (p, cov, emit, emit_err)
            }
            Err(err) => {
                warn!(
                    "profile fit failed for slot {slot} at t = {}: {err}",
                    acquisition.time
                );
                (
                    Vector4::repeat(f64::NAN),
                    Matrix4::repeat(f64::NAN),
                    f64::NAN,
                    f64::NAN,
                )
            }
        };

    FitResult {
        time: acquisition.time,
        time_reference: acquisition.time_reference,
        energy: acquisition.energy,
        position: acquisition.position.clone(),
        amplitude_raw,
        amplitude_normalized,
        beta: acquisition.beta,
        emit_reference: acquisition.emit_reference[row_index],
        emit_gauss,
        emit_gauss_error,
        fit_params,
        fit_covariance,
    }
}
