use crate::error::PhaseSpaceError;
use rand::Rng;
use std::f64::consts::PI;
use vector::LorentzVector;

/// Relative slack on `m >= m1 + m2` for a two-body split at threshold.
const THRESHOLD_TOLERANCE: f64 = 1e-10;

/// Momentum of either daughter in the rest frame of `m` for the split `m -> m1 m2`,
/// `sqrt(lambda(m^2, m1^2, m2^2)) / 2m`.
///
/// Returns `None` when the split is below threshold by more than rounding, or `m` is not
/// positive. At threshold the momentum is exactly zero.
#[inline]
pub fn breakup_momentum(m: f64, m1: f64, m2: f64) -> Option<f64> {
    if !(m > 0.) || m1 + m2 - m > THRESHOLD_TOLERANCE * m {
        return None;
    }

    let lambda = (m - m1 - m2) * (m + m1 + m2) * (m - m1 + m2) * (m + m1 - m2);
    if !lambda.is_finite() {
        return None;
    }

    Some(lambda.max(0.).sqrt() / (2. * m))
}

/// Map two uniforms on `[0, 1)` to an isotropic direction `(cos theta, phi)`.
#[inline]
pub fn isotropic_direction(u_theta: f64, u_phi: f64) -> (f64, f64) {
    (2. * u_theta - 1., 2. * PI * u_phi)
}

/// Split `parent`, whose invariant mass is `parent_mass`, into two bodies of masses
/// `m_a` and `m_b` emitted along `(cos_theta, phi)` in the parent rest frame.
/// Both daughters are returned in the frame `parent` is expressed in.
pub fn two_body_decay(
    parent: &LorentzVector<f64>,
    parent_mass: f64,
    m_a: f64,
    m_b: f64,
    cos_theta: f64,
    phi: f64,
) -> Result<(LorentzVector<f64>, LorentzVector<f64>), PhaseSpaceError> {
    let p = breakup_momentum(parent_mass, m_a, m_b)
        .ok_or(PhaseSpaceError::DegenerateEvent("two-body split below threshold"))?;

    let sin_theta = (1. - cos_theta * cos_theta).max(0.).sqrt();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (px, py, pz) = (p * sin_theta * cos_phi, p * sin_theta * sin_phi, p * cos_theta);

    let a = LorentzVector::from_args(p.hypot(m_a), px, py, pz);
    let b = LorentzVector::from_args(p.hypot(m_b), -px, -py, -pz);

    if !(parent.t > 0.) {
        return Err(PhaseSpaceError::DegenerateEvent(
            "parent energy is not positive",
        ));
    }

    if parent.x == 0. && parent.y == 0. && parent.z == 0. {
        return Ok((a, b));
    }

    let beta = parent.boost_vector();
    Ok((a.try_boost(&beta)?, b.try_boost(&beta)?))
}

/// Isotropic two-body decay of `parent` using its own invariant mass.
pub fn decay_isotropic<R: Rng + ?Sized>(
    parent: &LorentzVector<f64>,
    m_a: f64,
    m_b: f64,
    rng: &mut R,
) -> Result<(LorentzVector<f64>, LorentzVector<f64>), PhaseSpaceError> {
    let (cos_theta, phi) = isotropic_direction(rng.gen(), rng.gen());
    two_body_decay(parent, parent.mass(), m_a, m_b, cos_theta, phi)
}
