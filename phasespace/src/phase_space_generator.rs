use crate::decay::{DecayDescriptor, MASS_TOLERANCE, MAX_DAUGHTERS};
use crate::kinematics::{breakup_momentum, isotropic_direction, two_body_decay};
use log::trace;
use rand::Rng;
use vector::LorentzVector;

/// Maps points of the unit hypercube to weighted phase-space points.
pub trait PhaseSpaceGenerator {
    /// Number of uniforms consumed by one call to `generate`.
    fn dimensions(&self) -> usize;

    /// Decay `mother` using the uniforms `x`, write the daughters to `ps` and return the weight.
    fn generate(&self, mother: &LorentzVector<f64>, x: &[f64], ps: &mut [LorentzVector<f64>]) -> f64;
}

/// Sequential two-body phase-space generator (Raubold-Lynch / GENBOD).
///
/// The `n - 2` intermediate invariant masses are drawn uniformly between their kinematic
/// limits and the decay is unfolded as a chain of isotropic two-body splits, starting from
/// the mother. The weight is the product of the break-up momenta divided by its kinematic
/// upper bound, so it lies in `[0, 1]`.
///
/// Layout of `x`: the first `n - 2` entries pick the intermediate masses, followed by one
/// `(cos theta, phi)` pair per split.
#[derive(Debug, Clone)]
pub struct RauboldLynchGenerator {
    masses: Vec<f64>,
    mass_sum: f64,
}

impl RauboldLynchGenerator {
    pub fn new(decay: &DecayDescriptor) -> RauboldLynchGenerator {
        RauboldLynchGenerator {
            masses: decay.daughter_masses().to_vec(),
            mass_sum: decay.mass_sum(),
        }
    }

    #[inline]
    pub fn n_daughters(&self) -> usize {
        self.masses.len()
    }

    /// Upper bound of the product of break-up momenta for a mother of mass `mother_mass`,
    /// reached when every intermediate mass sits at the largest value it can take
    /// while the one below it sits at the smallest.
    pub fn weight_bound(&self, mother_mass: f64) -> f64 {
        let tm = mother_mass - self.mass_sum;
        if !(tm > 0.) {
            return 0.;
        }

        let mut em_min = 0.;
        let mut em_max = tm + self.masses[0];
        let mut bound = 1.;
        for i in 1..self.masses.len() {
            em_min += self.masses[i - 1];
            em_max += self.masses[i];
            bound *= breakup_momentum(em_max, em_min, self.masses[i]).unwrap_or(0.);
        }
        bound
    }

    /// Fill `inv[..n]` with the invariant masses of the subsystems `{0..=i}`: `inv[0]` is the
    /// first daughter mass and `inv[n - 1]` the mother mass.
    fn sample_invariant_masses(&self, mother_mass: f64, x: &[f64], inv: &mut [f64]) {
        let n = self.masses.len();
        let tm = (mother_mass - self.mass_sum).max(0.);

        inv[0] = 0.;
        inv[n - 1] = 1.;
        inv[1..n - 1].copy_from_slice(&x[..n - 2]);
        inv[1..n - 1].sort_unstable_by(|a, b| a.total_cmp(b));

        let mut partial_sum = 0.;
        for (inv_i, m) in inv[..n].iter_mut().zip(&self.masses) {
            partial_sum += m;
            *inv_i = *inv_i * tm + partial_sum;
        }
        inv[n - 1] = mother_mass;
    }

    /// Unnormalised weight of the mass chain, zero when any step is below threshold
    /// or the ordering got lost to rounding.
    fn chain_weight(&self, inv: &[f64]) -> f64 {
        let mut weight = 1.;
        for i in 1..self.masses.len() {
            if inv[i] < inv[i - 1] {
                trace!("intermediate masses out of order at step {}", i);
                return 0.;
            }

            match breakup_momentum(inv[i], inv[i - 1], self.masses[i]) {
                Some(p) => weight *= p,
                None => {
                    trace!("split {} is below threshold", i);
                    return 0.;
                }
            }
        }
        weight
    }

    /// Generate one event drawing the uniforms from `rng`.
    pub fn generate_event<R: Rng + ?Sized>(
        &self,
        mother: &LorentzVector<f64>,
        rng: &mut R,
        ps: &mut [LorentzVector<f64>],
    ) -> f64 {
        let mut x = [0f64; 3 * MAX_DAUGHTERS];
        let dims = self.dimensions();
        for xi in x[..dims].iter_mut() {
            *xi = rng.gen();
        }
        self.generate(mother, &x[..dims], ps)
    }

    /// Largest weight observed over `trials` events drawn from `rng`.
    pub fn estimate_max_weight<R: Rng + ?Sized>(
        &self,
        mother: &LorentzVector<f64>,
        trials: usize,
        rng: &mut R,
    ) -> f64 {
        let mut ps = [LorentzVector::default(); MAX_DAUGHTERS];
        let n = self.masses.len();
        (0..trials)
            .map(|_| self.generate_event(mother, rng, &mut ps[..n]))
            .fold(0., f64::max)
    }
}

impl PhaseSpaceGenerator for RauboldLynchGenerator {
    #[inline]
    fn dimensions(&self) -> usize {
        3 * self.masses.len() - 4
    }

    fn generate(&self, mother: &LorentzVector<f64>, x: &[f64], ps: &mut [LorentzVector<f64>]) -> f64 {
        let n = self.masses.len();
        debug_assert_eq!(ps.len(), n);

        for p in ps.iter_mut() {
            *p = LorentzVector::default();
        }

        if x.len() < self.dimensions() {
            trace!("random source exhausted: {} of {} uniforms", x.len(), self.dimensions());
            return 0.;
        }

        let mother_mass = mother.mass();
        if !(mother.t > 0.)
            || !(mother_mass > 0.)
            || self.mass_sum - mother_mass > MASS_TOLERANCE * mother_mass
        {
            trace!("mother of mass {} cannot decay", mother_mass);
            return 0.;
        }

        let mut inv = [0f64; MAX_DAUGHTERS];
        self.sample_invariant_masses(mother_mass, x, &mut inv);
        let mut weight = self.chain_weight(&inv[..n]);

        // peel off daughter k from the subsystem {0..=k}, starting with the mother
        let mut parent = *mother;
        for k in (1..n).rev() {
            let step = n - 1 - k;
            let (cos_theta, phi) = isotropic_direction(x[n - 2 + 2 * step], x[n - 1 + 2 * step]);

            match two_body_decay(&parent, inv[k], inv[k - 1], self.masses[k], cos_theta, phi) {
                Ok((system, daughter)) => {
                    ps[k] = daughter;
                    parent = system;
                }
                Err(e) => {
                    trace!("split {} failed: {}", k, e);
                    for p in ps.iter_mut() {
                        *p = LorentzVector::default();
                    }
                    return 0.;
                }
            }
        }
        ps[0] = parent;

        let bound = self.weight_bound(mother_mass);
        if bound > 0. {
            weight /= bound;
        } else {
            weight = 0.;
        }

        if weight.is_finite() {
            weight
        } else {
            0.
        }
    }
}
