use crate::error::PhaseSpaceError;
use vector::LorentzVector;

/// The largest multiplicity for which per-event scratch space is kept on the stack.
pub const MAX_DAUGHTERS: usize = 32;

/// Relative slack on `sum(m_i) <= M` before a decay is declared forbidden.
pub const MASS_TOLERANCE: f64 = 1e-12;

/// Immutable description of a decay `M -> m_0 m_1 ... m_{n-1}`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayDescriptor {
    mother_mass: f64,
    daughter_masses: Vec<f64>,
    mass_sum: f64,
}

impl DecayDescriptor {
    pub fn new(mother_mass: f64, daughter_masses: Vec<f64>) -> Result<DecayDescriptor, PhaseSpaceError> {
        if !mother_mass.is_finite() || mother_mass <= 0. {
            return Err(PhaseSpaceError::InvalidMass(format!(
                "mother mass {} must be finite and positive",
                mother_mass
            )));
        }

        if daughter_masses.len() < 2 {
            return Err(PhaseSpaceError::KinematicallyForbidden(format!(
                "{} daughter(s) given, at least 2 are required",
                daughter_masses.len()
            )));
        }

        if daughter_masses.len() > MAX_DAUGHTERS {
            return Err(PhaseSpaceError::TooManyDaughters(
                daughter_masses.len(),
                MAX_DAUGHTERS,
            ));
        }

        if let Some((i, m)) = daughter_masses
            .iter()
            .enumerate()
            .find(|(_, m)| !m.is_finite() || **m < 0.)
        {
            return Err(PhaseSpaceError::InvalidMass(format!(
                "daughter {} has mass {}, it must be finite and non-negative",
                i, m
            )));
        }

        let mass_sum = daughter_masses.iter().sum::<f64>();
        if mass_sum - mother_mass > MASS_TOLERANCE * mother_mass {
            return Err(PhaseSpaceError::KinematicallyForbidden(format!(
                "daughter masses add up to {}, above the mother mass {}",
                mass_sum, mother_mass
            )));
        }

        Ok(DecayDescriptor {
            mother_mass,
            daughter_masses,
            mass_sum,
        })
    }

    #[inline]
    pub fn n_daughters(&self) -> usize {
        self.daughter_masses.len()
    }

    #[inline]
    pub fn mother_mass(&self) -> f64 {
        self.mother_mass
    }

    #[inline]
    pub fn daughter_masses(&self) -> &[f64] {
        &self.daughter_masses
    }

    #[inline]
    pub fn mass_sum(&self) -> f64 {
        self.mass_sum
    }

    /// Energy released in the decay, `M - sum(m_i)`, never negative.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        (self.mother_mass - self.mass_sum).max(0.)
    }

    pub fn mother_at_rest(&self) -> LorentzVector<f64> {
        LorentzVector::from_args(self.mother_mass, 0., 0., 0.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_c_to_p_k_pi() {
        let d = DecayDescriptor::new(2.28646, vec![1.007276466879, 0.13957018, 0.493677]).unwrap();
        assert_eq!(d.n_daughters(), 3);
        assert_eq!(d.daughter_masses()[1], 0.13957018);
        assert!((d.kinetic_energy() - (2.28646 - 1.640523646879)).abs() < 1e-12);
        assert_eq!(d.mother_at_rest().mass(), 2.28646);
    }

    #[test]
    fn too_heavy_daughters_are_forbidden() {
        let r = DecayDescriptor::new(1.0, vec![0.6, 0.5]);
        assert!(matches!(r, Err(PhaseSpaceError::KinematicallyForbidden(_))));
    }

    #[test]
    fn one_daughter_is_forbidden() {
        assert!(matches!(
            DecayDescriptor::new(1.0, vec![0.5]),
            Err(PhaseSpaceError::KinematicallyForbidden(_))
        ));
        assert!(matches!(
            DecayDescriptor::new(1.0, vec![]),
            Err(PhaseSpaceError::KinematicallyForbidden(_))
        ));
    }

    #[test]
    fn threshold_is_allowed() {
        let d = DecayDescriptor::new(1.0, vec![0.25, 0.25, 0.5]).unwrap();
        assert_eq!(d.kinetic_energy(), 0.);
    }

    #[test]
    fn bad_masses() {
        assert!(matches!(
            DecayDescriptor::new(0., vec![0., 0.]),
            Err(PhaseSpaceError::InvalidMass(_))
        ));
        assert!(matches!(
            DecayDescriptor::new(1., vec![0.1, -0.1]),
            Err(PhaseSpaceError::InvalidMass(_))
        ));
        assert!(matches!(
            DecayDescriptor::new(1., vec![0.1, std::f64::NAN]),
            Err(PhaseSpaceError::InvalidMass(_))
        ));
        assert!(matches!(
            DecayDescriptor::new(100., vec![0.; MAX_DAUGHTERS + 1]),
            Err(PhaseSpaceError::TooManyDaughters(33, 32))
        ));
    }
}
