use crate::decay::DecayDescriptor;
use crate::error::PhaseSpaceError;
use crate::phase_space::{PhaseSpace, Weighting};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Run configuration, read from YAML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunCard {
    pub mother_mass: f64,
    pub daughter_masses: Vec<f64>,
    pub n_events: usize,
    /// A fresh seed is drawn when absent.
    pub seed: Option<u64>,
    pub unweighted: bool,
    /// Trials used to estimate the maximum weight in unweighted mode; 0 uses the bound 1.
    pub max_weight_trials: usize,
    /// 0 leaves the choice to rayon.
    pub n_threads: usize,
}

impl Default for RunCard {
    /// Lambda_c+ -> p K- pi+.
    fn default() -> RunCard {
        RunCard {
            mother_mass: 2.28646,
            daughter_masses: vec![1.007276466879, 0.13957018, 0.493677],
            n_events: 10_000_000,
            seed: None,
            unweighted: false,
            max_weight_trials: 0,
            n_threads: 0,
        }
    }
}

impl RunCard {
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<RunCard, PhaseSpaceError> {
        let f = File::open(filename)?;
        let reader = BufReader::new(f);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_yaml(card: &str) -> Result<RunCard, PhaseSpaceError> {
        Ok(serde_yaml::from_str(card)?)
    }

    pub fn descriptor(&self) -> Result<DecayDescriptor, PhaseSpaceError> {
        DecayDescriptor::new(self.mother_mass, self.daughter_masses.clone())
    }

    /// The batch generator described by this card, with the maximum weight estimated
    /// from `max_weight_trials` events when unweighting.
    pub fn phase_space(&self, seed: u64) -> Result<PhaseSpace, PhaseSpaceError> {
        let phsp = PhaseSpace::new(self.descriptor()?);
        if !self.unweighted {
            return Ok(phsp);
        }

        let max_weight = if self.max_weight_trials > 0 {
            let mother = phsp.decay().mother_at_rest();
            phsp.estimate_max_weight(&mother, self.max_weight_trials, seed)?
        } else {
            1.
        };
        phsp.with_weighting(Weighting::Unweighted { max_weight })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let card = RunCard::from_yaml("mother_mass: 5.27934\ndaughter_masses: [3.0969, 0.493677]\nseed: 12\n").unwrap();
        assert_eq!(card.mother_mass, 5.27934);
        assert_eq!(card.daughter_masses.len(), 2);
        assert_eq!(card.seed, Some(12));
        assert_eq!(card.n_events, 10_000_000);
        assert!(!card.unweighted);
    }

    #[test]
    fn default_card_is_lambda_c() {
        let card = RunCard::default();
        let decay = card.descriptor().unwrap();
        assert_eq!(decay.n_daughters(), 3);
        assert_eq!(card.phase_space(1).unwrap().weighting(), Weighting::Weighted);
    }

    #[test]
    fn unweighted_card() {
        let card = RunCard {
            unweighted: true,
            ..RunCard::default()
        };
        assert_eq!(
            card.phase_space(1).unwrap().weighting(),
            Weighting::Unweighted { max_weight: 1. }
        );

        let estimated = RunCard {
            unweighted: true,
            max_weight_trials: 1000,
            ..RunCard::default()
        };
        match estimated.phase_space(1).unwrap().weighting() {
            Weighting::Unweighted { max_weight } => assert!(max_weight > 0. && max_weight < 1.),
            w => panic!("unexpected weighting {:?}", w),
        }
    }

    #[test]
    fn forbidden_card() {
        let card = RunCard::from_yaml("mother_mass: 0.5\ndaughter_masses: [0.13957018, 0.493677]\n").unwrap();
        assert!(matches!(
            card.descriptor(),
            Err(PhaseSpaceError::KinematicallyForbidden(_))
        ));
    }

    #[test]
    fn malformed_card() {
        assert!(matches!(
            RunCard::from_yaml("mother_mass: [1, 2]"),
            Err(PhaseSpaceError::RunCard(_))
        ));
        assert!(matches!(
            RunCard::from_file("/nonexistent/run_card.yaml"),
            Err(PhaseSpaceError::Io(_))
        ));
    }
}
