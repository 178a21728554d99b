use crate::decay::{DecayDescriptor, MASS_TOLERANCE, MAX_DAUGHTERS};
use crate::error::PhaseSpaceError;
use crate::events::Events;
use crate::phase_space_generator::RauboldLynchGenerator;
use crate::rng::{event_stream, trial_stream};
use log::{debug, info, trace, warn};
use rand::Rng;
use rayon::prelude::*;
use std::time::Instant;
use vector::LorentzVector;

/// Accept/reject tries per event slot in unweighted mode before the slot is given up.
pub const MAX_UNWEIGHT_ATTEMPTS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weighting {
    /// Every event carries its phase-space weight.
    Weighted,
    /// Events are accepted with probability `weight / max_weight` and carry weight 1.
    /// Weights are normalised to at most 1, so `max_weight = 1` is always safe.
    Unweighted { max_weight: f64 },
}

impl Default for Weighting {
    fn default() -> Weighting {
        Weighting::Weighted
    }
}

/// Counts reported by a batch fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationSummary {
    pub n_events: usize,
    pub zero_weight: usize,
    /// Unweighted slots that were not accepted within `MAX_UNWEIGHT_ATTEMPTS` tries.
    pub given_up: usize,
    /// Unweighted events whose weight exceeded `max_weight`; their acceptance was clipped at 1.
    pub above_max_weight: usize,
}

/// Outcome of filling one event slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Filled,
    AboveMaxWeight,
    GivenUp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Average {
    pub mean: f64,
    pub std_dev: f64,
}

/// Batch generator of phase-space events for one decay.
#[derive(Debug, Clone)]
pub struct PhaseSpace {
    decay: DecayDescriptor,
    generator: RauboldLynchGenerator,
    weighting: Weighting,
}

impl PhaseSpace {
    pub fn new(decay: DecayDescriptor) -> PhaseSpace {
        let generator = RauboldLynchGenerator::new(&decay);
        PhaseSpace {
            decay,
            generator,
            weighting: Weighting::Weighted,
        }
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Result<PhaseSpace, PhaseSpaceError> {
        if let Weighting::Unweighted { max_weight } = weighting {
            if !(max_weight > 0.) || !max_weight.is_finite() {
                return Err(PhaseSpaceError::Unweightable(max_weight));
            }
        }

        self.weighting = weighting;
        Ok(self)
    }

    #[inline]
    pub fn decay(&self) -> &DecayDescriptor {
        &self.decay
    }

    #[inline]
    pub fn generator(&self) -> &RauboldLynchGenerator {
        &self.generator
    }

    #[inline]
    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    fn check_mother(&self, mother: &LorentzVector<f64>) -> Result<(), PhaseSpaceError> {
        if !(mother.t > 0.) || !(mother.spatial_squared() < mother.t * mother.t) {
            return Err(PhaseSpaceError::InvalidBoostVelocity(
                mother.spatial_distance() / mother.t,
            ));
        }

        let mass = mother.mass();
        if self.decay.mass_sum() - mass > MASS_TOLERANCE * mass {
            return Err(PhaseSpaceError::KinematicallyForbidden(format!(
                "mother of mass {} is lighter than its daughters ({})",
                mass,
                self.decay.mass_sum()
            )));
        }
        Ok(())
    }

    /// Decay `mother` once per slot of `events`. Event `i` only depends on `(seed, i)`.
    pub fn generate(
        &self,
        mother: &LorentzVector<f64>,
        events: &mut Events,
        seed: u64,
    ) -> Result<GenerationSummary, PhaseSpaceError> {
        self.check_mother(mother)?;
        events.begin_generation(self.decay.n_daughters())?;
        debug!(
            "decaying {} into {:?}, seed {}",
            mother,
            self.decay.daughter_masses(),
            seed
        );

        Ok(self.fill(events, seed, |_| *mother))
    }

    /// Decay `mothers[i]` into slot `i`. A mother that cannot decay gives a zero-weight event.
    pub fn generate_from_mothers(
        &self,
        mothers: &[LorentzVector<f64>],
        events: &mut Events,
        seed: u64,
    ) -> Result<GenerationSummary, PhaseSpaceError> {
        if mothers.len() != events.len() {
            return Err(PhaseSpaceError::BatchSizeMismatch {
                mothers: mothers.len(),
                events: events.len(),
            });
        }
        events.begin_generation(self.decay.n_daughters())?;

        Ok(self.fill(events, seed, |i| mothers[i]))
    }

    fn fill<M>(&self, events: &mut Events, seed: u64, mother_of: M) -> GenerationSummary
    where
        M: Fn(usize) -> LorentzVector<f64> + Sync,
    {
        let start = Instant::now();
        let n = self.decay.n_daughters();

        let (given_up, above_max_weight) = {
            let (weights, momenta) = events.slots_mut();
            weights
                .par_iter_mut()
                .zip(momenta.par_chunks_mut(n))
                .enumerate()
                .map(|(i, (weight, ps))| {
                    let mother = mother_of(i);
                    let mut rng = event_stream(seed, i as u64);

                    let slot = match self.weighting {
                        Weighting::Weighted => {
                            *weight = self.generator.generate_event(&mother, &mut rng, ps);
                            Slot::Filled
                        }
                        Weighting::Unweighted { max_weight } => {
                            let slot = self.accept(&mother, max_weight, &mut rng, ps);
                            *weight = if slot == Slot::GivenUp { 0. } else { 1. };
                            slot
                        }
                    };

                    match slot {
                        Slot::Filled => (0, 0),
                        Slot::AboveMaxWeight => (0, 1),
                        Slot::GivenUp => (1, 0),
                    }
                })
                .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
        };
        events.finish_generation();

        let summary = GenerationSummary {
            n_events: events.len(),
            zero_weight: events.count_zero_weights(),
            given_up,
            above_max_weight,
        };

        info!(
            "generated {} events ({} with zero weight) in {:#?}",
            summary.n_events,
            summary.zero_weight,
            start.elapsed()
        );
        if given_up > 0 {
            warn!(
                "{} events were not accepted after {} attempts and carry zero weight",
                given_up, MAX_UNWEIGHT_ATTEMPTS
            );
        }
        if above_max_weight > 0 {
            if let Weighting::Unweighted { max_weight } = self.weighting {
                warn!(
                    "{} events had a weight above the maximum {}, the unweighted sample is biased",
                    above_max_weight, max_weight
                );
            }
        }

        summary
    }

    /// Draw events until one passes `u * max_weight < weight`.
    fn accept<R: Rng>(
        &self,
        mother: &LorentzVector<f64>,
        max_weight: f64,
        rng: &mut R,
        ps: &mut [LorentzVector<f64>],
    ) -> Slot {
        for _ in 0..MAX_UNWEIGHT_ATTEMPTS {
            let weight = self.generator.generate_event(mother, rng, ps);
            if rng.gen::<f64>() * max_weight < weight {
                if weight > max_weight {
                    trace!("weight {} above the maximum {}", weight, max_weight);
                    return Slot::AboveMaxWeight;
                }
                return Slot::Filled;
            }
        }

        for p in ps.iter_mut() {
            *p = LorentzVector::default();
        }
        Slot::GivenUp
    }

    /// Largest weight over `trials` events, for use as `Weighting::Unweighted { max_weight }`.
    /// The trials come from streams disjoint from the ones `generate` uses with `seed`.
    pub fn estimate_max_weight(
        &self,
        mother: &LorentzVector<f64>,
        trials: usize,
        seed: u64,
    ) -> Result<f64, PhaseSpaceError> {
        self.check_mother(mother)?;
        let n = self.decay.n_daughters();

        let max_weight = (0..trials)
            .into_par_iter()
            .map_init(
                || [LorentzVector::default(); MAX_DAUGHTERS],
                |ps, i| {
                    let mut rng = trial_stream(seed, i as u64);
                    self.generator.generate_event(mother, &mut rng, &mut ps[..n])
                },
            )
            .reduce(|| 0., f64::max);

        debug!("estimated maximum weight {} from {} trials", max_weight, trials);
        Ok(max_weight)
    }

    /// Weighted mean and standard deviation of `f` over `n_events` decays of `mother`.
    pub fn average_on<F>(
        &self,
        mother: &LorentzVector<f64>,
        n_events: usize,
        seed: u64,
        f: F,
    ) -> Result<Average, PhaseSpaceError>
    where
        F: Fn(&[LorentzVector<f64>]) -> f64 + Sync + Send,
    {
        self.check_mother(mother)?;
        let n = self.decay.n_daughters();

        let (sum_w, sum_wf, sum_wf2) = (0..n_events)
            .into_par_iter()
            .map_init(
                || [LorentzVector::default(); MAX_DAUGHTERS],
                |ps, i| {
                    let mut rng = event_stream(seed, i as u64);
                    let w = self.generator.generate_event(mother, &mut rng, &mut ps[..n]);
                    if w == 0. {
                        return (0., 0., 0.);
                    }
                    let v = f(&ps[..n]);
                    (w, w * v, w * v * v)
                },
            )
            .reduce(
                || (0., 0., 0.),
                |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2),
            );

        if !(sum_w > 0.) {
            return Err(PhaseSpaceError::DegenerateEvent(
                "every event has zero weight",
            ));
        }

        let mean = sum_wf / sum_w;
        let variance = (sum_wf2 / sum_w - mean * mean).max(0.);
        Ok(Average {
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BatchState, Location};
    use approx::assert_relative_eq;

    fn lambda_c() -> PhaseSpace {
        PhaseSpace::new(
            DecayDescriptor::new(2.28646, vec![1.007276466879, 0.13957018, 0.493677]).unwrap(),
        )
    }

    #[test]
    fn batch_is_complete_after_generation() {
        let phsp = lambda_c();
        let mut events = Events::new(3, 1000, Location::Device);
        phsp.generate(&phsp.decay().mother_at_rest(), &mut events, 1).unwrap();

        assert_eq!(events.state(), BatchState::Complete);
        assert!(events.weights().iter().all(|w| *w > 0. && *w <= 1.));
        assert!(matches!(
            phsp.generate(&phsp.decay().mother_at_rest(), &mut events, 1),
            Err(PhaseSpaceError::BatchAlreadyGenerated(_))
        ));
    }

    #[test]
    fn mother_is_validated_before_any_work() {
        let phsp = lambda_c();

        let mut events = Events::new(3, 10, Location::Device);
        let tachyon = LorentzVector::from_args(1., 2., 0., 0.);
        assert!(matches!(
            phsp.generate(&tachyon, &mut events, 1),
            Err(PhaseSpaceError::InvalidBoostVelocity(_))
        ));
        assert_eq!(events.state(), BatchState::Configured);

        let light = LorentzVector::from_args(1.5, 0., 0., 0.);
        assert!(matches!(
            phsp.generate(&light, &mut events, 1),
            Err(PhaseSpaceError::KinematicallyForbidden(_))
        ));

        let mut wrong_shape = Events::new(4, 10, Location::Device);
        assert!(matches!(
            phsp.generate(&phsp.decay().mother_at_rest(), &mut wrong_shape, 1),
            Err(PhaseSpaceError::BatchShapeMismatch { .. })
        ));
    }

    #[test]
    fn unweighted_mode_needs_a_positive_maximum() {
        assert!(matches!(
            lambda_c().with_weighting(Weighting::Unweighted { max_weight: 0. }),
            Err(PhaseSpaceError::Unweightable(_))
        ));
        assert!(lambda_c()
            .with_weighting(Weighting::Unweighted { max_weight: 1. })
            .is_ok());
    }

    #[test]
    fn unweighted_events_carry_unit_weight() {
        let phsp = lambda_c()
            .with_weighting(Weighting::Unweighted { max_weight: 1. })
            .unwrap();
        let mut events = Events::new(3, 500, Location::Device);
        phsp.generate(&phsp.decay().mother_at_rest(), &mut events, 5).unwrap();

        assert!(events.weights().iter().all(|w| *w == 1.));
    }

    #[test]
    fn weights_above_the_maximum_are_counted() {
        let mother = lambda_c().decay().mother_at_rest();

        let low = lambda_c()
            .with_weighting(Weighting::Unweighted { max_weight: 0.1 })
            .unwrap();
        let mut events = Events::new(3, 2000, Location::Device);
        let summary = low.generate(&mother, &mut events, 5).unwrap();
        assert_eq!(summary.n_events, 2000);
        assert_eq!(summary.given_up, 0);
        assert!(summary.above_max_weight > 500, "{:?}", summary);

        let safe = lambda_c()
            .with_weighting(Weighting::Unweighted { max_weight: 1. })
            .unwrap();
        let mut events = Events::new(3, 2000, Location::Device);
        let summary = safe.generate(&mother, &mut events, 5).unwrap();
        assert_eq!(summary.above_max_weight, 0);
        assert_eq!(summary.zero_weight, 0);
    }

    #[test]
    fn weighted_summary() {
        let phsp = lambda_c();
        let mut events = Events::new(3, 100, Location::Device);
        let summary = phsp
            .generate(&phsp.decay().mother_at_rest(), &mut events, 2)
            .unwrap();
        assert_eq!(
            summary,
            GenerationSummary {
                n_events: 100,
                zero_weight: 0,
                given_up: 0,
                above_max_weight: 0,
            }
        );
    }

    #[test]
    fn estimate_does_not_reuse_the_generation_streams() {
        let phsp = lambda_c();
        let mother = phsp.decay().mother_at_rest();
        let estimate = phsp.estimate_max_weight(&mother, 200, 17).unwrap();

        let mut events = Events::new(3, 200, Location::Device);
        phsp.generate(&mother, &mut events, 17).unwrap();
        assert_ne!(estimate, events.max_weight());
    }

    #[test]
    fn estimated_maximum_is_within_the_bound() {
        let phsp = lambda_c();
        let max = phsp
            .estimate_max_weight(&phsp.decay().mother_at_rest(), 20_000, 3)
            .unwrap();
        assert!(max > 0.3 && max <= 1.);
    }

    #[test]
    fn average_of_a_constant() {
        let phsp = lambda_c();
        let avg = phsp
            .average_on(&phsp.decay().mother_at_rest(), 1000, 8, |_| 2.5)
            .unwrap();
        assert_relative_eq!(avg.mean, 2.5, max_relative = 1e-12);
        assert!(avg.std_dev < 1e-6);
    }

    #[test]
    fn average_needs_weight() {
        let phsp = PhaseSpace::new(DecayDescriptor::new(1., vec![0.5, 0.5]).unwrap());
        assert!(phsp
            .average_on(&phsp.decay().mother_at_rest(), 10, 1, |_| 1.)
            .is_err());
    }
}
