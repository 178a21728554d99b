use crate::error::PhaseSpaceError;
use crate::rng::acceptance_stream;
use rand::Rng;
use rayon::prelude::*;
use vector::LorentzVector;

/// Where a batch lives: `Device` is the side that generates, `Host` the side that consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Device,
    Host,
}

/// `Configured -> Generating -> Complete`. A batch is generated at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Configured,
    Generating,
    Complete,
}

/// One event of a batch: its weight and the daughter momenta, in decay order.
#[derive(Debug, Clone, Copy)]
pub struct EventRef<'a> {
    pub weight: f64,
    pub daughters: &'a [LorentzVector<f64>],
}

/// A fixed-size batch of events with `n_daughters` momenta each.
///
/// Weights and momenta are stored as two flat arrays; the momenta of event `i` occupy
/// `momenta[i * n_daughters..(i + 1) * n_daughters]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Events {
    n_daughters: usize,
    location: Location,
    state: BatchState,
    weights: Vec<f64>,
    momenta: Vec<LorentzVector<f64>>,
}

impl Events {
    /// An empty `Configured` batch of `n_events` slots.
    ///
    /// # Panics
    ///
    /// Panics if `n_daughters` is zero.
    pub fn new(n_daughters: usize, n_events: usize, location: Location) -> Events {
        assert!(n_daughters > 0, "an event needs at least one daughter");

        Events {
            n_daughters,
            location,
            state: BatchState::Configured,
            weights: vec![0.; n_events],
            momenta: vec![LorentzVector::default(); n_events * n_daughters],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[inline]
    pub fn n_daughters(&self) -> usize {
        self.n_daughters
    }

    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }

    #[inline]
    pub fn state(&self) -> BatchState {
        self.state
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }

    #[inline]
    pub fn daughters(&self, i: usize) -> &[LorentzVector<f64>] {
        &self.momenta[i * self.n_daughters..(i + 1) * self.n_daughters]
    }

    #[inline]
    pub fn event(&self, i: usize) -> EventRef<'_> {
        EventRef {
            weight: self.weights[i],
            daughters: self.daughters(i),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = EventRef<'_>> + '_ {
        self.weights
            .iter()
            .zip(self.momenta.chunks(self.n_daughters))
            .map(|(&weight, daughters)| EventRef { weight, daughters })
    }

    pub fn max_weight(&self) -> f64 {
        self.weights.iter().cloned().fold(0., f64::max)
    }

    pub fn sum_of_weights(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn count_zero_weights(&self) -> usize {
        self.weights.iter().filter(|w| **w == 0.).count()
    }

    /// Evaluate `f` on every event in parallel, keeping the event order.
    pub fn map<F>(&self, f: F) -> Vec<f64>
    where
        F: Fn(EventRef) -> f64 + Sync + Send,
    {
        self.weights
            .par_iter()
            .zip(self.momenta.par_chunks(self.n_daughters))
            .map(|(&weight, daughters)| f(EventRef { weight, daughters }))
            .collect()
    }

    /// Bulk copy of a completed batch to `location`.
    pub fn copy_to(&self, location: Location) -> Result<Events, PhaseSpaceError> {
        if self.state != BatchState::Complete {
            return Err(PhaseSpaceError::BatchNotComplete(self.state));
        }

        let mut copy = self.clone();
        copy.location = location;
        Ok(copy)
    }

    /// Hit-or-miss unweighting against the largest weight of the batch. The accepted events,
    /// in their original order, form a new batch with unit weights.
    pub fn unweight(&self, seed: u64) -> Result<Events, PhaseSpaceError> {
        if self.state != BatchState::Complete {
            return Err(PhaseSpaceError::BatchNotComplete(self.state));
        }

        let max_weight = self.max_weight();
        if !(max_weight > 0.) || !max_weight.is_finite() {
            return Err(PhaseSpaceError::Unweightable(max_weight));
        }

        let accepted: Vec<bool> = self
            .weights
            .par_iter()
            .enumerate()
            .map(|(i, &w)| acceptance_stream(seed, i as u64).gen::<f64>() * max_weight < w)
            .collect();

        let n_accepted = accepted.iter().filter(|a| **a).count();
        let mut momenta = Vec::with_capacity(n_accepted * self.n_daughters);
        for (daughters, _) in self
            .momenta
            .chunks(self.n_daughters)
            .zip(&accepted)
            .filter(|(_, a)| **a)
        {
            momenta.extend_from_slice(daughters);
        }

        Ok(Events {
            n_daughters: self.n_daughters,
            location: self.location,
            state: BatchState::Complete,
            weights: vec![1.; n_accepted],
            momenta,
        })
    }

    /// Enter `Generating`; only a fresh batch of the right shape may be filled.
    pub(crate) fn begin_generation(&mut self, n_daughters: usize) -> Result<(), PhaseSpaceError> {
        if self.state != BatchState::Configured {
            return Err(PhaseSpaceError::BatchAlreadyGenerated(self.state));
        }

        if self.n_daughters != n_daughters {
            return Err(PhaseSpaceError::BatchShapeMismatch {
                expected: n_daughters,
                found: self.n_daughters,
            });
        }

        self.state = BatchState::Generating;
        Ok(())
    }

    pub(crate) fn slots_mut(&mut self) -> (&mut [f64], &mut [LorentzVector<f64>]) {
        debug_assert_eq!(self.state, BatchState::Generating);
        (&mut self.weights, &mut self.momenta)
    }

    pub(crate) fn finish_generation(&mut self) {
        self.state = BatchState::Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(weights: &[f64]) -> Events {
        let mut events = Events::new(2, weights.len(), Location::Device);
        events.begin_generation(2).unwrap();
        {
            let (w, p) = events.slots_mut();
            w.copy_from_slice(weights);
            for (i, v) in p.iter_mut().enumerate() {
                *v = LorentzVector::from_args(i as f64, 0., 0., 0.);
            }
        }
        events.finish_generation();
        events
    }

    #[test]
    fn layout() {
        let events = filled(&[0.5, 0., 1.]);
        assert_eq!(events.len(), 3);
        assert_eq!(events.daughters(1)[0].t, 2.);
        assert_eq!(events.daughters(1)[1].t, 3.);
        assert_eq!(events.event(2).weight, 1.);
        assert_eq!(events.iter().count(), 3);
        assert_eq!(events.max_weight(), 1.);
        assert_eq!(events.sum_of_weights(), 1.5);
        assert_eq!(events.count_zero_weights(), 1);

        let energies = events.map(|e| e.daughters.iter().map(|p| p.t).sum());
        assert_eq!(energies, vec![1., 5., 9.]);
    }

    #[test]
    #[should_panic(expected = "at least one daughter")]
    fn batch_without_daughters() {
        Events::new(0, 10, Location::Device);
    }

    #[test]
    fn copy_needs_a_complete_batch() {
        let fresh = Events::new(3, 10, Location::Device);
        assert!(matches!(
            fresh.copy_to(Location::Host),
            Err(PhaseSpaceError::BatchNotComplete(BatchState::Configured))
        ));

        let events = filled(&[0.1, 0.2]);
        let host = events.copy_to(Location::Host).unwrap();
        assert_eq!(host.location(), Location::Host);
        assert_eq!(host.weights(), events.weights());
        assert_eq!(host.daughters(1), events.daughters(1));
    }

    #[test]
    fn generation_happens_once() {
        let mut events = filled(&[0.1]);
        assert!(matches!(
            events.begin_generation(2),
            Err(PhaseSpaceError::BatchAlreadyGenerated(BatchState::Complete))
        ));

        let mut stuck = Events::new(2, 1, Location::Device);
        stuck.begin_generation(2).unwrap();
        assert!(matches!(
            stuck.copy_to(Location::Host),
            Err(PhaseSpaceError::BatchNotComplete(BatchState::Generating))
        ));
    }

    #[test]
    fn shape_is_checked() {
        let mut events = Events::new(3, 1, Location::Device);
        assert!(matches!(
            events.begin_generation(4),
            Err(PhaseSpaceError::BatchShapeMismatch {
                expected: 4,
                found: 3
            })
        ));
        assert_eq!(events.state(), BatchState::Configured);
    }

    #[test]
    fn unweighting_keeps_the_heaviest_and_drops_zeros() {
        let mut weights = vec![0.; 1000];
        weights[10] = 1.;
        for w in weights.iter_mut().skip(500) {
            *w = 0.5;
        }

        let events = filled(&weights);
        let flat = events.unweight(99).unwrap();

        assert!(flat.weights().iter().all(|w| *w == 1.));
        // the event at the maximum is always accepted and comes first
        assert_eq!(flat.daughters(0), events.daughters(10));
        // about half of the 500 half-weight events survive
        assert!(flat.len() > 180 && flat.len() < 320, "accepted {}", flat.len());
    }

    #[test]
    fn all_zero_batch_cannot_be_unweighted() {
        let events = filled(&[0., 0.]);
        assert!(matches!(
            events.unweight(1),
            Err(PhaseSpaceError::Unweightable(_))
        ));
    }
}
