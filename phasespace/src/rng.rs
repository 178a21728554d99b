use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The random stream of event `index` in a run seeded with `seed`.
///
/// Every event gets its own ChaCha stream, so an event depends only on `(seed, index)`
/// and not on how the batch is split over threads.
#[inline]
pub fn event_stream(seed: u64, index: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index);
    rng
}

/// Streams used for accept/reject decisions start here, far above any event index, so
/// unweighting never reuses the draws that built the event.
const ACCEPTANCE_STREAM_OFFSET: u64 = 1 << 63;

/// The stream deciding whether event `index` survives unweighting.
#[inline]
pub fn acceptance_stream(seed: u64, index: u64) -> ChaCha8Rng {
    event_stream(seed, ACCEPTANCE_STREAM_OFFSET | index)
}

/// Trial events used to estimate the maximum weight come from their own streams, so the
/// estimate is independent of the batch it is later applied to.
const TRIAL_STREAM_OFFSET: u64 = 1 << 62;

/// The stream of trial event `index` when estimating the maximum weight.
#[inline]
pub fn trial_stream(seed: u64, index: u64) -> ChaCha8Rng {
    event_stream(seed, TRIAL_STREAM_OFFSET | index)
}

/// A seed for runs that did not ask for one.
pub fn entropy_seed() -> u64 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn streams_are_reproducible() {
        let mut a = event_stream(42, 7);
        let mut b = event_stream(42, 7);
        for _ in 0..8 {
            assert_eq!(a.gen::<f64>(), b.gen::<f64>());
        }
    }

    #[test]
    fn streams_do_not_overlap() {
        let mut a = event_stream(42, 0);
        let mut b = event_stream(42, 1);
        let mut c = event_stream(43, 0);
        let mut d = acceptance_stream(42, 0);
        let mut e = trial_stream(42, 0);
        let (x, y, z, w, v): (u64, u64, u64, u64, u64) =
            (a.gen(), b.gen(), c.gen(), d.gen(), e.gen());
        assert_ne!(x, y);
        assert_ne!(x, z);
        assert_ne!(x, w);
        assert_ne!(x, v);
        assert_ne!(w, v);
    }
}
