//! Monte Carlo generation of N-body phase space.
//!
//! A [`DecayDescriptor`] fixes the mother and daughter masses, [`PhaseSpace`] fills an
//! [`Events`] batch with weighted daughter momenta, one independent random stream per
//! event.
//!
//! ```
//! use phasespace::{DecayDescriptor, Events, Location, PhaseSpace};
//!
//! let decay = DecayDescriptor::new(2.28646, vec![1.007276466879, 0.13957018, 0.493677]).unwrap();
//! let phsp = PhaseSpace::new(decay);
//!
//! let mut events = Events::new(3, 1000, Location::Device);
//! phsp.generate(&phsp.decay().mother_at_rest(), &mut events, 42).unwrap();
//!
//! let host = events.copy_to(Location::Host).unwrap();
//! let m_kpi: Vec<f64> = host.map(|e| (e.daughters[1] + e.daughters[2]).mass());
//! assert_eq!(m_kpi.len(), 1000);
//! ```

pub use vector;

pub mod decay;
pub mod error;
pub mod events;
pub mod kinematics;
pub mod phase_space;
pub mod phase_space_generator;
pub mod rng;
pub mod run_card;

pub use crate::decay::{DecayDescriptor, MAX_DAUGHTERS};
pub use crate::error::PhaseSpaceError;
pub use crate::events::{BatchState, EventRef, Events, Location};
pub use crate::phase_space::{Average, GenerationSummary, PhaseSpace, Weighting};
pub use crate::phase_space_generator::{PhaseSpaceGenerator, RauboldLynchGenerator};
pub use crate::run_card::RunCard;
pub use vector::LorentzVector;
