//! POI-Scout Evolution: off-policy experience for future searches.
//!
//! - [`SkillLibrary`]: diversity-filtered skill store with embedding retrieval.
//! - [`Distiller`]: turns one optimization trajectory into at most one skill.
//!
//! Both talk to language models only through the capability traits in
//! `poiscout_core::capability`.

pub mod delta;
pub mod distill;
pub mod error;
pub mod library;

pub use delta::{StepChange, TrajectoryDelta};
pub use distill::{Distiller, SubmitOutcome};
pub use error::{DistillationSkipped, LibraryError};
pub use library::SkillLibrary;
