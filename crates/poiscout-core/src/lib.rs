//! POI-Scout core: the shared data model, the capability seams every engine
//! component is built against, the error taxonomy, configuration, and
//! observability setup.
//!
//! The engine crates (`poiscout-search`, `poiscout-evolution`,
//! `poiscout-selector`) only ever talk to the outside world through the
//! traits in [`capability`].

pub mod cancel;
pub mod capability;
pub mod config;
pub mod error;
pub mod observability;
pub mod plan;
pub mod poi;
pub mod similarity;
pub mod skill;
pub mod trajectory;

pub use cancel::CancelFlag;
pub use error::{CapabilityError, IntegrityViolation};
pub use plan::{SearchPlan, SearchStep, StepVerdict, Verdict, VerdictKind};
pub use poi::{Poi, PoiPool};
pub use skill::Skill;
pub use trajectory::OptimizationTrajectory;
