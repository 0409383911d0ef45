//! Decision tree selector.
//!
//! [`TreeBuilder`] turns a POI pool into an arena-allocated [`DecisionTree`]
//! of A/B questions; a [`SelectionSession`] walks it one answer at a time;
//! [`TreeStore`] persists trees by task id.

mod builder;
mod error;
mod session;
mod store;
mod tree;

pub use builder::{score_partition, TreeBuilder};
pub use error::SelectorError;
pub use session::{Advance, AnswerRecord, SelectionSession};
pub use store::{TreeStore, TreeSummary};
pub use tree::{Answer, DecisionTree, Node, NodeId, SubsetId};
