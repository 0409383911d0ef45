//! Selection sessions: walking a built tree one answer at a time.
//!
//! A session remembers answers by position, not node identity, so it can be
//! replayed on any structurally identical tree. A session started on another
//! tree, including one rebuilt under a different task id, is rebound by
//! replaying its answers; it is rejected only when the answers do not fit.

use poiscout_core::Poi;
use serde::{Deserialize, Serialize};

use crate::error::SelectorError;
use crate::tree::{Answer, DecisionTree, Node, NodeId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: Answer,
    /// Option text the answer stood for.
    pub chosen_option: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSession {
    pub task_id: String,
    current: NodeId,
    history: Vec<AnswerRecord>,
}

impl SelectionSession {
    pub fn current_node(&self) -> NodeId {
        self.current
    }

    pub fn history(&self) -> &[AnswerRecord] {
        &self.history
    }

    pub fn answers(&self) -> Vec<Answer> {
        self.history.iter().map(|r| r.answer).collect()
    }
}

/// Result of one `advance`.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Landed on another question.
    Continue(SelectionSession),
    /// Landed on a leaf. The session is kept for history and `back`.
    Final {
        pois: Vec<Poi>,
        session: SelectionSession,
    },
}

impl Advance {
    pub fn session(&self) -> &SelectionSession {
        match self {
            Self::Continue(session) | Self::Final { session, .. } => session,
        }
    }
}

impl DecisionTree {
    pub fn start(&self) -> SelectionSession {
        SelectionSession {
            task_id: self.task_id.clone(),
            current: self.root,
            history: Vec::new(),
        }
    }

    /// `(question, option_a, option_b)` at the session's node, or `None` at a leaf.
    pub fn current_question(&self, session: &SelectionSession) -> Option<(&str, &str, &str)> {
        match self.nodes.get(session.current)? {
            Node::Decision {
                question,
                option_a,
                option_b,
                ..
            } => Some((question.as_str(), option_a.as_str(), option_b.as_str())),
            Node::Leaf { .. } => None,
        }
    }

    /// Record `answer` and move to the chosen child.
    pub fn advance(&self, session: SelectionSession, answer: Answer) -> Result<Advance, SelectorError> {
        let session = self.bind(session)?;
        let (question, option_a, option_b, branch_a, branch_b) = match &self.nodes[session.current] {
            Node::Decision {
                question,
                option_a,
                option_b,
                branch_a,
                branch_b,
                ..
            } => (question, option_a, option_b, *branch_a, *branch_b),
            Node::Leaf { .. } => {
                return Err(SelectorError::invalid(
                    &self.task_id,
                    format!("advance called at leaf node {}", session.current),
                ))
            }
        };

        let (next, chosen_option) = match answer {
            Answer::A => (branch_a, option_a),
            Answer::B => (branch_b, option_b),
        };
        let mut session = session;
        session.history.push(AnswerRecord {
            question: question.clone(),
            answer,
            chosen_option: chosen_option.clone(),
        });
        session.current = next;
        tracing::debug!(task = %self.task_id, node = next, answers = session.history.len(), "advanced");

        match self.nodes.get(next) {
            Some(Node::Leaf { subset, .. }) => Ok(Advance::Final {
                pois: self.subset_pois(*subset),
                session,
            }),
            Some(Node::Decision { .. }) => Ok(Advance::Continue(session)),
            None => Err(SelectorError::invalid(
                &self.task_id,
                format!("child index {} out of range", next),
            )),
        }
    }

    /// Replay `answers` from the root.
    pub fn resume(&self, answers: &[Answer]) -> Result<Advance, SelectorError> {
        let mut session = self.start();
        if let Some(Node::Leaf { subset, .. }) = self.root_node() {
            if answers.is_empty() {
                return Ok(Advance::Final {
                    pois: self.subset_pois(*subset),
                    session,
                });
            }
        }
        let mut outcome = Advance::Continue(session.clone());
        for (i, answer) in answers.iter().enumerate() {
            match outcome {
                Advance::Continue(s) => session = s,
                Advance::Final { .. } => {
                    return Err(SelectorError::invalid(
                        &self.task_id,
                        format!("answer {} given after reaching a leaf", i + 1),
                    ))
                }
            }
            outcome = self.advance(session.clone(), *answer)?;
        }
        Ok(outcome)
    }

    /// Undo the last answer. A session with no answers is returned unchanged.
    pub fn back(&self, session: SelectionSession) -> Result<SelectionSession, SelectorError> {
        let session = self.bind(session)?;
        let mut answers = session.answers();
        if answers.pop().is_none() {
            return Ok(session);
        }
        Ok(self.resume(&answers)?.session().clone())
    }

    /// POIs still reachable from the session's node; ends a session early.
    pub fn current_pois(&self, session: &SelectionSession) -> Result<Vec<Poi>, SelectorError> {
        let session = self.bind(session.clone())?;
        Ok(self.subset_pois(self.nodes[session.current].subset()))
    }

    /// Make `session` point into this tree.
    ///
    /// A session from this task must name an existing node. Any other session
    /// is replayed from the root and fails if its answers leave the tree.
    fn bind(&self, session: SelectionSession) -> Result<SelectionSession, SelectorError> {
        if session.task_id == self.task_id {
            if session.current >= self.nodes.len() {
                return Err(SelectorError::invalid(
                    &self.task_id,
                    format!("node {} out of range", session.current),
                ));
            }
            return Ok(session);
        }
        tracing::debug!(task = %self.task_id, from = %session.task_id, answers = session.history.len(), "rebinding session");
        let rebound = self.resume(&session.answers()).map_err(|e| match e {
            SelectorError::InvalidSessionState { reason, .. } => SelectorError::invalid(
                &self.task_id,
                format!("session from task '{}' does not fit: {}", session.task_id, reason),
            ),
            other => other,
        })?;
        Ok(rebound.session().clone())
    }
}
