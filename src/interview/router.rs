//! Block router
//!
//! Decides what the respondent sees next and moves the session through
//! `context -> expertise -> deep-dive -> risk-scan`. Routing is synchronous
//! and never calls the model. When a block boundary needs a model result
//! (expertise detection, risk-area selection) the router says so and the
//! caller re-routes once the result is stored.

use std::collections::HashSet;
use std::sync::Arc;

use super::question_bank::QuestionBank;
use super::scoring::{CompletenessReport, Scorer};
use crate::config::InterviewConfig;
use crate::error::EngineError;
use crate::models::{
    BlockTransition, FollowUpQuestion, InterviewBlock, InterviewSession, Question,
};

/// What the session needs next
#[derive(Debug, Clone)]
pub enum RouteDecision {
    /// Ask a catalog question
    Ask(Question),
    /// Ask the pending clarification question
    FollowUp(FollowUpQuestion),
    /// The interview is over
    Finish,
    /// Expertise must be detected before deep-dive can start
    NeedsExpertiseDetection,
    /// Risk-scan areas must be chosen before risk-scan questions exist
    NeedsRiskSelection,
}

#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub decision: RouteDecision,
    /// Block transitions performed while routing, oldest first
    pub transitions: Vec<BlockTransition>,
}

pub struct BlockRouter {
    bank: Arc<QuestionBank>,
    scorer: Arc<Scorer>,
    config: InterviewConfig,
}

impl BlockRouter {
    pub fn new(bank: Arc<QuestionBank>, scorer: Arc<Scorer>, config: InterviewConfig) -> Self {
        Self {
            bank,
            scorer,
            config,
        }
    }

    /// Questions of the current block that apply to this session
    fn askable<'a>(&'a self, session: &InterviewSession) -> Vec<&'a Question> {
        self.bank.askable(
            session.current_block,
            session.deep_dive_area.or(session.detected_area),
            session.risk_areas.as_deref(),
            session.persona(),
        )
    }

    /// Next question of the current block, in catalog order.
    ///
    /// A question is done once it was answered directly, or once another
    /// question filling the same field was (persona variants).
    pub fn next_catalog_question<'a>(&'a self, session: &InterviewSession) -> Option<&'a Question> {
        let answered = session.answered_question_ids();
        let answered_fields: HashSet<&str> = answered
            .iter()
            .filter_map(|id| self.bank.get_question_by_id(id).ok())
            .map(|q| q.field())
            .collect();

        self.askable(session)
            .into_iter()
            .find(|q| !answered.contains(q.id.as_str()) && !answered_fields.contains(q.field()))
    }

    fn effective_min_questions(&self, session: &InterviewSession) -> usize {
        let askable = self.askable(session);
        let distinct_fields: HashSet<&str> = askable.iter().map(|q| q.field()).collect();
        self.config
            .min_questions
            .get(session.current_block)
            .min(distinct_fields.len())
    }

    /// Both the minimum question count and the completeness threshold must hold
    pub fn block_criteria_met(&self, session: &InterviewSession, report: &CompletenessReport) -> bool {
        let block = session.current_block;
        let answered = session.answers_in_block(block);
        let completeness = report.block(block).score;

        answered >= self.effective_min_questions(session)
            && completeness >= self.config.block_completeness.get(block)
    }

    fn risk_block_exhausted(&self, session: &InterviewSession) -> bool {
        session.risk_areas.is_some() && self.next_catalog_question(session).is_none()
    }

    /// Sole authority on ending the interview.
    ///
    /// True in risk-scan once its areas are chosen and either its own
    /// criteria plus the terminal completeness hold, or its catalog is spent.
    pub fn can_finish_assessment(&self, session: &InterviewSession) -> bool {
        if session.current_block != InterviewBlock::RiskScan || session.risk_areas.is_none() {
            return false;
        }
        if self.risk_block_exhausted(session) {
            return true;
        }
        let report = self.scorer.report(&self.bank, session);
        self.block_criteria_met(session, &report)
            && report.score >= self.config.terminal_completeness
    }

    /// Decide the next step, advancing blocks as their criteria are met
    pub fn route_to_next_question(
        &self,
        session: &mut InterviewSession,
    ) -> Result<RouteOutcome, EngineError> {
        let mut transitions = Vec::new();

        loop {
            if self.can_finish_assessment(session) {
                let report = self.scorer.report(&self.bank, session);
                let met = self.block_criteria_met(session, &report)
                    && report.score >= self.config.terminal_completeness;
                if !met {
                    let note = format!(
                        "{} block ended before its completion criteria were met",
                        InterviewBlock::RiskScan
                    );
                    if !session.notes.contains(&note) {
                        log::warn!(
                            "Session {} finishing below terminal completeness ({:.1})",
                            session.id,
                            report.score
                        );
                        session.notes.push(note);
                    }
                }
                session.pending_follow_up = None;
                return Ok(RouteOutcome {
                    decision: RouteDecision::Finish,
                    transitions,
                });
            }

            if let Some(follow_up) = &session.pending_follow_up {
                return Ok(RouteOutcome {
                    decision: RouteDecision::FollowUp(follow_up.clone()),
                    transitions,
                });
            }

            let block = session.current_block;
            if block == InterviewBlock::RiskScan && session.risk_areas.is_none() {
                return Ok(RouteOutcome {
                    decision: RouteDecision::NeedsRiskSelection,
                    transitions,
                });
            }

            let report = self.scorer.report(&self.bank, session);
            let criteria_met = self.block_criteria_met(session, &report);
            let next = self.next_catalog_question(session);

            if !criteria_met {
                if let Some(question) = next {
                    return Ok(RouteOutcome {
                        decision: RouteDecision::Ask(question.clone()),
                        transitions,
                    });
                }
            }

            // Criteria met, or the catalog ran out: leave the block
            let Some(to) = block.next() else {
                // Risk-scan with criteria met but below the terminal threshold
                return Ok(RouteOutcome {
                    decision: match next {
                        Some(question) => RouteDecision::Ask(question.clone()),
                        None => RouteDecision::Finish,
                    },
                    transitions,
                });
            };

            if block == InterviewBlock::Expertise && session.detected_area.is_none() {
                return Ok(RouteOutcome {
                    decision: RouteDecision::NeedsExpertiseDetection,
                    transitions,
                });
            }

            let forced = !criteria_met;
            let reason = if forced {
                format!("{} questions exhausted, moving to {}", block, to)
            } else {
                format!("{} complete, moving to {}", block, to)
            };
            if forced {
                log::warn!("Session {}: {}", session.id, reason);
            } else {
                log::info!("Session {}: {}", session.id, reason);
            }

            transitions.push(session.advance_to_block(to, reason, forced)?);
        }
    }
}
