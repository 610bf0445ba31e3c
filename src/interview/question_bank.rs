// Question bank - immutable catalog partitioned into the four interview blocks

use std::collections::{BTreeSet, HashMap};

use super::catalog::builtin_questions;
use crate::error::EngineError;
use crate::models::{Area, InterviewBlock, Persona, Question};

/// Static question catalog, loaded once and never mutated
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
    by_id: HashMap<String, usize>,
}

impl QuestionBank {
    /// Build a bank from a custom catalog, validating its shape
    pub fn new(questions: Vec<Question>) -> Result<Self, EngineError> {
        validate(&questions).map_err(EngineError::Config)?;
        Ok(Self::index(questions))
    }

    fn index(questions: Vec<Question>) -> Self {
        let by_id = questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.id.clone(), i))
            .collect();
        Self { questions, by_id }
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// All questions in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// Catalog position, used as a stable tiebreak
    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Ordered questions of a block; empty blocks are reported as not found
    pub fn get_questions_by_block(
        &self,
        block: InterviewBlock,
    ) -> Result<Vec<&Question>, EngineError> {
        let questions: Vec<&Question> = self.iter().filter(|q| q.block == block).collect();
        if questions.is_empty() {
            return Err(EngineError::QuestionNotFound(format!(
                "no questions in block {}",
                block
            )));
        }
        Ok(questions)
    }

    pub fn get_question_by_id(&self, id: &str) -> Result<&Question, EngineError> {
        self.by_id
            .get(id)
            .map(|&i| &self.questions[i])
            .ok_or_else(|| EngineError::QuestionNotFound(id.to_string()))
    }

    pub fn get_deep_dive_questions(&self, area: Area) -> Result<Vec<&Question>, EngineError> {
        let questions: Vec<&Question> = self
            .iter()
            .filter(|q| q.block == InterviewBlock::DeepDive && q.area == Some(area))
            .collect();
        if questions.is_empty() {
            return Err(EngineError::QuestionNotFound(format!(
                "no deep-dive questions for {}",
                area
            )));
        }
        Ok(questions)
    }

    pub fn get_risk_scan_question(&self, area: Area) -> Result<&Question, EngineError> {
        self.iter()
            .find(|q| q.block == InterviewBlock::RiskScan && q.area == Some(area))
            .ok_or_else(|| {
                EngineError::QuestionNotFound(format!("no risk-scan question for {}", area))
            })
    }

    /// Questions the session would actually be asked in a block, in order.
    ///
    /// Deep-dive questions need `area`; risk-scan questions need `risk_areas`
    /// and follow their order. A missing catalog entry yields an empty list.
    pub fn askable(
        &self,
        block: InterviewBlock,
        area: Option<Area>,
        risk_areas: Option<&[Area]>,
        persona: Option<Persona>,
    ) -> Vec<&Question> {
        let candidates: Vec<&Question> = match block {
            InterviewBlock::Context | InterviewBlock::Expertise => {
                self.get_questions_by_block(block).unwrap_or_default()
            }
            InterviewBlock::DeepDive => area
                .and_then(|a| self.get_deep_dive_questions(a).ok())
                .unwrap_or_default(),
            InterviewBlock::RiskScan => risk_areas
                .unwrap_or_default()
                .iter()
                .filter_map(|a| self.get_risk_scan_question(*a).ok())
                .collect(),
        };

        candidates
            .into_iter()
            .filter(|q| q.applies_to(persona))
            .collect()
    }

    /// Distinct essential fields of a set of questions, in catalog order
    pub fn essential_fields<'a>(questions: &[&'a Question]) -> Vec<&'a str> {
        let mut seen = BTreeSet::new();
        questions
            .iter()
            .filter(|q| q.essential)
            .map(|q| q.field())
            .filter(|f| seen.insert(*f))
            .collect()
    }

    /// Largest number of essential deep-dive fields any single area has
    pub fn max_deep_dive_essentials(&self) -> usize {
        Area::all()
            .iter()
            .filter_map(|a| self.get_deep_dive_questions(*a).ok())
            .map(|qs| Self::essential_fields(&qs).len())
            .max()
            .unwrap_or(0)
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self::index(builtin_questions())
    }
}

fn validate(questions: &[Question]) -> Result<(), String> {
    let mut ids = BTreeSet::new();
    let mut risk_areas = BTreeSet::new();
    let mut fields: HashMap<&str, (InterviewBlock, Option<Area>)> = HashMap::new();

    for q in questions {
        if q.id.trim().is_empty() || q.field().trim().is_empty() {
            return Err("question ids and fields must not be empty".to_string());
        }
        if !ids.insert(q.id.as_str()) {
            return Err(format!("duplicate question id '{}'", q.id));
        }

        match q.block {
            InterviewBlock::Context | InterviewBlock::Expertise if q.area.is_some() => {
                return Err(format!("{} question '{}' must not name an area", q.block, q.id));
            }
            InterviewBlock::DeepDive | InterviewBlock::RiskScan if q.area.is_none() => {
                return Err(format!("{} question '{}' must name an area", q.block, q.id));
            }
            _ => {}
        }

        if q.block == InterviewBlock::RiskScan {
            if let Some(area) = q.area {
                if !risk_areas.insert(area) {
                    return Err(format!("more than one risk-scan question for {}", area));
                }
            }
        }

        // Persona variants may share a field, but only within one block and area
        match fields.get(q.field()) {
            Some(&(block, area)) if block != q.block || area != q.area => {
                return Err(format!(
                    "field '{}' is used by questions in different blocks or areas",
                    q.field()
                ));
            }
            _ => {
                fields.insert(q.field(), (q.block, q.area));
            }
        }
    }
    Ok(())
}
