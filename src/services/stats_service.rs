use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::database::store::AssessmentStore;
use crate::error::{Error, Result};
use crate::models::assessment::Assessment;
use crate::models::assignment::Assignment;
use crate::models::session::{Role, Session};

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentSummary {
    pub assessment_id: Uuid,
    pub title: String,
    pub total_assignments: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub scored_attempts: usize,
    pub average_percentage: Option<f64>,
    pub pass_rate: Option<f64>,
    pub highest_percentage: Option<i32>,
    pub lowest_percentage: Option<i32>,
}

#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn AssessmentStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    pub async fn assessment_summary(
        &self,
        session: &Session,
        assessment_id: Uuid,
    ) -> Result<AssessmentSummary> {
        let assessment = self.store.get_assessment(assessment_id).await?;
        let allowed = match session.role {
            Role::Admin => true,
            Role::Professor => assessment.professor_id == session.user_id,
            Role::Student => false,
        };
        if !allowed {
            return Err(Error::Forbidden(
                "Only the owning professor can view this summary".to_string(),
            ));
        }

        let assignments = self.store.list_assignments(assessment.id).await?;
        Ok(summarize(&assessment, &assignments))
    }
}

pub fn summarize(assessment: &Assessment, assignments: &[Assignment]) -> AssessmentSummary {
    let mut status_counts = BTreeMap::new();
    for a in assignments {
        *status_counts.entry(a.status.as_str().to_string()).or_insert(0) += 1;
    }

    let scored: Vec<&Assignment> = assignments
        .iter()
        .filter(|a| a.status.is_finished() && a.percentage.is_some())
        .collect();
    let percentages: Vec<i32> = scored.iter().filter_map(|a| a.percentage).collect();

    let average_percentage = if percentages.is_empty() {
        None
    } else {
        let sum: i64 = percentages.iter().map(|p| i64::from(*p)).sum();
        Some(round_1(sum as f64 / percentages.len() as f64))
    };
    let pass_rate = if scored.is_empty() {
        None
    } else {
        let passed = scored.iter().filter(|a| a.passed == Some(true)).count();
        Some(round_1(passed as f64 * 100.0 / scored.len() as f64))
    };

    AssessmentSummary {
        assessment_id: assessment.id,
        title: assessment.title.clone(),
        total_assignments: assignments.len(),
        status_counts,
        scored_attempts: scored.len(),
        average_percentage,
        pass_rate,
        highest_percentage: percentages.iter().copied().max(),
        lowest_percentage: percentages.iter().copied().min(),
    }
}

fn round_1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
