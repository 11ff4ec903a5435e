use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::store::AssessmentStore;
use crate::error::Result;
use crate::models::assessment::Assessment;
use crate::models::assignment::Assignment;
use crate::models::question::Question;
use crate::models::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub raw_score: i32,
    pub total_points: i32,
    pub percentage: i32,
    pub passed: bool,
}

impl ScoreResult {
    /// The outcome persisted on an assignment at submission time.
    pub fn from_stored(assignment: &Assignment) -> Self {
        Self {
            raw_score: assignment.score.unwrap_or(0),
            total_points: assignment.total_points.unwrap_or(0),
            percentage: assignment.percentage.unwrap_or(0),
            passed: assignment.passed.unwrap_or(false),
        }
    }
}

/// One line of the read-only review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_id: Uuid,
    pub position: i32,
    pub question_text: String,
    pub options: Vec<String>,
    pub selected_option: Option<i32>,
    pub correct_option: i32,
    pub is_correct: bool,
    pub points_earned: i32,
    pub max_points: i32,
    pub explanation: Option<String>,
}

#[derive(Clone)]
pub struct GradingService {
    store: Arc<dyn AssessmentStore>,
}

impl GradingService {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    /// Recomputes the score of an assignment from what is persisted.
    pub async fn score(&self, assignment_id: Uuid) -> Result<ScoreResult> {
        let assignment = self.store.get_assignment(assignment_id).await?;
        self.score_assignment(&assignment).await
    }

    pub async fn score_assignment(&self, assignment: &Assignment) -> Result<ScoreResult> {
        let assessment = self.store.get_assessment(assignment.assessment_id).await?;
        let questions = self.store.get_questions(assessment.id).await?;
        let responses = self.store.list_responses(assignment.id).await?;
        Ok(Self::compute(&assessment, &questions, &responses))
    }

    /// Unanswered questions contribute zero to the raw score but their points
    /// still count toward the total.
    pub fn compute(
        assessment: &Assessment,
        questions: &[Question],
        responses: &[Response],
    ) -> ScoreResult {
        let total_points: i64 = questions.iter().map(|q| i64::from(q.points)).sum();
        let raw_score: i64 = responses.iter().map(|r| i64::from(r.points_earned)).sum();

        if total_points == 0 && assessment.passing_score > Decimal::ZERO {
            tracing::warn!(
                assessment_id = %assessment.id,
                passing_score = %assessment.passing_score,
                "Assessment has no scorable points but a positive passing score"
            );
        }
        if raw_score > total_points {
            tracing::warn!(
                assessment_id = %assessment.id,
                raw_score,
                total_points,
                "Recorded points exceed the assessment total"
            );
        }

        let percentage = percentage_of(raw_score, total_points);
        let passed = total_points > 0 && Decimal::from(percentage) >= assessment.passing_score;

        ScoreResult {
            raw_score: clamp_points(assessment, "raw_score", raw_score),
            total_points: clamp_points(assessment, "total_points", total_points),
            percentage,
            passed,
        }
    }

    pub fn breakdown(questions: &[Question], responses: &[Response]) -> Vec<GradedAnswer> {
        let by_question: HashMap<Uuid, &Response> =
            responses.iter().map(|r| (r.question_id, r)).collect();

        questions
            .iter()
            .map(|q| {
                let response = by_question.get(&q.id);
                GradedAnswer {
                    question_id: q.id,
                    position: q.position,
                    question_text: q.text.clone(),
                    options: q.options.clone(),
                    selected_option: response.map(|r| r.selected_option),
                    correct_option: q.correct_option,
                    is_correct: response.map(|r| r.is_correct).unwrap_or(false),
                    points_earned: response.map(|r| r.points_earned).unwrap_or(0),
                    max_points: q.points,
                    explanation: q.explanation.clone(),
                }
            })
            .collect()
    }
}

/// `round(raw / total * 100)` with halves rounded up; zero when there is
/// nothing to score.
pub fn percentage_of(raw_score: i64, total_points: i64) -> i32 {
    if total_points <= 0 {
        return 0;
    }
    let pct = Decimal::from(raw_score) * Decimal::ONE_HUNDRED / Decimal::from(total_points);
    pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
        .unwrap_or(0)
}

fn clamp_points(assessment: &Assessment, field: &'static str, value: i64) -> i32 {
    i32::try_from(value).unwrap_or_else(|_| {
        tracing::warn!(
            assessment_id = %assessment.id,
            field,
            value,
            "Point sum does not fit the stored column, clamping"
        );
        if value < 0 {
            i32::MIN
        } else {
            i32::MAX
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::assessment::{AssessmentStatus, AssessmentType};
    use chrono::Utc;

    fn assessment(passing_score: i64) -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            title: "Cardiology quiz".into(),
            assessment_type: AssessmentType::Quiz,
            duration_minutes: 30,
            total_points: 40,
            passing_score: Decimal::from(passing_score),
            due_date: None,
            status: AssessmentStatus::Active,
            professor_id: Uuid::new_v4(),
        }
    }

    fn questions(assessment_id: Uuid, points: &[i32]) -> Vec<Question> {
        points
            .iter()
            .enumerate()
            .map(|(idx, p)| Question {
                id: Uuid::new_v4(),
                assessment_id,
                position: idx as i32,
                text: format!("Q{}", idx + 1),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_option: 2,
                points: *p,
                explanation: None,
            })
            .collect()
    }

    fn answer(assignment_id: Uuid, question: &Question, selected: i32) -> Response {
        Response {
            id: Uuid::new_v4(),
            assignment_id,
            question_id: question.id,
            selected_option: selected,
            is_correct: question.is_correct(selected),
            points_earned: question.points_for(selected),
            answered_at: Utc::now(),
        }
    }

    #[test]
    fn partial_attempt_counts_unanswered_points_in_total() {
        let a = assessment(70);
        let qs = questions(a.id, &[10, 10, 10, 10]);
        let assignment_id = Uuid::new_v4();
        let responses = vec![
            answer(assignment_id, &qs[0], 2),
            answer(assignment_id, &qs[1], 0),
            answer(assignment_id, &qs[2], 2),
        ];

        let result = GradingService::compute(&a, &qs, &responses);
        assert_eq!(
            result,
            ScoreResult {
                raw_score: 20,
                total_points: 40,
                percentage: 50,
                passed: false
            }
        );
    }

    #[test]
    fn all_correct_passes() {
        let a = assessment(70);
        let qs = questions(a.id, &[10, 10, 10, 10]);
        let assignment_id = Uuid::new_v4();
        let responses: Vec<Response> = qs.iter().map(|q| answer(assignment_id, q, 2)).collect();

        let result = GradingService::compute(&a, &qs, &responses);
        assert_eq!(result.raw_score, 40);
        assert_eq!(result.percentage, 100);
        assert!(result.passed);
    }

    #[test]
    fn total_points_ignores_how_many_were_answered() {
        let a = assessment(50);
        let qs = questions(a.id, &[1, 2, 3, 5, 8]);
        let assignment_id = Uuid::new_v4();
        for answered in 0..=qs.len() {
            let responses: Vec<Response> = qs[..answered]
                .iter()
                .map(|q| answer(assignment_id, q, 2))
                .collect();
            assert_eq!(GradingService::compute(&a, &qs, &responses).total_points, 19);
        }
    }

    #[test]
    fn no_questions_scores_zero_and_fails() {
        let a = assessment(60);
        let result = GradingService::compute(&a, &[], &[]);
        assert_eq!(result.percentage, 0);
        assert_eq!(result.total_points, 0);
        assert!(!result.passed);
    }

    #[test]
    fn no_questions_fails_even_with_zero_threshold() {
        let a = assessment(0);
        assert!(!GradingService::compute(&a, &[], &[]).passed);
    }

    #[test]
    fn passing_exactly_at_threshold() {
        let a = assessment(50);
        let qs = questions(a.id, &[1, 1]);
        let assignment_id = Uuid::new_v4();
        let responses = vec![answer(assignment_id, &qs[0], 2)];
        let result = GradingService::compute(&a, &qs, &responses);
        assert_eq!(result.percentage, 50);
        assert!(result.passed);
    }

    #[test]
    fn fractional_threshold_compares_against_rounded_percentage() {
        let mut a = assessment(0);
        a.passing_score = Decimal::new(625, 1);
        let qs = questions(a.id, &[1, 1, 1, 1, 1, 1, 1, 1]);
        let assignment_id = Uuid::new_v4();
        let responses: Vec<Response> =
            qs[..5].iter().map(|q| answer(assignment_id, q, 2)).collect();
        let result = GradingService::compute(&a, &qs, &responses);
        assert_eq!(result.percentage, 63);
        assert!(result.passed);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage_of(1, 8), 13);
        assert_eq!(percentage_of(1, 3), 33);
        assert_eq!(percentage_of(2, 3), 67);
        assert_eq!(percentage_of(1, 200), 1);
        assert_eq!(percentage_of(0, 7), 0);
        assert_eq!(percentage_of(5, 0), 0);
    }

    #[test]
    fn compute_is_repeatable() {
        let a = assessment(70);
        let qs = questions(a.id, &[3, 4, 5]);
        let assignment_id = Uuid::new_v4();
        let responses = vec![answer(assignment_id, &qs[1], 2), answer(assignment_id, &qs[2], 1)];
        let first = GradingService::compute(&a, &qs, &responses);
        let second = GradingService::compute(&a, &qs, &responses);
        assert_eq!(first, second);
    }

    #[test]
    fn breakdown_lists_every_question_in_order() {
        let a = assessment(70);
        let qs = questions(a.id, &[2, 2, 2]);
        let assignment_id = Uuid::new_v4();
        let responses = vec![answer(assignment_id, &qs[2], 2), answer(assignment_id, &qs[0], 1)];

        let lines = GradingService::breakdown(&qs, &responses);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].selected_option, Some(1));
        assert!(!lines[0].is_correct);
        assert_eq!(lines[1].selected_option, None);
        assert_eq!(lines[1].points_earned, 0);
        assert_eq!(lines[2].points_earned, 2);
        assert!(lines[2].is_correct);
        assert_eq!(lines[2].max_points, 2);
    }

    fn store_with(
        a: &Assessment,
        qs: &[Question],
        responses: std::result::Result<Vec<Response>, ()>,
    ) -> (crate::database::store::MockAssessmentStore, Uuid) {
        use crate::models::assignment::AssignmentStatus;

        let assignment = Assignment {
            id: Uuid::new_v4(),
            assessment_id: a.id,
            student_id: Uuid::new_v4(),
            status: AssignmentStatus::InProgress,
            started_at: Some(Utc::now()),
            completed_at: None,
            score: None,
            total_points: None,
            percentage: None,
            passed: None,
        };
        let id = assignment.id;
        let mut store = crate::database::store::MockAssessmentStore::new();
        store
            .expect_get_assignment()
            .returning(move |_| Ok(assignment.clone()));
        let assessment = a.clone();
        store
            .expect_get_assessment()
            .returning(move |_| Ok(assessment.clone()));
        let questions = qs.to_vec();
        store
            .expect_get_questions()
            .returning(move |_| Ok(questions.clone()));
        store.expect_list_responses().returning(move |_| match &responses {
            Ok(rows) => Ok(rows.clone()),
            Err(()) => Err(crate::error::Error::TransientWriteFailure("timeout".into())),
        });
        (store, id)
    }

    #[test]
    fn score_reads_everything_from_the_store() {
        let a = assessment(50);
        let qs = questions(a.id, &[5, 5]);
        let placeholder = Uuid::new_v4();
        let responses = vec![answer(placeholder, &qs[0], 2)];
        let (store, id) = store_with(&a, &qs, Ok(responses));

        let grading = GradingService::new(Arc::new(store));
        let result = tokio_test::block_on(grading.score(id)).unwrap();
        assert_eq!(result.raw_score, 5);
        assert_eq!(result.total_points, 10);
        assert_eq!(result.percentage, 50);
        assert!(result.passed);
    }

    #[test]
    fn score_propagates_read_failures() {
        let a = assessment(50);
        let qs = questions(a.id, &[5, 5]);
        let (store, id) = store_with(&a, &qs, Err(()));

        let grading = GradingService::new(Arc::new(store));
        let err = tokio_test::block_on(grading.score(id)).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn huge_point_values_do_not_overflow() {
        let a = assessment(50);
        let qs = questions(a.id, &[i32::MAX, i32::MAX]);
        let assignment_id = Uuid::new_v4();
        let responses = vec![answer(assignment_id, &qs[0], 2)];

        let result = GradingService::compute(&a, &qs, &responses);
        assert_eq!(result.raw_score, i32::MAX);
        assert_eq!(result.total_points, i32::MAX);
        assert_eq!(result.percentage, 50);
        assert!(result.passed);
    }
}
