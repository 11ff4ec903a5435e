use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A multiple-choice question. `position` orders questions within their assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub position: i32,
    pub text: String,
    pub options: Vec<String>,
    pub correct_option: i32,
    #[serde(default = "default_points")]
    pub points: i32,
    pub explanation: Option<String>,
}

fn default_points() -> i32 {
    1
}

impl Question {
    pub fn has_option(&self, index: i32) -> bool {
        index >= 0 && (index as usize) < self.options.len()
    }

    pub fn is_correct(&self, selected_option: i32) -> bool {
        selected_option == self.correct_option
    }

    pub fn points_for(&self, selected_option: i32) -> i32 {
        if self.is_correct(selected_option) {
            self.points
        } else {
            0
        }
    }
}
