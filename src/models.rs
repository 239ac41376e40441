use serde::{Deserialize, Serialize};

use crate::engine::context::ProfileBag;
use crate::profile::ProfileError;

/// Answer style requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatMode {
    /// Short, actionable tips.
    #[serde(alias = "quick-tip")]
    Quick,
    /// Structured multi-section training plan.
    #[default]
    InDepth,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Quick => "quick",
            ChatMode::InDepth => "in-depth",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AthleteProfile {
    pub user_id: String,
    pub name: String,
    pub age: u32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub gender: String,
    pub sport: String,
    pub experience_years: u32,
    pub goals: Vec<String>,
    pub duration_weeks: u32,
    pub sessions_per_week: u32,
    #[serde(default)]
    pub available_equipment: Vec<String>,
    #[serde(default)]
    pub injuries: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
}

impl AthleteProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        let checks: [(bool, &str); 9] = [
            (!self.name.trim().is_empty(), "name must not be empty"),
            ((10..=100).contains(&self.age), "age must be between 10 and 100"),
            (
                (100.0..=250.0).contains(&self.height_cm),
                "height_cm must be between 100 and 250",
            ),
            (
                (30.0..=300.0).contains(&self.weight_kg),
                "weight_kg must be between 30 and 300",
            ),
            (!self.sport.trim().is_empty(), "sport must not be empty"),
            (
                self.experience_years <= 60,
                "experience_years must be between 0 and 60",
            ),
            (
                self.goals.iter().any(|g| !g.trim().is_empty()),
                "at least one goal is required",
            ),
            (
                (1..=52).contains(&self.duration_weeks),
                "duration_weeks must be between 1 and 52",
            ),
            (
                (1..=7).contains(&self.sessions_per_week),
                "sessions_per_week must be between 1 and 7",
            ),
        ];

        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(ProfileError::Validation((*message).to_string())),
            None => Ok(()),
        }
    }

    /// Goal used for effectiveness scoring.
    pub fn primary_goal(&self) -> &str {
        self.goals
            .iter()
            .map(|g| g.trim())
            .find(|g| !g.is_empty())
            .unwrap_or("general")
    }

    /// Key-value view consumed by the prompt assembler.
    pub fn to_bag(&self) -> ProfileBag {
        ProfileBag::new()
            .with_text("name", &self.name)
            .with_text("sport", &self.sport)
            .with_text("age", format!("{} years", self.age))
            .with_text("height_cm", self.height_cm.to_string())
            .with_text("weight_kg", self.weight_kg.to_string())
            .with_text("experience", format!("{} years", self.experience_years))
            .with_list("goals", &self.goals)
            .with_text("duration_weeks", self.duration_weeks.to_string())
            .with_text("sessions_per_week", self.sessions_per_week.to_string())
            .with_list("equipment", &self.available_equipment)
            .with_list("injuries", &self.injuries)
            .with_list("dietary_restrictions", &self.dietary_restrictions)
    }
}

#[cfg(test)]
pub(crate) fn sample_profile() -> AthleteProfile {
    AthleteProfile {
        user_id: "user123".into(),
        name: "John".into(),
        age: 25,
        height_cm: 180.0,
        weight_kg: 75.0,
        gender: "male".into(),
        sport: "football".into(),
        experience_years: 5,
        goals: vec!["strength".into(), "speed".into()],
        duration_weeks: 12,
        sessions_per_week: 5,
        available_equipment: vec![],
        injuries: vec!["lower back pain".into()],
        dietary_restrictions: vec![],
    }
}
