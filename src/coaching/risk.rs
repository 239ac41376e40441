//! Table-driven injury risk and goal effectiveness scoring.

use std::fmt;

use serde::Serialize;

const BASE_RISK: u8 = 2;
const RISK_PER_CONFLICT: u8 = 3;
const MAX_RISK: u8 = 10;
const DEFAULT_EFFECTIVENESS: u8 = 5;

/// Body part → exercises that load it
const HIGH_RISK: &[(&str, &[&str])] = &[
    ("back", &["deadlift", "squat", "bent over row", "overhead press", "clean"]),
    ("knee", &["squat", "lunge", "leg extension", "box jump", "running"]),
    ("shoulder", &["overhead press", "bench press", "pull-up", "dip", "upright row"]),
    ("ankle", &["box jump", "running", "jump rope", "burpee", "plyometric"]),
    ("wrist", &["push-up", "plank", "handstand", "clean", "front squat"]),
    ("hip", &["squat", "deadlift", "lunge", "leg press", "running"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalCategory {
    Strength,
    MuscleGain,
    FatLoss,
    Endurance,
}

impl fmt::Display for GoalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GoalCategory::Strength => "strength",
            GoalCategory::MuscleGain => "muscle gain",
            GoalCategory::FatLoss => "fat loss",
            GoalCategory::Endurance => "endurance",
        };
        f.write_str(name)
    }
}

/// First matching category wins.
const GOAL_ALIASES: &[(GoalCategory, &[&str])] = &[
    (GoalCategory::Strength, &["strength", "power", "strong"]),
    (GoalCategory::MuscleGain, &["muscle", "hypertrophy", "bulk", "mass"]),
    (GoalCategory::FatLoss, &["fat loss", "weight loss", "cut", "lean"]),
    (GoalCategory::Endurance, &["endurance", "cardio", "stamina", "conditioning"]),
];

struct Tiers {
    high: &'static [&'static str],
    medium: &'static [&'static str],
    low: &'static [&'static str],
}

fn tiers(goal: GoalCategory) -> Tiers {
    match goal {
        GoalCategory::Strength => Tiers {
            high: &["deadlift", "squat", "bench press", "overhead press", "row"],
            medium: &["lunge", "pull-up", "dip", "clean", "snatch"],
            low: &["bicep curl", "tricep extension", "calf raise", "lateral raise"],
        },
        GoalCategory::MuscleGain => Tiers {
            high: &["squat", "deadlift", "bench press", "pull-up", "row", "lunge"],
            medium: &["leg press", "dumbbell press", "bicep curl", "tricep extension"],
            low: &["calf raise", "wrist curl", "neck exercise"],
        },
        GoalCategory::FatLoss => Tiers {
            high: &["burpee", "sprint", "jump rope", "circuit training", "hiit"],
            medium: &["running", "cycling", "rowing", "swimming"],
            low: &["walking", "stretching", "yoga"],
        },
        GoalCategory::Endurance => Tiers {
            high: &["running", "cycling", "swimming", "rowing", "jump rope"],
            medium: &["circuit training", "hiking", "stair climbing"],
            low: &["weightlifting", "powerlifting", "sprint"],
        },
    }
}

pub fn goal_category(goal: &str) -> Option<GoalCategory> {
    let goal = goal.to_lowercase();
    GOAL_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| goal.contains(alias)))
        .map(|(category, _)| *category)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub exercise: String,
    pub risk: u8,
    pub effectiveness: u8,
    pub reason: String,
}

/// Risk score 0-10: base 2, +3 for every injury/exercise conflict.
pub fn assess_risk(exercise: &str, injuries: &[String]) -> (u8, String) {
    if injuries.is_empty() {
        return (BASE_RISK, "No injury history - low baseline risk".into());
    }

    let exercise_lower = exercise.to_lowercase();
    let mut risk = BASE_RISK;
    let mut reasons = Vec::new();

    for injury in injuries.iter().map(|i| i.to_lowercase()) {
        for (part, risky) in HIGH_RISK {
            if !injury.contains(part) {
                continue;
            }
            for _ in risky.iter().filter(|r| exercise_lower.contains(*r)) {
                risk = risk.saturating_add(RISK_PER_CONFLICT);
                reasons.push(format!(
                    "{} injury increases risk for {exercise}",
                    capitalize(part)
                ));
            }
        }
    }

    let reason = if reasons.is_empty() {
        "Low risk - no injury conflicts".to_string()
    } else {
        reasons.join("; ")
    };
    (risk.min(MAX_RISK), reason)
}

/// Effectiveness score: 9 high tier, 6 medium, 3 low, 5 otherwise.
pub fn assess_effectiveness(exercise: &str, goal: &str) -> (u8, String) {
    let default = (
        DEFAULT_EFFECTIVENESS,
        "Moderate effectiveness for general fitness".to_string(),
    );
    let Some(category) = goal_category(goal) else {
        return default;
    };

    let exercise_lower = exercise.to_lowercase();
    let hits = |tier: &[&str]| tier.iter().any(|e| exercise_lower.contains(e));
    let tiers = tiers(category);

    if hits(tiers.high) {
        (9, format!("Excellent for {category} goals"))
    } else if hits(tiers.medium) {
        (6, format!("Good for {category} goals"))
    } else if hits(tiers.low) {
        (3, format!("Limited effectiveness for {category} goals"))
    } else {
        default
    }
}

pub fn assess(exercise: &str, injuries: &[String], goal: &str) -> Assessment {
    let (risk, risk_reason) = assess_risk(exercise, injuries);
    let (effectiveness, effect_reason) = assess_effectiveness(exercise, goal);

    Assessment {
        exercise: exercise.to_string(),
        risk,
        effectiveness,
        reason: format!("{effect_reason}. {risk_reason}"),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injuries(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_injuries_is_baseline() {
        assert_eq!(assess_risk("Deadlift", &[]).0, BASE_RISK);
    }

    #[test]
    fn test_back_injury_flags_deadlift() {
        let (risk, reason) = assess_risk("Deadlift", &injuries(&["Lower back pain"]));
        assert_eq!(risk, 5);
        assert_eq!(reason, "Back injury increases risk for Deadlift");
    }

    #[test]
    fn test_risk_accumulates_and_caps() {
        // back: squat, hip: squat, knee: squat, wrist: front squat + squat
        let (risk, _) = assess_risk(
            "Front Squat",
            &injuries(&["back", "hip", "knee", "wrist"]),
        );
        assert_eq!(risk, MAX_RISK);
    }

    #[test]
    fn test_unrelated_injury_is_low_risk() {
        let (risk, reason) = assess_risk("Swimming", &injuries(&["sprained wrist"]));
        assert_eq!(risk, BASE_RISK);
        assert_eq!(reason, "Low risk - no injury conflicts");
    }

    #[test]
    fn test_goal_aliases() {
        assert_eq!(goal_category("Build power"), Some(GoalCategory::Strength));
        assert_eq!(goal_category("hypertrophy"), Some(GoalCategory::MuscleGain));
        assert_eq!(goal_category("Weight loss"), Some(GoalCategory::FatLoss));
        assert_eq!(goal_category("conditioning"), Some(GoalCategory::Endurance));
        assert_eq!(goal_category("flexibility"), None);
    }

    #[test]
    fn test_effectiveness_tiers() {
        assert_eq!(assess_effectiveness("Back Squat", "strength").0, 9);
        assert_eq!(assess_effectiveness("Walking lunge", "strength").0, 6);
        assert_eq!(assess_effectiveness("Calf raise", "strength").0, 3);
        assert_eq!(assess_effectiveness("Yoga flow", "strength").0, 5);
        assert_eq!(assess_effectiveness("HIIT intervals", "fat loss").0, 9);
        assert_eq!(assess_effectiveness("Deadlift", "general").0, 5);
    }

    #[test]
    fn test_assess_combines_reasons() {
        let a = assess("Deadlift", &injuries(&["back strain"]), "strength");
        assert_eq!(a.risk, 5);
        assert_eq!(a.effectiveness, 9);
        assert_eq!(
            a.reason,
            "Excellent for strength goals. Back injury increases risk for Deadlift"
        );
    }
}
