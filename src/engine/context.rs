//! Prompt assembly.
//!
//! `assemble` is pure: same arguments, byte-identical prompt. Sections are
//! joined by blank lines in a fixed order: RAG preamble, mode instructions,
//! athlete profile (only when supplied), expert knowledge, user question.

use std::collections::BTreeMap;

use crate::models::ChatMode;

/// Leading instruction wrapping every prompt.
pub const RAG_PREAMBLE: &str = "Use the following expert knowledge to answer the question.
If the knowledge doesn't contain relevant information, use your general fitness expertise.";

pub const QUICK_INSTRUCTIONS: &str = "You are Coach Carter, a friendly fitness AI assistant.

QUICK TIP MODE: Provide brief, actionable advice in 2-3 sentences max.

Rules:
- Keep responses under 150 words
- Be direct and helpful
- Focus on immediate tips";

pub const IN_DEPTH_INSTRUCTIONS: &str = "You are Coach Carter, an expert sports training coach with 20+ years of experience.

IN-DEPTH PLAN MODE: Provide comprehensive, structured training programs.

Your response MUST include these sections:

## Program Overview
- Duration and frequency
- Target goal

## Weekly Breakdown
**Day 1: [Muscle Group]**
1. Exercise Name (Sets x Reps, Rest)
2. Exercise Name (Sets x Reps, Rest)

## Warm-Up Protocol
- List 3-5 warm-up exercises with duration

## Cool-Down
- Stretching routine (5-10 minutes)

## Progression Plan
- How to progress over the next 4 weeks

## Safety Notes
- Injury prevention tips
- Form cues

FORMATTING RULES:
- Use headings (##) for sections
- Use bullet points and numbered lists
- Format exercises as: \"Exercise Name (Sets x Reps, Rest)\"
- Be specific with numbers (sets, reps, rest periods)
- ALWAYS consider the athlete's injury history if mentioned";

pub fn instructions(mode: ChatMode) -> &'static str {
    match mode {
        ChatMode::Quick => QUICK_INSTRUCTIONS,
        ChatMode::InDepth => IN_DEPTH_INSTRUCTIONS,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileValue {
    Text(String),
    List(Vec<String>),
}

/// Athlete profile as an ordered key-value bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileBag(BTreeMap<String, ProfileValue>);

impl ProfileBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), ProfileValue::Text(value.into()));
        self
    }

    pub fn with_list(mut self, key: &str, values: &[String]) -> Self {
        let values = values
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        self.0.insert(key.to_string(), ProfileValue::List(values));
        self
    }

    pub fn get(&self, key: &str) -> Option<&ProfileValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// (key, label, placeholder) in render order.
const PROFILE_FIELDS: &[(&str, &str, &str)] = &[
    ("name", "Name", "not specified"),
    ("sport", "Sport", "not specified"),
    ("age", "Age", "not specified"),
    ("height_cm", "Height (cm)", "not specified"),
    ("weight_kg", "Weight (kg)", "not specified"),
    ("experience", "Experience", "not specified"),
    ("goals", "Goals", "not specified"),
    ("duration_weeks", "Program Duration (weeks)", "not specified"),
    ("sessions_per_week", "Sessions per Week", "not specified"),
    ("equipment", "Equipment", "bodyweight only"),
    ("injuries", "Injuries", "none"),
    ("dietary_restrictions", "Dietary Restrictions", "none"),
];

fn render_value(value: Option<&ProfileValue>, placeholder: &str) -> String {
    match value {
        Some(ProfileValue::Text(text)) if !text.trim().is_empty() => text.trim().to_string(),
        Some(ProfileValue::List(items)) if !items.is_empty() => items.join(", "),
        _ => placeholder.to_string(),
    }
}

/// Render the profile block. Known fields come first in table order, every
/// one of them present; unknown keys follow in key order.
pub fn render_profile(profile: &ProfileBag) -> String {
    let mut out = String::from("ATHLETE PROFILE:");

    for (key, label, placeholder) in PROFILE_FIELDS {
        out.push_str(&format!(
            "\n- {label}: {}",
            render_value(profile.get(key), placeholder)
        ));
    }

    for (key, value) in &profile.0 {
        if PROFILE_FIELDS.iter().any(|(known, _, _)| *known == key.as_str()) {
            continue;
        }
        out.push_str(&format!(
            "\n- {key}: {}",
            render_value(Some(value), "not specified")
        ));
    }

    out
}

/// Build the complete prompt sent to the LLM.
pub fn assemble(
    query: &str,
    mode: ChatMode,
    context: &[&str],
    profile: Option<&ProfileBag>,
) -> String {
    let mut sections: Vec<String> = vec![RAG_PREAMBLE.into(), instructions(mode).into()];

    if let Some(profile) = profile {
        sections.push(render_profile(profile));
    }

    sections.push(format!("Expert Knowledge:\n{}", context.join("\n\n")));
    sections.push(format!("User Question: {query}"));
    sections.push("Your Response:".into());

    sections.join("\n\n")
}

/// Truncate string to max characters, respecting word boundaries
pub fn truncate(s: &str, max_chars: usize) -> &str {
    let Some((cut, _)) = s.char_indices().nth(max_chars) else {
        return s;
    };

    // Find last space before limit
    s[..cut].rfind(' ').map(|idx| &s[..idx]).unwrap_or(&s[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLIFT: &str = "Deadlifts need neutral spine alignment.";
    const SQUAT: &str = "Squats build leg strength.";

    fn sample_bag() -> ProfileBag {
        ProfileBag::new()
            .with_text("name", "John")
            .with_list("goals", &["strength".to_string()])
            .with_list("injuries", &["lower back pain".to_string()])
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let bag = sample_bag();
        let a = assemble("Is deadlift safe?", ChatMode::InDepth, &[DEADLIFT, SQUAT], Some(&bag));
        let b = assemble("Is deadlift safe?", ChatMode::InDepth, &[DEADLIFT, SQUAT], Some(&bag));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sections_appear_in_fixed_order() {
        let bag = sample_bag();
        let prompt = assemble("Is deadlift safe?", ChatMode::Quick, &[DEADLIFT, SQUAT], Some(&bag));

        let positions: Vec<usize> = [
            RAG_PREAMBLE,
            QUICK_INSTRUCTIONS,
            "ATHLETE PROFILE:",
            "Expert Knowledge:",
            DEADLIFT,
            SQUAT,
            "User Question: Is deadlift safe?",
        ]
        .iter()
        .map(|needle| prompt.find(needle).unwrap())
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
        assert!(prompt.contains(&format!("{DEADLIFT}\n\n{SQUAT}")));
    }

    #[test]
    fn test_mode_only_changes_instruction_block() {
        let ctx = [DEADLIFT, SQUAT];
        let quick = assemble("How often?", ChatMode::Quick, &ctx, None);
        let deep = assemble("How often?", ChatMode::InDepth, &ctx, None);

        assert_ne!(quick, deep);
        assert_eq!(
            quick.replacen(QUICK_INSTRUCTIONS, "<mode>", 1),
            deep.replacen(IN_DEPTH_INSTRUCTIONS, "<mode>", 1)
        );
    }

    #[test]
    fn test_profile_block_only_when_supplied() {
        let without = assemble("q", ChatMode::Quick, &[DEADLIFT], None);
        assert!(!without.contains("ATHLETE PROFILE:"));

        let with = assemble("q", ChatMode::Quick, &[DEADLIFT], Some(&ProfileBag::new()));
        assert!(with.contains("ATHLETE PROFILE:"));
    }

    #[test]
    fn test_empty_context_keeps_instructions_and_query() {
        let empty = assemble("anything", ChatMode::InDepth, &[], None);
        let full = assemble("anything", ChatMode::InDepth, &[DEADLIFT], None);

        assert!(empty.contains("Expert Knowledge:\n\n\nUser Question: anything"));
        assert_eq!(empty, full.replacen(DEADLIFT, "", 1));
        assert!(empty.contains(IN_DEPTH_INSTRUCTIONS));
    }

    #[test]
    fn test_missing_fields_render_placeholders() {
        let rendered = render_profile(&sample_bag());

        assert!(rendered.contains("- Name: John"));
        assert!(rendered.contains("- Goals: strength"));
        assert!(rendered.contains("- Injuries: lower back pain"));
        assert!(rendered.contains("- Age: not specified"));
        assert!(rendered.contains("- Equipment: bodyweight only"));
        assert!(rendered.contains("- Dietary Restrictions: none"));
        assert_eq!(rendered.lines().count(), 1 + PROFILE_FIELDS.len());
    }

    #[test]
    fn test_empty_values_fall_back_to_placeholders() {
        let bag = ProfileBag::new()
            .with_text("sport", "   ")
            .with_list("injuries", &["".to_string()]);
        let rendered = render_profile(&bag);

        assert!(rendered.contains("- Sport: not specified"));
        assert!(rendered.contains("- Injuries: none"));
    }

    #[test]
    fn test_unknown_keys_follow_known_fields() {
        let bag = sample_bag().with_text("preferred_time", "morning");
        let rendered = render_profile(&bag);

        assert!(rendered.ends_with("- preferred_time: morning"));
    }

    #[test]
    fn test_truncate_respects_word_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("hello brave new world", 12), "hello brave");
        assert_eq!(truncate("ééééé", 3), "ééé");
    }
}
