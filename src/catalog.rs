use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Math,
    Physics,
    Chemistry,
    Biology,
    English,
    History,
    Geography,
}

impl Subject {
    pub const ALL: [Subject; 7] = [
        Subject::Math,
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::English,
        Subject::History,
        Subject::Geography,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::English => "english",
            Subject::History => "history",
            Subject::Geography => "geography",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Math => "Mathematics",
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Biology => "Biology",
            Subject::English => "English",
            Subject::History => "History",
            Subject::Geography => "Geography",
        }
    }

    pub fn topics(&self) -> &'static [&'static str] {
        match self {
            Subject::Math => &[
                "Algebra",
                "Geometry",
                "Trigonometry",
                "Calculus",
                "Statistics",
                "Probability",
                "Number Theory",
                "Linear Equations",
                "Quadratic Equations",
            ],
            Subject::Physics => &[
                "Mechanics",
                "Thermodynamics",
                "Waves",
                "Optics",
                "Electricity",
                "Magnetism",
                "Modern Physics",
                "Kinematics",
                "Dynamics",
            ],
            Subject::Chemistry => &[
                "Atomic Structure",
                "Organic Chemistry",
                "Acids & Bases",
                "Chemical Bonding",
                "Periodic Table",
                "Thermochemistry",
                "Electrochemistry",
            ],
            Subject::Biology => &[
                "Cell Biology",
                "Genetics",
                "Ecology",
                "Human Physiology",
                "Plant Biology",
                "Evolution",
                "Molecular Biology",
                "Anatomy",
            ],
            Subject::English => &[
                "Grammar",
                "Literature",
                "Poetry",
                "Essay Writing",
                "Reading Comprehension",
                "Creative Writing",
                "Vocabulary",
                "Sentence Structure",
            ],
            Subject::History => &[
                "Ancient History",
                "Medieval History",
                "Modern History",
                "World Wars",
                "Indian Independence",
                "Civilizations",
                "Cultural History",
            ],
            Subject::Geography => &[
                "Physical Geography",
                "Human Geography",
                "Climate",
                "Natural Resources",
                "Population",
                "Economic Geography",
                "Environmental Geography",
            ],
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Subject::ALL
            .iter()
            .copied()
            .find(|subject| subject.as_str() == wanted)
            .ok_or_else(|| format!("unknown subject '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[default]
    Mixed,
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "mixed" => Ok(Difficulty::Mixed),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Style of study notes the backend writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    #[default]
    Comprehensive,
    Summary,
    QuickReference,
}

impl NoteType {
    pub const ALL: [NoteType; 3] = [
        NoteType::Comprehensive,
        NoteType::Summary,
        NoteType::QuickReference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Comprehensive => "comprehensive",
            NoteType::Summary => "summary",
            NoteType::QuickReference => "quick_reference",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NoteType::Comprehensive => "Comprehensive Notes",
            NoteType::Summary => "Summary Notes",
            NoteType::QuickReference => "Quick Reference",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            NoteType::Comprehensive => "Detailed notes with examples and explanations",
            NoteType::Summary => "Concise overview of key points",
            NoteType::QuickReference => "Essential formulas and facts",
        }
    }
}

impl FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        match wanted.as_str() {
            "comprehensive" | "full" => Ok(NoteType::Comprehensive),
            "summary" => Ok(NoteType::Summary),
            "quick_reference" | "quick" => Ok(NoteType::QuickReference),
            _ => Err(format!("unknown note type '{}'", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MindfulnessActivity {
    pub id: &'static str,
    /// Value sent as `activity_type` when the session is logged.
    pub activity_type: &'static str,
    pub name: &'static str,
    pub minutes: u32,
    pub description: &'static str,
}

pub const MINDFULNESS_ACTIVITIES: [MindfulnessActivity; 4] = [
    MindfulnessActivity {
        id: "breathing",
        activity_type: "breathing",
        name: "Breathing Exercise",
        minutes: 5,
        description: "4-7-8 breathing technique",
    },
    MindfulnessActivity {
        id: "meditation",
        activity_type: "meditation",
        name: "Quick Meditation",
        minutes: 3,
        description: "Short guided meditation",
    },
    MindfulnessActivity {
        id: "stress",
        activity_type: "stress_relief",
        name: "Stress Relief",
        minutes: 2,
        description: "Quick stress reduction",
    },
    MindfulnessActivity {
        id: "break",
        activity_type: "study_break",
        name: "Study Break",
        minutes: 5,
        description: "Refreshing break activities",
    },
];

pub fn find_activity(id: &str) -> Option<&'static MindfulnessActivity> {
    MINDFULNESS_ACTIVITIES.iter().find(|a| a.id == id)
}

pub const GRADE_LEVELS: [&str; 7] = ["6th", "7th", "8th", "9th", "10th", "11th", "12th"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_parse_case_insensitively() {
        assert_eq!("Math".parse::<Subject>().unwrap(), Subject::Math);
        assert_eq!(" geography ".parse::<Subject>().unwrap(), Subject::Geography);
        assert!("art".parse::<Subject>().is_err());
    }

    #[test]
    fn note_types_accept_short_names() {
        assert_eq!("quick".parse::<NoteType>().unwrap(), NoteType::QuickReference);
        assert_eq!("Quick-Reference".parse::<NoteType>().unwrap(), NoteType::QuickReference);
        assert_eq!(NoteType::Summary.as_str(), "summary");
        assert!("essay".parse::<NoteType>().is_err());
    }

    #[test]
    fn every_subject_has_practice_topics() {
        for subject in Subject::ALL {
            assert!(!subject.topics().is_empty(), "{subject} has no topics");
        }
    }
}
