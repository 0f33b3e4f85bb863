//! Top-level navigation.
//!
//! The router is flat: any screen can follow any other, and `goto` always
//! replaces the whole state. Screens that need a parameter carry it inside
//! their variant, so a `Chat` without a subject cannot be constructed.

use std::fmt;

use crate::catalog::Subject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenId {
    Auth,
    StudentHome,
    TeacherHome,
    Chat,
    Practice,
    Notes,
    Mindfulness,
    Progress,
    Calendar,
    Notifications,
    Classes,
    AnalyticsOverview,
    AnalyticsClass,
    AnalyticsStudent,
    Unimplemented,
}

impl ScreenId {
    pub const ALL: [ScreenId; 15] = [
        ScreenId::Auth,
        ScreenId::StudentHome,
        ScreenId::TeacherHome,
        ScreenId::Chat,
        ScreenId::Practice,
        ScreenId::Notes,
        ScreenId::Mindfulness,
        ScreenId::Progress,
        ScreenId::Calendar,
        ScreenId::Notifications,
        ScreenId::Classes,
        ScreenId::AnalyticsOverview,
        ScreenId::AnalyticsClass,
        ScreenId::AnalyticsStudent,
        ScreenId::Unimplemented,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenId::Auth => "auth",
            ScreenId::StudentHome => "student-home",
            ScreenId::TeacherHome => "teacher-home",
            ScreenId::Chat => "chat",
            ScreenId::Practice => "practice",
            ScreenId::Notes => "notes",
            ScreenId::Mindfulness => "mindfulness",
            ScreenId::Progress => "progress",
            ScreenId::Calendar => "calendar",
            ScreenId::Notifications => "notifications",
            ScreenId::Classes => "classes",
            ScreenId::AnalyticsOverview => "analytics-overview",
            ScreenId::AnalyticsClass => "analytics-class",
            ScreenId::AnalyticsStudent => "analytics-student",
            ScreenId::Unimplemented => "unimplemented",
        }
    }

    pub fn from_name(name: &str) -> Option<ScreenId> {
        ScreenId::ALL.iter().copied().find(|id| id.as_str() == name)
    }

    pub fn needs_parameter(&self) -> bool {
        matches!(
            self,
            ScreenId::Chat | ScreenId::AnalyticsClass | ScreenId::AnalyticsStudent
        )
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Auth,
    StudentHome,
    TeacherHome,
    Chat {
        subject: Subject,
    },
    Practice,
    Notes,
    Mindfulness,
    Progress,
    Calendar,
    Notifications,
    Classes,
    AnalyticsOverview,
    AnalyticsClass {
        class_id: String,
    },
    AnalyticsStudent {
        student_id: String,
    },
    Unimplemented {
        requested: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("screen '{0}' needs a parameter")]
    MissingParameter(ScreenId),
    #[error("invalid parameter for '{screen}': {reason}")]
    InvalidParameter { screen: ScreenId, reason: String },
}

impl Screen {
    pub fn id(&self) -> ScreenId {
        match self {
            Screen::Auth => ScreenId::Auth,
            Screen::StudentHome => ScreenId::StudentHome,
            Screen::TeacherHome => ScreenId::TeacherHome,
            Screen::Chat { .. } => ScreenId::Chat,
            Screen::Practice => ScreenId::Practice,
            Screen::Notes => ScreenId::Notes,
            Screen::Mindfulness => ScreenId::Mindfulness,
            Screen::Progress => ScreenId::Progress,
            Screen::Calendar => ScreenId::Calendar,
            Screen::Notifications => ScreenId::Notifications,
            Screen::Classes => ScreenId::Classes,
            Screen::AnalyticsOverview => ScreenId::AnalyticsOverview,
            Screen::AnalyticsClass { .. } => ScreenId::AnalyticsClass,
            Screen::AnalyticsStudent { .. } => ScreenId::AnalyticsStudent,
            Screen::Unimplemented { .. } => ScreenId::Unimplemented,
        }
    }

    pub fn parameter(&self) -> Option<String> {
        match self {
            Screen::Chat { subject } => Some(subject.as_str().to_string()),
            Screen::AnalyticsClass { class_id } => Some(class_id.clone()),
            Screen::AnalyticsStudent { student_id } => Some(student_id.clone()),
            Screen::Unimplemented { requested } => Some(requested.clone()),
            _ => None,
        }
    }

    /// Build a screen from its textual name and optional parameter.
    ///
    /// Unknown names become `Unimplemented`; parameters on screens that do
    /// not take one are ignored.
    pub fn parse(name: &str, parameter: Option<&str>) -> Result<Screen, RouteError> {
        let name = name.trim();
        let Some(id) = ScreenId::from_name(name) else {
            return Ok(Screen::Unimplemented {
                requested: name.to_string(),
            });
        };
        let parameter = parameter.map(str::trim).filter(|p| !p.is_empty());
        if id.needs_parameter() && parameter.is_none() {
            return Err(RouteError::MissingParameter(id));
        }

        let screen = match id {
            ScreenId::Auth => Screen::Auth,
            ScreenId::StudentHome => Screen::StudentHome,
            ScreenId::TeacherHome => Screen::TeacherHome,
            ScreenId::Chat => {
                let raw = parameter.unwrap_or_default();
                let subject = raw
                    .parse::<Subject>()
                    .map_err(|reason| RouteError::InvalidParameter { screen: id, reason })?;
                Screen::Chat { subject }
            }
            ScreenId::Practice => Screen::Practice,
            ScreenId::Notes => Screen::Notes,
            ScreenId::Mindfulness => Screen::Mindfulness,
            ScreenId::Progress => Screen::Progress,
            ScreenId::Calendar => Screen::Calendar,
            ScreenId::Notifications => Screen::Notifications,
            ScreenId::Classes => Screen::Classes,
            ScreenId::AnalyticsOverview => Screen::AnalyticsOverview,
            ScreenId::AnalyticsClass => Screen::AnalyticsClass {
                class_id: parameter.unwrap_or_default().to_string(),
            },
            ScreenId::AnalyticsStudent => Screen::AnalyticsStudent {
                student_id: parameter.unwrap_or_default().to_string(),
            },
            ScreenId::Unimplemented => Screen::Unimplemented {
                requested: parameter.unwrap_or(name).to_string(),
            },
        };
        Ok(screen)
    }

    pub fn title(&self) -> String {
        match self {
            Screen::Auth => "Sign in".to_string(),
            Screen::StudentHome => "Student dashboard".to_string(),
            Screen::TeacherHome => "Teacher dashboard".to_string(),
            Screen::Chat { subject } => format!("{} tutor", subject.display_name()),
            Screen::Practice => "Practice tests".to_string(),
            Screen::Notes => "My notes".to_string(),
            Screen::Mindfulness => "Mindfulness".to_string(),
            Screen::Progress => "Progress".to_string(),
            Screen::Calendar => "Calendar".to_string(),
            Screen::Notifications => "Notifications".to_string(),
            Screen::Classes => "Classes".to_string(),
            Screen::AnalyticsOverview => "Analytics overview".to_string(),
            Screen::AnalyticsClass { class_id } => format!("Class {class_id}"),
            Screen::AnalyticsStudent { student_id } => format!("Student {student_id}"),
            Screen::Unimplemented { .. } => "Coming soon".to_string(),
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Unimplemented { requested } => write!(f, "unimplemented ({requested})"),
            _ => match self.parameter() {
                Some(param) => write!(f, "{} {}", self.id(), param),
                None => write!(f, "{}", self.id()),
            },
        }
    }
}

/// Sole owner of the navigation state.
#[derive(Debug, Default)]
pub struct Router {
    current: Screen,
    epoch: u64,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Screen {
        &self.current
    }

    /// Incremented on every transition; lets in-flight work tell it is stale.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn goto(&mut self, screen: Screen) -> u64 {
        tracing::debug!(from = %self.current, to = %screen, "navigate");
        self.current = screen;
        self.epoch += 1;
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_auth() {
        let router = Router::new();
        assert_eq!(router.current(), &Screen::Auth);
        assert_eq!(router.epoch(), 0);
    }

    #[test]
    fn last_goto_wins_regardless_of_history() {
        let mut router = Router::new();
        let sequence = [
            Screen::StudentHome,
            Screen::Chat {
                subject: Subject::Physics,
            },
            Screen::Auth,
            Screen::AnalyticsClass {
                class_id: "c-9".into(),
            },
            Screen::Chat {
                subject: Subject::Math,
            },
        ];
        for screen in sequence.iter().cloned() {
            router.goto(screen);
        }
        assert_eq!(
            router.current(),
            &Screen::Chat {
                subject: Subject::Math
            }
        );
        assert_eq!(router.epoch(), sequence.len() as u64);
    }

    #[test]
    fn parse_round_trips_every_identifier() {
        for id in ScreenId::ALL {
            let param = match id {
                ScreenId::Chat => Some("biology"),
                ScreenId::AnalyticsClass | ScreenId::AnalyticsStudent => Some("x-1"),
                _ => None,
            };
            let screen = Screen::parse(id.as_str(), param).unwrap();
            assert_eq!(screen.id(), id);
        }
    }

    #[test]
    fn parse_requires_parameters_where_declared() {
        assert_eq!(
            Screen::parse("chat", None),
            Err(RouteError::MissingParameter(ScreenId::Chat))
        );
        assert_eq!(
            Screen::parse("analytics-student", Some("  ")),
            Err(RouteError::MissingParameter(ScreenId::AnalyticsStudent))
        );
        assert!(matches!(
            Screen::parse("chat", Some("astrology")),
            Err(RouteError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn unknown_names_fall_back_to_unimplemented() {
        assert_eq!(
            Screen::parse("leaderboard", None).unwrap(),
            Screen::Unimplemented {
                requested: "leaderboard".into()
            }
        );
        assert_eq!(Screen::parse("notes", None).unwrap(), Screen::Notes);
    }

    #[test]
    fn display_includes_the_parameter() {
        let screen = Screen::Chat {
            subject: Subject::English,
        };
        assert_eq!(screen.to_string(), "chat english");
        assert_eq!(Screen::TeacherHome.to_string(), "teacher-home");
    }
}
