//! What each screen asks of the backend, and the local state it keeps.
//!
//! Screens never touch the router or the session directly. On entry they
//! declare a list of [`Load`]s; user input turns into [`Action`]s. The client
//! core sends both and feeds the results back through
//! [`ScreenState::apply_load`] / [`ScreenState::apply_action`].

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiRequest};
use crate::catalog::{Difficulty, MindfulnessActivity, NoteType, Subject};
use crate::router::Screen;
use crate::session::Role;

pub const MIN_PRACTICE_QUESTIONS: u32 = 5;
pub const MAX_PRACTICE_QUESTIONS: u32 = 50;
/// Time allowed per practice question.
pub const SECONDS_PER_QUESTION: u64 = 120;

const CHAT_APOLOGY: &str = "Sorry, I'm having trouble connecting right now. Please try again!";
const NOTE_FIELDS_MISSING: &str = "Please fill in all required fields";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Load {
    TeacherDashboard,
    ChatSession { subject: Subject },
    ChatHistory { subject: Subject },
    MindfulnessHistory,
    Progress,
    CalendarEvents,
    Notifications,
    StudentClasses,
    TeacherClasses,
    AnalyticsOverview,
    ClassPerformance { class_id: String },
    TestResults { class_id: Option<String> },
    StudentAnalytics { student_id: String },
    NoteLibrary(NoteFilter),
    Note { id: String },
}

impl Load {
    pub fn request(&self) -> ApiRequest {
        match self {
            Load::TeacherDashboard => ApiRequest::get("/api/teacher/dashboard"),
            Load::ChatSession { subject } => {
                ApiRequest::post("/api/chat/session", json!({ "subject": subject.as_str() }))
            }
            Load::ChatHistory { subject } => {
                ApiRequest::get("/api/chat/history").with_query("subject", subject.as_str())
            }
            Load::MindfulnessHistory => ApiRequest::get("/api/mindfulness/activities"),
            Load::Progress => ApiRequest::get("/api/dashboard"),
            Load::CalendarEvents => ApiRequest::get("/api/calendar/events"),
            Load::Notifications => ApiRequest::get("/api/notifications"),
            Load::StudentClasses => ApiRequest::get("/api/student/classes"),
            Load::TeacherClasses => ApiRequest::get("/api/teacher/classes"),
            Load::AnalyticsOverview => ApiRequest::get("/api/teacher/analytics/overview"),
            Load::ClassPerformance { class_id } => {
                ApiRequest::get(format!("/api/teacher/analytics/class-performance/{class_id}"))
            }
            Load::TestResults { class_id } => {
                let request = ApiRequest::get("/api/teacher/analytics/test-results");
                match class_id {
                    Some(id) => request.with_query("class_id", id.as_str()),
                    None => request,
                }
            }
            Load::StudentAnalytics { student_id } => {
                ApiRequest::get(format!("/api/teacher/student/{student_id}/analytics"))
            }
            Load::NoteLibrary(filter) => {
                let mut request = ApiRequest::get("/api/notes");
                if let Some(subject) = filter.subject {
                    request = request.with_query("subject", subject.as_str());
                }
                if filter.favorites_only {
                    request = request.with_query("favorites_only", "true");
                }
                request
            }
            Load::Note { id } => ApiRequest::get(format!("/api/notes/{id}")),
        }
    }

    /// Key the result is stored under in [`ScreenState::data`].
    pub fn slot(&self) -> &'static str {
        match self {
            Load::TeacherDashboard => "teacher_dashboard",
            Load::ChatSession { .. } => "chat_session",
            Load::ChatHistory { .. } => "chat_history",
            Load::MindfulnessHistory => "mindfulness",
            Load::Progress => "progress",
            Load::CalendarEvents => "calendar",
            Load::Notifications => "notifications",
            Load::StudentClasses | Load::TeacherClasses => "classes",
            Load::AnalyticsOverview => "analytics",
            Load::ClassPerformance { .. } => "class_performance",
            Load::TestResults { .. } => "test_results",
            Load::StudentAnalytics { .. } => "student_analytics",
            Load::NoteLibrary(_) => "notes",
            Load::Note { .. } => "note",
        }
    }

    /// What the screen shows when the load fails.
    pub fn fallback(&self) -> Value {
        match self {
            Load::AnalyticsOverview => empty_overview(),
            Load::TestResults { .. } => json!({ "test_results": [] }),
            Load::TeacherDashboard
            | Load::Progress
            | Load::ClassPerformance { .. }
            | Load::StudentAnalytics { .. }
            | Load::ChatSession { .. }
            | Load::Note { .. } => Value::Null,
            _ => json!([]),
        }
    }
}

pub fn empty_overview() -> Value {
    json!({
        "overview_metrics": {
            "total_classes": 0,
            "total_students": 0,
            "total_messages": 0,
            "total_tests": 0,
            "average_score": 0
        },
        "class_summary": [],
        "subject_distribution": [],
        "weekly_activity_trend": []
    })
}

/// Loads a screen issues when it becomes active.
pub fn loads_on_entry(screen: &Screen, role: Option<Role>) -> Vec<Load> {
    match screen {
        Screen::TeacherHome => vec![Load::TeacherDashboard],
        Screen::Chat { subject } => vec![
            Load::ChatSession { subject: *subject },
            Load::ChatHistory { subject: *subject },
        ],
        Screen::Notes => vec![Load::NoteLibrary(NoteFilter::default())],
        Screen::Mindfulness => vec![Load::MindfulnessHistory],
        Screen::Progress => vec![Load::Progress],
        Screen::Calendar => vec![Load::CalendarEvents],
        Screen::Notifications => vec![Load::Notifications],
        Screen::Classes => match role {
            Some(Role::Teacher) => vec![Load::TeacherClasses],
            _ => vec![Load::StudentClasses],
        },
        Screen::AnalyticsOverview => vec![Load::AnalyticsOverview],
        Screen::AnalyticsClass { class_id } => vec![
            Load::ClassPerformance {
                class_id: class_id.clone(),
            },
            Load::TestResults {
                class_id: Some(class_id.clone()),
            },
        ],
        Screen::AnalyticsStudent { student_id } => vec![Load::StudentAnalytics {
            student_id: student_id.clone(),
        }],
        Screen::Auth
        | Screen::StudentHome
        | Screen::Practice
        | Screen::Unimplemented { .. } => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeSpec {
    pub subject: Subject,
    pub topics: Vec<String>,
    pub difficulty: Difficulty,
    pub question_count: u32,
}

impl PracticeSpec {
    pub fn validate(mut self) -> Result<Self, String> {
        self.topics.retain(|t| !t.trim().is_empty());
        if self.topics.is_empty() {
            return Err("Please select a subject and at least one topic".to_string());
        }
        self.question_count = self
            .question_count
            .clamp(MIN_PRACTICE_QUESTIONS, MAX_PRACTICE_QUESTIONS);
        Ok(self)
    }
}

/// Filters the backend applies to the notes library.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteFilter {
    pub subject: Option<Subject>,
    pub favorites_only: bool,
}

impl NoteFilter {
    /// Whether a note the client already holds belongs in a list fetched with this filter.
    pub fn admits(&self, note: &Value) -> bool {
        let subject_ok = match self.subject {
            Some(subject) => note.get("subject").and_then(Value::as_str) == Some(subject.as_str()),
            None => true,
        };
        subject_ok && (!self.favorites_only || is_favorite(note))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteRequest {
    pub subject: Subject,
    pub topic: String,
    pub note_type: NoteType,
}

impl NoteRequest {
    pub fn validate(mut self) -> Result<Self, String> {
        self.topic = self.topic.trim().to_string();
        if self.topic.is_empty() {
            return Err(NOTE_FIELDS_MISSING.to_string());
        }
        Ok(self)
    }
}

/// Id of a note as either the library (`id`) or the generator (`note_id`) reports it.
pub fn note_id(note: &Value) -> Option<&str> {
    note.get("id")
        .or_else(|| note.get("note_id"))
        .and_then(Value::as_str)
}

pub fn is_favorite(note: &Value) -> bool {
    note.get("is_favorite").and_then(Value::as_bool).unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeSubmission {
    pub test_id: String,
    pub questions: Vec<String>,
    pub student_answers: BTreeMap<String, String>,
    pub time_taken: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub event_type: String,
    pub subject: Option<Subject>,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewClass {
    pub class_name: String,
    pub subject: Subject,
    pub grade_level: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SendChat {
        subject: Subject,
        session_id: String,
        message: String,
    },
    GeneratePractice(PracticeSpec),
    SubmitPractice(PracticeSubmission),
    LogMindfulness {
        activity_type: String,
        minutes: u32,
    },
    CreateEvent(NewEvent),
    MarkNotificationRead {
        id: String,
    },
    JoinClass {
        join_code: String,
    },
    CreateClass(NewClass),
    GenerateNotes(NoteRequest),
    ToggleFavorite {
        id: String,
    },
    DeleteNote {
        id: String,
    },
}

impl Action {
    pub fn request(&self) -> ApiRequest {
        match self {
            Action::SendChat {
                subject,
                session_id,
                message,
            } => ApiRequest::post(
                "/api/chat/message",
                json!({
                    "session_id": session_id,
                    "user_message": message,
                    "subject": subject.as_str(),
                }),
            ),
            Action::GeneratePractice(spec) => ApiRequest::post(
                "/api/practice/generate",
                json!({
                    "subject": spec.subject.as_str(),
                    "topics": spec.topics,
                    "difficulty": spec.difficulty,
                    "question_count": spec.question_count,
                }),
            ),
            Action::SubmitPractice(submission) => ApiRequest::post(
                "/api/practice/submit",
                json!({
                    "test_id": submission.test_id,
                    "questions": submission.questions,
                    "student_answers": submission.student_answers,
                    "time_taken": submission.time_taken,
                }),
            ),
            Action::LogMindfulness {
                activity_type,
                minutes,
            } => ApiRequest::post(
                "/api/mindfulness/session",
                json!({ "activity_type": activity_type, "duration": minutes }),
            ),
            Action::CreateEvent(event) => ApiRequest::post(
                "/api/calendar/events",
                json!({
                    "title": event.title,
                    "description": event.description,
                    "event_type": event.event_type,
                    "subject": event.subject.map(|s| s.as_str()),
                    "start_time": event.start_time,
                    "end_time": event.end_time,
                }),
            ),
            Action::MarkNotificationRead { id } => {
                ApiRequest::put(format!("/api/notifications/{id}/read"))
            }
            Action::JoinClass { join_code } => ApiRequest::post(
                "/api/student/join-class",
                json!({ "join_code": join_code }),
            ),
            Action::CreateClass(class) => ApiRequest::post(
                "/api/teacher/classes",
                json!({
                    "class_name": class.class_name,
                    "subject": class.subject.as_str(),
                    "grade_level": class.grade_level,
                    "description": class.description.clone().unwrap_or_default(),
                }),
            ),
            Action::GenerateNotes(request) => ApiRequest::post(
                "/api/notes/generate",
                json!({
                    "subject": request.subject.as_str(),
                    "topic": request.topic,
                    "note_type": request.note_type.as_str(),
                }),
            ),
            Action::ToggleFavorite { id } => ApiRequest::put(format!("/api/notes/{id}/favorite")),
            Action::DeleteNote { id } => ApiRequest::delete(format!("/api/notes/{id}")),
        }
    }

    fn failure_text(&self) -> &'static str {
        match self {
            Action::SendChat { .. } => CHAT_APOLOGY,
            Action::GeneratePractice(_) => "Could not generate a practice test",
            Action::SubmitPractice(_) => "Could not submit the practice test",
            Action::LogMindfulness { .. } => "Could not save the mindfulness session",
            Action::CreateEvent(_) => "Could not create the event",
            Action::MarkNotificationRead { .. } => "Could not update the notification",
            Action::JoinClass { .. } => "Could not join the class",
            Action::CreateClass(_) => "Could not create the class",
            Action::GenerateNotes(_) => "Error generating notes. Please try again.",
            Action::ToggleFavorite { .. } => "Could not update the note",
            Action::DeleteNote { .. } => "Could not delete the note",
        }
    }
}

/// Seconds left on a timer driven by elapsed wall-clock ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct Countdown {
    total: Duration,
    remaining: Duration,
    done: bool,
}

impl Countdown {
    pub fn new(total: Duration) -> Self {
        Self {
            total,
            remaining: total,
            done: total.is_zero(),
        }
    }

    /// Advance the timer. Returns `true` exactly once, on the tick that reaches zero.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if self.done {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.done = true;
            return true;
        }
        false
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn elapsed(&self) -> Duration {
        self.total.saturating_sub(self.remaining)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// `m:ss`, rounding partial seconds up.
    pub fn label(&self) -> String {
        let mut secs = self.remaining.as_secs();
        if self.remaining.subsec_nanos() > 0 {
            secs += 1;
        }
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub sender: Sender,
    pub text: String,
    pub bot_type: Option<String>,
    pub error: bool,
}

impl ChatLine {
    fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            bot_type: None,
            error: false,
        }
    }

    fn bot(text: impl Into<String>, bot_type: Option<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            bot_type,
            error: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub session_id: Option<String>,
    pub lines: Vec<ChatLine>,
    pub sending: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PracticeQuestion {
    pub id: String,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub question_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeTest {
    pub test_id: String,
    pub questions: Vec<PracticeQuestion>,
}

impl PracticeTest {
    /// Accepts both a question array and the JSON-encoded string some
    /// backend versions return in `questions`.
    pub fn from_response(value: &Value) -> Result<Self, String> {
        let test_id = value
            .get("test_id")
            .and_then(Value::as_str)
            .ok_or("response has no test_id")?
            .to_string();
        let raw = value.get("questions").ok_or("response has no questions")?;
        let questions: Vec<PracticeQuestion> = match raw {
            Value::String(encoded) => serde_json::from_str(encoded),
            other => serde_json::from_value(other.clone()),
        }
        .map_err(|e| format!("could not read questions: {e}"))?;
        if questions.is_empty() {
            return Err("the generated test has no questions".to_string());
        }
        Ok(Self { test_id, questions })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PracticeState {
    pub test: Option<PracticeTest>,
    pub answers: BTreeMap<String, String>,
    pub current: usize,
    pub countdown: Option<Countdown>,
    pub generating: bool,
    pub submitted: bool,
    pub result: Option<Value>,
}

impl PracticeState {
    fn start(&mut self, test: PracticeTest) {
        let limit = Duration::from_secs(test.questions.len() as u64 * SECONDS_PER_QUESTION);
        self.answers.clear();
        self.current = 0;
        self.countdown = Some(Countdown::new(limit));
        self.submitted = false;
        self.result = None;
        self.test = Some(test);
    }

    pub fn answer(&mut self, question_id: &str, answer: &str) -> bool {
        let known = self
            .test
            .as_ref()
            .is_some_and(|t| t.questions.iter().any(|q| q.id == question_id));
        if known && !self.submitted {
            self.answers
                .insert(question_id.to_string(), answer.trim().to_string());
        }
        known
    }

    /// Build the submission for the running test and mark it submitted.
    pub fn submission(&mut self) -> Option<PracticeSubmission> {
        if self.submitted {
            return None;
        }
        let test = self.test.as_ref()?;
        let time_taken = self
            .countdown
            .as_ref()
            .map(|c| c.elapsed().as_secs())
            .unwrap_or(0);
        self.submitted = true;
        Some(PracticeSubmission {
            test_id: test.test_id.clone(),
            questions: test.questions.iter().map(|q| q.id.clone()).collect(),
            student_answers: self.answers.clone(),
            time_taken,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MindfulnessState {
    pub active: Option<(&'static MindfulnessActivity, Countdown)>,
}

#[derive(Debug, Clone, Default)]
pub struct NotesState {
    pub filter: NoteFilter,
    /// Matched locally against topic and content; never sent to the server.
    pub search: String,
    pub generating: bool,
}

/// The teacher home screen's own two-state panel switch. Never routed globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeacherPanel {
    #[default]
    Dashboard,
    Analytics,
}

impl TeacherPanel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeacherPanel::Dashboard => "dashboard",
            TeacherPanel::Analytics => "analytics",
        }
    }
}

/// Local state of the active screen. Replaced whenever the router moves.
#[derive(Debug, Clone, Default)]
pub struct ScreenState {
    pub data: BTreeMap<&'static str, Value>,
    pub chat: ChatState,
    pub practice: PracticeState,
    pub mindfulness: MindfulnessState,
    pub notes: NotesState,
    pub teacher_panel: TeacherPanel,
    /// Last user-facing status line (action confirmations or failures).
    pub status: Option<String>,
}

impl ScreenState {
    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.data.get(slot)
    }

    pub fn apply_load(&mut self, load: &Load, result: Result<Value, ApiError>) {
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                warn!(slot = load.slot(), "screen load failed: {err}");
                if let Load::Note { .. } = load {
                    self.status = Some(err.user_message("Could not open the note"));
                    return;
                }
                load.fallback()
            }
        };
        match load {
            Load::ChatSession { .. } => {
                self.chat.session_id = value
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            Load::ChatHistory { .. } => {
                let mut history = Vec::new();
                for message in value.as_array().into_iter().flatten() {
                    if let Some(text) = message.get("user_message").and_then(Value::as_str) {
                        history.push(ChatLine::user(text));
                    }
                    if let Some(text) = message.get("bot_response").and_then(Value::as_str) {
                        let bot_type = message
                            .get("bot_type")
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        history.push(ChatLine::bot(text, bot_type));
                    }
                }
                // Lines typed before the history arrived stay after it.
                history.append(&mut self.chat.lines);
                self.chat.lines = history;
            }
            Load::NoteLibrary(filter) if *filter != self.notes.filter => {
                debug!(?filter, "dropping notes fetched for an earlier filter");
            }
            _ => {
                self.data.insert(load.slot(), value);
            }
        }
    }

    pub fn apply_action(&mut self, action: &Action, result: Result<Value, ApiError>) {
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                warn!(?action, "screen action failed: {err}");
                self.fail_action(action, &err);
                return;
            }
        };
        match action {
            Action::SendChat { .. } => {
                self.chat.sending = false;
                let text = value
                    .get("bot_response")
                    .and_then(Value::as_str)
                    .unwrap_or(CHAT_APOLOGY);
                let bot_type = value
                    .get("bot_type")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.chat.lines.push(ChatLine::bot(text, bot_type));
            }
            Action::GeneratePractice(_) => {
                self.practice.generating = false;
                match PracticeTest::from_response(&value) {
                    Ok(test) => {
                        self.status = Some(format!(
                            "Practice test ready: {} questions",
                            test.questions.len()
                        ));
                        self.practice.start(test);
                    }
                    Err(reason) => {
                        warn!("unusable practice test: {reason}");
                        self.status = Some(action.failure_text().to_string());
                    }
                }
            }
            Action::SubmitPractice(_) => {
                let score = value.get("score").and_then(Value::as_f64).unwrap_or(0.0);
                let xp = value.get("xp_earned").and_then(Value::as_i64).unwrap_or(0);
                self.status = Some(format!("Test complete: {score:.0}% (+{xp} XP)"));
                self.practice.countdown = None;
                self.practice.result = Some(value);
            }
            Action::LogMindfulness { minutes, .. } => {
                self.status = Some(format!("Mindfulness session saved ({minutes} min)"));
                push_front(self.data.entry("mindfulness").or_insert_with(|| json!([])), value);
            }
            Action::CreateEvent(event) => {
                self.status = Some(format!("Added '{}' to your calendar", event.title));
                push_back(self.data.entry("calendar").or_insert_with(|| json!([])), value);
            }
            Action::MarkNotificationRead { id } => {
                if let Some(items) = self
                    .data
                    .get_mut("notifications")
                    .and_then(Value::as_array_mut)
                {
                    for item in items.iter_mut() {
                        if item.get("id").and_then(Value::as_str) == Some(id.as_str()) {
                            item["is_read"] = Value::Bool(true);
                        }
                    }
                }
            }
            Action::JoinClass { .. } => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Joined class");
                self.status = Some(message.to_string());
            }
            Action::CreateClass(class) => {
                let code = value
                    .get("join_code")
                    .and_then(Value::as_str)
                    .unwrap_or("?")
                    .to_string();
                self.status = Some(format!(
                    "Created '{}' (join code {code})",
                    class.class_name
                ));
                push_back(self.data.entry("classes").or_insert_with(|| json!([])), value);
            }
            Action::GenerateNotes(request) => {
                self.notes.generating = false;
                let mut note = value;
                if note.get("id").is_none() {
                    if let Some(id) = note_id(&note).map(str::to_string) {
                        note["id"] = Value::from(id);
                    }
                }
                self.status = Some(format!("Notes ready: {}", request.topic));
                if self.notes.filter.admits(&note) {
                    push_front(self.data.entry("notes").or_insert_with(|| json!([])), note.clone());
                }
                self.data.insert("note", note);
            }
            Action::ToggleFavorite { id } => self.set_favorite(id, &value),
            Action::DeleteNote { id } => {
                if let Some(items) = self.data.get_mut("notes").and_then(Value::as_array_mut) {
                    items.retain(|note| note_id(note) != Some(id.as_str()));
                }
                if self.open_note().and_then(note_id) == Some(id.as_str()) {
                    self.data.remove("note");
                }
                self.status = Some("Note deleted".to_string());
            }
        }
    }

    fn set_favorite(&mut self, id: &str, reply: &Value) {
        let current = self
            .note_in_view(id)
            .map(is_favorite)
            .unwrap_or(false);
        let favorite = reply
            .get("is_favorite")
            .and_then(Value::as_bool)
            .unwrap_or(!current);

        if let Some(items) = self.data.get_mut("notes").and_then(Value::as_array_mut) {
            for note in items.iter_mut() {
                if note_id(note) == Some(id) {
                    note["is_favorite"] = Value::Bool(favorite);
                }
            }
            if self.notes.filter.favorites_only && !favorite {
                items.retain(|note| note_id(note) != Some(id));
            }
        }
        if let Some(note) = self.data.get_mut("note") {
            if note_id(note) == Some(id) {
                note["is_favorite"] = Value::Bool(favorite);
            }
        }
    }

    fn note_in_view(&self, id: &str) -> Option<&Value> {
        self.open_note()
            .filter(|note| note_id(note) == Some(id))
            .or_else(|| {
                self.get("notes")
                    .and_then(Value::as_array)
                    .and_then(|items| items.iter().find(|note| note_id(note) == Some(id)))
            })
    }

    fn fail_action(&mut self, action: &Action, err: &ApiError) {
        match action {
            Action::SendChat { .. } => {
                self.chat.sending = false;
                self.chat.lines.push(ChatLine {
                    error: true,
                    ..ChatLine::bot(CHAT_APOLOGY, None)
                });
            }
            Action::GeneratePractice(_) => {
                self.practice.generating = false;
                self.status = Some(err.user_message(action.failure_text()));
            }
            Action::GenerateNotes(_) => {
                self.notes.generating = false;
                self.status = Some(err.user_message(action.failure_text()));
            }
            Action::SubmitPractice(_) => {
                // Allow another attempt at submitting the same answers.
                self.practice.submitted = false;
                self.status = Some(err.user_message(action.failure_text()));
            }
            _ => self.status = Some(err.user_message(action.failure_text())),
        }
    }

    /// Queue a chat message. Returns the action to send, if a session is open.
    pub fn chat_message(&mut self, subject: Subject, text: &str) -> Option<Action> {
        let text = text.trim();
        if text.is_empty() || self.chat.sending {
            return None;
        }
        let session_id = self.chat.session_id.clone()?;
        self.chat.lines.push(ChatLine::user(text));
        self.chat.sending = true;
        Some(Action::SendChat {
            subject,
            session_id,
            message: text.to_string(),
        })
    }

    pub fn generate_practice(&mut self, spec: PracticeSpec) -> Option<Action> {
        if self.practice.generating {
            return None;
        }
        match spec.validate() {
            Ok(spec) => {
                self.practice.generating = true;
                self.status = None;
                Some(Action::GeneratePractice(spec))
            }
            Err(message) => {
                self.status = Some(message);
                None
            }
        }
    }

    pub fn generate_notes(&mut self, request: NoteRequest) -> Option<Action> {
        if self.notes.generating {
            return None;
        }
        match request.validate() {
            Ok(request) => {
                self.notes.generating = true;
                self.status = None;
                Some(Action::GenerateNotes(request))
            }
            Err(message) => {
                self.status = Some(message);
                None
            }
        }
    }

    /// The note opened for reading, if any.
    pub fn open_note(&self) -> Option<&Value> {
        self.get("note").filter(|note| !note.is_null())
    }

    pub fn close_note(&mut self) {
        self.data.remove("note");
    }

    /// Library entries whose topic or content contains the search text.
    pub fn visible_notes(&self) -> Vec<&Value> {
        let needle = self.notes.search.trim().to_lowercase();
        self.get("notes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|note| {
                needle.is_empty()
                    || ["topic", "content"].iter().any(|key| {
                        note.get(*key)
                            .and_then(Value::as_str)
                            .is_some_and(|text| text.to_lowercase().contains(&needle))
                    })
            })
            .collect()
    }

    pub fn submit_practice(&mut self) -> Option<Action> {
        self.practice.submission().map(Action::SubmitPractice)
    }

    pub fn start_mindfulness(&mut self, activity: &'static MindfulnessActivity) {
        let countdown = Countdown::new(Duration::from_secs(u64::from(activity.minutes) * 60));
        self.mindfulness.active = Some((activity, countdown));
    }

    pub fn stop_mindfulness(&mut self) {
        self.mindfulness.active = None;
    }

    /// Advance running timers; returns whatever they trigger on completion.
    pub fn tick(&mut self, elapsed: Duration) -> Vec<Action> {
        let mut triggered = Vec::new();

        if let Some((activity, countdown)) = self.mindfulness.active.as_mut() {
            if countdown.tick(elapsed) {
                triggered.push(Action::LogMindfulness {
                    activity_type: activity.activity_type.to_string(),
                    minutes: activity.minutes,
                });
                self.mindfulness.active = None;
            }
        }

        let expired = self
            .practice
            .countdown
            .as_mut()
            .is_some_and(|c| c.tick(elapsed));
        if expired {
            if let Some(action) = self.submit_practice() {
                triggered.push(action);
            }
        }

        triggered
    }

    pub fn unread_notifications(&self) -> usize {
        self.get("notifications")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|n| !n.get("is_read").and_then(Value::as_bool).unwrap_or(false))
                    .count()
            })
            .unwrap_or(0)
    }
}

fn push_back(list: &mut Value, item: Value) {
    match list.as_array_mut() {
        Some(items) => items.push(item),
        None => *list = json!([item]),
    }
}

fn push_front(list: &mut Value, item: Value) {
    match list.as_array_mut() {
        Some(items) => items.insert(0, item),
        None => *list = json!([item]),
    }
}
