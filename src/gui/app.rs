use crate::api::Registration;
use crate::catalog::{Difficulty, NoteType, Subject, GRADE_LEVELS, MINDFULNESS_ACTIVITIES};
use crate::client::ClientCore;
use crate::router::Screen;
use crate::screens::{
    is_favorite, note_id, Action, NewClass, NewEvent, NoteFilter, NoteRequest, PracticeSpec,
    Sender, TeacherPanel, MAX_PRACTICE_QUESTIONS, MIN_PRACTICE_QUESTIONS,
};
use crate::session::Role;
use crate::settings::{save_settings, Settings};
use crate::theme::{apply_theme, ensure_theme_files, load_presets, pick_theme, ThemeConfig};
use eframe::{
    egui::{
        self, menu, Align, CentralPanel, ComboBox, Context, Grid, Layout, ProgressBar, RichText,
        ScrollArea, SidePanel, TextEdit, TopBottomPanel,
    },
    App, CreationContext,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone)]
struct AuthForm {
    registering: bool,
    role: Role,
    email: String,
    password: String,
    name: String,
    grade_level: String,
    school_name: String,
}

impl Default for AuthForm {
    fn default() -> Self {
        Self {
            registering: false,
            role: Role::Student,
            email: String::new(),
            password: String::new(),
            name: String::new(),
            grade_level: GRADE_LEVELS[0].to_string(),
            school_name: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct PracticeForm {
    subject: Subject,
    topics: Vec<String>,
    difficulty: Difficulty,
    count: u32,
}

impl Default for PracticeForm {
    fn default() -> Self {
        Self {
            subject: Subject::Math,
            topics: Vec::new(),
            difficulty: Difficulty::Mixed,
            count: 10,
        }
    }
}

#[derive(Debug, Clone)]
struct NoteForm {
    subject: Subject,
    topic: String,
    note_type: NoteType,
}

impl Default for NoteForm {
    fn default() -> Self {
        Self {
            subject: Subject::Math,
            topic: String::new(),
            note_type: NoteType::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct EventForm {
    title: String,
    description: String,
    start_time: String,
    end_time: String,
}

#[derive(Debug, Clone, Default)]
struct ClassForm {
    class_name: String,
    subject: Option<Subject>,
    grade_level: String,
    description: String,
}

pub struct ProjectKApp {
    core: ClientCore,
    settings: Settings,
    base_path: PathBuf,
    theme: ThemeConfig,
    presets: Vec<ThemeConfig>,
    last_tick: Instant,
    auth: AuthForm,
    chat_input: String,
    practice: PracticeForm,
    open_answers: BTreeMap<String, String>,
    note: NoteForm,
    note_search: String,
    event: EventForm,
    class: ClassForm,
    join_code: String,
    lookup_id: String,
}

impl ProjectKApp {
    pub fn new(
        cc: &CreationContext<'_>,
        core: ClientCore,
        base_path: PathBuf,
        settings: Settings,
    ) -> Self {
        if let Err(err) = ensure_theme_files(&base_path) {
            warn!("could not write theme presets: {err}");
        }
        let presets = load_presets(&base_path);
        let theme = pick_theme(&presets, settings.ui.last_theme.as_deref());
        apply_theme(&theme, &cc.egui_ctx);

        Self {
            core,
            settings,
            base_path,
            theme,
            presets,
            last_tick: Instant::now(),
            auth: AuthForm::default(),
            chat_input: String::new(),
            practice: PracticeForm::default(),
            open_answers: BTreeMap::new(),
            note: NoteForm::default(),
            note_search: String::new(),
            event: EventForm::default(),
            class: ClassForm::default(),
            join_code: String::new(),
            lookup_id: String::new(),
        }
    }

    fn switch_theme(&mut self, name: &str, ctx: &Context) {
        self.theme = pick_theme(&self.presets, Some(name));
        apply_theme(&self.theme, ctx);
        self.settings.ui.last_theme = Some(self.theme.name.clone());
        if let Err(err) = save_settings(&self.settings, &self.base_path) {
            warn!("could not save settings: {err}");
        }
    }

    fn timers_running(&self) -> bool {
        let state = self.core.screen_state();
        state.mindfulness.active.is_some()
            || state
                .practice
                .countdown
                .as_ref()
                .is_some_and(|c| !c.is_done())
    }

    fn render_menu_bar(&mut self, ctx: &Context, ui: &mut egui::Ui) {
        menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if self.core.session().is_some() && ui.button("Sign out").clicked() {
                    self.core.logout();
                    ui.close_menu();
                }
                if ui.button("Quit").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
            ui.menu_button("View", |ui| {
                let names: Vec<String> = self.presets.iter().map(|p| p.name.clone()).collect();
                for name in names {
                    if ui
                        .selectable_label(self.theme.name == name, name.as_str())
                        .clicked()
                    {
                        self.switch_theme(&name, ctx);
                        ui.close_menu();
                    }
                }
            });
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if let Some(session) = self.core.session() {
                    ui.label(format!("{} ({})", session.user.display_name(), session.role));
                }
                if self.core.is_busy() {
                    ui.spinner();
                }
            });
        });
    }

    fn render_nav(&mut self, ui: &mut egui::Ui) {
        let current = self.core.current_screen().clone();
        let Some(role) = self.core.role() else {
            return;
        };
        ui.heading("Project K");
        ui.separator();

        let mut target: Option<Screen> = None;
        let mut item = |ui: &mut egui::Ui, screen: Screen, label: &str| {
            if ui.selectable_label(current == screen, label).clicked() {
                target = Some(screen);
            }
        };
        item(ui, role.home(), "Home");
        match role {
            Role::Student => {
                item(ui, Screen::Practice, "Practice tests");
                item(ui, Screen::Notes, "My notes");
                item(ui, Screen::Mindfulness, "Mindfulness");
                item(ui, Screen::Progress, "Progress");
                item(ui, Screen::Classes, "My classes");
                item(ui, Screen::Calendar, "Calendar");
                item(ui, Screen::Notifications, "Notifications");
                ui.separator();
                ui.label(RichText::new("Tutors").small());
                for subject in Subject::ALL {
                    item(ui, Screen::Chat { subject }, subject.display_name());
                }
            }
            Role::Teacher => {
                item(ui, Screen::Classes, "Classes");
                item(ui, Screen::AnalyticsOverview, "Analytics");
                item(ui, Screen::Calendar, "Calendar");
                item(ui, Screen::Notifications, "Notifications");
                ui.separator();
                ui.label(RichText::new("Look up by id").small());
                ui.text_edit_singleline(&mut self.lookup_id);
                let id = self.lookup_id.trim().to_string();
                ui.horizontal(|ui| {
                    if ui.add_enabled(!id.is_empty(), egui::Button::new("Class")).clicked() {
                        target = Some(Screen::AnalyticsClass {
                            class_id: id.clone(),
                        });
                    }
                    if ui.add_enabled(!id.is_empty(), egui::Button::new("Student")).clicked() {
                        target = Some(Screen::AnalyticsStudent { student_id: id });
                    }
                });
            }
        }

        if let Some(screen) = target {
            self.core.go(screen);
        }
    }

    fn render_status(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new(self.core.current_screen().to_string()).small());
            if let Some(status) = self.core.screen_state().status.clone() {
                ui.separator();
                ui.label(status);
            }
        });
    }

    fn render_screen(&mut self, ui: &mut egui::Ui) {
        let screen = self.core.current_screen().clone();
        ui.heading(screen.title());
        ui.add_space(6.0);
        match screen {
            Screen::Auth => self.render_auth(ui),
            Screen::StudentHome => self.render_student_home(ui),
            Screen::TeacherHome => self.render_teacher_home(ui),
            Screen::Chat { .. } => self.render_chat(ui),
            Screen::Practice => self.render_practice(ui),
            Screen::Notes => self.render_notes(ui),
            Screen::Mindfulness => self.render_mindfulness(ui),
            Screen::Progress => self.render_slot(ui, "progress"),
            Screen::Calendar => self.render_calendar(ui),
            Screen::Notifications => self.render_notifications(ui),
            Screen::Classes => self.render_classes(ui),
            Screen::AnalyticsOverview => self.render_overview(ui),
            Screen::AnalyticsClass { .. } => {
                self.render_slot(ui, "class_performance");
                ui.separator();
                self.render_slot(ui, "test_results");
            }
            Screen::AnalyticsStudent { .. } => self.render_slot(ui, "student_analytics"),
            Screen::Unimplemented { requested } => {
                ui.label(format!("'{requested}' is not available yet."));
                if ui.button("Back to home").clicked() {
                    self.core.go_home();
                }
            }
        }
    }

    fn render_auth(&mut self, ui: &mut egui::Ui) {
        let busy = self.core.is_busy();
        let form = &mut self.auth;
        ui.horizontal(|ui| {
            ui.selectable_value(&mut form.registering, false, "Sign in");
            ui.selectable_value(&mut form.registering, true, "Create account");
        });
        ui.add_space(6.0);

        Grid::new("auth_form").num_columns(2).show(ui, |ui| {
            if form.registering {
                ui.label("I am a");
                ui.horizontal(|ui| {
                    ui.radio_value(&mut form.role, Role::Student, "Student");
                    ui.radio_value(&mut form.role, Role::Teacher, "Teacher");
                });
                ui.end_row();
                ui.label("Name");
                ui.text_edit_singleline(&mut form.name);
                ui.end_row();
            }
            ui.label("Email");
            ui.text_edit_singleline(&mut form.email);
            ui.end_row();
            ui.label("Password");
            ui.add(TextEdit::singleline(&mut form.password).password(true));
            ui.end_row();
            if form.registering {
                match form.role {
                    Role::Student => {
                        ui.label("Grade");
                        ComboBox::from_id_source("grade")
                            .selected_text(form.grade_level.as_str())
                            .show_ui(ui, |ui| {
                                for grade in GRADE_LEVELS {
                                    ui.selectable_value(
                                        &mut form.grade_level,
                                        grade.to_string(),
                                        grade,
                                    );
                                }
                            });
                    }
                    Role::Teacher => {
                        ui.label("School");
                        ui.text_edit_singleline(&mut form.school_name);
                    }
                }
                ui.end_row();
            }
        });

        let ready = !form.email.trim().is_empty()
            && !form.password.is_empty()
            && (!form.registering || !form.name.trim().is_empty());
        let label = if form.registering { "Create account" } else { "Sign in" };
        let submit = ui.add_enabled(ready && !busy, egui::Button::new(label)).clicked();

        if let Some(error) = self.core.auth_error() {
            ui.colored_label(self.theme.danger_color(), error);
        }

        if submit {
            let form = self.auth.clone();
            if form.registering {
                let school = form.school_name.trim().to_string();
                self.core.submit_registration(Registration {
                    role: form.role,
                    email: form.email.trim().to_string(),
                    password: form.password,
                    name: form.name.trim().to_string(),
                    grade_level: (form.role == Role::Student).then_some(form.grade_level),
                    school_name: (form.role == Role::Teacher && !school.is_empty())
                        .then_some(school),
                    endpoint: self.settings.register_endpoint,
                });
            } else {
                self.core.submit_login(&form.email, &form.password);
            }
            self.auth.password.clear();
        }
    }

    fn render_student_home(&mut self, ui: &mut egui::Ui) {
        if let Some(session) = self.core.session() {
            ui.label(format!("Welcome back, {}!", session.user.display_name()));
        }
        match self.core.dashboard().cloned() {
            Some(snapshot) => render_json(ui, &snapshot),
            None => {
                ui.spinner();
            }
        }
        ui.separator();
        ui.horizontal(|ui| {
            ui.label("Join a class:");
            ui.add(TextEdit::singleline(&mut self.join_code).hint_text("code"));
            if ui.button("Join").clicked() && !self.join_code.trim().is_empty() {
                let join_code = self.join_code.trim().to_uppercase();
                self.core.perform(Action::JoinClass { join_code });
                self.join_code.clear();
            }
            if ui.button("Refresh").clicked() {
                self.core.refresh();
            }
        });
    }

    fn render_teacher_home(&mut self, ui: &mut egui::Ui) {
        let panel = self.core.screen_state().teacher_panel;
        ui.horizontal(|ui| {
            for choice in [TeacherPanel::Dashboard, TeacherPanel::Analytics] {
                let label = match choice {
                    TeacherPanel::Dashboard => "Dashboard",
                    TeacherPanel::Analytics => "Analytics",
                };
                if ui.selectable_label(panel == choice, label).clicked() && panel != choice {
                    self.core.set_teacher_panel(choice);
                }
            }
        });
        ui.separator();
        match panel {
            TeacherPanel::Dashboard => self.render_slot(ui, "teacher_dashboard"),
            TeacherPanel::Analytics => self.render_overview(ui),
        }
    }

    fn render_chat(&mut self, ui: &mut egui::Ui) {
        let chat = self.core.screen_state().chat.clone();
        let danger = self.theme.danger_color();
        let muted = self.theme.muted_color();
        ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .max_height(ui.available_height() - 40.0)
            .show(ui, |ui| {
                for line in &chat.lines {
                    let who = match line.sender {
                        Sender::User => "You",
                        Sender::Bot => "Tutor",
                    };
                    let text = RichText::new(format!("{who}: {}", line.text));
                    ui.label(if line.error { text.color(danger) } else { text });
                    if let Some(bot) = &line.bot_type {
                        ui.label(RichText::new(bot).small().color(muted));
                    }
                }
                if chat.sending {
                    ui.spinner();
                }
            });
        ui.horizontal(|ui| {
            let input = ui.add(
                TextEdit::singleline(&mut self.chat_input)
                    .hint_text("Ask your tutor...")
                    .desired_width(ui.available_width() - 70.0),
            );
            let enter = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if (ui.button("Send").clicked() || enter) && self.core.send_chat(&self.chat_input) {
                self.chat_input.clear();
            }
        });
        if chat.session_id.is_none() {
            ui.label(RichText::new("Connecting to the tutor...").small().color(muted));
        }
    }

    fn render_practice(&mut self, ui: &mut egui::Ui) {
        let practice = self.core.screen_state().practice.clone();

        if let Some(result) = &practice.result {
            render_json(ui, result);
            ui.separator();
        }

        let Some(test) = practice.test.filter(|_| !practice.submitted) else {
            self.render_practice_form(ui, practice.generating);
            return;
        };

        if let Some(countdown) = &practice.countdown {
            ui.label(format!("Time left: {}", countdown.label()));
        }
        ScrollArea::vertical()
            .max_height(ui.available_height() - 40.0)
            .show(ui, |ui| {
                for (index, question) in test.questions.iter().enumerate() {
                    ui.label(
                        RichText::new(format!("{}. {}", index + 1, question.question_text))
                            .strong(),
                    );
                    let chosen = practice.answers.get(&question.id).cloned();
                    if question.options.is_empty() {
                        let draft = self.open_answers.entry(question.id.clone()).or_default();
                        if ui.text_edit_singleline(draft).changed() {
                            self.core.answer_practice(&question.id, draft);
                        }
                    } else {
                        for option in &question.options {
                            if ui
                                .radio(chosen.as_deref() == Some(option.as_str()), option.as_str())
                                .clicked()
                            {
                                self.core.answer_practice(&question.id, option);
                            }
                        }
                    }
                    ui.add_space(6.0);
                }
            });
        if ui.button("Submit").clicked() {
            self.core.submit_practice();
            self.open_answers.clear();
        }
    }

    fn render_practice_form(&mut self, ui: &mut egui::Ui, generating: bool) {
        let form = &mut self.practice;
        let before = form.subject;
        ComboBox::from_label("Subject")
            .selected_text(form.subject.display_name())
            .show_ui(ui, |ui| {
                for subject in Subject::ALL {
                    ui.selectable_value(&mut form.subject, subject, subject.display_name());
                }
            });
        if form.subject != before {
            form.topics.clear();
        }
        ui.label("Topics");
        ui.horizontal_wrapped(|ui| {
            for topic in form.subject.topics() {
                let mut selected = form.topics.iter().any(|t| t == topic);
                if ui.checkbox(&mut selected, *topic).changed() {
                    if selected {
                        form.topics.push(topic.to_string());
                    } else {
                        form.topics.retain(|t| t != topic);
                    }
                }
            }
        });
        ui.horizontal(|ui| {
            for difficulty in [
                Difficulty::Easy,
                Difficulty::Medium,
                Difficulty::Hard,
                Difficulty::Mixed,
            ] {
                ui.radio_value(&mut form.difficulty, difficulty, format!("{difficulty:?}"));
            }
        });
        ui.add(
            egui::Slider::new(&mut form.count, MIN_PRACTICE_QUESTIONS..=MAX_PRACTICE_QUESTIONS)
                .text("questions"),
        );

        let spec = PracticeSpec {
            subject: form.subject,
            topics: form.topics.clone(),
            difficulty: form.difficulty,
            question_count: form.count,
        };
        if generating {
            ui.spinner();
        } else if ui.button("Generate test").clicked() {
            self.core.generate_practice(spec);
        }
    }

    fn render_notes(&mut self, ui: &mut egui::Ui) {
        if let Some(note) = self.core.screen_state().open_note().cloned() {
            self.render_open_note(ui, &note);
            return;
        }

        let state = self.core.screen_state();
        let mut filter = state.notes.filter.clone();
        let generating = state.notes.generating;
        ui.horizontal(|ui| {
            ComboBox::from_id_source("note_filter_subject")
                .selected_text(filter.subject.map(|s| s.display_name()).unwrap_or("All subjects"))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut filter.subject, None, "All subjects");
                    for subject in Subject::ALL {
                        ui.selectable_value(&mut filter.subject, Some(subject), subject.display_name());
                    }
                });
            ui.checkbox(&mut filter.favorites_only, "Favorites only");
            if ui
                .add(TextEdit::singleline(&mut self.note_search).hint_text("Search notes..."))
                .changed()
            {
                self.core.set_note_search(&self.note_search);
            }
        });
        if filter != self.core.screen_state().notes.filter {
            self.core.set_note_filter(filter);
        }

        ui.collapsing("Generate new notes", |ui| {
            let form = &mut self.note;
            Grid::new("note_form").num_columns(2).show(ui, |ui| {
                ui.label("Subject");
                ComboBox::from_id_source("note_subject")
                    .selected_text(form.subject.display_name())
                    .show_ui(ui, |ui| {
                        for subject in Subject::ALL {
                            ui.selectable_value(&mut form.subject, subject, subject.display_name());
                        }
                    });
                ui.end_row();
                ui.label("Topic");
                ui.add(
                    TextEdit::singleline(&mut form.topic)
                        .hint_text("e.g., Quadratic Equations, Photosynthesis"),
                );
                ui.end_row();
                ui.label("Note type");
                ui.vertical(|ui| {
                    for note_type in NoteType::ALL {
                        ui.radio_value(&mut form.note_type, note_type, note_type.display_name())
                            .on_hover_text(note_type.description());
                    }
                });
                ui.end_row();
            });
            let ready = !form.topic.trim().is_empty() && !generating;
            let label = if generating { "Generating notes..." } else { "Generate notes" };
            if ui.add_enabled(ready, egui::Button::new(label)).clicked() {
                let form = std::mem::take(&mut self.note);
                self.core.generate_notes(NoteRequest {
                    subject: form.subject,
                    topic: form.topic,
                    note_type: form.note_type,
                });
            }
        });
        ui.separator();

        let notes: Vec<Value> = self
            .core
            .screen_state()
            .visible_notes()
            .into_iter()
            .cloned()
            .collect();
        if notes.is_empty() {
            ui.label(RichText::new("No notes found.").color(self.theme.muted_color()));
            return;
        }
        let mut open: Option<String> = None;
        let mut action: Option<Action> = None;
        ScrollArea::vertical().show(ui, |ui| {
            for note in &notes {
                let Some(id) = note_id(note).map(str::to_string) else {
                    continue;
                };
                ui.horizontal(|ui| {
                    let star = if is_favorite(note) { "★" } else { "☆" };
                    if ui.small_button(star).clicked() {
                        action = Some(Action::ToggleFavorite { id: id.clone() });
                    }
                    if ui.link(text_field(note, "topic")).clicked() {
                        open = Some(id.clone());
                    }
                    ui.label(RichText::new(text_field(note, "subject")).small());
                    if ui.small_button("Delete").clicked() {
                        action = Some(Action::DeleteNote { id: id.clone() });
                    }
                });
            }
        });
        if let Some(id) = open {
            self.core.open_note(&id);
        }
        if let Some(action) = action {
            self.core.perform(action);
        }
    }

    fn render_open_note(&mut self, ui: &mut egui::Ui, note: &Value) {
        let id = note_id(note).unwrap_or_default().to_string();
        let mut back = false;
        ui.horizontal(|ui| {
            back = ui.button("Back to library").clicked();
            ui.heading(text_field(note, "topic"));
            ui.label(RichText::new(text_field(note, "subject")).color(self.theme.muted_color()));
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui.button("Delete").clicked() {
                    self.core.perform(Action::DeleteNote { id: id.clone() });
                }
                let star = if is_favorite(note) { "★ Favorite" } else { "☆ Favorite" };
                if ui.button(star).clicked() {
                    self.core.perform(Action::ToggleFavorite { id: id.clone() });
                }
            });
        });
        ui.separator();
        ScrollArea::vertical().show(ui, |ui| {
            for line in text_field(note, "content").lines() {
                if let Some(title) = line.strip_prefix("# ") {
                    ui.heading(title);
                } else if let Some(title) = line.strip_prefix("## ") {
                    ui.label(RichText::new(title).strong().size(18.0));
                } else if let Some(title) = line.strip_prefix("### ") {
                    ui.label(RichText::new(title).strong());
                } else if let Some(item) =
                    line.strip_prefix("* ").or_else(|| line.strip_prefix("- "))
                {
                    ui.label(format!("• {item}"));
                } else {
                    ui.label(line.replace("**", ""));
                }
            }
        });
        if back {
            self.core.close_note();
        }
    }

    fn render_mindfulness(&mut self, ui: &mut egui::Ui) {
        let active = self.core.screen_state().mindfulness.active.clone();
        match active {
            Some((activity, countdown)) => {
                let total = (activity.minutes * 60) as f32;
                let left = countdown.remaining().as_secs_f32();
                ui.label(RichText::new(activity.name).strong());
                ui.label(activity.description);
                ui.add(ProgressBar::new(1.0 - left / total).text(countdown.label()));
                if ui.button("Stop").clicked() {
                    self.core.stop_mindfulness();
                }
            }
            None => {
                for activity in MINDFULNESS_ACTIVITIES.iter() {
                    ui.horizontal(|ui| {
                        if ui.button(activity.name).clicked() {
                            self.core.start_mindfulness(activity.id);
                        }
                        ui.label(format!("{} min, {}", activity.minutes, activity.description));
                    });
                }
            }
        }
        ui.separator();
        ui.label(RichText::new("Recent sessions").small());
        self.render_rows(ui, "mindfulness", &[("Activity", "activity_type"), ("Minutes", "duration")]);
    }

    fn render_calendar(&mut self, ui: &mut egui::Ui) {
        self.render_rows(
            ui,
            "calendar",
            &[("Title", "title"), ("Type", "event_type"), ("Start", "start_time")],
        );
        ui.separator();
        let form = &mut self.event;
        Grid::new("event_form").num_columns(2).show(ui, |ui| {
            ui.label("Title");
            ui.text_edit_singleline(&mut form.title);
            ui.end_row();
            ui.label("Notes");
            ui.text_edit_singleline(&mut form.description);
            ui.end_row();
            ui.label("Start");
            ui.add(TextEdit::singleline(&mut form.start_time).hint_text("2026-10-20T09:00"));
            ui.end_row();
            ui.label("End");
            ui.add(TextEdit::singleline(&mut form.end_time).hint_text("2026-10-20T10:00"));
            ui.end_row();
        });
        let ready = !form.title.trim().is_empty() && !form.start_time.trim().is_empty();
        if ui.add_enabled(ready, egui::Button::new("Add event")).clicked() {
            let form = std::mem::take(&mut self.event);
            let end_time = if form.end_time.trim().is_empty() {
                form.start_time.clone()
            } else {
                form.end_time
            };
            self.core.perform(Action::CreateEvent(NewEvent {
                title: form.title.trim().to_string(),
                description: Some(form.description).filter(|d| !d.trim().is_empty()),
                event_type: "study".to_string(),
                subject: None,
                start_time: form.start_time,
                end_time,
            }));
        }
    }

    fn render_notifications(&mut self, ui: &mut egui::Ui) {
        let items = self
            .core
            .screen_state()
            .get("notifications")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if items.is_empty() {
            ui.label("You're all caught up.");
            return;
        }
        let unread = self.core.screen_state().unread_notifications();
        ui.label(RichText::new(format!("{unread} unread")).color(self.theme.muted_color()));
        let mut mark: Option<String> = None;
        for item in &items {
            let title = text_field(item, "title");
            let read = item.get("is_read").and_then(Value::as_bool).unwrap_or(false);
            ui.horizontal(|ui| {
                let text = RichText::new(&title);
                ui.label(if read { text } else { text.strong() });
                if !read && ui.small_button("Mark read").clicked() {
                    mark = Some(text_field(item, "id"));
                }
            });
            let message = text_field(item, "message");
            if !message.is_empty() {
                ui.label(RichText::new(message).small().color(self.theme.muted_color()));
            }
        }
        if let Some(id) = mark {
            self.core.perform(Action::MarkNotificationRead { id });
        }
    }

    fn render_classes(&mut self, ui: &mut egui::Ui) {
        self.render_rows(
            ui,
            "classes",
            &[("Class", "class_name"), ("Subject", "subject"), ("Code", "join_code")],
        );
        ui.separator();
        if self.core.role() != Some(Role::Teacher) {
            ui.horizontal(|ui| {
                ui.add(TextEdit::singleline(&mut self.join_code).hint_text("join code"));
                if ui.button("Join").clicked() && !self.join_code.trim().is_empty() {
                    let join_code = self.join_code.trim().to_uppercase();
                    self.core.perform(Action::JoinClass { join_code });
                    self.join_code.clear();
                }
            });
            return;
        }

        let form = &mut self.class;
        Grid::new("class_form").num_columns(2).show(ui, |ui| {
            ui.label("Name");
            ui.text_edit_singleline(&mut form.class_name);
            ui.end_row();
            ui.label("Subject");
            ComboBox::from_id_source("class_subject")
                .selected_text(form.subject.map(|s| s.display_name()).unwrap_or("Choose"))
                .show_ui(ui, |ui| {
                    for subject in Subject::ALL {
                        ui.selectable_value(&mut form.subject, Some(subject), subject.display_name());
                    }
                });
            ui.end_row();
            ui.label("Grade");
            ui.text_edit_singleline(&mut form.grade_level);
            ui.end_row();
            ui.label("Description");
            ui.text_edit_singleline(&mut form.description);
            ui.end_row();
        });
        let ready = !form.class_name.trim().is_empty()
            && form.subject.is_some()
            && !form.grade_level.trim().is_empty();
        if ui.add_enabled(ready, egui::Button::new("Create class")).clicked() {
            let form = std::mem::take(&mut self.class);
            if let Some(subject) = form.subject {
                self.core.perform(Action::CreateClass(NewClass {
                    class_name: form.class_name.trim().to_string(),
                    subject,
                    grade_level: form.grade_level.trim().to_string(),
                    description: Some(form.description).filter(|d| !d.trim().is_empty()),
                }));
            }
        }
    }

    fn render_overview(&mut self, ui: &mut egui::Ui) {
        let Some(overview) = self.core.screen_state().get("analytics").cloned() else {
            ui.spinner();
            return;
        };
        let metrics = &overview["overview_metrics"];
        Grid::new("overview_metrics").num_columns(2).show(ui, |ui| {
            for (label, key) in [
                ("Classes", "total_classes"),
                ("Students", "total_students"),
                ("Messages", "total_messages"),
                ("Tests", "total_tests"),
                ("Average score", "average_score"),
            ] {
                ui.label(label);
                ui.label(RichText::new(metrics[key].to_string()).strong());
                ui.end_row();
            }
        });
        ui.separator();
        let mut open: Option<String> = None;
        for class in overview["class_summary"].as_array().into_iter().flatten() {
            ui.horizontal(|ui| {
                ui.label(text_field(class, "class_name"));
                ui.label(RichText::new(text_field(class, "subject")).small());
                if ui.small_button("Open").clicked() {
                    open = Some(text_field(class, "class_id"));
                }
            });
        }
        if let Some(class_id) = open.filter(|id| !id.is_empty()) {
            self.core.go(Screen::AnalyticsClass { class_id });
        }
    }

    fn render_slot(&mut self, ui: &mut egui::Ui, slot: &str) {
        match self.core.screen_state().get(slot).cloned() {
            Some(Value::Null) => {
                ui.label(RichText::new("Nothing to show.").color(self.theme.muted_color()));
            }
            Some(value) => render_json(ui, &value),
            None => {
                ui.spinner();
            }
        }
    }

    fn render_rows(&self, ui: &mut egui::Ui, slot: &str, columns: &[(&str, &str)]) {
        let items = self
            .core
            .screen_state()
            .get(slot)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if items.is_empty() {
            ui.label(RichText::new("Nothing here yet.").color(self.theme.muted_color()));
            return;
        }
        Grid::new(slot).striped(true).show(ui, |ui| {
            for (title, _) in columns {
                ui.label(RichText::new(*title).strong());
            }
            ui.end_row();
            for item in &items {
                for (_, key) in columns {
                    ui.label(text_field(item, key));
                }
                ui.end_row();
            }
        });
    }
}

fn text_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn render_json(ui: &mut egui::Ui, value: &Value) {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    ScrollArea::vertical()
        .id_source(ui.next_auto_id())
        .max_height(320.0)
        .show(ui, |ui| {
            ui.monospace(text);
        });
}

impl App for ProjectKApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.core.pump();
        let now = Instant::now();
        self.core.tick(now - self.last_tick);
        self.last_tick = now;

        TopBottomPanel::top("menu_bar").show(ctx, |ui| self.render_menu_bar(ctx, ui));
        if self.core.session().is_some() {
            SidePanel::left("nav")
                .resizable(false)
                .show(ctx, |ui| self.render_nav(ui));
        }
        TopBottomPanel::bottom("status").show(ctx, |ui| self.render_status(ui));
        CentralPanel::default().show(ctx, |ui| self.render_screen(ui));

        if self.core.is_busy() || self.timers_running() {
            ctx.request_repaint_after(Duration::from_millis(200));
        }
    }
}

pub fn launch_gui(core: ClientCore, base_path: PathBuf, settings: Settings) -> eframe::Result<()> {
    let [width, height] = settings
        .ui
        .window_size
        .map(|(w, h)| [w, h])
        .unwrap_or([1100.0, 720.0]);
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Project K")
            .with_inner_size([width, height])
            .with_min_inner_size([820.0, 560.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Project K",
        native_options,
        Box::new(move |cc| Box::new(ProjectKApp::new(cc, core, base_path, settings))),
    )
}
