use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tokio::runtime::Runtime;

use crate::api::{RegisterEndpoint, Registration};
use crate::catalog::{Difficulty, NoteType, Subject, MINDFULNESS_ACTIVITIES};
use crate::client::ClientCore;
use crate::router::Screen;
use crate::screens::{
    is_favorite, note_id, Action, NewClass, NewEvent, NoteFilter, NoteRequest, PracticeSpec,
    Sender, TeacherPanel,
};
use crate::session::Role;

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Login { email: String, password: String },
    Register(Box<Registration>),
    Go { screen: String, param: Option<String> },
    Home,
    Where,
    Show,
    Refresh,
    Say(String),
    Panel(TeacherPanel),
    Read(String),
    Join(String),
    Practice(PracticeSpec),
    Answer { question: String, answer: String },
    Submit,
    Breathe(String),
    BreatheStop,
    Event(NewEvent),
    Class(NewClass),
    Notes(NotesCommand),
    Logout,
    Help,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
enum NotesCommand {
    Filter(NoteFilter),
    Search(String),
    Open(String),
    Close,
    New(NoteRequest),
    Favorite(String),
    Delete(String),
}

const NOTES_USAGE: &str = "Usage: notes filter <subject|all> [favorites] | notes search [text] | \
notes open <id> | notes close | notes new <subject> <type> <topic> | notes fav <id> | notes delete <id>";

impl NotesCommand {
    fn parse(rest: &[&str]) -> Result<NotesCommand, String> {
        let (sub, args) = rest.split_first().ok_or(NOTES_USAGE)?;
        let cmd = match (*sub, args) {
            ("filter", [subject, flags @ ..]) => {
                let subject = match *subject {
                    "all" => None,
                    other => Some(other.parse::<Subject>()?),
                };
                let favorites_only = match flags {
                    [] => false,
                    ["favorites"] | ["fav"] => true,
                    _ => return Err(NOTES_USAGE.into()),
                };
                NotesCommand::Filter(NoteFilter {
                    subject,
                    favorites_only,
                })
            }
            ("search", words) => NotesCommand::Search(words.join(" ")),
            ("open", [id]) => NotesCommand::Open(id.to_string()),
            ("close", []) => NotesCommand::Close,
            ("new", [subject, note_type, topic @ ..]) if !topic.is_empty() => {
                NotesCommand::New(NoteRequest {
                    subject: subject.parse()?,
                    note_type: note_type.parse::<NoteType>()?,
                    topic: topic.join(" "),
                })
            }
            ("fav", [id]) => NotesCommand::Favorite(id.to_string()),
            ("delete", [id]) => NotesCommand::Delete(id.to_string()),
            _ => return Err(NOTES_USAGE.into()),
        };
        Ok(cmd)
    }
}

impl Command {
    fn parse(line: &str) -> Result<Command, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(String::new());
        };
        let rest: Vec<&str> = words.collect();
        let tail = |from: usize| rest.get(from..).map(|w| w.join(" ")).unwrap_or_default();

        let cmd = match head.to_ascii_lowercase().as_str() {
            "login" => match rest.as_slice() {
                [email, password] => Command::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                },
                _ => return Err("Usage: login <email> <password>".into()),
            },
            "register" => {
                if rest.len() < 4 {
                    return Err(
                        "Usage: register <student|teacher> <email> <password> <name> [grade|school]"
                            .into(),
                    );
                }
                let role = match rest[0] {
                    "student" => Role::Student,
                    "teacher" => Role::Teacher,
                    other => return Err(format!("Unknown role '{other}'")),
                };
                let extra = rest.get(4).map(|s| s.to_string());
                let (grade_level, school_name) = match role {
                    Role::Student => (extra, None),
                    Role::Teacher => (None, extra),
                };
                Command::Register(Box::new(Registration {
                    role,
                    email: rest[1].to_string(),
                    password: rest[2].to_string(),
                    name: rest[3].to_string(),
                    grade_level,
                    school_name,
                    // Replaced by the configured endpoint when the command runs.
                    endpoint: RegisterEndpoint::default(),
                }))
            }
            "go" => match rest.as_slice() {
                [screen] => Command::Go {
                    screen: screen.to_string(),
                    param: None,
                },
                [screen, param] => Command::Go {
                    screen: screen.to_string(),
                    param: Some(param.to_string()),
                },
                _ => return Err("Usage: go <screen> [param]".into()),
            },
            "home" => Command::Home,
            "where" => Command::Where,
            "show" => Command::Show,
            "refresh" => Command::Refresh,
            "say" if !rest.is_empty() => Command::Say(tail(0)),
            "say" => return Err("Usage: say <message>".into()),
            "panel" => match rest.first().copied() {
                Some("dashboard") => Command::Panel(TeacherPanel::Dashboard),
                Some("analytics") => Command::Panel(TeacherPanel::Analytics),
                _ => return Err("Usage: panel <dashboard|analytics>".into()),
            },
            "read" => match rest.as_slice() {
                [id] => Command::Read(id.to_string()),
                _ => return Err("Usage: read <notification id>".into()),
            },
            "join" => match rest.as_slice() {
                [code] => Command::Join(code.to_uppercase()),
                _ => return Err("Usage: join <code>".into()),
            },
            "practice" => {
                if rest.len() < 4 {
                    return Err(
                        "Usage: practice <subject> <count> <difficulty> <topic,topic,...>".into(),
                    );
                }
                let subject: Subject = rest[0].parse()?;
                let question_count = rest[1]
                    .parse::<u32>()
                    .map_err(|_| format!("'{}' is not a question count", rest[1]))?;
                let difficulty: Difficulty = rest[2].parse()?;
                let topics = tail(3)
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                Command::Practice(PracticeSpec {
                    subject,
                    topics,
                    difficulty,
                    question_count,
                })
            }
            "answer" if rest.len() >= 2 => Command::Answer {
                question: rest[0].to_string(),
                answer: tail(1),
            },
            "answer" => return Err("Usage: answer <question id> <answer>".into()),
            "submit" => Command::Submit,
            "breathe" => match rest.first().copied() {
                Some("stop") => Command::BreatheStop,
                Some(id) => Command::Breathe(id.to_string()),
                None => return Err("Usage: breathe <activity|stop>".into()),
            },
            "event" => {
                if rest.len() < 3 {
                    return Err("Usage: event <start> <end> <title>".into());
                }
                Command::Event(NewEvent {
                    title: tail(2),
                    description: None,
                    event_type: "study".to_string(),
                    subject: None,
                    start_time: rest[0].to_string(),
                    end_time: rest[1].to_string(),
                })
            }
            "class" => {
                if rest.len() < 3 {
                    return Err("Usage: class <subject> <grade> <name>".into());
                }
                Command::Class(NewClass {
                    subject: rest[0].parse()?,
                    grade_level: rest[1].to_string(),
                    class_name: tail(2),
                    description: None,
                })
            }
            "notes" => Command::Notes(NotesCommand::parse(&rest)?),
            "logout" => Command::Logout,
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            other => return Err(format!("Unknown command '{other}'. Type 'help'.")),
        };
        Ok(cmd)
    }
}

pub fn run_cli(core: &mut ClientCore, runtime: &Runtime, register_endpoint: RegisterEndpoint) {
    println!("Project K CLI");
    println!("Type 'help' for commands, 'exit' to quit.\n");
    runtime.block_on(core.settle());
    announce(core);

    let stdin = io::stdin();
    let mut last_tick = Instant::now();
    loop {
        print!("[{}] > ", core.current_screen());
        io::stdout().flush().ok();

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                println!("Error reading input ({}). Exiting.", e);
                break;
            }
        }

        let now = Instant::now();
        core.tick(now - last_tick);
        last_tick = now;

        let command = match Command::parse(input.trim()) {
            Ok(command) => command,
            Err(message) => {
                if !message.is_empty() {
                    println!("{message}");
                }
                continue;
            }
        };
        if command == Command::Exit {
            println!("Goodbye");
            break;
        }

        let screen_before = core.current_screen().clone();
        let status_before = core.screen_state().status.clone();
        let auth_error_before = core.auth_error().map(str::to_string);
        let signing_in = matches!(command, Command::Login { .. } | Command::Register(_));
        execute(core, command, register_endpoint);
        runtime.block_on(core.settle());
        if core.current_screen() != &screen_before {
            announce(core);
        }
        let status = core.screen_state().status.as_deref();
        if status.is_some() && status != status_before.as_deref() {
            println!("{}", status.unwrap_or_default());
        }
        let auth_error = core.auth_error();
        if auth_error.is_some() && (signing_in || auth_error != auth_error_before.as_deref()) {
            println!("Error: {}", auth_error.unwrap_or_default());
        }
    }
}

fn execute(core: &mut ClientCore, command: Command, register_endpoint: RegisterEndpoint) {
    match command {
        Command::Login { email, password } => core.submit_login(&email, &password),
        Command::Register(mut registration) => {
            registration.endpoint = register_endpoint;
            core.submit_registration(*registration)
        }
        Command::Go { screen, param } => {
            if let Err(e) = core.navigate(&screen, param.as_deref()) {
                println!("{e}");
            }
        }
        Command::Home => core.go_home(),
        Command::Where => println!("{}", core.current_screen()),
        Command::Show => show(core),
        Command::Refresh => core.refresh(),
        Command::Say(text) => {
            if !core.send_chat(&text) {
                println!("Open a chat first with: go chat <subject>");
            }
        }
        Command::Panel(panel) => {
            if !core.set_teacher_panel(panel) {
                println!("Panels are only available on teacher-home.");
            }
        }
        Command::Read(id) => core.perform(Action::MarkNotificationRead { id }),
        Command::Join(join_code) => core.perform(Action::JoinClass { join_code }),
        Command::Practice(spec) => {
            if !core.generate_practice(spec) {
                println!("Go to the practice screen first (go practice).");
            }
        }
        Command::Answer { question, answer } => {
            if !core.answer_practice(&question, &answer) {
                println!("No question '{question}' in the running test.");
            }
        }
        Command::Submit => {
            if !core.submit_practice() {
                println!("There is no practice test to submit.");
            }
        }
        Command::Breathe(id) => {
            if !core.start_mindfulness(&id) {
                println!("Go to mindfulness and pick one of: breathing, meditation, stress, break");
            }
        }
        Command::BreatheStop => core.stop_mindfulness(),
        Command::Event(event) => core.perform(Action::CreateEvent(event)),
        Command::Class(class) => {
            if core.role() == Some(Role::Teacher) {
                core.perform(Action::CreateClass(class));
            } else {
                println!("Only teachers can create classes.");
            }
        }
        Command::Notes(notes) => execute_notes(core, notes),
        Command::Logout => core.logout(),
        Command::Help => print_help(),
        Command::Exit => {}
    }
}

fn execute_notes(core: &mut ClientCore, command: NotesCommand) {
    if core.current_screen() != &Screen::Notes {
        println!("Open your notes first with: go notes");
        return;
    }
    match command {
        NotesCommand::Filter(filter) => {
            core.set_note_filter(filter);
        }
        NotesCommand::Search(text) => {
            core.set_note_search(&text);
            show(core);
        }
        NotesCommand::Open(id) => {
            core.open_note(&id);
        }
        NotesCommand::Close => core.close_note(),
        NotesCommand::New(request) => {
            if core.generate_notes(request) {
                println!("Generating notes...");
            }
        }
        NotesCommand::Favorite(id) => core.perform(Action::ToggleFavorite { id }),
        NotesCommand::Delete(id) => core.perform(Action::DeleteNote { id }),
    }
}

fn announce(core: &ClientCore) {
    match core.session() {
        Some(session) => println!(
            "== {} ({}, signed in as {}) ==",
            core.current_screen().title(),
            session.role,
            session.user.display_name()
        ),
        None => println!("== {} ==", core.current_screen().title()),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  login <email> <password>");
    println!("  register <student|teacher> <email> <password> <name> [grade|school]");
    println!("  go <screen> [param]    (screens: student-home, teacher-home, chat <subject>,");
    println!("                          practice, notes, mindfulness, progress, calendar, notifications,");
    println!("                          classes, analytics-overview, analytics-class <id>,");
    println!("                          analytics-student <id>)");
    println!("  home | where | show | refresh");
    println!("  say <message>          (chat)");
    println!("  panel <dashboard|analytics>  (teacher-home)");
    println!("  read <notification id>");
    println!("  join <code>");
    println!("  practice <subject> <count> <difficulty> <topic,topic,...>");
    println!("  answer <question id> <answer> | submit");
    println!("  breathe <breathing|meditation|stress|break|stop>");
    println!("  event <start> <end> <title>");
    println!("  notes filter <subject|all> [favorites] | notes search [text]");
    println!("  notes new <subject> <comprehensive|summary|quick> <topic>");
    println!("  notes open <id> | notes close | notes fav <id> | notes delete <id>");
    println!("  class <subject> <grade> <name>   (teachers)");
    println!("  logout | help | exit");
}

fn show(core: &ClientCore) {
    let state = core.screen_state();
    match core.current_screen() {
        Screen::Auth => {
            println!("Not signed in. Use 'login' or 'register'.");
        }
        Screen::StudentHome => {
            if let Some(session) = core.session() {
                println!("Welcome back, {}!", session.user.display_name());
            }
            match core.dashboard() {
                Some(snapshot) => print_value(snapshot),
                None => println!("Dashboard is still loading."),
            }
        }
        Screen::TeacherHome => {
            println!("Panel: {}", state.teacher_panel.as_str());
            let slot = match state.teacher_panel {
                TeacherPanel::Dashboard => "teacher_dashboard",
                TeacherPanel::Analytics => "analytics",
            };
            state.get(slot).map(print_value).unwrap_or_else(|| println!("Loading..."));
        }
        Screen::Chat { subject } => {
            println!("Chatting about {}", subject.display_name());
            for line in &state.chat.lines {
                let who = match line.sender {
                    Sender::User => "You",
                    Sender::Bot => "Tutor",
                };
                println!("{who}: {}", line.text);
            }
            if state.chat.sending {
                println!("(waiting for a reply)");
            }
        }
        Screen::Practice => {
            let practice = &state.practice;
            match &practice.test {
                None => println!("No test yet. Subjects: {}", subject_list()),
                Some(test) => {
                    if let Some(countdown) = &practice.countdown {
                        println!("Time left: {}", countdown.label());
                    }
                    for question in &test.questions {
                        let mark = if practice.answers.contains_key(&question.id) {
                            "x"
                        } else {
                            " "
                        };
                        println!("[{mark}] {}: {}", question.id, question.question_text);
                        for option in &question.options {
                            println!("      - {option}");
                        }
                    }
                }
            }
            if let Some(result) = &practice.result {
                print_value(result);
            }
        }
        Screen::Mindfulness => {
            for activity in MINDFULNESS_ACTIVITIES.iter() {
                println!(
                    "{:<11} {:<20} {} min  {}",
                    activity.id, activity.name, activity.minutes, activity.description
                );
            }
            if let Some((activity, countdown)) = &state.mindfulness.active {
                println!("\n{} running: {} left", activity.name, countdown.label());
            }
            let sessions = state
                .get("mindfulness")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            println!("Sessions logged: {sessions}");
        }
        Screen::Progress => state.get("progress").map(print_value).unwrap_or_default(),
        Screen::Calendar => print_rows(
            state.get("calendar"),
            &[("Title", "title", 24), ("Type", "event_type", 12), ("Start", "start_time", 20)],
        ),
        Screen::Notifications => {
            print_rows(
                state.get("notifications"),
                &[("ID", "id", 10), ("Title", "title", 30), ("Read", "is_read", 5)],
            );
            println!("{} unread", state.unread_notifications());
        }
        Screen::Notes => match state.open_note() {
            Some(note) => {
                let star = if is_favorite(note) { "*" } else { " " };
                println!(
                    "{star} {} ({})",
                    text_of(note, "topic"),
                    text_of(note, "subject")
                );
                println!();
                println!("{}", text_of(note, "content"));
            }
            None => {
                let notes = state.visible_notes();
                if notes.is_empty() {
                    println!("No notes found. Create one with: notes new <subject> <type> <topic>");
                }
                for note in notes {
                    let star = if is_favorite(note) { "*" } else { " " };
                    println!(
                        "{star} {:<10} {:<10} {}",
                        note_id(note).unwrap_or("-"),
                        text_of(note, "subject"),
                        text_of(note, "topic")
                    );
                }
            }
        },
        Screen::Classes => print_rows(
            state.get("classes"),
            &[("Class", "class_name", 20), ("Subject", "subject", 10), ("Code", "join_code", 8)],
        ),
        Screen::AnalyticsOverview => state.get("analytics").map(print_value).unwrap_or_default(),
        Screen::AnalyticsClass { .. } => {
            for slot in ["class_performance", "test_results"] {
                if let Some(value) = state.get(slot) {
                    print_value(value);
                }
            }
        }
        Screen::AnalyticsStudent { .. } => {
            state.get("student_analytics").map(print_value).unwrap_or_default()
        }
        Screen::Unimplemented { requested } => {
            println!("'{requested}' is not available yet. Type 'home' to go back.");
        }
    }
}

fn text_of<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or("-")
}

fn subject_list() -> String {
    Subject::ALL
        .iter()
        .map(Subject::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_value(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

fn print_rows(list: Option<&Value>, columns: &[(&str, &str, usize)]) {
    let items = list.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    if items.is_empty() {
        println!("\nNothing here yet.\n");
        return;
    }

    let header: Vec<String> = columns
        .iter()
        .map(|(title, _, width)| format!("{:<width$}", title, width = *width))
        .collect();
    println!();
    println!("{}", header.join(" | "));
    println!("{}", "-".repeat(header.iter().map(|h| h.len() + 3).sum()));

    for item in items {
        let cells: Vec<String> = columns
            .iter()
            .map(|(_, key, width)| {
                let text = match item.get(*key) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => "-".to_string(),
                    Some(other) => other.to_string(),
                };
                format!("{:<width$}", truncate_for_table(&text, *width), width = *width)
            })
            .collect();
        println!("{}", cells.join(" | "));
    }
    println!();
}

fn truncate_for_table(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_len.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation_with_and_without_parameter() {
        assert_eq!(
            Command::parse("go chat physics").unwrap(),
            Command::Go {
                screen: "chat".into(),
                param: Some("physics".into())
            }
        );
        assert_eq!(
            Command::parse("go calendar").unwrap(),
            Command::Go {
                screen: "calendar".into(),
                param: None
            }
        );
        assert!(Command::parse("go").is_err());
    }

    #[test]
    fn practice_command_collects_topics() {
        let cmd = Command::parse("practice math 10 hard Algebra, Linear Equations").unwrap();
        match cmd {
            Command::Practice(spec) => {
                assert_eq!(spec.subject, Subject::Math);
                assert_eq!(spec.question_count, 10);
                assert_eq!(spec.difficulty, Difficulty::Hard);
                assert_eq!(spec.topics, vec!["Algebra", "Linear Equations"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Command::parse("practice astrology 5 easy Stars").is_err());
    }

    #[test]
    fn register_puts_the_extra_field_by_role() {
        match Command::parse("register teacher obi@example.com pw Obi Lakeside").unwrap() {
            Command::Register(reg) => {
                assert_eq!(reg.role, Role::Teacher);
                assert_eq!(reg.school_name.as_deref(), Some("Lakeside"));
                assert!(reg.grade_level.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn notes_subcommands_parse() {
        assert_eq!(
            Command::parse("notes filter math favorites").unwrap(),
            Command::Notes(NotesCommand::Filter(NoteFilter {
                subject: Some(Subject::Math),
                favorites_only: true,
            }))
        );
        assert_eq!(
            Command::parse("notes filter all").unwrap(),
            Command::Notes(NotesCommand::Filter(NoteFilter::default()))
        );
        assert_eq!(
            Command::parse("notes new history quick World War II").unwrap(),
            Command::Notes(NotesCommand::New(NoteRequest {
                subject: Subject::History,
                topic: "World War II".into(),
                note_type: NoteType::QuickReference,
            }))
        );
        assert_eq!(
            Command::parse("notes delete n-4").unwrap(),
            Command::Notes(NotesCommand::Delete("n-4".into()))
        );
        assert!(Command::parse("notes new math summary").is_err());
        assert!(Command::parse("notes").is_err());
    }

    #[test]
    fn say_keeps_the_whole_message() {
        assert_eq!(
            Command::parse("say what is   an atom?").unwrap(),
            Command::Say("what is an atom?".into())
        );
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(Command::parse(""), Err(String::new()));
        assert!(Command::parse("dance").unwrap_err().contains("Unknown command"));
    }

    #[test]
    fn truncation_marks_cut_text() {
        assert_eq!(truncate_for_table("Chemistry", 20), "Chemistry");
        assert_eq!(truncate_for_table("Organic Chemistry", 8), "Organic…");
    }
}
