//! The client core: session lifecycle, navigation and request dispatch.
//!
//! `ClientCore` is owned by the UI thread. Network calls are spawned onto the
//! tokio runtime and their results come back over a channel; nothing is
//! applied until the owner calls [`ClientCore::pump`] (GUI, once per frame) or
//! awaits [`ClientCore::settle`] (CLI and tests).
//!
//! Each spawned call carries a [`Ticket`] recording the session and navigation
//! epochs it was issued under. A result whose ticket no longer matches is
//! dropped with a debug log.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::api::{Api, ApiError, AuthResponse, LoginRequest, Registration, Transport};
use crate::catalog::find_activity;
use crate::credentials::CredentialStore;
use crate::gateway::RequestGateway;
use crate::router::{RouteError, Router, Screen, ScreenId};
use crate::screens::{
    loads_on_entry, Action, Load, NoteFilter, NoteRequest, PracticeSpec, ScreenState, TeacherPanel,
};
use crate::session::{Role, Session, UserRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthFlow {
    Login,
    Register,
}

impl AuthFlow {
    fn fallback(&self) -> &'static str {
        match self {
            AuthFlow::Login => "Authentication failed",
            AuthFlow::Register => "Registration failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    session_epoch: u64,
    nav_epoch: u64,
    screen: ScreenId,
}

enum Outcome {
    Auth(AuthFlow, Result<AuthResponse, ApiError>),
    Dashboard(Result<Value, ApiError>),
    Load(Load, Result<Value, ApiError>),
    Action(Action, Result<Value, ApiError>),
}

struct Completion {
    ticket: Ticket,
    outcome: Outcome,
}

pub struct ClientCore {
    store: CredentialStore,
    gateway: RequestGateway,
    api: Api,
    runtime: Handle,
    router: Router,
    session: Option<Session>,
    session_epoch: u64,
    dashboard: Option<Value>,
    screen: ScreenState,
    auth_error: Option<String>,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl ClientCore {
    pub fn new(
        store: CredentialStore,
        gateway: RequestGateway,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            store,
            gateway,
            api: Api::new(transport),
            runtime,
            router: Router::new(),
            session: None,
            session_epoch: 0,
            dashboard: None,
            screen: ScreenState::default(),
            auth_error: None,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn current_screen(&self) -> &Screen {
        self.router.current()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role)
    }

    /// Latest student dashboard snapshot, if one has arrived for this session.
    pub fn dashboard(&self) -> Option<&Value> {
        self.dashboard.as_ref()
    }

    pub fn screen_state(&self) -> &ScreenState {
        &self.screen
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// Rebuild the session from stored credentials, if there are any.
    pub fn bootstrap(&mut self) {
        let Some(stored) = self.store.load() else {
            info!("no stored session");
            return;
        };
        if stored.token.trim().is_empty() {
            warn!("stored session has an empty token, clearing it");
            self.teardown();
            return;
        }
        let user = match UserRecord::parse(&stored.user_raw) {
            Ok(user) => user,
            Err(err) => {
                warn!("stored session is corrupt, clearing it: {err}");
                self.teardown();
                return;
            }
        };
        let role = Role::from_tag(&stored.role);
        info!(%role, "restored session");
        self.establish(stored.token, role, user);
    }

    pub fn submit_login(&mut self, email: &str, password: &str) {
        let login = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.auth_error = None;
        let api = self.api.clone();
        self.spawn(async move { Outcome::Auth(AuthFlow::Login, api.login(&login).await) });
    }

    pub fn submit_registration(&mut self, registration: Registration) {
        self.auth_error = None;
        let api = self.api.clone();
        self.spawn(async move {
            Outcome::Auth(AuthFlow::Register, api.register(&registration).await)
        });
    }

    /// Install a freshly authenticated identity and move to its home screen.
    pub fn complete_authentication(&mut self, token: &str, role_tag: &str, user: UserRecord) {
        if let Err(err) = self.store.save(token, role_tag, &user) {
            warn!("could not persist credentials, continuing in memory: {err}");
        }
        let role = Role::from_tag(role_tag);
        info!(%role, user = user.display_name(), "signed in");
        self.auth_error = None;
        self.establish(token.to_string(), role, user);
    }

    pub fn logout(&mut self) {
        info!("signing out");
        self.teardown();
    }

    fn establish(&mut self, token: String, role: Role, user: UserRecord) {
        self.gateway.configure(Some(&token));
        self.session = Some(Session { token, role, user });
        self.session_epoch += 1;
        self.dashboard = None;
        self.enter(role.home());
        if role == Role::Student {
            self.request_dashboard();
        }
    }

    fn teardown(&mut self) {
        self.store.clear();
        self.gateway.configure(None);
        self.session = None;
        self.session_epoch += 1;
        self.dashboard = None;
        self.enter(Screen::Auth);
    }

    fn request_dashboard(&mut self) {
        let api = self.api.clone();
        self.spawn(async move { Outcome::Dashboard(api.dashboard().await) });
    }

    /// Move to a screen by name. The router is left alone on a bad parameter.
    pub fn navigate(&mut self, name: &str, parameter: Option<&str>) -> Result<(), RouteError> {
        let screen = Screen::parse(name, parameter)?;
        self.go(screen);
        Ok(())
    }

    pub fn go(&mut self, screen: Screen) {
        self.enter(screen);
    }

    /// Return to the signed-in role's home, or to sign-in without a session.
    pub fn go_home(&mut self) {
        let home = self.role().map(|r| r.home()).unwrap_or_default();
        self.enter(home);
    }

    fn enter(&mut self, screen: Screen) {
        self.router.goto(screen.clone());
        self.screen = ScreenState::default();
        for load in loads_on_entry(&screen, self.role()) {
            self.issue_load(load);
        }
    }

    /// Switch the teacher home panel. Has no effect on any other screen.
    pub fn set_teacher_panel(&mut self, panel: TeacherPanel) -> bool {
        if self.router.current() != &Screen::TeacherHome {
            return false;
        }
        self.screen.teacher_panel = panel;
        if panel == TeacherPanel::Analytics {
            self.issue_load(Load::AnalyticsOverview);
        }
        true
    }

    /// Re-issue whatever the current screen shows.
    pub fn refresh(&mut self) {
        let screen = self.router.current().clone();
        if screen == Screen::StudentHome && self.role() == Some(Role::Student) {
            self.request_dashboard();
        }
        for load in loads_on_entry(&screen, self.role()) {
            let load = match load {
                Load::NoteLibrary(_) => Load::NoteLibrary(self.screen.notes.filter.clone()),
                other => other,
            };
            self.issue_load(load);
        }
        if screen == Screen::TeacherHome && self.screen.teacher_panel == TeacherPanel::Analytics {
            self.issue_load(Load::AnalyticsOverview);
        }
    }

    pub fn perform(&mut self, action: Action) {
        let api = self.api.clone();
        let request = action.request();
        self.spawn(async move {
            let result = api.send(request).await;
            Outcome::Action(action, result)
        });
    }

    /// Send a chat message on the current chat screen.
    pub fn send_chat(&mut self, text: &str) -> bool {
        let subject = match self.router.current() {
            Screen::Chat { subject } => *subject,
            _ => return false,
        };
        match self.screen.chat_message(subject, text) {
            Some(action) => {
                self.perform(action);
                true
            }
            None => false,
        }
    }

    pub fn generate_practice(&mut self, spec: PracticeSpec) -> bool {
        if self.router.current() != &Screen::Practice {
            return false;
        }
        match self.screen.generate_practice(spec) {
            Some(action) => {
                self.perform(action);
                true
            }
            None => false,
        }
    }

    pub fn answer_practice(&mut self, question_id: &str, answer: &str) -> bool {
        self.screen.practice.answer(question_id, answer)
    }

    pub fn submit_practice(&mut self) -> bool {
        match self.screen.submit_practice() {
            Some(action) => {
                self.perform(action);
                true
            }
            None => false,
        }
    }

    /// Refetch the notes library with new server-side filters.
    pub fn set_note_filter(&mut self, filter: NoteFilter) -> bool {
        if self.router.current() != &Screen::Notes {
            return false;
        }
        self.screen.notes.filter = filter.clone();
        self.issue_load(Load::NoteLibrary(filter));
        true
    }

    pub fn set_note_search(&mut self, search: &str) {
        self.screen.notes.search = search.to_string();
    }

    pub fn open_note(&mut self, id: &str) -> bool {
        let id = id.trim();
        if self.router.current() != &Screen::Notes || id.is_empty() {
            return false;
        }
        self.issue_load(Load::Note { id: id.to_string() });
        true
    }

    pub fn close_note(&mut self) {
        self.screen.close_note();
    }

    pub fn generate_notes(&mut self, request: NoteRequest) -> bool {
        if self.router.current() != &Screen::Notes {
            return false;
        }
        match self.screen.generate_notes(request) {
            Some(action) => {
                self.perform(action);
                true
            }
            None => false,
        }
    }

    pub fn start_mindfulness(&mut self, activity_id: &str) -> bool {
        if self.router.current() != &Screen::Mindfulness {
            return false;
        }
        match find_activity(activity_id) {
            Some(activity) => {
                self.screen.start_mindfulness(activity);
                true
            }
            None => false,
        }
    }

    pub fn stop_mindfulness(&mut self) {
        self.screen.stop_mindfulness();
    }

    /// Advance screen timers by wall-clock time.
    pub fn tick(&mut self, elapsed: Duration) {
        for action in self.screen.tick(elapsed) {
            self.perform(action);
        }
    }

    fn issue_load(&mut self, load: Load) {
        let api = self.api.clone();
        let request = load.request();
        self.spawn(async move {
            let result = api.send(request).await;
            Outcome::Load(load, result)
        });
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            session_epoch: self.session_epoch,
            nav_epoch: self.router.epoch(),
            screen: self.router.current().id(),
        }
    }

    fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let ticket = self.ticket();
        let tx = self.tx.clone();
        self.in_flight += 1;
        self.runtime.spawn(async move {
            let outcome = work.await;
            // The receiver lives as long as the core; a send error means it is gone.
            let _ = tx.send(Completion { ticket, outcome });
        });
    }

    /// Apply every completion that has already arrived. Returns how many.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Wait until nothing is in flight, applying completions as they arrive.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            let Some(completion) = self.rx.recv().await else {
                break;
            };
            self.in_flight -= 1;
            self.apply(completion);
        }
    }

    fn apply(&mut self, completion: Completion) {
        let Completion { ticket, outcome } = completion;
        match outcome {
            Outcome::Auth(flow, result) => {
                if self.session.is_some() || self.router.current() != &Screen::Auth {
                    debug!(?ticket, "dropping auth result, no longer on sign-in");
                    return;
                }
                self.finish_auth(flow, result);
            }
            Outcome::Dashboard(result) => {
                if ticket.session_epoch != self.session_epoch || self.session.is_none() {
                    debug!(?ticket, "dropping dashboard snapshot from an old session");
                    return;
                }
                match result {
                    Ok(snapshot) => self.dashboard = Some(snapshot),
                    Err(err) => warn!("dashboard fetch failed: {err}"),
                }
            }
            Outcome::Load(load, result) => {
                if !self.is_current(&ticket) {
                    debug!(?ticket, slot = load.slot(), "dropping stale screen load");
                    return;
                }
                self.screen.apply_load(&load, result);
            }
            Outcome::Action(action, result) => {
                if !self.is_current(&ticket) {
                    debug!(?ticket, "dropping stale screen action result");
                    return;
                }
                self.screen.apply_action(&action, result);
            }
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.session_epoch == self.session_epoch && ticket.nav_epoch == self.router.epoch()
    }

    fn finish_auth(&mut self, flow: AuthFlow, result: Result<AuthResponse, ApiError>) {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(?flow, "authentication failed: {err}");
                self.auth_error = Some(err.user_message(flow.fallback()));
                return;
            }
        };
        if response.access_token.trim().is_empty() {
            warn!(?flow, "server returned an empty access token");
            self.auth_error = Some(flow.fallback().to_string());
            return;
        }
        match UserRecord::from_value(response.user) {
            Ok(user) => {
                self.complete_authentication(&response.access_token, &response.user_type, user)
            }
            Err(err) => {
                warn!(?flow, "server returned an unusable user record: {err}");
                self.auth_error = Some(flow.fallback().to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiRequest, RegisterEndpoint};
    use crate::catalog::{NoteType, Subject};
    use crate::credentials::{
        FailingStore, KeyValueStore, MemoryStore, ROLE_KEY, TOKEN_KEY, USER_KEY,
    };
    use crate::screens::note_id;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;

    /// Answers by path and records the bearer token seen on each call.
    struct FakeTransport {
        gateway: RequestGateway,
        replies: Mutex<HashMap<String, Result<Value, (u16, Option<String>)>>>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeTransport {
        fn new(gateway: &RequestGateway) -> Arc<Self> {
            Arc::new(Self {
                gateway: gateway.clone(),
                replies: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn reply(&self, path: &str, value: Value) {
            self.replies.lock().insert(path.to_string(), Ok(value));
        }

        fn fail(&self, path: &str, status: u16, detail: Option<&str>) {
            self.replies
                .lock()
                .insert(path.to_string(), Err((status, detail.map(str::to_string))));
        }

        fn count(&self, path: &str) -> usize {
            self.calls.lock().iter().filter(|(p, _)| p == path).count()
        }

        fn tokens_for(&self, path: &str) -> Vec<Option<String>> {
            self.calls
                .lock()
                .iter()
                .filter(|(p, _)| p == path)
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
            self.calls
                .lock()
                .push((request.path.clone(), self.gateway.token()));
            match self.replies.lock().get(&request.path) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err((status, detail))) => Err(ApiError::Status {
                    status: *status,
                    detail: detail.clone(),
                }),
                None => Ok(json!([])),
            }
        }
    }

    fn core_with(store: CredentialStore) -> (ClientCore, Arc<FakeTransport>) {
        let gateway = RequestGateway::new();
        let transport = FakeTransport::new(&gateway);
        let core = ClientCore::new(store, gateway, transport.clone(), Handle::current());
        (core, transport)
    }

    fn seeded(token: &str, role: &str, user_raw: &str) -> CredentialStore {
        let mut store = CredentialStore::in_memory();
        let backend = store.backend_mut();
        backend.set(TOKEN_KEY, token).unwrap();
        backend.set(ROLE_KEY, role).unwrap();
        backend.set(USER_KEY, user_raw).unwrap();
        store
    }

    #[tokio::test]
    async fn fresh_store_stays_on_auth() {
        let (mut core, transport) = core_with(CredentialStore::in_memory());
        core.bootstrap();
        core.settle().await;

        assert_eq!(core.current_screen(), &Screen::Auth);
        assert!(!core.gateway().is_configured());
        assert!(core.session().is_none());
        assert!(transport.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn stored_student_session_is_restored() {
        let (mut core, transport) = core_with(seeded("abc", "student", r#"{"name":"Ana"}"#));
        transport.reply("/api/dashboard", json!({"xp": 120, "level": 2}));

        core.bootstrap();
        core.settle().await;

        assert_eq!(core.current_screen(), &Screen::StudentHome);
        assert_eq!(core.gateway().token().as_deref(), Some("abc"));
        assert_eq!(transport.count("/api/dashboard"), 1);
        assert_eq!(transport.tokens_for("/api/dashboard"), vec![Some("abc".to_string())]);
        assert_eq!(core.dashboard().unwrap()["xp"], 120);
        assert_eq!(core.session().unwrap().user.display_name(), "Ana");
    }

    #[tokio::test]
    async fn corrupt_user_record_clears_the_store() {
        let (mut core, transport) = core_with(seeded("abc", "student", "not-json"));
        core.bootstrap();
        core.settle().await;

        assert_eq!(core.current_screen(), &Screen::Auth);
        assert!(core.store().load().is_none());
        assert!(core.session().is_none());
        assert!(!core.gateway().is_configured());
        assert_eq!(transport.count("/api/dashboard"), 0);
    }

    #[tokio::test]
    async fn successful_login_lands_on_teacher_home() {
        let (mut core, transport) = core_with(CredentialStore::in_memory());
        transport.reply(
            "/api/auth/login",
            json!({
                "access_token": "xyz",
                "token_type": "bearer",
                "user_type": "teacher",
                "user": {"id": "t-1", "name": "Mr. Obi"}
            }),
        );
        transport.reply("/api/teacher/dashboard", json!({"total_classes": 3}));

        core.bootstrap();
        core.submit_login("obi@example.com", "secret");
        core.settle().await;

        let stored = core.store().load().unwrap();
        assert_eq!(stored.token, "xyz");
        assert_eq!(stored.role, "teacher");
        assert_eq!(
            serde_json::from_str::<Value>(&stored.user_raw).unwrap(),
            json!({"id": "t-1", "name": "Mr. Obi"})
        );
        assert_eq!(core.gateway().token().as_deref(), Some("xyz"));
        assert_eq!(core.current_screen(), &Screen::TeacherHome);
        // Teachers never fetch the student dashboard.
        assert_eq!(transport.count("/api/dashboard"), 0);
        assert_eq!(
            core.screen_state().get("teacher_dashboard").unwrap()["total_classes"],
            3
        );
    }

    #[tokio::test]
    async fn logout_tears_everything_down_from_any_screen() {
        let (mut core, _transport) = core_with(seeded("abc", "student", r#"{"name":"Ana"}"#));
        core.bootstrap();
        core.settle().await;
        core.navigate("chat", Some("biology")).unwrap();
        core.settle().await;

        core.logout();
        core.settle().await;

        assert_eq!(core.current_screen(), &Screen::Auth);
        assert!(core.store().load().is_none());
        assert!(!core.gateway().is_configured());
        assert!(core.dashboard().is_none());
        assert!(core.screen_state().chat.lines.is_empty());
    }

    #[tokio::test]
    async fn failed_login_shows_the_server_detail() {
        let (mut core, transport) = core_with(CredentialStore::in_memory());
        transport.fail("/api/auth/login", 401, Some("Invalid email or password"));

        core.submit_login("ana@example.com", "wrong");
        core.settle().await;

        assert_eq!(core.current_screen(), &Screen::Auth);
        assert_eq!(core.auth_error(), Some("Invalid email or password"));
        assert!(core.store().load().is_none());
    }

    #[tokio::test]
    async fn blank_access_token_is_not_a_session() {
        let (mut core, transport) = core_with(CredentialStore::in_memory());
        transport.reply(
            "/api/auth/login",
            json!({"access_token": "", "user_type": "student", "user": {"name": "Ana"}}),
        );

        core.submit_login("ana@example.com", "pw");
        core.settle().await;

        assert_eq!(core.current_screen(), &Screen::Auth);
        assert!(core.session().is_none());
        assert!(!core.gateway().is_configured());
        assert!(core.store().load().is_none());
        assert_eq!(core.auth_error(), Some("Authentication failed"));
        assert_eq!(transport.count("/api/dashboard"), 0);
    }

    #[tokio::test]
    async fn half_written_credentials_never_mix_two_sessions() {
        let mut previous = MemoryStore::new();
        previous
            .set_all(&[
                (TOKEN_KEY, "teacher-token"),
                (ROLE_KEY, "teacher"),
                (USER_KEY, r#"{"name":"Mr. Obi"}"#),
            ])
            .unwrap();
        let store = CredentialStore::new(FailingStore::wrap(previous, ROLE_KEY));
        let (mut core, _transport) = core_with(store);
        core.bootstrap();
        core.settle().await;
        assert_eq!(core.current_screen(), &Screen::TeacherHome);

        let user = UserRecord::from_value(json!({"name": "Ana"})).unwrap();
        core.complete_authentication("student-token", "student", user);
        core.settle().await;

        // The new identity still runs in memory; storage holds nothing.
        assert_eq!(core.current_screen(), &Screen::StudentHome);
        assert_eq!(core.gateway().token().as_deref(), Some("student-token"));
        assert!(core.store().load().is_none());
    }

    #[tokio::test]
    async fn failed_registration_without_detail_uses_the_fallback() {
        let (mut core, transport) = core_with(CredentialStore::in_memory());
        transport.fail("/api/auth/register/student", 500, None);

        core.submit_registration(Registration {
            role: Role::Student,
            email: "ana@example.com".into(),
            password: "pw".into(),
            name: "Ana".into(),
            grade_level: Some("8th".into()),
            school_name: None,
            endpoint: RegisterEndpoint::RoleSpecific,
        });
        core.settle().await;

        assert_eq!(core.auth_error(), Some("Registration failed"));
    }

    #[tokio::test]
    async fn screen_loads_issued_before_a_goto_are_dropped() {
        let (mut core, transport) = core_with(seeded("abc", "student", r#"{"name":"Ana"}"#));
        transport.reply("/api/calendar/events", json!([{"title": "Quiz"}]));
        transport.reply("/api/notifications", json!([{"id": "n1", "is_read": false}]));
        core.bootstrap();
        core.settle().await;

        core.navigate("calendar", None).unwrap();
        core.navigate("notifications", None).unwrap();
        core.settle().await;

        assert_eq!(transport.count("/api/calendar/events"), 1);
        assert!(core.screen_state().get("calendar").is_none());
        assert_eq!(core.screen_state().unread_notifications(), 1);
    }

    #[tokio::test]
    async fn dashboard_arriving_after_logout_is_dropped() {
        let (mut core, transport) = core_with(seeded("abc", "student", r#"{"name":"Ana"}"#));
        transport.reply("/api/dashboard", json!({"xp": 5}));

        core.bootstrap();
        core.logout();
        core.settle().await;

        assert_eq!(transport.count("/api/dashboard"), 1);
        assert!(core.dashboard().is_none());
        assert_eq!(core.current_screen(), &Screen::Auth);
    }

    #[tokio::test]
    async fn teacher_panel_switch_does_not_move_the_router() {
        let (mut core, transport) = core_with(seeded("t", "teacher", r#"{"name":"Obi"}"#));
        transport.fail("/api/teacher/analytics/overview", 500, None);
        core.bootstrap();
        core.settle().await;
        let epoch = core.router.epoch();

        assert!(core.set_teacher_panel(TeacherPanel::Analytics));
        core.settle().await;

        assert_eq!(core.router.epoch(), epoch);
        assert_eq!(core.current_screen(), &Screen::TeacherHome);
        assert_eq!(core.screen_state().teacher_panel, TeacherPanel::Analytics);
        let overview = core.screen_state().get("analytics").unwrap();
        assert_eq!(overview["overview_metrics"]["total_classes"], 0);

        // Re-entering teacher home resets the panel.
        core.go_home();
        assert_eq!(core.screen_state().teacher_panel, TeacherPanel::Dashboard);
        core.navigate("calendar", None).unwrap();
        assert!(!core.set_teacher_panel(TeacherPanel::Analytics));
    }

    #[tokio::test]
    async fn bad_route_leaves_the_router_alone() {
        let (mut core, _transport) = core_with(CredentialStore::in_memory());
        let before = core.router.epoch();
        assert!(core.navigate("chat", None).is_err());
        assert!(core.navigate("chat", Some("astrology")).is_err());
        assert_eq!(core.router.epoch(), before);

        core.navigate("leaderboard", None).unwrap();
        assert_eq!(
            core.current_screen(),
            &Screen::Unimplemented {
                requested: "leaderboard".into()
            }
        );
    }

    #[tokio::test]
    async fn chat_round_trip_appends_the_bot_reply() {
        let (mut core, transport) = core_with(seeded("abc", "student", r#"{"name":"Ana"}"#));
        transport.reply("/api/chat/session", json!({"session_id": "s-7"}));
        transport.reply(
            "/api/chat/message",
            json!({"bot_response": "Photosynthesis turns light into sugar.", "bot_type": "biology_bot"}),
        );
        core.bootstrap();
        core.navigate("chat", Some("biology")).unwrap();
        core.settle().await;

        assert!(core.send_chat("what is photosynthesis?"));
        core.settle().await;

        let lines = &core.screen_state().chat.lines;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].bot_type.as_deref(), Some("biology_bot"));
    }

    #[tokio::test]
    async fn refresh_refetches_the_student_dashboard() {
        let (mut core, transport) = core_with(seeded("abc", "student", r#"{"name":"Ana"}"#));
        core.bootstrap();
        core.settle().await;
        core.refresh();
        core.settle().await;
        assert_eq!(transport.count("/api/dashboard"), 2);
    }

    #[tokio::test]
    async fn notes_library_follows_filters_and_local_edits() {
        let (mut core, transport) = core_with(seeded("abc", "student", r#"{"name":"Ana"}"#));
        transport.reply(
            "/api/notes",
            json!([
                {"id": "n1", "subject": "math", "topic": "Algebra", "is_favorite": false},
                {"id": "n2", "subject": "physics", "topic": "Optics", "is_favorite": false}
            ]),
        );
        transport.reply("/api/notes/n1/favorite", json!({"note_id": "n1", "is_favorite": true}));
        transport.reply("/api/notes/n2", json!({"message": "Note deleted successfully"}));
        core.bootstrap();
        core.navigate("notes", None).unwrap();
        core.settle().await;
        assert_eq!(core.screen_state().visible_notes().len(), 2);

        core.perform(Action::ToggleFavorite { id: "n1".into() });
        core.perform(Action::DeleteNote { id: "n2".into() });
        core.settle().await;
        let notes = core.screen_state().visible_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["is_favorite"], true);
        assert_eq!(transport.tokens_for("/api/notes/n2"), vec![Some("abc".to_string())]);

        assert!(core.set_note_filter(NoteFilter {
            subject: Some(Subject::Math),
            favorites_only: true,
        }));
        core.settle().await;
        assert_eq!(transport.count("/api/notes"), 2);

        // A refresh keeps the chosen filter.
        core.refresh();
        core.settle().await;
        assert_eq!(transport.count("/api/notes"), 3);
        assert_eq!(core.screen_state().notes.filter.subject, Some(Subject::Math));
    }

    #[tokio::test]
    async fn notes_are_generated_and_opened_only_on_the_notes_screen() {
        let (mut core, transport) = core_with(seeded("abc", "student", r#"{"name":"Ana"}"#));
        transport.reply(
            "/api/notes/generate",
            json!({"note_id": "n5", "subject": "biology", "topic": "Cells", "content": "..."}),
        );
        transport.reply("/api/notes/n5", json!({"id": "n5", "topic": "Cells"}));
        core.bootstrap();
        core.settle().await;

        let request = NoteRequest {
            subject: Subject::Biology,
            topic: "Cells".into(),
            note_type: NoteType::Summary,
        };
        assert!(!core.generate_notes(request.clone()));
        assert!(!core.open_note("n5"));

        core.navigate("notes", None).unwrap();
        assert!(core.generate_notes(request));
        core.settle().await;
        assert_eq!(core.screen_state().open_note().and_then(note_id), Some("n5"));

        core.close_note();
        assert!(core.screen_state().open_note().is_none());
        assert!(core.open_note("n5"));
        core.settle().await;
        assert_eq!(core.screen_state().open_note().unwrap()["topic"], "Cells");
    }
}
