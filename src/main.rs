use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use pitchside::config::AppConfig;
use pitchside::identity::{FirebaseAuth, IdentityProvider, LocalIdentity, TokenSource};
use pitchside::news::{NewsClient, NewsPayload};
use pitchside::router::{Route, RouteGuard, Router};
use pitchside::session::{SessionManager, seed_admin};
use pitchside::sports_api::SportsApi;
use pitchside::state::{AppState, Command, Delta, apply_delta};
use pitchside::store::{DocumentStore, FirestoreStore, SqliteStore};
use pitchside::worker::spawn_worker;

const HELP: &str = "\
commands:
  go <path>                      navigate (e.g. go /standings, go /admin/news)
  page <n>                       teams page for /teams and /players
  login <email> <password>       sign in
  logout                         sign out
  whoami                         show the session
  show                           print data for the current page
  news add <title> | <body> [| <image url>]
  news edit <id> <title> | <body> [| <image url>]
  news rm <id>
  logs                           print the activity log
  quit";

struct App {
    state: AppState,
    router: Router,
    session: SessionManager,
    cmd_tx: Option<Sender<Command>>,
    should_quit: bool,
    printed_logs: u64,
}

impl App {
    fn new(
        state: AppState,
        router: Router,
        session: SessionManager,
        cmd_tx: Option<Sender<Command>>,
    ) -> Self {
        Self {
            state,
            router,
            session,
            cmd_tx,
            should_quit: false,
            printed_logs: 0,
        }
    }

    fn on_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with('/') {
            self.navigate(line);
            return;
        }
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match cmd {
            "q" | "quit" | "exit" => self.should_quit = true,
            "help" | "?" => println!("{HELP}"),
            "go" => self.navigate(rest),
            "page" => match rest.parse::<u32>() {
                Ok(page) if page > 0 => {
                    self.state.teams_page = page;
                    let route = self.state.route.clone();
                    self.request_route_data(&route);
                }
                _ => self.state.push_log("[WARN] page needs a positive number"),
            },
            "login" => self.login(rest),
            "logout" => {
                if let Err(err) = self.session.logout() {
                    self.state.push_log(format!("[WARN] Logout failed: {err:#}"));
                }
                self.sync_session();
                if self.state.route.requires_admin() {
                    let here = self.state.route.full_path();
                    self.navigate(&here);
                }
            }
            "whoami" => self.print_session(),
            "show" => self.show(),
            "news" => self.news_command(rest),
            "logs" => {
                for line in &self.state.logs {
                    println!("{line}");
                }
            }
            other => self
                .state
                .push_log(format!("[INFO] Unknown command '{other}' (try help)")),
        }
    }

    fn navigate(&mut self, location: &str) {
        let route = match self.router.push(location) {
            Ok(route) => route.clone(),
            Err(err) => {
                self.state.push_log(format!("[WARN] Navigation failed: {err:#}"));
                return;
            }
        };
        self.state.push_log(format!("[INFO] At {route}"));
        self.state.route = route.clone();
        self.request_route_data(&route);
    }

    fn request_route_data(&mut self, route: &Route) {
        for cmd in self.state.commands_for_route(route) {
            self.send(cmd);
        }
    }

    fn send(&mut self, cmd: Command) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[INFO] Worker unavailable");
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Worker request failed");
        } else {
            self.state.pending += 1;
        }
    }

    fn login(&mut self, args: &str) {
        let mut parts = args.split_whitespace();
        let (Some(email), Some(password)) = (parts.next(), parts.next()) else {
            self.state.push_log("[WARN] usage: login <email> <password>");
            return;
        };
        match self.session.login(email, password) {
            Ok(identity) => {
                let who = identity.email.unwrap_or(identity.uid);
                self.state.push_log(format!("[INFO] Signed in as {who}"));
            }
            Err(err) => {
                self.state.push_log(format!("[WARN] {err:#}"));
                return;
            }
        }
        self.sync_session();
        if let Route::Login {
            redirect: Some(target),
        } = self.state.route.clone()
        {
            self.navigate(&target);
        }
    }

    fn sync_session(&mut self) {
        if let Err(err) = self.session.process_pending() {
            self.state.push_log(format!("[WARN] Session update failed: {err:#}"));
        }
    }

    fn news_command(&mut self, args: &str) {
        if self.state.route != Route::AdminNews {
            self.state.push_log("[WARN] Open /admin/news to edit news");
            return;
        }
        if !self.state.can_edit_news() {
            return;
        }
        let (verb, rest) = args.split_once(' ').unwrap_or((args, ""));
        let rest = rest.trim();
        match verb {
            "add" => match parse_payload(rest) {
                Some(payload) => {
                    self.send(Command::CreateNews(payload));
                    self.send(Command::ListNews);
                }
                None => self.state.push_log("[WARN] usage: news add <title> | <body>"),
            },
            "edit" => {
                let (id, body) = rest.split_once(' ').unwrap_or((rest, ""));
                match parse_payload(body) {
                    Some(payload) if !id.is_empty() => {
                        self.send(Command::UpdateNews {
                            id: id.to_string(),
                            payload,
                        });
                        self.send(Command::ListNews);
                    }
                    _ => self
                        .state
                        .push_log("[WARN] usage: news edit <id> <title> | <body>"),
                }
            }
            "rm" if !rest.is_empty() => self.send(Command::RemoveNews {
                id: rest.to_string(),
            }),
            _ => self.state.push_log("[WARN] usage: news add|edit|rm ..."),
        }
    }

    fn print_session(&self) {
        let session = self.state.session.snapshot();
        let admin = session.is_admin();
        let out = json!({
            "ready": session.ready,
            "uid": session.identity.as_ref().map(|i| i.uid.clone()),
            "email": session.identity.as_ref().and_then(|i| i.email.clone()),
            "role": session.role,
            "admin": admin,
        });
        print_json(&out);
    }

    fn show(&self) {
        let s = &self.state;
        let out = match &s.route {
            Route::Standings => s.standings.clone().unwrap_or(Value::Null),
            Route::Fixtures => s.fixtures.clone().unwrap_or(Value::Null),
            Route::Teams | Route::Players => s.teams.clone().unwrap_or(Value::Null),
            Route::Team { .. } => json!({
                "schedule": s.schedule.as_ref().map(|(_, v)| v.clone()),
                "squad": s.squad.as_ref().map(|(_, v)| v.clone()),
            }),
            Route::News | Route::AdminNews => serde_json::to_value(&s.news).unwrap_or(Value::Null),
            Route::NewsDetail { .. } => {
                serde_json::to_value(&s.news_detail).unwrap_or(Value::Null)
            }
            Route::Admin | Route::AdminSync => json!({
                "pending": s.pending,
                "news": s.news.len(),
            }),
            other => json!({ "route": other.name() }),
        };
        print_json(&out);
    }

    fn flush_logs(&mut self) {
        let fresh = self.state.log_total - self.printed_logs;
        let available = self.state.logs.len() as u64;
        let skip = available.saturating_sub(fresh) as usize;
        for line in self.state.logs.iter().skip(skip) {
            println!("{line}");
        }
        self.printed_logs = self.state.log_total;
    }
}

fn parse_payload(raw: &str) -> Option<NewsPayload> {
    let mut parts = raw.split('|').map(str::trim);
    let title = parts.next().filter(|s| !s.is_empty())?;
    let body = parts.next().unwrap_or_default();
    let image_url = parts.next().map(str::to_string);
    Some(NewsPayload {
        title: title.to_string(),
        body: body.to_string(),
        image_url,
        published_at: None,
    })
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("error: {err}"),
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(
        target: "pitchside",
        firebase_auth = config.uses_firebase_auth(),
        firestore = config.uses_firestore(),
        season = ?config.sports.season_id,
        "starting"
    );
    let (provider, tokens, local) = build_identity(&config);
    let store = build_store(&config, tokens)?;
    if let Some(local) = local {
        seed_local_admin(&config, &local, store.as_ref())?;
    }

    let session = SessionManager::start(store.clone(), provider.clone());
    let router = Router::new(RouteGuard::new(store.clone(), provider.clone()));

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let worker = spawn_worker(
        SportsApi::from_config(&config.sports),
        NewsClient::new(store.clone()),
        tx,
        cmd_rx,
    );

    let state = AppState::new(session.handle(), config.sports.season_id);
    let mut app = App::new(state, router, session, Some(cmd_tx));
    let input = spawn_input_reader();

    println!("pitchside - type 'help' for commands");
    let res = run_shell(&mut app, rx, input);

    app.cmd_tx = None;
    app.session.shutdown();
    let _ = worker.join();

    if let Err(err) = res {
        eprintln!("error: {err:#}");
    }
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pitchside=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

type IdentityParts = (
    Arc<dyn IdentityProvider>,
    Option<Arc<dyn TokenSource>>,
    Option<Arc<LocalIdentity>>,
);

fn build_identity(config: &AppConfig) -> IdentityParts {
    if let Some(auth) = FirebaseAuth::from_config(&config.firebase) {
        let auth = Arc::new(auth);
        let tokens: Arc<dyn TokenSource> = auth.clone();
        return (auth, Some(tokens), None);
    }
    let local = Arc::new(LocalIdentity::new());
    (local.clone(), None, Some(local))
}

fn build_store(
    config: &AppConfig,
    tokens: Option<Arc<dyn TokenSource>>,
) -> Result<Arc<dyn DocumentStore>> {
    if let Some(store) = FirestoreStore::from_config(&config.firebase, tokens) {
        tracing::info!(target: "pitchside", "using firestore document store");
        return Ok(Arc::new(store));
    }
    let store = match config.db_path.as_deref() {
        Some(path) => {
            tracing::info!(
                target: "pitchside",
                path = %path.display(),
                "using sqlite document store"
            );
            SqliteStore::open(path)?
        }
        None => SqliteStore::open_in_memory()?,
    };
    Ok(Arc::new(store))
}

fn seed_local_admin(
    config: &AppConfig,
    local: &LocalIdentity,
    store: &dyn DocumentStore,
) -> Result<()> {
    let Some(admin) = config.local_admin.as_ref() else {
        return Ok(());
    };
    seed_admin(store, local, &admin.email, &admin.password)?;
    Ok(())
}

fn spawn_input_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn run_shell(app: &mut App, rx: Receiver<Delta>, input: Receiver<String>) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    app.sync_session();
    app.navigate("/");
    prompt()?;

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }
        app.sync_session();
        app.flush_logs();

        match input.recv_timeout(tick_rate) {
            Ok(line) => {
                app.on_line(&line);
                app.flush_logs();
                if !app.should_quit {
                    prompt()?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => app.should_quit = true,
        }

        if app.should_quit {
            while app.state.pending > 0 {
                let Ok(delta) = rx.recv_timeout(tick_rate) else {
                    break;
                };
                apply_delta(&mut app.state, delta);
            }
            app.flush_logs();
            return Ok(());
        }
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush().context("flush stdout")
}
