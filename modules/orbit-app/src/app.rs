//! Interactive command loop. Reads commands from stdin, drives the store
//! through the presentation layer, and applies background profile fetches
//! back on the loop as they complete.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use orbit_core::{present, DisplaySink, EdgeKind, FetchError, NoticeLevel, ProfileFields, TrackerStore};

use crate::console::ConsoleSink;

/// Completion of a background profile fetch, applied on the main loop.
pub enum AppEvent {
    ProfileFetched {
        login: String,
        result: Result<ProfileFields, FetchError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Use(String),
    Show(EdgeKind),
    Refresh(EdgeKind),
    NotFollowingBack,
    Info(String),
    Detail(String),
    Help,
    Quit,
}

/// Parse one input line. Errors are operator-facing messages.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".to_string());
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments for `{head}`"));
    }

    let command = match (head, arg) {
        ("user", Some(login)) => Command::Use(login.to_string()),
        ("user", None) => return Err("usage: user <login>".to_string()),
        ("followers", None) => Command::Show(EdgeKind::Followers),
        ("following", None) => Command::Show(EdgeKind::Following),
        ("refresh", Some("followers")) => Command::Refresh(EdgeKind::Followers),
        ("refresh", Some("following")) => Command::Refresh(EdgeKind::Following),
        ("refresh", _) => return Err("usage: refresh <followers|following>".to_string()),
        ("nfb", None) => Command::NotFollowingBack,
        ("info", Some(login)) => Command::Info(login.to_string()),
        ("info", None) => return Err("usage: info <login>".to_string()),
        ("detail", Some(login)) => Command::Detail(login.to_string()),
        ("detail", None) => return Err("usage: detail <login>".to_string()),
        ("help", None) => Command::Help,
        ("quit" | "exit", None) => Command::Quit,
        ("followers" | "following" | "nfb" | "help" | "quit" | "exit", Some(_)) => {
            return Err(format!("`{head}` takes no argument"))
        }
        _ => return Err(format!("unknown command `{head}` (try `help`)")),
    };
    Ok(command)
}

pub struct App {
    store: TrackerStore,
    sink: ConsoleSink<std::io::Stdout>,
    subject: Option<String>,
    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,
}

impl App {
    pub fn new(
        store: TrackerStore,
        sink: ConsoleSink<std::io::Stdout>,
        initial_user: Option<String>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(16);
        let mut app = Self {
            store,
            sink,
            subject: None,
            events_tx,
            events_rx,
        };
        match initial_user {
            Some(login) => app.set_subject(login),
            None => {
                if let Some(login) = app.store.last_subject().map(str::to_string) {
                    app.sink.notify(
                        NoticeLevel::Info,
                        &format!("Resuming with {login} from the last session."),
                    );
                    app.subject = Some(login);
                }
            }
        }
        app
    }

    pub async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        self.prompt()?;
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if !self.handle_line(line.trim()).await {
                        break;
                    }
                    self.prompt()?;
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                    self.prompt()?;
                }
            }
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return true;
        }
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(message) => {
                self.sink.notify(NoticeLevel::Warning, &message);
                return true;
            }
        };
        debug!(?command, "Dispatching command");

        match command {
            Command::Quit => return false,
            Command::Help => self.show_help(),
            Command::Use(login) => self.set_subject(login),
            Command::Show(kind) => self.show(kind, false).await,
            Command::Refresh(kind) => self.show(kind, true).await,
            Command::NotFollowingBack => {
                if let Some(subject) = self.current_subject() {
                    present::show_not_following_back(&mut self.store, &mut self.sink, &subject)
                        .await;
                }
            }
            Command::Info(login) => {
                if !present::show_cached_profile(&self.store, &mut self.sink, &login) {
                    self.sink.notify(
                        NoticeLevel::Info,
                        &format!("No cached details for {login}. Use `detail {login}` to fetch them."),
                    );
                }
            }
            Command::Detail(login) => self.request_detail(login),
        }
        true
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ProfileFetched { login, result } => {
                present::apply_profile_result(&mut self.store, &mut self.sink, &login, result);
            }
        }
    }

    fn set_subject(&mut self, login: String) {
        if let Some(err) = self.store.set_last_subject(&login) {
            self.sink
                .notify(NoticeLevel::Error, &format!("Could not save data: {err}"));
        }
        self.sink
            .notify(NoticeLevel::Info, &format!("Tracking {login}."));
        self.subject = Some(login);
    }

    async fn show(&mut self, kind: EdgeKind, refresh: bool) {
        if let Some(subject) = self.current_subject() {
            present::show_edges(&mut self.store, &mut self.sink, &subject, kind, refresh).await;
        }
    }

    /// Fetch details in the background unless they are already cached; the
    /// result comes back through the event channel.
    fn request_detail(&mut self, login: String) {
        if let Some(detail) = self.store.cached_profile(&login) {
            self.sink.show_detail(&login, detail);
            return;
        }
        self.sink
            .notify(NoticeLevel::Info, &format!("Fetching details for {login}..."));
        let source = self.store.source();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = source.profile(&login).await;
            let _ = tx.send(AppEvent::ProfileFetched { login, result }).await;
        });
    }

    fn current_subject(&mut self) -> Option<String> {
        match &self.subject {
            Some(subject) => Some(subject.clone()),
            None => {
                self.sink.notify(
                    NoticeLevel::Warning,
                    "Please enter a GitHub username first (`user <login>`).",
                );
                None
            }
        }
    }

    fn show_help(&mut self) {
        self.sink.plain(
            "Commands:\n  \
             user <login>                  set the tracked account\n  \
             followers                     show followers (cached when available)\n  \
             following                     show accounts being followed\n  \
             refresh <followers|following> force a fetch and reconcile\n  \
             nfb                           accounts followed that don't follow back\n  \
             info <login>                  show cached profile details\n  \
             detail <login>                fetch (or show cached) profile details\n  \
             help                          this text\n  \
             quit                          exit",
        );
    }

    fn prompt(&mut self) -> Result<()> {
        use std::io::Write;
        let mut out = std::io::stdout();
        write!(out, "orbit> ")?;
        out.flush()?;
        Ok(())
    }
}
