//! Operator console: stdin/stdout REPL over the dashboard.
//!
//! Lines are read on a background task and fed through an mpsc channel.
//! Output goes to stdout, prompts and logs to stderr. A poll rejected with
//! 401 interrupts the loop to renew the token or end the session.

pub mod command;
pub mod render;

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use secrecy::ExposeSecret;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::api::{HttpApi, WorkerApi};
use crate::auth::AuthManager;
use crate::config::ConsoleConfig;
use crate::dashboard::stats::{load_gallery, load_profile_stats, load_task_history};
use crate::dashboard::{PowerAction, Poller, Synchronizer, skills, spawn_poller};
use crate::error::{ActionError, Result};
use crate::session::{FileSessionStore, SessionStore};

pub use command::{Command, parse};

const NOT_LOGGED_IN: &str = "Not logged in. /login <email> <password> or /register <email> <password> <confirm>";

/// Console session: auth, dashboard and the poller while logged in.
pub struct Console {
    auth: Arc<AuthManager>,
    sync: Arc<Synchronizer>,
    poll_interval: Duration,
    poller: Option<Poller>,
}

impl Console {
    pub fn new(auth: Arc<AuthManager>, sync: Arc<Synchronizer>, poll_interval: Duration) -> Self {
        Self {
            auth,
            sync,
            poll_interval,
            poller: None,
        }
    }

    /// Build the console from configuration and restore any stored session.
    pub async fn from_config(config: &ConsoleConfig) -> Result<Self> {
        let session: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::open(config.session_file.clone()));
        let api: Arc<dyn WorkerApi> = Arc::new(HttpApi::from_config(config, Arc::clone(&session))?);
        let auth = Arc::new(AuthManager::new(Arc::clone(&api), session));
        let sync = Arc::new(Synchronizer::new(api).with_force_stop(config.force_stop));

        let mut console = Self::new(auth, sync, config.poll_interval);
        if console.auth.restore().await.is_some() {
            console.start_polling();
        }
        Ok(console)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    fn start_polling(&mut self) {
        if self.poller.is_none() {
            self.poller = Some(spawn_poller(Arc::clone(&self.sync), self.poll_interval));
        }
    }

    async fn end_session(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.shutdown().await;
        }
        self.sync.reset().await;
    }

    /// Greeting printed at startup.
    pub async fn greeting(&self) -> String {
        match self.auth.current_user().await {
            Some(user) => format!("Welcome back, {}. /help for commands.", user.handle()),
            None => format!("{NOT_LOGGED_IN}\n/help for commands."),
        }
    }

    /// Execute one command. `None` means the operator asked to quit.
    pub async fn handle(&mut self, command: Command) -> Option<String> {
        match command {
            Command::Quit => return None,
            Command::Help => return Some(render::help()),
            Command::Invalid(msg) => return Some(format!("{msg}\n\n{}", render::help())),
            Command::Login { email, password } => {
                return Some(match self.auth.login(&email, &password).await {
                    Ok(user) => {
                        self.sync.reset().await;
                        self.start_polling();
                        self.sync.refresh().await;
                        format!("Logged in as {}.", user.handle())
                    }
                    Err(e) => format!("Login failed: {e}"),
                });
            }
            Command::Register {
                email,
                password,
                confirm,
            } => {
                return Some(match self.auth.register(&email, &password, &confirm).await {
                    Ok(user) => {
                        self.sync.reset().await;
                        self.start_polling();
                        self.sync.refresh().await;
                        format!("Account created. Logged in as {}.", user.handle())
                    }
                    Err(e) => format!("Registration failed: {e}"),
                });
            }
            _ => {}
        }

        if !self.auth.is_authenticated().await {
            return Some(NOT_LOGGED_IN.to_string());
        }

        let reply = match self.run_authenticated(command).await {
            Ok(text) => text,
            Err(ActionError::Api(e)) if e.is_unauthorized() => self.recover_session().await,
            Err(e) => e.to_string(),
        };
        Some(reply)
    }

    async fn recover_session(&mut self) -> String {
        match self.auth.refresh().await {
            Ok(()) => "Session refreshed, please retry.".to_string(),
            Err(e) => {
                debug!(error = %e, "Token refresh failed");
                self.end_session().await;
                format!("Session expired. {NOT_LOGGED_IN}")
            }
        }
    }

    /// A background refresh was rejected as unauthorized. Renew the token
    /// and let the next poll retry, or end the session when the backend no
    /// longer accepts the refresh token.
    pub async fn on_auth_lost(&mut self) -> Option<String> {
        if !self.auth.is_authenticated().await {
            return None;
        }
        match self.auth.refresh().await {
            Ok(()) => {
                info!("Access token renewed after a rejected refresh");
                None
            }
            Err(e) if self.auth.is_authenticated().await => {
                warn!(error = %e, "Token renewal failed, will retry on the next rejection");
                None
            }
            Err(e) => {
                debug!(error = %e, "Token refresh failed");
                self.end_session().await;
                Some(format!("Session expired. {NOT_LOGGED_IN}"))
            }
        }
    }

    async fn run_authenticated(&mut self, command: Command) -> std::result::Result<String, ActionError> {
        let sync = Arc::clone(&self.sync);
        let text = match command {
            Command::Workers | Command::Stats => {
                let state = sync.snapshot().await;
                let user = self.auth.current_user().await;
                let header = render::header(&state, user.as_ref());
                if matches!(command, Command::Stats) {
                    header
                } else {
                    format!("{header}\n{}", render::workers(&state))
                }
            }
            Command::Select(id) => {
                sync.select_worker(id).await?;
                self.selected_view().await
            }
            Command::Spawn(name) => {
                let spawned = sync.spawn_worker(&name).await?;
                let mut text = format!(
                    "Spawned #{} {} [{}].",
                    spawned.worker.id, spawned.worker.name, spawned.worker.status
                );
                if let Some(password) = &spawned.display_password {
                    text.push_str(&format!(
                        "\nRemote desktop password (shown once): {}",
                        password.expose_secret()
                    ));
                }
                text
            }
            Command::Toggle(id) => match sync.toggle_worker(id).await {
                Some(PowerAction::Start) => format!("Starting #{id}."),
                Some(PowerAction::Stop) => format!("Stopping #{id}."),
                None => format!("Could not toggle #{id}; the next refresh shows its state."),
            },
            Command::Delete { id, force } => {
                if sync.delete_worker(id, force).await {
                    format!("Deleted #{id}.")
                } else {
                    format!("Could not delete #{id}; the next refresh shows its state.")
                }
            }
            Command::Task { skill, prompt } => {
                let skill = match skill.as_deref() {
                    Some(id) => Some(skills::find(id).ok_or_else(|| {
                        ActionError::UnknownSkill { id: id.to_string() }
                    })?),
                    None => None,
                };
                let state = sync.snapshot().await;
                if let Some(reason) = render::submit_blocked(state.selected_worker(), &prompt) {
                    return Ok(reason);
                }
                let task = sync.submit_task(&prompt, skill).await?;
                format!("Queued task #{} on worker #{}.", task.id, task.worker_id)
            }
            Command::TaskDelete(task_id) => {
                sync.delete_task(task_id).await?;
                format!("Deleted task #{task_id}.")
            }
            Command::Capture => {
                let shot = sync.capture_screenshot().await?;
                format!("Captured screenshot #{}: {}", shot.id, shot.s3_url)
            }
            Command::Shots(id) => {
                let id = self.target(id).await?;
                render::gallery(&load_gallery(sync.api().as_ref(), id).await?)
            }
            Command::History(id) => {
                let id = self.target(id).await?;
                render::history(&load_task_history(sync.api().as_ref(), id).await?)
            }
            Command::Detail(id) => {
                let id = self.target(id).await?;
                let worker = match sync.snapshot().await.worker(id).cloned() {
                    Some(worker) => worker,
                    None => sync.api().get_worker(id).await?,
                };
                render::detail(&worker)
            }
            Command::Output => self.output_view().await,
            Command::Scroll(rows) => {
                sync.scroll_log(rows);
                self.output_view().await
            }
            Command::Rows(rows) => {
                sync.resize_log(rows);
                self.output_view().await
            }
            Command::Latest => {
                sync.jump_to_latest();
                self.output_view().await
            }
            Command::Logout => {
                self.auth.logout().await;
                self.end_session().await;
                "Logged out.".to_string()
            }
            Command::Me => {
                let user = self.auth.current_user().await.ok_or(ActionError::NotLoggedIn)?;
                let stats = load_profile_stats(sync.api().as_ref()).await?;
                render::profile(&user, &stats)
            }
            Command::Passwd { current, new } => self.auth.change_password(&current, &new).await?,
            Command::Quit
            | Command::Help
            | Command::Invalid(_)
            | Command::Login { .. }
            | Command::Register { .. } => String::new(),
        };
        Ok(text)
    }

    /// Explicit id, or the selected worker.
    async fn target(&self, id: Option<i64>) -> std::result::Result<i64, ActionError> {
        match id {
            Some(id) => Ok(id),
            None => self
                .sync
                .snapshot()
                .await
                .selected_id
                .ok_or(ActionError::NoWorkerSelected),
        }
    }

    async fn selected_view(&self) -> String {
        let state = self.sync.snapshot().await;
        let cooldown = state
            .selected_id
            .and_then(|id| self.sync.capture_cooldown(id));
        format!(
            "{}\n\n{}",
            render::bezel(&state, cooldown),
            render::output(&state, &self.sync.log_view())
        )
    }

    async fn output_view(&self) -> String {
        let state = self.sync.snapshot().await;
        render::output(&state, &self.sync.log_view())
    }

    /// Read commands from stdin until `/quit` or EOF.
    pub async fn run(mut self) -> Result<()> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let mut input = Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|line| (line, rx))
        }));

        let auth_lost = self.sync.auth_lost();

        println!("{}", self.greeting().await);
        eprint!("> ");
        loop {
            tokio::select! {
                line = input.next() => {
                    let Some(line) = line else { break };
                    if line.trim().is_empty() {
                        eprint!("> ");
                        continue;
                    }
                    match self.handle(parse(&line)).await {
                        Some(reply) => println!("\n{reply}\n"),
                        None => break,
                    }
                    eprint!("> ");
                }
                _ = auth_lost.notified() => {
                    if let Some(notice) = self.on_auth_lost().await {
                        println!("\n{notice}\n");
                        eprint!("> ");
                    }
                }
            }
        }

        info!("Console closing");
        self.end_session().await;
        Ok(())
    }
}
