//! Line-oriented front end over a [`Session`].
//!
//! [`parse_command`] turns one input line into a [`Command`];
//! [`App::execute`] runs it and returns the lines to print. Field
//! validation happens here, before anything reaches the orchestrator.

use taskdeck_proto::task::{Task, TaskDraft, TaskId, TaskUpdate, Timestamp};
use taskdeck_proto::validation::{validate_due_date, validate_task_description, validate_task_title};

use crate::auth::LocalAuth;
use crate::config::ClientConfig;
use crate::remote::RemoteTaskStore;
use crate::session::Session;
use crate::tasks::TaskSync;
use crate::tasks::views::{
    StatusFilter, classify_empty, filter_tasks, format_due_date, format_relative_time, is_overdue,
    status_counts,
};

/// Usage summary printed by `help`.
pub const HELP: &str = "\
commands:
  add <title> [| <description>]    create a task
  done <n> / undo <n>              mark a task completed / active
  edit <n> <title>                 rename a task
  note <n> <text|clear>            replace or clear a task's description
  show <n>                         show a task with its timestamps
  due <n> <minutes|clear>          set a due date relative to now, or clear it
  rm <n>                           delete a task
  ls [all|active|completed] [q]    list tasks, optionally filtered and searched
  counts                           tasks per status
  refresh                          reload tasks from the store
  export                           print tasks as JSON
  signup <email> <password>        create an account and sign in
  login <email> <password>         sign in
  logout                           sign out
  help                             show this text
  quit                             exit
<n> is the number shown by the last `ls`.";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        title: String,
        description: Option<String>,
    },
    SetCompleted {
        index: usize,
        completed: bool,
    },
    Rename {
        index: usize,
        title: String,
    },
    /// Replaces the description; an empty one clears it.
    Note {
        index: usize,
        description: String,
    },
    Show(usize),
    SetDue {
        index: usize,
        minutes: Option<u64>,
    },
    Remove(usize),
    List {
        filter: Option<StatusFilter>,
        query: String,
    },
    Counts,
    Refresh,
    Export,
    SignUp {
        email: String,
        password: String,
    },
    SignIn {
        email: String,
        password: String,
    },
    SignOut,
    Help,
    Quit,
}

/// Why an input line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("not a task number: {0}")]
    BadIndex(String),
}

/// Parses one line of input. Blank lines yield `None`.
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands or missing arguments.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(w, r)| (w, r.trim()));

    let command = match word {
        "" => return Ok(None),
        "add" => {
            let (title, description) = rest
                .split_once('|')
                .map_or((rest, None), |(t, d)| (t, Some(d.trim().to_string())));
            Command::Add {
                title: title.trim().to_string(),
                description,
            }
        }
        "done" | "undo" => Command::SetCompleted {
            index: parse_index(rest, "done <n> / undo <n>")?,
            completed: word == "done",
        },
        "edit" => {
            let (index, title) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Command::Rename {
                index: parse_index(index, "edit <n> <title>")?,
                title: title.trim().to_string(),
            }
        }
        "note" => {
            let usage = "note <n> <text|clear>";
            let (index, text) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage(usage))?;
            let description = match text.trim() {
                "clear" => String::new(),
                text => text.to_string(),
            };
            Command::Note {
                index: parse_index(index, usage)?,
                description,
            }
        }
        "show" => Command::Show(parse_index(rest, "show <n>")?),
        "due" => {
            let usage = "due <n> <minutes|clear>";
            let (index, when) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage(usage))?;
            let minutes = match when.trim() {
                "clear" => None,
                value => Some(value.parse().map_err(|_| CommandError::Usage(usage))?),
            };
            Command::SetDue {
                index: parse_index(index, usage)?,
                minutes,
            }
        }
        "rm" => Command::Remove(parse_index(rest, "rm <n>")?),
        "ls" => {
            let (first, remainder) = rest
                .split_once(char::is_whitespace)
                .map_or((rest, ""), |(f, r)| (f, r.trim()));
            match first.parse::<StatusFilter>() {
                Ok(filter) => Command::List {
                    filter: Some(filter),
                    query: remainder.to_string(),
                },
                Err(_) => Command::List {
                    filter: None,
                    query: rest.to_string(),
                },
            }
        }
        "counts" => Command::Counts,
        "refresh" => Command::Refresh,
        "export" => Command::Export,
        "signup" | "login" => {
            let (email, password) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage("signup|login <email> <password>"))?;
            let email = email.to_string();
            let password = password.trim().to_string();
            if word == "signup" {
                Command::SignUp { email, password }
            } else {
                Command::SignIn { email, password }
            }
        }
        "logout" => Command::SignOut,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_index(value: &str, usage: &'static str) -> Result<usize, CommandError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::BadIndex(value.to_string())),
    }
}

/// Shell state: the session, the auth provider, and the last listing.
pub struct App<R> {
    session: Session<R>,
    auth: LocalAuth,
    config: ClientConfig,
    /// Task ids in the order of the last `ls`, for `<n>` lookups.
    listing: Vec<TaskId>,
    /// Set by `quit`.
    pub should_quit: bool,
}

impl<R: RemoteTaskStore> App<R> {
    /// Creates the shell.
    #[must_use]
    pub const fn new(session: Session<R>, auth: LocalAuth, config: ClientConfig) -> Self {
        Self {
            session,
            auth,
            config,
            listing: Vec::new(),
            should_quit: false,
        }
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session<R> {
        &self.session
    }

    /// Restores the configured session, or starts signed out.
    pub async fn start(&mut self) -> Vec<String> {
        self.auth.restore(self.config.restored_identity());
        self.sync_auth().await;
        match self.auth.current().identity {
            Some(identity) => vec![format!(
                "signed in as {}",
                identity.email.as_deref().unwrap_or(&identity.uid)
            )],
            None => vec!["not signed in (use `signup` or `login`)".to_string()],
        }
    }

    /// Runs one command and returns the lines to print.
    pub async fn execute(&mut self, command: Command) -> Vec<String> {
        let result = match command {
            Command::Add { title, description } => self.add(&title, description).await,
            Command::SetCompleted { index, completed } => {
                self.update(index, TaskUpdate::completed(completed)).await
            }
            Command::Rename { index, title } => match validate_task_title(&title) {
                Ok(()) => self.update(index, TaskUpdate::title(title)).await,
                Err(err) => Err(err.to_string()),
            },
            Command::Note { index, description } => {
                match validate_task_description(&description) {
                    Ok(()) => {
                        let update = TaskUpdate {
                            description: Some(description),
                            ..TaskUpdate::default()
                        };
                        self.update(index, update).await
                    }
                    Err(err) => Err(err.to_string()),
                }
            }
            Command::Show(index) => self.show(index),
            Command::SetDue { index, minutes } => self.set_due(index, minutes).await,
            Command::Remove(index) => self.remove(index).await,
            Command::List { filter, query } => self.list(filter, &query),
            Command::Counts => self.counts(),
            Command::Refresh => self.refresh().await,
            Command::Export => self.export(),
            Command::SignUp { email, password } => {
                match self.auth.sign_up(&email, &password) {
                    Ok(_) => self.signed_in().await,
                    Err(err) => Err(err.to_string()),
                }
            }
            Command::SignIn { email, password } => {
                match self.auth.sign_in(&email, &password) {
                    Ok(_) => self.signed_in().await,
                    Err(err) => Err(err.to_string()),
                }
            }
            Command::SignOut => {
                self.auth.sign_out();
                self.sync_auth().await;
                Ok(vec!["signed out".to_string()])
            }
            Command::Help => Ok(HELP.lines().map(str::to_string).collect()),
            Command::Quit => {
                self.should_quit = true;
                Ok(Vec::new())
            }
        };
        result.unwrap_or_else(|message| vec![format!("error: {message}")])
    }

    /// Follows the auth provider and loads the list once for a new identity.
    async fn sync_auth(&mut self) {
        let state = self.auth.current();
        self.session.apply_auth(&state).await;
        match self.session.tasks().cloned() {
            Some(sync) => {
                if !sync.store().read(|s| s.initialized) {
                    // Failures are already recorded in state.
                    let _ = sync.fetch_tasks().await;
                }
            }
            None => self.listing.clear(),
        }
    }

    async fn signed_in(&mut self) -> Result<Vec<String>, String> {
        self.listing.clear();
        self.sync_auth().await;
        let who = self
            .auth
            .current()
            .identity
            .and_then(|identity| identity.email)
            .unwrap_or_default();
        Ok(vec![format!("signed in as {who}")])
    }

    fn sync(&self) -> Result<TaskSync<R>, String> {
        self.session
            .tasks()
            .cloned()
            .ok_or_else(|| "sign in first (`signup` or `login`)".to_string())
    }

    fn task_at(&self, index: usize) -> Result<TaskId, String> {
        index
            .checked_sub(1)
            .and_then(|i| self.listing.get(i))
            .cloned()
            .ok_or_else(|| format!("no task #{index} in the last listing (run `ls`)"))
    }

    async fn add(&mut self, title: &str, description: Option<String>) -> Result<Vec<String>, String> {
        validate_task_title(title).map_err(|e| e.to_string())?;
        if let Some(description) = &description {
            validate_task_description(description).map_err(|e| e.to_string())?;
        }
        let sync = self.sync()?;
        let mut draft = TaskDraft::new(title);
        draft.description = description.filter(|d| !d.is_empty());
        let task = sync.create_task(draft).await.map_err(|e| e.to_string())?;
        Ok(vec![format!("added: {}", task.title)])
    }

    async fn update(&mut self, index: usize, update: TaskUpdate) -> Result<Vec<String>, String> {
        let sync = self.sync()?;
        let id = self.task_at(index)?;
        match sync.update_task(&id, update).await.map_err(|e| e.to_string())? {
            Some(task) => Ok(vec![self.render(index, &task, Timestamp::now())]),
            None => Ok(vec![format!("task #{index} is gone")]),
        }
    }

    async fn set_due(&mut self, index: usize, minutes: Option<u64>) -> Result<Vec<String>, String> {
        let due_date = match minutes {
            Some(minutes) => {
                let now = Timestamp::now();
                Some(validate_due_date(now.plus_minutes(minutes), now).map_err(|e| e.to_string())?)
            }
            None => None,
        };
        let update = TaskUpdate {
            due_date: Some(due_date),
            ..TaskUpdate::default()
        };
        self.update(index, update).await
    }

    async fn remove(&mut self, index: usize) -> Result<Vec<String>, String> {
        let sync = self.sync()?;
        let id = self.task_at(index)?;
        sync.delete_task(&id).await.map_err(|e| e.to_string())?;
        self.listing.retain(|listed| *listed != id);
        Ok(vec![format!("deleted #{index}")])
    }

    async fn refresh(&mut self) -> Result<Vec<String>, String> {
        let sync = self.sync()?;
        sync.clear_error();
        let tasks = sync.fetch_tasks().await.map_err(|e| e.to_string())?;
        Ok(vec![format!("{} task(s) loaded", tasks.len())])
    }

    fn list(&mut self, filter: Option<StatusFilter>, query: &str) -> Result<Vec<String>, String> {
        self.sync()?;
        let filter = filter.unwrap_or(self.config.default_filter);
        let state = self.session.store().state();
        let now = Timestamp::now();

        let mut lines = Vec::new();
        if let Some(error) = &state.error {
            lines.push(format!("sync problem: {error} (`refresh` to retry)"));
        }
        if !state.initialized {
            lines.push("loading...".to_string());
            return Ok(lines);
        }
        if let Some(empty) = classify_empty(&state.tasks, filter, query) {
            self.listing.clear();
            lines.push(empty.title().to_string());
            return Ok(lines);
        }

        let shown = filter_tasks(&state.tasks, filter, query);
        self.listing = shown.iter().map(|task| task.id.clone()).collect();
        lines.extend(
            shown
                .iter()
                .enumerate()
                .map(|(i, task)| self.render(i + 1, task, now)),
        );
        Ok(lines)
    }

    fn show(&self, index: usize) -> Result<Vec<String>, String> {
        self.sync()?;
        let id = self.task_at(index)?;
        let task = self
            .session
            .store()
            .read(|state| state.get(&id).cloned())
            .ok_or_else(|| format!("task #{index} is gone"))?;
        let now = Timestamp::now();

        let mut lines = vec![format!(
            "[{}] {}",
            if task.completed { "x" } else { " " },
            task.title
        )];
        if !task.description.is_empty() {
            lines.push(format!("  {}", task.description));
        }
        lines.push(format!(
            "  created {}",
            format_relative_time(task.created_at, now)
        ));
        lines.push(format!(
            "  updated {}",
            format_relative_time(task.updated_at, now)
        ));
        if let Some(completed_at) = task.completed_at {
            lines.push(format!(
                "  completed {}",
                format_relative_time(completed_at, now)
            ));
        }
        if let Some(due) = task.due_date {
            let flag = if is_overdue(&task, now) { ", overdue" } else { "" };
            lines.push(format!(
                "  due {} ({}{flag})",
                format_due_date(due, &self.config.timestamp_format),
                format_relative_time(due, now)
            ));
        }
        Ok(lines)
    }

    fn counts(&self) -> Result<Vec<String>, String> {
        self.sync()?;
        let counts = self.session.store().read(|state| status_counts(&state.tasks));
        Ok(vec![format!(
            "all {}  active {}  completed {}",
            counts.all, counts.active, counts.completed
        )])
    }

    fn export(&self) -> Result<Vec<String>, String> {
        self.sync()?;
        let tasks = self.session.store().state().tasks;
        let json = serde_json::to_string_pretty(&tasks).map_err(|e| e.to_string())?;
        Ok(json.lines().map(str::to_string).collect())
    }

    fn render(&self, number: usize, task: &Task, now: Timestamp) -> String {
        let mark = if task.completed { "x" } else { " " };
        let mut line = format!("{number:>3}. [{mark}] {}", task.title);
        if !task.description.is_empty() {
            line.push_str(&format!(" - {}", task.description));
        }
        if let Some(due) = task.due_date {
            let flag = if is_overdue(task, now) { ", overdue" } else { "" };
            line.push_str(&format!(
                " (due {}{flag})",
                format_due_date(due, &self.config.timestamp_format)
            ));
        }
        line.push_str(&format!(
            " · updated {}",
            format_relative_time(task.updated_at, now)
        ));
        line
    }
}
