/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Headless driver: runs a shell against the in-memory document and prints
//! the resulting cache status. Used to smoke-test a deployment's menu, session
//! and page endpoints.

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;

use bpaf::Bpaf;
use log::{error, info, warn};
use serde_json::{Value, json};

use crate::model::tab::TabId;
use crate::prefs::{PrefsError, ShellPrefs};
use crate::services::auth::{AuthError, SessionState, check_session};
use crate::services::menu_source::{HttpMenuSource, MenuOrigin};
use crate::services::page_fetch::{DirectoryPageFetcher, HttpPageFetcher, PageFetcher};
use crate::shell::host::memory::InMemoryDocument;
use crate::shell::lifecycle::MaterializerKind;
use crate::shell::runtime::diagnostics::DiagnosticsLog;
use crate::shell::tab_controller::{ShellError, ShellHandle, Shortcut};

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
/// Drive a tab shell headlessly and report its page cache.
pub struct CliOptions {
    /// Preferences file (TOML)
    #[bpaf(long, short('c'), argument("PATH"))]
    pub config: Option<PathBuf>,

    /// Origin serving the menu, session and page endpoints
    #[bpaf(long("base-url"), argument("URL"))]
    pub base_url: Option<String>,

    /// Read pages from this directory instead of over HTTP
    #[bpaf(long("pages-dir"), argument("DIR"))]
    pub pages_dir: Option<PathBuf>,

    /// Materialization strategy: injection or frame
    #[bpaf(long, argument("KIND"))]
    pub materializer: Option<MaterializerKind>,

    /// Do not check for an active session before starting
    #[bpaf(long("skip-auth"), switch)]
    pub skip_auth: bool,

    /// Log filter in env_logger syntax, e.g. "debug" or "tabshell=trace"
    #[bpaf(long("log-filter"), argument("FILTER"))]
    pub log_filter: Option<String>,

    /// open:ID close:ID retry:ID next close-all status list clear
    #[bpaf(positional("COMMAND"))]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(TabId),
    Close(TabId),
    Retry(TabId),
    Next,
    CloseAll,
    Status,
    List,
    Clear,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let with_id = |id: &str, build: fn(TabId) -> Self| {
            if id.is_empty() {
                Err(format!("'{raw}' needs a page id"))
            } else {
                Ok(build(TabId::from(id)))
            }
        };
        match raw.split_once(':') {
            Some(("open", id)) => with_id(id, Self::Open),
            Some(("close", id)) => with_id(id, Self::Close),
            Some(("retry", id)) => with_id(id, Self::Retry),
            Some(_) => Err(format!("unknown command '{raw}'")),
            None => match raw {
                "next" => Ok(Self::Next),
                "close-all" => Ok(Self::CloseAll),
                "status" => Ok(Self::Status),
                "list" => Ok(Self::List),
                "clear" => Ok(Self::Clear),
                _ => Err(format!("unknown command '{raw}'")),
            },
        }
    }
}

#[derive(Debug)]
pub enum CliError {
    Prefs(PrefsError),
    Command(String),
    Runtime(std::io::Error),
    Auth(AuthError),
    LoginRequired(String),
    NoPageSource,
    Shell(ShellError),
    CommandsFailed(usize),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefs(err) => write!(f, "{err}"),
            Self::Command(message) => write!(f, "{message}"),
            Self::Runtime(err) => write!(f, "cannot start the async runtime: {err}"),
            Self::Auth(err) => write!(f, "{err}"),
            Self::LoginRequired(redirect) => {
                write!(f, "no active session; sign in at {redirect} or pass --skip-auth")
            },
            Self::NoPageSource => write!(f, "pass --base-url or --pages-dir to serve pages"),
            Self::Shell(err) => write!(f, "{err}"),
            Self::CommandsFailed(count) => write!(f, "{count} command(s) failed"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<PrefsError> for CliError {
    fn from(err: PrefsError) -> Self {
        Self::Prefs(err)
    }
}

impl From<AuthError> for CliError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<ShellError> for CliError {
    fn from(err: ShellError) -> Self {
        Self::Shell(err)
    }
}

pub fn main() {
    let options = cli_options().run();
    init_logging(options.log_filter.as_deref());

    if let Err(err) = run(&options) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn init_logging(filter: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(filter) = filter {
        builder.parse_filters(filter);
    }
    // A logger may already be installed when embedded.
    let _ = builder.try_init();
}

fn run(options: &CliOptions) -> Result<(), CliError> {
    let prefs = load_prefs(options)?;
    let commands = options
        .commands
        .iter()
        .map(|raw| raw.parse())
        .collect::<Result<Vec<Command>, _>>()
        .map_err(CliError::Command)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let (report, failures) = runtime.block_on(drive(&prefs, options, &commands))?;
    println!("{report:#}");

    if failures > 0 {
        return Err(CliError::CommandsFailed(failures));
    }
    Ok(())
}

pub fn load_prefs(options: &CliOptions) -> Result<ShellPrefs, PrefsError> {
    let mut prefs = match &options.config {
        Some(path) => ShellPrefs::load(path)?,
        None => ShellPrefs::default(),
    };
    prefs.apply_env_overrides();
    if let Some(base) = &options.base_url {
        prefs.endpoints.base_url = Some(base.clone());
    }
    if let Some(kind) = options.materializer {
        prefs.materializer = kind;
    }
    prefs.validate()?;
    Ok(prefs)
}

/// Returns the final report and the number of commands that failed.
async fn drive(
    prefs: &ShellPrefs,
    options: &CliOptions,
    commands: &[Command],
) -> Result<(Value, usize), CliError> {
    let mut diagnostics = DiagnosticsLog::install();
    let base = prefs.base_url()?;

    if !options.skip_auth
        && let Some(base) = &base
    {
        let client = reqwest::Client::new();
        let session = check_session(
            &client,
            base,
            &prefs.endpoints.auth_user,
            &prefs.endpoints.login_page,
        )
        .await?;
        match session {
            SessionState::Authenticated(user) => info!("signed in as {}", user.display_name()),
            SessionState::LoginRequired { redirect } => {
                return Err(CliError::LoginRequired(redirect));
            },
        }
    }

    let fetcher: Rc<dyn PageFetcher> = match (&options.pages_dir, &base) {
        (Some(dir), _) => Rc::new(DirectoryPageFetcher::new(dir.clone())),
        (None, Some(base)) => Rc::new(HttpPageFetcher::new(base.clone())),
        (None, None) => return Err(CliError::NoPageSource),
    };
    let host = Rc::new(InMemoryDocument::new());
    let shell = ShellHandle::build(prefs, host, fetcher)?;

    let origin = match &base {
        Some(base) => {
            let endpoint = base.join(&prefs.endpoints.menus).map_err(|err| {
                PrefsError::Invalid(format!("menus endpoint '{}': {err}", prefs.endpoints.menus))
            })?;
            shell.load_menu(&HttpMenuSource::new(endpoint)).await
        },
        None => MenuOrigin::Fallback,
    };
    info!("using {origin:?} menu with the {} strategy", shell.kind());

    let mut failures = 0;
    for command in commands {
        if let Err(err) = run_command(&shell, command).await {
            warn!("{command:?} failed: {err}");
            failures += 1;
        }
    }

    diagnostics.drain();
    let report = json!({
        "menu": format!("{origin:?}").to_lowercase(),
        "status": shell.status_json(),
        "content": shell.content(),
        "diagnostics": diagnostics.summary_json(),
    });
    Ok((report, failures))
}

async fn run_command(shell: &ShellHandle, command: &Command) -> Result<(), ShellError> {
    match command {
        Command::Open(id) => shell.open_tab(id.as_str()).await.map(drop),
        Command::Close(id) => shell.close_tab(id.as_str()).await,
        Command::Retry(id) => shell.retry(id.as_str()).await,
        Command::Next => shell.handle_shortcut(Shortcut::NextTab).await,
        Command::CloseAll => {
            let closed = shell.close_all().await;
            info!("closed {closed} tabs");
            Ok(())
        },
        Command::Status => {
            println!("{}", shell.status_json());
            Ok(())
        },
        Command::List => {
            let ids: Vec<String> = shell.cached_ids().iter().map(TabId::to_string).collect();
            println!("{}", ids.join(" "));
            Ok(())
        },
        Command::Clear => {
            let cleared = shell.clear_cache();
            info!("cleared {cleared} cached pages");
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(commands: &[&str]) -> CliOptions {
        CliOptions {
            config: None,
            base_url: None,
            pages_dir: None,
            materializer: Some(MaterializerKind::Injection),
            skip_auth: true,
            log_filter: None,
            commands: commands.iter().map(|command| command.to_string()).collect(),
        }
    }

    #[test]
    fn test_commands_parse() {
        assert_eq!("open:tasks".parse(), Ok(Command::Open(TabId::from("tasks"))));
        assert_eq!("close-all".parse(), Ok(Command::CloseAll));
        assert!("open:".parse::<Command>().is_err());
        assert!("launch:tasks".parse::<Command>().is_err());
        assert!("reload".parse::<Command>().is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabshell.toml");
        std::fs::write(&path, "materializer = \"frame\"\nmax_tabs = 4\n").unwrap();

        let mut options = options(&[]);
        options.config = Some(path);
        options.base_url = Some("http://intranet.local/".into());
        let prefs = load_prefs(&options).unwrap();
        assert_eq!(prefs.materializer, MaterializerKind::Injection);
        assert_eq!(prefs.max_tabs, 4);
        assert_eq!(
            prefs.endpoints.base_url.as_deref(),
            Some("http://intranet.local/")
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut options = options(&[]);
        options.base_url = Some("intranet".into());
        assert!(matches!(load_prefs(&options), Err(PrefsError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_drive_serves_pages_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pages")).unwrap();
        std::fs::write(
            dir.path().join("pages/tasks.html"),
            "<style>.board{}</style><div class=\"board\"></div>",
        )
        .unwrap();

        let mut options = options(&["open:tasks", "open:reports"]);
        options.pages_dir = Some(dir.path().to_path_buf());
        let commands: Vec<Command> = options
            .commands
            .iter()
            .map(|raw| raw.parse().unwrap())
            .collect();
        let prefs = load_prefs(&options).unwrap();

        let (report, failures) = drive(&prefs, &options, &commands).await.unwrap();
        // "reports" has no file behind it.
        assert_eq!(failures, 1);
        assert_eq!(report["menu"], "fallback");
        assert_eq!(report["status"]["cached"], 1);
        assert_eq!(report["status"]["openTabs"], 2);
        assert_eq!(report["content"]["view"], "failed");
    }

    #[tokio::test]
    async fn test_drive_needs_a_page_source() {
        let options = options(&[]);
        let prefs = load_prefs(&options).unwrap();
        assert!(matches!(
            drive(&prefs, &options, &[]).await,
            Err(CliError::NoPageSource)
        ));
    }
}
