use std::cell::Cell;
use std::process::Command;
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::join;
use serde_json::Value;
use tabshell::app::ContentState;
use tabshell::model::tab::{TabId, TabSetError};
use tabshell::prefs::ShellPrefs;
use tabshell::services::page_fetch::MemoryPageFetcher;
use tabshell::shell::host::NoticeLevel;
use tabshell::shell::host::memory::{FrameLoadMode, InMemoryDocument};
use tabshell::shell::lifecycle::{CleanupError, FrameMaterializer, InjectionMaterializer};
use tabshell::shell::tab_controller::{Shell, ShellError};

const PAGES: [&str; 12] = [
    "dashboard",
    "projects",
    "project-new",
    "project-templates",
    "project-archive",
    "tasks",
    "task-calendar",
    "task-timeline",
    "task-my",
    "reports",
    "menu-management",
    "settings",
];

fn fetcher() -> MemoryPageFetcher {
    PAGES.iter().fold(MemoryPageFetcher::new(), |fetcher, id| {
        fetcher.with_page(
            &format!("pages/{id}.html"),
            &format!(
                "<style>#{id} {{ color: red }}</style>\
                 <section id=\"{id}\">{id}</section>\
                 <script src=\"/js/{id}.js\"></script><script>start('{id}')</script>"
            ),
        )
    })
}

fn injection_shell(
    prefs: ShellPrefs,
) -> (Shell<InjectionMaterializer>, Rc<InMemoryDocument>, MemoryPageFetcher) {
    let host = Rc::new(InMemoryDocument::new());
    let fetcher = fetcher();
    let shell = Shell::with_injection(&prefs, host.clone(), Rc::new(fetcher.clone()))
        .expect("valid prefs");
    (shell, host, fetcher)
}

fn ids(shell: &Shell<InjectionMaterializer>) -> Vec<String> {
    shell
        .open_tab_ids()
        .iter()
        .map(|id| id.as_str().to_owned())
        .collect()
}

#[test]
fn headless_binary_reports_cache_status_scenario() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("pages")).unwrap();
    for id in ["tasks", "reports"] {
        std::fs::write(
            dir.path().join(format!("pages/{id}.html")),
            format!("<section>{id}</section><script>start('{id}')</script>"),
        )
        .unwrap();
    }

    let output = Command::new(env!("CARGO_BIN_EXE_tabshell"))
        .arg("--pages-dir")
        .arg(dir.path())
        .args(["--skip-auth", "--materializer", "injection"])
        .args(["open:tasks", "open:reports"])
        .output()
        .expect("run tabshell");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["menu"], "fallback");
    assert_eq!(report["status"]["openTabs"], 2);
    assert_eq!(report["status"]["cached"], 2);
    assert_eq!(report["status"]["active"], "reports");
    assert_eq!(report["status"]["strategy"], "injection");
}

#[test]
fn headless_binary_rejects_unknown_command_scenario() {
    let output = Command::new(env!("CARGO_BIN_EXE_tabshell"))
        .args(["--skip-auth", "launch:tasks"])
        .output()
        .expect("run tabshell");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn close_refocuses_previous_tab_scenario() {
    let (shell, _, _) = injection_shell(ShellPrefs::default());
    for id in ["dashboard", "tasks", "reports"] {
        shell.open_tab(id).await.unwrap();
    }

    shell.close_tab("tasks").await.unwrap();
    assert_eq!(ids(&shell), vec!["dashboard", "reports"]);
    assert_eq!(shell.active_tab(), Some(TabId::from("reports")));

    shell.close_tab("reports").await.unwrap();
    assert_eq!(ids(&shell), vec!["dashboard"]);
    assert_eq!(shell.active_tab(), Some(TabId::from("dashboard")));
    assert_eq!(
        shell.content(),
        ContentState::Page {
            id: TabId::from("dashboard")
        }
    );
}

#[tokio::test]
async fn open_tabs_stay_cached_over_capacity_scenario() {
    let prefs = ShellPrefs {
        max_cached_pages: 2,
        ..ShellPrefs::default()
    };
    let (shell, _, _) = injection_shell(prefs);
    for id in ["dashboard", "tasks", "reports"] {
        shell.open_tab(id).await.unwrap();
    }

    let status = shell.debug().status();
    assert_eq!(status.cached, 3);
    assert_eq!(status.max_cache, 2);
    assert_eq!(status.open_tabs, 3);
}

#[tokio::test]
async fn closed_page_is_evicted_first_scenario() {
    let prefs = ShellPrefs {
        max_cached_pages: 1,
        ..ShellPrefs::default()
    };
    let (shell, host, _) = injection_shell(prefs);
    shell.open_tab("tasks").await.unwrap();
    shell.close_tab("tasks").await.unwrap();
    assert_eq!(shell.cached_ids(), vec![TabId::from("tasks")]);

    shell.open_tab("reports").await.unwrap();
    assert_eq!(shell.cached_ids(), vec![TabId::from("reports")]);
    assert_eq!(host.nodes_owned_by("tasks"), 0);
    assert_eq!(host.nodes_owned_by("reports"), 3);
}

#[tokio::test]
async fn eleventh_tab_is_rejected_scenario() {
    let (shell, host, _) = injection_shell(ShellPrefs::default());
    for id in &PAGES[..10] {
        shell.open_tab(id).await.unwrap();
    }
    let before = ids(&shell);

    let result = shell.open_tab(PAGES[10]).await;
    assert_eq!(
        result,
        Err(ShellError::Tabs(TabSetError::LimitReached { max_tabs: 10 }))
    );
    assert_eq!(ids(&shell), before);
    assert_eq!(shell.active_tab(), Some(TabId::from(PAGES[9])));
    let notice = host.notices().pop().expect("limit notice");
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert_eq!(host.tab_strip().unwrap().count.open, 10);
}

#[tokio::test(start_paused = true)]
async fn concurrent_activation_fetches_once_scenario() {
    let (shell, host, fetcher) = injection_shell(ShellPrefs::default());
    fetcher.set_latency(Duration::from_millis(300));

    let (opened, activated) = join(shell.open_tab("tasks"), shell.activate("tasks")).await;
    assert!(opened.is_ok());
    assert!(activated.is_ok());
    assert_eq!(fetcher.request_count("pages/tasks.html"), 1);
    assert_eq!(host.nodes_owned_by("tasks"), 3);
    assert_eq!(shell.cached_ids(), vec![TabId::from("tasks")]);
}

#[tokio::test(start_paused = true)]
async fn stale_load_never_overwrites_active_page_scenario() {
    let (shell, host, fetcher) = injection_shell(ShellPrefs::default());
    shell.open_tab("dashboard").await.unwrap();
    fetcher.set_latency(Duration::from_millis(800));

    let slow = shell.open_tab("reports");
    let back = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shell.activate("dashboard").await
    };
    let (slow, back) = join(slow, back).await;
    assert!(slow.is_ok() && back.is_ok());

    assert_eq!(
        shell.content(),
        ContentState::Page {
            id: TabId::from("dashboard")
        }
    );
    assert_eq!(host.nodes_owned_by("reports"), 0);
    assert_eq!(host.nodes_owned_by("dashboard"), 3);
}

#[tokio::test(start_paused = true)]
async fn frame_timeout_leaves_no_frame_scenario() {
    let host = Rc::new(InMemoryDocument::new());
    host.set_frame_load_mode(FrameLoadMode::Manual);
    let shell: Shell<FrameMaterializer> =
        Shell::with_frames(&ShellPrefs::default(), host.clone()).unwrap();

    let result = shell.open_tab("tasks").await;
    assert!(matches!(result, Err(ShellError::Page(err)) if err.is_frame_failure()));
    assert!(host.frames().is_empty());
    assert!(shell.cached_ids().is_empty());
    assert!(matches!(shell.content(), ContentState::Failed { .. }));

    // The tab stays open, so a retry with a responsive frame succeeds.
    host.set_frame_load_mode(FrameLoadMode::Immediate);
    shell.retry("tasks").await.unwrap();
    assert_eq!(host.frames().len(), 1);
    assert_eq!(host.visible_frames().len(), 1);
}

#[tokio::test]
async fn failing_cleanup_does_not_block_teardown_scenario() {
    let (shell, host, _) = injection_shell(ShellPrefs::default());
    shell.open_tab("tasks").await.unwrap();
    shell.register_cleanup("tasks", || Err(CleanupError("chart still attached".into())));
    shell.register_cleanup("tasks", || panic!("grid destroy threw"));
    shell.register_cleanup("tasks", || Ok(()));

    shell.close_tab_evicting("tasks").await.unwrap();
    assert_eq!(host.nodes_owned_by("tasks"), 0);
    assert!(host.head_nodes().is_empty());
    assert_eq!(shell.cleanup_registry().pending("tasks"), 0);
    assert!(shell.cached_ids().is_empty());
}

#[tokio::test]
async fn switching_away_runs_cleanup_every_time_scenario() {
    let (shell, host, _) = injection_shell(ShellPrefs::default());
    let runs = Rc::new(Cell::new(0));

    for round in 1..=3 {
        shell.open_tab("tasks").await.unwrap();
        assert_eq!(host.nodes_owned_by("tasks"), 3);
        let counter = Rc::clone(&runs);
        shell.register_cleanup("tasks", move || {
            counter.set(counter.get() + 1);
            Ok(())
        });

        shell.open_tab("reports").await.unwrap();
        assert_eq!(host.nodes_owned_by("tasks"), 0);
        assert_eq!(runs.get(), round);
        assert_eq!(shell.cleanup_registry().pending("tasks"), 0);
    }
}

#[tokio::test]
async fn teardown_is_idempotent_scenario() {
    let (shell, host, _) = injection_shell(ShellPrefs::default());
    shell.open_tab("tasks").await.unwrap();
    shell.open_tab("reports").await.unwrap();

    assert!(shell.teardown("tasks"));
    assert!(!shell.teardown("tasks"));
    assert_eq!(host.nodes_owned_by("tasks"), 0);
    assert_eq!(host.nodes_owned_by("reports"), 3);
}
