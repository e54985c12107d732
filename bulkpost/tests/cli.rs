use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::TempDir;

fn write_posts(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    write(&path, contents).expect("Writing temp posts file failed");
    path
}

fn bulkpost() -> Command {
    let mut cmd = Command::cargo_bin("bulkpost").expect("Binary exists");
    cmd.env("BULKPOST_SUBMIT_LATENCY_MS", "0").env("RUST_LOG", "warn");
    cmd
}

#[test]
fn template_command_writes_csv_template() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("template.csv");

    bulkpost()
        .arg("template")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("template.csv"));

    let contents = std::fs::read_to_string(&out).expect("template written");
    assert!(contents.starts_with("title,content,subreddit,scheduled_time,flair"));
}

#[test]
fn validate_command_accepts_clean_file() {
    let dir = TempDir::new().unwrap();
    let posts = write_posts(
        &dir,
        "posts.csv",
        "title,subreddit,scheduled_time\nHello,rust,2099-01-01 10:00\nAgain,rust,\n",
    );

    bulkpost()
        .arg("validate")
        .arg("--file")
        .arg(&posts)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 of 2 rows are valid"));
}

#[test]
fn validate_command_reports_rejected_rows_and_fails() {
    let dir = TempDir::new().unwrap();
    let posts = write_posts(
        &dir,
        "posts.csv",
        "title,subreddit\nFine,rust\n,rust\nFlaired,programming\n",
    );
    let config = write_posts(
        &dir,
        "config.yaml",
        "validation:\n  require_flair_for_policies: true\n",
    );

    bulkpost()
        .arg("validate")
        .arg("--file")
        .arg(&posts)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stdout(
            predicate::str::contains("Row 2: Title is required").and(predicate::str::contains(
                "Row 3: r/programming requires a post flair",
            )),
        )
        .stderr(predicate::str::contains("1 of 3 rows are valid"));
}

#[test]
fn submit_command_prints_summary() {
    let dir = TempDir::new().unwrap();
    let posts = write_posts(
        &dir,
        "posts.csv",
        "title,subreddit\nFirst,rust\nSecond,webdev\nThird,rust\n",
    );
    let config = write_posts(
        &dir,
        "config.yaml",
        "submission:\n  reject_destinations: [webdev]\n",
    );

    bulkpost()
        .arg("submit")
        .arg("--file")
        .arg(&posts)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Bulk upload complete: 2 of 3 posts scheduled")
                .and(predicate::str::contains("\"failed\": 1")),
        );
}

#[test]
fn flairs_command_lists_policy() {
    bulkpost()
        .arg("flairs")
        .arg("--destination")
        .arg("r/programming")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"destination\": \"programming\"")
                .and(predicate::str::contains("Discussion"))
                .and(predicate::str::contains("\"custom_allowed\": false")),
        );
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use bulkpost::cli::{run, Cli, Commands};

    let dir = TempDir::new().unwrap();
    let cli = Cli {
        command: Commands::Template {
            out: Some(dir.path().join("template.csv")),
        },
    };

    run(cli).await.expect("template command succeeds");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
