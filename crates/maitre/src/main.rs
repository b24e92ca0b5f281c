//! A terminal shell for chatting with the storefront assistant.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use maitre::core::transcript::{Message, Role};
use maitre::{CatalogClient, SessionBuilder};
use maitre_gemini_model::{GeminiConfigBuilder, GeminiProvider};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

enum SessionEvent {
    Idle,
    Transcript(Vec<Message>),
}

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // The credential lives on this side of the wire, supplied by the
    // environment; it is never part of anything served to clients.
    let Ok(api_key) = env::var("GEMINI_API_KEY") else {
        eprintln!("GEMINI_API_KEY environment variable is not set");
        return;
    };

    let mut config = GeminiConfigBuilder::with_api_key(api_key);
    if let Ok(model) = env::var("GEMINI_MODEL") {
        config = config.with_model(model);
    }
    if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    let provider = GeminiProvider::new(config.build());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut builder = SessionBuilder::with_provider(provider)
        .with_knowledge_base(include_str!("./knowledge_base.md"))
        .on_update({
            let event_tx = event_tx.clone();
            move |snapshot| {
                event_tx.send(SessionEvent::Transcript(snapshot)).ok();
            }
        })
        .on_idle({
            let event_tx = event_tx.clone();
            move || {
                event_tx.send(SessionEvent::Idle).ok();
            }
        });
    match env::var("CATALOG_BASE_URL") {
        Ok(base_url) => {
            builder = builder.with_catalog(CatalogClient::new(base_url));
        }
        Err(_) => {
            info!("CATALOG_BASE_URL is not set, product lookup disabled");
        }
    }
    let session = builder.build();

    // The first transcript event carries the seeded greeting.
    if let Some(SessionEvent::Transcript(snapshot)) = event_rx.recv().await {
        if let Some(greeting) = snapshot.last() {
            println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                greeting.text.bright_white()
            );
        }
    }

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    'outer: loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        session.send_message(line);

        let mut progress_bar: Option<ProgressBar> = None;
        let mut rendered = String::new();
        let mut replied = false;

        // Input stays disabled until the turn ends: the prompt is only
        // printed again once the session reports idle.
        loop {
            if !replied {
                progress_bar
                    .get_or_insert_with(|| {
                        let progress_bar = ProgressBar::new_spinner();
                        progress_bar.set_style(progress_style.clone());
                        progress_bar.set_message("🤔 Thinking...");
                        progress_bar
                    })
                    .inc(1);
            }

            let tick = sleep(Duration::from_millis(100));
            let event = select! {
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break 'outer;
                    };
                    event
                },
                _ = tick => {
                    continue;
                }
            };

            match event {
                SessionEvent::Transcript(snapshot) => {
                    let Some(last) = snapshot.last() else {
                        continue;
                    };
                    if last.role != Role::Assistant || last.text.is_empty() {
                        continue;
                    }

                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    if !replied {
                        print!("{}🤖 ", BAR_CHAR.bright_cyan());
                        replied = true;
                    }

                    // The transcript reports the full reply text every
                    // time; print the new tail, or start over when the
                    // text was replaced wholesale (the apology path).
                    match last.text.strip_prefix(rendered.as_str()) {
                        Some(suffix) => {
                            print!("{}", suffix.bright_white());
                        }
                        None => {
                            println!();
                            print!(
                                "{}🤖 {}",
                                BAR_CHAR.bright_cyan(),
                                last.text.bright_white()
                            );
                        }
                    }
                    rendered = last.text.clone();
                    std::io::stdout().flush().unwrap();
                }
                SessionEvent::Idle => {
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    if replied {
                        println!();
                    }
                    break;
                }
            }
        }
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
