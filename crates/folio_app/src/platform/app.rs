use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use folio_core::{BookmarkStore, IdGenerator, PageScheduler, SnippetExtractor};
use folio_engine::{
    default_backend, ensure_storage_dir, EngineHandle, FileBookmarkStorage, PngDataUrlEncoder,
};
use folio_logging::{folio_info, folio_warn};

use super::commands::HELP;
use super::config::{AppConfig, CONFIG_FILENAME};
use super::logging;
use super::workspace::{Flow, Workspace};

/// How long the loop waits for input before draining engine events again.
const TICK: Duration = Duration::from_millis(20);

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn run_app() -> anyhow::Result<()> {
    let (config, config_error) = match AppConfig::load(Path::new(CONFIG_FILENAME)) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    logging::initialize(&config.log);
    if let Some(err) = config_error {
        folio_warn!("{}; using defaults", err);
    }
    folio_info!("folio starting, answers from {}", config.endpoint);

    ensure_storage_dir(&config.storage_dir)
        .with_context(|| format!("storage directory {:?}", config.storage_dir))?;
    let bookmarks = BookmarkStore::open(
        FileBookmarkStorage::new(config.storage_dir.clone()),
        IdGenerator::new("folder", now_millis),
    );
    let engine = EngineHandle::new(config.engine_settings(), default_backend())
        .context("could not start the engine")?;

    let mut workspace = Workspace::new(
        PageScheduler::new(config.render_scale),
        SnippetExtractor::new(IdGenerator::new("snip", now_millis)),
        bookmarks,
        Box::new(PngDataUrlEncoder),
    );

    // Stdin blocks, so it gets its own thread; dropping the sender signals EOF.
    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{HELP}")?;
    out.flush()?;

    loop {
        while let Some(event) = engine.try_recv() {
            workspace.handle_engine_event(event, &engine, &mut out)?;
        }
        match line_rx.recv_timeout(TICK) {
            Ok(line) => {
                if workspace.handle_line(&line, &engine, &mut out)? == Flow::Quit {
                    break;
                }
                out.flush()?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    folio_info!("folio shutting down");
    Ok(())
}
