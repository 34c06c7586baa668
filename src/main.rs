#[cfg(test)]
mod test;

pub mod adapter;
pub mod args;
pub mod client;
pub mod error;
pub mod etc;
pub mod evaluate;
pub mod logsink;
pub mod report;
pub mod result;
pub mod sandbox;
pub mod script;
pub mod workspace;

use std::{error::Error, time};

use clap::Parser;
use tokio::sync::watch;

use crate::{
  adapter::Adapter,
  client::UiClient,
  evaluate::Evaluator,
  logsink::{FileSink, LogSink, TeeSink},
  result::SubmissionResult,
  sandbox::Engine,
  workspace::Workspace,
};

#[macro_use]
extern crate lazy_static;
extern crate log;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  let args = args::Args::parse();
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  // Anything failing from here to the loop is an unrecoverable startup
  // problem and exits non-zero.
  let cfg = etc::Cfg::load(&args.config_search_path)?;
  workspace::ensure_root(&cfg.workspace_root)?;
  let engine = Engine::connect(&cfg.docker_socket)?;
  engine.ping().await?;
  let ui = UiClient::new(&cfg)?;

  log::info!(
    "sterta-worker {} polling {} queue(s) at {}",
    args::build::PKG_VERSION,
    cfg.queue_names.len(),
    cfg.gui_url
  );
  log::debug!("config: {:?}", cfg);

  let (tx, rx) = watch::channel(false);
  tokio::spawn(async move {
    shutdown_signal().await;
    let _ = tx.send(true);
  });

  run_loop(&cfg, &ui, &engine, rx).await;
  log::info!("worker stopped");
  return Ok(());
}

async fn shutdown_signal() {
  use tokio::signal::unix::{signal, SignalKind};

  let ctrl_c = tokio::signal::ctrl_c();
  match signal(SignalKind::terminate()) {
    Ok(mut term) => {
      tokio::select! {
        _ = ctrl_c => {},
        _ = term.recv() => {},
      }
    }
    Err(e) => {
      log::warn!("SIGTERM handler unavailable: {}", e);
      let _ = ctrl_c.await;
    }
  }
  log::info!("shutdown signal received, finishing the current stage");
}

/// What one main-loop iteration amounted to.
enum Iteration {
  /// Every queue was empty.
  Idle,
  Done { anomalous: bool },
  /// The submission failed before a result could be evaluated or reported.
  Failed,
}

async fn run_loop(
  cfg: &etc::Cfg,
  ui: &UiClient,
  engine: &Engine,
  mut shutdown: watch::Receiver<bool>,
) {
  let adapter = Adapter::new(ui, cfg);

  while !*shutdown.borrow() {
    let ws = match Workspace::acquire(&cfg.workspace_root, &uuid::Uuid::new_v4().to_string()) {
      Ok(ws) => ws,
      Err(e) => {
        log::error!("workspace acquire failed: {}", e);
        sleep_or_shutdown(cfg.poll_interval, &mut shutdown).await;
        continue;
      }
    };

    match iteration(cfg, engine, &adapter, &ws, &shutdown).await {
      Iteration::Idle => {
        release(ws, false);
        sleep_or_shutdown(cfg.poll_interval, &mut shutdown).await;
      }
      Iteration::Done { anomalous } => {
        release(ws, cfg.debug_mode && anomalous);
      }
      Iteration::Failed => {
        release(ws, cfg.debug_mode);
      }
    }
  }
}

async fn iteration(
  cfg: &etc::Cfg,
  engine: &Engine,
  adapter: &Adapter<'_>,
  ws: &Workspace,
  shutdown: &watch::Receiver<bool>,
) -> Iteration {
  let sub = match adapter.fetch_submission(ws).await {
    Ok(None) => return Iteration::Idle,
    Ok(Some(sub)) => sub,
    Err(e) => {
      log::error!("submission fetch failed: {}", e);
      return Iteration::Failed;
    }
  };

  let sink: Box<dyn LogSink> = if cfg.debug_mode {
    Box::new(TeeSink::new(ws.logs_dir()))
  } else {
    Box::new(FileSink::new(ws.logs_dir()))
  };

  let result = match adapter.fetch_problem(&sub.problem_id, ws).await {
    Ok(problem) => {
      log::info!(
        "evaluating {} ({} tests) for {}",
        sub.id,
        problem.tests.len(),
        sub.submitted_by.as_deref().unwrap_or("-")
      );
      Evaluator::new(engine, cfg, sink.as_ref(), shutdown.clone())
        .run(ws, &sub, &problem)
        .await
    }
    Err(e) => {
      // The student still gets told what happened rather than a silently
      // vanished submission.
      log::error!("problem {} for {}: {}", sub.problem_id, sub.id, e);
      SubmissionResult::new(
        vec![],
        Some(format!("submission could not be evaluated: {}", e)),
        Some(sink.collect()),
      )
    }
  };

  if *shutdown.borrow() {
    log::warn!("shutdown aborted submission {}; not reported", sub.id);
    return Iteration::Done { anomalous: true };
  }

  adapter.report_result(&sub.id, &result).await;
  return Iteration::Done {
    anomalous: result.anomalous(),
  };
}

fn release(ws: Workspace, keep_for_debug: bool) {
  if let Err(e) = ws.release(keep_for_debug) {
    log::warn!("workspace release failed: {}", e);
  }
}

async fn sleep_or_shutdown(interval: time::Duration, shutdown: &mut watch::Receiver<bool>) {
  tokio::select! {
    _ = tokio::time::sleep(interval) => {},
    _ = shutdown.changed() => {},
  }
}
