//! Example server startup with a checkpoint.
//!
//! Registers a few subsystem hooks and checkpoints with the in-process
//! facility, so the full prepare/restore sequence can be watched in the logs.
//!
//! # Usage
//!
//! ```bash
//! CHECKPOINT_PHASE=applications CHECKPOINT_DEBUG=true checkpoint-demo
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use checkpoint_launcher::{LaunchConfig, Launcher, init_tracing};
use checkpoint_phase::{FnHook, HookError, Phase};
use checkpoint_snapshot::{InProcessCheckpoint, SnapshotFailed, SnapshotHook};

/// Stands in for a transaction log that must be flushed before the image.
struct TransactionLog;

impl SnapshotHook for TransactionLog {
    fn prepare(&self) -> Result<(), HookError> {
        tracing::info!("transaction log flushed");
        Ok(())
    }

    fn abort_prepare(&self, cause: &SnapshotFailed) {
        tracing::warn!(%cause, "transaction log resumed after aborted checkpoint");
    }

    fn restore(&self) -> Result<(), HookError> {
        tracing::info!("transaction log reopened");
        Ok(())
    }

    fn name(&self) -> &str {
        "transaction-log"
    }
}

fn register_subsystems(launcher: &Launcher) -> Result<(), checkpoint_phase::PhaseError> {
    let phase = launcher.registry().current();

    let added = phase.add_multi_threaded_hook(Arc::new(
        FnHook::new("http-listener")
            .on_prepare(|| {
                tracing::info!("http listener closed");
                Ok(())
            })
            .on_restore(|| {
                tracing::info!("http listener reopened");
                Ok(())
            }),
    ))?;
    if !added {
        tracing::info!(phase = %phase.phase(), "http listener runs without checkpoint support");
    }

    let added = phase.add_single_threaded_hook(Arc::new(
        FnHook::new("timers")
            .on_prepare(|| {
                tracing::info!("timers suspended");
                Ok(())
            })
            .on_restore(|| {
                tracing::info!("timers rescheduled");
                Ok(())
            }),
    ))?;
    if !added {
        tracing::info!(phase = %phase.phase(), "timers run without checkpoint support");
    }

    Ok(())
}

fn main() -> ExitCode {
    let launcher = match Launcher::from_env(InProcessCheckpoint::new()) {
        Ok(launcher) => launcher.with_factory(|phase: Phase| -> Vec<Box<dyn SnapshotHook>> {
            if phase >= Phase::Applications {
                vec![Box::new(TransactionLog) as Box<dyn SnapshotHook>]
            } else {
                Vec::new()
            }
        }),
        Err(err) => {
            init_tracing(&LaunchConfig::default());
            tracing::error!(%err, "invalid checkpoint configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = register_subsystems(&launcher) {
        tracing::error!(%err, "hook registration failed");
        return ExitCode::FAILURE;
    }

    if let Err(err) = launcher.registry().on_restore(|| {
        tracing::info!("server ready");
        Ok(())
    }) {
        tracing::error!(%err, "startup action failed");
        return ExitCode::FAILURE;
    }

    match launcher.checkpoint() {
        Ok(true) => {
            tracing::info!(phase = %launcher.phase(), "checkpoint taken and restored");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            tracing::info!("started without checkpoint");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "checkpoint failed");
            ExitCode::FAILURE
        }
    }
}
