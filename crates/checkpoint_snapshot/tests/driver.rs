//! End-to-end ordering and rollback tests for `CheckpointDriver`.
//!
//! Every participant writes to a shared log so each test can assert the
//! exact sequence of prepare, restore and abort callbacks.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use checkpoint_phase::{CheckpointHook, FnHook, HookError, Phase, PhaseRegistry};
use checkpoint_snapshot::{
    Checkpoint, CheckpointDriver, InProcessCheckpoint, SnapshotFailed, SnapshotFailedKind,
    SnapshotHook, SnapshotResult, UnsupportedCheckpoint,
};

type Log = Arc<Mutex<Vec<String>>>;

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ─────────────────────────────────────────────────────────────────────────────
// Test participants
// ─────────────────────────────────────────────────────────────────────────────

struct RecordingSnapshotHook {
    name: &'static str,
    log: Log,
    fail_prepare: bool,
    fail_restore: bool,
}

impl RecordingSnapshotHook {
    fn boxed(name: &'static str, log: &Log) -> Box<dyn SnapshotHook> {
        Box::new(Self {
            name,
            log: Arc::clone(log),
            fail_prepare: false,
            fail_restore: false,
        })
    }

    fn failing_prepare(name: &'static str, log: &Log) -> Box<dyn SnapshotHook> {
        Box::new(Self {
            name,
            log: Arc::clone(log),
            fail_prepare: true,
            fail_restore: false,
        })
    }

    fn failing_restore(name: &'static str, log: &Log) -> Box<dyn SnapshotHook> {
        Box::new(Self {
            name,
            log: Arc::clone(log),
            fail_prepare: false,
            fail_restore: true,
        })
    }

    fn push(&self, event: &str) {
        self.log.lock().unwrap().push(format!("{event} {}", self.name));
    }
}

impl SnapshotHook for RecordingSnapshotHook {
    fn prepare(&self) -> Result<(), HookError> {
        self.push("prepare");
        if self.fail_prepare {
            return Err(HookError::new(self.name, "prepare refused"));
        }
        Ok(())
    }

    fn abort_prepare(&self, _cause: &SnapshotFailed) {
        self.push("abort-prepare");
    }

    fn restore(&self) -> Result<(), HookError> {
        self.push("restore");
        if self.fail_restore {
            return Err(HookError::new(self.name, "restore refused"));
        }
        Ok(())
    }

    fn abort_restore(&self, _cause: &SnapshotFailed) {
        self.push("abort-restore");
    }

    fn name(&self) -> &str {
        self.name
    }
}

fn phase_hook(name: &'static str, log: &Log) -> Arc<FnHook> {
    let prepare_log = Arc::clone(log);
    let restore_log = Arc::clone(log);
    let failed_log = Arc::clone(log);
    Arc::new(
        FnHook::new(name)
            .on_prepare(move || {
                prepare_log.lock().unwrap().push(format!("prepare {name}"));
                Ok(())
            })
            .on_restore(move || {
                restore_log.lock().unwrap().push(format!("restore {name}"));
                Ok(())
            })
            .on_checkpoint_failed(move || {
                failed_log.lock().unwrap().push(format!("failed {name}"));
            }),
    )
}

fn failing_restore_phase_hook(name: &'static str, log: &Log) -> Arc<FnHook> {
    let prepare_log = Arc::clone(log);
    let restore_log = Arc::clone(log);
    Arc::new(
        FnHook::new(name)
            .on_prepare(move || {
                prepare_log.lock().unwrap().push(format!("prepare {name}"));
                Ok(())
            })
            .on_restore(move || {
                restore_log.lock().unwrap().push(format!("restore {name}"));
                Err(HookError::new(name, "socket rebind failed"))
            }),
    )
}

fn defer_action(registry: &PhaseRegistry, label: &'static str, log: &Log) {
    let log = Arc::clone(log);
    let deferred = registry
        .on_restore(move || {
            log.lock().unwrap().push(format!("action {label}"));
            Ok(())
        })
        .unwrap();
    assert!(deferred);
}

fn two_factory_hooks(log: Log) -> impl Fn(Phase) -> Vec<Box<dyn SnapshotHook>> + Send + Sync {
    move |_phase: Phase| {
        vec![
            RecordingSnapshotHook::boxed("f1", &log),
            RecordingSnapshotHook::boxed("f2", &log),
        ]
    }
}

/// Prepares the single-threaded hooks, then fails to write the image.
struct BrokenDisk;

impl Checkpoint for BrokenDisk {
    fn checkpoint(
        &self,
        _phase: Phase,
        _image_dir: &Path,
        single_threaded: &dyn CheckpointHook,
    ) -> SnapshotResult {
        single_threaded
            .prepare()
            .map_err(|cause| SnapshotFailed::from_hook(SnapshotFailedKind::PrepareAbort, cause))?;
        Err(SnapshotFailed::new(
            SnapshotFailedKind::SnapshotFailed,
            "no space left on device",
        ))
    }
}

/// Registry at FEATURES with two multi-threaded and two single-threaded hooks.
fn populated_registry(log: &Log) -> Arc<PhaseRegistry> {
    let registry = Arc::new(PhaseRegistry::new());
    registry.set_phase(Some("features"));
    let phase = registry.current();
    phase.add_multi_threaded_hook(phase_hook("m1", log)).unwrap();
    phase.add_single_threaded_hook(phase_hook("s1", log)).unwrap();
    phase.add_multi_threaded_hook(phase_hook("m2", log)).unwrap();
    phase.add_single_threaded_hook(phase_hook("s2", log)).unwrap();
    registry
}

fn image() -> &'static Path {
    Path::new("checkpoint/image")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn successful_checkpoint_unwinds_in_reverse() {
    let log = Log::default();
    let registry = populated_registry(&log);
    let facility = Arc::new(InProcessCheckpoint::new());

    let factory_log = Arc::clone(&log);
    let driver = CheckpointDriver::new(Arc::clone(&registry), Arc::clone(&facility))
        .with_factory(move |_phase: Phase| {
            vec![
                RecordingSnapshotHook::boxed("f1", &factory_log),
                RecordingSnapshotHook::boxed("f2", &factory_log),
            ]
        });

    driver.snapshot(image()).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "prepare f1",
            "prepare f2",
            "prepare m1",
            "prepare m2",
            "prepare s1",
            "prepare s2",
            "restore s2",
            "restore s1",
            "restore m2",
            "restore m1",
            "restore f2",
            "restore f1",
        ]
    );
    assert_eq!(facility.taken(), vec![(Phase::Features, image().to_path_buf())]);
    assert!(registry.current().is_restored());
}

#[test]
fn factories_see_the_current_phase() {
    let registry = Arc::new(PhaseRegistry::new());
    registry.set_phase(Some("deployment"));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let seen_clone = Arc::clone(&seen);
    let driver = CheckpointDriver::new(registry, InProcessCheckpoint::new()).with_factory(
        move |phase: Phase| -> Vec<Box<dyn SnapshotHook>> {
            seen_clone.lock().unwrap().push(phase);
            Vec::new()
        },
    );

    driver.snapshot(image()).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![Phase::Deployment]);
}

#[test]
fn inactive_process_is_not_checkpointed() {
    let log = Log::default();
    let registry = Arc::new(PhaseRegistry::new());
    let facility = Arc::new(InProcessCheckpoint::new());

    let factory_log = Arc::clone(&log);
    let driver = CheckpointDriver::new(registry, Arc::clone(&facility))
        .with_factory(move |_phase: Phase| vec![RecordingSnapshotHook::boxed("f1", &factory_log)]);

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::PrepareAbort);
    assert!(entries(&log).is_empty());
    assert!(facility.taken().is_empty());
}

#[test]
fn factory_prepare_failure_aborts_earlier_factory_hooks_only() {
    let log = Log::default();
    let registry = populated_registry(&log);

    let factory_log = Arc::clone(&log);
    let driver = CheckpointDriver::new(Arc::clone(&registry), InProcessCheckpoint::new())
        .with_factory(move |_phase: Phase| {
            vec![
                RecordingSnapshotHook::boxed("f1", &factory_log),
                RecordingSnapshotHook::failing_prepare("f2", &factory_log),
                RecordingSnapshotHook::boxed("f3", &factory_log),
            ]
        });

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::PrepareAbort);
    assert_eq!(err.cause().map(HookError::hook), Some("f2"));
    assert_eq!(
        entries(&log),
        vec!["prepare f1", "prepare f2", "abort-prepare f1"]
    );

    // phase hooks were never drained
    assert_eq!(
        registry
            .current()
            .add_single_threaded_hook(Arc::new(FnHook::new("late"))),
        Ok(true)
    );
}

#[test]
fn phase_hook_prepare_failure_rolls_back_everything_prepared() {
    let log = Log::default();
    let registry = Arc::new(PhaseRegistry::new());
    registry.set_phase(Some("applications"));
    let phase = registry.current();
    phase.add_multi_threaded_hook(phase_hook("m1", &log)).unwrap();
    phase
        .add_multi_threaded_hook(Arc::new(
            FnHook::new("m2").on_prepare(|| Err(HookError::new("m2", "threads still busy"))),
        ))
        .unwrap();
    phase.add_single_threaded_hook(phase_hook("s1", &log)).unwrap();

    let factory_log = Arc::clone(&log);
    let driver = CheckpointDriver::new(Arc::clone(&registry), InProcessCheckpoint::new())
        .with_factory(move |_phase: Phase| vec![RecordingSnapshotHook::boxed("f1", &factory_log)]);

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::PrepareAbort);
    assert_eq!(
        entries(&log),
        vec!["prepare f1", "prepare m1", "failed m1", "abort-prepare f1"]
    );
    assert!(!registry.current().is_restored());
}

#[test]
fn unsupported_facility_rolls_back_prepared_hooks() {
    let log = Log::default();
    let registry = populated_registry(&log);

    let factory_log = Arc::clone(&log);
    let driver = CheckpointDriver::new(registry, UnsupportedCheckpoint)
        .with_factory(move |_phase: Phase| vec![RecordingSnapshotHook::boxed("f1", &factory_log)]);

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::Unsupported);
    assert_eq!(
        entries(&log),
        vec![
            "prepare f1",
            "prepare m1",
            "prepare m2",
            "failed m2",
            "failed m1",
            "abort-prepare f1",
        ]
    );
}

#[test]
fn failed_image_write_rolls_back_single_threaded_hooks_first() {
    let log = Log::default();
    let registry = populated_registry(&log);
    let driver = CheckpointDriver::new(registry, BrokenDisk);

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::SnapshotFailed);
    assert_eq!(err.message(), "no space left on device");
    assert_eq!(
        entries(&log),
        vec![
            "prepare m1",
            "prepare m2",
            "prepare s1",
            "prepare s2",
            "failed s2",
            "failed s1",
            "failed m2",
            "failed m1",
        ]
    );
}

#[test]
fn factory_restore_failure_aborts_remaining_restores() {
    let log = Log::default();
    let registry = populated_registry(&log);

    let factory_log = Arc::clone(&log);
    let driver = CheckpointDriver::new(Arc::clone(&registry), InProcessCheckpoint::new())
        .with_factory(move |_phase: Phase| {
            vec![
                RecordingSnapshotHook::boxed("f1", &factory_log),
                RecordingSnapshotHook::boxed("f2", &factory_log),
                RecordingSnapshotHook::failing_restore("f3", &factory_log),
            ]
        });

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::RestoreAbort);

    let log = entries(&log);
    let tail = &log[log.len() - 3..];
    assert_eq!(tail, ["restore f3", "abort-restore f2", "abort-restore f1"]);
    assert!(registry.current().is_restored());
}

#[test]
fn single_threaded_restore_failure_aborts_factory_hooks_and_runs_actions() {
    let log = Log::default();
    let registry = Arc::new(PhaseRegistry::new());
    registry.set_phase(Some("features"));
    defer_action(&registry, "ready", &log);
    let phase = registry.current();
    phase.add_multi_threaded_hook(phase_hook("m1", &log)).unwrap();
    phase.add_single_threaded_hook(phase_hook("s1", &log)).unwrap();
    phase
        .add_single_threaded_hook(failing_restore_phase_hook("s2", &log))
        .unwrap();

    let driver = CheckpointDriver::new(Arc::clone(&registry), InProcessCheckpoint::new())
        .with_factory(two_factory_hooks(Arc::clone(&log)));

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::RestoreAbort);
    assert_eq!(err.cause().map(HookError::hook), Some("s2"));

    // s1 and m1 are never restored; deferred actions still run
    assert_eq!(
        entries(&log),
        vec![
            "prepare f1",
            "prepare f2",
            "prepare m1",
            "prepare s1",
            "prepare s2",
            "restore s2",
            "abort-restore f2",
            "abort-restore f1",
            "action ready",
        ]
    );
    assert!(registry.current().is_restored());
}

#[test]
fn multi_threaded_restore_failure_aborts_every_factory_hook() {
    let log = Log::default();
    let registry = Arc::new(PhaseRegistry::new());
    registry.set_phase(Some("applications"));
    defer_action(&registry, "ready", &log);
    let phase = registry.current();
    phase.add_multi_threaded_hook(phase_hook("m1", &log)).unwrap();
    phase
        .add_multi_threaded_hook(failing_restore_phase_hook("m2", &log))
        .unwrap();
    phase.add_single_threaded_hook(phase_hook("s1", &log)).unwrap();

    let driver = CheckpointDriver::new(Arc::clone(&registry), InProcessCheckpoint::new())
        .with_factory(two_factory_hooks(Arc::clone(&log)));

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::RestoreAbort);
    assert_eq!(err.cause().map(HookError::hook), Some("m2"));
    assert_eq!(
        entries(&log),
        vec![
            "prepare f1",
            "prepare f2",
            "prepare m1",
            "prepare m2",
            "prepare s1",
            "restore s1",
            "restore m2",
            "abort-restore f2",
            "abort-restore f1",
            "action ready",
        ]
    );
    assert!(registry.current().is_restored());
}

#[test]
fn on_restore_after_failed_restore_runs_immediately() {
    let log = Log::default();
    let registry = Arc::new(PhaseRegistry::new());
    registry.set_phase(Some("features"));
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    registry
        .on_restore(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    registry
        .current()
        .add_single_threaded_hook(failing_restore_phase_hook("s1", &log))
        .unwrap();

    let err = CheckpointDriver::new(Arc::clone(&registry), InProcessCheckpoint::new())
        .snapshot(image())
        .unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::RestoreAbort);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let counter = Arc::clone(&runs);
    let deferred = registry
        .on_restore(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    assert!(!deferred);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn restored_phase_is_not_checkpointed_again() {
    let log = Log::default();
    let registry = populated_registry(&log);
    let facility = Arc::new(InProcessCheckpoint::new());
    let driver = CheckpointDriver::new(Arc::clone(&registry), Arc::clone(&facility))
        .with_factory(two_factory_hooks(Arc::clone(&log)));

    driver.snapshot(image()).unwrap();
    let after_first = entries(&log);

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::PrepareAbort);
    assert!(err.message().contains("already been restored"));
    assert_eq!(entries(&log), after_first);
    assert_eq!(facility.taken().len(), 1);
}

#[test]
fn abandoned_phase_is_not_checkpointed_again() {
    let log = Log::default();
    let registry = populated_registry(&log);
    let driver = CheckpointDriver::new(Arc::clone(&registry), BrokenDisk)
        .with_factory(two_factory_hooks(Arc::clone(&log)));

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::SnapshotFailed);
    let after_first = entries(&log);

    let err = driver.snapshot(image()).unwrap_err();
    assert_eq!(err.kind(), SnapshotFailedKind::PrepareAbort);
    assert!(err.message().contains("already drained"));
    assert_eq!(entries(&log), after_first);
    assert!(!registry.current().is_restored());
}

#[test]
fn late_restore_actions_run_when_phase_is_restored() {
    let log = Log::default();
    let registry = populated_registry(&log);

    let action_log = Arc::clone(&log);
    let action_registry = Arc::clone(&registry);
    registry
        .current()
        .add_single_threaded_hook(Arc::new(FnHook::new("registers-late").on_prepare(move || {
            let action_log = Arc::clone(&action_log);
            let deferred = action_registry.on_restore(move || {
                action_log.lock().unwrap().push("late action".to_owned());
                Ok(())
            })?;
            assert!(deferred);
            Ok(())
        })))
        .unwrap();

    CheckpointDriver::new(Arc::clone(&registry), InProcessCheckpoint::new())
        .snapshot(image())
        .unwrap();

    let log = entries(&log);
    assert_eq!(log.last().map(String::as_str), Some("late action"));
    assert!(registry.current().is_restored());
}
