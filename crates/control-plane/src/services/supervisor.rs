// Worker supervisor
//
// Owns the single load-generation worker process.
// Decision: start/stop state changes are serialized by an async transition lock, held only while the
//           slot is checked and marked; waiting for exit happens outside it so a start during a stop
//           is rejected at once. The slot itself sits behind a short-lived parking_lot mutex
// Decision: One reaper task per worker owns the Child; it is the only place the process is awaited,
//           and it clears the slot when the worker exits on its own
// Decision: Graceful stop is SIGINT to the worker's process group, escalating to SIGKILL after a grace period

use chrono::{DateTime, Utc};
use locust_dashboard_core::{RunParameters, WorkerExit, WorkerState, WorkerStatus};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::os::unix::process::ExitStatusExt;
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use super::command::worker_command;
use crate::auth::AuthUser;
use crate::config::{SupervisorConfig, WorkerCommandConfig};
use crate::error::{ControlError, Result};

/// Returned once a worker has been spawned
#[derive(Debug, Clone)]
pub struct Started {
    pub run_id: Uuid,
    pub pid: u32,
    pub parameters: RunParameters,
    pub started_at: DateTime<Utc>,
}

/// Returned once a stopped worker has exited
#[derive(Debug, Clone)]
pub struct Stopped {
    pub run_id: Uuid,
    pub exit: WorkerExit,
}

/// The live worker
struct ActiveRun {
    run_id: Uuid,
    pid: u32,
    parameters: RunParameters,
    started_at: DateTime<Utc>,
    state: WorkerState,
    exit_rx: watch::Receiver<Option<WorkerExit>>,
    /// Asks the reaper to SIGKILL the worker; taken by the first stop
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ActiveRun {
    fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }
}

/// What a stop call does once it has marked the run
enum StopRole {
    /// First stop: owns SIGINT and the SIGKILL escalation
    Signal(Option<oneshot::Sender<()>>),
    /// A stop is already in flight; wait for the same exit
    Join,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveRun>,
    last_exit: Option<WorkerExit>,
}

impl Slot {
    /// Drop a run whose process has already exited but was not yet cleared
    fn reconcile(&mut self) {
        if let Some(run) = &self.active {
            if run.has_exited() {
                self.last_exit = *run.exit_rx.borrow();
                self.active = None;
            }
        }
    }

    fn clear_if(&mut self, run_id: Uuid, exit: WorkerExit) {
        self.last_exit = Some(exit);
        if self.active.as_ref().map(|run| run.run_id) == Some(run_id) {
            self.active = None;
        }
    }
}

pub struct WorkerSupervisor {
    command: WorkerCommandConfig,
    config: SupervisorConfig,
    transition: tokio::sync::Mutex<()>,
    slot: Arc<Mutex<Slot>>,
}

impl WorkerSupervisor {
    pub fn new(command: WorkerCommandConfig, config: SupervisorConfig) -> Self {
        Self {
            command,
            config,
            transition: tokio::sync::Mutex::new(()),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn command_config(&self) -> &WorkerCommandConfig {
        &self.command
    }

    /// Launch a worker with `parameters`.
    ///
    /// Returns as soon as the process is spawned. Fails with `AlreadyRunning`
    /// while another worker is running or stopping.
    pub async fn start(&self, parameters: RunParameters, identity: &AuthUser) -> Result<Started> {
        let _transition = self.transition.lock().await;

        {
            let mut slot = self.slot.lock();
            slot.reconcile();
            if let Some(run) = slot.active.as_ref().filter(|run| run.state.is_live()) {
                tracing::info!(
                    subject = %identity.subject,
                    run_id = %run.run_id,
                    state = %run.state,
                    "Start rejected, worker already live"
                );
                return Err(ControlError::AlreadyRunning);
            }
        }

        let run_id = Uuid::now_v7();
        let mut child = worker_command(&self.command, &parameters, run_id)
            .spawn()
            .map_err(|e| {
                tracing::error!(
                    subject = %identity.subject,
                    program = %self.command.program,
                    error = %e,
                    "Failed to spawn worker"
                );
                ControlError::spawn(format!("{}: {}", self.command.program, e))
            })?;

        let Some(pid) = child.id() else {
            // Already reaped: nothing is running, the slot stays empty
            let status = child.wait().await;
            tracing::error!(run_id = %run_id, status = ?status, "Worker exited during spawn");
            return Err(ControlError::spawn("worker exited immediately after launch"));
        };

        let started_at = Utc::now();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();

        self.slot.lock().active = Some(ActiveRun {
            run_id,
            pid,
            parameters: parameters.clone(),
            started_at,
            state: WorkerState::Running,
            exit_rx,
            kill_tx: Some(kill_tx),
        });

        tokio::spawn(reap(child, run_id, pid, kill_rx, exit_tx, self.slot.clone()));

        tracing::info!(
            subject = %identity.subject,
            run_id = %run_id,
            pid,
            users = parameters.users,
            rate = parameters.spawn_rate,
            time = %parameters.run_time,
            run_secs = parameters.run_time.as_secs(),
            host = %parameters.host,
            "Worker started"
        );

        Ok(Started {
            run_id,
            pid,
            parameters,
            started_at,
        })
    }

    /// Stop the live worker and wait for it to exit.
    ///
    /// Sends SIGINT to the worker's process group, waits up to the grace
    /// period, then escalates to SIGKILL. Fails with `NotRunning` when there
    /// is nothing to stop.
    pub async fn stop(&self, identity: &AuthUser) -> Result<Stopped> {
        self.stop_as(&identity.subject).await
    }

    /// Stop any live worker during server shutdown.
    pub async fn shutdown(&self) {
        match self.stop_as("shutdown").await {
            Ok(stopped) => {
                tracing::info!(run_id = %stopped.run_id, "Worker stopped for shutdown")
            }
            Err(ControlError::NotRunning) => {}
            Err(e) => tracing::error!(error = %e, "Failed to stop worker during shutdown"),
        }
    }

    async fn stop_as(&self, subject: &str) -> Result<Stopped> {
        // Only the state change runs under the transition lock; a start issued
        // while the worker exits must see `stopping`, not queue behind the wait
        let (run_id, pid, mut exit_rx, role) = {
            let _transition = self.transition.lock().await;
            let mut slot = self.slot.lock();
            slot.reconcile();
            let Some(run) = slot.active.as_mut() else {
                tracing::debug!(subject = %subject, "Stop rejected, no worker running");
                return Err(ControlError::NotRunning);
            };
            let role = match run.state {
                WorkerState::Stopping => StopRole::Join,
                _ => {
                    run.state = WorkerState::Stopping;
                    StopRole::Signal(run.kill_tx.take())
                }
            };
            (run.run_id, run.pid, run.exit_rx.clone(), role)
        };

        let kill_tx = match role {
            StopRole::Signal(kill_tx) => kill_tx,
            StopRole::Join => return self.join_stop(subject, run_id, pid, exit_rx).await,
        };

        tracing::info!(subject = %subject, run_id = %run_id, pid, "Stopping worker");

        if let Err(errno) = signal_group(pid, Signal::SIGINT) {
            // ESRCH means the group is already gone; the reaper will report the exit
            tracing::warn!(run_id = %run_id, pid, error = %errno, "Failed to send SIGINT to worker");
        }

        let exit = match tokio::time::timeout(self.config.stop_grace, wait_for_exit(&mut exit_rx))
            .await
        {
            Ok(Some(exit)) => exit,
            Ok(None) => return Err(self.reaper_lost(run_id)),
            Err(_) => {
                tracing::warn!(
                    run_id = %run_id,
                    pid,
                    grace_secs = self.config.stop_grace.as_secs(),
                    "Worker ignored SIGINT, forcing termination"
                );
                if let Some(kill_tx) = kill_tx {
                    let _ = kill_tx.send(());
                }
                match tokio::time::timeout(self.config.kill_wait, wait_for_exit(&mut exit_rx)).await
                {
                    Ok(Some(exit)) => exit,
                    Ok(None) => return Err(self.reaper_lost(run_id)),
                    Err(_) => {
                        // The process still exists; keep the slot so no second worker starts
                        tracing::error!(run_id = %run_id, pid, "Worker did not exit after SIGKILL");
                        return Err(ControlError::internal(
                            "worker did not exit after forced termination",
                        ));
                    }
                }
            }
        };

        self.slot.lock().clear_if(run_id, exit);

        tracing::info!(
            subject = %subject,
            run_id = %run_id,
            code = ?exit.code,
            signal = ?exit.signal,
            forced = exit.forced,
            "Worker stopped"
        );

        Ok(Stopped { run_id, exit })
    }

    /// Wait on a stop another caller already signalled
    async fn join_stop(
        &self,
        subject: &str,
        run_id: Uuid,
        pid: u32,
        mut exit_rx: watch::Receiver<Option<WorkerExit>>,
    ) -> Result<Stopped> {
        tracing::info!(subject = %subject, run_id = %run_id, pid, "Stop already in progress, waiting for exit");

        let budget = self.config.stop_grace + self.config.kill_wait;
        match tokio::time::timeout(budget, wait_for_exit(&mut exit_rx)).await {
            Ok(Some(exit)) => {
                self.slot.lock().clear_if(run_id, exit);
                Ok(Stopped { run_id, exit })
            }
            Ok(None) => Err(self.reaper_lost(run_id)),
            Err(_) => Err(ControlError::internal(
                "worker did not exit after forced termination",
            )),
        }
    }

    /// The reaper went away without reporting an exit (task panicked or was
    /// aborted). The child was dropped with kill_on_drop, so the slot is freed.
    fn reaper_lost(&self, run_id: Uuid) -> ControlError {
        tracing::error!(run_id = %run_id, "Worker reaper exited without reporting");
        let mut slot = self.slot.lock();
        if slot.active.as_ref().map(|run| run.run_id) == Some(run_id) {
            slot.active = None;
        }
        ControlError::internal("lost track of worker process")
    }

    /// Current worker state
    pub fn status(&self) -> WorkerStatus {
        let mut slot = self.slot.lock();
        slot.reconcile();
        match &slot.active {
            Some(run) => WorkerStatus {
                state: run.state,
                run_id: Some(run.run_id),
                pid: Some(run.pid),
                parameters: Some(run.parameters.clone()),
                started_at: Some(run.started_at),
                last_exit: slot.last_exit,
            },
            None => WorkerStatus {
                last_exit: slot.last_exit,
                ..WorkerStatus::default()
            },
        }
    }

    pub fn state(&self) -> WorkerState {
        self.status().state
    }
}

/// Owns the child until it exits, then publishes the exit and frees the slot.
async fn reap(
    mut child: Child,
    run_id: Uuid,
    pid: u32,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: watch::Sender<Option<WorkerExit>>,
    slot: Arc<Mutex<Slot>>,
) {
    let mut forced = false;
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = kill_rx => {
            forced = true;
            if let Err(errno) = signal_group(pid, Signal::SIGKILL) {
                tracing::warn!(run_id = %run_id, pid, error = %errno, "Failed to SIGKILL worker group");
            }
            let _ = child.start_kill();
            child.wait().await
        }
    };

    let exit = match status {
        Ok(status) => WorkerExit {
            code: status.code(),
            signal: status.signal(),
            forced,
        },
        Err(e) => {
            tracing::error!(run_id = %run_id, pid, error = %e, "Failed to wait for worker");
            WorkerExit {
                code: None,
                signal: None,
                forced,
            }
        }
    };

    slot.lock().clear_if(run_id, exit);
    tracing::info!(
        run_id = %run_id,
        pid,
        code = ?exit.code,
        signal = ?exit.signal,
        forced,
        "Worker exited"
    );

    exit_tx.send_replace(Some(exit));
}

async fn wait_for_exit(exit_rx: &mut watch::Receiver<Option<WorkerExit>>) -> Option<WorkerExit> {
    match exit_rx.wait_for(Option::is_some).await {
        Ok(exit) => *exit,
        Err(_) => None,
    }
}

fn signal_group(pid: u32, signal: Signal) -> nix::Result<()> {
    let pgid = i32::try_from(pid).map_err(|_| nix::errno::Errno::EINVAL)?;
    killpg(Pid::from_raw(pgid), signal)
}
