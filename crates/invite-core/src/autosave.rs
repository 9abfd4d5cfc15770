//! Debounced autosave
//!
//! Editor mutations land on an in-memory copy of the project and are handed
//! to an [`Autosaver`]. Each new edit cancels the pending write and restarts
//! the timer, so a burst of edits becomes one write once the editor goes
//! quiet for the configured delay.
//!
//! The writer runs as a background tokio task fed through a command channel.
//! Each write itself runs on the blocking pool, so a locked database cannot
//! stall the runtime. Write failures are logged and never reach the editor.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::Project;
use crate::storage::{Database, StoreResult};

/// Destination of autosave writes
pub trait ProjectSink: Send + 'static {
    fn save_project(&mut self, project: &Project) -> StoreResult<()>;
}

impl ProjectSink for Database {
    fn save_project(&mut self, project: &Project) -> StoreResult<()> {
        self.put_project(project)
    }
}

/// Commands sent to the autosave task
#[derive(Debug)]
enum AutosaveCommand {
    /// Replace the pending project and restart the timer
    Schedule(Box<Project>),
    /// Write the pending project now; replies whether there was one
    Flush(oneshot::Sender<bool>),
    /// Drop the pending project without writing
    Cancel,
    /// Drop the pending project and stop the task
    Shutdown,
}

/// Handle to a background autosave task
///
/// Dropping the handle cancels any pending write.
pub struct Autosaver {
    command_tx: mpsc::UnboundedSender<AutosaveCommand>,
    task: Option<JoinHandle<()>>,
}

impl Autosaver {
    /// Spawn the autosave task on the current tokio runtime
    pub fn spawn<S: ProjectSink>(sink: S, delay: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(autosave_task(sink, delay, command_rx));

        Self {
            command_tx,
            task: Some(task),
        }
    }

    /// Queue `project` to be written after the quiet period
    pub fn schedule(&self, project: Project) {
        let _ = self
            .command_tx
            .send(AutosaveCommand::Schedule(Box::new(project)));
    }

    /// Write the pending project immediately
    ///
    /// Returns false when nothing was pending.
    pub async fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.command_tx.send(AutosaveCommand::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.await.unwrap_or(false)
    }

    /// Forget the pending project
    pub fn cancel(&self) {
        let _ = self.command_tx.send(AutosaveCommand::Cancel);
    }

    /// Cancel any pending write and wait for the task to stop
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(AutosaveCommand::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        let _ = self.command_tx.send(AutosaveCommand::Shutdown);
    }
}

async fn autosave_task<S: ProjectSink>(
    mut sink: S,
    delay: Duration,
    mut command_rx: mpsc::UnboundedReceiver<AutosaveCommand>,
) {
    let mut pending: Option<Project> = None;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            biased;

            cmd = command_rx.recv() => match cmd {
                Some(AutosaveCommand::Schedule(project)) => {
                    pending = Some(*project);
                    deadline = Instant::now() + delay;
                }
                Some(AutosaveCommand::Flush(ack)) => {
                    let had_pending = pending.is_some();
                    if let Some(project) = pending.take() {
                        sink = match write_blocking(sink, project).await {
                            Some(sink) => sink,
                            None => {
                                let _ = ack.send(true);
                                return;
                            }
                        };
                    }
                    let _ = ack.send(had_pending);
                }
                Some(AutosaveCommand::Cancel) => {
                    if pending.take().is_some() {
                        debug!("Pending autosave cancelled");
                    }
                }
                Some(AutosaveCommand::Shutdown) | None => break,
            },

            _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
                if let Some(project) = pending.take() {
                    sink = match write_blocking(sink, project).await {
                        Some(sink) => sink,
                        None => return,
                    };
                }
            }
        }
    }

    if pending.is_some() {
        debug!("Autosave stopped with an unsaved edit discarded");
    }
}

/// Run one write on the blocking pool, handing the sink back afterwards
///
/// Returns None when the write panicked; the sink is gone with it.
async fn write_blocking<S: ProjectSink>(mut sink: S, project: Project) -> Option<S> {
    let result = tokio::task::spawn_blocking(move || {
        write(&mut sink, project);
        sink
    })
    .await;

    match result {
        Ok(sink) => Some(sink),
        Err(e) => {
            warn!("Autosave writer stopped: {}", e);
            None
        }
    }
}

fn write<S: ProjectSink>(sink: &mut S, mut project: Project) {
    project.touch();
    match sink.save_project(&project) {
        Ok(()) => debug!("Autosaved project {}", project.id),
        Err(e) => warn!("Autosave of project {} failed: {}", project.id, e),
    }
}
