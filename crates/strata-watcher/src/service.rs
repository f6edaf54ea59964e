//! Serialized regeneration passes driven by change batches
//!
//! Batches are debounced and folded into one pending [`Trigger`]. At most one
//! pass runs at a time, on a blocking thread. A batch that arrives while a
//! pass is running cancels it; the cancelled trigger is merged back into the
//! pending one and runs again once the debounce settles.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use strata_core::DEFAULT_SOURCE_EXTENSION;
use strata_processor::{
    ArtifactWriter, ChangeBatch, ErrorClass, Generation, Outcome, Processor, ProcessorError,
    ProjectLayout, Trigger, classify,
};
use strata_resolver::PackageResolver;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::watcher::FileWatcher;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);
const OUTCOME_CAPACITY: usize = 64;

/// Result of one pass, as broadcast to subscribers.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    UpToDate {
        trigger: Trigger,
    },
    Regenerated {
        trigger: Trigger,
        generation: Generation,
    },
    /// Superseded by a newer trigger; it runs again merged with that one.
    Cancelled {
        trigger: Trigger,
    },
    Failed {
        trigger: Trigger,
        class: ErrorClass,
        message: String,
    },
}

/// What a finished pass hands back to the loop.
struct Finished {
    result: Result<Outcome, ProcessorError>,
    layout: ProjectLayout,
    extension: String,
}

struct InFlight {
    trigger: Trigger,
    cancel: CancellationToken,
    handle: JoinHandle<Finished>,
}

/// Owns a [`Processor`] and feeds it one pass at a time.
pub struct WatcherService<R, W> {
    processor: Arc<Mutex<Processor<R, W>>>,
    debounce: Duration,
    outcomes: broadcast::Sender<PassOutcome>,
}

impl<R, W> WatcherService<R, W>
where
    R: PackageResolver + 'static,
    W: ArtifactWriter + 'static,
{
    pub fn new(processor: Processor<R, W>) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);
        Self {
            processor: Arc::new(Mutex::new(processor)),
            debounce: DEFAULT_DEBOUNCE,
            outcomes,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PassOutcome> {
        self.outcomes.subscribe()
    }

    pub fn processor(&self) -> Arc<Mutex<Processor<R, W>>> {
        self.processor.clone()
    }

    /// Watch the processor's prefix until `shutdown` fires.
    pub async fn watch(&self, shutdown: CancellationToken) -> Result<()> {
        let prefix = lock(&self.processor).prefix().to_path_buf();
        let mut watcher = FileWatcher::new(&prefix)?;
        watcher.watch_directory(&prefix)?;
        info!("Started watching project directory: {:?}", prefix);
        self.run(watcher.event_receiver(), shutdown).await
    }

    /// Consume change batches until the channel closes or `shutdown` fires.
    pub async fn run(
        &self,
        batches: &mut mpsc::UnboundedReceiver<ChangeBatch>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let (mut layout, mut extension) = {
            let processor = lock(&self.processor);
            (processor.layout(), source_extension(&processor))
        };
        let mut pending: Option<Trigger> = None;
        let mut in_flight: Option<InFlight> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Watcher shutting down");
                    break;
                }
                batch = batches.recv() => {
                    let Some(batch) = batch else {
                        debug!("Change source closed");
                        break;
                    };
                    let Some(trigger) = classify(&batch, &layout, &extension) else {
                        continue;
                    };
                    debug!("Change batch of {} events: {:?}", batch.events.len(), trigger);
                    pending = pending.max(Some(trigger));
                    if let Some(pass) = &in_flight {
                        if !pass.cancel.is_cancelled() {
                            info!("Superseding in-flight {:?} pass", pass.trigger);
                            pass.cancel.cancel();
                        }
                    }
                }
                joined = join(&mut in_flight) => {
                    let Some(pass) = in_flight.take() else {
                        continue;
                    };
                    let finished = match joined {
                        Ok(finished) => finished,
                        Err(e) => {
                            error!("Regeneration pass panicked: {}", e);
                            continue;
                        }
                    };
                    layout = finished.layout;
                    extension = finished.extension;
                    let outcome = match finished.result {
                        Ok(Outcome::UpToDate) => PassOutcome::UpToDate { trigger: pass.trigger },
                        Ok(Outcome::Regenerated(generation)) => PassOutcome::Regenerated {
                            trigger: pass.trigger,
                            generation,
                        },
                        Err(e) if e.is_cancelled() => {
                            pending = pending.max(Some(pass.trigger));
                            PassOutcome::Cancelled { trigger: pass.trigger }
                        }
                        Err(e) => {
                            warn!("Regeneration failed: {}", e);
                            PassOutcome::Failed {
                                trigger: pass.trigger,
                                class: e.class(),
                                message: e.to_string(),
                            }
                        }
                    };
                    // No subscribers is fine.
                    let _ = self.outcomes.send(outcome);
                }
                _ = tokio::time::sleep(self.debounce), if pending.is_some() && in_flight.is_none() => {
                    if let Some(trigger) = pending.take() {
                        in_flight = Some(self.start(trigger));
                    }
                }
            }
        }

        if let Some(pass) = in_flight.take() {
            pass.cancel.cancel();
            if let Err(e) = pass.handle.await {
                error!("Regeneration pass panicked: {}", e);
            }
        }
        Ok(())
    }

    fn start(&self, trigger: Trigger) -> InFlight {
        debug!("Starting {:?} pass", trigger);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let processor = self.processor.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let mut processor = lock(&processor);
            let result = processor.process(trigger, &token);
            Finished {
                result,
                layout: processor.layout(),
                extension: source_extension(&processor),
            }
        });
        InFlight {
            trigger,
            cancel,
            handle,
        }
    }
}

/// A pass that panicked leaves the processor's last committed state intact,
/// so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn source_extension<R, W>(processor: &Processor<R, W>) -> String
where
    R: PackageResolver,
    W: ArtifactWriter,
{
    processor
        .config()
        .map(|config| config.options.source_extension.clone())
        .unwrap_or_else(|| DEFAULT_SOURCE_EXTENSION.to_string())
}

async fn join(
    in_flight: &mut Option<InFlight>,
) -> Result<Finished, tokio::task::JoinError> {
    match in_flight {
        Some(pass) => (&mut pass.handle).await,
        None => std::future::pending().await,
    }
}
