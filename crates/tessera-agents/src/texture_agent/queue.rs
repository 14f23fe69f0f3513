// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The worker pool that decodes textures off the owning thread.

use super::error::LoadError;
use super::job::{
    self, Completion, DecodedTexture, JobHandle, JobState, JobStatus, LoadTimings, TextureSource,
    WorkItem,
};
use super::registry::{normalize, FormatHandlerRegistry};
use ahash::AHashMap;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tessera_core::{FormatHandler, HandlerContext, RenderContext};

/// The decode currently owning an identifier.
struct InFlightJob {
    job_id: u64,
    extension: String,
    source_path: Option<PathBuf>,
    /// Requests that receive the result.
    tickets: Vec<u64>,
    /// Requests canceled while the decode ran.
    canceled: Vec<u64>,
    status: Arc<JobStatus>,
    /// A request for another source, started once this decode is settled.
    follow_up: Option<FollowUp>,
}

impl InFlightJob {
    fn is_wanted(&self) -> bool {
        !self.tickets.is_empty()
    }
}

struct FollowUp {
    item: WorkItem,
    extension: String,
    tickets: Vec<u64>,
}

/// Checks if a request for `source` can share a decode of `path` by the
/// handler of `extension`. Streams share any decode of the same format.
fn same_source(
    extension: &str,
    path: Option<&Path>,
    requested: &str,
    source: &TextureSource,
) -> bool {
    extension == requested
        && match source.path() {
            Some(requested_path) => path == Some(requested_path),
            None => true,
        }
}

/// A job the owner has to finalize.
pub(crate) struct FinishedJob {
    pub(crate) identifier: String,
    /// Every request served by the job, in enqueue order.
    pub(crate) tickets: Vec<u64>,
    /// Requests canceled before the job finished.
    pub(crate) canceled: Vec<u64>,
    /// `Err(LoadError::Canceled)` when no request wanted the result anymore.
    pub(crate) result: Result<DecodedTexture, LoadError>,
    pub(crate) timings: LoadTimings,
    status: Arc<JobStatus>,
}

impl FinishedJob {
    pub(crate) fn mark_finalized(&self) {
        self.status.set(JobState::Finalized);
    }
}

/// Schedules decodes on a pool of worker threads.
///
/// At most one decode is queued or running per identifier: a request for an
/// identifier that is already queued or decoding joins the existing job, and
/// a request arriving after a cancellation waits for the canceled decode to
/// finish. A job that already finished is never joined, later requests get
/// a fresh decode. Finished jobs are handed back in completion order.
pub struct LoadJobQueue {
    registry: FormatHandlerRegistry,
    context: Arc<dyn RenderContext>,
    work_tx: Option<Sender<WorkItem>>,
    work_rx: Receiver<WorkItem>,
    done_rx: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    ready: VecDeque<Completion>,
    in_flight: AHashMap<String, InFlightJob>,
    /// Finished jobs replaced by a newer request before they were drained.
    superseded: AHashMap<u64, InFlightJob>,
    next_job_id: u64,
    next_ticket: u64,
}

impl fmt::Debug for LoadJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadJobQueue")
            .field("registry", &self.registry)
            .field("workers", &self.workers.len())
            .field("in_flight", &self.in_flight.len())
            .field("superseded", &self.superseded.len())
            .finish()
    }
}

impl LoadJobQueue {
    /// Starts `worker_threads` workers (at least one).
    ///
    /// ## Errors
    /// Returns the I/O error of the first worker that could not be spawned.
    pub fn new(
        worker_threads: usize,
        registry: FormatHandlerRegistry,
        context: Arc<dyn RenderContext>,
    ) -> std::io::Result<Self> {
        let (work_tx, work_rx) = crossbeam_channel::unbounded::<WorkItem>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<Completion>();

        let workers = (0..worker_threads.max(1))
            .map(|index| spawn_worker(index, work_rx.clone(), done_tx.clone()))
            .collect::<std::io::Result<Vec<_>>>()?;
        log::debug!("LoadJobQueue started {} workers", workers.len());

        Ok(Self {
            registry,
            context,
            work_tx: Some(work_tx),
            work_rx,
            done_rx,
            workers,
            ready: VecDeque::new(),
            in_flight: AHashMap::new(),
            superseded: AHashMap::new(),
            next_job_id: 0,
            next_ticket: 0,
        })
    }

    /// The registry handlers are resolved from.
    pub fn registry(&self) -> &FormatHandlerRegistry {
        &self.registry
    }

    /// Mutable access to the registry, for setup.
    pub fn registry_mut(&mut self) -> &mut FormatHandlerRegistry {
        &mut self.registry
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of identifiers with a job not yet drained, canceled ones
    /// included.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Checks if `identifier` has a job not yet drained, even a canceled one.
    pub fn is_in_flight(&self, identifier: &str) -> bool {
        self.in_flight.contains_key(identifier)
    }

    /// Schedules a decode of `source` with the handler registered for
    /// `extension`.
    ///
    /// If `identifier` is queued or decoding with the same extension and the
    /// same file (or the new source is a stream), the request joins that job
    /// and `source` is dropped. If that job was canceled, a request for the
    /// same file revives it, any other request is started once it finishes.
    ///
    /// ## Errors
    /// * `LoadError::FormatNotRegistered` - No handler for `extension`.
    ///   Nothing is scheduled.
    /// * `LoadError::IdentifierBusy` - `identifier` is in flight from another
    ///   extension or file.
    /// * `LoadError::Canceled` - The worker pool has shut down.
    pub fn enqueue(
        &mut self,
        identifier: &str,
        extension: &str,
        source: TextureSource,
        handler_context: HandlerContext,
    ) -> Result<JobHandle, LoadError> {
        let extension = normalize(extension);
        if !self.registry.contains(&extension) {
            return Err(LoadError::FormatNotRegistered(extension));
        }

        // A finished decode has read its source already.
        if self
            .in_flight
            .get(identifier)
            .is_some_and(|job| job.status.get().is_finished())
        {
            self.supersede(identifier);
        }

        if let Some(job) = self.in_flight.get_mut(identifier) {
            let ticket = self.next_ticket;

            if let Some(follow_up) = job.follow_up.as_mut() {
                let path = follow_up.item.source.path();
                if !same_source(&follow_up.extension, path, &extension, &source) {
                    return Err(LoadError::IdentifierBusy(identifier.to_owned()));
                }
                self.next_ticket += 1;
                follow_up.tickets.push(ticket);
                log::debug!(
                    "'{identifier}' is waiting to load, attached request {ticket} to job {}",
                    follow_up.item.job_id
                );
                return Ok(JobHandle::new(
                    ticket,
                    follow_up.item.job_id,
                    identifier,
                    true,
                    Arc::clone(&follow_up.item.status),
                ));
            }

            let shareable = same_source(
                &job.extension,
                job.source_path.as_deref(),
                &extension,
                &source,
            );
            // Only a request for the same file may revive a canceled decode.
            let joins = if job.is_wanted() {
                shareable
            } else {
                shareable && source.path().is_some()
            };
            if joins {
                self.next_ticket += 1;
                job.tickets.push(ticket);
                log::debug!(
                    "'{identifier}' is already loading, attached request {ticket} to job {}",
                    job.job_id
                );
                return Ok(JobHandle::new(
                    ticket,
                    job.job_id,
                    identifier,
                    true,
                    Arc::clone(&job.status),
                ));
            }
            if job.is_wanted() {
                return Err(LoadError::IdentifierBusy(identifier.to_owned()));
            }

            let handler = self.registry.resolve(&extension, &handler_context)?;
            let job_id = self.next_job_id;
            self.next_job_id += 1;
            self.next_ticket += 1;
            let item = work_item(job_id, identifier, source, handler, &self.context);
            let handle = JobHandle::new(ticket, job_id, identifier, false, Arc::clone(&item.status));
            log::debug!(
                "'{identifier}' is still decoding canceled job {}, job {job_id} waits for it",
                job.job_id
            );
            job.follow_up = Some(FollowUp {
                item,
                extension,
                tickets: vec![ticket],
            });
            return Ok(handle);
        }

        let handler = self.registry.resolve(&extension, &handler_context)?;
        let job_id = self.next_job_id;
        let ticket = self.next_ticket;
        let item = work_item(job_id, identifier, source, handler, &self.context);
        let status = Arc::clone(&item.status);
        self.dispatch(identifier, extension, item, vec![ticket])
            .map_err(|_| LoadError::Canceled)?;
        self.next_job_id += 1;
        self.next_ticket += 1;
        Ok(JobHandle::new(ticket, job_id, identifier, false, status))
    }

    /// Cancels every request waiting on `identifier`. A running decode still
    /// runs to completion and keeps the identifier busy, but its result is
    /// discarded and the requests finish as [`LoadError::Canceled`].
    ///
    /// Returns `false` if no request was waiting.
    pub fn cancel(&mut self, identifier: &str) -> bool {
        let Some(job) = self.in_flight.get_mut(identifier) else {
            return false;
        };
        let follow_up = job.follow_up.take();
        if !job.is_wanted() && follow_up.is_none() {
            return false;
        }

        let mut canceled = std::mem::take(&mut job.tickets);
        if let Some(follow_up) = follow_up {
            canceled.extend(follow_up.tickets);
        }
        log::debug!(
            "Canceled job {} of '{identifier}' ({} waiting requests)",
            job.job_id,
            canceled.len()
        );
        job.canceled.extend(canceled);
        true
    }

    /// Blocks until a job finishes or `timeout` expires. Returns `true` if a
    /// finished job is ready to drain.
    pub(crate) fn wait(&mut self, timeout: Duration) -> bool {
        if !self.ready.is_empty() {
            return true;
        }
        match self.done_rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.ready.push_back(completion);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Takes every job finished so far, in completion order, without
    /// blocking.
    pub(crate) fn drain_finished(&mut self) -> Vec<FinishedJob> {
        let mut completions: Vec<Completion> = self.ready.drain(..).collect();
        completions.extend(self.done_rx.try_iter());
        completions
            .into_iter()
            .filter_map(|completion| self.settle(completion))
            .collect()
    }

    /// Sends `item` to the workers and makes it the job of `identifier`.
    /// Gives the tickets back if the pool has shut down.
    fn dispatch(
        &mut self,
        identifier: &str,
        extension: String,
        item: WorkItem,
        tickets: Vec<u64>,
    ) -> Result<(), Vec<u64>> {
        let job_id = item.job_id;
        let status = Arc::clone(&item.status);
        let source_path = item.source.path().map(Path::to_path_buf);

        let Some(work_tx) = self.work_tx.as_ref() else {
            return Err(tickets);
        };
        if work_tx.send(item).is_err() {
            return Err(tickets);
        }
        self.in_flight.insert(
            identifier.to_owned(),
            InFlightJob {
                job_id,
                extension,
                source_path,
                tickets,
                canceled: Vec::new(),
                status,
                follow_up: None,
            },
        );
        Ok(())
    }

    /// Starts the request waiting behind `job`, if any. Tickets that could
    /// not be scheduled end up canceled on `job`.
    fn start_follow_up(&mut self, identifier: &str, job: &mut InFlightJob) {
        let Some(FollowUp {
            item,
            extension,
            tickets,
        }) = job.follow_up.take()
        else {
            return;
        };
        log::debug!(
            "Starting job {} of '{identifier}' after job {}",
            item.job_id,
            job.job_id
        );
        if let Err(tickets) = self.dispatch(identifier, extension, item, tickets) {
            job.canceled.extend(tickets);
        }
    }

    /// Moves the finished job of `identifier` aside so a new request starts
    /// a fresh decode. The old job is still reported when drained.
    fn supersede(&mut self, identifier: &str) {
        let Some(mut job) = self.in_flight.remove(identifier) else {
            return;
        };
        log::debug!(
            "Job {} of '{identifier}' finished before the new request, it will not be joined",
            job.job_id
        );
        self.start_follow_up(identifier, &mut job);
        self.superseded.insert(job.job_id, job);
    }

    fn settle(&mut self, completion: Completion) -> Option<FinishedJob> {
        let Completion {
            job_id,
            identifier,
            result,
            timings,
        } = completion;

        let current = self
            .in_flight
            .get(&identifier)
            .is_some_and(|job| job.job_id == job_id);
        let job = if current {
            let mut job = self.in_flight.remove(&identifier)?;
            self.start_follow_up(&identifier, &mut job);
            Some(job)
        } else {
            self.superseded.remove(&job_id)
        };
        let Some(job) = job else {
            log::warn!("Dropping result of unknown job {job_id} for '{identifier}'");
            if let Ok(decoded) = result {
                self.discard(decoded);
            }
            return None;
        };

        let result = if job.is_wanted() {
            result
        } else {
            if let Ok(decoded) = result {
                self.discard(decoded);
            }
            Err(LoadError::Canceled)
        };
        Some(FinishedJob {
            identifier,
            tickets: job.tickets,
            canceled: job.canceled,
            result,
            timings,
            status: job.status,
        })
    }

    fn discard(&self, decoded: DecodedTexture) {
        if let Some(resource) = decoded.resource {
            self.context.retire(resource);
        }
    }
}

fn work_item(
    job_id: u64,
    identifier: &str,
    source: TextureSource,
    handler: Box<dyn FormatHandler>,
    context: &Arc<dyn RenderContext>,
) -> WorkItem {
    WorkItem {
        job_id,
        identifier: identifier.to_owned(),
        source,
        handler,
        enqueued_at: Instant::now(),
        status: JobStatus::new(),
        eager_context: context
            .supports_multithreaded_allocation()
            .then(|| Arc::clone(context)),
    }
}

impl Drop for LoadJobQueue {
    fn drop(&mut self) {
        // Jobs nobody picked up yet are abandoned.
        let abandoned = self.work_rx.try_iter().count();
        if abandoned > 0 {
            log::debug!("LoadJobQueue dropped {abandoned} queued jobs");
        }
        self.work_tx = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("A texture worker thread panicked");
            }
        }
    }
}

fn spawn_worker(
    index: usize,
    work_rx: Receiver<WorkItem>,
    done_tx: Sender<Completion>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("tessera-worker-{index}"))
        .spawn(move || {
            for item in work_rx.iter() {
                if done_tx.send(job::run(item)).is_err() {
                    break;
                }
            }
            log::trace!("tessera-worker-{index} stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tessera_core::{DecodeError, FormatHandler, InputTextureInfo};
    use tessera_infra::HeadlessRenderContext;

    /// Decodes a 1x1 texture once the test opens the gate.
    struct GateHandler {
        gate: Receiver<()>,
        decodes: Arc<AtomicUsize>,
        pixel: Vec<u8>,
    }

    impl FormatHandler for GateHandler {
        fn container_kind(&self) -> &'static str {
            "gate"
        }

        fn load_data(
            &mut self,
            reader: &mut dyn Read,
            info: &mut InputTextureInfo,
        ) -> Result<(), DecodeError> {
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            self.decodes.fetch_add(1, Ordering::SeqCst);
            self.pixel = tessera_core::texture::read_all(reader)?;
            *info = InputTextureInfo {
                width: 1,
                height: 1,
                ..Default::default()
            };
            Ok(())
        }

        fn data_slice(&self, _layer: u32, _mip_level: u32) -> Option<&[u8]> {
            Some(&self.pixel)
        }

        fn data_slice_mut(&mut self, _layer: u32, _mip_level: u32) -> Option<&mut [u8]> {
            Some(&mut self.pixel)
        }
    }

    struct Fixture {
        queue: LoadJobQueue,
        gate: Sender<()>,
        decodes: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let (gate, gate_rx) = crossbeam_channel::unbounded();
        let decodes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&decodes);

        let mut registry = FormatHandlerRegistry::new();
        registry.register("gate", move |_| {
            Box::new(GateHandler {
                gate: gate_rx.clone(),
                decodes: Arc::clone(&counter),
                pixel: Vec::new(),
            })
        });
        let context = Arc::new(HeadlessRenderContext::new());
        let queue = LoadJobQueue::new(1, registry, context).unwrap();
        Fixture {
            queue,
            gate,
            decodes,
        }
    }

    fn pixel() -> TextureSource {
        TextureSource::from_bytes(vec![255u8, 0, 0, 255])
    }

    /// Writes one pixel to `dir/name` and returns its path.
    fn pixel_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, [255u8, 0, 0, 255]).unwrap();
        path
    }

    fn finish_all(queue: &mut LoadJobQueue, expected: usize) -> Vec<FinishedJob> {
        let mut finished = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while finished.len() < expected && Instant::now() < deadline {
            queue.wait(Duration::from_millis(50));
            finished.extend(queue.drain_finished());
        }
        finished
    }

    #[test]
    fn duplicate_request_joins_in_flight_job() {
        let mut f = fixture();
        let first = f
            .queue
            .enqueue("brick", "gate", pixel(), HandlerContext::default())
            .unwrap();
        let second = f
            .queue
            .enqueue("brick", "GATE", pixel(), HandlerContext::default())
            .unwrap();
        assert!(!first.is_attached());
        assert!(second.is_attached());
        assert_eq!(first.job_id(), second.job_id());
        assert_ne!(first.ticket(), second.ticket());

        f.gate.send(()).unwrap();
        let finished = finish_all(&mut f.queue, 1);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].tickets, [first.ticket(), second.ticket()]);
        assert!(finished[0].result.is_ok());
        assert_eq!(f.decodes.load(Ordering::SeqCst), 1);
        assert_eq!(first.state(), JobState::Succeeded);
        finished[0].mark_finalized();
        assert_eq!(second.state(), JobState::Finalized);
    }

    #[test]
    fn unregistered_extension_schedules_nothing() {
        let mut f = fixture();
        let err = f
            .queue
            .enqueue("brick", "psd", pixel(), HandlerContext::default())
            .unwrap_err();
        assert_eq!(err, LoadError::FormatNotRegistered("psd".into()));
        assert_eq!(f.queue.in_flight_count(), 0);
    }

    #[test]
    fn different_source_for_busy_identifier_is_rejected() {
        let mut f = fixture();
        let dir = tempfile::tempdir().unwrap();
        f.queue
            .enqueue(
                "brick",
                "gate",
                TextureSource::Path(pixel_file(dir.path(), "a.gate")),
                HandlerContext::default(),
            )
            .unwrap();
        let err = f
            .queue
            .enqueue(
                "brick",
                "gate",
                TextureSource::Path(pixel_file(dir.path(), "b.gate")),
                HandlerContext::default(),
            )
            .unwrap_err();
        assert_eq!(err, LoadError::IdentifierBusy("brick".into()));
        f.gate.send(()).unwrap();
    }

    #[test]
    fn canceled_job_reports_canceled() {
        let mut f = fixture();
        let handle = f
            .queue
            .enqueue("brick", "gate", pixel(), HandlerContext::default())
            .unwrap();
        assert!(f.queue.cancel("brick"));
        assert!(f.queue.is_in_flight("brick"), "the decode still owns the identifier");
        assert!(!f.queue.cancel("brick"));

        f.gate.send(()).unwrap();
        let finished = finish_all(&mut f.queue, 1);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].identifier, "brick");
        assert!(finished[0].tickets.is_empty());
        assert_eq!(finished[0].canceled, [handle.ticket()]);
        assert!(matches!(finished[0].result, Err(LoadError::Canceled)));
        assert!(!f.queue.is_in_flight("brick"));
    }

    #[test]
    fn same_file_after_cancel_revives_the_running_decode() {
        let mut f = fixture();
        let dir = tempfile::tempdir().unwrap();
        let file = pixel_file(dir.path(), "brick.gate");
        let path = || TextureSource::Path(file.clone());
        let first = f
            .queue
            .enqueue("brick", "gate", path(), HandlerContext::default())
            .unwrap();
        f.queue.cancel("brick");
        let second = f
            .queue
            .enqueue("brick", "gate", path(), HandlerContext::default())
            .unwrap();
        assert!(second.is_attached());
        assert_eq!(first.job_id(), second.job_id());

        f.gate.send(()).unwrap();
        let finished = finish_all(&mut f.queue, 1);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].canceled, [first.ticket()]);
        assert_eq!(finished[0].tickets, [second.ticket()]);
        assert_eq!(f.decodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn new_source_after_cancel_waits_for_the_canceled_decode() {
        let mut f = fixture();
        let first = f
            .queue
            .enqueue("brick", "gate", pixel(), HandlerContext::default())
            .unwrap();
        f.queue.cancel("brick");
        let second = f
            .queue
            .enqueue("brick", "gate", pixel(), HandlerContext::default())
            .unwrap();
        assert!(!second.is_attached());
        assert_ne!(first.job_id(), second.job_id());
        let third = f
            .queue
            .enqueue("brick", "gate", pixel(), HandlerContext::default())
            .unwrap();
        assert!(third.is_attached());
        assert_eq!(third.job_id(), second.job_id());

        // Nothing reaches the worker until the canceled decode is drained.
        f.gate.send(()).unwrap();
        let finished = finish_all(&mut f.queue, 1);
        assert_eq!(finished[0].canceled, [first.ticket()]);
        assert!(!second.state().is_finished());
        assert!(f.queue.is_in_flight("brick"));

        f.gate.send(()).unwrap();
        let finished = finish_all(&mut f.queue, 1);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].tickets, [second.ticket(), third.ticket()]);
        assert!(finished[0].result.is_ok());
        assert_eq!(f.decodes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn finished_job_is_superseded_not_joined() {
        let mut f = fixture();
        let first = f
            .queue
            .enqueue("brick", "gate", pixel(), HandlerContext::default())
            .unwrap();
        f.gate.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !first.state().is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(first.state(), JobState::Succeeded);

        let second = f
            .queue
            .enqueue("brick", "gate", pixel(), HandlerContext::default())
            .unwrap();
        assert!(!second.is_attached());
        assert_ne!(first.job_id(), second.job_id());

        f.gate.send(()).unwrap();
        let finished = finish_all(&mut f.queue, 2);
        assert_eq!(finished.len(), 2);
        assert_eq!(finished[0].tickets, [first.ticket()]);
        assert_eq!(finished[1].tickets, [second.ticket()]);
        assert!(finished.iter().all(|job| job.result.is_ok()));
        assert_eq!(f.decodes.load(Ordering::SeqCst), 2);
        assert_eq!(f.queue.in_flight_count(), 0);
    }

    #[test]
    fn separate_identifiers_decode_separately() {
        let mut f = fixture();
        for name in ["a", "b", "c"] {
            f.queue
                .enqueue(name, "gate", pixel(), HandlerContext::default())
                .unwrap();
        }
        for _ in 0..3 {
            f.gate.send(()).unwrap();
        }
        let finished = finish_all(&mut f.queue, 3);
        let names: Vec<_> = finished.iter().map(|j| j.identifier.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"], "a single worker finishes in order");
        assert_eq!(f.decodes.load(Ordering::SeqCst), 3);
        assert_eq!(f.queue.in_flight_count(), 0);
    }

    #[test]
    fn drop_with_queued_jobs_returns() {
        let mut f = fixture();
        for name in ["a", "b", "c"] {
            f.queue
                .enqueue(name, "gate", pixel(), HandlerContext::default())
                .unwrap();
        }
        f.gate.send(()).unwrap();
        drop(f.gate);
        drop(f.queue);
    }
}
