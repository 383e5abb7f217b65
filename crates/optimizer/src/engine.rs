use std::path::Path;
use std::sync::Arc;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::OptimizerConfig;
use crate::delivery::{cleanup_files, DeliverySink};
use crate::error::{ConfigError, DeliveryError, TranscodeError};
use crate::events::{EventChannel, JobEvent};
use crate::job::{DeliveryReport, Job};
use crate::queue::{BatchId, BatchSummary, JobQueue};
use crate::transcoder::{TranscodeUpdate, Transcoder};

/// Caption used when none is configured
pub const DEFAULT_CAPTION: &str = "Video update";

/// Detail recorded for jobs that never started because the batch was cancelled
pub const CANCELLED_DETAIL: &str = "cancelled";

/// Drives a batch strictly in index order, one job at a time
///
/// Job `i + 1` is not started before job `i` has emitted its completion event.
/// Per-job failures (probe, transcode, delivery, cleanup) are recorded on the
/// job and never stop the batch.
pub struct QueueEngine {
    queue: JobQueue,
    transcoder: Arc<dyn Transcoder>,
    delivery: Option<Arc<dyn DeliverySink>>,
    events: EventChannel,
    caption: String,
}

impl QueueEngine {
    pub fn new(
        queue: JobQueue,
        transcoder: Arc<dyn Transcoder>,
        delivery: Option<Arc<dyn DeliverySink>>,
        events: EventChannel,
    ) -> Self {
        Self {
            queue,
            transcoder,
            delivery,
            events,
            caption: DEFAULT_CAPTION.to_string(),
        }
    }

    /// Create an engine honouring the configured worker count and caption
    pub fn with_config(
        config: &OptimizerConfig,
        queue: JobQueue,
        transcoder: Arc<dyn Transcoder>,
        delivery: Option<Arc<dyn DeliverySink>>,
        events: EventChannel,
    ) -> Result<Self, ConfigError> {
        if config.workers != 1 {
            return Err(ConfigError::UnsupportedWorkers(config.workers));
        }
        Ok(Self::new(queue, transcoder, delivery, events).caption(&config.telegram.caption))
    }

    /// Caption sent along with delivered files
    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        let caption = caption.into();
        if !caption.trim().is_empty() {
            self.caption = caption;
        }
        self
    }

    /// Read-only view of the batch
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn into_queue(self) -> JobQueue {
        self.queue
    }

    /// Process every pending job in ascending index order
    ///
    /// Once `cancel` fires, the running transcode is stopped and every job
    /// not yet finished is completed as an error, so each job still gets
    /// exactly one completion event.
    pub async fn run(&mut self, cancel: &CancellationToken) -> BatchSummary {
        let pending = self.queue.pending_indices();
        info!(
            "🚀 Batch {}: processing {} job(s) sequentially",
            self.queue.batch_id(),
            pending.len()
        );

        for index in pending {
            self.process_job(index, cancel).await;
        }

        let summary = self.queue.summary();
        info!(
            "🏁 Batch {} finished: {} done, {} failed, {} delivered",
            self.queue.batch_id(),
            summary.done,
            summary.failed,
            summary.delivered
        );
        summary
    }

    async fn process_job(&mut self, index: usize, cancel: &CancellationToken) {
        let (input, output, delivery_requested) = {
            let Some(job) = self.queue.job_at_mut(index) else {
                return;
            };
            if let Err(e) = job.start() {
                error!("{}", e);
                return;
            }
            (job.input_path.clone(), job.output_path.clone(), job.delivery_requested)
        };

        if cancel.is_cancelled() {
            info!("Job {}: ⏹️  Batch cancelled before start", index);
            self.fail(index, CANCELLED_DETAIL);
            self.emit_complete(index);
            return;
        }

        info!("Job {}: Starting ffprobe for {}", index, input.display());
        let media = match self.transcoder.probe(&input).await {
            Ok(m) => m,
            Err(e) => {
                error!("Job {}: ffprobe failed: {}", index, e);
                self.fail(index, e.to_string());
                self.emit_complete(index);
                return;
            }
        };

        info!("Job {}: 🎬 Transcoding {} -> {}", index, input.display(), output.display());
        let mut run = self.transcoder.transcode(&input, &output, &media, cancel.clone());
        let outcome = loop {
            match run.next().await {
                Some(TranscodeUpdate::Progress(percent)) => self.progress(index, percent),
                Some(TranscodeUpdate::Finished(result)) => break result,
                None => break Err(TranscodeError::Interrupted),
            }
        };

        match outcome {
            Ok(()) => {
                if let Some(job) = self.queue.job_at_mut(index) {
                    if let Err(e) = job.finish() {
                        error!("{}", e);
                    }
                }
                info!("Job {}: ✅ Transcode complete", index);

                if delivery_requested {
                    let report = self.deliver(index, &input, &output).await;
                    if let Some(job) = self.queue.job_at_mut(index) {
                        job.delivery = Some(report);
                    }
                }
            }
            Err(e) => {
                error!("Job {}: ❌ Transcode failed: {}", index, e);
                self.fail(index, e.to_string());
            }
        }

        self.emit_complete(index);
    }

    async fn deliver(&self, index: usize, input: &Path, output: &Path) -> DeliveryReport {
        let result = match &self.delivery {
            Some(sink) => sink.deliver(output, &self.caption).await,
            None => Err(DeliveryError::NotConfigured),
        };

        match result {
            Ok(()) => {
                let files_deleted = cleanup_files(input, output).await;
                if !files_deleted {
                    warn!("Job {}: delivered, but local files were not fully removed", index);
                }
                DeliveryReport::Delivered { files_deleted }
            }
            Err(e) => {
                warn!("Job {}: ⚠️  Delivery failed, keeping local files: {}", index, e);
                DeliveryReport::Failed { error: e.to_string() }
            }
        }
    }

    fn progress(&mut self, index: usize, percent: f64) {
        let batch = self.queue.batch_id();
        let published = self.queue.job_at_mut(index).and_then(|job| job.advance(percent));
        if let Some(percent) = published {
            self.events.emit(JobEvent::Progress { batch, index, percent });
        }
    }

    fn fail(&mut self, index: usize, detail: impl Into<String>) {
        if let Some(job) = self.queue.job_at_mut(index) {
            if let Err(e) = job.fail(detail) {
                error!("{}", e);
            }
        }
    }

    fn emit_complete(&self, index: usize) {
        if let Some(job) = self.queue.job_at(index) {
            self.events.emit(complete_event(self.queue.batch_id(), job));
        }
    }
}

fn complete_event(batch: BatchId, job: &Job) -> JobEvent {
    JobEvent::Complete {
        batch,
        index: job.index,
        state: job.state,
        detail: job.error_detail.clone(),
        delivery: job.delivery.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::events::Subscription;
    use crate::ffprobe::MediaInfo;
    use crate::job::JobState;
    use crate::transcoder::TranscodeRun;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Scripted behaviour for one input file
    #[derive(Debug, Clone)]
    enum Script {
        Succeed(Vec<f64>),
        ProbeFails,
        EncodeFails(Vec<f64>),
        /// Report one tick then wait for cancellation
        Stall,
    }

    #[derive(Default)]
    struct FakeTranscoder {
        scripts: HashMap<PathBuf, Script>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTranscoder {
        fn with(scripts: Vec<(PathBuf, Script)>) -> Self {
            Self {
                scripts: scripts.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn script(&self, input: &Path) -> Script {
            self.scripts
                .get(input)
                .cloned()
                .unwrap_or(Script::Succeed(vec![50.0]))
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn media() -> MediaInfo {
        MediaInfo {
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            duration_secs: Some(10.0),
            video_codec: Some("hevc".to_string()),
            audio_codec: Some("opus".to_string()),
            width: Some(1280),
            height: Some(720),
        }
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn probe(&self, input: &Path) -> Result<MediaInfo, ProbeError> {
            self.calls.lock().unwrap().push(format!("probe {}", input.display()));
            match self.script(input) {
                Script::ProbeFails => Err(ProbeError::InvalidOutput {
                    path: input.to_path_buf(),
                    reason: "moov atom not found".to_string(),
                }),
                _ => Ok(media()),
            }
        }

        fn transcode(
            &self,
            input: &Path,
            output: &Path,
            _media: &MediaInfo,
            cancel: CancellationToken,
        ) -> TranscodeRun {
            self.calls.lock().unwrap().push(format!("transcode {}", input.display()));
            let (tx, run) = TranscodeRun::channel();
            match self.script(input) {
                Script::Succeed(ticks) => {
                    for t in ticks {
                        tx.send(TranscodeUpdate::Progress(t)).unwrap();
                    }
                    if output.parent().is_some_and(|p| p.exists()) {
                        std::fs::write(output, b"optimized").unwrap();
                    }
                    tx.send(TranscodeUpdate::Finished(Ok(()))).unwrap();
                }
                Script::EncodeFails(ticks) => {
                    for t in ticks {
                        tx.send(TranscodeUpdate::Progress(t)).unwrap();
                    }
                    tx.send(TranscodeUpdate::Finished(Err(TranscodeError::Failed {
                        exit_code: 1,
                        stderr: "Invalid data found when processing input".to_string(),
                    })))
                    .unwrap();
                }
                Script::Stall => {
                    tx.send(TranscodeUpdate::Progress(5.0)).unwrap();
                    tokio::spawn(async move {
                        cancel.cancelled().await;
                        let _ = tx.send(TranscodeUpdate::Finished(Err(TranscodeError::Cancelled)));
                    });
                }
                Script::ProbeFails => unreachable!("transcode after failed probe"),
            }
            run
        }
    }

    #[derive(Default)]
    struct FakeSink {
        fail: bool,
        delivered: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl DeliverySink for FakeSink {
        async fn deliver(&self, output: &Path, caption: &str) -> Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Unreachable("connection refused".to_string()));
            }
            self.delivered
                .lock()
                .unwrap()
                .push((output.to_path_buf(), caption.to_string()));
            Ok(())
        }
    }

    fn drain(sub: &mut Subscription) -> Vec<JobEvent> {
        std::iter::from_fn(|| sub.try_recv()).collect()
    }

    fn completes(events: &[JobEvent]) -> Vec<(usize, JobState)> {
        events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Complete { index, state, .. } => Some((*index, *state)),
                _ => None,
            })
            .collect()
    }

    /// Every progress event for an index precedes its completion, and
    /// completion of `i` precedes any event for `i + 1`
    fn assert_protocol_order(events: &[JobEvent]) {
        let mut current = 0;
        let mut completed = Vec::new();
        for event in events {
            assert!(
                !completed.contains(&event.index()),
                "event after completion for index {}",
                event.index()
            );
            assert!(event.index() >= current, "index went backwards: {:?}", event);
            current = event.index();
            if event.is_complete() {
                completed.push(event.index());
                current += 1;
            }
        }
    }

    async fn run_batch(
        queue: JobQueue,
        transcoder: Arc<FakeTranscoder>,
        sink: Option<Arc<FakeSink>>,
    ) -> (QueueEngine, Vec<JobEvent>) {
        let channel = EventChannel::new();
        let mut sub = channel.subscribe().for_batch(queue.batch_id());
        let sink = sink.map(|s| s as Arc<dyn DeliverySink>);
        let mut engine = QueueEngine::new(queue, transcoder, sink, channel);
        engine.run(&CancellationToken::new()).await;
        let events = drain(&mut sub);
        (engine, events)
    }

    #[tokio::test]
    async fn test_two_valid_files_complete_in_order() {
        let transcoder = Arc::new(FakeTranscoder::with(vec![
            (PathBuf::from("/v/a.mp4"), Script::Succeed(vec![25.0, 75.0])),
            (PathBuf::from("/v/b.mp4"), Script::Succeed(vec![40.0])),
        ]));
        let queue = JobQueue::submit_paths(vec!["/v/a.mp4", "/v/b.mp4"], false);
        let (engine, events) = run_batch(queue, transcoder.clone(), None).await;

        assert_eq!(completes(&events), vec![(0, JobState::Done), (1, JobState::Done)]);
        assert_protocol_order(&events);
        assert!(matches!(events[0], JobEvent::Progress { index: 0, percent, .. } if percent == 25.0));
        assert!(engine.queue().all_terminal());
        assert_eq!(engine.queue().job_at(1).unwrap().progress, 100.0);
        assert_eq!(
            transcoder.calls(),
            vec!["probe /v/a.mp4", "transcode /v/a.mp4", "probe /v/b.mp4", "transcode /v/b.mp4"]
        );
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_stop_batch() {
        let transcoder = Arc::new(FakeTranscoder::with(vec![(
            PathBuf::from("/v/corrupt.mp4"),
            Script::ProbeFails,
        )]));
        let queue = JobQueue::submit_paths(vec!["/v/corrupt.mp4", "/v/good.mp4"], false);
        let (engine, events) = run_batch(queue, transcoder.clone(), None).await;

        assert_eq!(completes(&events), vec![(0, JobState::Error), (1, JobState::Done)]);
        match &events[0] {
            JobEvent::Complete { detail: Some(detail), .. } => assert!(detail.contains("moov atom")),
            other => panic!("expected error completion, got {:?}", other),
        }
        assert!(!transcoder.calls().contains(&"transcode /v/corrupt.mp4".to_string()));
        assert_eq!(engine.queue().summary().failed, 1);
    }

    #[tokio::test]
    async fn test_transcode_failure_skips_delivery() {
        let transcoder = Arc::new(FakeTranscoder::with(vec![(
            PathBuf::from("/v/a.mp4"),
            Script::EncodeFails(vec![10.0]),
        )]));
        let sink = Arc::new(FakeSink::default());
        let queue = JobQueue::submit_paths(vec!["/v/a.mp4"], true);
        let (engine, events) = run_batch(queue, transcoder, Some(sink.clone())).await;

        let job = engine.queue().job_at(0).unwrap();
        assert_eq!(job.state, JobState::Error);
        assert!(job.error_detail.as_deref().unwrap().contains("exited with code 1"));
        assert!(job.delivery.is_none());
        assert!(sink.delivered.lock().unwrap().is_empty());
        assert_protocol_order(&events);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_job_done_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"source").unwrap();

        let transcoder = Arc::new(FakeTranscoder::default());
        let sink = Arc::new(FakeSink { fail: true, ..Default::default() });
        let queue = JobQueue::submit_paths(vec![input.clone()], true);
        let (engine, events) = run_batch(queue, transcoder, Some(sink)).await;

        let job = engine.queue().job_at(0).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert!(matches!(job.delivery, Some(DeliveryReport::Failed { ref error }) if error.contains("unreachable")));
        assert!(input.exists());
        assert!(job.output_path.exists());
        assert!(matches!(
            events.last(),
            Some(JobEvent::Complete { state: JobState::Done, delivery: Some(DeliveryReport::Failed { .. }), .. })
        ));
    }

    #[tokio::test]
    async fn test_delivery_success_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"source").unwrap();

        let transcoder = Arc::new(FakeTranscoder::default());
        let sink = Arc::new(FakeSink::default());
        let queue = JobQueue::submit_paths(vec![input.clone()], true);
        let (engine, _events) = run_batch(queue, transcoder, Some(sink.clone())).await;

        let job = engine.queue().job_at(0).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.delivery, Some(DeliveryReport::Delivered { files_deleted: true }));
        assert!(!input.exists());
        assert!(!job.output_path.exists());

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, dir.path().join("clip-optimized.mp4"));
        assert_eq!(delivered[0].1, DEFAULT_CAPTION);
        assert_eq!(engine.queue().summary().delivered, 1);
    }

    #[tokio::test]
    async fn test_submitted_file_is_never_overwritten_or_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("a-optimized.mp4");
        std::fs::write(&a, b"first").unwrap();
        std::fs::write(&b, b"second").unwrap();

        let queue = JobQueue::submit_paths(vec![a.clone(), b.clone()], false);
        let (engine, events) = run_batch(queue, Arc::new(FakeTranscoder::default()), None).await;

        assert_eq!(completes(&events), vec![(0, JobState::Done)]);
        assert_eq!(std::fs::read(&a).unwrap(), b"first");
        assert_eq!(std::fs::read(&b).unwrap(), b"second");
        assert_eq!(
            engine.queue().job_at(0).unwrap().output_path,
            dir.path().join("a-optimized-optimized.mp4")
        );
    }

    #[tokio::test]
    async fn test_delivered_but_cleanup_incomplete() {
        // Input never existed on disk, so removing it fails
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ghost.mp4");

        let queue = JobQueue::submit_paths(vec![input], true);
        let (engine, _) = run_batch(
            queue,
            Arc::new(FakeTranscoder::default()),
            Some(Arc::new(FakeSink::default())),
        )
        .await;

        let job = engine.queue().job_at(0).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.delivery, Some(DeliveryReport::Delivered { files_deleted: false }));
    }

    #[tokio::test]
    async fn test_delivery_without_sink_is_annotated() {
        let queue = JobQueue::submit_paths(vec!["/v/a.mp4"], true);
        let (engine, _) = run_batch(queue, Arc::new(FakeTranscoder::default()), None).await;

        let job = engine.queue().job_at(0).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert!(matches!(job.delivery, Some(DeliveryReport::Failed { ref error }) if error.contains("not configured")));
    }

    #[tokio::test]
    async fn test_progress_is_clamped_and_monotonic() {
        let transcoder = Arc::new(FakeTranscoder::with(vec![(
            PathBuf::from("/v/a.mp4"),
            Script::Succeed(vec![-5.0, 30.0, 20.0, 30.004, 150.0, 120.0]),
        )]));
        let queue = JobQueue::submit_paths(vec!["/v/a.mp4"], false);
        let (_, events) = run_batch(queue, transcoder, None).await;

        let ticks: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![0.0, 30.0, 30.0, 30.0, 100.0, 100.0]);
    }

    #[tokio::test]
    async fn test_cancel_before_run_completes_every_job() {
        let channel = EventChannel::new();
        let queue = JobQueue::submit_paths(vec!["/v/a.mp4", "/v/b.mp4", "/v/c.mp4"], false);
        let mut sub = channel.subscribe();
        let transcoder = Arc::new(FakeTranscoder::default());
        let mut engine = QueueEngine::new(queue, transcoder.clone(), None, channel);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = engine.run(&cancel).await;

        assert_eq!(summary.failed, 3);
        assert!(engine.queue().all_terminal());
        let events = drain(&mut sub);
        assert_eq!(completes(&events).len(), 3);
        assert!(engine
            .queue()
            .jobs()
            .iter()
            .all(|j| j.error_detail.as_deref() == Some(CANCELLED_DETAIL)));
        assert!(transcoder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_job_stops_batch() {
        let transcoder = Arc::new(FakeTranscoder::with(vec![(
            PathBuf::from("/v/long.mp4"),
            Script::Stall,
        )]));
        let channel = EventChannel::new();
        let mut sub = channel.subscribe();
        let queue = JobQueue::submit_paths(vec!["/v/long.mp4", "/v/next.mp4"], false);
        let mut engine = QueueEngine::new(queue, transcoder.clone(), None, channel);

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                engine.run(&cancel).await;
                engine
            })
        };

        // Wait until the stalled job is visibly running
        let first = sub.recv().await.unwrap();
        assert!(matches!(first, JobEvent::Progress { index: 0, .. }));
        cancel.cancel();

        let engine = handle.await.unwrap();
        let events: Vec<JobEvent> = std::iter::once(first).chain(drain(&mut sub)).collect();
        assert_eq!(completes(&events), vec![(0, JobState::Error), (1, JobState::Error)]);
        assert_eq!(
            engine.queue().job_at(0).unwrap().error_detail.as_deref(),
            Some("transcode cancelled")
        );
        assert!(!transcoder.calls().contains(&"probe /v/next.mp4".to_string()));
    }

    #[tokio::test]
    async fn test_second_run_emits_nothing() {
        let channel = EventChannel::new();
        let mut sub = channel.subscribe();
        let queue = JobQueue::submit_paths(vec!["/v/a.mp4"], false);
        let mut engine = QueueEngine::new(queue, Arc::new(FakeTranscoder::default()), None, channel);

        engine.run(&CancellationToken::new()).await;
        let first = drain(&mut sub);
        engine.run(&CancellationToken::new()).await;

        assert_eq!(completes(&first).len(), 1);
        assert!(drain(&mut sub).is_empty());
    }

    #[test]
    fn test_with_config_rejects_worker_pools() {
        let config = OptimizerConfig {
            workers: 4,
            ..Default::default()
        };
        let result = QueueEngine::with_config(
            &config,
            JobQueue::submit(vec![]),
            Arc::new(FakeTranscoder::default()),
            None,
            EventChannel::new(),
        );
        assert!(matches!(result, Err(ConfigError::UnsupportedWorkers(4))));
    }

    #[test]
    fn test_with_config_uses_caption() {
        let mut config = OptimizerConfig::default();
        config.telegram.caption = "Fresh upload".to_string();
        let engine = QueueEngine::with_config(
            &config,
            JobQueue::submit(vec![]),
            Arc::new(FakeTranscoder::default()),
            None,
            EventChannel::new(),
        )
        .unwrap();
        assert_eq!(engine.caption, "Fresh upload");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Any batch of n <= 10 jobs yields exactly n completions covering 0..n in order
        #[test]
        fn test_one_completion_per_job(
            outcomes in prop::collection::vec(0u8..3, 0..=10),
        ) {
            let paths: Vec<PathBuf> = (0..outcomes.len())
                .map(|i| PathBuf::from(format!("/v/clip{}.mp4", i)))
                .collect();
            let scripts = paths
                .iter()
                .zip(&outcomes)
                .map(|(p, o)| {
                    let script = match o {
                        0 => Script::Succeed(vec![10.0, 60.0]),
                        1 => Script::ProbeFails,
                        _ => Script::EncodeFails(vec![5.0]),
                    };
                    (p.clone(), script)
                })
                .collect();
            let transcoder = Arc::new(FakeTranscoder::with(scripts));
            let queue = JobQueue::submit_paths(paths.clone(), false);

            let rt = tokio::runtime::Runtime::new().unwrap();
            let (engine, events) = rt.block_on(run_batch(queue, transcoder, None));

            let done: Vec<usize> = completes(&events).iter().map(|(i, _)| *i).collect();
            prop_assert_eq!(done, (0..paths.len()).collect::<Vec<_>>());
            assert_protocol_order(&events);
            prop_assert!(engine.queue().all_terminal());
        }
    }
}
