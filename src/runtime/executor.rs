//! Scan runner: drives a prepared tree over every frame of a scan.
//!
//! Workers own deep copies of the tree and only send `(frame_index,
//! results)` back; a single coordinator calls
//! [`WorkflowResults::store_results`], so the composites need no locking
//! while a run is in progress.

use super::policy::{FrameAction, FrameErrorPolicy};
use super::scheduler::{FrameScheduler, FrameTask};
use crate::config::RunnerConfig;
use crate::error::{Result, WorkflowError};
use crate::results::WorkflowResults;
use crate::tree::{FrameResults, WorkflowTree};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Runtime as TokioRuntime;
use tokio::task::JoinHandle;

/// Outcome of one scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames in the scan.
    pub n_total: usize,
    /// Frames processed and stored.
    pub processed: usize,
    /// Stores of frames that had already been stored in this run.
    pub reprocessed: usize,
    /// Frames skipped by the error policy, in arrival order.
    pub skipped: Vec<usize>,
    /// Whether the run stopped because of [`ScanRunner::cancel`].
    ///
    /// Frames the coordinator stored before it saw the flag stay stored
    /// and are counted in `processed`.
    pub cancelled: bool,
}

impl RunSummary {
    fn new(n_total: usize) -> Self {
        Self {
            n_total,
            ..Self::default()
        }
    }

    /// Every frame was stored.
    pub fn is_complete(&self) -> bool {
        self.processed == self.n_total
    }
}

/// Priority boost given to interactive re-process requests.
const REPROCESS_BOOST: i32 = 100;

/// Queue of the latest async run, with its frame count.
type LiveQueue = (Arc<Mutex<FrameScheduler>>, usize);

/// Executes prepared workflow trees over a scan.
pub struct ScanRunner {
    config: RunnerConfig,
    error_policy: Arc<dyn FrameErrorPolicy>,
    /// Tokio runtime for async execution.
    tokio_runtime: TokioRuntime,
    /// Cancellation flag.
    cancelled: Arc<AtomicBool>,
    live_queue: Mutex<Option<LiveQueue>>,
}

impl ScanRunner {
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers())
            .enable_all()
            .build()
            .map_err(|e| WorkflowError::Runtime(format!("Failed to create Tokio runtime: {}", e)))?;

        Ok(Self {
            error_policy: config.error_policy.build(),
            config,
            tokio_runtime,
            cancelled: Arc::new(AtomicBool::new(false)),
            live_queue: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Replace the policy built from the configuration.
    pub fn set_error_policy(&mut self, policy: Arc<dyn FrameErrorPolicy>) {
        self.error_policy = policy;
    }

    /// Stop dispatching frames.
    ///
    /// The coordinator checks the flag before every store, so results that
    /// arrive after it is raised are dropped. Frames already stored remain.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Ask the running async scan to process `frame_index` next.
    ///
    /// The frame is pushed onto the live queue with a priority boost and
    /// its result overwrites the stored slot. Returns `Ok(false)` when no
    /// async run is accepting frames; use [`ScanRunner::process_frame`]
    /// then.
    pub fn reprocess(&self, frame_index: usize) -> Result<bool> {
        let slot = lock(&self.live_queue);
        let Some((queue, n_total)) = slot.as_ref() else {
            return Ok(false);
        };
        if frame_index >= *n_total {
            return Err(WorkflowError::IndexRange {
                index: frame_index,
                n_total: *n_total,
            });
        }

        let mut queue = lock(queue);
        let queued = queue.enqueue(FrameTask::new(frame_index).with_priority(REPROCESS_BOOST));
        if queued {
            tracing::debug!(frame_index, pending = queue.len(), "Queued frame for re-processing");
        }
        Ok(queued)
    }

    /// Process and store a single frame on the calling thread.
    pub fn process_frame(
        &self,
        tree: &mut WorkflowTree,
        results: &mut WorkflowResults,
        frame_index: usize,
    ) -> Result<FrameResults> {
        let frame = tree.execute_process(frame_index)?;
        results.store_results(frame_index, &frame)?;
        Ok(frame)
    }

    /// Process every frame on the calling thread, in ascending order.
    pub fn run_serial(
        &self,
        tree: &mut WorkflowTree,
        results: &mut WorkflowResults,
    ) -> Result<RunSummary> {
        let n_total = check_ready(tree, results)?;
        self.begin_run(n_total, 1);

        let mut summary = RunSummary::new(n_total);
        let mut scheduler = FrameScheduler::for_scan(n_total);
        while let Some(task) = scheduler.pop() {
            if self.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let frame_index = task.frame_index;
            let outcome = tree
                .execute_process(frame_index)
                .and_then(|frame| results.store_results(frame_index, &frame));
            apply_policy(self.error_policy.as_ref(), frame_index, outcome, false, &mut summary)?;
        }

        log_summary(&summary);
        Ok(summary)
    }

    /// Process frames on a rayon pool.
    ///
    /// Each worker clones the prepared tree; results arrive over a channel
    /// in completion order and are stored by the calling thread.
    pub fn run_parallel(
        &self,
        tree: &WorkflowTree,
        results: &mut WorkflowResults,
    ) -> Result<RunSummary> {
        let n_total = check_ready(tree, results)?;
        let workers = self.config.workers();
        self.begin_run(n_total, workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| WorkflowError::Runtime(format!("Failed to create worker pool: {}", e)))?;

        let (tx, rx) = mpsc::channel::<(usize, Result<FrameResults>)>();
        let stop = AtomicBool::new(false);
        let stop_ref = &stop;
        let cancelled = self.cancelled.as_ref();
        let mut summary = RunSummary::new(n_total);

        let outcome = std::thread::scope(|s| {
            s.spawn(move || {
                pool.install(|| {
                    (0..n_total).into_par_iter().for_each_with(
                        (tx, tree.clone()),
                        |(tx, local), frame_index| {
                            if stop_ref.load(Ordering::SeqCst) || cancelled.load(Ordering::SeqCst) {
                                return;
                            }
                            // The coordinator may have hung up after an abort.
                            let _ = tx.send((frame_index, local.execute_process(frame_index)));
                        },
                    );
                });
            });

            for (frame_index, frame) in rx {
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let stored = frame.and_then(|f| results.store_results(frame_index, &f));
                if let Err(e) = apply_policy(
                    self.error_policy.as_ref(),
                    frame_index,
                    stored,
                    false,
                    &mut summary,
                ) {
                    stop_ref.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            }
            Ok(())
        });

        summary.cancelled = self.is_cancelled();
        outcome?;
        log_summary(&summary);
        Ok(summary)
    }

    /// Start a run on the tokio runtime and return immediately.
    ///
    /// Blocking workers pull frames from a shared [`FrameScheduler`]; the
    /// async coordinator stores results into `results` under its mutex, so
    /// other threads can read live composites between frames.
    /// `on_progress(stored, n_total)` is called after every stored frame.
    /// While workers are pulling frames, [`ScanRunner::reprocess`] can put
    /// a frame back at the front of the queue.
    pub fn run_async<P>(
        &self,
        tree: &WorkflowTree,
        results: Arc<Mutex<WorkflowResults>>,
        on_progress: P,
    ) -> Result<JoinHandle<Result<RunSummary>>>
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        let n_total = check_ready(tree, &lock(&results))?;
        let workers = self.config.workers().min(n_total.max(1));
        self.begin_run(n_total, workers);

        let scheduler = Arc::new(Mutex::new(FrameScheduler::for_scan(n_total)));
        *lock(&self.live_queue) = Some((scheduler.clone(), n_total));
        let stop = Arc::new(AtomicBool::new(false));
        let cancelled = self.cancelled.clone();
        let policy = self.error_policy.clone();
        let trees: Vec<WorkflowTree> = (0..workers).map(|_| tree.clone()).collect();

        let handle = self.tokio_runtime.spawn(async move {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

            let mut worker_handles = Vec::with_capacity(trees.len());
            for mut local in trees {
                let tx = tx.clone();
                let scheduler = scheduler.clone();
                let stop = stop.clone();
                let cancelled = cancelled.clone();
                worker_handles.push(tokio::task::spawn_blocking(move || loop {
                    if stop.load(Ordering::SeqCst) || cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    let Some(task) = lock(&scheduler).pop() else {
                        break;
                    };
                    let frame = local.execute_process(task.frame_index);
                    if tx.send((task.frame_index, frame)).is_err() {
                        break;
                    }
                }));
            }
            drop(tx);

            let mut summary = RunSummary::new(n_total);
            let mut done = vec![false; n_total];
            while let Some((frame_index, frame)) = rx.recv().await {
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let stored = frame.and_then(|f| lock(&results).store_results(frame_index, &f));
                let repeat = done.get(frame_index).copied().unwrap_or(false);
                if stored.is_ok() {
                    if let Some(flag) = done.get_mut(frame_index) {
                        *flag = true;
                    }
                }
                if let Err(e) =
                    apply_policy(policy.as_ref(), frame_index, stored, repeat, &mut summary)
                {
                    stop.store(true, Ordering::SeqCst);
                    lock(&scheduler).close();
                    return Err(e);
                }
                on_progress(summary.processed, n_total);
            }
            lock(&scheduler).close();

            for handle in worker_handles {
                handle
                    .await
                    .map_err(|e| WorkflowError::Runtime(format!("Worker task failed: {}", e)))?;
            }

            summary.cancelled = cancelled.load(Ordering::SeqCst);
            log_summary(&summary);
            Ok(summary)
        });

        Ok(handle)
    }

    /// Block until an async run finishes.
    pub fn wait(&self, handle: JoinHandle<Result<RunSummary>>) -> Result<RunSummary> {
        self.tokio_runtime
            .block_on(handle)
            .map_err(|e| WorkflowError::Runtime(format!("Run task failed: {}", e)))?
    }

    fn begin_run(&self, n_total: usize, workers: usize) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.error_policy.reset();
        tracing::info!(n_total, workers, "Starting scan run");
    }
}

/// Number of frames to run, once tree and results are ready.
fn check_ready(tree: &WorkflowTree, results: &WorkflowResults) -> Result<usize> {
    if !tree.is_prepared() {
        return Err(WorkflowError::invalid_state(
            "The workflow tree must be prepared before running a scan",
        ));
    }
    if !results.is_allocated() {
        return Err(WorkflowError::invalid_state(
            "Workflow results must be allocated before running a scan",
        ));
    }
    Ok(results.n_total())
}

/// Count a frame outcome, consulting the policy on failure.
///
/// `repeat` marks a frame already stored earlier in the same run.
fn apply_policy(
    policy: &dyn FrameErrorPolicy,
    frame_index: usize,
    outcome: Result<()>,
    repeat: bool,
    summary: &mut RunSummary,
) -> Result<()> {
    match outcome {
        Ok(()) if repeat => {
            summary.reprocessed += 1;
            Ok(())
        }
        Ok(()) => {
            summary.processed += 1;
            Ok(())
        }
        Err(e) => match policy.on_error(frame_index, &e) {
            FrameAction::Skip => {
                tracing::warn!(frame_index, error = %e, "Skipping failed frame");
                summary.skipped.push(frame_index);
                Ok(())
            }
            FrameAction::Abort => {
                tracing::warn!(frame_index, error = %e, "Aborting scan run");
                Err(e)
            }
        },
    }
}

fn log_summary(summary: &RunSummary) {
    tracing::info!(
        n_total = summary.n_total,
        processed = summary.processed,
        reprocessed = summary.reprocessed,
        skipped = summary.skipped.len(),
        cancelled = summary.cancelled,
        "Scan run finished"
    );
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErrorPolicyConfig;
    use crate::data::{Dataset, GeneratedFrames};
    use crate::plugin::builtin::{FrameLoader, SumFrame};
    use crate::plugin::{DataDim, Kwargs, ParameterCollection, Plugin, PluginInput, PluginType, ShapeState};
    use crate::scan::{ExecutionContext, ScanGeometry};
    use crate::tree::NodeId;
    use std::sync::Barrier;

    /// Fails on frames listed in `bad_frames`, passes data through otherwise.
    /// With a `gate`, frame 0 waits on the barrier twice: once on arrival
    /// and once to be released.
    #[derive(Clone, Default)]
    struct FailOn {
        bad_frames: Vec<usize>,
        gate: Option<Arc<Barrier>>,
        params: ParameterCollection,
        shapes: ShapeState,
    }

    impl Plugin for FailOn {
        fn class_name(&self) -> &'static str {
            "FailOn"
        }

        fn plugin_type(&self) -> PluginType {
            PluginType::Processing
        }

        fn output_data_dim(&self) -> DataDim {
            DataDim::SameAsInput
        }

        fn params(&self) -> &ParameterCollection {
            &self.params
        }

        fn params_mut(&mut self) -> &mut ParameterCollection {
            &mut self.params
        }

        fn shapes(&self) -> &ShapeState {
            &self.shapes
        }

        fn shapes_mut(&mut self) -> &mut ShapeState {
            &mut self.shapes
        }

        fn compute_result_shape(&self, input_shape: Option<&[usize]>) -> Result<Vec<usize>> {
            Ok(input_shape.map(<[usize]>::to_vec).unwrap_or_default())
        }

        fn execute(&mut self, input: PluginInput, kwargs: Kwargs) -> Result<(Dataset, Kwargs)> {
            let data = input.into_dataset("FailOn")?;
            let index = kwargs
                .get(crate::plugin::FRAME_INDEX_KEY)
                .and_then(|v| v.as_int())
                .unwrap_or(-1);
            if let (Some(gate), 0) = (&self.gate, index) {
                gate.wait();
                gate.wait();
            }
            if self.bad_frames.iter().any(|&f| f as i64 == index) {
                return Err(WorkflowError::execution("FailOn", "bad frame"));
            }
            Ok((data, kwargs))
        }

        fn box_clone(&self) -> Box<dyn Plugin> {
            Box::new(self.clone())
        }
    }

    fn setup(n_points: usize, bad_frames: Vec<usize>) -> (WorkflowTree, WorkflowResults, NodeId) {
        setup_with(n_points, FailOn {
            bad_frames,
            ..FailOn::default()
        })
    }

    fn setup_with(n_points: usize, fail_on: FailOn) -> (WorkflowTree, WorkflowResults, NodeId) {
        let scan = ScanGeometry::from_shape(&[n_points]).unwrap();
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        tree.create_and_add_node(Box::new(fail_on), None, None).unwrap();
        let leaf = tree.create_and_add_node(Box::new(SumFrame::new()), None, None).unwrap();

        let ctx = ExecutionContext::new(scan.clone()).with_frame_source(Arc::new(
            GeneratedFrames::frame_index_filled(n_points, &[2, 2]),
        ));
        tree.prepare_execution(&ctx).unwrap();

        let mut results = WorkflowResults::new();
        results.update_shapes_from_scan_and_workflow(&scan, &tree).unwrap();
        (tree, results, leaf)
    }

    fn runner(workers: usize, policy: ErrorPolicyConfig) -> ScanRunner {
        ScanRunner::new(RunnerConfig {
            worker_count: workers,
            error_policy: policy,
        })
        .unwrap()
    }

    fn column(results: &WorkflowResults, node: NodeId) -> Vec<f64> {
        results.get_results(node).unwrap().array().iter().copied().collect()
    }

    #[test]
    fn test_run_serial() {
        let (mut tree, mut results, leaf) = setup(5, vec![]);
        let summary = runner(1, ErrorPolicyConfig::Abort)
            .run_serial(&mut tree, &mut results)
            .unwrap();

        assert!(summary.is_complete());
        assert_eq!(column(&results, leaf), vec![0.0, 4.0, 8.0, 12.0, 16.0]);
    }

    #[test]
    fn test_run_requires_allocation() {
        let (mut tree, _, _) = setup(2, vec![]);
        let mut empty = WorkflowResults::new();
        let result = runner(1, ErrorPolicyConfig::Abort).run_serial(&mut tree, &mut empty);
        assert!(matches!(result, Err(WorkflowError::InvalidState(_))));
    }

    #[test]
    fn test_run_parallel_matches_serial() {
        let (mut tree, mut serial, leaf) = setup(16, vec![]);
        runner(1, ErrorPolicyConfig::Abort)
            .run_serial(&mut tree, &mut serial)
            .unwrap();

        let (tree, mut parallel, _) = setup(16, vec![]);
        let summary = runner(4, ErrorPolicyConfig::Abort)
            .run_parallel(&tree, &mut parallel)
            .unwrap();

        assert_eq!(summary.processed, 16);
        assert_eq!(column(&serial, leaf), column(&parallel, leaf));
    }

    #[test]
    fn test_skip_policy_leaves_zero_fill() {
        let (tree, mut results, leaf) = setup(6, vec![2, 4]);
        let summary = runner(3, ErrorPolicyConfig::Skip)
            .run_parallel(&tree, &mut results)
            .unwrap();

        let mut skipped = summary.skipped.clone();
        skipped.sort_unstable();
        assert_eq!(skipped, vec![2, 4]);
        assert_eq!(summary.processed, 4);
        assert_eq!(column(&results, leaf), vec![0.0, 4.0, 0.0, 12.0, 0.0, 20.0]);
        assert!(!results.is_frame_stored(2));
    }

    #[test]
    fn test_abort_policy_returns_error() {
        let (mut tree, mut results, _) = setup(4, vec![1]);
        let err = runner(1, ErrorPolicyConfig::Abort)
            .run_serial(&mut tree, &mut results)
            .unwrap_err();
        assert!(err.is_execution());
        assert_eq!(results.n_stored_frames(), 1);
    }

    #[test]
    fn test_max_failures_policy() {
        let (mut tree, mut results, _) = setup(5, vec![0, 1, 2]);
        let result = runner(1, ErrorPolicyConfig::MaxFailures { limit: 2 })
            .run_serial(&mut tree, &mut results);
        assert!(result.is_err());
        assert_eq!(results.n_stored_frames(), 0);
    }

    #[test]
    fn test_run_async_with_progress() {
        let (tree, results, leaf) = setup(8, vec![]);
        let results = Arc::new(Mutex::new(results));
        let progress = Arc::new(Mutex::new(Vec::new()));

        let runner = runner(2, ErrorPolicyConfig::Abort);
        let seen = progress.clone();
        let handle = runner
            .run_async(&tree, results.clone(), move |done, total| {
                seen.lock().unwrap().push((done, total));
            })
            .unwrap();
        let summary = runner.wait(handle).unwrap();

        assert!(summary.is_complete());
        assert_eq!(progress.lock().unwrap().len(), 8);
        assert_eq!(progress.lock().unwrap().last(), Some(&(8, 8)));
        let results = results.lock().unwrap();
        assert_eq!(results.get_results(leaf).unwrap().array()[[7, 0]], 28.0);
    }

    #[test]
    fn test_process_frame_overwrites() {
        let (mut tree, mut results, leaf) = setup(3, vec![]);
        let runner = runner(1, ErrorPolicyConfig::Abort);
        runner.run_serial(&mut tree, &mut results).unwrap();

        let frame = runner.process_frame(&mut tree, &mut results, 2).unwrap();
        assert_eq!(frame[&leaf].array()[[0]], 8.0);
        assert_eq!(results.n_stored_frames(), 3);
    }

    #[test]
    fn test_reprocess_jumps_live_queue() {
        let gate = Arc::new(Barrier::new(2));
        let (tree, results, leaf) = setup_with(
            4,
            FailOn {
                gate: Some(gate.clone()),
                ..FailOn::default()
            },
        );
        let results = Arc::new(Mutex::new(results));
        let order = Arc::new(Mutex::new(Vec::new()));

        let runner = runner(1, ErrorPolicyConfig::Abort);
        let seen = order.clone();
        let live = results.clone();
        let handle = runner
            .run_async(&tree, results.clone(), move |_, _| {
                let stored: Vec<usize> =
                    (0..4).filter(|&i| live.lock().unwrap().is_frame_stored(i)).collect();
                seen.lock().unwrap().push(stored);
            })
            .unwrap();

        // The single worker is held on frame 0 until the request is queued.
        assert!(runner.reprocess(3).unwrap());
        assert!(matches!(
            runner.reprocess(4),
            Err(WorkflowError::IndexRange { index: 4, n_total: 4 })
        ));
        gate.wait();
        gate.wait();
        let summary = runner.wait(handle).unwrap();

        assert!(summary.is_complete());
        assert_eq!(summary.reprocessed, 1);
        assert_eq!(order.lock().unwrap()[1], vec![0, 3]);
        assert_eq!(column(&results.lock().unwrap(), leaf), vec![0.0, 4.0, 8.0, 12.0]);

        // The queue closes with the run.
        assert!(!runner.reprocess(1).unwrap());
    }

    #[test]
    fn test_reprocess_without_async_run() {
        let runner = runner(1, ErrorPolicyConfig::Abort);
        assert!(!runner.reprocess(0).unwrap());
    }

    #[test]
    fn test_cancel_drops_late_results() {
        let gate = Arc::new(Barrier::new(2));
        let (tree, mut results, _) = setup_with(
            4,
            FailOn {
                gate: Some(gate.clone()),
                ..FailOn::default()
            },
        );
        let runner = runner(1, ErrorPolicyConfig::Abort);

        let summary = std::thread::scope(|s| {
            let run = s.spawn(|| runner.run_parallel(&tree, &mut results));
            gate.wait();
            runner.cancel();
            gate.wait();
            run.join().unwrap()
        })
        .unwrap();

        assert!(summary.cancelled);
        assert!(!summary.is_complete());
        assert!(!results.is_frame_stored(0));
        assert_eq!(results.n_stored_frames(), summary.processed);
    }

    #[test]
    fn test_cancel_is_reset_by_next_run() {
        let (mut tree, mut results, _) = setup(3, vec![]);
        let runner = runner(1, ErrorPolicyConfig::Abort);
        runner.cancel();
        assert!(runner.is_cancelled());

        let summary = runner.run_serial(&mut tree, &mut results).unwrap();
        assert!(!summary.cancelled);
        assert!(summary.is_complete());
    }
}
