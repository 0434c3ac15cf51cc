//! Dispatching forward, backward, Viterbi, and parameter estimation of pairs to worker threads.
//! Each task owns its output buffers. The sequence of the pair is shared read-only,
//! and only the `Optimize` task writes into the shared parameters.
//! The result of each task is sent back through the channel given at submission.
use crate::dptable::DPTable;
use crate::error::{DispatchError, Result};
use crate::hmm::{CoancestryDecay, IbdHmm, Parameters, Sequence, State, TransitionKernel};
use crate::optim::Minimizer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Forward = 1,
    Backward = 2,
    Viterbi = 3,
    Optimize = 4,
}

impl std::convert::TryFrom<u8> for TaskKind {
    type Error = DispatchError;
    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(TaskKind::Forward),
            2 => Ok(TaskKind::Backward),
            3 => Ok(TaskKind::Viterbi),
            4 => Ok(TaskKind::Optimize),
            _ => Err(DispatchError::UnknownTaskKind(code)),
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskKind::Forward => "forward",
            TaskKind::Backward => "backward",
            TaskKind::Viterbi => "viterbi",
            TaskKind::Optimize => "optimize",
        };
        write!(f, "{}", name)
    }
}

/// Buffers and parameters, specific to each kind of task.
#[derive(Debug)]
pub enum Payload {
    Forward {
        params: Parameters,
        table: DPTable,
    },
    Backward {
        params: Parameters,
        table: DPTable,
    },
    Viterbi {
        params: Parameters,
        table: DPTable,
        path: Vec<State>,
    },
    /// The optimized parameters would be written back to `params`.
    Optimize { params: Arc<Mutex<Parameters>> },
}

#[derive(Debug)]
pub struct Task {
    pub id: usize,
    pub pair: Arc<Sequence>,
    pub payload: Payload,
    reply: Sender<Completed>,
}

/// Result of a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Forward { table: DPTable, lk: f64 },
    Backward { table: DPTable, lk: f64 },
    Viterbi {
        table: DPTable,
        path: Vec<State>,
        score: f64,
    },
    Optimize { params: Parameters },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub id: usize,
    pub output: Result<TaskOutput>,
}

impl Task {
    /// Create a task of `kind` with freshly allocated buffers.
    /// Forward, backward, and Viterbi tasks take a snapshot of `params` here.
    pub fn new(
        kind: TaskKind,
        id: usize,
        pair: Arc<Sequence>,
        params: &Arc<Mutex<Parameters>>,
        reply: Sender<Completed>,
    ) -> Result<Self> {
        let snapshot = || -> Result<Parameters> {
            params
                .lock()
                .map(|p| *p)
                .map_err(|_| DispatchError::LockFailure)
        };
        let length = pair.length();
        let payload = match kind {
            TaskKind::Forward => Payload::Forward {
                params: snapshot()?,
                table: DPTable::new(length, 0f64),
            },
            TaskKind::Backward => Payload::Backward {
                params: snapshot()?,
                table: DPTable::new(length, 0f64),
            },
            TaskKind::Viterbi => Payload::Viterbi {
                params: snapshot()?,
                table: DPTable::new(length, 0f64),
                path: vec![State::NonIbd; length + 1],
            },
            TaskKind::Optimize => Payload::Optimize {
                params: params.clone(),
            },
        };
        Ok(Self::with_payload(id, pair, payload, reply))
    }
    /// Create a task from caller-allocated buffers.
    pub fn with_payload(
        id: usize,
        pair: Arc<Sequence>,
        payload: Payload,
        reply: Sender<Completed>,
    ) -> Self {
        Self {
            id,
            pair,
            payload,
            reply,
        }
    }
    pub fn kind(&self) -> TaskKind {
        match self.payload {
            Payload::Forward { .. } => TaskKind::Forward,
            Payload::Backward { .. } => TaskKind::Backward,
            Payload::Viterbi { .. } => TaskKind::Viterbi,
            Payload::Optimize { .. } => TaskKind::Optimize,
        }
    }
    /// Run the task to completion on the current thread, and send the result.
    pub fn run<K, M>(self, hmm: &IbdHmm<K>, minimizer: &M)
    where
        K: TransitionKernel,
        M: Minimizer + ?Sized,
    {
        let Self {
            id,
            pair,
            payload,
            reply,
        } = self;
        trace!("TASK\t{}\tStart", id);
        let output = match payload {
            Payload::Forward { params, mut table } => {
                let lk = hmm.forward_into(&pair, &params, &mut table);
                Ok(TaskOutput::Forward { table, lk })
            }
            Payload::Backward { params, mut table } => {
                let lk = hmm.backward_into(&pair, &params, &mut table);
                Ok(TaskOutput::Backward { table, lk })
            }
            Payload::Viterbi {
                params,
                mut table,
                mut path,
            } => {
                let score = hmm.viterbi_into(&pair, &params, &mut table, &mut path);
                Ok(TaskOutput::Viterbi { table, path, score })
            }
            Payload::Optimize { params } => optimize(hmm, minimizer, &pair, &params),
        };
        if let Err(why) = &output {
            error!("TASK\t{}\t{}", id, why);
        }
        if reply.send(Completed { id, output }).is_err() {
            debug!("TASK\t{}\tThe receiver has been dropped.", id);
        }
    }
}

fn optimize<K: TransitionKernel, M: Minimizer + ?Sized>(
    hmm: &IbdHmm<K>,
    minimizer: &M,
    pair: &Sequence,
    params: &Mutex<Parameters>,
) -> Result<TaskOutput> {
    let init = *params.lock().map_err(|_| DispatchError::LockFailure)?;
    let optimized = hmm.optimize(pair, &init, minimizer);
    *params.lock().map_err(|_| DispatchError::LockFailure)? = optimized;
    Ok(TaskOutput::Optimize { params: optimized })
}

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something which runs a job, possibly on another thread.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Maximum number of the jobs queued or running.
    pub queue_capacity: usize,
}

impl PoolConfig {
    pub fn new(threads: usize, queue_capacity: usize) -> Self {
        Self {
            threads,
            queue_capacity,
        }
    }
}

impl std::default::Default for PoolConfig {
    fn default() -> Self {
        Self::new(1, 1024)
    }
}

#[derive(Debug)]
struct PoolState {
    pending: Mutex<usize>,
    idle: Condvar,
    capacity: usize,
    shutting_down: AtomicBool,
    failed: AtomicBool,
}

impl PoolState {
    fn finish(&self) {
        let mut pending = match self.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        *pending -= 1;
        self.idle.notify_all();
    }
}

/// A fixed-size pool of worker threads with a bounded queue.
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    state: Arc<PoolState>,
}

impl WorkerPool {
    /// If the threads could not be spawned, the pool is invalid and rejects every job.
    pub fn new(config: &PoolConfig) -> Self {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("ibdhmm-worker-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(why) => {
                error!("Could not build the thread pool:{:?}", why);
                None
            }
        };
        let state = PoolState {
            pending: Mutex::new(0),
            idle: Condvar::new(),
            capacity: config.queue_capacity,
            shutting_down: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        };
        Self {
            pool,
            state: Arc::new(state),
        }
    }
    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map(|p| p.current_num_threads())
            .unwrap_or(0)
    }
    /// Block until every accepted job finishes.
    pub fn join(&self) -> Result<()> {
        let mut pending = self
            .state
            .pending
            .lock()
            .map_err(|_| DispatchError::LockFailure)?;
        while 0 < *pending {
            pending = self
                .state
                .idle
                .wait(pending)
                .map_err(|_| DispatchError::LockFailure)?;
        }
        match self.state.failed.load(Ordering::SeqCst) {
            true => Err(DispatchError::WorkerFailure),
            false => Ok(()),
        }
    }
    /// Reject further jobs and wait for the accepted ones.
    pub fn shutdown(&self) -> Result<()> {
        self.state.shutting_down.store(true, Ordering::SeqCst);
        self.join()
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) -> Result<()> {
        let pool = self.pool.as_ref().ok_or(DispatchError::InvalidPool)?;
        if self.state.shutting_down.load(Ordering::SeqCst) {
            return Err(DispatchError::ShuttingDown);
        }
        if self.state.failed.load(Ordering::SeqCst) {
            return Err(DispatchError::WorkerFailure);
        }
        {
            let mut pending = self
                .state
                .pending
                .lock()
                .map_err(|_| DispatchError::LockFailure)?;
            if self.state.capacity <= *pending {
                return Err(DispatchError::QueueFull);
            }
            *pending += 1;
        }
        let state = self.state.clone();
        pool.spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job));
            if result.is_err() {
                error!("A worker panicked.");
                state.failed.store(true, Ordering::SeqCst);
            }
            state.finish();
        });
        Ok(())
    }
}

/// Run each job immediately on the caller's thread.
/// If `refusal` is set, every job is rejected with that error instead.
#[derive(Debug, Clone, Default)]
pub struct InlineExecutor {
    pub refusal: Option<DispatchError>,
}

impl InlineExecutor {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn refusing(why: DispatchError) -> Self {
        Self { refusal: Some(why) }
    }
}

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) -> Result<()> {
        match self.refusal {
            Some(why) => Err(why),
            None => {
                job();
                Ok(())
            }
        }
    }
}

/// Submit tasks of pairs to an executor.
pub struct Dispatcher<E: Executor, K: TransitionKernel + 'static = CoancestryDecay> {
    executor: E,
    hmm: Arc<IbdHmm<K>>,
    minimizer: Arc<dyn Minimizer>,
}

impl<E: Executor, K: TransitionKernel + 'static> Dispatcher<E, K> {
    pub fn new(executor: E, hmm: IbdHmm<K>, minimizer: Arc<dyn Minimizer>) -> Self {
        Self {
            executor,
            hmm: Arc::new(hmm),
            minimizer,
        }
    }
    pub fn executor(&self) -> &E {
        &self.executor
    }
    pub fn hmm(&self) -> &IbdHmm<K> {
        &self.hmm
    }
    /// Hand `task` to the executor. A rejected task is dropped without running.
    pub fn submit(&self, task: Task) -> Result<()> {
        let (id, kind) = (task.id, task.kind());
        let hmm = self.hmm.clone();
        let minimizer = self.minimizer.clone();
        let job: Job = Box::new(move || task.run(hmm.as_ref(), minimizer.as_ref()));
        self.executor.execute(job).map_err(|why| {
            error!("Could not submit {} task of {}: {}", kind, id, why);
            why
        })
    }
    /// Build a task from its numeric kind(1:forward, 2:backward, 3:Viterbi, 4:optimize)
    /// and submit it.
    pub fn submit_task(
        &self,
        code: u8,
        id: usize,
        pair: Arc<Sequence>,
        params: &Arc<Mutex<Parameters>>,
        reply: Sender<Completed>,
    ) -> Result<()> {
        use std::convert::TryFrom;
        let kind = TaskKind::try_from(code).map_err(|why| {
            error!("Could not submit a task of {}: {}", id, why);
            why
        })?;
        let task = Task::new(kind, id, pair, params, reply)?;
        self.submit(task)
    }
}
