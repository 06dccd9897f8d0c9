/// Fixed-size worker pool for data-parallel dispatch.
///
/// A launch hands every worker the same borrowed job; workers claim
/// indices by decrementing a shared atomic counter until it runs dry, then
/// report in. The launching thread blocks until every worker has reported,
/// which is what makes lending a non-`'static` closure to the workers sound.
use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::cell::Cell;
use std::mem;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

thread_local! {
    static IN_WORKER: Cell<bool> = const { Cell::new(false) };
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Working,
}

type Job<'a> = dyn Fn(usize) + Sync + 'a;

#[derive(Copy, Clone)]
struct JobRef {
    job: *const Job<'static>,
    len: usize,
}

// Safety: the pointee is `Sync` and outlives the launch that published it;
// `WorkerPool::for_each_index` does not return before every worker has
// dropped its copy.
unsafe impl Send for JobRef {}

struct Dispatch {
    generation: u64,
    job: Option<JobRef>,
    states: Vec<WorkerState>,
    unfinished_workers: usize,
    shutdown: bool,
}

struct Shared {
    dispatch: Mutex<Dispatch>,
    work_ready: Condvar,
    all_finished: Condvar,
    remaining: AtomicIsize,
    panicked: AtomicBool,
}

impl Shared {
    /// Next unclaimed index, or `None` once the range is exhausted.
    #[inline]
    fn claim(&self, len: usize) -> Option<usize> {
        let left = self.remaining.fetch_sub(1, Ordering::AcqRel);
        (left > 0).then(|| len - left as usize)
    }
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
    /// Serializes launches from different threads.
    launch: Mutex<()>,
    thread_count: usize,
}

impl WorkerPool {
    /// `thread_count == 0` uses the hardware concurrency. A count of 1
    /// spawns no threads; work then runs inline on the caller, in index
    /// order.
    pub fn new(thread_count: usize) -> Result<Self> {
        let thread_count = match thread_count {
            0 => thread::available_parallelism().map_or(1, NonZeroUsize::get),
            n => n,
        };
        let worker_count = if thread_count > 1 { thread_count } else { 0 };

        let shared = Arc::new(Shared {
            dispatch: Mutex::new(Dispatch {
                generation: 0,
                job: None,
                states: vec![WorkerState::Idle; worker_count],
                unfinished_workers: 0,
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            all_finished: Condvar::new(),
            remaining: AtomicIsize::new(0),
            panicked: AtomicBool::new(false),
        });

        let mut pool = Self {
            shared,
            handles: Vec::with_capacity(worker_count),
            launch: Mutex::new(()),
            thread_count,
        };
        for index in 0..worker_count {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("render-worker-{index}"))
                .spawn(move || worker_loop(&shared, index))?;
            pool.handles.push(handle);
        }
        log::debug!("worker pool started with {thread_count} thread(s)");
        Ok(pool)
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// True when launches run on the calling thread.
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.shared.dispatch.lock().states.clone()
    }

    /// Runs `f(i)` once for every `i` in `0..count` and blocks until all
    /// calls have returned. A panic inside `f` is re-raised here.
    ///
    /// Launches issued from inside a pool task run inline.
    pub fn for_each_index<F>(&self, count: usize, f: F)
    where
        F: Fn(usize) + Sync,
    {
        if count == 0 {
            return;
        }
        if self.is_inline() || IN_WORKER.with(Cell::get) {
            (0..count).for_each(f);
            return;
        }

        let _launch = self.launch.lock();
        let job: &Job<'_> = &f;
        // Safety: the lifetime is erased only for the duration of this call;
        // we wait below until no worker can still reach the job.
        let job = unsafe { mem::transmute::<&Job<'_>, *const Job<'static>>(job) };

        self.shared.panicked.store(false, Ordering::Relaxed);
        self.shared.remaining.store(count as isize, Ordering::Release);
        {
            let mut dispatch = self.shared.dispatch.lock();
            dispatch.job = Some(JobRef { job, len: count });
            dispatch.unfinished_workers = self.handles.len();
            dispatch.generation = dispatch.generation.wrapping_add(1);
        }
        self.shared.work_ready.notify_all();

        {
            let mut dispatch = self.shared.dispatch.lock();
            while dispatch.unfinished_workers > 0 {
                self.shared.all_finished.wait(&mut dispatch);
            }
        }

        if self.shared.panicked.swap(false, Ordering::AcqRel) {
            panic!("a worker pool task panicked");
        }
    }

    /// Runs `f` once per element of `items`.
    pub fn for_each<T, F>(&self, items: &[T], f: F)
    where
        T: Sync,
        F: Fn(&T) + Sync,
    {
        self.for_each_index(items.len(), |i| f(&items[i]));
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    IN_WORKER.with(|flag| flag.set(true));
    let mut seen_generation = 0u64;

    loop {
        let job = {
            let mut dispatch = shared.dispatch.lock();
            while dispatch.generation == seen_generation && !dispatch.shutdown {
                shared.work_ready.wait(&mut dispatch);
            }
            if dispatch.shutdown {
                return;
            }
            seen_generation = dispatch.generation;
            dispatch.states[index] = WorkerState::Working;
            dispatch.job
        };

        if let Some(job) = job {
            // Safety: see `JobRef`.
            let f = unsafe { &*job.job };
            while let Some(i) = shared.claim(job.len) {
                if panic::catch_unwind(AssertUnwindSafe(|| f(i))).is_err() {
                    shared.panicked.store(true, Ordering::Release);
                }
            }
        }

        let mut dispatch = shared.dispatch.lock();
        dispatch.states[index] = WorkerState::Idle;
        dispatch.unfinished_workers -= 1;
        if dispatch.unfinished_workers == 0 {
            dispatch.job = None;
            shared.all_finished.notify_all();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.dispatch.lock().shutdown = true;
        self.shared.work_ready.notify_all();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::warn!("render worker exited with a panic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn single_thread_pool_runs_inline_in_order() {
        let pool = WorkerPool::new(1).unwrap();
        assert!(pool.is_inline());

        let order = Mutex::new(Vec::new());
        pool.for_each_index(5, |i| order.lock().push(i));
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn zero_threads_means_hardware_concurrency() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.thread_count() >= 1);
    }

    #[test]
    fn empty_launch_returns_immediately() {
        let pool = WorkerPool::new(4).unwrap();
        let calls = AtomicUsize::new(0);
        pool.for_each_index(0, |_| {
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }
}
