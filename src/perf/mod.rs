/// Performance measurement utilities
/// Every pipeline stage is timed under a named term and reported per frame.
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thread_local::ThreadLocal;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PerfTerm {
    All,
    Render,
    ForwardPreZPass,
    ForwardRenderPass,
    ForwardTotalRasterize,
    DeferredLightTransform,
    DeferredGeometryPass,
    DeferredVertex,
    DeferredRasterizeAndPixel,
    DeferredShadingPass,
    TiledFrustumCulling,
    TiledShading,
}

impl PerfTerm {
    pub const COUNT: usize = 12;

    pub const ALL: [PerfTerm; Self::COUNT] = [
        PerfTerm::All,
        PerfTerm::Render,
        PerfTerm::ForwardPreZPass,
        PerfTerm::ForwardRenderPass,
        PerfTerm::ForwardTotalRasterize,
        PerfTerm::DeferredLightTransform,
        PerfTerm::DeferredGeometryPass,
        PerfTerm::DeferredVertex,
        PerfTerm::DeferredRasterizeAndPixel,
        PerfTerm::DeferredShadingPass,
        PerfTerm::TiledFrustumCulling,
        PerfTerm::TiledShading,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PerfTerm::All => "All",
            PerfTerm::Render => "Render",
            PerfTerm::ForwardPreZPass => "Forward PreZ pass",
            PerfTerm::ForwardRenderPass => "Forward render pass",
            PerfTerm::ForwardTotalRasterize => "Forward rasterize (sum)",
            PerfTerm::DeferredLightTransform => "Deferred light transform",
            PerfTerm::DeferredGeometryPass => "Deferred geometry pass",
            PerfTerm::DeferredVertex => "Deferred vertex (sum)",
            PerfTerm::DeferredRasterizeAndPixel => "Deferred rasterize (sum)",
            PerfTerm::DeferredShadingPass => "Deferred shading pass",
            PerfTerm::TiledFrustumCulling => "Tile light culling (sum)",
            PerfTerm::TiledShading => "Tile shading (sum)",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Marks an unset timestamp.
const UNSET: u64 = u64::MAX;

/// One thread's contribution to a term, in nanoseconds since the counters'
/// epoch. Only the owning thread writes; readers sum over all threads.
struct Partial {
    running_since: AtomicU64,
    last_start: AtomicU64,
    accumulated: AtomicU64,
}

impl Default for Partial {
    fn default() -> Self {
        Self {
            running_since: AtomicU64::new(UNSET),
            last_start: AtomicU64::new(UNSET),
            accumulated: AtomicU64::new(0),
        }
    }
}

impl Partial {
    fn reset(&self) {
        self.running_since.store(UNSET, Ordering::Relaxed);
        self.last_start.store(UNSET, Ordering::Relaxed);
        self.accumulated.store(0, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct TermAccumulator {
    partials: ThreadLocal<Partial>,
}

/// Per-term wall-clock accumulators. Each thread accumulates into its own
/// partial sum; reading a term sums the partials, so concurrent
/// begin/end pairs from pool workers add up.
pub struct PerfCounters {
    epoch: Instant,
    terms: [TermAccumulator; PerfTerm::COUNT],
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            terms: Default::default(),
        }
    }

    #[inline]
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    pub fn begin(&self, term: PerfTerm) {
        let now = self.now();
        let partial = self.terms[term.index()].partials.get_or_default();
        debug_assert_eq!(
            partial.running_since.load(Ordering::Relaxed),
            UNSET,
            "{term:?} begun twice on one thread"
        );
        partial.running_since.store(now, Ordering::Relaxed);
        partial.last_start.store(now, Ordering::Relaxed);
    }

    pub fn end(&self, term: PerfTerm) {
        let now = self.now();
        let running = self.terms[term.index()]
            .partials
            .get()
            .map(|partial| (partial, partial.running_since.swap(UNSET, Ordering::Relaxed)))
            .filter(|&(_, since)| since != UNSET);
        match running {
            Some((partial, since)) => {
                partial.accumulated.fetch_add(now.saturating_sub(since), Ordering::Relaxed);
            }
            None => log::warn!("perf term {term:?} ended without a matching begin"),
        }
    }

    /// Times until the returned guard is dropped.
    #[must_use = "the scope is timed until the guard is dropped"]
    pub fn scope(&self, term: PerfTerm) -> PerfScope<'_> {
        self.begin(term);
        PerfScope { counters: self, term }
    }

    /// Sum of all threads' accumulated time for the term.
    pub fn elapsed(&self, term: PerfTerm) -> Duration {
        let nanos = self.terms[term.index()]
            .partials
            .iter()
            .map(|partial| partial.accumulated.load(Ordering::Relaxed))
            .sum();
        Duration::from_nanos(nanos)
    }

    /// Mean of the contributing threads' latest start times, measured from
    /// the creation of these counters. `None` if the term never began.
    pub fn start_time(&self, term: PerfTerm) -> Option<Duration> {
        let (count, total) = self.terms[term.index()]
            .partials
            .iter()
            .map(|partial| partial.last_start.load(Ordering::Relaxed))
            .filter(|&start| start != UNSET)
            .fold((0u64, 0u128), |(count, total), start| (count + 1, total + u128::from(start)));
        if count == 0 {
            return None;
        }
        Some(Duration::from_nanos((total / u128::from(count)) as u64))
    }

    /// Reset every term. Called at the start of each frame, while no
    /// other thread is timing.
    pub fn clear_all(&self) {
        for term in &self.terms {
            term.partials.iter().for_each(Partial::reset);
        }
    }

    pub fn snapshot(&self) -> PerfSnapshot {
        let mut durations = [Duration::ZERO; PerfTerm::COUNT];
        for term in PerfTerm::ALL {
            durations[term.index()] = self.elapsed(term);
        }
        PerfSnapshot { durations }
    }
}

/// RAII guard returned by [`PerfCounters::scope`].
pub struct PerfScope<'a> {
    counters: &'a PerfCounters,
    term: PerfTerm,
}

impl Drop for PerfScope<'_> {
    fn drop(&mut self) {
        self.counters.end(self.term);
    }
}

/// Frozen per-term durations for one frame (or an average of frames).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PerfSnapshot {
    durations: [Duration; PerfTerm::COUNT],
}

impl PerfSnapshot {
    #[inline]
    pub fn get(&self, term: PerfTerm) -> Duration {
        self.durations[term.index()]
    }

    /// Logs every non-zero term with its share of `All`.
    pub fn log_report(&self, title: &str) {
        let total = self.get(PerfTerm::All).as_secs_f64();
        log::info!("========== {title} ==========");
        for term in PerfTerm::ALL {
            let elapsed = self.get(term);
            if elapsed.is_zero() {
                continue;
            }
            let ms = elapsed.as_secs_f64() * 1000.0;
            if total > 0.0 {
                let share = elapsed.as_secs_f64() / total * 100.0;
                log::info!("{:<28}{ms:9.3}ms ({share:6.1}%)", term.label());
            } else {
                log::info!("{:<28}{ms:9.3}ms", term.label());
            }
        }
    }
}

/// Running average of per-frame snapshots.
#[derive(Clone, Debug, Default)]
pub struct FrameStatistics {
    frames: u32,
    totals: [Duration; PerfTerm::COUNT],
}

impl FrameStatistics {
    pub fn record(&mut self, snapshot: &PerfSnapshot) {
        self.frames += 1;
        for (total, frame) in self.totals.iter_mut().zip(snapshot.durations) {
            *total += frame;
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn average(&self) -> PerfSnapshot {
        let mut durations = [Duration::ZERO; PerfTerm::COUNT];
        if self.frames > 0 {
            for (avg, total) in durations.iter_mut().zip(self.totals) {
                *avg = total / self.frames;
            }
        }
        PerfSnapshot { durations }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
