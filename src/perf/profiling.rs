/// Function call counters for microoptimization.
/// Incremented through `count_call!`/`count_add!`, which compile to nothing
/// unless the `profiling` feature is enabled.
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! function_counters {
    ($($name:ident => $label:literal),* $(,)?) => {
        /// Thread-safe performance counters for function call tracking
        pub struct FunctionCounters {
            $(pub $name: AtomicU64,)*
        }

        impl FunctionCounters {
            pub const fn new() -> Self {
                Self { $($name: AtomicU64::new(0),)* }
            }

            /// Reset all counters to zero
            pub fn reset(&self) {
                $(self.$name.store(0, Ordering::Relaxed);)*
            }

            pub fn snapshot(&self) -> CounterSnapshot {
                CounterSnapshot { $($name: self.$name.load(Ordering::Relaxed),)* }
            }
        }

        /// Snapshot of counter values at a point in time
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct CounterSnapshot {
            $(pub $name: u64,)*
        }

        impl CounterSnapshot {
            pub fn entries(&self) -> Vec<(&'static str, u64)> {
                vec![$(($label, self.$name),)*]
            }
        }
    };
}

function_counters! {
    triangles_submitted => "triangles submitted",
    triangles_backface_culled => "triangles back-face culled",
    triangles_trivially_rejected => "triangles trivially rejected",
    triangles_near_clipped => "triangles near clipped",
    triangles_degenerate => "degenerate triangles",
    lines_drawn => "wireframe edges drawn",
    fragments_tested => "fragments depth tested",
    fragments_passed => "fragments passed",
    fragments_failed => "fragments failed",
    entities_culled => "entities frustum culled",
    tiles_shaded => "tiles shaded",
    tile_light_candidates => "tile light candidates",
    framebuffer_clears => "framebuffer clears",
}

impl Default for FunctionCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSnapshot {
    pub fn log_report(&self) {
        log::info!("=== Function counters ===");
        for (label, value) in self.entries() {
            log::info!("  {label:<30}{value:12}");
        }
        if self.fragments_tested > 0 {
            let pass_rate = self.fragments_passed as f64 / self.fragments_tested as f64 * 100.0;
            log::info!("  {:<30}{pass_rate:11.2}%", "depth test pass rate");
        }
    }
}

/// Global function counters instance
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Increment a counter (only when the profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Add to a counter (only when the profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value as u64, std::sync::atomic::Ordering::Relaxed);
        }
    };
}
