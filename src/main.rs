/// Headless benchmark driver
/// Renders the demo scene with both pipelines at several thread counts and
/// logs averaged per-stage timings.
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use soft_renderer::scene::demo::{build_demo_scene, demo_camera, DemoSceneConfig};
use soft_renderer::*;
use std::time::Instant;

const WARMUP_FRAMES: u32 = 2;
const DEFAULT_FRAMES: u32 = 20;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let frames = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);

    let config = RendererConfig::default().with_resolution(1280, 720);
    let scene_start = Instant::now();
    let scene = build_demo_scene(&DemoSceneConfig::default())?;
    log::info!(
        "Scene built in {:.2}ms: {} entities, {} triangles, {} lights",
        scene_start.elapsed().as_secs_f64() * 1000.0,
        scene.entities().len(),
        scene.triangle_count(),
        scene.lights().len()
    );
    let camera = demo_camera(config.aspect_ratio());

    let max_threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let mut thread_counts = vec![1, max_threads];
    thread_counts.dedup();

    let mut renderer = Renderer::new(config)?;
    for kind in [PipelineKind::Forward, PipelineKind::Deferred] {
        renderer.switch_pipeline(kind)?;
        for &threads in &thread_counts {
            renderer.set_thread_count(threads)?;
            FUNCTION_COUNTERS.reset();

            for _ in 0..WARMUP_FRAMES {
                renderer.render_frame(&scene, &camera)?;
            }
            let mut stats = FrameStatistics::default();
            for _ in 0..frames {
                renderer.render_frame(&scene, &camera)?;
                stats.record(&renderer.perf_snapshot());
            }

            let title = format!("{kind:?} | {threads} thread(s) | {} frames", stats.frames());
            stats.average().log_report(&title);
            log::info!("image checksum: {:016x}", checksum(&renderer.to_argb32()));

            #[cfg(feature = "profiling")]
            FUNCTION_COUNTERS.snapshot().log_report();
        }
    }

    Ok(())
}

/// FNV-1a over the packed pixels; equal across thread counts for a
/// deterministic scene.
fn checksum(pixels: &[u32]) -> u64 {
    pixels.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &pixel| {
        (hash ^ u64::from(pixel)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
