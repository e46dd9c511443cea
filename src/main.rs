use anyhow::Result;
use clap::Parser;

use pathbatch::{
    rendering::backend::{GraphicsBackend, RecordingBackend, WgpuBackend},
    FrameParams, RenderConfig, RenderContext, Viewport,
};

mod demo;
mod offscreen;

use demo::DemoState;
use offscreen::OffscreenTarget;

/// Draws synthetic flight routes through the path batcher and reports how
/// they were batched.
#[derive(Parser, Debug, Clone)]
#[command(name = "pathbatch", version)]
struct Args {
    /// Number of routes to generate
    #[arg(long, default_value_t = 500)]
    routes: usize,

    /// Number of frames to render
    #[arg(long, default_value_t = 240)]
    frames: u64,

    /// Paths per shared batch
    #[arg(long, default_value_t = 256)]
    capacity: usize,

    /// Seed for route generation and mutations
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,

    /// Every Nth frame is a pick frame; 0 disables picking
    #[arg(long, default_value_t = 60)]
    pick_every: u64,

    /// Record draws in memory instead of opening a GPU device
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();
    let config = RenderConfig {
        batch_capacity: args.capacity.max(1),
        ..RenderConfig::default()
    };

    if args.dry_run {
        let mut backend = RecordingBackend::new();
        run(&args, config, &mut backend, |_, _| {}, |_| {});
        log::info!(
            "Recorded {} uploads over {} frames",
            backend.upload_count(),
            backend.frame_count()
        );
    } else {
        pollster::block_on(run_gpu(&args, config))?;
    }

    Ok(())
}

async fn run_gpu(args: &Args, config: RenderConfig) -> Result<()> {
    let target = OffscreenTarget::new(Viewport::new(args.width, args.height)).await?;
    let mut backend = WgpuBackend::new(
        &target.device,
        offscreen::COLOR_FORMAT,
        Some(offscreen::DEPTH_FORMAT),
        &config,
    );

    run(
        args,
        config,
        &mut backend,
        |backend, params| {
            let viewport = (params.viewport.width, params.viewport.height);
            backend.begin_frame(params.view_projection, viewport);
        },
        |backend| target.render_frame(|render_pass| backend.encode(render_pass)),
    );

    log::info!("{} buffers resident at exit", backend.cached_buffer_count());

    Ok(())
}

fn run<B, F, G>(
    args: &Args,
    config: RenderConfig,
    backend: &mut B,
    mut before_frame: F,
    mut after_frame: G,
) where
    B: GraphicsBackend,
    F: FnMut(&mut B, &FrameParams),
    G: FnMut(&mut B),
{
    let mut rc = RenderContext::new(config.clone());
    let mut demo = DemoState::new(&config, rc.globe(), args.routes, args.seed);
    let viewport = Viewport::new(args.width, args.height);

    log::info!("Generated {} routes", demo.route_count());

    for frame in 0..args.frames {
        demo.update(frame, &mut rc);

        let mut params = FrameParams::new(demo.camera.view_projection(viewport), viewport);
        params.pick_mode = args.pick_every > 0 && frame % args.pick_every == args.pick_every - 1;

        before_frame(backend, &params);
        rc.begin_frame(params);
        demo.layer.render(&mut rc, backend);

        if rc.pick_mode() {
            log::debug!("Pick frame {} offered {} objects", frame, rc.picked_objects().len());
        }

        after_frame(backend);
        rc.end_frame();
        backend.end_frame();

        if frame % 60 == 0 || frame + 1 == args.frames {
            log::info!("Frame {}: {:?}", frame, demo.layer.stats(&rc));
        }
    }
}
