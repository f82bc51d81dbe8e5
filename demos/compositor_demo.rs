use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use strata::common::RectI;
use strata::pipeline::{
    ApplicationAgent, CompositionType, DisplayError, Fence, PipelineMessage, ScreenCapability,
    ScreenMode, SurfaceBuffer, REPEAT_INFINITE,
};
use strata::prelude::*;

/// Prints what each frame would put on screen.
struct LogDevice;

impl HdiDevice for LogDevice {
    fn get_screen_capability(
        &self,
        _screen_id: u64,
    ) -> Result<ScreenCapability, DisplayError> {
        Ok(ScreenCapability {
            name: "demo".to_owned(),
            width: 800,
            height: 600,
            max_layers: 2,
        })
    }

    fn get_screen_supported_modes(
        &self,
        _screen_id: u64,
    ) -> Result<Vec<ScreenMode>, DisplayError> {
        Ok(Vec::new())
    }

    fn prepare_screen_layers(&mut self, _screen_id: u64) -> Result<bool, DisplayError> {
        Ok(false)
    }

    fn set_layer_buffer(
        &mut self,
        _screen_id: u64,
        _layer_id: u32,
        _buffer: &SurfaceBuffer,
    ) -> Result<(), DisplayError> {
        Ok(())
    }

    fn set_layer_crop(
        &mut self,
        screen_id: u64,
        layer_id: u32,
        crop: RectI,
    ) -> Result<(), DisplayError> {
        log::info!("screen {screen_id} layer {layer_id} at {crop:?}");
        Ok(())
    }

    fn set_layer_zorder(&mut self, _screen_id: u64, _layer_id: u32, _zorder: u32) -> Result<(), DisplayError> {
        Ok(())
    }

    fn set_layer_composition_type(
        &mut self,
        _screen_id: u64,
        _layer_id: u32,
        _composition_type: CompositionType,
    ) -> Result<(), DisplayError> {
        Ok(())
    }

    fn commit(&mut self, _screen_id: u64) -> Result<Fence, DisplayError> {
        Ok(Fence::NONE)
    }
}

/// Forwards messages to the UI context and wakes the UI loop.
struct Agent {
    ui: Arc<UiContext>,
    wake: Arc<AtomicBool>,
}

impl ApplicationAgent for Agent {
    fn on_messages(&self, pid: u32, messages: Vec<PipelineMessage>) {
        ApplicationAgent::on_messages(self.ui.as_ref(), pid, messages);
        self.wake.store(true, Ordering::Release);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    strata::init_logging();

    let config = PipelineConfig::from_env();
    let period = config.refresh_period_ns;
    let vsync = Arc::new(SoftwareVsync::new(period)?);
    let pipeline = Pipeline::new(config, vsync).with_composer(ComposerAdapter::new(Box::new(LogDevice)));
    let thread = PipelineThread::spawn(pipeline)?;
    let handle = thread.handle();

    // The render service side of the demo lives in this process too; the
    // client still talks to it through marshalled bytes.
    let connection = Arc::new(RenderServiceConnection::new(
        Arc::new(CommandRegistry::with_builtin_commands()),
        handle.clone(),
    ));
    let sink: Arc<dyn TransactionSink> = connection.clone();
    let service_client: Arc<dyn RenderClient> = Arc::new(RenderServiceClient::new(sink));
    let local_client: Arc<dyn RenderClient> = Arc::new(RenderThreadClient::new(handle.clone()));

    let pid = std::process::id();
    let ui = UiContext::new(pid, false, Some(local_client), Some(service_client));
    let wake = Arc::new(AtomicBool::new(false));
    connection.register_application_agent(
        pid,
        Arc::new(Agent {
            ui: ui.clone(),
            wake: wake.clone(),
        }),
    );

    let display = ui.create_display_node(0);
    let surface = ui.create_surface_node("demo-window");
    surface.set_bounds(100.0, 50.0, 400.0, 300.0);
    display.add_child(&surface, -1);

    let mut director = UiDirector::new(ui.clone());
    let root = ui.create_root_node(false);
    root.set_bounds(0.0, 0.0, 400.0, 300.0);
    root.set_background_color(Color::rgba(24, 24, 32, 255));
    director.set_root(root.clone());
    director.set_surface(surface.clone());

    let card = ui.create_canvas_node(false);
    card.set_bounds(20.0, 20.0, 200.0, 120.0);
    let mut content = DrawCmdList::new(200, 120);
    content.push(DrawOp::RoundRect {
        rect: Vector4f::new(0.0, 0.0, 200.0, 120.0),
        radius: 12.0,
        color: Color::rgba(60, 80, 120, 255),
    });
    card.update_recording(DrawSlot::Content, content);
    root.add_child(&card, -1);

    let pulse = RenderAnimation::new(ui.generate_animation_id(), PropertyUpdate::Alpha(0.2), 500_000_000)
        .repeat(REPEAT_INFINITE)
        .auto_reverse(true);
    card.start_animation(pulse, None);

    let slide_done = Arc::new(AtomicBool::new(false));
    let done = slide_done.clone();
    let slide = RenderAnimation::new(
        ui.generate_animation_id(),
        PropertyUpdate::Translate(Vector2f::new(150.0, 0.0)),
        1_000_000_000,
    );
    card.start_animation(slide, Some(Box::new(move || done.store(true, Ordering::Release))));

    for frame in 0..180u32 {
        director.on_vsync(monotonic_now_ns());
        if wake.swap(false, Ordering::Acquire) {
            log::debug!("messages arrived before frame {frame}");
        }
        if slide_done.swap(false, Ordering::AcqRel) {
            log::info!("slide finished after {frame} frames");
        }
        std::thread::sleep(Duration::from_nanos(period));
    }

    if let Some(tree) = handle.post_sync_task(|pipeline| pipeline.context().dump_tree()) {
        println!("{tree}");
    }
    let stats = handle.stats();
    println!(
        "rendered {} frames, skipped {}, applied {} transactions",
        stats.frames_rendered, stats.frames_skipped, stats.transactions_applied
    );
    Ok(())
}
