use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use embedded_hal::digital::OutputPin;
use hub75_pimatrix::{
    gpio, quantize, Color, ColumnShift, Hub75Display, PanelConfig, PanelError,
    StatusCallback, VirtualPanel, PANEL_HEIGHT, PANEL_WIDTH,
};
use log::{error, info, warn};
use rand::Rng;

const FPS: u32 = 30;
const SPARKLES_PER_FRAME: usize = 24;

struct Args {
    config: PathBuf,
    simulate: bool,
    seconds: Option<u64>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: PathBuf::from("config.json"),
        simulate: false,
        seconds: None,
    };
    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--simulate" => args.simulate = true,
            "--seconds" => {
                let value = it.next().context("--seconds needs a value")?;
                args.seconds = Some(value.parse().context("--seconds must be a whole number")?);
            }
            path => args.config = PathBuf::from(path),
        }
    }
    Ok(args)
}

/// Draws random full-intensity sparkles over whatever is on the panel until
/// `running` is cleared. Each tick puts back the pixels the previous tick
/// covered, so the background is never cleared while it is being scanned.
fn spawn_sparkles<P, S>(
    display: &Hub75Display<P, S>,
    running: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>>
where
    P: OutputPin,
    S: ColumnShift,
{
    let fb = display.framebuffer();
    let handle = thread::Builder::new()
        .name("sparkles".to_string())
        .spawn(move || {
            let mut rng = rand::thread_rng();
            let mut covered: Vec<(i32, i32, Color)> = Vec::with_capacity(SPARKLES_PER_FRAME);
            let period = Duration::from_secs_f32(1.0 / (FPS as f32));
            while running.load(Ordering::Acquire) {
                let start = Instant::now();
                // reverse order so overlapping sparkles restore the original pixel
                for (x, y, color) in covered.drain(..).rev() {
                    fb.set_pixel(x, y, color);
                }
                for _ in 0..SPARKLES_PER_FRAME {
                    let x = rng.gen_range(0..PANEL_WIDTH as i32);
                    let y = rng.gen_range(0..PANEL_HEIGHT as i32);
                    if let Some(under) = fb.pixel(x, y) {
                        covered.push((x, y, under));
                    }
                    fb.set_pixel(x, y, quantize::expand(rng.gen_range(1..8)));
                }
                fb.present();

                let elapsed = start.elapsed();
                if period > elapsed {
                    thread::sleep(period - elapsed);
                }
            }
        })
        .context("Failed to spawn sparkle thread")?;
    Ok(handle)
}

fn run<P, S>(display: &mut Hub75Display<P, S>, seconds: Option<u64>) -> Result<()>
where
    P: OutputPin + Send + 'static,
    S: ColumnShift + Send + 'static,
{
    let on_fault: StatusCallback = Arc::new(|err: &PanelError| {
        error!("panel fault, check wiring: {}", err);
    });
    display.set_status_callback(Some(on_fault));
    display.test_pattern();
    display.present();
    display.start().context("Failed to start display refresh")?;

    let running = Arc::new(AtomicBool::new(true));
    let sparkles = spawn_sparkles(display, Arc::clone(&running))?;

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let stats = display.stats();
    loop {
        thread::sleep(Duration::from_secs(1));
        info!(
            "{} frames, last frame {}us, {} faults",
            stats.frames(),
            stats.last_frame_time().as_micros(),
            stats.faults()
        );
        if deadline.map_or(false, |d| Instant::now() >= d) {
            break;
        }
    }

    running.store(false, Ordering::Release);
    if sparkles.join().is_err() {
        warn!("sparkle thread panicked");
    }
    display.stop();
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let args = parse_args()?;
    let config = PanelConfig::load_or_default(&args.config);
    config.validate().context("Invalid panel configuration")?;

    if args.simulate {
        info!("simulating panel in-process");
        let panel = VirtualPanel::new();
        let mut display = Hub75Display::from_pins(panel.pins(), &config.display_options())?;
        run(&mut display, Some(args.seconds.unwrap_or(3)))?;
        display.refresh_once();
        print!("{}", panel.render_ascii());
    } else {
        let mut display = gpio::open_display(&config).context("Failed to open HUB75 panel")?;
        run(&mut display, args.seconds)?;
    }
    Ok(())
}
