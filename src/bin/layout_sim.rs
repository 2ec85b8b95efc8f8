//! # Layout simulator
//!
//! Runs the layout's transit sequence on mock hardware. A background
//! thread plays the operator: whenever a transit finishes and waits, it
//! presses the button, and the next transit runs.
//!
//! ```text
//! cargo run --features sim --bin layout_sim -- --fast
//! cargo run --features sim --bin layout_sim -- --layout layouts/blackwater.toml --start MU
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cake_layout::hal::{with_mock_devices, LogDisplay, MockClock, StdClock};
use cake_layout::{
    Clock, DeviceRegistry, EventData, EventDisplay, EventKind, EventReport, LayoutConfig,
};
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Model railway layout simulator
#[derive(Parser, Debug)]
#[command(name = "layout_sim")]
#[command(version)]
#[command(about = "Runs the layout's transits on simulated hardware")]
struct Args {
    /// Layout description (TOML). The built-in layout is used if omitted.
    #[arg(long, value_name = "FILE")]
    layout: Option<PathBuf>,

    /// Transit to start from (default: the layout's restart transit).
    #[arg(long, value_name = "KEY")]
    start: Option<String>,

    /// Number of waiting transits the operator acknowledges.
    #[arg(long, default_value_t = 4)]
    stops: u32,

    /// Operator reaction time in milliseconds.
    #[arg(long, default_value_t = 500)]
    press_delay: u64,

    /// Run on simulated time instead of the wall clock.
    #[arg(long)]
    fast: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,
}

/// Logs every event and notes what the consumer must react to.
#[derive(Default)]
struct Operator {
    log: LogDisplay,
    pressed: bool,
    waiting: bool,
}

impl EventDisplay for Operator {
    fn show_event(&mut self, report: &EventReport, devices: &DeviceRegistry) {
        self.log.show_event(report, devices);
        if report.kind == EventKind::Switch && report.data == EventData::Switch(true) {
            self.pressed = true;
        }
    }

    fn transit_done(&mut self, next: Option<&str>) {
        self.log.transit_done(next);
        self.waiting = true;
    }
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(&args);

    let config = match &args.layout {
        Some(path) => LayoutConfig::load(path)
            .with_context(|| format!("loading layout {}", path.display()))?,
        None => LayoutConfig::default(),
    };
    let mut layout = with_mock_devices(&config).context("building simulated layout")?;

    // Operator thread: presses the button after each completion.
    let waiting = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&waiting);
    layout
        .orchestrator_mut()
        .set_callback(move || flag.store(true, Ordering::SeqCst));

    let button = layout
        .event_source(&config.button)
        .context("layout has no button")?;
    let press_delay = Duration::from_millis(args.press_delay);
    let operator = {
        let waiting = Arc::clone(&waiting);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            while !finished.load(Ordering::SeqCst) {
                if !waiting.swap(false, Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }
                thread::sleep(press_delay);
                for pressed in [true, false] {
                    if let Err(e) = button.switched(pressed) {
                        log::warn!("button press lost: {}", e);
                    }
                }
            }
        })
    };

    let wall = StdClock::new();
    let mut sim = MockClock::new();
    let now = |sim: &MockClock| if args.fast { sim.now_ms() } else { wall.now_ms() };

    let start = args.start.as_deref().unwrap_or(&config.restart_transit);
    if layout.orchestrator().transit(start).is_none() {
        bail!("unknown transit {}", start);
    }
    layout
        .run_transit(start, now(&sim))
        .with_context(|| format!("starting transit {}", start))?;

    let mut display = Operator::default();
    let mut acknowledged = 0;
    loop {
        if args.fast {
            match layout.devices().next_deadline() {
                Some(due) => {
                    sim.set(due);
                    layout.pump(due, &mut display);
                }
                None => {
                    let report = layout.queue().next_event();
                    layout.handle_report(&report, sim.now_ms(), &mut display);
                    layout.pump(sim.now_ms(), &mut display);
                }
            }
        } else {
            layout.wait_and_dispatch(&wall, &mut display);
        }

        if display.waiting {
            display.waiting = false;
            if acknowledged == args.stops {
                log::info!("stop budget spent after {} acknowledgements", acknowledged);
                break;
            }
        }
        if display.pressed {
            display.pressed = false;
            acknowledged += 1;
            layout
                .run_current(now(&sim))
                .context("running next transit")?;
        }
        if layout.orchestrator().current_transit().is_none() && layout.is_idle() {
            log::info!("transit sequence complete");
            layout
                .orchestrator_mut()
                .restart(&config.restart_transit)
                .context("selecting restart transit")?;
            break;
        }
    }

    finished.store(true, Ordering::SeqCst);
    if operator.join().is_err() {
        bail!("operator thread panicked");
    }
    log::info!(
        "final route {}, {} ms",
        layout.routes().current_route_name().unwrap_or("none"),
        now(&sim)
    );
    Ok(())
}
