use std::{ops::ControlFlow, path::PathBuf, time::Duration};

use beatpulse_core::{
    AppConfig, AudioBuffer, AudioDecoder, ClockedOutput, MonotonicClock, Performance,
    PlaybackPhase, Quantize, Reactor, SceneGraph, SystemClock, TempoConfig, TempoModel,
    WavDecoder,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> beatpulse_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            input,
            config,
            tempo,
            silence_ms,
            max_ms,
        } => run_play(input, config, &tempo, silence_ms, max_ms),
        Commands::Interval { tempo } => {
            run_interval(&tempo);
            Ok(())
        }
    }
}

fn run_play(
    input: Option<PathBuf>,
    config_path: Option<PathBuf>,
    overrides: &TempoArgs,
    silence_ms: Option<f64>,
    max_ms: Option<f64>,
) -> beatpulse_core::Result<()> {
    let mut config = match config_path.as_ref() {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    config.tempo = overrides.apply(config.tempo);
    tracing::info!(?input, tempo = ?config.tempo, "starting performance");

    let clock = SystemClock::new();
    let mut scene = SceneGraph::new();
    for performer in &config.performers {
        scene.add_reactor(Reactor::new(performer.id.clone(), performer.kind));
    }

    let mut performance = Performance::new(ClockedOutput::new(clock), scene, config.tempo);
    for spec in config.performer_specs()? {
        performance.register_performer(spec)?;
    }

    if let Some(path) = input.as_ref() {
        let bytes = std::fs::read(path)?;
        performance.load(WavDecoder.decode(&bytes)?);
    } else if let Some(duration_ms) = silence_ms {
        performance.load(AudioBuffer::silence(duration_ms, 8_000));
    }
    performance.play()?;

    // The surface comes up after playback has started, like a window that
    // takes a moment to open; early pulses are buffered until then.
    performance.surface_mut().initialize();

    let frame_interval_ms = config.render.frame_interval_ms();
    let mut last_frame_ms = clock.now_ms();
    loop {
        let now = clock.now_ms();
        if max_ms.map(|limit| now >= limit).unwrap_or(false) {
            performance.stop();
        }

        performance.tick_with(now, |event| {
            tracing::info!(
                index = event.index,
                scheduled_at_ms = event.scheduled_at_ms,
                late_ms = now - event.scheduled_at_ms,
                off_beat = event.is_off_beat,
                skipped = event.skipped_slots,
                "beat"
            );
            ControlFlow::Continue(())
        });

        if now - last_frame_ms >= frame_interval_ms {
            performance.render_frame(((now - last_frame_ms) / 1_000.0) as f32);
            last_frame_ms = now;
        }

        if performance.status().phase == PlaybackPhase::Stopped {
            break;
        }
        std::thread::sleep(Duration::from_secs_f64(performance.poll_period_ms() / 1_000.0));
    }

    let status = performance.status();
    tracing::info!(
        beats = status.beat_count,
        interval_ms = status.interval_ms,
        "performance finished"
    );
    Ok(())
}

fn run_interval(tempo: &TempoArgs) {
    let config = tempo.apply(TempoConfig::default());
    let interval = TempoModel::compute_interval(&config);
    println!(
        "bpm {:.2} ({}) -> interval {:.3} ms, swing delay {:.3} ms, poll every {:.3} ms",
        TempoModel::clamp_bpm(config.bpm),
        config.quantize,
        interval.interval_ms,
        interval.swing_offset_ms(1),
        interval.poll_period_ms()
    );
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat-synchronised visual performance engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play an audio file and drive the reactors from the beat grid.
    Play {
        /// WAV file to play. Omit together with --silence-ms for a silent run.
        input: Option<PathBuf>,
        /// JSON configuration with tempo, performers and render settings.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        tempo: TempoArgs,
        /// Play this many milliseconds of silence when no file is given.
        #[arg(long)]
        silence_ms: Option<f64>,
        /// Stop after this many milliseconds even if audio is still playing.
        #[arg(long)]
        max_ms: Option<f64>,
    },
    /// Print the beat interval for a tempo setting.
    Interval {
        #[command(flatten)]
        tempo: TempoArgs,
    },
}

/// Tempo flags; any flag given overrides the configuration file.
#[derive(Args, Debug)]
struct TempoArgs {
    #[arg(long, allow_negative_numbers = true)]
    bpm: Option<f64>,
    /// 1/1, 1/2 or 1/4.
    #[arg(long)]
    quantize: Option<Quantize>,
    /// Off-beat delay in percent, 0 to 60.
    #[arg(long, allow_negative_numbers = true)]
    swing: Option<f64>,
    /// Shift of the beat grid relative to the audio start, in milliseconds.
    #[arg(long, allow_negative_numbers = true)]
    offset: Option<f64>,
}

impl TempoArgs {
    fn apply(&self, mut config: TempoConfig) -> TempoConfig {
        if let Some(bpm) = self.bpm {
            config.bpm = bpm;
        }
        if let Some(quantize) = self.quantize {
            config.quantize = quantize;
        }
        if let Some(swing) = self.swing {
            config.swing_percent = swing;
        }
        if let Some(offset) = self.offset {
            config.start_offset_ms = offset;
        }
        config
    }
}
