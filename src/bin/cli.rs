use anyhow::{bail, Context, Result};
use camwriter::capture::{spawn_producer, SourceConnection, SyntheticCamera};
use camwriter::recording::{Mp4SinkFactory, RecordingController, Transition};
use camwriter::{CamWriterConfig, Frame};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    camwriter::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: camwriter-cli <record|last|config> [args]");
        std::process::exit(1);
    }

    match args[1].as_str() {
        "record" => cmd_record(&args),
        "last" => cmd_last(&args),
        "config" => cmd_config(&args),
        other => {
            eprintln!("Unknown command: {}", other);
            std::process::exit(1);
        }
    }
}

fn config_path(args: &[String]) -> PathBuf {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(CamWriterConfig::default_path)
}

fn load_config(args: &[String]) -> Result<CamWriterConfig> {
    let config = CamWriterConfig::load_from_file(config_path(args))?;
    if let Err(msg) = config.validate() {
        bail!("invalid configuration: {}", msg);
    }
    Ok(config)
}

fn cmd_record(args: &[String]) -> Result<()> {
    // record [--seconds <n>] [--config <path>] [--json]
    let mut seconds = 5.0f64;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--seconds" => {
                i += 1;
                let value = args.get(i).context("--seconds needs a value")?;
                seconds = value.parse().context("--seconds must be a number")?;
            }
            "--config" => i += 1,
            "--json" => json = true,
            other => bail!("unexpected argument: {}", other),
        }
        i += 1;
    }

    let config = load_config(args)?;
    let controller = RecordingController::from_config(Mp4SinkFactory::new(), &config);

    let stop_flag = Arc::new(AtomicBool::new(false));
    {
        let stop_flag = Arc::clone(&stop_flag);
        ctrlc::set_handler(move || stop_flag.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let [width, height] = config.capture.native_resolution;
    let camera = SyntheticCamera::new(width, height, config.capture.fps);
    let producer_side = controller.clone();
    let producer = spawn_producer(
        camera,
        SourceConnection::new("synthetic"),
        move |frame: &Frame, connection: &mut SourceConnection| {
            producer_side.on_frame(frame, connection);
        },
        Arc::clone(&stop_flag),
    )
    .context("failed to start capture thread")?;

    controller.toggle_recording()?;
    println!(
        "Recording to {} for {:.1}s (Ctrl-C to stop early)",
        controller.output_path().display(),
        seconds
    );

    let deadline = Instant::now() + Duration::from_secs_f64(seconds.max(0.0));
    while Instant::now() < deadline && !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    let transition = controller.toggle_recording()?;
    stop_flag.store(true, Ordering::SeqCst);
    let produced = producer
        .join()
        .map_err(|_| anyhow::anyhow!("capture thread panicked"))?;

    let Transition::Stopped {
        finalize: Some(handle),
    } = transition
    else {
        bail!("recording produced no output");
    };
    let stats = handle.wait()?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!(
            "Wrote {} frames ({} dropped, {} delivered), {:.2}s, {} bytes -> {}",
            stats.video_frames,
            stats.dropped_frames,
            produced.frames_delivered,
            stats.duration_secs,
            stats.bytes_written,
            stats.output_path.display()
        );
    }
    Ok(())
}

fn cmd_last(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let path = config.storage.output_path();
    if path.exists() {
        println!("{}", path.display());
    } else {
        log::warn!("Can't get video url: no recording at {}", path.display());
        println!("No recording yet");
    }
    Ok(())
}

fn cmd_config(args: &[String]) -> Result<()> {
    // config <init|show> [--config <path>]
    let action = args.get(2).map(String::as_str).unwrap_or("show");
    let path = config_path(args);
    match action {
        "init" => {
            CamWriterConfig::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        "show" => {
            let config = load_config(args)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        other => bail!("unknown config action: {}", other),
    }
    Ok(())
}
