use boxscan::capture::SyntheticDevice;
use boxscan::{
    BoxPayload, CycleOutcome, DecodeDisposition, DecodeGate, EngineConfig, ExpectedLine,
    ExpectedManifest, FieldAliases, Frame, ManualOutcome, PixelFormat, PortableDecoder,
    ReconcileWorkflow, ScanController, ScanSession,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "scantool", version, about = "boxscan CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode one box label from a photo and print its payload
    Decode {
        #[arg(long)]
        image: PathBuf,
    },
    /// Replay a file of scanned codes against a manifest
    Replay {
        #[arg(long)]
        manifest: PathBuf,
        /// One raw label per line; blank lines and # comments are skipped
        #[arg(long)]
        scans: PathBuf,
    },
    /// Run the scan loop over a synthetic camera fed with a photo
    Demo {
        #[arg(long)]
        image: PathBuf,
        #[arg(long, default_value_t = 30)]
        max_cycles: usize,
    },
    /// Scan from a V4L2 camera until a label decodes
    #[cfg(feature = "v4l2")]
    Live {
        #[arg(long, default_value_t = 600)]
        max_cycles: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Decode { image } => decode_cmd(&image),
        Command::Replay { manifest, scans } => replay_cmd(&manifest, &scans),
        Command::Demo { image, max_cycles } => demo_cmd(&image, max_cycles),
        #[cfg(feature = "v4l2")]
        Command::Live { max_cycles } => live_cmd(max_cycles),
    }
}

fn decode_cmd(image: &Path) {
    let bytes = match fs::read(image) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Failed to read {}: {}", image.display(), err);
            return;
        }
    };

    let mut decoder = PortableDecoder::default();
    match decoder.decode_still(&bytes) {
        Ok(Some(text)) => {
            println!("Decoded: {text}");
            print_payload(&BoxPayload::parse(&text, &FieldAliases::default()));
        }
        Ok(None) => println!("No QR label found in {}", image.display()),
        Err(err) => eprintln!("Failed to decode {}: {}", image.display(), err),
    }
}

#[derive(Deserialize)]
struct ManifestFile {
    #[serde(default)]
    reference: Option<String>,
    lines: Vec<ExpectedLine>,
}

fn replay_cmd(manifest: &Path, scans: &Path) {
    let manifest = match load_manifest(manifest) {
        Ok(manifest) => manifest,
        Err(err) => {
            eprintln!("Failed to load manifest: {err}");
            return;
        }
    };
    let codes = match fs::read_to_string(scans) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Failed to read {}: {}", scans.display(), err);
            return;
        }
    };

    println!(
        "Manifest {} with {} lines",
        manifest.reference.as_deref().unwrap_or("-"),
        manifest.lines().len()
    );

    // A replay is not real time, so no debounce between lines.
    let mut workflow =
        ReconcileWorkflow::new(ScanSession::new(manifest), DecodeGate::new(Duration::ZERO));

    for (i, code) in codes.lines().enumerate() {
        let code = code.trim();
        if code.is_empty() || code.starts_with('#') {
            continue;
        }
        match workflow.handle_manual(code) {
            DecodeDisposition::Accepted {
                box_id,
                matched_line_id,
                overrun,
            } => println!(
                "  [{}] accepted box {} -> {}{}",
                i + 1,
                box_id,
                matched_line_id.as_deref().unwrap_or("unmatched"),
                if overrun { " (overrun)" } else { "" }
            ),
            DecodeDisposition::Duplicate { existing_box_id } => {
                println!("  [{}] duplicate of box {}", i + 1, existing_box_id);
            }
            DecodeDisposition::Throttled => println!("  [{}] throttled", i + 1),
        }
    }

    print_progress(&workflow);
}

fn load_manifest(path: &Path) -> Result<ExpectedManifest, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let file: ManifestFile =
        serde_json::from_str(&content).map_err(|e| format!("{}: {}", path.display(), e))?;
    ExpectedManifest::new(file.reference, file.lines).map_err(|e| e.to_string())
}

fn print_progress(workflow: &ReconcileWorkflow) {
    let snapshot = workflow.snapshot();
    println!("Progress:");
    for line in &snapshot.lines {
        let overrun = if line.overrun > 0 {
            format!(" (+{} over)", line.overrun)
        } else {
            String::new()
        };
        println!(
            "  {}: {}/{}{}",
            line.line_id, line.scanned_count, line.required_quantity, overrun
        );
    }
    let unmatched = workflow.session().unmatched_boxes().len();
    if unmatched > 0 {
        println!("  unmatched boxes: {unmatched}");
    }
    println!("Complete: {}", snapshot.complete);
}

fn demo_cmd(image: &Path, max_cycles: usize) {
    let photo = match image::open(image) {
        Ok(img) => img.to_rgb8(),
        Err(err) => {
            eprintln!("Failed to load {}: {}", image.display(), err);
            return;
        }
    };
    let (width, height) = (photo.width() as usize, photo.height() as usize);
    let frame = Frame::new(photo.into_raw(), width, height, PixelFormat::Rgb8, 0);

    let config = EngineConfig::from_env();
    let mut device = SyntheticDevice::new("demo-cam");
    device.push_frame(frame);

    let mut controller = ScanController::new(Box::new(device), config.capture.clone())
        .with_frame_interval(config.frame_interval);
    if let Err(err) = controller.start() {
        eprintln!("Failed to start scan: {err}");
        return;
    }
    println!("Scanning {} ({}x{})", image.display(), width, height);
    let outcome = controller.run_for(max_cycles);
    report_outcome(outcome, &mut controller);
}

#[cfg(feature = "v4l2")]
fn live_cmd(max_cycles: usize) {
    use boxscan::capture::V4l2Device;

    let config = EngineConfig::from_env();
    let device = match V4l2Device::for_facing(config.capture.facing) {
        Ok(device) => device,
        Err(err) => {
            eprintln!("No usable camera: {err} ({})", err.hint());
            return;
        }
    };

    let mut controller = ScanController::new(Box::new(device), config.capture.clone())
        .with_frame_interval(config.frame_interval);
    if let Err(err) = controller.start() {
        eprintln!("Failed to start scan: {err}");
        manual_fallback(&mut controller);
        return;
    }
    println!("Scanning for up to {max_cycles} frames, ctrl-c to abort");
    let outcome = controller.run_for(max_cycles);
    report_outcome(outcome, &mut controller);
}

fn report_outcome(outcome: CycleOutcome, controller: &mut ScanController) {
    match outcome {
        CycleOutcome::Decoded(symbol) => {
            println!("Decoded ({}): {}", symbol.source, symbol.text);
            print_payload(&BoxPayload::parse(&symbol.text, &FieldAliases::default()));
        }
        CycleOutcome::NoDetection => {
            println!("No label found; stopping");
            controller.cancel();
        }
        CycleOutcome::Faulted(err) => {
            eprintln!("Capture failed: {err} ({})", err.hint());
            manual_fallback(controller);
        }
        CycleOutcome::NotScanning => println!("Controller was not scanning"),
    }
}

fn manual_fallback(controller: &mut ScanController) {
    if controller.begin_manual_entry().is_err() {
        return;
    }
    eprint!("Camera unavailable; type the label code: ");
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return;
    }
    match controller.submit_manual(&line) {
        ManualOutcome::Decoded(symbol) => {
            println!("Manual entry: {}", symbol.text);
            print_payload(&BoxPayload::parse(&symbol.text, &FieldAliases::default()));
        }
        ManualOutcome::EmptyInput => println!("Nothing entered"),
        ManualOutcome::NotInManualEntry => {}
    }
}

fn print_payload(payload: &BoxPayload) {
    println!("  identity: {}", payload.identity());
    if let Some(tx) = &payload.transaction_no {
        println!("  transaction_no: {tx}");
    }
    if let Some(sku) = &payload.sku_id {
        println!("  sku_id: {sku}");
    }
    if let Some(n) = payload.box_number {
        println!("  box_number: {n}");
    }
    if let Some(batch) = &payload.batch_no {
        println!("  batch_no: {batch}");
    }
    if let Some(w) = &payload.net_weight {
        println!("  net_weight: {w}");
    }
    if let Some(w) = &payload.gross_weight {
        println!("  gross_weight: {w}");
    }
}
