use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use ekstream_core::benchmark::correlator::{Correlation, Correlator, DuplicatePolicy};
use ekstream_core::capture::domain::camera::Camera;
use ekstream_core::capture::infrastructure::directory_camera::DirectoryCamera;
use ekstream_core::detection::domain::face_detector::FaceDetector;
use ekstream_core::detection::infrastructure::cascade_detector::{CascadeDetector, DetectorConfig};
use ekstream_core::normalization::face_normalizer::FaceNormalizer;
use ekstream_core::pipeline::infrastructure::threaded_pipeline_runner::ThreadedPipelineRunner;
use ekstream_core::pipeline::pipeline_builder::PipelineBuilder;
use ekstream_core::pipeline::pipeline_logger::ReportingPipelineLogger;
use ekstream_core::pipeline::pipeline_runner::{PipelineRunner, RunConfig};
use ekstream_core::recognition::domain::algorithm::RecognizerAlgorithm;
use ekstream_core::recognition::infrastructure::classifier_trainer::ClassifierTrainer;
use ekstream_core::recognition::infrastructure::training_corpus::TrainingCorpus;
use ekstream_core::shared::clock::SystemClock;
use ekstream_core::shared::image_convert;
use ekstream_core::shared::image_writer::{ImageFileWriter, ImageWriter};
use ekstream_core::shared::settings::PipelineSettings;

/// Periodic capture, face detection and recognition with latency logs.
#[derive(Parser)]
#[command(name = "ekstream")]
struct Cli {
    /// JSON settings file; missing keys take defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the capture → detect → normalize → recognise pipeline.
    Run(RunArgs),
    /// Detect faces in one image and optionally save normalized crops.
    Detect {
        image: PathBuf,
        /// Directory for `<n>-face.png` crops.
        #[arg(long)]
        crops: Option<PathBuf>,
    },
    /// Train a classifier and check it against its own corpus.
    Train {
        /// Overrides `trainingCorpusPath`.
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Overrides `recognizerAlgorithm`.
        #[arg(long)]
        algorithm: Option<RecognizerAlgorithm>,
    },
    /// Join benchmark logs by record id and report stage latencies.
    Correlate {
        /// Directory holding capture.log, detect.log and recognise.log.
        dir: PathBuf,
        /// How repeated ids within one log are resolved.
        #[arg(long, default_value = "first-wins")]
        duplicates: DuplicatePolicy,
        /// Print one summary line per record.
        #[arg(long)]
        lines: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Replay images from this directory instead of a device.
    #[arg(long, conflicts_with = "device")]
    source_dir: Option<PathBuf>,

    /// Capture device, e.g. /dev/video0.
    #[arg(long)]
    device: Option<String>,

    /// ffmpeg input format for --device.
    #[arg(long, default_value = "v4l2")]
    input_format: String,

    /// Stop after this many captured frames.
    #[arg(long)]
    frames: Option<usize>,

    /// Overrides `sampleIntervalMs`.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Overrides `saveIntermediateResults`.
    #[arg(long)]
    save_intermediate: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => PipelineSettings::load(path)?,
        None => PipelineSettings::default(),
    };

    match cli.command {
        Command::Run(args) => {
            if let Some(ms) = args.interval_ms {
                settings.sample_interval_ms = ms;
            }
            settings.save_intermediate_results |= args.save_intermediate;
            run_pipeline(&settings, &args)
        }
        Command::Detect { image, crops } => run_detect(&settings, &image, crops.as_deref()),
        Command::Train { corpus, algorithm } => {
            if let Some(corpus) = corpus {
                settings.training_corpus_path = corpus;
            }
            if let Some(algorithm) = algorithm {
                settings.recognizer_algorithm = algorithm;
            }
            run_train(&settings)
        }
        Command::Correlate {
            dir,
            duplicates,
            lines,
        } => run_correlate(&dir, duplicates, lines),
    }
}

fn run_pipeline(
    settings: &PipelineSettings,
    args: &RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let camera = open_camera(settings, args)?;
    let pipeline = PipelineBuilder::new(settings, Arc::new(SystemClock)).build(camera)?;

    // Train up front so a bad corpus or face size fails before the first capture.
    let model = pipeline.prepare_classifier()?;
    log::info!(
        "Classifier ready: {} with {} labels at {}x{}",
        model.algorithm(),
        model.labels().len(),
        model.face_size().0,
        model.face_size().1
    );

    let config = RunConfig {
        max_frames: args.frames,
        cancel: pipeline.cancel.clone(),
    };
    let mut logger = ReportingPipelineLogger::default();
    let summary = ThreadedPipelineRunner::new().run(
        pipeline.stages,
        config,
        &mut logger,
        &mut |result| {
            println!(
                "{};{};{};{:.1};{}",
                result.record.parent_id(),
                result.record.id(),
                result.prediction.label,
                result.prediction.confidence,
                if result.strong_match { "match" } else { "-" }
            );
        },
    )?;

    if summary.recognised == 0 {
        log::warn!("No faces were recognised in {} frames", summary.frames);
    }
    Ok(())
}

fn open_camera(
    settings: &PipelineSettings,
    args: &RunArgs,
) -> Result<Box<dyn Camera>, Box<dyn std::error::Error>> {
    let (w, h) = (settings.frame_width, settings.frame_height);
    if let Some(dir) = &args.source_dir {
        return Ok(Box::new(DirectoryCamera::open(dir, w, h)?));
    }
    open_device(args, w, h)
}

#[cfg(feature = "device-capture")]
fn open_device(
    args: &RunArgs,
    w: u32,
    h: u32,
) -> Result<Box<dyn Camera>, Box<dyn std::error::Error>> {
    use ekstream_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;

    let device = args.device.as_deref().unwrap_or("/dev/video0");
    Ok(Box::new(FfmpegCamera::new(&args.input_format, device, w, h)))
}

#[cfg(not(feature = "device-capture"))]
fn open_device(
    args: &RunArgs,
    _w: u32,
    _h: u32,
) -> Result<Box<dyn Camera>, Box<dyn std::error::Error>> {
    Err(format!(
        "cannot open {} ({}): built without the device-capture feature, use --source-dir",
        args.device.as_deref().unwrap_or("default device"),
        args.input_format
    )
    .into())
}

fn run_detect(
    settings: &PipelineSettings,
    image: &Path,
    crops: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let detector = CascadeDetector::from_path(
        &settings.cascade_definition_path,
        DetectorConfig::from_settings(settings),
    )?;
    let frame = image_convert::decode(&std::fs::read(image)?)?;
    let regions = detector.detect(&frame)?;
    for r in &regions {
        println!("{} {} {} {}", r.x, r.y, r.width, r.height);
    }
    log::info!("{} face(s) in {}", regions.len(), image.display());

    if let Some(dir) = crops {
        let normalizer = FaceNormalizer::new(settings.face_width, settings.face_height)?;
        let writer = ImageFileWriter::new();
        for (i, r) in regions.iter().enumerate() {
            let face = normalizer.normalize(&frame, *r)?;
            writer.write(&dir.join(format!("{i}-face.png")), &face)?;
        }
        log::info!("Saved {} crops to {}", regions.len(), dir.display());
    }
    Ok(())
}

fn run_train(settings: &PipelineSettings) -> Result<(), Box<dyn std::error::Error>> {
    let corpus = TrainingCorpus::load_dir(&settings.training_corpus_path)?;
    let model = ClassifierTrainer::new(settings.recognizer_algorithm).train(&corpus)?;
    let (w, h) = corpus.size();
    log::info!(
        "Trained {} on {} images, {} labels, {w}x{h}",
        model.algorithm(),
        corpus.len(),
        model.labels().len()
    );

    let mut correct = 0;
    for sample in corpus.samples() {
        if model.predict(&sample.image)?.label == sample.label {
            correct += 1;
        }
    }
    println!(
        "{}: {correct}/{} training images recalled",
        model.algorithm(),
        corpus.len()
    );
    Ok(())
}

fn run_correlate(
    dir: &Path,
    duplicates: DuplicatePolicy,
    lines: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let correlation = Correlator::new(duplicates).correlate_dir(dir)?;
    if lines {
        for summary in correlation.entries.iter().filter_map(|e| e.to_summary()) {
            println!("{summary}");
        }
    }
    print_report(&correlation);
    Ok(())
}

fn print_report(correlation: &Correlation) {
    println!("{} complete records", correlation.entries.len());
    let stats = [
        ("capture → detect", correlation.detect_stats()),
        ("detect → recognise", correlation.recognise_stats()),
        ("end to end", correlation.end_to_end_stats()),
    ];
    for (name, stat) in stats {
        if let Some(s) = stat {
            println!(
                "  {name:20} n={:<5} min {:>6}ms  mean {:>8.1}ms  max {:>6}ms",
                s.count, s.min, s.mean, s.max
            );
        }
    }
    if !correlation.incomplete.is_empty() {
        println!("{} incomplete records", correlation.incomplete.len());
        for id in &correlation.incomplete {
            log::debug!("incomplete: {id}");
        }
    }
    for skewed in &correlation.skewed {
        log::warn!("Clock skew: {skewed}");
    }
}
