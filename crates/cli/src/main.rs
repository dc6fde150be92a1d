use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use attendance_core::attendance::domain::ledger::LedgerBackend;
use attendance_core::attendance::infrastructure::json_file_ledger::JsonFileLedger;
use attendance_core::attendance::infrastructure::ledger_locks::LedgerLocks;
use attendance_core::jobs::domain::media_store::MediaStore;
use attendance_core::jobs::domain::record_store::RecordStore;
use attendance_core::jobs::infrastructure::fs_media_store::FsMediaStore;
use attendance_core::jobs::infrastructure::http_media_store::HttpMediaStore;
use attendance_core::jobs::infrastructure::json_record_store::JsonRecordStore;
use attendance_core::pipeline::enroll_student_use_case::EnrollStudentUseCase;
use attendance_core::pipeline::infrastructure::threaded_job_dispatcher::{
    MatcherFactory, ThreadedJobDispatcher,
};
use attendance_core::pipeline::infrastructure::threaded_scan_executor::ThreadedScanExecutor;
use attendance_core::pipeline::process_video_use_case::{
    JobReport, JobServices, MergeStatus, ProcessVideoUseCase, ScanSettings,
};
use attendance_core::pipeline::processing_stats::ProcessingStats;
use attendance_core::pipeline::register_teacher_use_case::RegisterTeacherUseCase;
use attendance_core::pipeline::remove_student_use_case::RemoveStudentUseCase;
use attendance_core::pipeline::submit_video_use_case::SubmitVideoUseCase;
use attendance_core::recognition::domain::face_matcher::{FaceMatcher, MatchPolicy};
use attendance_core::recognition::infrastructure::onnx_arcface_encoder::OnnxArcfaceEncoder;
use attendance_core::recognition::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use attendance_core::shared::config::ServiceConfig;
use attendance_core::shared::constants::{
    APP_DIR_NAME, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use attendance_core::shared::model_resolver::{self, ProgressFn};
use attendance_core::video::domain::frame_source::FrameSource;
use attendance_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use attendance_core::video::infrastructure::image_loader::{collect_image_paths, load_image};

/// Classroom attendance from recorded lecture videos.
#[derive(Parser)]
#[command(name = "attendance")]
struct Cli {
    /// Directory holding media, job records and attendance sheets.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads for `process` (0 = one per CPU).
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Match each face to its nearest enrolled embedding instead of the
    /// first one within tolerance.
    #[arg(long, global = true)]
    nearest_match: bool,

    /// Maximum embedding distance accepted as a match.
    #[arg(long, global = true)]
    tolerance: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a teacher and prepare a sheet for each class they teach.
    Teacher {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Class code such as 9ea (repeatable or comma-separated).
        #[arg(long = "class", value_delimiter = ',')]
        classes: Vec<String>,
    },
    /// Enroll a student from one or more photos (files or directories).
    Enroll {
        #[arg(long)]
        roll: String,
        #[arg(long)]
        batch: String,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Remove an enrolled student; recorded attendance is kept.
    Unenroll {
        #[arg(long)]
        roll: String,
    },
    /// Upload a classroom video and queue it for processing.
    Submit {
        #[arg(long)]
        teacher: String,
        #[arg(long)]
        batch: String,
        video: PathBuf,
    },
    /// Process every pending video and record attendance.
    Process,
    /// List enrolled students by batch.
    Students,
    /// Write the effective configuration, flags included, to the data
    /// directory's config.json.
    Config,
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
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .ok_or("Could not determine data directory; pass --data-dir")?,
    };
    let config = load_config(&cli, &data_dir)?;
    let stores = Stores::open(&data_dir, &config)?;

    match cli.command {
        Command::Teacher { id, name, classes } => run_register(&stores, &id, &name, &classes),
        Command::Enroll {
            roll,
            batch,
            images,
        } => run_enroll(&stores, &config, &roll, &batch, &images),
        Command::Unenroll { roll } => run_unenroll(&stores, &roll),
        Command::Submit {
            teacher,
            batch,
            video,
        } => run_submit(&stores, &teacher, &batch, &video),
        Command::Process => run_process(&stores, &config),
        Command::Students => run_students(&stores),
        Command::Config => {
            let path = data_dir.join("config.json");
            config.save(&path)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// `--config`, else `config.json` in the data directory, else the platform
/// config file. Flags override whatever was loaded.
fn load_config(cli: &Cli, data_dir: &Path) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let local = data_dir.join("config.json");
    let path = cli
        .config
        .clone()
        .or_else(|| local.exists().then_some(local))
        .or_else(ServiceConfig::default_path);
    let mut config = match path {
        Some(path) => ServiceConfig::load(&path)?,
        None => ServiceConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if cli.nearest_match {
        config.match_policy = MatchPolicy::Nearest;
    }
    if let Some(tolerance) = cli.tolerance {
        config.tolerance = tolerance;
    }
    config.validate()?;
    Ok(config)
}

/// The persistent stores under the data directory.
struct Stores {
    records: Arc<dyn RecordStore>,
    media: Arc<dyn MediaStore>,
    ledgers: Arc<dyn LedgerBackend>,
    locks: Arc<LedgerLocks>,
}

impl Stores {
    fn open(data_dir: &Path, config: &ServiceConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let media: Arc<dyn MediaStore> = match &config.media_base_url {
            Some(url) => Arc::new(HttpMediaStore::new(url, config.fetch_timeout())?),
            None => Arc::new(FsMediaStore::new(&data_dir.join("media"))),
        };
        log::debug!("Using data directory {}", data_dir.display());
        Ok(Self {
            records: Arc::new(JsonRecordStore::new(&data_dir.join("records.json"))),
            media,
            ledgers: Arc::new(JsonFileLedger::new(&data_dir.join("ledgers"))),
            locks: Arc::new(LedgerLocks::new()),
        })
    }
}

fn run_register(
    stores: &Stores,
    id: &str,
    name: &str,
    classes: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let use_case = RegisterTeacherUseCase::new(
        stores.records.clone(),
        stores.ledgers.clone(),
        stores.locks.clone(),
    );
    let report = use_case.execute(id, name, classes)?;
    for (class, added) in &report.seeded {
        println!("{id}/{class}: {added} rolls");
    }
    for (class, reason) in &report.rejected {
        eprintln!("{id}/{class}: {reason}");
    }
    Ok(())
}

fn run_enroll(
    stores: &Stores,
    config: &ServiceConfig,
    roll: &str,
    batch: &str,
    images: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let paths = collect_image_paths(images)?;
    if paths.is_empty() {
        return Err("No enrollment images found".into());
    }
    let models = ModelPaths::resolve(config)?;
    let detector = OnnxYoloDetector::new(&models.detector, config.detector_confidence, 1)?;
    let encoder = OnnxArcfaceEncoder::new(&models.encoder, 1)?;

    let mut use_case = EnrollStudentUseCase::new(
        stores.records.clone(),
        Box::new(detector),
        Box::new(encoder),
        load_image,
    );
    let report = use_case.execute(roll, batch, &paths)?;
    println!(
        "{roll}: {} of {} photos enrolled",
        report.embeddings,
        paths.len()
    );
    for (path, reason) in &report.skipped {
        eprintln!("  skipped {}: {reason}", path.display());
    }
    Ok(())
}

fn run_unenroll(stores: &Stores, roll: &str) -> Result<(), Box<dyn std::error::Error>> {
    let removed = RemoveStudentUseCase::new(stores.records.clone()).execute(roll)?;
    println!("{roll}: removed from {}", removed.batch);
    Ok(())
}

fn run_submit(
    stores: &Stores,
    teacher: &str,
    batch: &str,
    video: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if !video.exists() {
        return Err(format!("Video not found: {}", video.display()).into());
    }
    let bytes = fs::read(video)?;
    let use_case = SubmitVideoUseCase::new(stores.records.clone(), stores.media.clone());
    let job = use_case.execute(teacher, batch, &video.to_string_lossy(), &bytes)?;
    println!("{}", job.id);
    Ok(())
}

fn run_process(stores: &Stores, config: &ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let models = ModelPaths::resolve(config)?;
    let workers = config.worker_count();
    let stats = Arc::new(ProcessingStats::new());

    let services = JobServices {
        records: stores.records.clone(),
        media: stores.media.clone(),
        ledgers: stores.ledgers.clone(),
        locks: stores.locks.clone(),
        stats: stats.clone(),
    };
    let (width, height) = (config.working_width, config.working_height);
    let use_case = Arc::new(ProcessVideoUseCase::new(
        services,
        ScanSettings::from_config(config)?,
        Arc::new(move || Box::new(FfmpegFrameSource::new(width, height)) as Box<dyn FrameSource>),
        Box::new(ThreadedScanExecutor::new()),
    ));

    let dispatcher = ThreadedJobDispatcher::new(
        use_case,
        matcher_factory(models, config, workers),
        workers,
        config.lease(),
    );
    let reports = dispatcher.run_pending()?;
    for report in &reports {
        println!("{}", describe(report));
    }
    if let Some(mean) = stats.mean_job_time() {
        log::info!(
            "Processed {} jobs (mean {:.1}s, {} merge failures, {} cleanup failures)",
            stats.jobs(),
            mean.as_secs_f64(),
            stats.merge_failures(),
            stats.cleanup_failures()
        );
    }
    Ok(())
}

fn run_students(stores: &Stores) -> Result<(), Box<dyn std::error::Error>> {
    for (batch, rolls) in stores.records.list_students()? {
        println!("{batch}: {}", rolls.join(", "));
    }
    Ok(())
}

struct ModelPaths {
    detector: PathBuf,
    encoder: PathBuf,
}

impl ModelPaths {
    fn resolve(config: &ServiceConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = config.model_dir.as_deref();
        let detector = model_resolver::resolve(
            YOLO_MODEL_NAME,
            YOLO_MODEL_URL,
            dir,
            Some(download_progress("face detection")),
        )?;
        let encoder = model_resolver::resolve(
            EMBEDDING_MODEL_NAME,
            EMBEDDING_MODEL_URL,
            dir,
            Some(download_progress("face embedding")),
        )?;
        Ok(Self { detector, encoder })
    }
}

fn matcher_factory(models: ModelPaths, config: &ServiceConfig, workers: usize) -> MatcherFactory {
    let confidence = config.detector_confidence;
    let tolerance = config.tolerance;
    let policy = config.match_policy;
    Arc::new(
        move || -> Result<FaceMatcher, Box<dyn std::error::Error + Send + Sync>> {
            let detector = OnnxYoloDetector::new(&models.detector, confidence, workers)
                .map_err(|e| e.to_string())?;
            let encoder =
                OnnxArcfaceEncoder::new(&models.encoder, workers).map_err(|e| e.to_string())?;
            Ok(FaceMatcher::new(
                Box::new(detector),
                Box::new(encoder),
                Some(tolerance),
                policy,
            ))
        },
    )
}

fn describe(report: &JobReport) -> String {
    let date = report.date.as_deref().unwrap_or("-");
    let outcome = match &report.merge {
        MergeStatus::Merged(outcome) => {
            format!("{} present, {} absent", outcome.present, outcome.absent)
        }
        MergeStatus::SkippedEmptyGallery => "no enrolled students".to_string(),
        MergeStatus::Skipped(reason) => format!("skipped: {reason}"),
        MergeStatus::Failed(reason) => format!("FAILED: {reason}"),
    };
    let mut line = format!("{} {} {date}: {outcome}", report.job_id, report.ledger);
    if let Some(error) = &report.processing_error {
        line.push_str(&format!(" (video: {error})"));
    }
    if let Some(scan) = report.scan.as_ref().filter(|s| s.stop.is_failure()) {
        line.push_str(&format!(
            " (scan stopped after {}/{} frames: {:?})",
            scan.frames_examined, scan.frames_planned, scan.stop
        ));
    }
    if !report.cleanup_failures.is_empty() {
        line.push_str(&format!(
            " (cleanup: {})",
            report.cleanup_failures.join("; ")
        ));
    }
    line
}

fn download_progress(label: &'static str) -> ProgressFn {
    Box::new(move |downloaded, total| {
        if total > 0 {
            let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
            eprint!("\rDownloading {label} model... {pct}%");
        } else {
            eprint!("\rDownloading {label} model... {downloaded} bytes");
        }
    })
}
