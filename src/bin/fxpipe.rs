use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use fxpipe::{
    ChainSet, DeviceChoice, EffectEntry, ExportConfig, ExportOrchestrator, Modality, ParamKind,
    Preset, PresetStore, UnitFailurePolicy,
};

#[derive(Parser, Debug)]
#[command(name = "fxpipe", version, about = "Apply audio/video effect chains to media files")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available effects and their parameters.
    Effects(EffectsArgs),
    /// Process a media file (requires `ffmpeg` and `ffprobe` on PATH).
    Export(ExportArgs),
    /// Manage presets stored in a JSON file.
    #[command(subcommand)]
    Preset(PresetCommand),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModalityArg {
    Audio,
    Video,
}

impl From<ModalityArg> for Modality {
    fn from(m: ModalityArg) -> Self {
        match m {
            ModalityArg::Audio => Modality::Audio,
            ModalityArg::Video => Modality::Video,
        }
    }
}

#[derive(Parser, Debug)]
struct EffectsArgs {
    /// Only list effects of this modality.
    #[arg(long, value_enum)]
    modality: Option<ModalityArg>,
}

/// Effect selection shared by `export` and `preset save`.
#[derive(Parser, Debug)]
struct ChainArgs {
    /// Video effect as `name` or `name:key=value,key=value`; repeat to chain.
    #[arg(long = "video-fx")]
    video_fx: Vec<String>,

    /// Audio effect as `name` or `name:key=value,key=value`; repeat to chain.
    #[arg(long = "audio-fx")]
    audio_fx: Vec<String>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input media file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output media file.
    #[arg(long)]
    out: PathBuf,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preset file to load `--preset` from.
    #[arg(long, requires = "preset")]
    preset_file: Option<PathBuf>,

    /// Preset name; its effects run before any `--video-fx`/`--audio-fx`.
    #[arg(long, requires = "preset_file")]
    preset: Option<String>,

    #[command(flatten)]
    chain: ChainArgs,

    /// Worker thread count.
    #[arg(long)]
    threads: Option<usize>,

    /// Run dual-path effects on the GPU when available.
    #[arg(long)]
    gpu: bool,

    /// Skip the final audio normalization.
    #[arg(long)]
    no_normalize: bool,

    /// Fail the export when any unit fails instead of keeping the original unit.
    #[arg(long)]
    abort_on_unit_failure: bool,
}

#[derive(Subcommand, Debug)]
enum PresetCommand {
    /// Save the given effects as a named preset.
    Save {
        /// Preset file.
        #[arg(long)]
        file: PathBuf,
        /// Preset name.
        #[arg(long)]
        name: String,
        #[command(flatten)]
        chain: ChainArgs,
    },
    /// Print a preset as JSON.
    Show {
        /// Preset file.
        #[arg(long)]
        file: PathBuf,
        /// Preset name.
        #[arg(long)]
        name: String,
    },
    /// List preset names.
    List {
        /// Preset file.
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a preset.
    Remove {
        /// Preset file.
        #[arg(long)]
        file: PathBuf,
        /// Preset name.
        #[arg(long)]
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Effects(args) => cmd_effects(args),
        Command::Export(args) => cmd_export(args),
        Command::Preset(cmd) => cmd_preset(cmd),
    }
}

fn cmd_effects(args: EffectsArgs) -> anyhow::Result<()> {
    let modalities = match args.modality {
        Some(m) => vec![Modality::from(m)],
        None => vec![Modality::Video, Modality::Audio],
    };
    let mut out = std::io::stdout().lock();
    for modality in modalities {
        writeln!(out, "{modality}:")?;
        for d in fxpipe::list_effects(modality) {
            writeln!(out, "  {:<14} {}", d.name, d.summary)?;
            for p in d.params {
                let bounds = match p.kind {
                    ParamKind::Float { min, max } => format!("{min:?}..{max:?}"),
                    ParamKind::Int { min, max } => format!("{min:?}..{max:?}"),
                    ParamKind::Bool => String::new(),
                    ParamKind::Choice { choices } => choices.join("|"),
                };
                writeln!(
                    out,
                    "      {} ({}) default={:?} {bounds}",
                    p.name,
                    p.kind.as_str(),
                    p.default
                )?;
            }
        }
    }
    Ok(())
}

/// Parse `name` or `name:key=value,key=value`. Values are read as JSON when possible
/// (`0.5`, `true`), otherwise as strings (`16:9`).
fn parse_effect_spec(spec: &str) -> anyhow::Result<EffectEntry> {
    let (name, rest) = match spec.split_once(':') {
        Some((name, rest)) => (name.trim(), Some(rest)),
        None => (spec.trim(), None),
    };
    if name.is_empty() {
        anyhow::bail!("empty effect name in '{spec}'");
    }
    let mut params = serde_json::Map::new();
    for pair in rest.into_iter().flat_map(|r| r.split(',')) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (k, v) = pair
            .split_once('=')
            .with_context(|| format!("expected key=value in '{spec}', got '{pair}'"))?;
        let value = serde_json::from_str(v.trim())
            .unwrap_or_else(|_| serde_json::Value::String(v.trim().to_string()));
        params.insert(k.trim().to_string(), value);
    }
    Ok(EffectEntry::with_params(name, params))
}

fn preset_from_args(chain: &ChainArgs) -> anyhow::Result<Preset> {
    Ok(Preset {
        video: chain
            .video_fx
            .iter()
            .map(|s| parse_effect_spec(s))
            .collect::<anyhow::Result<_>>()?,
        audio: chain
            .audio_fx
            .iter()
            .map(|s| parse_effect_spec(s))
            .collect::<anyhow::Result<_>>()?,
    })
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    if args.gpu {
        config.device = DeviceChoice::Gpu;
    }
    if args.no_normalize {
        config.normalize_peak = None;
    }
    if args.abort_on_unit_failure {
        config.unit_failure_policy = UnitFailurePolicy::Abort;
    }

    let mut preset = match (&args.preset_file, &args.preset) {
        (Some(file), Some(name)) => PresetStore::load(file)?
            .get(name)
            .cloned()
            .with_context(|| format!("preset '{name}' not found in '{}'", file.display()))?,
        _ => Preset::default(),
    };
    let extra = preset_from_args(&args.chain)?;
    preset.video.extend(extra.video);
    preset.audio.extend(extra.audio);
    let chains = ChainSet::from_preset(&preset)?;
    tracing::info!(
        video = ?chains.video.names(),
        audio = ?chains.audio.names(),
        "effect chains"
    );

    let mut orchestrator = ExportOrchestrator::new(config)?;
    let report_progress = |p: f64| eprint!("\rprogress: {p:5.1}%");
    let report = orchestrator.export(&args.in_path, &args.out, &chains, &report_progress);
    eprintln!();
    let report = report?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("wrote {}", report.output.display());
    Ok(())
}

fn cmd_preset(cmd: PresetCommand) -> anyhow::Result<()> {
    match cmd {
        PresetCommand::Save { file, name, chain } => {
            let preset = preset_from_args(&chain)?;
            // Validate and coerce before persisting.
            let preset = ChainSet::from_preset(&preset)?.to_preset();
            let mut store = PresetStore::load(&file)?;
            store.insert(name.clone(), preset);
            store.save(&file)?;
            eprintln!("saved preset '{name}' to {}", file.display());
        }
        PresetCommand::Show { file, name } => {
            let store = PresetStore::load(&file)?;
            let preset = store
                .get(&name)
                .with_context(|| format!("preset '{name}' not found in '{}'", file.display()))?;
            println!("{}", serde_json::to_string_pretty(preset)?);
        }
        PresetCommand::List { file } => {
            let store = PresetStore::load(&file)?;
            for name in store.names() {
                println!("{name}");
            }
        }
        PresetCommand::Remove { file, name } => {
            let mut store = PresetStore::load(&file)?;
            if store.remove(&name).is_none() {
                anyhow::bail!("preset '{name}' not found in '{}'", file.display());
            }
            store.save(&file)?;
        }
    }
    Ok(())
}
