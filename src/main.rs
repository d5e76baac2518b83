use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use glob::glob;
use pipeline_studio::drafts::{DraftCache, DraftStore};
use pipeline_studio::extensions::{Registries, StageProps, StageType};
use pipeline_studio::observability::log_snapshot;
use pipeline_studio::pipeline::PipelineDocument;
use pipeline_studio::presets::{generate_preset, write_preset};
use pipeline_studio::registry::{ExtensionRegistry, RegistryKey};
use pipeline_studio::schema::BuiltinSchemas;
use pipeline_studio::script::EditScript;
use pipeline_studio::session::{EditorSession, SessionConfig};
use pipeline_studio::store::FileStore;
use pipeline_studio::validation::validate_pipeline;
use pipeline_studio::yaml::{from_json, from_yaml, to_json, to_yaml};
use serde_json::to_writer_pretty;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_tracing()?;

    match cli.command {
        Commands::Types { kind } => {
            list_types(kind);
            Ok(())
        }
        Commands::Validate { patterns } => validate_documents(&patterns),
        Commands::Show { file, stage, step } => show_pipeline(&file, stage.as_deref(), step),
        Commands::Convert { file, to, output } => convert_pipeline(&file, to, output.as_deref()),
        Commands::New {
            preset,
            identifier,
            name,
            output,
        } => {
            let destination =
                output.unwrap_or_else(|| PathBuf::from(format!("pipelines/{identifier}.yaml")));
            let document = generate_preset(&preset, &identifier, &name)?;
            let written = write_preset(&document, &destination)?;
            info!(
                preset = %preset,
                path = %written.display(),
                "Pipeline generated"
            );
            Ok(())
        }
        Commands::Edit {
            store,
            drafts,
            script,
            metrics_json,
        } => run_script(&store, drafts, &script, metrics_json),
        Commands::Drafts { action } => drafts_command(action),
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(())
}

fn list_types(kind: Option<HandlerKind>) {
    let registries = Registries::with_defaults();
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => HandlerKind::value_variants().to_vec(),
    };
    for kind in kinds {
        match kind {
            HandlerKind::Stages => print_groups(&registries.stages),
            HandlerKind::Resources => print_groups(&registries.resources),
            HandlerKind::Templates => print_groups(&registries.templates),
            HandlerKind::ArtifactSources => print_groups(&registries.artifact_sources),
        }
    }
}

fn print_groups<K: RegistryKey, P>(registry: &ExtensionRegistry<K, P>) {
    println!("Available {} handlers:", registry.name());
    for group in registry.groups(&registry.keys()) {
        println!("{}:", group.category.as_deref().unwrap_or("Other"));
        for key in group.keys {
            if let Some(handler) = registry.get(&key) {
                println!("  - {key}: {} [{}]", handler.label_text(), handler.icon);
            }
        }
    }
}

fn load_document(path: &Path) -> Result<PipelineDocument> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let document = if is_json {
        from_json(&content)
    } else {
        from_yaml(&content)
    };
    document.with_context(|| format!("Failed to parse pipeline: {}", path.display()))
}

fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::new();
    for pattern in patterns {
        let matches =
            glob(pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))?;
        let mut found = false;
        for entry in matches {
            let path = entry?;
            if path.is_file() {
                resolved.push(path);
                found = true;
            }
        }
        if !found {
            bail!("No pipelines matched pattern: {pattern}");
        }
    }
    Ok(resolved)
}

fn validate_documents(patterns: &[String]) -> Result<()> {
    let files = expand_patterns(patterns)?;
    let registries = Registries::with_defaults();
    let mut failures = 0usize;

    for path in &files {
        match load_document(path) {
            Ok(document) => {
                let report = validate_pipeline(&document, &registries, &BuiltinSchemas);
                for warning in &report.warnings {
                    warn!(file = %path.display(), "{warning}");
                }
                if report.is_ok() {
                    info!(file = %path.display(), "Pipeline validation passed");
                } else {
                    failures += 1;
                    for error_msg in &report.errors {
                        error!(file = %path.display(), "{error_msg}");
                    }
                }
            }
            Err(err) => {
                failures += 1;
                error!(file = %path.display(), "{err:#}");
            }
        }
    }

    if failures > 0 {
        bail!("Validation failed for {failures} of {} pipeline(s)", files.len());
    }
    Ok(())
}

fn show_pipeline(path: &Path, stage_id: Option<&str>, step: Option<String>) -> Result<()> {
    let document = load_document(path)?;
    let registries = Registries::with_defaults();

    let stages = match stage_id {
        Some(stage_id) => vec![
            document
                .find_stage(stage_id)
                .ok_or_else(|| anyhow!("Stage '{stage_id}' not found in {}", path.display()))?,
        ],
        None => document.stages(),
    };

    println!("{} ({})", document.pipeline.name, document.identifier());
    for stage in stages {
        let props = StageProps {
            stage: stage.clone(),
            selected_step: step.clone(),
            read_only: false,
        };
        let fragment = registries
            .stages
            .render_or_fallback(&StageType::from(stage.stage_type.as_str()), &props);
        println!();
        print!("{fragment}");
    }
    Ok(())
}

fn convert_pipeline(path: &Path, to: DocumentFormat, output: Option<&Path>) -> Result<()> {
    let document = load_document(path)?;
    let rendered = match to {
        DocumentFormat::Yaml => to_yaml(&document)?,
        DocumentFormat::Json => to_json(&document)?,
    };
    match output {
        Some(output) => {
            fs::write(output, rendered)
                .with_context(|| format!("Failed to write pipeline: {}", output.display()))?;
            info!(path = %output.display(), "Pipeline converted");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn run_script(
    store_root: &Path,
    drafts: Option<PathBuf>,
    script_path: &Path,
    metrics_json: Option<PathBuf>,
) -> Result<()> {
    let script = EditScript::load(script_path)?;
    let registries = Registries::with_defaults();
    let drafts = drafts.unwrap_or_else(|| store_root.join(".drafts"));
    let mut session = EditorSession::with_config(
        FileStore::new(store_root),
        DraftCache::new(drafts),
        SessionConfig::default(),
    );

    let outcome = script.run(&mut session, &registries);

    let snapshot = session.snapshot();
    to_writer_pretty(io::stdout(), &snapshot).context("Failed to write editor snapshot")?;
    println!();

    let metrics = session.metrics().snapshot();
    log_snapshot(&metrics);
    if let Some(path) = metrics_json {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
        to_writer_pretty(file, &metrics)
            .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
        info!(path = %path.display(), "Metrics written");
    }

    outcome?;
    if let Some(error) = session.state().error() {
        bail!("Editor finished with an error: {error}");
    }
    Ok(())
}

fn drafts_command(command: DraftCommands) -> Result<()> {
    match command {
        DraftCommands::List { drafts } => {
            let cache = DraftCache::new(drafts);
            let entries = cache.list()?;
            if entries.is_empty() {
                println!("No drafts");
            }
            for draft in entries {
                println!(
                    "{}\t{}\t{} stage(s)",
                    draft.pipeline_id,
                    draft.saved_at.to_rfc3339(),
                    draft.document.stage_ids().len()
                );
            }
            Ok(())
        }
        DraftCommands::Discard { drafts, pipeline } => {
            DraftCache::new(drafts).discard(&pipeline)?;
            info!(pipeline = %pipeline, "Draft discarded");
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(
    name = "pipeline-studio",
    version,
    about = "Pipeline document editor and extension registry toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered handlers grouped by category.
    Types {
        #[arg(long, value_enum)]
        kind: Option<HandlerKind>,
    },
    Validate {
        #[arg(required = true, value_name = "PATTERN")]
        patterns: Vec<String>,
    },
    Show {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long)]
        stage: Option<String>,
        #[arg(long)]
        step: Option<String>,
    },
    Convert {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, value_enum)]
        to: DocumentFormat,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    New {
        #[arg(long)]
        preset: String,
        #[arg(long)]
        identifier: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay an edit script against a pipeline store.
    Edit {
        #[arg(long, value_hint = ValueHint::DirPath)]
        store: PathBuf,
        #[arg(long, value_hint = ValueHint::DirPath)]
        drafts: Option<PathBuf>,
        #[arg(long, value_hint = ValueHint::FilePath)]
        script: PathBuf,
        #[arg(long = "metrics-json")]
        metrics_json: Option<PathBuf>,
    },
    Drafts {
        #[command(subcommand)]
        action: DraftCommands,
    },
}

#[derive(Subcommand)]
enum DraftCommands {
    List {
        #[arg(long)]
        drafts: PathBuf,
    },
    Discard {
        #[arg(long)]
        drafts: PathBuf,
        pipeline: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HandlerKind {
    Stages,
    Resources,
    Templates,
    ArtifactSources,
}

#[derive(Clone, Copy, ValueEnum)]
enum DocumentFormat {
    Yaml,
    Json,
}
