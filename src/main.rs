//! torchlive-rs - Command Line Entry Point
//!
//! Runs and checks Rhai scripts with the tensor, transform and media
//! namespaces installed, lists the built-in native modules and writes a
//! default configuration file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use torchlive_rs::{
    config::{default_config_path, BridgeConfig, LoggingSettings},
    media::BlobHandle,
    module::BuiltinModuleLoader,
    BufferBridge, InMemoryRefStore, ModuleCache, ScriptEngine, TensorHandle,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "torchlive-rs", version, about = "Run Rhai scripts against native tensor transforms")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "path")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a script
    Run {
        /// Path to the Rhai script
        script: PathBuf,

        /// Register file bytes under a reference id, as `id=path`
        #[arg(long = "blob", value_name = "id=path", value_parser = parse_blob)]
        blobs: Vec<(String, PathBuf)>,
    },
    /// Compile a script without running it
    Check {
        /// Path to the Rhai script
        script: PathBuf,
    },
    /// List built-in modules and their arities
    Modules,
    /// Write the default configuration to the config path
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_blob(arg: &str) -> std::result::Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok((id.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected id=path, got '{}'", arg)),
    }
}

/// Install the stderr subscriber and, when configured, a daily log file.
/// The returned guard must be held until exit so buffered lines are flushed.
fn init_logging(settings: &LoggingSettings) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
    };

    let (file_layer, guard) = match &settings.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "torchlive.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter()))
        .with(file_layer)
        .init();

    guard
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BridgeConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let _guard = init_logging(&config.logging);

    match cli.command {
        Command::Run { script, blobs } => run(&config, script, blobs),
        Command::Check { script } => check(&config, script),
        Command::Modules => list_modules(),
        Command::InitConfig { force } => init_config(cli.config, force),
    }
}

fn read_script(script: &Path) -> Result<String> {
    std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {}", script.display()))
}

fn run(config: &BridgeConfig, script: PathBuf, blobs: Vec<(String, PathBuf)>) -> Result<()> {
    let modules = ModuleCache::global();
    modules
        .preload(&config.modules.preload)
        .context("Failed to preload configured modules")?;

    let store = Arc::new(InMemoryRefStore::new());
    for (id, path) in &blobs {
        store.register_file(id.as_str(), path)?;
    }
    if !blobs.is_empty() {
        tracing::debug!("Registered blobs {:?}", store.ids());
    }
    let bridge = Arc::new(BufferBridge::new(store, config.media.max_blob_bytes));
    let engine = ScriptEngine::with_components(&config.engine, modules, bridge);

    let source = read_script(&script)?;
    tracing::info!("Running {}", script.display());
    let value = engine.run(&source)?;

    if let Some(tensor) = value.clone().try_cast::<TensorHandle>() {
        println!("{}", tensor);
    } else if let Some(blob) = value.clone().try_cast::<BlobHandle>() {
        println!("{:?}", blob);
    } else if !value.is_unit() {
        println!("{}", value);
    }
    Ok(())
}

fn check(config: &BridgeConfig, script: PathBuf) -> Result<()> {
    let source = read_script(&script)?;
    let store = Arc::new(InMemoryRefStore::new());
    let bridge = Arc::new(BufferBridge::new(store, config.media.max_blob_bytes));
    let engine = ScriptEngine::with_components(&config.engine, ModuleCache::global(), bridge);
    engine.validate(&source)?;
    println!("{}: ok", script.display());
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path
        .or_else(default_config_path)
        .context("No config directory on this platform; pass --config")?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to replace it)", path.display());
    }
    BridgeConfig::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn list_modules() -> Result<()> {
    let cache = ModuleCache::global();
    cache.preload(BuiltinModuleLoader::available())?;
    let infos = cache.loaded_modules();
    println!("{}", serde_json::to_string_pretty(&infos)?);
    Ok(())
}
