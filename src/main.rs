//! synthtax: compile, inspect, render and live-play mixing recipes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use synthtax::config::SynthtaxConfig;
use synthtax::dsl::{prompt_to_recipe, to_source, to_yaml, Compiler, RecipeFormat};
use synthtax::graph::{Graph, GraphDiff};
use synthtax::render::{render_exports, Limiter, OfflineRenderer, QualityProfile, WavLoader};
use synthtax::session::{LiveDriver, LiveSession, SharedSession};

#[derive(Parser)]
#[command(name = "synthtax")]
#[command(about = "Code-first audio mixing with bar-quantized live reload")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.synthtax/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output; repeat for trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Target {
    Yaml,
    Dsl,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a recipe and report the first error
    Check { recipe: PathBuf },

    /// Print the compiled graph
    Graph {
        recipe: PathBuf,

        /// Show what changes going from RECIPE to this one
        #[arg(long)]
        diff: Option<PathBuf>,
    },

    /// Rewrite a recipe in the other format
    Convert {
        recipe: PathBuf,

        #[arg(long)]
        to: Target,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render every export directive to WAV
    Render {
        recipe: PathBuf,

        /// Use the preview profile
        #[arg(long)]
        preview: bool,

        /// Directory for exported files (default: next to the recipe)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Play a recipe and reload it on every save
    Live { recipe: PathBuf },

    /// Translate an English instruction into recipe text
    Prompt {
        /// Instruction text; read from stdin when omitted
        text: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SynthtaxConfig::load(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.log_level);

    match cli.command {
        Commands::Check { recipe } => {
            let graph = compile(&recipe)?;
            println!(
                "{}: ok ({} nodes, {} exports, {} bpm)",
                recipe.display(),
                graph.nodes.len(),
                graph.exports.len(),
                graph.globals.bpm
            );
        }
        Commands::Graph { recipe, diff } => {
            let graph = compile(&recipe)?;
            match diff {
                None => print!("{graph}"),
                Some(other) => {
                    let diff = GraphDiff::between(&graph, &compile(&other)?);
                    if diff.is_empty() {
                        println!("no changes");
                    }
                    for line in diff.summaries() {
                        println!("{line}");
                    }
                }
            }
        }
        Commands::Convert { recipe, to, output } => {
            let source = read(&recipe)?;
            let parsed = Compiler::parse_as(&source, RecipeFormat::from_path(&recipe))
                .with_context(|| format!("{}", recipe.display()))?;
            let text = match to {
                Target::Yaml => to_yaml(&parsed.operations)?,
                Target::Dsl => to_source(&parsed.operations),
            };
            match output {
                Some(path) => fs::write(&path, text)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => print!("{text}"),
            }
        }
        Commands::Render {
            recipe,
            preview,
            out_dir,
        } => {
            let graph = compile(&recipe)?;
            let base = recipe_dir(&recipe);
            let out_dir = out_dir.unwrap_or_else(|| base.clone());
            render(&graph, &config, &base, &out_dir, preview)?;
        }
        Commands::Live { recipe } => {
            let session = SharedSession::new(LiveSession::new(config.live.sample_rate));
            let driver = LiveDriver::new(&recipe, session, config.live.block_size);
            let running = driver.running_flag();
            ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
                .context("cannot install Ctrl-C handler")?;
            driver.run()?;
            if let Some(err) = driver.session().with(|s| s.last_error().cloned()) {
                eprintln!("last compile error: {err}");
            }
        }
        Commands::Prompt { text } => {
            let prompt = if text.is_empty() {
                std::io::read_to_string(std::io::stdin()).context("cannot read stdin")?
            } else {
                text.join(" ")
            };
            print!("{}", prompt_to_recipe(&prompt));
        }
    }
    Ok(())
}

fn init_logging(verbose: u8, configured: &str) {
    let level = match verbose {
        0 => configured.parse().unwrap_or(tracing::Level::INFO),
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn compile(path: &Path) -> Result<Graph> {
    let source = read(path)?;
    Compiler::compile_as(&source, RecipeFormat::from_path(path))
        .with_context(|| format!("{}", path.display()))
}

fn recipe_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn render(
    graph: &Graph,
    config: &SynthtaxConfig,
    base: &Path,
    out_dir: &Path,
    preview: bool,
) -> Result<()> {
    if graph.exports.is_empty() {
        tracing::warn!("recipe has no export directives; nothing to render");
        return Ok(());
    }
    let renderer = OfflineRenderer::new(WavLoader::new(base))
        .with_profiles(config.preview, config.export)
        .with_limiter(Limiter::new(config.limiter_ceiling));
    let profile = if preview {
        QualityProfile::Preview
    } else {
        QualityProfile::Export
    };

    let outcomes = render_exports(&renderer, graph, profile, out_dir);
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    for o in &outcomes {
        match &o.result {
            Ok(()) => println!("wrote {}", o.path.display()),
            Err(e) => eprintln!("export '{}' (line {}): {e}", o.file, o.line),
        }
    }
    if failed > 0 {
        bail!("{failed} of {} exports failed", outcomes.len());
    }
    Ok(())
}
