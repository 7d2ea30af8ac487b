use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Once};

static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "irk::jump=debug,irk::dispatch=debug,irk::ir=warn,irk_core=info,irk_cli=info";

use anyhow::Context;
use clap::{Parser, Subcommand};
use irk_core::{
    error::RaisedError,
    interp::{InterpConfig, Interpreter, env_toggle_enabled},
    ir::{IrProgram, passes},
    val::Val,
};


#[derive(Debug, Parser)]
#[command(name = "irk", author, version, about = "Run, dump and check persisted IRK programs", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    /// If no subcommand, treat as an IR program to run
    #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
    file: Option<PathBuf>,
}

/// Interpreter settings; unset flags fall back to the `IRK_*` environment variables.
#[derive(Debug, Clone, Default, clap::Args)]
struct RunOptions {
    /// Resolve every block dispatch generically
    #[arg(long)]
    no_inline_cache: bool,
    /// Call-target changes a dispatch site tolerates before going generic
    #[arg(long, value_name = "N")]
    megamorphic_threshold: Option<u32>,
    /// Nested frame limit before `SystemStackError`
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,
    /// Log every executed instruction (needs IRK_TRACE to be visible)
    #[arg(long)]
    trace_instructions: bool,
}

impl RunOptions {
    fn apply(&self, mut config: InterpConfig) -> InterpConfig {
        if self.no_inline_cache {
            config = config.with_inline_cache(false);
        }
        if let Some(threshold) = self.megamorphic_threshold {
            config = config.with_megamorphic_threshold(threshold);
        }
        if let Some(depth) = self.max_depth {
            config = config.with_max_depth(depth);
        }
        if self.trace_instructions {
            config = config.with_trace_instructions(true);
        }
        config
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute a program's entry scope and print its result.
    Run {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Print the program in readable form.
    Dump {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        /// Run the cleanup passes before printing
        #[arg(long)]
        passes: bool,
    },
    /// Validate a program without executing it.
    Check {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
    },
}

fn read_file_content(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("Failed to read file '{}': {}", path.display(), e))
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);
    if p.components().any(|comp| matches!(comp, Component::ParentDir)) {
        return Err(anyhow::anyhow!(
            "Parent directory components ('..') are not allowed in file paths."
        ));
    }
    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

/// `IRK_TRACE=1` uses the default filter (or `RUST_LOG`); any other enabled value is
/// taken as the filter expression itself.
fn filter_expr_from(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("1")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("on")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn maybe_init_tracing() {
    let raw = match std::env::var("IRK_TRACE") {
        Ok(value) => value,
        Err(_) => return,
    };

    if !env_toggle_enabled(&raw) {
        return;
    }

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let filter_expr = filter_expr_from(&raw).or_else(|| std::env::var("RUST_LOG").ok());

        let builder = fmt().with_writer(std::io::stderr);

        let builder = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => builder.with_env_filter(filter),
            None => builder.with_env_filter(DEFAULT_TRACE_FILTER),
        };

        let _ = builder.try_init();
    });
}

fn load_program(path: &Path) -> anyhow::Result<IrProgram> {
    let text = read_file_content(path)?;
    IrProgram::from_json(&text).with_context(|| format!("Invalid IR program '{}'", path.display()))
}

fn run_file(path: &Path, options: &RunOptions) -> anyhow::Result<()> {
    let program = load_program(path)?;
    let config = options.apply(InterpConfig::from_env());
    let mut interp = Interpreter::with_config(Arc::new(program), config);
    match interp.run() {
        Ok(Val::Nil) => Ok(()),
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(err) => match err.downcast_ref::<RaisedError>() {
            Some(raised) => {
                eprintln!("Error: {}", raised);
                std::process::exit(1);
            }
            None => Err(err),
        },
    }
}

fn dump_file(path: &Path, run_passes: bool) -> anyhow::Result<()> {
    let mut program = load_program(path)?;
    if run_passes {
        let removed = passes::run_all(&mut program)?;
        eprintln!("passes removed {} instruction(s)", removed);
    }
    print!("{}", program);
    Ok(())
}

fn check_file(path: &Path) -> anyhow::Result<()> {
    let program = load_program(path)?;
    let scopes = program.scopes().count();
    let methods = program.method_names().len();
    println!(
        "{}: ok ({} scope{}, {} method{}, {} dispatch site{})",
        path.display(),
        scopes,
        plural(scopes),
        methods,
        plural(methods),
        program.site_count(),
        plural(program.site_count())
    );
    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn main() -> anyhow::Result<()> {
    maybe_init_tracing();

    let CliArgs { command, file } = CliArgs::parse();

    match (command, file) {
        (Some(Commands::Run { file, options }), _) => run_file(&file, &options),
        (Some(Commands::Dump { file, passes }), _) => dump_file(&file, passes),
        (Some(Commands::Check { file }), _) => check_file(&file),
        (None, Some(file)) => run_file(&file, &RunOptions::default()),
        (None, None) => {
            eprintln!("Usage: irk <FILE> | irk <run|dump|check> <FILE>");
            std::process::exit(2);
        }
    }
}
