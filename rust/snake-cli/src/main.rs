//! Snakescript CLI: run, check and disassemble snake-layout programs.

mod colors;
mod config;

use clap::{Parser as ClapParser, Subcommand};
use colors::{bold, gray, green, red, status_label, yellow};
use config::{SnakeConfig, CONFIG_FILE};
use snake_compiler::compiler::lexer::desnake;
use snake_compiler::compiler::lower::Compiler;
use snake_compiler::compiler::parser::parse;
use snake_compiler::diagnostics::format_compile_error;
use snake_compiler::CompileError;
use snake_core::lir::Module;
use snake_vm::{VmError, VmOptions, VM};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "snake", version, about = "The Snakescript programming language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a .snake file
    Run {
        /// Path to the .snake file, or a directory holding main.snake
        #[arg()]
        path: PathBuf,

        /// Dump source, tokens, AST and disassembly to stderr first
        #[arg(long)]
        debug: bool,

        /// Read the source as plain text instead of snake layout
        #[arg(long)]
        no_desnake: bool,
    },
    /// Compile a .snake file without running it
    Check {
        #[arg()]
        path: PathBuf,

        #[arg(long)]
        no_desnake: bool,
    },
    /// Print the compiled instruction listing
    Disasm {
        #[arg()]
        path: PathBuf,

        #[arg(long)]
        no_desnake: bool,
    },
    /// Create a snake.toml config file in the current directory
    Init,
}

fn main() {
    let cli = Cli::parse();

    let config = match SnakeConfig::find() {
        Ok(found) => found,
        Err(e) => {
            eprintln!("{} {}", yellow("warning:"), e);
            None
        }
    };
    let config = config.map(|(_path, cfg)| cfg).unwrap_or_default();

    let debug_flag = matches!(cli.command, Commands::Run { debug: true, .. });
    init_tracing(debug_flag || config.run.debug);

    match cli.command {
        Commands::Run {
            path,
            debug,
            no_desnake,
        } => cmd_run(&path, &config, debug, no_desnake),
        Commands::Check { path, no_desnake } => cmd_check(&path, &config, no_desnake),
        Commands::Disasm { path, no_desnake } => cmd_disasm(&path, &config, no_desnake),
        Commands::Init => cmd_init(),
    }
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "warn,snake_compiler=debug,snake_vm=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A directory stands for its `main.snake`.
fn resolve_entry(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join("main.snake")
    } else {
        path.to_path_buf()
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{} {}", red("error:"), message);
    std::process::exit(1);
}

fn report_compile_error(err: &CompileError, source: &str, filename: &str) -> ! {
    eprint!("{}", format_compile_error(err, source, filename).render_ansi());
    std::process::exit(1);
}

/// Read the entry file and undo the snake layout unless disabled.
fn load_source(path: &Path, config: &SnakeConfig, no_desnake: bool) -> (PathBuf, String) {
    let file = resolve_entry(path);
    let filename = file.display().to_string();
    let raw = std::fs::read_to_string(&file).unwrap_or_else(|e| {
        fail(&format!("cannot read file '{}': {}", bold(&filename), e))
    });

    if no_desnake || !config.run.desnake {
        debug!(file = %filename, "desnaking disabled");
        return (file, raw);
    }
    match desnake(&raw) {
        Ok(source) => (file, source),
        Err(e) => report_compile_error(&CompileError::Desnake(e), &raw, &filename),
    }
}

/// Lex, parse and lower, dumping each stage to stderr when `dump` is set.
fn build(source: &str, filename: &str, dump: bool) -> Module {
    if dump {
        eprintln!("{} desnaked source", status_label("Source"));
        eprintln!("{}", source);
    }

    let tokens = snake_compiler::tokenize(source)
        .unwrap_or_else(|e| report_compile_error(&e, source, filename));
    if dump {
        eprintln!("{} {} tokens", status_label("Tokens"), tokens.len());
        for token in &tokens {
            eprintln!(
                "{}  {}",
                gray(&format!("{:>4}:{:<3}", token.span.line, token.span.col)),
                token.kind
            );
        }
    }

    let program = parse(tokens)
        .unwrap_or_else(|e| report_compile_error(&CompileError::Parse(e), source, filename));
    if dump {
        eprintln!("{} {} items", status_label("AST"), program.items.len());
        eprintln!("{:#?}", program);
    }

    let module = Compiler::new().translate(&program);
    if dump {
        eprintln!("{} {} functions", status_label("Disassembly"), module.functions.len());
        eprint!("{}", module);
    }
    module
}

fn cmd_run(path: &Path, config: &SnakeConfig, debug: bool, no_desnake: bool) {
    let (file, source) = load_source(path, config, no_desnake);
    let filename = file.display().to_string();
    let module = build(&source, &filename, debug || config.run.debug);

    if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::env::set_current_dir(dir) {
            fail(&format!("cannot enter '{}': {}", dir.display(), e));
        }
    }

    let options = VmOptions {
        max_call_depth: config.run.max_call_depth,
        max_instructions: config.run.max_instructions,
    };
    debug!(file = %filename, ?options, "running");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut vm = VM::new(module, stdin.lock(), stdout.lock()).with_options(options);
    if let Err(e) = vm.run() {
        eprintln!("{}", runtime_error_line(&e, std::io::stderr().is_terminal()));
        std::process::exit(1);
    }
    debug!(
        instructions = vm.instructions_executed(),
        "program halted"
    );
}

/// `Runtime Error: <message>`, with the label colored only on a terminal.
fn runtime_error_line(err: &VmError, color: bool) -> String {
    let label = "Runtime Error:";
    if color {
        format!("{} {}", red(label), err)
    } else {
        format!("{} {}", label, err)
    }
}

fn cmd_check(path: &Path, config: &SnakeConfig, no_desnake: bool) {
    let (file, source) = load_source(path, config, no_desnake);
    let filename = file.display().to_string();
    let module = build(&source, &filename, false);
    println!(
        "{} {} {}",
        green("✓"),
        bold(&filename),
        gray(&format!(
            "no errors found ({} instructions, {} functions)",
            module.main.len(),
            module.functions.len()
        ))
    );
}

fn cmd_disasm(path: &Path, config: &SnakeConfig, no_desnake: bool) {
    let (file, source) = load_source(path, config, no_desnake);
    let filename = file.display().to_string();
    let module = build(&source, &filename, false);
    print!("{}", module);
}

fn cmd_init() {
    let path = PathBuf::from(CONFIG_FILE);
    if path.exists() {
        warn!(path = %path.display(), "config already present");
        fail(&format!("{} already exists, not overwriting", CONFIG_FILE));
    }
    std::fs::write(&path, SnakeConfig::default_template())
        .unwrap_or_else(|e| fail(&format!("writing {}: {}", CONFIG_FILE, e)));
    println!("{} {}", status_label("Created"), CONFIG_FILE);
}
