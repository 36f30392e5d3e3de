//! Minimal CLI: manifests → (typescript | summary)
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::config::GenOptions;
use crate::manifest::Manifest;
use crate::method::Registry;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate typed TypeScript client bindings from RPC manifests
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate the TypeScript artifact
    Generate(GenerateOut),
    /// validate manifests and print a summary of every method
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more manifests. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct OptionOverrides {
    /// file written verbatim at the top of the artifact
    #[arg(long)]
    preamble: Option<PathBuf>,

    /// expression every wrapper delegates to
    #[arg(long)]
    dispatch: Option<String>,

    /// generic type wrapping every return type
    #[arg(long)]
    result_type: Option<String>,

    /// spaces per indentation level
    #[arg(long)]
    indent: Option<usize>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    overrides: OptionOverrides,

    /// output .ts file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load(&self) -> anyhow::Result<(Registry, GenOptions)> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut manifest = Manifest::default();
        for source_path in source_paths {
            let next = Manifest::load(&source_path)
                .with_context(|| format!("failed to load manifest {}", source_path.display()))?;
            manifest.merge(next)?;
        }
        Ok(manifest.into_registry()?)
    }
}

impl OptionOverrides {
    fn apply(&self, options: &mut GenOptions) -> anyhow::Result<()> {
        if let Some(path) = self.preamble.as_ref() {
            options.preamble = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read preamble {}", path.display()))?;
        }
        if let Some(dispatch) = self.dispatch.as_ref() {
            options.dispatch = dispatch.clone();
        }
        if let Some(result_type) = self.result_type.as_ref() {
            options.result_type = result_type.clone();
        }
        if let Some(indent) = self.indent {
            options.indent = indent;
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let (registry, mut options) = target.input_settings.load()?;
                target.overrides.apply(&mut options)?;
                let ts_src = crate::codegen::generate(&registry, &options)?;

                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &ts_src)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    print!("{ts_src}");
                }
            }
            Command::Check(target) => {
                let (registry, options) = target.input_settings.load()?;
                // generation errors surface here too
                crate::codegen::generate(&registry, &options)?;
                print_summary(&registry)?;
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn print_summary(registry: &Registry) -> anyhow::Result<()> {
    for method in registry.methods() {
        let params = registry.types().name(method.params)?;
        let mut flags = Vec::new();
        if method.uses_session {
            flags.push(if method.session_optional { "session?" } else { "session" });
        }
        if method.uses_credentials {
            flags.push("credentials");
        }
        let limit = match method.rate_limit {
            0 => String::new(),
            secs => format!(" rate_limit={secs}s"),
        };
        println!("{} ({params}) [{}]{limit}", method.name.bold(), flags.join(", "));
    }
    eprintln!("{} {} method(s)", "ok:".green().bold(), registry.len());
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
