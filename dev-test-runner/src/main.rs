//! Runs every manifest under `fixtures/` through the generator.
//!
//! Each manifest is generated twice and the two artifacts must be byte-equal.
//! When a sibling `.ts` snapshot exists the artifact must match it exactly.
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use rpc_bindgen::{Manifest, generate};

fn main() -> anyhow::Result<()> {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("../fixtures");
    let pattern = fixtures.join("*.json");
    let mut failures = 0usize;
    let mut total = 0usize;
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry?;
        total += 1;
        match run_fixture(&path) {
            Ok(()) => eprintln!("{} {}", "ok".green().bold(), path.display()),
            Err(error) => {
                failures += 1;
                eprintln!("{} {}: {error:#}", "FAIL".red().bold(), path.display());
            }
        }
    }
    eprintln!("{total} fixture(s), {failures} failure(s)");
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_fixture(path: &Path) -> anyhow::Result<()> {
    let first = render(path)?;
    let second = render(path)?;
    if first != second {
        anyhow::bail!("generation is not deterministic");
    }
    let snapshot: PathBuf = path.with_extension("ts");
    if snapshot.exists() {
        let expected = std::fs::read_to_string(&snapshot)
            .with_context(|| format!("failed to read {}", snapshot.display()))?;
        if expected != first {
            anyhow::bail!("artifact differs from {}\n{first}", snapshot.display());
        }
    }
    Ok(())
}

fn render(path: &Path) -> anyhow::Result<String> {
    let (registry, options) = Manifest::load(path)?.into_registry()?;
    Ok(generate(&registry, &options)?)
}
