//! Validate a material folder.

use std::path::PathBuf;

use super::load_folder;

pub fn run(dir: PathBuf) -> anyhow::Result<()> {
    println!("Validating material at: {}", dir.display());

    let folder = load_folder(&dir)?;

    println!("  Slides: {}", folder.pairs.len());
    for pair in &folder.pairs {
        println!(
            "    {}: {} + {}",
            pair.stem,
            file_name(&pair.image),
            file_name(&pair.audio)
        );
    }
    println!("  Avatar: {}", present(folder.avatar.is_some()));
    println!("  Script: {}", present(folder.script.is_some()));
    println!("  Subtitles: {}", present(folder.subtitle.is_some()));

    for warning in &folder.warnings {
        println!("  Warning: {warning}");
    }

    let errors = folder.validate();
    if errors.is_empty() {
        println!("\nMaterial is ready for assembly.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!("\n{} issue(s) found.", errors.len());
    }

    Ok(())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn present(found: bool) -> &'static str {
    if found {
        "present"
    } else {
        "missing"
    }
}
