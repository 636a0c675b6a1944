use std::fs;

use crate::cli::commands::InitArgs;
use crate::io::project_io::{self, BOARD_DIR, CONFIG_FILE};

/// Infer a project name from a directory name: replace hyphens with spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn cmd_init(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let board_dir = cwd.join(BOARD_DIR);
    let config_path = board_dir.join(CONFIG_FILE);

    if config_path.exists() {
        if !args.force {
            return Err(format!(
                "routeboard project already exists in ./{}/ (use --force to rewrite its config)",
                BOARD_DIR
            )
            .into());
        }
        // The dataset is kept; only the config is rewritten
        fs::remove_file(&config_path)?;
    }

    // Check for parent project and warn
    if let Some(parent) = cwd.parent()
        && let Ok(parent_root) = project_io::discover_project(parent)
    {
        eprintln!(
            "Note: parent project found at {}/",
            parent_root.join(BOARD_DIR).display()
        );
        eprintln!("Creating new project in ./{}/", BOARD_DIR);
    }

    let name = args.name.unwrap_or_else(|| {
        cwd.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    });

    project_io::init_project(&cwd, &name)?;
    println!("Initialized routeboard project: {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_name() {
        assert_eq!(infer_name("north-depot"), "North Depot");
        assert_eq!(infer_name("routes"), "Routes");
        assert_eq!(infer_name("west_side-2"), "West Side 2");
        assert_eq!(infer_name("--"), "");
    }
}
