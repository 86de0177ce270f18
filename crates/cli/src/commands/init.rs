//! `stepwise init`: write a default configuration file.

use std::path::Path;

use stepwise_config::{AppConfig, DEFAULT_CONFIG_FILE};

pub fn run(path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }

    std::fs::write(path, AppConfig::default_toml())?;
    println!("Wrote {}", path.display());

    let workspace = AppConfig::load_from(path)?.workspace_dir;
    if !workspace.exists() {
        std::fs::create_dir_all(&workspace)?;
        println!("Created workspace directory: {}", workspace.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepwise.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        assert!(run(Some(&path), false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");
    }

    #[test]
    fn written_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepwise.toml");
        std::fs::write(&path, "").unwrap();
        run(Some(&path), true).unwrap();

        let app = AppConfig::load_from(&path).unwrap();
        assert_eq!(app.max_iterations, AppConfig::default().max_iterations);
        assert!(dir.path().join("workspace").is_dir());
    }
}
