use crate::output::{Output, OutputFormat};
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use watch_queue_config::{Config, PathManager, StoreBackend};

pub fn run_config(cmd: ConfigCommands, config: &Config, paths: &PathManager, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(config, paths, output),
        ConfigCommands::Init { force } => init_config(force, paths, output),
    }
}

fn show_config(config: &Config, paths: &PathManager, output: &Output) -> Result<()> {
    let config_file = paths.config_file();

    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(());
            }
            if !config_file.exists() {
                output.warn(format!(
                    "No configuration file at {}, showing defaults. Run 'watchqueue config init' to create one.",
                    config_file.display()
                ));
            }

            println!("\n{}", "Configuration".bright_cyan().bold());
            let mut table = Table::new();
            table.set_header(vec![
                Cell::new("Setting").add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").add_attribute(comfy_table::Attribute::Bold),
            ]);
            for (setting, value) in settings_rows(config, paths) {
                table.add_row(vec![Cell::new(setting), Cell::new(value)]);
            }
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
            println!("{}", table);
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&json!({
                "path": config_file.display().to_string(),
                "exists": config_file.exists(),
                "config": config
            }));
        }
    }
    Ok(())
}

fn settings_rows(config: &Config, paths: &PathManager) -> Vec<(&'static str, String)> {
    let store_location = match config.store.backend {
        StoreBackend::File => paths.store_file(&config.store.key).display().to_string(),
        StoreBackend::Memory => "(in memory, not persisted)".to_string(),
    };
    vec![
        ("Config file", paths.config_file().display().to_string()),
        ("Store backend", format!("{:?}", config.store.backend).to_lowercase()),
        ("Store key", config.store.key.clone()),
        ("Store location", store_location),
        ("Store lock wait", format!("{} ms", config.store.lock_timeout_ms)),
        ("State request timeout", format!("{} ms", config.sync.request_state_timeout_ms)),
        ("Delivery timeout", format!("{} ms", config.sync.delivery_timeout_ms)),
        ("Channel capacity", config.sync.channel_capacity.to_string()),
        ("Watch URL markers", config.sync.watch_markers.join(", ")),
        ("Log level", config.logging.level.clone()),
        ("JSON logs", config.logging.json.to_string()),
        (
            "Log file",
            config
                .logging
                .file
                .as_ref()
                .map(|file| file.display().to_string())
                .unwrap_or_else(|| "(stderr)".to_string()),
        ),
    ]
}

fn init_config(force: bool, paths: &PathManager, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        output.warn(format!(
            "{} already exists; use --force to overwrite it",
            config_file.display()
        ));
        return Ok(());
    }

    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create {}: {}", paths.config_dir().display(), e))?;
    Config::default()
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to write {}: {}", config_file.display(), e))?;
    output.success(format!("Wrote default configuration to {}", config_file.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::from_base(dir.path().to_path_buf());
        let output = Output::new(OutputFormat::Json, true);

        init_config(false, &paths, &output).unwrap();
        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.store.key, Config::default().store.key);
        assert!(paths.data_dir().exists());
    }

    #[test]
    fn test_init_keeps_existing_file_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::from_base(dir.path().to_path_buf());
        let output = Output::new(OutputFormat::Json, true);
        std::fs::write(paths.config_file(), "[store]\nkey = \"mine\"\n").unwrap();

        init_config(false, &paths, &output).unwrap();
        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.store.key, "mine");

        init_config(true, &paths, &output).unwrap();
        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.store.key, "universal_queue_state");
    }

    #[test]
    fn test_settings_rows_memory_store() {
        let paths = PathManager::from_base("/srv/wq");
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let rows = settings_rows(&config, &paths);
        assert!(rows.contains(&("Store location", "(in memory, not persisted)".to_string())));
        assert!(rows.contains(&("Store backend", "memory".to_string())));
    }
}
