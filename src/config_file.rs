use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG_NAME: &str = ".visascanrc";

/// Per-path scan settings read from `[search]` or `[stats]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSection {
    pub chunk_size: Option<usize>,
    pub max_files: Option<usize>,
    pub max_chunks: Option<usize>,
    pub limit: Option<usize>,
}

impl ScanSection {
    fn merge(base: Self, overlay: Self) -> Self {
        Self {
            chunk_size: overlay.chunk_size.or(base.chunk_size),
            max_files: overlay.max_files.or(base.max_files),
            max_chunks: overlay.max_chunks.or(base.max_chunks),
            limit: overlay.limit.or(base.limit),
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Configuration file handler for visascan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub data_dir: Option<PathBuf>,
    pub pretty: Option<bool>,
    pub search: ScanSection,
    pub stats: ScanSection,
}

impl ConfigFile {
    /// Find project-level .visascanrc by walking up directory tree
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let config_path = current.join(PROJECT_CONFIG_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// User config file locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("visascan").join("config.ini"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(PROJECT_CONFIG_NAME));
        }
        paths
    }

    /// Load configuration with precedence: project > user > defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::get_user_config_paths().into_iter().find(|p| p.is_file()) {
            config = Self::merge_configs(config, Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = Self::merge_configs(config, Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    /// Load configuration, honouring an explicit `--config-file`
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse_ini_content(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        // A relative data-dir is relative to the file that names it
        if let (Some(dir), Some(parent)) = (&config.data_dir, path.parent()) {
            if dir.is_relative() {
                config.data_dir = Some(parent.join(dir));
            }
        }

        Ok(config)
    }

    /// Parse INI content from string
    pub fn parse_ini_content(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].trim().to_string();
                continue;
            }

            let Some(eq_pos) = line.find('=') else {
                return Err(anyhow!("line {}: expected 'key = value'", line_no + 1));
            };
            let key = line[..eq_pos].trim();
            let value = line[eq_pos + 1..].trim();

            match current_section.as_str() {
                "" | "defaults" => match key {
                    "data-dir" => config.data_dir = Some(PathBuf::from(value)),
                    "pretty" => config.pretty = Some(parse_bool(key, value, line_no)?),
                    _ => {}
                },
                "search" => apply_scan_key(&mut config.search, key, value, line_no)?,
                "stats" => apply_scan_key(&mut config.stats, key, value, line_no)?,
                // Ignore unknown sections
                _ => {}
            }
        }

        Ok(config)
    }

    /// Merge two configuration objects, with the second taking precedence
    fn merge_configs(base: Self, overlay: Self) -> Self {
        Self {
            data_dir: overlay.data_dir.or(base.data_dir),
            pretty: overlay.pretty.or(base.pretty),
            search: ScanSection::merge(base.search, overlay.search),
            stats: ScanSection::merge(base.stats, overlay.stats),
        }
    }

    /// Show configuration information with precedence details
    pub fn show_config(custom_path: Option<&Path>) {
        println!("Configuration precedence: CLI > project {} > user config > defaults\n", PROJECT_CONFIG_NAME);

        let project_config_path = Self::find_project_config();
        let user_config_paths = Self::get_user_config_paths();
        let user_config_path = user_config_paths.iter().find(|p| p.is_file());

        match Self::load_with_custom_path(custom_path) {
            Ok(merged) => {
                let mut loaded_from = Vec::new();
                if let Some(path) = custom_path {
                    loaded_from.push(format!("Custom: {}", path.display()));
                } else {
                    if let Some(path) = &project_config_path {
                        loaded_from.push(format!("Project: {}", path.display()));
                    }
                    if let Some(path) = user_config_path {
                        loaded_from.push(format!("User: {}", path.display()));
                    }
                }

                if loaded_from.is_empty() {
                    println!("No configuration files found. Using defaults.");
                } else {
                    println!("Configuration loaded from:");
                    for source in loaded_from {
                        println!("  {}", source);
                    }
                }

                if merged.data_dir.is_some() || merged.pretty.is_some() {
                    println!("\n[defaults]");
                    if let Some(dir) = &merged.data_dir {
                        println!("  data-dir = {}", dir.display());
                    }
                    if let Some(pretty) = merged.pretty {
                        println!("  pretty = {}", pretty);
                    }
                }
                for (name, section) in [("search", &merged.search), ("stats", &merged.stats)] {
                    if section.is_empty() {
                        continue;
                    }
                    println!("\n[{}]", name);
                    print_option("chunk-size", section.chunk_size);
                    print_option("max-files", section.max_files);
                    print_option("max-chunks", section.max_chunks);
                    print_option("limit", section.limit);
                }
            }
            Err(e) => {
                eprintln!(
                    "{}",
                    crate::config::format_error_message_auto(&format!(
                        "Error loading configuration: {:#}",
                        e
                    ))
                );
            }
        }

        println!("\nConfiguration search locations (in precedence order):");
        match &project_config_path {
            Some(path) => println!("  1. Project: {} (found)", path.display()),
            None => println!(
                "  1. Project: {} (searched up directory tree, not found)",
                PROJECT_CONFIG_NAME
            ),
        }
        for (i, path) in user_config_paths.iter().enumerate() {
            let status = if path.is_file() { "(found)" } else { "(not found)" };
            println!("  {}. User: {} {}", i + 2, path.display(), status);
        }

        if custom_path.is_none() && project_config_path.is_none() && user_config_path.is_none() {
            println!("\nExample configuration file ({}):", PROJECT_CONFIG_NAME);
            println!();
            println!("[defaults]");
            println!("data-dir = /srv/dol-disclosures");
            println!();
            println!("[search]");
            println!("max-files = 3");
            println!("max-chunks = 5");
            println!();
            println!("[stats]");
            println!("chunk-size = 50000");
        }
    }
}

fn print_option(key: &str, value: Option<usize>) {
    if let Some(value) = value {
        println!("  {} = {}", key, value);
    }
}

fn apply_scan_key(section: &mut ScanSection, key: &str, value: &str, line_no: usize) -> Result<()> {
    let slot = match key {
        "chunk-size" => &mut section.chunk_size,
        "max-files" => &mut section.max_files,
        "max-chunks" => &mut section.max_chunks,
        "limit" => &mut section.limit,
        _ => return Ok(()),
    };
    let parsed = value
        .parse::<usize>()
        .map_err(|e| anyhow!("line {}: invalid {} '{}': {}", line_no + 1, key, value, e))?;
    // A zero limit asks for an empty page; a zero bound would scan nothing
    if key != "limit" && parsed == 0 {
        return Err(anyhow!("line {}: {} must be at least 1", line_no + 1, key));
    }
    *slot = Some(parsed);
    Ok(())
}

fn parse_bool(key: &str, value: &str, line_no: usize) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow!("line {}: invalid {} '{}'", line_no + 1, key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_sections() {
        let config = ConfigFile::parse_ini_content(
            "# visascan settings\n\
             data-dir = /srv/data\n\
             \n\
             [search]\n\
             max-files = 4\n\
             chunk-size = 1000\n\
             unknown = ignored\n\
             \n\
             [stats]\n\
             max-chunks = 10\n\
             \n\
             [other]\n\
             anything = goes\n",
        )
        .unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/data")));
        assert_eq!(config.search.max_files, Some(4));
        assert_eq!(config.search.chunk_size, Some(1000));
        assert_eq!(config.search.max_chunks, None);
        assert_eq!(config.stats.max_chunks, Some(10));
    }

    #[test]
    fn test_defaults_section_and_bool() {
        let config =
            ConfigFile::parse_ini_content("[defaults]\ndata-dir = data\npretty = yes\n").unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("data")));
        assert_eq!(config.pretty, Some(true));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = ConfigFile::parse_ini_content("[search]\nmax-files = many\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        assert!(ConfigFile::parse_ini_content("[stats]\nchunk-size = 0\n").is_err());
        assert!(ConfigFile::parse_ini_content("[search]\nmax-files = 0\n").is_err());
        assert!(ConfigFile::parse_ini_content("[stats]\nmax-chunks = 0\n").is_err());
        assert!(ConfigFile::parse_ini_content("[search]\nlimit = 0\n").is_ok());
        assert!(ConfigFile::parse_ini_content("pretty = maybe\n").is_err());
        assert!(ConfigFile::parse_ini_content("just words\n").is_err());
    }

    #[test]
    fn test_overlay_takes_precedence() {
        let user = ConfigFile::parse_ini_content(
            "data-dir = /user\n[search]\nmax-files = 2\nlimit = 50\n",
        )
        .unwrap();
        let project = ConfigFile::parse_ini_content("[search]\nmax-files = 7\n").unwrap();

        let merged = ConfigFile::merge_configs(user, project);
        assert_eq!(merged.data_dir, Some(PathBuf::from("/user")));
        assert_eq!(merged.search.max_files, Some(7));
        assert_eq!(merged.search.limit, Some(50));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_location() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(PROJECT_CONFIG_NAME);
        fs::write(&path, "data-dir = datasets\n")?;

        let config = ConfigFile::load_from_path(&path)?;
        assert_eq!(config.data_dir, Some(dir.path().join("datasets")));
        Ok(())
    }

    #[test]
    fn test_missing_custom_file_is_an_error() {
        let err = ConfigFile::load_with_custom_path(Some(Path::new("/nonexistent/visascan.ini")))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/visascan.ini"));
    }
}
