use anyhow::{Context, Result};
use segue_discover::{config, Config};
use serde_json::Value;
use toml_edit::DocumentMut;

/// Keys accepted by `config get` and `config set`, with whether the value
/// is numeric.
const KEYS: &[(&str, bool)] = &[
    ("spotify_client_id", false),
    ("spotify_client_secret", false),
    ("spotify_user_token", false),
    ("gemini_api_key", false),
    ("gemini_model", false),
    ("genius_access_token", false),
    ("audiodb_api_key", false),
    ("lyric_schema_path", false),
    ("default_playlist", false),
    ("default_limit", true),
    ("resolve_concurrency", true),
    ("request_timeout_secs", true),
    ("database_path", false),
    ("log_level", false),
];

fn is_secret(key: &str) -> bool {
    key.ends_with("_secret") || key.ends_with("_token") || key.ends_with("_api_key")
}

fn lookup(key: &str) -> Result<(&'static str, bool)> {
    KEYS.iter()
        .find(|(name, _)| *name == key)
        .copied()
        .ok_or_else(|| {
            let valid: Vec<_> = KEYS.iter().map(|(name, _)| *name).collect();
            anyhow::anyhow!("Unknown config key: {key}\n\nValid keys: {}", valid.join(", "))
        })
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "<not set>".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    let values = serde_json::to_value(config)?;

    println!("Current Configuration");
    println!("=====================\n");

    let config_path = config::config_file_path();
    println!("Config file: {}", config_path.display());
    println!(
        "File exists: {}\n",
        if config_path.exists() {
            "yes"
        } else {
            "no (using defaults)"
        }
    );

    println!("Settings:");
    for (key, _) in KEYS {
        let value = values.get(key);
        let shown = if is_secret(key) && !matches!(value, None | Some(Value::Null)) {
            "<set>".to_string()
        } else {
            display(value)
        };
        println!("  {key}: {shown}");
    }

    println!("\nPriority: CLI args > ENV vars (SEGUE_*) > Config file > Defaults");

    Ok(())
}

/// Print one config value, or the config file when no key is given.
pub fn get_config(config: &Config, key: Option<&str>) -> Result<()> {
    if let Some(key) = key {
        let (key, _) = lookup(key)?;
        let values = serde_json::to_value(config)?;
        println!("{}", display(values.get(key)));
    } else {
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{contents}");
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'segue config init' to create it.");
        }
    }

    Ok(())
}

/// Set `key` in a TOML document, keeping comments and layout.
fn set_in_document(contents: &str, key: &str, value: &str) -> Result<String> {
    let (key, numeric) = lookup(key)?;
    let mut doc: DocumentMut = contents.parse().context("Failed to parse config file")?;

    if numeric {
        let number: i64 = value
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a whole number"))?;
        doc[key] = toml_edit::value(number);
    } else {
        doc[key] = toml_edit::value(value);
    }

    Ok(doc.to_string())
}

/// Set a config value.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let config_path = config::config_file_path();

    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let updated = set_in_document(&contents, key, value)?;
    std::fs::write(&config_path, updated).context("Failed to write config file")?;

    let shown = if is_secret(key) { "<set>" } else { value };
    println!("✓ Updated {key} = {shown}");
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure segue.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
