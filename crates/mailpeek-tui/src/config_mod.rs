use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use mailpeek_core::{MatchPolicy, SearchField};
use mailpeek_mail::ImapConfig;

pub(crate) const DEFAULT_FETCH_LIMIT: u32 = 50;
const DEFAULT_IMAP_PORT: u16 = 993;
const CONFIG_FILE: &str = "mailpeek.toml";

const ENV_HOST: &str = "MAILPEEK_IMAP_HOST";
const ENV_PORT: &str = "MAILPEEK_IMAP_PORT";
const ENV_USERNAME: &str = "MAILPEEK_USERNAME";
const ENV_PASSWORD: &str = "MAILPEEK_PASSWORD";

#[derive(Debug, Clone)]
pub(crate) struct AppConfig {
    pub(crate) imap: ImapConfig,
    pub(crate) limit: u32,
    pub(crate) policy: MatchPolicy,
    pub(crate) field: SearchField,
    pub(crate) keys: HashMap<String, Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            imap: ImapConfig {
                host: String::new(),
                port: DEFAULT_IMAP_PORT,
                username: String::new(),
                password: String::new(),
                skip_tls_verify: false,
            },
            limit: DEFAULT_FETCH_LIMIT,
            policy: MatchPolicy::default(),
            field: SearchField::All,
            keys: HashMap::new(),
        }
    }
}

pub(crate) enum LoadedConfig {
    Ready { config: AppConfig, path: PathBuf },
    /// No config existed; a template was written here.
    TemplateWritten(PathBuf),
}

pub(crate) fn xdg_config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub(crate) fn xdg_state_dir() -> PathBuf {
    std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn default_config_path() -> PathBuf {
    xdg_config_dir().join("mailpeek").join(CONFIG_FILE)
}

fn config_path_candidates() -> Vec<PathBuf> {
    vec![PathBuf::from(CONFIG_FILE), default_config_path()]
}

fn load_config_text() -> Option<(PathBuf, String)> {
    for path in config_path_candidates() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            return Some((path, content));
        }
    }
    None
}

/// Finds, parses and validates the config. Environment variables override
/// the file's credentials.
pub(crate) fn load_config() -> Result<LoadedConfig> {
    let Some((path, text)) = load_config_text() else {
        let path = default_config_path();
        write_text_atomic(&path, default_config_template())?;
        return Ok(LoadedConfig::TemplateWritten(path));
    };
    let mut config =
        parse_config(&text).with_context(|| format!("failed to parse {}", path.display()))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    let missing = missing_credentials(&config.imap);
    if !missing.is_empty() {
        bail!(
            "missing {} in {} (or set {ENV_HOST}, {ENV_PORT}, {ENV_USERNAME}, {ENV_PASSWORD})",
            missing.join(", "),
            path.display()
        );
    }
    Ok(LoadedConfig::Ready { config, path })
}

/// Writes the template to the XDG path. Refuses to replace an existing file
/// unless `force` is set.
pub(crate) fn init_config(force: bool) -> Result<PathBuf> {
    let path = default_config_path();
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_text_atomic(&path, default_config_template())?;
    Ok(path)
}

pub(crate) fn parse_config(text: &str) -> Result<AppConfig> {
    let value: toml::Value = toml::from_str(text)?;
    let mut config = AppConfig::default();

    if let Some(imap) = value.get("imap") {
        let cfg = &mut config.imap;
        cfg.host = str_field(imap, "host");
        cfg.username = str_field(imap, "username");
        cfg.password = str_field(imap, "password");
        if let Some(port) = imap.get("port") {
            cfg.port = parse_port(port)?;
        }
        cfg.skip_tls_verify = imap
            .get("skip_tls_verify")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
    }

    if let Some(limit) = value
        .get("fetch")
        .and_then(|f| f.get("limit"))
        .and_then(|v| v.as_integer())
    {
        config.limit = limit.clamp(1, u32::MAX as i64) as u32;
    }

    if let Some(search) = value.get("search") {
        if let Some(factor) = search.get("max_distance_factor").and_then(|v| v.as_integer()) {
            config.policy.max_distance_factor = factor.max(0) as usize;
        }
        if let Some(raw) = search.get("field").and_then(|v| v.as_str()) {
            config.field = SearchField::parse(raw)
                .ok_or_else(|| anyhow!("unknown search field {:?}", raw))?;
        }
    }

    if let Some(keys) = value.get("keys").and_then(|v| v.as_table()) {
        for (action, list) in keys {
            let names = match list {
                toml::Value::String(s) => vec![s.clone()],
                toml::Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => bail!("keys.{action} must be a string or list of strings"),
            };
            config.keys.insert(action.clone(), names);
        }
    }

    Ok(config)
}

fn str_field(table: &toml::Value, key: &str) -> String {
    table
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Ports are accepted as integers or as strings.
fn parse_port(value: &toml::Value) -> Result<u16> {
    match value {
        toml::Value::Integer(n) => {
            u16::try_from(*n).map_err(|_| anyhow!("imap.port {n} out of range"))
        }
        toml::Value::String(s) => s
            .trim()
            .parse::<u16>()
            .map_err(|_| anyhow!("imap.port {:?} is not a port number", s)),
        _ => bail!("imap.port must be a number"),
    }
}

pub(crate) fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(host) = set(ENV_HOST) {
        config.imap.host = host.trim().to_string();
    }
    if let Some(port) = set(ENV_PORT) {
        config.imap.port = port
            .trim()
            .parse()
            .map_err(|_| anyhow!("{ENV_PORT}={:?} is not a port number", port))?;
    }
    if let Some(username) = set(ENV_USERNAME) {
        config.imap.username = username.trim().to_string();
    }
    if let Some(password) = set(ENV_PASSWORD) {
        config.imap.password = password;
    }
    Ok(())
}

pub(crate) fn missing_credentials(imap: &ImapConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if imap.host.is_empty() {
        missing.push("imap.host");
    }
    if imap.port == 0 {
        missing.push("imap.port");
    }
    if imap.username.is_empty() {
        missing.push("imap.username");
    }
    if imap.password.is_empty() {
        missing.push("imap.password");
    }
    missing
}

fn default_config_template() -> &'static str {
    r#"# Auto-generated by mailpeek on first run.
# Fill in [imap] and start mailpeek again.

[imap]
host = "imap.example.com"
port = 993
username = ""
password = ""
skip_tls_verify = false

[fetch]
# Newest messages to load from INBOX.
limit = 50

[search]
# A message matches when its edit distance to the query is at most
# max_distance_factor * query length.
max_distance_factor = 2
# all | sender | subject | body
field = "all"

# [keys]
# up = ["k", "up"]
# down = ["j", "down"]
# page_up = ["pgup", "ctrl+u"]
# page_down = ["pgdown", "ctrl+d"]
# select = ["enter"]
# back = ["x"]
# search = ["/", "f"]
# quit = ["q", "ctrl+c"]
"#
}

fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    // Keep ownership and mode of a file the user already has.
    if path.exists() {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(content.as_bytes())?;
        return Ok(());
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
