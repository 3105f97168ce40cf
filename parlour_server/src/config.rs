use parlour_chat::ChatConfig;

use serde::Deserialize;
use thiserror::Error;
use tracing_core::LevelFilter;

use std::{
    collections::HashMap,
    fs::File,
    io::Read,
    net::SocketAddr,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Debug,Error)]
pub enum ConfigError
{
    #[error("Couldn't read {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("Couldn't parse {0}: {1}")]
    Parse(PathBuf, json5::Error),
}

#[derive(Clone,Debug,Deserialize)]
pub struct ListenerConfig
{
    pub address: SocketAddr,
}

impl Default for ListenerConfig
{
    fn default() -> Self
    {
        Self { address: SocketAddr::from(([0, 0, 0, 0], 2221)) }
    }
}

#[derive(Clone,Debug,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum BuiltinLogTarget
{
    Stdout,
    Stderr,
}

#[derive(Clone,Debug,Deserialize)]
#[serde(untagged)]
pub enum LogTarget
{
    File { filename: PathBuf },
    Builtin(BuiltinLogTarget),
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum LogLevel
{
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum LogFormat
{
    #[default]
    Full,
    Compact,
    Pretty,
}

#[derive(Clone,Debug,Deserialize)]
pub struct LogEntry
{
    pub target: LogTarget,
    #[serde(default)]
    pub modules: Vec<String>,
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Clone,Debug,Deserialize)]
#[serde(rename_all="kebab-case", default)]
pub struct LoggingConfig
{
    pub dir: PathBuf,
    pub default_level: Option<LogLevel>,
    pub module_levels: HashMap<String, LogLevel>,
    pub targets: Vec<LogEntry>,
}

impl Default for LoggingConfig
{
    fn default() -> Self
    {
        Self {
            dir: PathBuf::from("log"),
            default_level: Some(LogLevel::Info),
            module_levels: HashMap::new(),
            targets: vec![LogEntry {
                target: LogTarget::Builtin(BuiltinLogTarget::Stderr),
                modules: Vec::new(),
                level: None,
                format: LogFormat::Full,
            }],
        }
    }
}

impl LoggingConfig
{
    /// Whether any target writes into [`dir`](Self::dir)
    pub fn uses_dir(&self) -> bool
    {
        self.targets.iter().any(|t| matches!(t.target, LogTarget::File { .. }))
    }
}

/// Everything the `parlour` binary reads from its config file
#[derive(Clone,Debug,Deserialize)]
pub struct ServerConfig
{
    #[serde(default = "default_listeners")]
    pub listeners: Vec<ListenerConfig>,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub log: LoggingConfig,
}

fn default_listeners() -> Vec<ListenerConfig>
{
    vec![ListenerConfig::default()]
}

impl Default for ServerConfig
{
    fn default() -> Self
    {
        Self {
            listeners: default_listeners(),
            chat: ChatConfig::default(),
            log: LoggingConfig::default(),
        }
    }
}

impl ServerConfig
{
    pub fn load_file<P: AsRef<Path>>(filename: P) -> Result<Self, ConfigError>
    {
        let path = filename.as_ref();
        let mut config = String::new();
        File::open(path)
            .and_then(|mut file| file.read_to_string(&mut config))
            .map_err(|e| ConfigError::Io(path.to_owned(), e))?;

        Self::parse(&config).map_err(|e| ConfigError::Parse(path.to_owned(), e))
    }

    pub fn parse(text: &str) -> Result<Self, json5::Error>
    {
        json5::from_str(text)
    }
}

impl From<LogLevel> for LevelFilter
{
    fn from(arg: LogLevel) -> LevelFilter
    {
        match arg
        {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info  => LevelFilter::INFO,
            LogLevel::Warn  => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off   => LevelFilter::OFF,
        }
    }
}
