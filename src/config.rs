use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::typing::{DEFAULT_FPS, DEFAULT_TYPING_DURATION_MS, TypingConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Time (ms) to type out buffered content
    #[arg(long, env = "TYPING_DURATION_MS")]
    pub typing_duration_ms: Option<u64>,

    /// Typing animation frame rate
    #[arg(long, env = "TYPING_FPS")]
    pub typing_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub typing: TypingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Directory served under `/static`.
    pub static_dir: String,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl AppConfig {
    /// Load from the process arguments; `--help` and `--version` exit here.
    pub fn load() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    /// Load from an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_cli(Cli::try_parse_from(args)?)
    }

    /// Build the configuration.
    ///
    /// Priority: CLI flag > CLI env var > `MDWC_` env var > config file > defaults.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.static_dir", "static")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.max_body_bytes", 1024 * 1024)?
            .set_default("typing.duration_ms", DEFAULT_TYPING_DURATION_MS)?
            .set_default("typing.fps", DEFAULT_FPS)?;

        // An explicit file must exist; ./config.{yaml,toml,json} is optional.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // E.g. MDWC_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("MDWC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(duration) = cli.typing_duration_ms {
            builder = builder.set_override("typing.duration_ms", duration)?;
        }
        if let Some(fps) = cli.typing_fps {
            builder = builder.set_override("typing.fps", fps)?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.typing.validate()?;
        Ok(config)
    }
}
