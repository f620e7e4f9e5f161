use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use crate::config::{Config, OutputFormat};
use crate::gitlab::{Batch, GitLabFetcher};
use crate::output;

#[derive(Parser)]
#[command(name = "glfetch")]
#[command(author, version, about = "GitLab project and pipeline fetcher", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./glfetch.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the rendered report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch project metadata, then pipeline lists
    Fetch {
        /// Numeric project ids
        #[arg(
            short = 'P',
            long = "project",
            env = "GLFETCH_PROJECTS",
            value_delimiter = ','
        )]
        projects: Vec<i64>,

        /// GitLab instance base URL
        #[arg(short, long)]
        url: Option<String>,

        /// Maximum number of transfers in flight
        #[arg(short = 'j', long)]
        max_connections: Option<usize>,

        /// Longest idle wait between transfer polls, in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Write a configuration file with default settings
    InitConfig {
        #[arg(default_value = "glfetch.toml")]
        path: PathBuf,
    },
}

struct FetchOverrides<'a> {
    projects: &'a [i64],
    url: Option<&'a str>,
    max_connections: Option<usize>,
    poll_interval_ms: Option<u64>,
    timeout: Option<u64>,
    format: Option<OutputFormat>,
}

impl FetchOverrides<'_> {
    fn apply(&self, config: &mut Config) {
        if !self.projects.is_empty() {
            config.gitlab.projects = self.projects.to_vec();
        }
        if let Some(url) = self.url {
            config.gitlab.base_url = url.to_owned();
        }
        if let Some(max_connections) = self.max_connections {
            config.gitlab.max_connections = max_connections;
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.gitlab.poll_interval_ms = poll_interval_ms;
        }
        if self.timeout.is_some() {
            config.gitlab.request_timeout_secs = self.timeout;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
    }
}

impl Cli {
    async fn execute_fetch(&self, overrides: &FetchOverrides<'_>) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        overrides.apply(&mut config);
        if self.pretty {
            config.output.pretty = true;
        }
        config.validate()?;

        if config.gitlab.projects.is_empty() {
            bail!("No project ids given; pass --project or set gitlab.projects in the config file");
        }

        info!(
            "Fetching {} projects from {}",
            config.gitlab.projects.len(),
            config.gitlab.base_url
        );

        let fetcher = GitLabFetcher::new(&config.gitlab)?;
        let mut batch = Batch::new(config.gitlab.max_tokens);
        let report = fetcher.fetch(&mut batch, &config.gitlab.projects).await?;

        let rendered = output::render(&report, config.output.format, config.output.pretty)?;

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, rendered)?;
            info!("Report written to: {}", output_path.display());
        } else {
            print!("{rendered}");
            if !rendered.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }

    fn execute_init_config(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Refusing to overwrite existing file: {}", path.display());
        }
        Config::default().save(path)?;
        info!("Default configuration written to: {}", path.display());
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Fetch {
                projects,
                url,
                max_connections,
                poll_interval_ms,
                timeout,
                format,
            } => {
                let overrides = FetchOverrides {
                    projects,
                    url: url.as_deref(),
                    max_connections: *max_connections,
                    poll_interval_ms: *poll_interval_ms,
                    timeout: *timeout,
                    format: *format,
                };
                self.execute_fetch(&overrides).await
            }
            Commands::InitConfig { path } => Self::execute_init_config(path),
        }
    }
}
