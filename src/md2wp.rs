use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::exporter::Exporter;
use crate::importer::Importer;
use crate::wordpress::WordPress;

pub const PASSWORD_VAR: &str = "MD2WP_PASSWORD";

#[derive(Clone, Debug, Parser)]
#[clap(version, about)]
/// Moves Jekyll-style markdown posts and pages into WordPress, and back out
pub struct Args {
    /// WordPress admin user
    #[clap(short, long, global = true)]
    pub username: Option<String>,
    /// WordPress site URL (ex: https://mysite.com)
    #[clap(short, long, global = true)]
    pub site: Option<String>,
    /// Folder holding (or receiving) the markdown files
    #[clap(short, long, global = true, parse(from_os_str))]
    pub folder: Option<PathBuf>,
    /// Config file to use instead of $XDG_CONFIG_HOME/md2wp/config.toml
    #[clap(short, long, global = true, parse(from_os_str))]
    pub config: Option<PathBuf>,
    /// More output; repeat for even more
    #[clap(short, long, global = true, parse(from_occurrences))]
    pub verbose: u64,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Create WordPress posts and pages from markdown files
    Import {
        /// Seconds to wait before each file
        #[clap(long)]
        delay: Option<u64>,
    },
    /// Write WordPress posts and pages out as markdown files
    Export,
}

/// Connection details and folder, merged from the flags and the config file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub site: String,
    pub username: String,
    pub folder: PathBuf,
}

impl Settings {
    pub fn resolve(args: &Args, config: &Config) -> Result<Settings> {
        let folder = match args.command {
            Command::Import { .. } => config.import.folder.clone(),
            Command::Export => config.export.folder.clone(),
        };

        Ok(Settings {
            site: args
                .site
                .clone()
                .or_else(|| config.site.url.clone())
                .ok_or_else(|| anyhow!("no site given; pass --site or set [site] url"))?,
            username: args
                .username
                .clone()
                .or_else(|| config.site.username.clone())
                .ok_or_else(|| anyhow!("no username given; pass --username or set [site] username"))?,
            folder: args
                .folder
                .clone()
                .or(folder)
                .ok_or_else(|| anyhow!("no folder given; pass --folder"))?,
        })
    }
}

fn password(username: &str) -> Result<String> {
    if let Ok(p) = env::var(PASSWORD_VAR) {
        return Ok(p);
    }
    rpassword::prompt_password(format!("Password for {}: ", username))
        .context("could not read password")
}

pub fn run(args: &Args, config: &Config) -> Result<()> {
    let settings = Settings::resolve(args, config)?;
    let password = password(&settings.username)?;
    let wp = WordPress::new(&settings.site, &settings.username, &password)?;

    match args.command {
        Command::Import { delay } => {
            let delay = delay.map_or_else(|| config.import.delay(), Duration::from_secs);
            let mut importer = Importer::new(&wp, delay).context("could not load site taxonomy")?;
            let summary = importer.run(&settings.folder);
            log::info!(
                "Imported {}, skipped {}, failed {}",
                summary.imported,
                summary.skipped,
                summary.failed
            );
        }
        Command::Export => {
            let exporter = Exporter::new(&wp, &settings.folder, &settings.site).with_context(|| {
                format!("folder '{}' not writeable", settings.folder.display())
            })?;
            let summary = exporter.run()?;
            log::info!("Wrote {} files, {} failed", summary.written, summary.failed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_win_over_config() {
        let mut config = Config::default();
        config.site.url = Some("https://config.example".into());
        config.site.username = Some("config-user".into());
        config.import.folder = Some("posts".into());

        let settings = Settings::resolve(
            &args(&["md2wp", "import", "-u", "admin", "--delay", "0"]),
            &config,
        )
        .unwrap();

        assert_eq!(
            settings,
            Settings {
                site: "https://config.example".into(),
                username: "admin".into(),
                folder: "posts".into(),
            }
        );
    }

    #[test]
    fn export_uses_its_own_folder() {
        let mut config = Config::default();
        config.import.folder = Some("in".into());
        config.export.folder = Some("out".into());

        let settings = Settings::resolve(
            &args(&["md2wp", "-s", "https://x.org", "-u", "me", "export"]),
            &config,
        )
        .unwrap();
        assert_eq!(settings.folder, PathBuf::from("out"));
    }

    #[test]
    fn missing_site_is_an_error() {
        let result = Settings::resolve(&args(&["md2wp", "export", "-u", "me", "-f", "out"]), &Config::default());
        assert!(result.is_err());
    }

    #[test]
    fn counts_verbosity() {
        let parsed = args(&["md2wp", "-vv", "export"]);
        assert_eq!(parsed.verbose, 2);
        assert!(matches!(parsed.command, Command::Export));
    }
}
