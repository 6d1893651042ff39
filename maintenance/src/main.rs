#![deny(unused_must_use)]

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use greetcard_core::config::{LogArgs, SiteArgs};
use greetcard_core::page::PageIndex;
use greetcard_core::site::Site;
use log::info;

/// One-shot jobs against the page store and the pages directory.
/// Run these while the server is idle: they do not coordinate with in-flight requests
/// beyond the database write lock.
#[derive(Parser, Debug)]
#[command(name = "greetcard-maintenance", version, about = "Maintenance jobs for greeting pages")]
struct Cli {
    #[command(flatten)]
    site: SiteArgs,

    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mark every page unused and rewrite every file with its blank form
    Reset,
    /// Regenerate page files from the store
    Rebuild {
        /// Only regenerate this page
        #[arg(long)]
        page: Option<PageIndex>,
    },
    /// Create new pages with random filenames
    Provision {
        #[arg(short = 'n', long, default_value_t = 100)]
        count: usize,
    },
    /// Print both tables
    List,
    /// Print the public URL of every page
    Urls {
        #[arg(long, env = "GREETCARD_BASE_URL")]
        base_url: String,

        /// Also save a QR code PNG for every page into this directory
        #[arg(long, env = "GREETCARD_QR_DIR")]
        qr_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.log.init().context("Cannot initialize logging")?;
    let site = Site::open(&cli.site)
        .with_context(|| format!("Cannot open {:?} with pages in {:?}", cli.site.database, cli.site.pages_dir))?;
    let mut out = io::stdout().lock();
    match cli.command {
        Command::Reset => {
            let changed = site.reset_all().context("Reset failed, no status was changed")?;
            info!("Updated {} rows to set status = 0", changed);
        }
        Command::Rebuild { page: Some(index) } => {
            site.rebuild_page(index).with_context(|| format!("Cannot rebuild page {}", index))?;
            info!("Regenerated page {}", index);
        }
        Command::Rebuild { page: None } => {
            let written = site.rebuild_all()?;
            info!("Regenerated {} page files", written);
        }
        Command::Provision { count } => {
            let created = site.provision(count)?;
            commands::provisioned(&created, &mut out)?;
        }
        Command::List => commands::list(&site, &mut out)?,
        Command::Urls { base_url, qr_dir } => {
            commands::urls(&site, &base_url, &mut out)?;
            if let Some(dir) = qr_dir {
                let written = commands::qr_codes(&site, &base_url, &dir)?;
                info!("Saved {} QR codes to {:?}", written, dir);
            }
        }
    }
    Ok(())
}
