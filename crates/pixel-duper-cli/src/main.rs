mod commands;
mod logging;
mod progress;
mod report;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use commands::{Cli, Commands};
use dotenv::dotenv;
use pixel_duper_core::cache::store;
use pixel_duper_core::{AppConfig, ScanEngine, StandardDecoder};
use progress::CliReporter;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match pixel_duper_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Scan {
            paths,
            recluster,
            csv,
        }) => {
            let mut config = config;
            if !paths.is_empty() {
                config.root_paths = paths;
            }
            run_scan(config, recluster, csv.as_deref())?;
        }
        Some(Commands::CountCache) => {
            let cache_path = Path::new(&config.cache_path);
            match store::read_document(cache_path)? {
                Some(doc) => println!(
                    "{} entries in {} (grid {}x{})",
                    doc.files.len(),
                    cache_path.display(),
                    doc.grid.x,
                    doc.grid.y
                ),
                None => println!("No cache at {}", cache_path.display()),
            }
        }
        Some(Commands::PrintConfig) => {
            let rendered = toml::to_string_pretty(&config).context("rendering configuration")?;
            println!("{}", rendered);
        }
        Some(Commands::ClearCache) => {
            let cache_path = PathBuf::from(&config.cache_path);
            if !cache_path.exists() {
                println!("No cache at {}", cache_path.display());
                return Ok(());
            }
            let prompt = format!("Delete the signature cache at {}?", cache_path.display());
            if prompt_confirm(&prompt, Some(false))? {
                fs::remove_file(&cache_path)
                    .with_context(|| format!("removing {}", cache_path.display()))?;
                println!("Cache deleted");
            }
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_scan(config: AppConfig, recluster: bool, csv: Option<&Path>) -> anyhow::Result<()> {
    if config.root_paths.is_empty() {
        anyhow::bail!("no paths to scan; pass them on the command line or set root_paths");
    }

    let engine = ScanEngine::new(config);
    let reporter = CliReporter::new();
    let result = engine.scan(&reporter)?;

    let groups = if recluster {
        result.reclustered()
    } else {
        result.groups.all().to_vec()
    };

    println!();
    report::print_groups(&groups, &StandardDecoder);
    report::print_bad_files(&result.bad_files);
    println!();
    report::print_summary(&result, groups.iter().filter(|g| !g.is_empty()).count());

    if let Some(path) = csv {
        report::write_csv(path, &groups, &StandardDecoder)?;
    }
    info!("Done");
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
