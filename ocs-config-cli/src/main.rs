//! Command line tool to inspect, verify and dispatch OCS configurations.
use std::path::{Path, PathBuf};

use clap::Parser;
use itertools::Itertools;
use log::{error, info};
use walkdir::WalkDir;

use ocs_config::{
    prelude::{
        write_config, Epoch, Error, HardwareMap, OcsConfig, SubConfigKind, WriterSettings,
    },
    writer::DEFAULT_OUTPUT_DIR,
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration files, or directories to search for `.xml` and `.xml.gz` files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// ACSIS correlator module to task map
    #[arg(long, value_name = "FILE")]
    hwmap: Option<PathBuf>,

    /// Print the tasks required by each configuration
    #[arg(short, long)]
    tasks: bool,

    /// Print the estimated duration of each observation
    #[arg(short, long)]
    duration: bool,

    /// Run cross configuration consistency checks
    #[arg(long)]
    verify: bool,

    /// Print the document, restricted to these elements (eg. ACSIS_CONFIG)
    #[arg(long, value_name = "ELEMENT", num_args = 0..)]
    print: Option<Vec<String>>,

    /// Write each configuration to its task destinations
    #[arg(short, long, value_name = "DIR", num_args = 0..=1, default_missing_value = DEFAULT_OUTPUT_DIR)]
    write: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn is_config_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or_default();
    !name.starts_with('.') && (name.ends_with(".xml") || name.ends_with(".xml.gz"))
}

/// Expands directories into the configuration files they contain.
fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    inputs
        .iter()
        .flat_map(|input| {
            if input.is_dir() {
                WalkDir::new(input)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.into_path())
                    .filter(|path| path.is_file() && is_config_file(path))
                    .collect::<Vec<_>>()
            } else {
                vec![input.clone()]
            }
        })
        .unique()
        .collect()
}

fn process(cli: &Cli, path: &Path, hwmap: Option<&HardwareMap>) -> Result<(), Error> {
    let mut cfg = OcsConfig::from_file(path)?;

    if let (Some(map), Some(acsis)) = (hwmap, cfg.acsis_mut()) {
        acsis.set_hardware_map(map.clone());
    }

    let summary = match cfg.obsmode() {
        Some((mapping, switching, obs_type)) => format!("{}/{}/{}", mapping, switching, obs_type),
        None => "no observing mode".to_string(),
    };

    println!(
        "{}: {} [{}] project={} backend={}",
        path.display(),
        summary,
        cfg.present().iter().join(", "),
        cfg.projectid().unwrap_or("?"),
        cfg.backend(),
    );

    if cli.verify {
        cfg.verify()?;
        println!("  consistent");
    }

    if cli.tasks {
        println!("  tasks: {}", cfg.tasks()?.iter().join(" "));
        let full = cfg.requires_full_config();
        if !full.is_empty() {
            println!("  complete document: {}", full.iter().join(" "));
        }
    }

    if cli.duration {
        println!("  duration: {}", cfg.duration()?);
    }

    if let Some(elements) = &cli.print {
        let xml = if elements.is_empty() {
            cfg.to_xml()?
        } else {
            let kinds = elements
                .iter()
                .map(|e| e.parse::<SubConfigKind>())
                .collect::<Result<Vec<_>, _>>()?;
            cfg.stringify(Some(kinds.as_slice()))?
        };
        println!("{}", xml);
    }

    if let Some(dir) = &cli.write {
        let settings = WriterSettings::new(dir).with_verbose(cli.verbose > 0);
        for written in write_config(&cfg, &settings, Epoch::now()?)? {
            println!("  wrote {}", written.display());
        }
    }

    Ok(())
}

pub fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let hwmap = match &cli.hwmap {
        Some(path) => match HardwareMap::from_file(path) {
            Ok(map) => {
                info!("hardware map: {} modules", map.len());
                Some(map)
            },
            Err(e) => {
                error!("failed to read hardware map {}: {}", path.display(), e);
                std::process::exit(1);
            },
        },
        None => None,
    };

    let files = expand_inputs(&cli.inputs);
    if files.is_empty() {
        error!("no configuration file found");
        std::process::exit(1);
    }

    let mut failures = 0;
    for path in &files {
        if let Err(e) = process(&cli, path, hwmap.as_ref()) {
            error!("{}: {}", path.display(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        error!("{} out of {} configurations failed", failures, files.len());
        std::process::exit(1);
    }
}
