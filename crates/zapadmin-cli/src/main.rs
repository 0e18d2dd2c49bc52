use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use zapadmin::Reporter;
use zapadmin::checksum::Sha2Checksums;
use zapadmin::document::Document;
use zapadmin::download::{self, HttpsDownloader};
use zapadmin::release_state::{self, GitHistory};
use zapadmin::updater::{
    self, AddOnUpdate, DailyUpdate, MainRelease, ReleaseSource, UpdateContext,
};
use zapadmin::verify;
use zapadmin_config::{Config, find_config, load_config, load_config_from_file};
use zapadmin_state::ReleaseStateStore;
use zapadmin_types::ReleaseState;

#[derive(Parser, Debug)]
#[command(name = "zapadmin", version)]
#[command(about = "Maintains the ZAP versions files with new releases")]
struct Cli {
    /// Directory containing .zapadmin.toml (default: searched upwards from the current directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Checksum algorithm, overrides checksum.algorithm (e.g. SHA-256)
    #[arg(long)]
    checksum_algorithm: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

/// Source of a release file, exactly one is required.
#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Local release file.
    #[arg(long)]
    file: Option<PathBuf>,

    /// HTTPS URL to download the release file from.
    #[arg(long)]
    url: Option<String>,
}

impl SourceArgs {
    fn into_source(self) -> zapadmin::Result<ReleaseSource> {
        ReleaseSource::from_options(self.file, self.url)
    }
}

#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// Versions file to update (repeatable), overrides registries.into
    #[arg(long = "into")]
    into: Vec<PathBuf>,

    /// Directory downloaded release files are kept in.
    #[arg(long, default_value = "build/downloads")]
    download_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish a weekly release.
    UpdateDaily {
        #[command(flatten)]
        source: SourceArgs,

        /// Expected digest of the release file (required with --url).
        #[arg(long)]
        checksum: Option<String>,

        /// Base download URL, overrides daily.base_download_url
        #[arg(long)]
        base_download_url: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Publish a main release, downloading the release files.
    UpdateMain {
        /// Version being released.
        #[arg(long)]
        release: String,

        /// Base download URL, overrides main.base_download_url
        #[arg(long)]
        base_download_url: Option<String>,

        /// Release notes, overrides main.release_notes
        #[arg(long)]
        release_notes: Option<String>,

        /// Release notes URL, overrides main.release_notes_url
        #[arg(long)]
        release_notes_url: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Publish an add-on release.
    UpdateAddOn {
        #[command(flatten)]
        source: SourceArgs,

        /// URL the add-on is downloaded from (defaults to --url).
        #[arg(long)]
        download_url: Option<String>,

        /// Release date, YYYY-MM-DD (default: today, UTC).
        #[arg(long)]
        release_date: Option<NaiveDate>,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Publish the add-ons of a release request and print the commit description.
    ReleaseAddOns {
        /// Environment variable holding the release request JSON.
        #[arg(long)]
        env_var: Option<String>,

        /// File holding the release request JSON.
        #[arg(long)]
        data: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Compute what the last commit released.
    ReleaseState {
        /// Repository holding the versions files.
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Versions file with the main and weekly releases, relative to the repository.
        #[arg(long)]
        main: Option<String>,

        /// Versions file with the add-ons, relative to the repository.
        #[arg(long)]
        add_ons: Option<String>,

        /// Where to write the release state (default: registries.release_state)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Download the released add-ons that are allowed.
    DownloadReleasedAddOns {
        /// Release state file (default: registries.release_state)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Versions file with the add-ons (default: registries.add_ons)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Allowed add-on ids, one per line (default: downloads.allowed_add_ons)
        #[arg(long)]
        allowed: Option<PathBuf>,

        /// Download directory (default: downloads.output_dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Check that the core entries of the versions files are identical.
    VerifyCore {
        /// Versions files to compare (default: registries.into)
        files: Vec<PathBuf>,
    },
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref())?;
    let algorithm = cli
        .checksum_algorithm
        .clone()
        .or_else(|| config.checksum_algorithm().map(String::from))
        .unwrap_or_default();

    let mut reporter = CliReporter;

    match cli.cmd {
        Commands::UpdateDaily {
            source,
            checksum,
            base_download_url,
            target,
        } => {
            let update = DailyUpdate {
                source: source.into_source()?,
                checksum,
                base_download_url: base_download_url
                    .or_else(|| config.daily_base_download_url().map(String::from)),
            };
            let into = into_files(&target, &config)?;
            let downloader = HttpsDownloader::new()?;
            let ctx = update_context(&into, &algorithm, &downloader, &target.download_dir);

            let file = updater::update_daily(&ctx, &update, &mut reporter)?;
            println!("daily: {} ({})", file.file_name, file.url);
        }
        Commands::UpdateMain {
            release,
            base_download_url,
            release_notes,
            release_notes_url,
            target,
        } => {
            let main = &config.main;
            let release = MainRelease {
                version: release,
                base_download_url: base_download_url
                    .unwrap_or_else(|| main.base_download_url.clone()),
                windows_file_name: main.windows_file_name.clone(),
                linux_file_name: main.linux_file_name.clone(),
                mac_file_name: main.mac_file_name.clone(),
                release_notes: release_notes.unwrap_or_else(|| main.release_notes.clone()),
                release_notes_url: release_notes_url
                    .unwrap_or_else(|| main.release_notes_url.clone()),
            };
            let into = into_files(&target, &config)?;
            let downloader = HttpsDownloader::new()?;
            let ctx = update_context(&into, &algorithm, &downloader, &target.download_dir);

            for (platform, file) in updater::update_main(&ctx, &release, &mut reporter)? {
                println!("{platform}: {} ({})", file.file_name, file.url);
            }
        }
        Commands::UpdateAddOn {
            source,
            download_url,
            release_date,
            target,
        } => {
            let update = AddOnUpdate {
                source: source.into_source()?,
                download_url,
                release_date: release_date.unwrap_or_else(today),
            };
            let into = into_files(&target, &config)?;
            let downloader = HttpsDownloader::new()?;
            let ctx = update_context(&into, &algorithm, &downloader, &target.download_dir);

            let entry = updater::update_add_on(&ctx, &update, &mut reporter)?;
            println!(
                "{} version {}",
                entry.id(),
                entry.version().unwrap_or_default()
            );
        }
        Commands::ReleaseAddOns {
            env_var,
            data,
            target,
        } => {
            let json = read_release_data(env_var.as_deref(), data.as_deref())?;
            let data = updater::parse_release_data(&json)?;
            let into = into_files(&target, &config)?;
            let downloader = HttpsDownloader::new()?;
            let ctx = update_context(&into, &algorithm, &downloader, &target.download_dir);

            let description = updater::release_add_ons(&ctx, &data, today(), &mut reporter)?;
            println!("{description}");
        }
        Commands::ReleaseState {
            repo,
            main,
            add_ons,
            output,
        } => {
            let main = main.unwrap_or_else(|| config.registries.main.clone());
            let add_ons = add_ons.unwrap_or_else(|| config.registries.add_ons.clone());
            let output = output.unwrap_or_else(|| config.registries.release_state.clone());

            reporter.info(&format!("reading history of {}", repo.display()));
            let history = GitHistory::open(&repo)?;
            let state = release_state::compute(&history, &main, &add_ons)?;

            let store = ReleaseStateStore::new(&output);
            store.save(&state)?;
            print_state(&state);
            println!("state: {}", store.path().display());
        }
        Commands::DownloadReleasedAddOns {
            state,
            registry,
            allowed,
            output_dir,
        } => {
            let state_path = state.unwrap_or_else(|| config.registries.release_state.clone());
            let registry = registry.unwrap_or_else(|| PathBuf::from(&config.registries.add_ons));
            let allowed = allowed.unwrap_or_else(|| config.downloads.allowed_add_ons.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.downloads.output_dir.clone());

            let state = ReleaseStateStore::new(&state_path).load()?;
            let registry = Document::load_file(&registry)?;
            let allowed = download::read_allowed_add_ons(&allowed)?;
            let downloader = HttpsDownloader::new()?;

            let downloaded = download::download_released_add_ons(
                &state,
                &registry,
                &allowed,
                &output_dir,
                &downloader,
                &Sha2Checksums,
                &mut reporter,
            )?;
            for path in downloaded {
                println!("{}", path.display());
            }
        }
        Commands::VerifyCore { files } => {
            let files = if files.is_empty() {
                config.into_files().to_vec()
            } else {
                files
            };
            verify::verify_core_entries(&files, &mut reporter)?;
            println!("core entries match in {} files", files.len());
        }
    }

    Ok(())
}

fn resolve_config(dir: Option<&Path>) -> Result<Config> {
    if let Some(dir) = dir {
        return load_config(dir);
    }

    let cwd = env::current_dir().context("failed to read the current directory")?;
    match find_config(&cwd) {
        Some(path) => load_config_from_file(&path),
        None => Ok(Config::default()),
    }
}

fn into_files(target: &TargetArgs, config: &Config) -> Result<Vec<PathBuf>> {
    let into = if target.into.is_empty() {
        config.into_files().to_vec()
    } else {
        target.into.clone()
    };
    if into.is_empty() {
        bail!("no versions files to update, use --into or registries.into");
    }
    Ok(into)
}

fn update_context<'a>(
    into: &'a [PathBuf],
    algorithm: &'a str,
    downloader: &'a HttpsDownloader,
    download_dir: &'a Path,
) -> UpdateContext<'a> {
    UpdateContext {
        into,
        checksum_algorithm: algorithm,
        checksums: &Sha2Checksums,
        downloader,
        download_dir,
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn read_release_data(env_var: Option<&str>, data: Option<&Path>) -> Result<String> {
    match (env_var, data) {
        (Some(_), Some(_)) => bail!("only one of --env-var or --data can be set"),
        (Some(name), None) => {
            env::var(name).with_context(|| format!("environment variable {name} is not set"))
        }
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read release data: {}", path.display())),
        (None, None) => bail!("either --env-var or --data must be set"),
    }
}

fn print_state(state: &ReleaseState) {
    if let Some(main) = &state.main_release {
        println!(
            "main_release: {} (new: {})",
            main.current_version(),
            main.is_new_version()
        );
    }
    if let Some(weekly) = &state.weekly_release {
        println!(
            "weekly_release: {} (new: {})",
            weekly.current_version(),
            weekly.is_new_version()
        );
    }
    for change in state.new_add_ons() {
        println!(
            "add-on {}: {} -> {}",
            change.id(),
            change.previous_version().unwrap_or("-"),
            change.current_version()
        );
    }
}
