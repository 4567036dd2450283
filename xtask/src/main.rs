use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the faas provisioning workspace",
    long_about = "Runs CI checks and packages the `faas` binary for distribution."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::All)]
        job: CiJob,
    },
    /// Print the runtime catalog through the built binary
    Smoke,
    /// Build the `faas` binary and zip it under dist/
    Dist {
        /// Compilation target triple
        #[arg(long)]
        target: Option<String>,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Unit and integration tests of both crates
    Test,
    /// Run lint + test
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

const WORKSPACE_CRATES: [&str; 2] = ["faas_provision_core", "faas_provision_aws"];
const BINARY: &str = "faas";

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    match Command::new("cargo").args(args).status() {
        Ok(status) => status,
        Err(error) => fail(&format!("failed to execute cargo: {error}")),
    }
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    exit(1)
}

fn binary_file_name(target: Option<&str>) -> String {
    if target.map_or(cfg!(windows), |triple| triple.contains("windows")) {
        format!("{BINARY}.exe")
    } else {
        BINARY.to_string()
    }
}

fn binary_path(target: Option<&str>, profile: BuildProfile) -> PathBuf {
    let mut dir = PathBuf::from("target");
    if let Some(triple) = target {
        dir.push(triple);
    }
    dir.join(profile.dir_name()).join(binary_file_name(target))
}

fn archive_name(target: Option<&str>) -> String {
    match target {
        Some(triple) => format!("{BINARY}-{triple}.zip"),
        None => format!("{BINARY}.zip"),
    }
}

// ── tasks ──────────────────────────────────────────────────────────

fn ci_lint() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

fn ci_test() {
    for krate in WORKSPACE_CRATES {
        step(&format!("Test {krate}"));
        run_cargo(&["test", "-p", krate]);
    }
}

fn smoke() {
    step("faas runtimes");
    run_cargo(&[
        "run",
        "-p",
        "faas_provision_aws",
        "--bin",
        BINARY,
        "--",
        "runtimes",
    ]);
}

fn dist(target: Option<&str>, profile: BuildProfile) {
    step("Build faas binary");
    let mut cargo_args = vec!["build", "-p", "faas_provision_aws", "--bin", BINARY];
    if let Some(triple) = target {
        cargo_args.extend(["--target", triple]);
    }
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package zip archive");
    let dist_dir = Path::new("dist");
    if let Err(error) = fs::create_dir_all(dist_dir) {
        fail(&format!("failed to create {}: {error}", dist_dir.display()));
    }
    let zip_path = dist_dir.join(archive_name(target));
    if let Err(error) = package_zip(
        &binary_path(target, profile),
        &binary_file_name(target),
        &zip_path,
    ) {
        fail(&error);
    }

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn package_zip(binary_path: &Path, entry_name: &str, zip_path: &Path) -> Result<(), String> {
    let binary = fs::read(binary_path)
        .map_err(|error| format!("failed to read '{}': {error}", binary_path.display()))?;
    let file = fs::File::create(zip_path)
        .map_err(|error| format!("failed to create '{}': {error}", zip_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file(entry_name, options)
        .map_err(|error| format!("failed to start zip entry: {error}"))?;
    zip.write_all(&binary)
        .map_err(|error| format!("failed to write zip entry: {error}"))?;
    zip.finish()
        .map_err(|error| format!("failed to finish zip: {error}"))?;
    Ok(())
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => ci_test(),
                CiJob::All => {
                    ci_lint();
                    ci_test();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::Smoke => smoke(),
        Commands::Dist { target, profile } => dist(target.as_deref(), profile),
    }
}
