use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dimg::detect::open_image;
use dimg::formats::{ChecksumPolicy, OpenOptions};
use dimg::hasher::HashType;
use dimg::image::MediaImage;
use dimg::suite::FixtureSuite;
use dimg::verify::{hash_media, verify_block, verify_optical, VerifyReport};

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, clap::ValueEnum, PartialEq)]
enum AddDigest {
    md5,
    sha1,
    sha256,
}

impl From<AddDigest> for HashType {
    fn from(v: AddDigest) -> Self {
        match v {
            AddDigest::md5 => HashType::MD5,
            AddDigest::sha1 => HashType::SHA1,
            AddDigest::sha256 => HashType::SHA256,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about)]
struct Cli {
    /// Image files to inspect; shell-style globs are expanded.
    images: Vec<String>,

    /// Verify every row of a fixture suite instead of inspecting single files.
    #[arg(short, long, name = "suite.toml", conflicts_with = "images")]
    suite: Option<PathBuf>,

    /// Directory holding the suite's test files; defaults to the suite's
    /// own data_folder next to the suite file.
    #[arg(long, name = "dir", requires = "suite.toml")]
    data_folder: Option<PathBuf>,

    /// Calculate additional digest (hash) types besides md5
    #[arg(short = 'd', long = "digest", value_enum, name = "hash")]
    additional_digest: Option<AddDigest>,

    /// Treat stored-checksum mismatches as open failures instead of warnings
    #[arg(long, default_value = "false")]
    strict_checksums: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let options = OpenOptions {
        checksum_policy: if cli.strict_checksums {
            ChecksumPolicy::Error
        }
        else {
            ChecksumPolicy::Warn
        }
    };

    if let Some(suite) = &cli.suite {
        return run_suite(suite, cli.data_folder.as_deref(), &options);
    }

    if cli.images.is_empty() {
        eprintln!("no images given; see --help");
        return ExitCode::FAILURE;
    }

    let mut ok = true;
    for pattern in &cli.images {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                eprintln!("{pattern}: {e}");
                ok = false;
                continue;
            }
        };

        let mut matched = false;
        for path in paths.flatten() {
            matched = true;
            if !inspect(&path, cli.additional_digest, &options) {
                ok = false;
            }
        }

        if !matched {
            eprintln!("{pattern}: no matching files");
            ok = false;
        }
    }

    if ok {
        ExitCode::SUCCESS
    }
    else {
        ExitCode::FAILURE
    }
}

fn inspect(
    path: &std::path::Path,
    additional: Option<AddDigest>,
    options: &OpenOptions
) -> bool
{
    let (format, kind) = match open_image(path, options) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            return false;
        }
    };

    let info = kind.as_media().info();

    println!("{}:", path.display());
    println!("  Format:      {format}");
    println!("  Media type:  {}", info.media_type);
    println!("  Sectors:     {}", info.sectors);
    println!("  Sector size: {}", info.sector_size);
    if let (Some(c), Some(h), Some(s)) =
        (info.cylinders, info.heads, info.sectors_per_track)
    {
        println!("  Geometry:    {c}/{h}/{s}");
    }
    if let Some(application) = &info.application {
        println!("  Application: {application}");
    }
    if let Some(comment) = &info.comment {
        println!("  Comment:     {comment}");
    }

    let mut digests = vec![HashType::MD5];
    if let Some(d) = additional {
        let d = HashType::from(d);
        if d != HashType::MD5 {
            digests.push(d);
        }
    }

    match hash_media(kind.as_media(), digests.iter().copied()) {
        Ok(hashes) => {
            for d in &digests {
                println!("  {d}: {}", hashes[d]);
            }
            true
        },
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            false
        }
    }
}

fn print_report(report: &VerifyReport) -> bool {
    if report.passed() {
        println!("PASS {}", report.test_file);
        return true;
    }

    println!("FAIL {}", report.test_file);
    if let Some(error) = &report.error {
        println!("     {error}");
    }
    for m in &report.mismatches {
        println!("     {}: expected {}, got {}", m.field, m.expected, m.actual);
    }
    false
}

fn run_suite(
    path: &std::path::Path,
    data_folder: Option<&std::path::Path>,
    options: &OpenOptions
) -> ExitCode
{
    let suite = match FixtureSuite::load(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let base = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let data_folder = match data_folder {
        Some(d) => d.to_path_buf(),
        None => base.join(&suite.data_folder)
    };

    let mut passed = 0usize;
    let mut failed = 0usize;

    for row in &suite.block {
        if print_report(&verify_block(row, &data_folder, options)) {
            passed += 1;
        }
        else {
            failed += 1;
        }
    }
    for row in &suite.optical {
        if print_report(&verify_optical(row, &data_folder, options)) {
            passed += 1;
        }
        else {
            failed += 1;
        }
    }

    println!("{passed} passed, {failed} failed");
    if failed == 0 {
        ExitCode::SUCCESS
    }
    else {
        ExitCode::FAILURE
    }
}
