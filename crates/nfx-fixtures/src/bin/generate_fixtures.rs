#![forbid(unsafe_code)]

use nfx_fixtures::{ARCHIVE_FILE_NAME, FixtureConfig, GenerateError, generate};

fn main() {
    if let Err(err) = run() {
        eprintln!("generate_fixtures failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), GenerateError> {
    let config = match std::env::args().nth(1) {
        Some(dir) => FixtureConfig::new(dir),
        None => FixtureConfig::default_paths(),
    };

    let report = generate(&config)?;
    for cell in &report.skipped {
        eprintln!("skipped {}: {}", cell.file_name, cell.reason);
    }
    println!(
        "wrote {} containers and {} ({} entries) to {}",
        report.fixtures.len(),
        ARCHIVE_FILE_NAME,
        report.archive.entry_count,
        config.output_dir.display()
    );
    Ok(())
}
