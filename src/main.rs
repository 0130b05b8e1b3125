//
// main.rs
// Dicom-Resample-rs
//
// Binary entry point that hands off execution to the CLI layer.
//
// Thales Matheus Mendonça Santos - November 2025

use dicom_resample::cli;

fn main() -> anyhow::Result<()> {
    // Any error propagates here, is printed to stderr and yields a non-zero exit code.
    cli::run()
}
