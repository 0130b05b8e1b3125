//
// cli.rs
// Dicom-Resample-rs
//
// Defines the CLI surface with Clap, sets up logging and hands the run to the pipeline.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::export::NiftiExporter;
use crate::models::ResampleReport;
use crate::pipeline;
use crate::reader::{DirectoryReader, PixelValues};
use crate::resample::ResampleRequest;
use crate::writer::{DirectoryWriter, UncompressedTransferSyntax};

/// Command-line interface: positional arguments mirror the classic ResampleDICOM usage.
#[derive(Parser, Debug)]
#[command(name = "resample-dicom")]
#[command(
    about = "Resample a DICOM series to a new voxel spacing",
    long_about = "Reads the series in INPUT_DIRECTORY, resamples it with trilinear interpolation \
                  and writes a new series (series number 1001) to OUTPUT_DIRECTORY. \
                  A spacing of 0 keeps the input spacing for that axis."
)]
pub struct Cli {
    /// Directory holding one DICOM series
    pub input: PathBuf,
    /// Directory that receives the resampled series
    pub output: PathBuf,
    /// Spacing along x in mm (0 keeps the input spacing)
    #[arg(allow_negative_numbers = true)]
    pub x_spacing: f64,
    /// Spacing along y in mm (0 keeps the input spacing)
    #[arg(allow_negative_numbers = true)]
    pub y_spacing: f64,
    /// Spacing along z in mm (0 keeps the input spacing)
    #[arg(allow_negative_numbers = true)]
    pub z_spacing: f64,
    /// Pixel values handed over by the decoder
    #[arg(long, value_enum, default_value_t = Decoder::Rescaled)]
    pub decoder: Decoder,
    #[arg(
        long,
        value_enum,
        default_value_t = TransferSyntax::ExplicitVrLittleEndian,
        help = "Transfer syntax of the written files (uncompressed only)"
    )]
    pub transfer_syntax: TransferSyntax,
    /// Also write the whole resampled volume to one NIfTI file (.nii or .nii.gz)
    #[arg(long, value_name = "FILE")]
    pub volume_output: Option<PathBuf>,
    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Decoder {
    /// Modality LUT applied by the decoder; reverted before writing
    Rescaled,
    /// Raw stored values
    Stored,
}

impl From<Decoder> for PixelValues {
    fn from(value: Decoder) -> Self {
        match value {
            Decoder::Rescaled => PixelValues::Rescaled,
            Decoder::Stored => PixelValues::Stored,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum TransferSyntax {
    ExplicitVrLittleEndian,
    ImplicitVrLittleEndian,
}

impl From<TransferSyntax> for UncompressedTransferSyntax {
    fn from(value: TransferSyntax) -> Self {
        match value {
            TransferSyntax::ExplicitVrLittleEndian => UncompressedTransferSyntax::ExplicitVRLittleEndian,
            TransferSyntax::ImplicitVrLittleEndian => UncompressedTransferSyntax::ImplicitVRLittleEndian,
        }
    }
}

impl Cli {
    pub fn request(&self) -> ResampleRequest {
        ResampleRequest::new(self.x_spacing, self.y_spacing, self.z_spacing)
    }
}

pub fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once, then hand everything to the pipeline.
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let report = run_with(&cli)?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print_report(&report);
    }

    Ok(())
}

/// Runs the pipeline for already parsed arguments. Errors carry the failing stage
/// as their outermost context.
pub fn run_with(cli: &Cli) -> anyhow::Result<ResampleReport> {
    let reader = DirectoryReader::new(cli.decoder.into());
    let writer = DirectoryWriter::new(cli.transfer_syntax.into());

    let result = match &cli.volume_output {
        Some(volume_output) => pipeline::run_with_export(
            &reader,
            &writer,
            &NiftiExporter,
            &cli.input,
            &cli.output,
            volume_output,
            cli.request(),
        ),
        None => pipeline::run(&reader, &writer, &cli.input, &cli.output, cli.request()),
    };

    result.map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("{} stage failed", stage))
    })
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Logs go to stderr so stdout stays clean for --json.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_report(report: &ResampleReport) {
    println!("{}", "=".repeat(80));
    println!("Resampled series {}", report.series_instance_uid);
    println!("{}", "=".repeat(80));

    println!("INPUT");
    println!("  Size:    {:?}", report.input.size);
    println!("  Spacing: {:?}", report.input.spacing);
    println!(
        "  Range:   [{:.2}, {:.2}] mean {:.2}",
        report.input.intensity.min, report.input.intensity.max, report.input.intensity.mean
    );

    println!("\nOUTPUT");
    println!("  Size:    {:?}", report.output.size);
    println!("  Spacing: {:?}", report.output.spacing);
    println!(
        "  Range:   [{:.2}, {:.2}] mean {:.2}",
        report.output.intensity.min, report.output.intensity.max, report.output.intensity.mean
    );
    println!("  Series number: {}", report.series_number);
    println!(
        "  Rescale: slope {} intercept {}{}",
        report.rescale.slope,
        report.rescale.intercept,
        if report.rescale_undone { " (undone before writing)" } else { "" }
    );
    println!("  Files written: {}", report.files.len());
    if let Some(volume_file) = &report.volume_file {
        println!("  Volume file: {}", volume_file.display());
    }
}
