mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "papercut",
    version,
    about = "Split exam and memo PDFs into one image per question"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect questions in a PDF and cut them out
    Segment {
        /// Path to the PDF file
        input_file: PathBuf,

        /// JSON file overriding heuristic settings
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Never fall back to tesseract for pages without a text layer
        #[arg(long)]
        no_ocr: bool,

        /// Write question images and a manifest.json to this directory
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the per-page diagnostic trace as JSON
        #[arg(long, value_name = "FILE")]
        trace: Option<PathBuf>,

        /// Save images as JPEG (quality 90) instead of PNG
        #[arg(long)]
        jpeg: bool,
    },
    /// Re-crop one page region by hand
    Crop {
        /// Path to the PDF file
        input_file: PathBuf,

        /// Page to crop from (1-based)
        #[arg(long)]
        page: usize,

        /// Rectangle x,y,w,h in display pixels. Repeat to stitch several
        /// regions; the last one is the final crop.
        #[arg(long = "rect", value_name = "X,Y,W,H", required = true)]
        rects: Vec<String>,

        /// Where to write the stitched image
        #[arg(long = "out", value_name = "FILE")]
        out: PathBuf,

        /// Width the page is displayed at (default: natural size)
        #[arg(long)]
        display_width: Option<f32>,

        /// JSON file overriding heuristic settings
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print the default settings as JSON
    Config,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Segment {
            input_file,
            config,
            no_ocr,
            out_dir,
            output,
            trace,
            jpeg,
        } => commands::segment::run(commands::segment::SegmentArgs {
            input_file,
            config,
            no_ocr,
            out_dir,
            output_format: output,
            trace,
            jpeg,
        }),
        Commands::Crop {
            input_file,
            page,
            rects,
            out,
            display_width,
            config,
        } => commands::crop::run(input_file, page, &rects, out, display_width, config),
        Commands::Config => commands::config::print_defaults(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
