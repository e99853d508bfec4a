use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use peakbook_qr::config::StickerConfig;
use peakbook_qr::export::{print_html, render_terminal, save_preview_png, save_svg, PrintOptions};
use peakbook_qr::logo::LogoRef;
use peakbook_qr::qrcode::{QrCode, QrCodeEcc};
use peakbook_qr::service::{generate_random_token, validate_token, StickerService};
use peakbook_qr::sticker::StickerOptions;
use peakbook_qr::validator::{check_scannability, validate_print_dimensions, QrFormData};

#[derive(Parser)]
#[command(name = "peakbook-qr")]
#[command(about = "Generate print-ready Peakbook check-in QR stickers", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sticker SVG for a token
    Generate {
        /// 20-character token; a random one is issued when omitted
        #[arg(short, long)]
        token: Option<String>,

        /// Caption printed above the code
        #[arg(short, long)]
        caption: Option<String>,

        /// Query parameter carrying the token
        #[arg(short, long)]
        param: Option<String>,

        /// Error correction level (L, M, Q or H)
        #[arg(short, long)]
        ecc: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Sticker configuration (TOML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Logo file; SVG is embedded, other formats are referenced
        #[arg(long, value_name = "FILE")]
        logo: Option<PathBuf>,

        /// Draw trim marks in the bleed
        #[arg(long)]
        trim_marks: bool,

        /// Also write a printable HTML page
        #[arg(long)]
        print: bool,

        /// Also write a PNG preview of the bare code
        #[arg(long)]
        png: bool,

        /// Show the code in the terminal
        #[arg(long)]
        preview: bool,
    },

    /// Print random tokens
    Token {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Check a token and print feedback as JSON
    Check {
        #[arg(short, long)]
        token: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            token,
            caption,
            param,
            ecc,
            out,
            config,
            logo,
            trim_marks,
            print,
            png,
            preview,
        } => {
            let config = match config {
                Some(path) => StickerConfig::load(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => StickerConfig::default(),
            };
            let logo = logo.map_or(LogoRef::Fallback, LogoRef::load);
            let token = token.unwrap_or_else(|| {
                let token = generate_random_token();
                info!(%token, "issued new token");
                token
            });

            let form = QrFormData {
                token: token.clone(),
                caption,
                param_name: param,
                ecc_level: ecc,
            };
            let options = StickerOptions {
                include_trim_marks: trim_marks,
                ..StickerOptions::default()
            };

            let service = StickerService::new(&config, logo);
            let sticker = match service.generate_qr_code_with(&form, &options) {
                Ok(sticker) => sticker,
                Err(failure) => {
                    if let Some(errors) = &failure.errors {
                        eprintln!("{}", serde_json::to_string_pretty(errors)?);
                    }
                    bail!(failure.error);
                }
            };

            let ecc_level = form
                .ecc_level()
                .and_then(|level| level.parse::<QrCodeEcc>().ok())
                .unwrap_or(config.qr.error_correction);
            let scannability = check_scannability(&sticker.url, ecc_level);
            if let Some(warning) = &scannability.warning {
                warn!("{warning}");
            }
            let total = config.total_size_px();
            for warning in validate_print_dimensions(total, total).warnings {
                warn!("{warning}");
            }

            let path = save_svg(&out, &sticker.filename, &sticker.svg)
                .with_context(|| format!("failed to save sticker to {}", out.display()))?;
            println!("✓ Sticker saved to {}", path.display());
            println!("  URL: {}", sticker.url);

            if print {
                let html = print_html(&sticker.svg, &token, &PrintOptions::from_config(&config));
                let html_path = out.join(format!("peakbook-qr-{token}.html"));
                fs::write(&html_path, html)
                    .with_context(|| format!("failed to write {}", html_path.display()))?;
                println!("✓ Print page saved to {}", html_path.display());
            }

            if png {
                let png_path = out.join(format!("peakbook-qr-{token}.png"));
                save_preview_png(&png_path, &sticker.url, ecc_level, 8)?;
                println!("✓ PNG preview saved to {}", png_path.display());
            }

            if preview {
                let qr = QrCode::encode_text(&sticker.url, ecc_level)?;
                print!("{}", render_terminal(&qr));
            }
        }
        Commands::Token { count } => {
            for _ in 0..count {
                println!("{}", generate_random_token());
            }
        }
        Commands::Check { token } => {
            let feedback = validate_token(&token);
            println!("{}", serde_json::to_string_pretty(&feedback)?);
            if !feedback.valid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
