// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vps_relocalizer::{CameraIntrinsics, DeviceOrientation, JpegQuality};

mod cli;

#[derive(Parser)]
#[command(name = "vps-relocalizer")]
#[command(about = "Relocalize an AR session against a visual positioning map")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange the configured client credentials for an access token
    Auth,

    /// Resize an image to the query resolution and print adjusted intrinsics
    Adjust {
        /// Input image
        input: PathBuf,

        /// Raw intrinsics as "fx,fy,cx,cy"
        #[arg(short, long, value_parser = cli::parse_intrinsics)]
        intrinsics: CameraIntrinsics,

        /// Device orientation at capture (landscape or portrait)
        #[arg(long, default_value = "landscape")]
        orientation: DeviceOrientation,

        /// JPEG quality preset (low, medium, high, maximum)
        #[arg(short, long, value_parser = cli::parse_quality, default_value = "high")]
        quality: JpegQuality,

        /// Write the query JPEG here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Localize an image against the configured map
    Localize {
        /// Input image
        input: PathBuf,

        /// Raw intrinsics as "fx,fy,cx,cy"
        #[arg(short, long, value_parser = cli::parse_intrinsics)]
        intrinsics: CameraIntrinsics,

        /// Device orientation at capture (landscape or portrait)
        #[arg(long, default_value = "landscape")]
        orientation: DeviceOrientation,

        /// Tracking-space camera position at capture as "x,y,z"
        #[arg(short, long, value_parser = cli::parse_vec3)]
        position: nalgebra::Vector3<f32>,

        /// Tracking-space camera rotation at capture as "x,y,z,w"
        #[arg(short, long, value_parser = cli::parse_quaternion, default_value = "0,0,0,1")]
        rotation: nalgebra::Quaternion<f32>,

        /// Map code (overrides config)
        #[arg(long, conflicts_with = "map_set_code")]
        map_code: Option<String>,

        /// Map set code (overrides config)
        #[arg(long)]
        map_set_code: Option<String>,
    },

    /// Show the resolved configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=vps_relocalizer=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Auth => cli::authenticate(),
        Commands::Adjust {
            input,
            intrinsics,
            orientation,
            quality,
            output,
        } => cli::adjust_image(&input, intrinsics, orientation, quality, output),
        Commands::Localize {
            input,
            intrinsics,
            orientation,
            position,
            rotation,
            map_code,
            map_set_code,
        } => cli::localize(cli::LocalizeArgs {
            input,
            intrinsics,
            orientation,
            position,
            rotation,
            map_code,
            map_set_code,
        }),
        Commands::Config => cli::show_config(),
    }
}
