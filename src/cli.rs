// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for relocalization
//!
//! This module provides command-line functionality for:
//! - Fetching an access token
//! - Preparing a query image and its intrinsics
//! - Running a full localization round trip
//! - Showing the configuration

use nalgebra::{Quaternion, Vector3};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vps_relocalizer::backends::{HttpTransport, TokenProvider};
use vps_relocalizer::geometry::{self, quaternion_xyzw};
use vps_relocalizer::pipelines::localization::{IntrinsicsAdjuster, MapSelector};
use vps_relocalizer::{
    CameraFrame, CameraIntrinsics, Config, DeviceOrientation, JpegQuality, PipelineError,
    RelocalizationOutcome, Relocalizer,
};

/// Arguments of the `localize` command
pub struct LocalizeArgs {
    pub input: PathBuf,
    pub intrinsics: CameraIntrinsics,
    pub orientation: DeviceOrientation,
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub map_code: Option<String>,
    pub map_set_code: Option<String>,
}

/// Fetch a token with the configured credentials
pub fn authenticate() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate_endpoints()?;
    let (client_id, client_secret) = config.credentials()?;

    let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
    let provider = TokenProvider::new(transport, config.auth_url.clone());

    let rt = tokio::runtime::Runtime::new()?;
    let token = rt.block_on(provider.fetch_token(client_id, client_secret))?;

    println!("Authentication successful");
    match token.expires_on() {
        Some(expiry) => println!("Token expires: {}", expiry.to_rfc3339()),
        None => println!("Token expiry: unknown"),
    }
    Ok(())
}

/// Resize an image to the query resolution and print the adjusted intrinsics
pub fn adjust_image(
    input: &Path,
    intrinsics: CameraIntrinsics,
    orientation: DeviceOrientation,
    quality: JpegQuality,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = load_frame(input, intrinsics, orientation, nalgebra::Matrix4::identity())?;
    println!(
        "Input: {}x{} ({})",
        frame.width, frame.height, frame.orientation
    );

    let query = IntrinsicsAdjuster::with_quality(quality).adjust(&frame)?;

    println!("Query: {}x{}, {} bytes", query.width, query.height, query.image_data.len());
    println!("  fx = {}", query.intrinsics.fx);
    println!("  fy = {}", query.intrinsics.fy);
    println!("  px = {}", query.intrinsics.cx);
    println!("  py = {}", query.intrinsics.cy);

    if let Some(path) = output {
        std::fs::write(&path, &query.image_data)?;
        println!("Query image saved: {}", path.display());
    }
    Ok(())
}

/// Full round trip: token, query, corrective transform
///
/// Ctrl-C cancels the request in flight.
pub fn localize(args: LocalizeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    config.validate_endpoints()?;
    apply_map_override(&mut config, args.map_code, args.map_set_code)?;
    let (client_id, client_secret) = config.credentials()?;

    let camera_transform = geometry::pose_matrix(&args.position, &args.rotation);
    let frame = load_frame(&args.input, args.intrinsics, args.orientation, camera_transform)?;

    let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
    let relocalizer = Arc::new(Relocalizer::from_config(&config, Arc::clone(&transport))?);
    let provider = TokenProvider::new(transport, config.auth_url.clone());

    println!("Localizing against {}", relocalizer.selector());

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let token = provider.fetch_token(client_id, client_secret).await?;

        let handle = Arc::clone(&relocalizer).spawn(frame, Some(token));
        let canceller = handle.canceller();

        tokio::select! {
            outcome = handle.join() => outcome,
            _ = tokio::signal::ctrl_c() => {
                canceller.cancel();
                Err(PipelineError::Cancelled)
            }
        }
    });

    match outcome {
        Ok(RelocalizationOutcome::Localized { transform, result }) => {
            let p = transform.position;
            let q = transform.rotation.coords;
            println!("Pose found (confidence {:.3})", result.confidence);
            if !result.map_ids.is_empty() {
                println!("Maps: {}", result.map_ids.join(", "));
            }
            println!("Corrective transform:");
            println!("  position = ({:.4}, {:.4}, {:.4})", p.x, p.y, p.z);
            println!(
                "  rotation = ({:.4}, {:.4}, {:.4}, {:.4})",
                q.x, q.y, q.z, q.w
            );
            println!("  matrix = {}", transform.matrix);
            Ok(())
        }
        Ok(RelocalizationOutcome::PoseNotFound(_)) => {
            println!("Pose not found");
            Ok(())
        }
        Err(PipelineError::Cancelled) => {
            println!("Cancelled");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Print the resolved configuration with secrets masked
pub fn show_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    match Config::config_path() {
        Some(path) if path.exists() => println!("Config file: {}", path.display()),
        Some(path) => println!("Config file: {} (not found, using defaults)", path.display()),
        None => println!("Config file: unavailable"),
    }
    println!();
    println!("  auth_url             = {}", config.auth_url);
    println!("  query_url            = {}", config.query_url);
    println!("  client_id            = {}", config.client_id);
    println!("  client_secret        = {}", mask(&config.client_secret));
    println!("  map_type             = {:?}", config.map_type);
    println!("  map_code             = {}", config.map_code);
    println!("  map_set_code         = {}", config.map_set_code);
    println!("  jpeg_quality         = {}", config.jpeg_quality.display_name());
    println!("  request_timeout_secs = {}", config.request_timeout_secs);
    Ok(())
}

fn load_frame(
    input: &Path,
    intrinsics: CameraIntrinsics,
    orientation: DeviceOrientation,
    camera_transform: nalgebra::Matrix4<f32>,
) -> Result<CameraFrame, Box<dyn std::error::Error>> {
    let image = image::open(input)
        .map_err(|e| format!("Failed to open {}: {}", input.display(), e))?;
    Ok(CameraFrame::from_image(
        image,
        intrinsics,
        orientation,
        camera_transform,
    ))
}

fn apply_map_override(
    config: &mut Config,
    map_code: Option<String>,
    map_set_code: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let selector = match (map_code, map_set_code) {
        (None, None) => return Ok(()),
        (code, set_code) => MapSelector::from_codes(
            code.as_deref().unwrap_or_default(),
            set_code.as_deref().unwrap_or_default(),
        )?,
    };

    config.map_type = selector.map_type();
    match selector {
        MapSelector::Map(code) => config.map_code = code,
        MapSelector::MapSet(code) => config.map_set_code = code,
    }
    Ok(())
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "(not set)" } else { "********" }
}

fn parse_floats<const N: usize>(s: &str) -> Result<[f32; N], String> {
    let values = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| format!("invalid number '{}': {}", part.trim(), e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    values
        .try_into()
        .map_err(|v: Vec<f32>| format!("expected {} comma-separated values, got {}", N, v.len()))
}

/// Parse "fx,fy,cx,cy"
pub fn parse_intrinsics(s: &str) -> Result<CameraIntrinsics, String> {
    let [fx, fy, cx, cy] = parse_floats::<4>(s)?;
    if fx <= 0.0 || fy <= 0.0 {
        return Err("focal lengths must be positive".to_string());
    }
    Ok(CameraIntrinsics::new(fx, fy, cx, cy))
}

/// Parse "x,y,z"
pub fn parse_vec3(s: &str) -> Result<Vector3<f32>, String> {
    let [x, y, z] = parse_floats::<3>(s)?;
    Ok(Vector3::new(x, y, z))
}

/// Parse "x,y,z,w"
pub fn parse_quaternion(s: &str) -> Result<Quaternion<f32>, String> {
    let [x, y, z, w] = parse_floats::<4>(s)?;
    Ok(quaternion_xyzw(x, y, z, w))
}

/// Parse a JPEG quality preset name
pub fn parse_quality(s: &str) -> Result<JpegQuality, String> {
    JpegQuality::ALL
        .into_iter()
        .find(|q| q.display_name().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("unknown quality '{}', expected low, medium, high or maximum", s))
}
