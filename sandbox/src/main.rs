// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loads texture files through the texture agent in blocking mode and prints
//! one line per completion.
//!
//! ```text
//! tessera-sandbox assets/brick.png assets/sky.dds --flip --workers 2
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tessera_agents::texture_agent::{LoadReport, TextureAgent, TextureLoaderSettings};
use tessera_infra::HeadlessRenderContext;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Texture files to load. Identifiers are the file stems.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Flip every texture vertically on load.
    #[arg(long)]
    flip: bool,

    /// Number of decode workers.
    #[arg(long)]
    workers: Option<usize>,

    /// RON file with loader settings. Flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds to wait for every load.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

fn settings(args: &Args) -> Result<TextureLoaderSettings> {
    let mut settings = match &args.config {
        Some(path) => TextureLoaderSettings::from_file(path)
            .with_context(|| format!("Failed to load settings from '{}'", path.display()))?,
        None => TextureLoaderSettings::default(),
    };
    settings.flip_on_load |= args.flip;
    if let Some(workers) = args.workers {
        settings.worker_threads = workers;
    }
    Ok(settings)
}

fn print_report(report: &LoadReport) {
    let millis = |d: Duration| d.as_secs_f64() * 1000.0;
    match &report.result {
        Ok(info) => println!(
            "ok    {:<24} {}x{} layers={} mips={} {:?}{}{} queued={:.2}ms decode={:.2}ms",
            report.identifier,
            info.width,
            info.height,
            info.layers,
            info.mip_levels,
            info.format,
            if info.is_srgb() { " srgb" } else { "" },
            if info.is_cubemap() { " cube" } else { "" },
            millis(report.timings.queued_to_completion),
            millis(report.timings.decode_to_completion),
        ),
        Err(err) => println!("error {:<24} {err}", report.identifier),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let context = Arc::new(HeadlessRenderContext::new());
    let mut agent = TextureAgent::new(context.clone(), settings(&args)?)
        .context("Failed to start the texture agent")?;
    agent.register_default_handlers();

    let mut requested = 0;
    for path in &args.files {
        let identifier = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match agent.load(&identifier, path) {
            Ok(_) => requested += 1,
            Err(err) => println!("error {identifier:<24} {err}"),
        }
    }

    let mut failed = 0;
    let reported = agent.poll_until(requested, Duration::from_secs(args.timeout), |report| {
        if !report.is_success() {
            failed += 1;
        }
        print_report(&report);
    });

    log::info!(
        "{} textures resident, {} bytes uploaded",
        context.live_textures(),
        context.allocated_bytes()
    );
    if reported < requested {
        bail!("{} of {requested} loads did not finish in time", requested - reported);
    }
    if failed > 0 {
        bail!("{failed} of {requested} loads failed");
    }
    Ok(())
}
