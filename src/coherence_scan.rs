//! Print the NV coherence signal over a range of decoupling frequencies.
//!
//! Usage: `coherence_scan [config.toml]`, defaulting to `demos/nv.toml`. Set
//! `RUST_LOG` to control log output.

use std::path::PathBuf;
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use nv_sim::{
    axy::Harmonic,
    coherence::coherence_measurement,
    config::NvConfig,
    spin::NvSystem,
};

fn main() -> anyhow::Result<()> {
    let filter
        = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path
        = std::env::args().nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demos/nv.toml"));
    let config = NvConfig::load(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let nv = NvSystem::from_config(&config)?;
    let scan = config.scan.clone().unwrap_or_default();
    let k = Harmonic::try_from(config.k_dd)?;
    info!(points = scan.points, f_dd = scan.f_dd, "starting coherence scan");

    println!("# w_scan (kHz)  coherence");
    for w in scan.frequencies().into_iter() {
        let coherence = coherence_measurement(&nv, w, k, scan.f_dd, scan.scan_time)?;
        println!("{:.6}  {:.8}", w / (2.0 * std::f64::consts::PI * 1e3), coherence);
    }
    Ok(())
}
