//! Run configuration, loaded from TOML.
//!
//! ```toml
//! ms = 1
//! static_bz = 140.1        # gauss
//! cluster_size = 4
//! nuclei = [[1, 2, 2, 0], [0, 3, 1, 1]]
//!
//! [scan]
//! w_min = 140.0            # kHz
//! w_max = 160.0
//! points = 201
//! ```
//!
//! Every field except `nuclei` has a default.

use std::{ f64::consts::PI, path::Path };
use serde::{ Deserialize, Serialize };
use tracing::info;
use crate::{
    axy::Harmonic,
    constants::{ GAUSS, Lattice },
    error::{ NvError, NvResult },
    spin::NvSystem,
};

/// Top-level run configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NvConfig {
    /// Spin projection of the NV electron's active sublevel (±1).
    #[serde(default = "default_ms")]
    pub ms: i32,

    /// Static field along the NV axis, in gauss.
    #[serde(default = "default_static_bz")]
    pub static_bz: f64,

    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,

    #[serde(default = "default_integration_factor")]
    pub integration_factor: f64,

    /// AXY harmonic used for nuclear coupling (1 or 3).
    #[serde(default = "default_k_dd")]
    pub k_dd: u32,

    /// Target size of the largest cluster.
    #[serde(default = "default_cluster_size")]
    pub cluster_size: usize,

    /// Starting point of the coupling threshold search, in rad/s.
    #[serde(default = "default_initial_coupling")]
    pub initial_coupling: f64,

    /// Resolution of the coupling threshold search, in rad/s.
    #[serde(default = "default_coupling_cutoff")]
    pub coupling_cutoff: f64,

    /// Lattice sites `[b, l, m, n]` of the C-13 nuclei.
    pub nuclei: Vec<[i32; 4]>,

    #[serde(default)]
    pub scan: Option<ScanConfig>,
}

fn default_ms() -> i32 { 1 }
fn default_static_bz() -> f64 { 140.1 }
fn default_scale_factor() -> f64 { 100.0 }
fn default_integration_factor() -> f64 { 100.0 }
fn default_k_dd() -> u32 { 1 }
fn default_cluster_size() -> usize { 4 }
fn default_initial_coupling() -> f64 { 100.0 }
fn default_coupling_cutoff() -> f64 { 1e-3 }

/// Coherence scan over a range of sequence frequencies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Lowest scan frequency, in kHz.
    #[serde(default = "default_w_min")]
    pub w_min: f64,

    /// Highest scan frequency, in kHz.
    #[serde(default = "default_w_max")]
    pub w_max: f64,

    #[serde(default = "default_points")]
    pub points: usize,

    /// AXY Fourier weight.
    #[serde(default)]
    pub f_dd: f64,

    /// Total decoupling time, in seconds.
    #[serde(default = "default_scan_time")]
    pub scan_time: f64,
}

fn default_w_min() -> f64 { 140.0 }
fn default_w_max() -> f64 { 160.0 }
fn default_points() -> usize { 201 }
fn default_scan_time() -> f64 { 1e-3 }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            w_min: default_w_min(),
            w_max: default_w_max(),
            points: default_points(),
            f_dd: 0.0,
            scan_time: default_scan_time(),
        }
    }
}

impl ScanConfig {
    /// Scan angular frequencies in rad/s, evenly spaced and inclusive of
    /// both ends.
    pub fn frequencies(&self) -> Vec<f64> {
        let to_rad = 2.0 * PI * 1e3;
        match self.points {
            0 => Vec::new(),
            1 => vec![self.w_min * to_rad],
            n => {
                let step = (self.w_max - self.w_min) / (n - 1) as f64;
                (0..n)
                    .map(|k| (self.w_min + step * k as f64) * to_rad)
                    .collect()
            },
        }
    }
}

impl NvConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(s: &str) -> NvResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn load<P>(path: P) -> NvResult<Self>
    where P: AsRef<Path>
    {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check the parameters that are not checked on system construction.
    pub fn validate(&self) -> NvResult<()> {
        if self.nuclei.is_empty() {
            return Err(NvError::InvalidParam("no nuclei given".to_string()));
        }
        if self.cluster_size == 0 {
            return Err(NvError::InvalidParam(
                "cluster size must be at least 1".to_string()));
        }
        if let Some(scan) = &self.scan {
            if !(scan.w_min > 0.0 && scan.w_max >= scan.w_min) {
                return Err(NvError::InvalidParam(
                    format!(
                        "bad scan range [{}, {}] kHz",
                        scan.w_min, scan.w_max,
                    )
                ));
            }
        }
        Ok(())
    }
}

impl NvSystem {
    /// Build a system from a configuration and cluster its nuclei.
    pub fn from_config(config: &NvConfig) -> NvResult<Self> {
        config.validate()?;
        let lat = Lattice::diamond();
        let mut nv = Self::new(
            config.ms,
            config.static_bz * GAUSS,
            config.scale_factor,
            config.integration_factor,
            Harmonic::try_from(config.k_dd)?,
        )?
        .with_c13(
            config.nuclei.iter().map(|&[b, l, m, n]| lat.site(b, l, m, n)));
        let coupling = nv.calibrate_clusters(
            config.initial_coupling,
            config.cluster_size,
            config.coupling_cutoff,
        )?;
        info!(
            nuclei = nv.nuclei.len(),
            clusters = nv.clusters.len(),
            coupling,
            "built system from config",
        );
        Ok(nv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::check_partition;

    const CONFIG: &str = r#"
        static_bz = 140.0
        cluster_size = 2
        nuclei = [[1, 2, 2, 0], [0, 3, 1, 1], [0, 2, 2, -1], [1, 4, 2, -3]]

        [scan]
        w_min = 100.0
        w_max = 200.0
        points = 11
    "#;

    #[test]
    fn parse_with_defaults() {
        let config = NvConfig::from_toml(CONFIG).unwrap();
        assert_eq!(config.ms, 1);
        assert_eq!(config.k_dd, 1);
        assert_eq!(config.nuclei.len(), 4);
        let scan = config.scan.as_ref().unwrap();
        assert_eq!(scan.f_dd, 0.0);
        let w = scan.frequencies();
        assert_eq!(w.len(), 11);
        assert!((w[0] - 2.0 * PI * 1e5).abs() < 1e-6);
        assert!((w[10] - 2.0 * PI * 2e5).abs() < 1e-6);
        assert!((w[5] - 2.0 * PI * 1.5e5).abs() < 1e-6);
    }

    #[test]
    fn bad_configs() {
        assert!(NvConfig::from_toml("ms = 1").is_err());
        assert!(NvConfig::from_toml("nuclei = []").is_err());
        assert!(NvConfig::from_toml("nuclei = [[0, 1, 0, 0]]\nbogus = 3").is_err());
        let config = NvConfig::from_toml("nuclei = [[0, 1, 0, 0]]\nk_dd = 2").unwrap();
        assert!(matches!(NvSystem::from_config(&config), Err(NvError::BadHarmonic(2))));
    }

    #[test]
    fn build_system() {
        let config = NvConfig::from_toml(CONFIG).unwrap();
        let nv = NvSystem::from_config(&config).unwrap();
        assert_eq!(nv.nuclei.len(), 4);
        assert!((nv.static_bz - 140.0 * GAUSS).abs() < 1e-6 * nv.static_bz);
        check_partition(&nv.clusters, 4).unwrap();
        assert!(nv.clusters.iter().any(|c| c.len() >= 2));
    }
}
