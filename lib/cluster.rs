//! Partitioning of the nuclear bath into clusters of strongly coupled spins.
//!
//! Couplings between nuclei in different clusters are neglected, so each
//! cluster can be simulated independently in a space of `2^(size + 1)`
//! dimensions (the extra qubit being the NV electron).

use tracing::{ debug, info };
use crate::{
    error::{ NvError, NvResult },
    spin::{ NvSystem, Spin, coupling_strength, is_larmor_pair },
};

/// Maximum number of steps taken by [`find_target_coupling`] before giving
/// up.
pub const MAX_CALIBRATION_STEPS: usize = 10_000;

/// Group nuclei into clusters such that every pair coupled with strength at
/// least `min_coupling` ends up in the same cluster.
///
/// Clusters are grown breadth-first from the lowest unclustered index: every
/// unclustered nucleus coupled to any member is absorbed, and new members are
/// scanned in turn. Members are listed in the order they were absorbed.
pub fn cluster_nuclei(nuclei: &[Spin], min_coupling: f64) -> Vec<Vec<usize>> {
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut clustered: Vec<bool> = vec![false; nuclei.len()];
    for i in 0..nuclei.len() {
        if clustered[i] { continue; }
        let mut cluster: Vec<usize> = vec![i];
        clustered[i] = true;
        let mut ci = 0;
        while ci < cluster.len() {
            let member = cluster[ci];
            for k in i + 1..nuclei.len() {
                if !clustered[k]
                    && coupling_strength(&nuclei[member], &nuclei[k])
                        >= min_coupling
                {
                    cluster.push(k);
                    clustered[k] = true;
                }
            }
            ci += 1;
        }
        clusters.push(cluster);
    }
    clusters
}

/// Size of the largest cluster, or 0 if there are none.
pub fn largest_cluster_size(clusters: &[Vec<usize>]) -> usize {
    clusters.iter().map(|c| c.len()).max().unwrap_or(0)
}

/// Find a coupling threshold at which the largest cluster has (just barely)
/// at least `target` members.
///
/// For `target == 1`, returns the largest pairwise coupling plus `cutoff`,
/// which separates every nucleus. Otherwise the threshold walks from
/// `initial` in steps that double until the target size is first crossed and
/// halve on every crossing thereafter, stopping once the step falls below
/// `cutoff` on a threshold that yields clusters of at least the target size.
///
/// Fails if `initial` or `cutoff` is not positive, or with
/// [`NvError::CalibrationDiverged`] if the walk has not settled after
/// [`MAX_CALIBRATION_STEPS`] steps. The walk also gives up as soon as the
/// threshold reaches zero without producing a cluster of the requested size,
/// since no threshold can.
pub fn find_target_coupling(
    nuclei: &[Spin],
    initial: f64,
    target: usize,
    cutoff: f64,
) -> NvResult<f64>
{
    if !(cutoff > 0.0) {
        return Err(NvError::InvalidParam(
            format!("coupling cutoff must be positive; got {}", cutoff)));
    }
    if target <= 1 {
        let max_coupling: f64
            = nuclei.iter().enumerate()
            .flat_map(|(i, si)| {
                nuclei[i + 1..].iter().map(move |sj| coupling_strength(si, sj))
            })
            .fold(0.0, f64::max);
        return Ok(max_coupling + cutoff);
    }
    if !(initial > 0.0) {
        return Err(NvError::InvalidParam(
            format!("initial coupling must be positive; got {}", initial)));
    }

    let too_small = |coupling: f64| -> bool {
        largest_cluster_size(&cluster_nuclei(nuclei, coupling)) >= target
    };
    let mut coupling = initial;
    let mut dcc = initial / 4.0;
    let mut coupling_too_small = too_small(coupling);
    let mut crossed = false;
    let mut steps: usize = 0;
    while dcc >= cutoff || !coupling_too_small {
        if steps >= MAX_CALIBRATION_STEPS {
            return Err(NvError::CalibrationDiverged(steps));
        }
        steps += 1;
        let last_too_small = coupling_too_small;
        coupling += if coupling_too_small { dcc } else { -dcc };
        coupling_too_small = too_small(coupling);
        // at a non-positive threshold the whole bath is one cluster
        if !coupling.is_finite() || (coupling <= 0.0 && !coupling_too_small) {
            return Err(NvError::CalibrationDiverged(steps));
        }
        if coupling_too_small != last_too_small {
            crossed = true;
            dcc /= 2.0;
        } else if !crossed {
            dcc *= 2.0;
        }
        debug!(step = steps, coupling, dcc, "calibrating cluster coupling");
    }
    info!(coupling, steps, target, "calibrated cluster coupling");
    Ok(coupling)
}

/// Merge clusters of `nv` that contain nuclei forming a Larmor pair.
///
/// Clusters are taken in order; each absorbs every later cluster holding a
/// Larmor partner of any of its (growing) list of members.
pub fn group_clusters(nv: &NvSystem) -> NvResult<Vec<Vec<usize>>> {
    let mut old: Vec<Vec<usize>> = nv.clusters.clone();
    let mut new: Vec<Vec<usize>> = Vec::with_capacity(old.len());
    while !old.is_empty() {
        let mut cluster = old.remove(0);
        let mut i = 0;
        while i < cluster.len() {
            let mut c = 0;
            while c < old.len() {
                let mut paired = false;
                for &j in old[c].iter() {
                    if is_larmor_pair(nv, cluster[i], j)? {
                        paired = true;
                        break;
                    }
                }
                if paired {
                    let absorbed = old.remove(c);
                    cluster.extend(absorbed);
                } else {
                    c += 1;
                }
            }
            i += 1;
        }
        new.push(cluster);
    }
    Ok(new)
}

/// Return the index of the cluster containing nucleus `index`.
pub fn cluster_containing(clusters: &[Vec<usize>], index: usize)
    -> NvResult<usize>
{
    clusters.iter()
        .position(|cluster| cluster.contains(&index))
        .ok_or(NvError::NotClustered(index))
}

/// Return the position of nucleus `index` within `cluster`.
pub fn index_in_cluster(cluster: &[usize], index: usize) -> NvResult<usize> {
    cluster.iter()
        .position(|s| *s == index)
        .ok_or(NvError::NotClustered(index))
}

/// Check that `clusters` partitions `0..n`.
pub fn check_partition(clusters: &[Vec<usize>], n: usize) -> NvResult<()> {
    let mut seen: Vec<bool> = vec![false; n];
    for &s in clusters.iter().flatten() {
        match seen.get_mut(s) {
            Some(b) if !*b => { *b = true; },
            _ => { return Err(NvError::BadPartition(n)); },
        }
    }
    if seen.into_iter().all(|b| b) {
        Ok(())
    } else {
        Err(NvError::BadPartition(n))
    }
}

impl NvSystem {
    /// Replace the current clusters, checking that they partition the
    /// nuclei.
    pub fn set_clusters(&mut self, clusters: Vec<Vec<usize>>) -> NvResult<()> {
        check_partition(&clusters, self.nuclei.len())?;
        self.clusters = clusters;
        Ok(())
    }

    /// Re-cluster the nuclei at the given coupling threshold.
    pub fn cluster_with_coupling(&mut self, min_coupling: f64) {
        self.clusters = cluster_nuclei(&self.nuclei, min_coupling);
    }

    /// Calibrate the coupling threshold so that the largest cluster has at
    /// least `target` members, cluster at that threshold, then merge Larmor
    /// pairs. Returns the threshold used.
    pub fn calibrate_clusters(
        &mut self,
        initial: f64,
        target: usize,
        cutoff: f64,
    ) -> NvResult<f64>
    {
        let coupling = find_target_coupling(&self.nuclei, initial, target, cutoff)?;
        self.cluster_with_coupling(coupling);
        self.clusters = group_clusters(self)?;
        info!(
            clusters = self.clusters.len(),
            largest = largest_cluster_size(&self.clusters),
            "clustered nuclei",
        );
        Ok(coupling)
    }
}
