use std::f64::consts::PI;
use ndarray as nd;
use num_complex::Complex64 as C64;
use nv_sim::{
    axy::Harmonic,
    cluster::{ check_partition, cluster_nuclei },
    coherence::coherence_measurement,
    constants::{ GAUSS, G_C13, Lattice },
    control::ControlFields,
    linalg::unitarity_error,
    propagator::{ simulate_propagator, simulate_propagator_controlled },
    qubits::remove_phase,
    spin::{ NvSystem, Spin, coupling_strength, hyperfine },
    vector::Vector3,
};

fn max_abs(a: &nd::Array2<C64>) -> f64 {
    a.iter().map(|x| x.norm()).fold(0.0, f64::max)
}

#[test]
fn two_strongly_coupled_pairs() {
    let nuclei: Vec<Spin>
        = [
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(5.5, 0.5, 0.0),
            Vector3::new(-5.0, 0.0, 0.0),
            Vector3::new(-5.5, -0.5, 0.0),
        ]
        .into_iter()
        .map(Spin::c13)
        .collect();
    let strong
        = coupling_strength(&nuclei[0], &nuclei[1])
        .min(coupling_strength(&nuclei[2], &nuclei[3]));
    let weak
        = [(0, 2), (0, 3), (1, 2), (1, 3)].into_iter()
        .map(|(i, j)| coupling_strength(&nuclei[i], &nuclei[j]))
        .fold(0.0, f64::max);
    assert!(weak < 1e-2 * strong);

    let mut clusters = cluster_nuclei(&nuclei, (strong * weak).sqrt());
    clusters.iter_mut().for_each(|c| c.sort_unstable());
    clusters.sort();
    assert_eq!(clusters, vec![vec![0, 1], vec![2, 3]]);
    check_partition(&clusters, 4).unwrap();
}

#[test]
fn balanced_echo_at_zero_field() {
    let lat = Lattice::diamond();
    let nv = NvSystem::new(1, 0.0, 100.0, 100.0, Harmonic::First)
        .unwrap()
        .with_c13([lat.site(0, 2, -1, 0)]);
    let A = hyperfine(&nv, &nv.nuclei[0]).norm();
    let w_dd = A / 2.0;
    let U = simulate_propagator(&nv, 0, w_dd, Harmonic::First, 0.0, 2.0 * PI / w_dd, 0.0)
        .unwrap();
    assert!(unitarity_error(&U) < 1e-6);
    let I: nd::Array2<C64> = nd::Array2::eye(4);
    assert!(max_abs(&(&remove_phase(&U) - &I)) < 1e-8);
}

#[test]
fn propagators_are_unitary() {
    let lat = Lattice::diamond();
    let mut nv = NvSystem::new(1, 140.0 * GAUSS, 10.0, 10.0, Harmonic::First)
        .unwrap()
        .with_c13([lat.site(1, 2, 2, 0), lat.site(0, 3, 1, 1), lat.site(0, 4, -2, 1)]);
    nv.set_clusters(vec![vec![0, 1], vec![2]]).unwrap();
    let w_L = G_C13 * nv.static_bz;
    let t_dd = 2.0 * PI / w_L;

    let U = simulate_propagator(&nv, 0, w_L, Harmonic::First, 0.2, 5.3 * t_dd, 0.0)
        .unwrap();
    assert_eq!(U.dim(), (8, 8));
    assert!(unitarity_error(&U) < 1e-6);

    let controls = ControlFields::single(nv.axes.x * (2.0 * GAUSS), w_L, 0.3);
    let U = simulate_propagator_controlled(
        &nv, 0, w_L, Harmonic::First, 0.0, &controls, 1.5 * t_dd, 0.1 * t_dd)
        .unwrap();
    assert_eq!(U.dim(), (8, 8));
    assert!(unitarity_error(&U) < 1e-6);
}

#[test]
fn coherence_scan_is_bounded() {
    let config = nv_sim::config::NvConfig::from_toml(r#"
        cluster_size = 2
        scale_factor = 10.0
        integration_factor = 10.0
        nuclei = [[1, 2, 2, 0], [0, 3, 1, 1], [0, 2, 2, -1]]
    "#).unwrap();
    let nv = NvSystem::from_config(&config).unwrap();
    let w_L = G_C13 * nv.static_bz;
    let t_dd = 2.0 * PI / w_L;
    for w in [0.9 * w_L, w_L, 1.1 * w_L] {
        let c = coherence_measurement(&nv, w, Harmonic::First, 0.0, 50.0 * t_dd)
            .unwrap();
        assert!(c.is_finite());
        assert!(c.abs() <= 1.0 + 1e-9);
    }
}
