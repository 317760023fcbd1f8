#![allow(non_snake_case)]

//! Simulation of an NV center in diamond coupled to a bath of C-13 nuclear
//! spins under AXY dynamical decoupling.
//!
//! The bath is split into clusters of strongly coupled nuclei; each cluster is
//! simulated together with the NV electron (as qubit 0) and clusters are
//! otherwise treated as independent.

pub mod error;
pub mod vector;
pub mod constants;
pub mod qubits;
pub mod linalg;
pub mod opvec;
pub mod axy;
pub mod spin;
pub mod cluster;
pub mod control;
pub mod hamiltonian;
pub mod propagator;
pub mod coherence;
pub mod target;
pub mod config;

pub use error::{ NvError, NvResult };
