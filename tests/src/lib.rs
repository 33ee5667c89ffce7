//! Cross-crate integration tests for the UVN coordination engine.
//!
//! Each per-crate unit test suite already covers its own invariants in
//! isolation; these exercise a full flow across crate boundaries — the
//! scenarios of spec §8 that only show up once Registry, Deployment,
//! KeyMaterial, VpnConfig, Peers and ControlPlane are wired together the
//! way the Agent actually wires them.

#![allow(unused_imports)]

pub mod integration;
