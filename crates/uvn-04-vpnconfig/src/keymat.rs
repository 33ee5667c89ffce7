//! Key material for one VPN profile: a WireGuard keypair per participant
//! and a preshared key per link, independent of the identity/permissions
//! CA material.

use std::collections::BTreeMap;

use uvn_01_paired_map::PairedValueMap;

use crate::errors::VpnConfigError;
use crate::wg::{genpsk, WgKeyPair};
use shared_types::ids::{CellId, PeerId};

/// Keys for a centralized (root or particles) VPN: one key for the root
/// and one per connected peer, plus a preshared key per `(root, peer)`
/// pair. Mirrors the reference's `CentralizedVpnKeyMaterial`.
#[derive(Default)]
pub struct CentralizedVpnKeyMaterial {
    root_key: Option<WgKeyPair>,
    peer_keys: BTreeMap<PeerId, WgKeyPair>,
    preshared_keys: PairedValueMap<PeerId, String>,
}

impl CentralizedVpnKeyMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures keys exist for the root and for every id in `peer_ids`.
    pub fn assert_keys(&mut self, peer_ids: impl IntoIterator<Item = PeerId>) {
        if self.root_key.is_none() {
            self.root_key = Some(WgKeyPair::generate());
        }
        for id in peer_ids {
            self.peer_keys.entry(id).or_insert_with(WgKeyPair::generate);
            self.preshared_keys.assert_with(PeerId::Registry, id, genpsk);
        }
    }

    /// Drops keys for peers no longer in `peer_ids`.
    pub fn purge_gone_peers(&mut self, peer_ids: &[PeerId]) {
        let keep: std::collections::BTreeSet<PeerId> = peer_ids.iter().copied().collect();
        let gone: Vec<PeerId> = self.peer_keys.keys().copied().filter(|id| !keep.contains(id)).collect();
        for id in gone {
            self.peer_keys.remove(&id);
            self.preshared_keys.purge(id);
        }
    }

    pub fn drop_keys(&mut self) {
        self.root_key = None;
        self.peer_keys.clear();
        self.preshared_keys = PairedValueMap::new();
    }

    pub fn root_key(&self) -> Result<&WgKeyPair, VpnConfigError> {
        self.root_key.as_ref().ok_or(VpnConfigError::KeyNotAsserted(PeerId::Registry))
    }

    pub fn peer_material(&self, peer: PeerId) -> Result<(&WgKeyPair, String), VpnConfigError> {
        let key = self.peer_keys.get(&peer).ok_or(VpnConfigError::KeyNotAsserted(peer))?;
        let psk = self
            .preshared_keys
            .get(PeerId::Registry, peer)
            .map_err(|_| VpnConfigError::PskNotAsserted)?;
        Ok((key, psk.clone()))
    }
}

/// Keys for the peer-to-peer backbone VPN: each unordered pair of cells
/// owns an independent keypair per side plus a preshared key, all keyed
/// by the canonical `(min, max)` cell-id pair.
#[derive(Default)]
pub struct P2PVpnKeyMaterial {
    pair_keys: PairedValueMap<CellId, (WgKeyPair, WgKeyPair)>,
    preshared_keys: PairedValueMap<CellId, String>,
}

impl P2PVpnKeyMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drop_keys(&mut self) {
        self.pair_keys = PairedValueMap::new();
        self.preshared_keys = PairedValueMap::new();
    }

    /// Returns `(a's keypair, b's keypair, psk)` for the edge `(a, b)`,
    /// generating them on first assertion.
    pub fn assert_pair(&mut self, a: CellId, b: CellId) -> (WgKeyPair, WgKeyPair, String) {
        let (ka, kb) = self
            .pair_keys
            .assert_with(a, b, || (WgKeyPair::generate(), WgKeyPair::generate()));
        let side_a = PairedValueMap::<CellId, WgKeyPair>::pick(a, b, a, (ka, kb)).clone();
        let side_b = PairedValueMap::<CellId, WgKeyPair>::pick(a, b, b, (ka, kb)).clone();
        let psk = self.preshared_keys.assert_with(a, b, genpsk).clone();
        (side_a, side_b, psk)
    }

    pub fn pair_material(&self, a: CellId, b: CellId) -> Result<(WgKeyPair, WgKeyPair, String), VpnConfigError> {
        let (ka, kb) = self.pair_keys.get(a, b).map_err(|_| VpnConfigError::KeyNotAsserted(PeerId::Cell(a)))?;
        let side_a = PairedValueMap::<CellId, WgKeyPair>::pick(a, b, a, (ka, kb)).clone();
        let side_b = PairedValueMap::<CellId, WgKeyPair>::pick(a, b, b, (ka, kb)).clone();
        let psk = self.preshared_keys.get(a, b).map_err(|_| VpnConfigError::PskNotAsserted)?.clone();
        Ok((side_a, side_b, psk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centralized_keys_are_stable_once_asserted() {
        let mut km = CentralizedVpnKeyMaterial::new();
        km.assert_keys([PeerId::Cell(CellId::new(1))]);
        let (key1, psk1) = km.peer_material(PeerId::Cell(CellId::new(1))).unwrap();
        let pub1 = key1.public_key.clone();
        km.assert_keys([PeerId::Cell(CellId::new(1))]);
        let (key2, psk2) = km.peer_material(PeerId::Cell(CellId::new(1))).unwrap();
        assert_eq!(pub1, key2.public_key);
        assert_eq!(psk1, psk2);
    }

    #[test]
    fn p2p_pair_material_is_symmetric() {
        let mut km = P2PVpnKeyMaterial::new();
        let a = CellId::new(1);
        let b = CellId::new(2);
        let (ka, kb, psk_ab) = km.assert_pair(a, b);
        let (kb2, ka2, psk_ba) = km.assert_pair(b, a);
        assert_eq!(ka.public_key, ka2.public_key);
        assert_eq!(kb.public_key, kb2.public_key);
        assert_eq!(psk_ab, psk_ba);
    }
}
