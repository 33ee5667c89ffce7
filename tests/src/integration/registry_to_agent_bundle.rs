//! End-to-end flow from registry membership to a decoded agent bundle
//! (§4.11, §6): add three public cells, `save()`, and confirm each
//! cell's bundle decodes on the *agent* side into the exact backbone
//! slot the *registry*'s deployment computed for it — scenario 1 of §8
//! ("three public cells, crossed strategy") followed all the way to the
//! artifact a cell host actually receives and decrypts.

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    fn lan(octet: u8) -> ipnetwork::Ipv4Network {
        format!("192.168.{octet}.0/24").parse().unwrap()
    }

    #[test]
    fn three_public_cells_crossed_each_get_two_backbone_tunnels() {
        let mut registry = uvn_11_registry::Registry::init("home", "alice").unwrap();

        let a = registry
            .add_cell("a", "alice", Some(Ipv4Addr::new(198, 51, 100, 1)), vec![lan(1)], false)
            .unwrap();
        let b = registry
            .add_cell("b", "alice", Some(Ipv4Addr::new(198, 51, 100, 2)), vec![lan(2)], false)
            .unwrap();
        let c = registry
            .add_cell("c", "alice", Some(Ipv4Addr::new(198, 51, 100, 3)), vec![lan(3)], false)
            .unwrap();

        registry.save().unwrap();

        let deployment = registry.deployment().unwrap();
        // Three public cells under the default (crossed) strategy form a
        // triangle: every cell backbone-peers with both others.
        for id in [a, b, c] {
            assert_eq!(deployment.peers[&id].peers.len(), 2, "cell {id} should have 2 backbone peers");
        }

        // The link subnet and swapped addresses are the same from both
        // ends of every edge (§3 Deployment invariant).
        let ab = &deployment.peers[&a].peers[&b];
        let ba = &deployment.peers[&b].peers[&a];
        assert_eq!(ab.link_subnet, ba.link_subnet);
        assert_eq!(ab.local_addr, ba.remote_addr);
        assert_eq!(ab.remote_addr, ba.local_addr);

        // Every cell's bundle must decode, independently of the registry,
        // into the same backbone slot the deployment assigned it.
        for id in [a, b, c] {
            let bundle = registry.cell_bundle(id).unwrap();
            let (config, identity) = uvn_12_agent::unpack_bundle(bundle).unwrap();

            assert_eq!(config.cell_id, id);
            assert_eq!(config.uvn_name, "home");
            assert_eq!(config.registry_id, registry.registry_id());
            assert_eq!(config.backbone_vpn.len(), 2);
            assert_eq!(config.backbone_slot, deployment.peers[&id]);
            assert!(!identity.cell_cert_pem.is_empty());
            assert!(!identity.identity_ca_cert_pem.is_empty());
        }
    }

    #[test]
    fn private_cell_tunnel_uses_keepalive_and_no_listen_port() {
        // Scenario 2 of §8: one public cell, one private cell.
        let mut registry = uvn_11_registry::Registry::init("home", "alice").unwrap();
        let public = registry
            .add_cell("pub", "alice", Some(Ipv4Addr::new(1, 2, 3, 4)), vec![lan(1)], false)
            .unwrap();
        let private = registry.add_cell("priv", "alice", None, vec![lan(2)], false).unwrap();

        registry.save().unwrap();

        let bundle = registry.cell_bundle(private).unwrap();
        let (config, _identity) = uvn_12_agent::unpack_bundle(bundle).unwrap();
        let tunnel = &config.backbone_vpn[0];
        assert_eq!(tunnel.peers.len(), 1);
        assert!(tunnel.peers[0].persistent_keepalive.is_some());
        assert!(tunnel.listen_port.is_none());

        let bundle = registry.cell_bundle(public).unwrap();
        let (config, _identity) = uvn_12_agent::unpack_bundle(bundle).unwrap();
        let tunnel = &config.backbone_vpn[0];
        assert!(tunnel.peers[0].persistent_keepalive.is_none());
        assert!(tunnel.listen_port.is_some());
    }

    #[test]
    fn particles_vpn_clients_get_sequential_addresses_on_the_full_subnet() {
        // Scenario 3 of §8: a cell enables the particles VPN, two
        // particles are added, and each gets a client package whose only
        // peer is the root with the full particle subnet as allowed-ips.
        let mut registry = uvn_11_registry::Registry::init("home", "alice").unwrap();
        let root_cell = registry
            .add_cell("gw", "alice", Some(Ipv4Addr::new(1, 2, 3, 4)), vec![lan(1)], true)
            .unwrap();
        let p1 = registry.add_particle("laptop", "alice").unwrap();
        let p2 = registry.add_particle("phone", "alice").unwrap();

        registry.save().unwrap();

        let decode = |bytes: &[u8]| -> uvn_11_registry::ParticlePackage {
            let mut decoder = xz2::read::XzDecoder::new(bytes);
            let mut tar_bytes = Vec::new();
            std::io::Read::read_to_end(&mut decoder, &mut tar_bytes).unwrap();
            let mut archive = tar::Archive::new(tar_bytes.as_slice());
            let mut yaml = None;
            for entry in archive.entries().unwrap() {
                let mut entry = entry.unwrap();
                if entry.path().unwrap().to_string_lossy() == "particle.yaml" {
                    let mut content = Vec::new();
                    std::io::Read::read_to_end(&mut entry, &mut content).unwrap();
                    yaml = Some(content);
                }
            }
            serde_yaml::from_slice(&yaml.unwrap()).unwrap()
        };

        let pkg1 = decode(registry.particle_package(p1).unwrap());
        let pkg2 = decode(registry.particle_package(p2).unwrap());

        assert_eq!(pkg1.particle_id, p1);
        assert_eq!(pkg2.particle_id, p2);
        assert_ne!(pkg1.particles_vpn.address, pkg2.particles_vpn.address);

        let full_subnet = registry.uvn.settings.particles_vpn.subnet;
        for pkg in [&pkg1, &pkg2] {
            assert_eq!(pkg.particles_vpn.peers.len(), 1);
            assert_eq!(pkg.particles_vpn.peers[0].allowed_ips, vec![full_subnet]);
        }

        // The enabling cell's own bundle carries the particles-VPN root
        // tunnel; every other cell (there is none here) would not.
        let bundle = registry.cell_bundle(root_cell).unwrap();
        let (config, _identity) = uvn_12_agent::unpack_bundle(bundle).unwrap();
        assert!(config.particles_vpn.is_some());
    }
}
