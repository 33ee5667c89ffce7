mod registry_to_agent_bundle;
mod peers_controlplane_dispatch;
