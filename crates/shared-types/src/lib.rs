//! # Shared Types
//!
//! Domain entities for the unified virtual network (UVN): membership
//! (cells, particles), settings, deployment shape, key material records
//! and runtime peer state. Every `uvn-*` crate depends on this crate
//! instead of redefining these types locally.

pub mod errors;
pub mod exec;
pub mod ids;
pub mod net;
pub mod settings;
pub mod timing;
pub mod uvn;

pub use errors::*;
pub use exec::{CommandRunner, SystemCommandRunner};
pub use ids::*;
pub use net::*;
pub use settings::*;
pub use timing::TimingProfile;
pub use uvn::*;
