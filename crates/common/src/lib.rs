/**
 * Request authentication.
 *  - Gatekeepers for inbound requests, composable with AnyOf
 *  - Hashed-secret bearer tokens and htpasswd credential files
 *  - Outbound auth header providers
 */
pub mod auth;
/**
 * Deterministic JSON encoding of structured values.
 * Everything that is signed or hashed goes through here.
 */
pub mod canonical;
/**
 * Service configuration, loaded from TOML.
 */
pub mod config;
/**
 * Startup wiring: identity, keys, registry and realm
 *  gatekeepers bundled into one immutable context.
 */
pub mod context;
/**
 * Cryptographic primitives.
 *  - Ed25519 signing keys
 *  - X25519 sealed boxes
 *  - Symmetric content keys and master key wrapping
 */
pub mod crypto;
/**
 * Self-describing content hashes over canonical values.
 */
pub mod hash;
/**
 * The identity claim a service publishes about itself.
 */
pub mod identity;
/**
 * Service key pairs and their public/private packet forms.
 */
pub mod keys;
/**
 * Signed, optionally encrypted message envelopes
 *  and the public key registry used to address them.
 */
pub mod packet;
pub mod timestamp;

pub mod prelude {
    pub use crate::auth::{AuthError, AuthProvider, Gatekeeper, HashedSecretScheme};
    pub use crate::canonical::Value;
    pub use crate::config::TrustConfig;
    pub use crate::context::TrustContext;
    pub use crate::hash::ContentHash;
    pub use crate::identity::{Identity, IdentityBuilder};
    pub use crate::keys::{KeyManager, KeyPair, PrivateKeyPacket, PublicKeyPacket};
    pub use crate::packet::{Packet, PacketError, PublicKeyRegistry};
}
