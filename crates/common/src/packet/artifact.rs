use serde::{Deserialize, Serialize};

use crate::keys::PublicKeyPacket;

/// Payloads that may be signed and published without encryption
///
/// Only self-describing public material implements this. Anything else
/// has to be wrapped in [`Published`], which makes the decision to
/// publish it visible at the call site.
pub trait PublicArtifact: Serialize {}

impl PublicArtifact for PublicKeyPacket {}

/// Explicitly marks a payload as safe to publish in the clear
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Published<T>(pub T);

impl<T: Serialize> PublicArtifact for Published<T> {}
