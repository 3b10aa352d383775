use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

/// Stable identifier of a candidate facility site, assigned by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for CandidateId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

new_key_type! {
    pub struct RasterId;
}
