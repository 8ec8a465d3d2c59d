//! Resource identities tracked by the Extended Roofline Model.
//!
//! Two disjoint families of hardware entities appear in a simulator report:
//!
//! - [`Resource`]: functional units, the register file and the memory
//!   hierarchy levels. Index 0..12 in canonical report order.
//! - [`Buffer`]: micro-architectural buffers whose saturation stalls issue.
//!   Index 13..17, following the resources.
//!
//! Every special case in the model (precision-pair lookups, vector scaling,
//! byte scaling, line orientation) dispatches on [`ResourceKind`] instead of
//! comparing raw indices.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Broad class of a compute/memory resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Floating-point arithmetic unit (add, mul, fma, div).
    Arithmetic,
    /// Vector data-movement unit (shuffle, blend, move).
    DataMovement,
    /// Register file access channel.
    RegisterAccess,
    /// A level of the memory hierarchy.
    Memory,
}

impl ResourceKind {
    /// Execution units carry a single/double precision pair in the
    /// hardware descriptor and are scaled by the vector width.
    #[inline]
    pub fn is_execution_unit(self) -> bool {
        matches!(self, ResourceKind::Arithmetic | ResourceKind::DataMovement)
    }

    /// Whether operation counts are accesses that convert to bytes.
    #[inline]
    pub fn moves_bytes(self) -> bool {
        matches!(self, ResourceKind::RegisterAccess | ResourceKind::Memory)
    }
}

/// A compute or memory-hierarchy resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    FAdd,
    FMul,
    FFma,
    FDiv,
    FShuffle,
    FBlend,
    FMov,
    Register,
    L1Load,
    L1Store,
    L2,
    Llc,
    Dram,
}

impl Resource {
    /// Number of compute/memory resources.
    pub const COUNT: usize = 13;

    /// All resources in canonical report order.
    pub const ALL: [Resource; Self::COUNT] = [
        Resource::FAdd,
        Resource::FMul,
        Resource::FFma,
        Resource::FDiv,
        Resource::FShuffle,
        Resource::FBlend,
        Resource::FMov,
        Resource::Register,
        Resource::L1Load,
        Resource::L1Store,
        Resource::L2,
        Resource::Llc,
        Resource::Dram,
    ];

    /// Stable index of this resource.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Map an index back to its resource.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Short name used in labels and exported file names.
    pub fn name(self) -> &'static str {
        match self {
            Resource::FAdd => "fadd",
            Resource::FMul => "fmul",
            Resource::FFma => "ffma",
            Resource::FDiv => "fdiv",
            Resource::FShuffle => "fshuffle",
            Resource::FBlend => "fblend",
            Resource::FMov => "fmov",
            Resource::Register => "register",
            Resource::L1Load => "l1_load",
            Resource::L1Store => "l1_store",
            Resource::L2 => "l2",
            Resource::Llc => "llc",
            Resource::Dram => "mem",
        }
    }

    /// Human-readable name for summaries.
    pub fn display_name(self) -> &'static str {
        match self {
            Resource::FAdd => "FP add",
            Resource::FMul => "FP multiply",
            Resource::FFma => "FP fused multiply-add",
            Resource::FDiv => "FP divide",
            Resource::FShuffle => "FP shuffle",
            Resource::FBlend => "FP blend",
            Resource::FMov => "FP move",
            Resource::Register => "Register file",
            Resource::L1Load => "L1 load",
            Resource::L1Store => "L1 store",
            Resource::L2 => "L2",
            Resource::Llc => "LLC",
            Resource::Dram => "DRAM",
        }
    }

    pub fn kind(self) -> ResourceKind {
        match self {
            Resource::FAdd | Resource::FMul | Resource::FFma | Resource::FDiv => {
                ResourceKind::Arithmetic
            }
            Resource::FShuffle | Resource::FBlend | Resource::FMov => ResourceKind::DataMovement,
            Resource::Register => ResourceKind::RegisterAccess,
            Resource::L1Load | Resource::L1Store | Resource::L2 | Resource::Llc | Resource::Dram => {
                ResourceKind::Memory
            }
        }
    }

    /// L1 load/store ports, doubled in vector-code configurations.
    #[inline]
    pub fn is_l1_port(self) -> bool {
        matches!(self, Resource::L1Load | Resource::L1Store)
    }

    /// Iterate over the resources of one kind, in canonical order.
    pub fn of_kind(kind: ResourceKind) -> impl Iterator<Item = Resource> {
        Self::ALL.into_iter().filter(move |r| r.kind() == kind)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serialized as [`Resource::name`], so artifacts parse back with `FromStr`.
impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| format!("unknown resource `{}`", s))
    }
}

/// A micro-architectural buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Buffer {
    /// Reservation station.
    Rs,
    /// Reorder buffer.
    Rob,
    /// Load buffer.
    Lb,
    /// Store buffer.
    Sb,
    /// Line-fill buffer.
    Lfb,
}

impl Buffer {
    /// Number of buffers.
    pub const COUNT: usize = 5;

    /// All buffers in canonical report order.
    pub const ALL: [Buffer; Self::COUNT] = [Buffer::Rs, Buffer::Rob, Buffer::Lb, Buffer::Sb, Buffer::Lfb];

    /// First buffer index; buffers are numbered after the resources.
    pub const INDEX_BASE: usize = Resource::COUNT;

    /// Position of this buffer within report tables (0..5).
    #[inline]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Stable global index (13..17).
    #[inline]
    pub fn index(self) -> usize {
        Self::INDEX_BASE + self.ordinal()
    }

    /// Map a global index (13..17) back to its buffer.
    pub fn from_index(index: usize) -> Option<Self> {
        index
            .checked_sub(Self::INDEX_BASE)
            .and_then(|ordinal| Self::ALL.get(ordinal).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            Buffer::Rs => "rs",
            Buffer::Rob => "rob",
            Buffer::Lb => "lb",
            Buffer::Sb => "sb",
            Buffer::Lfb => "lfb",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Buffer::Rs => "Reservation station",
            Buffer::Rob => "Reorder buffer",
            Buffer::Lb => "Load buffer",
            Buffer::Sb => "Store buffer",
            Buffer::Lfb => "Line-fill buffer",
        }
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Buffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl FromStr for Buffer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| format!("unknown buffer `{}`", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for (i, resource) in Resource::ALL.iter().enumerate() {
            assert_eq!(resource.index(), i);
            assert_eq!(Resource::from_index(i), Some(*resource));
            assert_eq!(resource.name().parse::<Resource>(), Ok(*resource));
        }
        assert_eq!(Resource::from_index(Resource::COUNT), None);
    }

    #[test]
    fn test_buffer_indices_follow_resources() {
        assert_eq!(Buffer::Rs.index(), 13);
        assert_eq!(Buffer::Lfb.index(), 17);
        assert_eq!(Buffer::from_index(15), Some(Buffer::Lb));
        assert_eq!(Buffer::from_index(12), None);
        assert_eq!(Buffer::from_index(18), None);
        assert_eq!("sb".parse::<Buffer>(), Ok(Buffer::Sb));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Resource::FDiv.kind(), ResourceKind::Arithmetic);
        assert_eq!(Resource::FMov.kind(), ResourceKind::DataMovement);
        assert_eq!(Resource::Register.kind(), ResourceKind::RegisterAccess);
        assert_eq!(Resource::Dram.kind(), ResourceKind::Memory);

        let executing: Vec<_> = Resource::ALL
            .into_iter()
            .filter(|r| r.kind().is_execution_unit())
            .collect();
        assert_eq!(executing.len(), 7);
        assert_eq!(Resource::of_kind(ResourceKind::Memory).count(), 5);
        assert!(Resource::Register.kind().moves_bytes());
        assert!(!Resource::FAdd.kind().moves_bytes());
    }

    #[test]
    fn test_serialized_names_parse_back() {
        for resource in Resource::ALL {
            let value = serde_json::to_value(resource).unwrap();
            assert_eq!(value, resource.name());
            assert_eq!(value.as_str().unwrap().parse::<Resource>(), Ok(resource));
        }
        for buffer in Buffer::ALL {
            let value = serde_json::to_value(buffer).unwrap();
            assert_eq!(value.as_str().unwrap().parse::<Buffer>(), Ok(buffer));
        }
        assert_eq!(serde_json::to_value(Resource::FMov).unwrap(), "fmov");
        assert_eq!(serde_json::to_value(Resource::Dram).unwrap(), "mem");
    }

    #[test]
    fn test_unknown_name() {
        assert!("dram".parse::<Resource>().is_err());
        assert_eq!(Resource::Dram.to_string(), "mem");
    }
}
