// lifecycle.rs — Map stage descriptors and legal transitions
//
// A map moves Constructed → Pruned → {Refined}* → {Optimized}* → Ready.
// Pruning after refine/optimize does not change the stage. Compute and reset
// are legal in every stage and are not tracked here.

use crate::error::{ModelError, Result};

/// Where a map is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapStage {
    Constructed,
    Pruned,
    Refined,
    Optimized,
    Ready,
}

/// Static metadata about a stage.
pub struct StageDescriptor {
    pub name: &'static str,
    /// Stages reachable from this one in a single step.
    pub next: &'static [MapStage],
}

pub fn descriptor(stage: MapStage) -> StageDescriptor {
    match stage {
        MapStage::Constructed => StageDescriptor {
            name: "constructed",
            next: &[MapStage::Pruned],
        },
        MapStage::Pruned => StageDescriptor {
            name: "pruned",
            next: &[MapStage::Refined, MapStage::Optimized, MapStage::Ready],
        },
        MapStage::Refined => StageDescriptor {
            name: "refined",
            next: &[MapStage::Refined, MapStage::Optimized, MapStage::Ready],
        },
        MapStage::Optimized => StageDescriptor {
            name: "optimized",
            next: &[MapStage::Optimized, MapStage::Ready],
        },
        MapStage::Ready => StageDescriptor {
            name: "ready",
            next: &[],
        },
    }
}

pub const ALL_STAGES: [MapStage; 5] = [
    MapStage::Constructed,
    MapStage::Pruned,
    MapStage::Refined,
    MapStage::Optimized,
    MapStage::Ready,
];

pub fn can_advance(from: MapStage, to: MapStage) -> bool {
    descriptor(from).next.contains(&to)
}

/// The stage after moving `from` → `to`, or `IllegalState`.
pub fn advance(from: MapStage, to: MapStage) -> Result<MapStage> {
    if can_advance(from, to) {
        Ok(to)
    } else {
        Err(ModelError::illegal(format!(
            "map cannot move from {} to {}",
            descriptor(from).name,
            descriptor(to).name
        )))
    }
}
