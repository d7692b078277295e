//! External inventory provider boundary.
//!
//! The engine never queries the host scene directly; whoever owns the world
//! hands it an implementation of [`SceneInventory`] and the engine asks for a
//! fresh [`InventorySnapshot`] whenever it needs ground truth (initial
//! registration, consistency checks, threshold derivation).

/// Category of a cleanable entity, counted separately in the progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanableKind {
    Dirt,
    Trash,
}

/// One dirt spot or trash item as reported by a scene scan.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanableScan {
    pub name: String,
    pub position: [f32; 3],
    pub kind: CleanableKind,
    /// Whether the entity was already resolved before the scan ran.
    pub cleaned: bool,
}

impl CleanableScan {
    /// Display label: name plus quantized position, to tell identically-named
    /// prefab instances apart in logs and in the missing-items list. This is
    /// not the primary key; see `CleanableId`.
    pub fn display_label(&self) -> String {
        format!(
            "{}_({:.0},{:.0},{:.0})",
            self.name, self.position[0], self.position[1], self.position[2]
        )
    }
}

/// Result of one full scene scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventorySnapshot {
    pub cleanables: Vec<CleanableScan>,
    /// Signed sentimental value of every memory entity present at scene
    /// start, in scan order. Read once to derive the score thresholds.
    pub memory_values: Vec<i32>,
}

impl InventorySnapshot {
    pub fn cleanable_count(&self) -> usize {
        self.cleanables.len()
    }
}

/// Owner-of-the-world callback the engine uses instead of scanning a scene
/// itself.
pub trait SceneInventory {
    /// Scans the live scene and reports every cleanable entity and every
    /// memory value currently present.
    fn scan(&self) -> InventorySnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_label_quantizes_position() {
        let scan = CleanableScan {
            name: "Soda Can".to_string(),
            position: [1.4, 0.2, -2.6],
            kind: CleanableKind::Trash,
            cleaned: false,
        };
        assert_eq!(scan.display_label(), "Soda Can_(1,0,-3)");
    }

    #[test]
    fn identically_named_instances_get_distinct_labels() {
        let a = CleanableScan {
            name: "DirtSpot".to_string(),
            position: [0.0, 0.0, 0.0],
            kind: CleanableKind::Dirt,
            cleaned: false,
        };
        let b = CleanableScan {
            position: [3.0, 0.0, 1.0],
            ..a.clone()
        };
        assert_ne!(a.display_label(), b.display_label());
    }
}
