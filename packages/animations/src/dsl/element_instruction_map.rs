//! Timelines already built for queried child elements, keyed by element
//! and replayed by `animateChild()`.

use std::collections::{HashMap, HashSet};

use crate::driver::ElementId;
use crate::dsl::timeline_instruction::AnimationTimelineInstruction;

#[derive(Debug, Default, Clone)]
pub struct ElementInstructionMap {
    map: HashMap<ElementId, Vec<AnimationTimelineInstruction>>,
    claimed: HashSet<ElementId>,
}

impl ElementInstructionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, element: ElementId) -> &[AnimationTimelineInstruction] {
        self.map.get(&element).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Instructions of `element`, recorded as played by a parent animation.
    /// The entry is kept so another `animateChild()` can replay it.
    pub fn claim(&mut self, element: ElementId) -> Vec<AnimationTimelineInstruction> {
        if !self.map.contains_key(&element) {
            return Vec::new();
        }
        self.claimed.insert(element);
        self.get(element).to_vec()
    }

    pub fn append(&mut self, element: ElementId, instructions: &[AnimationTimelineInstruction]) {
        self.map
            .entry(element)
            .or_default()
            .extend(instructions.iter().cloned());
    }

    pub fn has(&self, element: ElementId) -> bool {
        self.map.contains_key(&element)
    }

    /// Whether `element` has instructions no parent animation has played.
    pub fn is_unclaimed(&self, element: ElementId) -> bool {
        self.has(element) && !self.claimed.contains(&element)
    }
}
