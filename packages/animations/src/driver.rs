//! Animation Driver
//!
//! The capability the engine plays animations and touches the DOM through.
//! Elements never leave the driver: the engine only ever sees `ElementId`
//! handles.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::dsl::timeline_instruction::Keyframe;
use crate::players::AnimationPlayer;

/// Opaque handle to a DOM element owned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u32);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub trait AnimationDriver {
    /// Whether `prop` is a style property the platform can animate.
    fn validate_style_property(&self, prop: &str) -> bool;

    fn matches_element(&self, element: ElementId, selector: &str) -> bool;

    /// Whether `child` is a (strict) descendant of `ancestor`.
    fn contains_element(&self, ancestor: ElementId, child: ElementId) -> bool;

    fn get_parent_element(&self, element: ElementId) -> Option<ElementId>;

    /// Matches of `selector` below `element`; only the first one unless `multi`.
    fn query(&self, element: ElementId, selector: &str, multi: bool) -> Vec<ElementId>;

    /// Current computed value of `prop`, or `default_value` when unknown.
    fn compute_style(&self, element: ElementId, prop: &str, default_value: Option<&str>) -> String;

    fn animate(
        &self,
        element: ElementId,
        keyframes: &[Keyframe],
        duration: f64,
        delay: f64,
        easing: Option<&str>,
        previous_players: &[Rc<dyn AnimationPlayer>],
    ) -> Rc<dyn AnimationPlayer>;

    fn add_class(&self, element: ElementId, class_name: &str);

    fn remove_class(&self, element: ElementId, class_name: &str);

    fn has_class(&self, element: ElementId, class_name: &str) -> bool;

    fn set_style(&self, element: ElementId, prop: &str, value: &str);

    fn remove_style(&self, element: ElementId, prop: &str);

    fn get_inline_style(&self, element: ElementId, prop: &str) -> Option<String>;

    /// Detaches `element` from its parent.
    fn remove_child(&self, parent: ElementId, element: ElementId);

    /// Root of the live document; elements outside it are orphaned.
    fn get_body_node(&self) -> Option<ElementId>;
}

/// True when `element` is attached below the driver's body node.
pub fn is_element_attached(driver: &dyn AnimationDriver, element: ElementId) -> bool {
    match driver.get_body_node() {
        Some(body) => body == element || driver.contains_element(body, element),
        None => false,
    }
}
