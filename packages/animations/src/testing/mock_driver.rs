use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::driver::{AnimationDriver, ElementId};
use crate::dsl::timeline_instruction::Keyframe;
use crate::players::AnimationPlayer;

use super::mock_player::MockAnimationPlayer;

struct MockNode {
    tag: String,
    id: Option<String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    classes: IndexSet<String>,
    styles: IndexMap<String, String>,
    computed: HashMap<String, String>,
}

impl MockNode {
    fn new(tag: &str) -> Self {
        MockNode {
            tag: tag.to_string(),
            id: None,
            parent: None,
            children: Vec::new(),
            classes: IndexSet::new(),
            styles: IndexMap::new(),
            computed: HashMap::new(),
        }
    }
}

/// One compound selector: `tag.class#id`, `*` or any subset.
#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

fn parse_compound(text: &str) -> Compound {
    let mut compound = Compound::default();
    let mut current = String::new();
    let mut kind = ' ';
    let push = |kind: char, value: &mut String, compound: &mut Compound| {
        if value.is_empty() {
            return;
        }
        let token = std::mem::take(value);
        match kind {
            '.' => compound.classes.push(token),
            '#' => compound.id = Some(token),
            _ if token != "*" => compound.tag = Some(token.to_lowercase()),
            _ => {}
        }
    };
    for ch in text.chars() {
        if ch == '.' || ch == '#' {
            push(kind, &mut current, &mut compound);
            kind = ch;
        } else {
            current.push(ch);
        }
    }
    push(kind, &mut current, &mut compound);
    compound
}

/// Comma separated list of descendant chains.
fn parse_selector(selector: &str) -> Vec<Vec<Compound>> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.split_whitespace().map(parse_compound).collect())
        .collect()
}

/// In-memory DOM implementing `AnimationDriver`. Every player it creates
/// is a `MockAnimationPlayer` kept in a log for inspection.
pub struct MockAnimationDriver {
    nodes: RefCell<Vec<MockNode>>,
    body: ElementId,
    log: RefCell<Vec<Rc<MockAnimationPlayer>>>,
    default_computed: RefCell<HashMap<String, String>>,
    invalid_properties: RefCell<HashSet<String>>,
}

impl Default for MockAnimationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnimationDriver {
    pub fn new() -> Self {
        MockAnimationDriver {
            nodes: RefCell::new(vec![MockNode::new("body")]),
            body: ElementId(0),
            log: RefCell::new(Vec::new()),
            default_computed: RefCell::new(HashMap::new()),
            invalid_properties: RefCell::new(HashSet::new()),
        }
    }

    pub fn body(&self) -> ElementId {
        self.body
    }

    /// Creates a detached element.
    pub fn create_detached(&self, tag: &str) -> ElementId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(MockNode::new(tag));
        ElementId((nodes.len() - 1) as u32)
    }

    /// Creates an element as the last child of `parent`.
    pub fn create_element(&self, tag: &str, parent: ElementId) -> ElementId {
        let element = self.create_detached(tag);
        self.append_child(parent, element);
        element
    }

    pub fn append_child(&self, parent: ElementId, element: ElementId) {
        self.detach(element);
        let mut nodes = self.nodes.borrow_mut();
        nodes[element.0 as usize].parent = Some(parent);
        nodes[parent.0 as usize].children.push(element);
    }

    fn detach(&self, element: ElementId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[element.0 as usize].parent.take() {
            nodes[parent.0 as usize].children.retain(|c| *c != element);
        }
    }

    pub fn set_id(&self, element: ElementId, id: &str) {
        self.nodes.borrow_mut()[element.0 as usize].id = Some(id.to_string());
    }

    pub fn children(&self, element: ElementId) -> Vec<ElementId> {
        self.nodes.borrow()[element.0 as usize].children.clone()
    }

    pub fn class_names(&self, element: ElementId) -> Vec<String> {
        self.nodes.borrow()[element.0 as usize]
            .classes
            .iter()
            .cloned()
            .collect()
    }

    pub fn inline_style(&self, element: ElementId, prop: &str) -> Option<String> {
        self.get_inline_style(element, prop)
    }

    pub fn is_attached(&self, element: ElementId) -> bool {
        element == self.body || self.contains_element(self.body, element)
    }

    /// Value `compute_style` reports for `prop` on `element` when it has no
    /// inline value.
    pub fn set_computed_style(&self, element: ElementId, prop: &str, value: &str) {
        self.nodes.borrow_mut()[element.0 as usize]
            .computed
            .insert(prop.to_string(), value.to_string());
    }

    /// Value `compute_style` reports for `prop` on any element without a
    /// more specific one.
    pub fn set_default_computed_style(&self, prop: &str, value: &str) {
        self.default_computed
            .borrow_mut()
            .insert(prop.to_string(), value.to_string());
    }

    pub fn reject_style_property(&self, prop: &str) {
        self.invalid_properties.borrow_mut().insert(prop.to_string());
    }

    /// Every player created so far, in creation order.
    pub fn players(&self) -> Vec<Rc<MockAnimationPlayer>> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    fn matches_compound(&self, element: ElementId, compound: &Compound) -> bool {
        let nodes = self.nodes.borrow();
        let node = &nodes[element.0 as usize];
        compound.tag.as_ref().map_or(true, |tag| *tag == node.tag)
            && compound.id.as_ref().map_or(true, |id| node.id.as_ref() == Some(id))
            && compound.classes.iter().all(|c| node.classes.contains(c))
    }

    fn matches_chain(&self, element: ElementId, chain: &[Compound]) -> bool {
        let Some((last, ancestors)) = chain.split_last() else {
            return false;
        };
        if !self.matches_compound(element, last) {
            return false;
        }
        let mut remaining = ancestors;
        let mut current = self.get_parent_element(element);
        while let Some((next, rest)) = remaining.split_last() {
            loop {
                let Some(candidate) = current else {
                    return false;
                };
                current = self.get_parent_element(candidate);
                if self.matches_compound(candidate, next) {
                    break;
                }
            }
            remaining = rest;
        }
        true
    }

    fn descendants(&self, element: ElementId, out: &mut Vec<ElementId>) {
        for child in self.children(element) {
            out.push(child);
            self.descendants(child, out);
        }
    }
}

impl AnimationDriver for MockAnimationDriver {
    fn validate_style_property(&self, prop: &str) -> bool {
        !self.invalid_properties.borrow().contains(prop)
    }

    fn matches_element(&self, element: ElementId, selector: &str) -> bool {
        parse_selector(selector)
            .iter()
            .any(|chain| self.matches_chain(element, chain))
    }

    fn contains_element(&self, ancestor: ElementId, child: ElementId) -> bool {
        let mut current = self.get_parent_element(child);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.get_parent_element(node);
        }
        false
    }

    fn get_parent_element(&self, element: ElementId) -> Option<ElementId> {
        self.nodes.borrow()[element.0 as usize].parent
    }

    fn query(&self, element: ElementId, selector: &str, multi: bool) -> Vec<ElementId> {
        let chains = parse_selector(selector);
        let mut all = Vec::new();
        self.descendants(element, &mut all);
        let mut matched = all
            .into_iter()
            .filter(|el| chains.iter().any(|chain| self.matches_chain(*el, chain)));
        if multi {
            matched.collect()
        } else {
            matched.next().into_iter().collect()
        }
    }

    fn compute_style(&self, element: ElementId, prop: &str, default_value: Option<&str>) -> String {
        let nodes = self.nodes.borrow();
        let node = &nodes[element.0 as usize];
        node.styles
            .get(prop)
            .or_else(|| node.computed.get(prop))
            .cloned()
            .or_else(|| self.default_computed.borrow().get(prop).cloned())
            .or_else(|| default_value.map(str::to_string))
            .unwrap_or_default()
    }

    fn animate(
        &self,
        element: ElementId,
        keyframes: &[Keyframe],
        duration: f64,
        delay: f64,
        easing: Option<&str>,
        previous_players: &[Rc<dyn AnimationPlayer>],
    ) -> Rc<dyn AnimationPlayer> {
        let player = Rc::new(MockAnimationPlayer::new(
            element,
            keyframes.to_vec(),
            duration,
            delay,
            easing.map(str::to_string),
            previous_players.to_vec(),
        ));
        self.log.borrow_mut().push(player.clone());
        player
    }

    fn add_class(&self, element: ElementId, class_name: &str) {
        self.nodes.borrow_mut()[element.0 as usize]
            .classes
            .insert(class_name.to_string());
    }

    fn remove_class(&self, element: ElementId, class_name: &str) {
        self.nodes.borrow_mut()[element.0 as usize]
            .classes
            .shift_remove(class_name);
    }

    fn has_class(&self, element: ElementId, class_name: &str) -> bool {
        self.nodes.borrow()[element.0 as usize]
            .classes
            .contains(class_name)
    }

    fn set_style(&self, element: ElementId, prop: &str, value: &str) {
        self.nodes.borrow_mut()[element.0 as usize]
            .styles
            .insert(prop.to_string(), value.to_string());
    }

    fn remove_style(&self, element: ElementId, prop: &str) {
        self.nodes.borrow_mut()[element.0 as usize]
            .styles
            .shift_remove(prop);
    }

    fn get_inline_style(&self, element: ElementId, prop: &str) -> Option<String> {
        self.nodes.borrow()[element.0 as usize]
            .styles
            .get(prop)
            .cloned()
    }

    fn remove_child(&self, parent: ElementId, element: ElementId) {
        if self.get_parent_element(element) == Some(parent) {
            self.detach(element);
        }
    }

    fn get_body_node(&self) -> Option<ElementId> {
        Some(self.body)
    }
}
