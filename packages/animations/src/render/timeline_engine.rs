//! Timeline Animation Engine
//!
//! Plays named `animation()` definitions on demand, outside of any trigger.
//! Hosts drive it through `@id:command` properties: an animation is
//! registered once, then created on an element and controlled by id.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::driver::{AnimationDriver, ElementId};
use crate::dsl::ast::Ast;
use crate::dsl::ast_builder::build_animation_ast;
use crate::dsl::element_instruction_map::ElementInstructionMap;
use crate::dsl::timeline_builder::build_animation_timelines;
use crate::dsl::timeline_instruction::AnimationTimelineInstruction;
use crate::error::{AnimationError, Result};
use crate::metadata::{AnimationMetadata, AnimationOptions};
use crate::normalizer::AnimationStyleNormalizer;
use crate::players::{optimize_group_player, AnimationPlayer, PlayerPhase};
use crate::render::shared::{listen_on_player, make_animation_event, normalize_keyframes, ListenerCallback};
use crate::style::{StyleMap, AUTO_STYLE};
use crate::util::{ENTER_CLASSNAME, LEAVE_CLASSNAME};

/// Argument of an `@id:command` property write.
#[derive(Debug, Clone)]
pub enum TimelineCommandArg {
    Metadata(AnimationMetadata),
    Options(AnimationOptions),
    Position(f64),
}

#[derive(Default)]
struct TimelineRegistry {
    animations: HashMap<String, Rc<Ast>>,
    players_by_id: HashMap<String, Rc<dyn AnimationPlayer>>,
    players: Vec<Rc<dyn AnimationPlayer>>,
}

impl TimelineRegistry {
    fn forget(&mut self, id: &str) -> Option<Rc<dyn AnimationPlayer>> {
        let player = self.players_by_id.remove(id)?;
        self.players.retain(|p| !Rc::ptr_eq(p, &player));
        Some(player)
    }
}

pub struct TimelineAnimationEngine {
    driver: Rc<dyn AnimationDriver>,
    normalizer: Rc<dyn AnimationStyleNormalizer>,
    registry: Rc<RefCell<TimelineRegistry>>,
}

impl TimelineAnimationEngine {
    pub fn new(driver: Rc<dyn AnimationDriver>, normalizer: Rc<dyn AnimationStyleNormalizer>) -> Self {
        TimelineAnimationEngine {
            driver,
            normalizer,
            registry: Rc::new(RefCell::new(TimelineRegistry::default())),
        }
    }

    pub fn register(&self, id: &str, metadata: &AnimationMetadata) -> Result<()> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let ast = build_animation_ast(self.driver.as_ref(), metadata, &mut errors, &mut warnings);
        if !errors.is_empty() {
            return Err(AnimationError::Register(errors));
        }
        for warning in &warnings {
            warn!("animation \"{}\" built with warnings: {}", id, warning);
        }
        self.registry
            .borrow_mut()
            .animations
            .insert(id.to_string(), Rc::new(ast));
        Ok(())
    }

    fn build_player(
        &self,
        instruction: &AnimationTimelineInstruction,
        pre_styles: &StyleMap,
        post_styles: Option<&StyleMap>,
    ) -> Result<Rc<dyn AnimationPlayer>> {
        let keyframes = normalize_keyframes(
            self.normalizer.as_ref(),
            &instruction.keyframes,
            Some(pre_styles),
            post_styles,
        )?;
        Ok(self.driver.animate(
            instruction.element,
            &keyframes,
            instruction.duration,
            instruction.delay,
            instruction.easing.as_deref(),
            &[],
        ))
    }

    /// Builds the registered animation `id` on `element`. The player starts
    /// paused; `@id:play` runs it.
    pub fn create(
        &self,
        id: &str,
        element: ElementId,
        options: &AnimationOptions,
    ) -> Result<Rc<dyn AnimationPlayer>> {
        let ast = self.registry.borrow().animations.get(id).cloned();
        let Some(ast) = ast else {
            return Err(AnimationError::Create(vec![
                AnimationError::UnknownAnimation(id.to_string()).to_string(),
            ]));
        };

        let mut errors = Vec::new();
        let mut sub_instructions = ElementInstructionMap::new();
        let instructions = build_animation_timelines(
            self.driver.as_ref(),
            element,
            &ast,
            ENTER_CLASSNAME,
            LEAVE_CLASSNAME,
            &StyleMap::new(),
            &StyleMap::new(),
            options,
            &mut sub_instructions,
            &mut errors,
        );
        if !errors.is_empty() {
            return Err(AnimationError::Create(errors));
        }

        // `*` values resolve against the styles the elements have right now
        let mut auto_styles: HashMap<ElementId, StyleMap> = HashMap::new();
        for instruction in &instructions {
            let styles = auto_styles.entry(instruction.element).or_default();
            for prop in &instruction.post_style_props {
                let value = self
                    .driver
                    .compute_style(instruction.element, prop, Some(AUTO_STYLE));
                styles.insert(prop.clone(), value);
            }
        }

        let players = instructions
            .iter()
            .map(|i| self.build_player(i, &StyleMap::new(), auto_styles.get(&i.element)))
            .collect::<Result<Vec<_>>>()?;
        let player = optimize_group_player(players);
        debug!("created timeline animation \"{}\" on {}", id, element);

        {
            let mut registry = self.registry.borrow_mut();
            if let Some(previous) = registry.forget(id) {
                drop(registry);
                previous.destroy();
                registry = self.registry.borrow_mut();
            }
            registry.players_by_id.insert(id.to_string(), player.clone());
            registry.players.push(player.clone());
        }

        let registry = Rc::downgrade(&self.registry);
        let weak_player = Rc::downgrade(&player);
        let id = id.to_string();
        player.on_destroy(Box::new(move || forget_destroyed(&registry, &id, &weak_player)));
        Ok(player)
    }

    pub fn destroy(&self, id: &str) -> Result<()> {
        let player = self.registry.borrow_mut().forget(id);
        let player = player.ok_or_else(|| AnimationError::MissingPlayer(id.to_string()))?;
        player.destroy();
        Ok(())
    }

    fn get_player(&self, id: &str) -> Result<Rc<dyn AnimationPlayer>> {
        self.registry
            .borrow()
            .players_by_id
            .get(id)
            .cloned()
            .ok_or_else(|| AnimationError::MissingPlayer(id.to_string()))
    }

    pub fn players(&self) -> Vec<Rc<dyn AnimationPlayer>> {
        self.registry.borrow().players.clone()
    }

    /// Calls `callback` when the player created for `id` reaches `phase`.
    pub fn listen(
        &self,
        id: &str,
        element: ElementId,
        phase: &str,
        callback: ListenerCallback,
    ) -> Result<Box<dyn FnOnce()>> {
        let player = self.get_player(id)?;
        let phase_kind = PlayerPhase::parse(phase).ok_or_else(|| AnimationError::UnsupportedPhase {
            phase: phase.to_string(),
            name: id.to_string(),
        })?;
        let event = make_animation_event(element, "", "", "", "", 0.0, false);
        listen_on_player(
            &player,
            phase_kind,
            event,
            callback,
            Rc::new(|callback: Box<dyn FnOnce()>| callback()),
        );
        Ok(Box::new(|| {}))
    }

    pub fn command(
        &self,
        id: &str,
        element: ElementId,
        command: &str,
        args: &[TimelineCommandArg],
    ) -> Result<()> {
        match command {
            "register" => {
                let metadata = args.iter().find_map(|arg| match arg {
                    TimelineCommandArg::Metadata(metadata) => Some(metadata),
                    _ => None,
                });
                let metadata = metadata.ok_or_else(|| AnimationError::MissingCommandArgument {
                    command: command.to_string(),
                    argument: "animation metadata".to_string(),
                })?;
                return self.register(id, metadata);
            }
            "create" => {
                let options = args
                    .iter()
                    .find_map(|arg| match arg {
                        TimelineCommandArg::Options(options) => Some(options.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                return self.create(id, element, &options).map(|_| ());
            }
            "destroy" => return self.destroy(id),
            _ => {}
        }

        let player = self.get_player(id)?;
        match command {
            "play" => player.play(),
            "pause" => player.pause(),
            "reset" => player.reset(),
            "restart" => player.restart(),
            "finish" => player.finish(),
            "init" => player.init(),
            "setPosition" => {
                let position = args.iter().find_map(|arg| match arg {
                    TimelineCommandArg::Position(p) => Some(*p),
                    _ => None,
                });
                let position = position.ok_or_else(|| AnimationError::MissingCommandArgument {
                    command: command.to_string(),
                    argument: "position".to_string(),
                })?;
                player.set_position(position);
            }
            other => return Err(AnimationError::UnknownCommand(other.to_string())),
        }
        Ok(())
    }
}

fn forget_destroyed(
    registry: &Weak<RefCell<TimelineRegistry>>,
    id: &str,
    player: &Weak<dyn AnimationPlayer>,
) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let Ok(mut registry) = registry.try_borrow_mut() else {
        return;
    };
    let is_current = registry
        .players_by_id
        .get(id)
        .map_or(false, |p| Weak::ptr_eq(&Rc::downgrade(p), player));
    if is_current {
        registry.forget(id);
    }
}
