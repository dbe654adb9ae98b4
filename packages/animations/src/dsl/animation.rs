//! Standalone Animation
//!
//! A validated `animation()` that can be expanded into timelines for any
//! element, outside of any trigger.

use std::rc::Rc;

use crate::driver::{AnimationDriver, ElementId};
use crate::dsl::ast::Ast;
use crate::dsl::ast_builder::build_animation_ast;
use crate::dsl::element_instruction_map::ElementInstructionMap;
use crate::dsl::timeline_builder::build_animation_timelines;
use crate::dsl::timeline_instruction::AnimationTimelineInstruction;
use crate::error::{AnimationError, Result};
use crate::metadata::{AnimationMetadata, AnimationOptions};
use crate::style::{normalize_styles, StyleMap};
use crate::util::{ENTER_CLASSNAME, LEAVE_CLASSNAME};

pub struct Animation {
    driver: Rc<dyn AnimationDriver>,
    ast: Ast,
}

impl Animation {
    pub fn new(driver: Rc<dyn AnimationDriver>, input: &AnimationMetadata) -> Result<Self> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let ast = build_animation_ast(driver.as_ref(), input, &mut errors, &mut warnings);
        if !errors.is_empty() {
            return Err(AnimationError::Validation(errors));
        }
        for warning in &warnings {
            log::warn!("animation built with warnings: {}", warning);
        }
        Ok(Animation { driver, ast })
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn build_timelines(
        &self,
        element: ElementId,
        starting_styles: &[StyleMap],
        destination_styles: &[StyleMap],
        options: &AnimationOptions,
        sub_instructions: Option<&mut ElementInstructionMap>,
    ) -> Result<Vec<AnimationTimelineInstruction>> {
        let start = normalize_styles(starting_styles);
        let dest = normalize_styles(destination_styles);
        let mut errors = Vec::new();
        let mut owned = ElementInstructionMap::new();
        let sub_instructions = sub_instructions.unwrap_or(&mut owned);
        let result = build_animation_timelines(
            self.driver.as_ref(),
            element,
            &self.ast,
            ENTER_CLASSNAME,
            LEAVE_CLASSNAME,
            &start,
            &dest,
            options,
            sub_instructions,
            &mut errors,
        );
        if !errors.is_empty() {
            return Err(AnimationError::Timeline(errors));
        }
        Ok(result)
    }
}
