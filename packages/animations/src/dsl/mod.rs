//! Animation DSL
//!
//! Metadata validation and timeline expansion. Nothing in here touches a
//! running player.

pub mod animation;
pub mod animation_trigger;
pub mod ast;
pub mod ast_builder;
pub mod element_instruction_map;
pub mod timeline_builder;
pub mod timeline_instruction;
pub mod transition_expr;
pub mod transition_factory;
