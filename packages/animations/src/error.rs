//! Animation Errors
//!
//! Every failure the engine reports. Validation and timeline problems are
//! collected as plain messages while a pass runs and wrapped here once the
//! pass is over, so callers see all of them at the same time.

use thiserror::Error;

const LINE_START: &str = "\n - ";

/// Joins collected messages into the bulleted layout used by every
/// aggregated error.
pub fn bullet_list(errors: &[String]) -> String {
    let mut out = String::new();
    for err in errors {
        out.push_str(LINE_START);
        out.push_str(err);
    }
    out
}

fn flush_message(errors: &[(String, Vec<String>)]) -> String {
    let parts: Vec<String> = errors
        .iter()
        .map(|(trigger, messages)| {
            format!(
                "@{} has failed due to:{}",
                trigger,
                bullet_list(messages)
            )
        })
        .collect();
    format!(
        "Unable to process animations due to the following failed trigger transitions\n {}",
        parts.join("\n")
    )
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnimationError {
    #[error("animation validation failed:{}", bullet_list(.0))]
    Validation(Vec<String>),

    #[error("animation building failed:{}", bullet_list(.0))]
    Timeline(Vec<String>),

    #[error("The animation trigger \"{name}\" has failed to build due to the following errors:{}", bullet_list(.errors))]
    TriggerBuild { name: String, errors: Vec<String> },

    #[error("Unable to build the animation due to the following errors:{}", bullet_list(.0))]
    Register(Vec<String>),

    #[error("Unable to create the animation due to the following errors:{}", bullet_list(.0))]
    Create(Vec<String>),

    #[error("Unable to animate due to the following errors:{}", bullet_list(.0))]
    Animate(Vec<String>),

    #[error("{}", flush_message(.errors))]
    Flush { errors: Vec<(String, Vec<String>)> },

    #[error("Unable to listen on the animation trigger event \"{phase}\" because the animation trigger \"{name}\" doesn't exist!")]
    MissingTrigger { phase: String, name: String },

    #[error("Unable to listen on the animation trigger \"{name}\" because the provided event is undefined!")]
    MissingEventPhase { name: String },

    #[error("The provided animation trigger event \"{phase}\" for the animation trigger \"{name}\" is not supported!")]
    UnsupportedPhase { phase: String, name: String },

    #[error("The provided animation trigger \"{0}\" has not been registered!")]
    UnregisteredTrigger(String),

    #[error("The animation trigger \"{0}\" has already been registered on this namespace")]
    DuplicateTrigger(String),

    #[error("The requested animation \"{0}\" doesn't exist or has already been destroyed")]
    UnknownAnimation(String),

    #[error("Unable to find the timeline player referenced by {0}")]
    MissingPlayer(String),

    #[error("The provided timeline command \"{0}\" is not supported")]
    UnknownCommand(String),

    #[error("The timeline command \"{command}\" is missing its \"{argument}\" argument")]
    MissingCommandArgument { command: String, argument: String },
}

impl AnimationError {
    /// Messages carried by the aggregated variants, flattened.
    pub fn messages(&self) -> Vec<String> {
        match self {
            AnimationError::Validation(errors)
            | AnimationError::Timeline(errors)
            | AnimationError::Register(errors)
            | AnimationError::Create(errors)
            | AnimationError::Animate(errors)
            | AnimationError::TriggerBuild { errors, .. } => errors.clone(),
            AnimationError::Flush { errors } => errors
                .iter()
                .flat_map(|(_, messages)| messages.iter().cloned())
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

pub type Result<T> = std::result::Result<T, AnimationError>;
