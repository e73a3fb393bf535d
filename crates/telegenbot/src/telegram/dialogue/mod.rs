//! Per-chat dialogue state and the create-flow wizard
//!
//! - `state`: what a chat is currently doing
//! - `wizard`: create-flow transitions, free of any Telegram calls
//! - `render`: windows for each wizard stage

pub mod render;
pub mod state;
pub mod wizard;

pub use render::{confirmation_window, stage_window};
pub use state::State;
pub use wizard::{FlowWizard, Input, Stage, WizardError, THEMES};
