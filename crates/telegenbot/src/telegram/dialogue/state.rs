use super::wizard::FlowWizard;
use crate::telegram::flow_settings::FlowField;

/// Dialogue state of a chat, kept in `InMemStorage<State>`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum State {
    /// Menus only; text messages get a hint
    #[default]
    Idle,
    /// Create-flow wizard in progress
    Wizard(FlowWizard),
    /// Waiting for a `ДД.ММ.РРРР ГГ:ХХ` date for a buffer post
    AwaitingSchedule { flow_id: i64, post_id: i64, index: usize },
    /// Waiting for the new HTML text of a buffer post
    AwaitingPostEdit { flow_id: i64, post_id: i64, index: usize },
    /// Waiting for a typed flow setting
    EditingFlow { channel_id: i64, field: FlowField },
    /// Waiting for a promo code
    AwaitingPromo,
}
