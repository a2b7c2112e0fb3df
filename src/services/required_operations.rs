//! services/required_operations.rs
//! Qué operaciones debe completar un evento antes de cerrarse.

use std::collections::BTreeSet;

use crate::models::event_model::{ChannelFlags, PunchState, TerminalSource};
use crate::models::operation_model::OperationName;

/// - `email`: si el área lo pide o la marcación vino de la app móvil.
/// - `api_saturno`: si el área lo pide.
/// - `api_proexsi`: si el área lo pide y la marcación es entrada o salida.
///
/// El resultado sale ordenado (email, api_saturno, api_proexsi).
pub fn required_operations(
    flags: &ChannelFlags,
    source: &TerminalSource,
    punch_state: &PunchState,
) -> BTreeSet<OperationName> {
    let mut required = BTreeSet::new();
    if flags.wants_email || source.is_mobile_app() {
        required.insert(OperationName::Email);
    }
    if flags.wants_saturno {
        required.insert(OperationName::ApiSaturno);
    }
    if flags.wants_proexsi && punch_state.is_entry_or_exit() {
        required.insert(OperationName::ApiProexsi);
    }
    required
}
