//! Session state and change notifications.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tensaku_types::CellId;

/// Where a review session stands as a whole.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewState {
    /// Changes are pending review.
    #[default]
    Modified,
    /// Everything was accepted into the baseline.
    Accepted,
    /// Everything was rolled back to the baseline.
    Rejected,
}

/// Events published on a session's broadcast channel.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The diff list was replaced or updated. `changes` is the new total.
    EntriesChanged { changes: usize },
    /// Agent output started (`true`) or finished (`false`) streaming.
    ProcessingChanged(bool),
    /// Progress of the current streaming session, 0..=1.
    RewriteRatio(f64),
    StateChanged(ReviewState),
    DiffViewToggled(bool),
    /// Navigation focused a change.
    Revealed {
        cell: CellId,
        entry: usize,
        change: Option<usize>,
    },
}
