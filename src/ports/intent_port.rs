//! Intent source port trait.

use crate::domain::error::PerpLedgerError;
use crate::domain::intent::Intent;

pub trait IntentPort {
    /// All intents in input order. Replay applies same-date intents in this
    /// order.
    fn load_intents(&self) -> Result<Vec<Intent>, PerpLedgerError>;
}
