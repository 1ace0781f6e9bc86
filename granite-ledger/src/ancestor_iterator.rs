use solana_sdk::clock::Slot;

use crate::{errors::LedgerResult, Ledger};

/// Walks a slot's ancestry through `SlotMeta::parent_slot` links.
///
/// Holds only the next slot to yield and a reference to the store, so the
/// walk stays lazy and cycle-free.
pub struct AncestorIterator<'a> {
    current: Option<Slot>,
    ledger: &'a Ledger,
}

impl<'a> AncestorIterator<'a> {
    /// The first yielded slot is `start_slot` itself.
    pub fn new_inclusive(start_slot: Slot, ledger: &'a Ledger) -> Self {
        Self {
            current: Some(start_slot),
            ledger,
        }
    }

    /// Advances the walk. The ancestry is exhausted once slot 0 has been
    /// yielded or a slot without metadata is reached.
    pub fn try_next(&mut self) -> LedgerResult<Option<Slot>> {
        let Some(slot) = self.current else {
            return Ok(None);
        };
        self.current = if slot == 0 {
            None
        } else {
            self.ledger.meta(slot)?.and_then(|meta| meta.parent_slot)
        };
        Ok(Some(slot))
    }
}

impl Iterator for AncestorIterator<'_> {
    type Item = LedgerResult<Slot>;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_next().transpose()
    }
}
