/// How a [`crate::transaction::TransactionScope`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// The scope was marked complete and its work was committed
    Committed,
    /// The scope was not marked complete and its work was rolled back
    RolledBack,
    /// The underlying connection was already closed; nothing was decided
    AlreadyClosed,
}

impl TxOutcome {
    #[must_use]
    pub fn is_committed(self) -> bool {
        self == TxOutcome::Committed
    }
}
