use stockledger_accounting::{ExchangeRateResolver, JournalEntry, JournalEvent, PostJournalEntry};
use stockledger_core::{JournalEntryId, OperationContext};

use super::Collaborators;
use crate::error::EngineResult;
use crate::events::LedgerEvent;
use crate::store::{LedgerRepository, UnitOfWork};

/// Build, validate and stage a journal entry.
pub fn post<R: LedgerRepository + ?Sized>(
    deps: Collaborators<'_>,
    uow: &mut UnitOfWork<'_, R>,
    ctx: &OperationContext,
    cmd: &PostJournalEntry,
) -> EngineResult<JournalEntry> {
    let resolver = ExchangeRateResolver::new(deps.rates);
    let entry = JournalEntry::post(
        JournalEntryId::new(),
        cmd,
        ctx,
        deps.config.base_currency,
        &deps.config.chart,
        &resolver,
    )?;

    tracing::info!(
        journal_entry_id = %entry.id,
        reference = %entry.reference,
        total = %entry.total_debit(),
        lines = entry.lines.len(),
        "journal entry posted"
    );

    uow.record_journal_entry(entry.clone());
    uow.emit(LedgerEvent::Journal(JournalEvent::posted(&entry)));
    Ok(entry)
}
