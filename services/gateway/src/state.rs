use crate::provider::LedgerProvider;
use assembler::TransactionAssembler;
use indexer::recovery::JournaledIndexer;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared by every handler and the chain follower. The follower is the only
/// writer of the indexer; handlers take read locks.
#[derive(Clone)]
pub struct AppState {
    pub indexer: Arc<RwLock<JournaledIndexer>>,
    pub assembler: Arc<TransactionAssembler>,
    pub provider: Arc<dyn LedgerProvider>,
}

impl AppState {
    pub fn new(
        indexer: JournaledIndexer,
        assembler: TransactionAssembler,
        provider: Arc<dyn LedgerProvider>,
    ) -> Self {
        Self {
            indexer: Arc::new(RwLock::new(indexer)),
            assembler: Arc::new(assembler),
            provider,
        }
    }
}
