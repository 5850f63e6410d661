//! The windowed sync engine.
//!
//! Two loops, one per layer, each advancing a height cursor in bounded
//! windows. The base-layer loop carries the reorg probe and checkpoint
//! machinery; the rollup loop only trails the checked head. Every window
//! is one overlay writer and one atomic commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rollupindex_merkle::{HashStore, MerkleAccumulator};
use rollupindex_storage::stores::{WitnessLayer, WitnessStore};
use rollupindex_storage::{Storage, StoreError};
use tokio::sync::watch;

use crate::checkpoint::{record_window, rollback};
use crate::client::{L1Client, L2Client};
use crate::config::SyncConfig;
use crate::error::SyncError;

/// Largest number of blocks one window may cover.
pub const MAX_WINDOW: u64 = 1024;

/// End of the next window starting at `start` with the chain head at
/// `largest`, capped at [`MAX_WINDOW`] blocks.
pub fn calc_end_block(start: u64, largest: u64) -> Result<u64, SyncError> {
    if largest < start {
        return Err(SyncError::HeadBehind { start, largest });
    }
    Ok((start + MAX_WINDOW).min(largest))
}

/// Progress snapshot published after every committed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub l1_height: u64,
    pub l2_height: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            l1_height: 0,
            l2_height: 0,
            updated_at: Utc::now(),
        }
    }
}

pub struct SyncEngine<C1, C2, S> {
    storage: Arc<Storage>,
    l1: Arc<C1>,
    l2: Arc<C2>,
    config: SyncConfig,
    l1_tree: MerkleAccumulator<S>,
    l2_tree: MerkleAccumulator<S>,
    status_tx: Arc<watch::Sender<SyncStatus>>,
    status_rx: watch::Receiver<SyncStatus>,
}

impl<C1, C2, S> SyncEngine<C1, C2, S>
where
    C1: L1Client,
    C2: L2Client,
    S: HashStore + Send,
{
    pub fn new(
        storage: Arc<Storage>,
        l1: Arc<C1>,
        l2: Arc<C2>,
        config: SyncConfig,
        l1_tree: MerkleAccumulator<S>,
        l2_tree: MerkleAccumulator<S>,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(SyncStatus::default());
        Self {
            storage,
            l1,
            l2,
            config,
            l1_tree,
            l2_tree,
            status_tx: Arc::new(status_tx),
            status_rx,
        }
    }

    /// Subscribe to progress updates. Grab before calling [`run`].
    ///
    /// [`run`]: SyncEngine::run
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    /// Drive both layer loops until `quit` flips to `true` or a fatal
    /// error surfaces.
    pub async fn run(mut self, quit: watch::Receiver<bool>) -> Result<(), SyncError> {
        // Accumulators resume from the committed compact forms.
        Self::reload_tree(&self.storage, WitnessLayer::L1, &mut self.l1_tree)?;
        Self::reload_tree(&self.storage, WitnessLayer::L2, &mut self.l2_tree)?;

        let l1_loop = Self::run_l1(
            self.storage.clone(),
            self.l1.clone(),
            self.config.clone(),
            self.l1_tree,
            self.status_tx.clone(),
            quit.clone(),
        );
        let l2_loop = Self::run_l2(
            self.storage.clone(),
            self.l2.clone(),
            self.config.clone(),
            self.l2_tree,
            self.status_tx.clone(),
            quit,
        );
        // try_join drops the surviving loop as soon as the other one
        // surfaces a fatal error.
        tokio::try_join!(l1_loop, l2_loop).map(|_| ())
    }

    async fn run_l1(
        storage: Arc<Storage>,
        client: Arc<C1>,
        config: SyncConfig,
        mut tree: MerkleAccumulator<S>,
        status: Arc<watch::Sender<SyncStatus>>,
        mut quit: watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        let last_height = storage.last_synced_l1_height()?;
        let mut is_setup = last_height == 0;
        let mut round = 0u32;
        let mut start = last_height + 1;
        // A consistency violation gets one extra round so the reorg probe
        // can explain it; a second one is fatal.
        let mut divergence_retried = false;
        loop {
            if *quit.borrow() {
                return Ok(());
            }
            if start < config.deploy_height {
                start = config.deploy_height;
            }
            let head = match client.block_number().await {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(error = %e, "l1 head fetch failed");
                    Self::pause(&config, &mut quit).await;
                    continue;
                }
            };
            // Only blocks past the confirmation lag are eligible.
            let head = head.saturating_sub(config.min_confirmations);
            if is_setup && start + 2 > head {
                tracing::warn!(start, head, "l1 head too low, waiting for confirmations");
                Self::pause(&config, &mut quit).await;
                continue;
            }
            let mut end = match calc_end_block(start, head) {
                Ok(end) => end,
                Err(e) => {
                    tracing::warn!(error = %e, "l1 window not ready");
                    Self::pause(&config, &mut quit).await;
                    continue;
                }
            };
            // First two windows after setup stay single-block so the
            // checkpoint floor is cheap to rewind.
            if is_setup && round < 2 {
                round += 1;
                end = start;
            }

            // Reorg probe: the parent of the window must still be the
            // block we recorded.
            match Self::probe_reorg(&storage, client.as_ref()).await {
                Ok(false) => {}
                Ok(true) => {
                    match Self::handle_reorg(&storage, client.as_ref(), &mut tree).await {
                        Ok(restart) => {
                            start = restart;
                            divergence_retried = false;
                        }
                        Err(e) if e.is_retryable() => {
                            tracing::warn!(error = %e, "l1 rollback interrupted");
                            Self::pause(&config, &mut quit).await;
                        }
                        Err(e) => return Err(e),
                    }
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "l1 reorg probe failed");
                    Self::pause(&config, &mut quit).await;
                    continue;
                }
            }

            match Self::sync_l1_window(&storage, client.as_ref(), &mut tree, start, end).await {
                Ok(()) => {
                    tracing::debug!(start, end, "l1 window committed");
                    status.send_modify(|s| {
                        s.l1_height = end;
                        s.updated_at = Utc::now();
                    });
                    start = end + 1;
                    is_setup = false;
                    divergence_retried = false;
                }
                Err(SyncError::Store(e @ StoreError::Inconsistent(_))) if !divergence_retried => {
                    divergence_retried = true;
                    tracing::warn!(start, end, error = %e, "l1 window inconsistent, probing for reorg");
                    Self::reload_tree(&storage, WitnessLayer::L1, &mut tree)?;
                    Self::pause(&config, &mut quit).await;
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(start, end, error = %e, "l1 window failed, will retry");
                    // The accumulator may have advanced past the aborted
                    // commit; rewind it to the committed form.
                    Self::reload_tree(&storage, WitnessLayer::L1, &mut tree)?;
                    Self::pause(&config, &mut quit).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_l2(
        storage: Arc<Storage>,
        client: Arc<C2>,
        config: SyncConfig,
        mut tree: MerkleAccumulator<S>,
        status: Arc<watch::Sender<SyncStatus>>,
        mut quit: watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        let mut start = storage.last_synced_l2_height()? + 1;
        loop {
            if *quit.borrow() {
                return Ok(());
            }
            let head = match client.checked_block_number().await {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(error = %e, "l2 head fetch failed");
                    Self::pause(&config, &mut quit).await;
                    continue;
                }
            };
            let end = match calc_end_block(start, head) {
                Ok(end) => end,
                Err(e) => {
                    tracing::warn!(error = %e, "l2 window not ready");
                    Self::pause(&config, &mut quit).await;
                    continue;
                }
            };
            match Self::sync_l2_window(&storage, client.as_ref(), &mut tree, start, end).await {
                Ok(()) => {
                    tracing::debug!(start, end, "l2 window committed");
                    status.send_modify(|s| {
                        s.l2_height = end;
                        s.updated_at = Utc::now();
                    });
                    start = end + 1;
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(start, end, error = %e, "l2 window failed, will retry");
                    Self::reload_tree(&storage, WitnessLayer::L2, &mut tree)?;
                    Self::pause(&config, &mut quit).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `true` when the recorded parent hash no longer matches the chain.
    async fn probe_reorg(storage: &Storage, client: &C1) -> Result<bool, SyncError> {
        let Some(recorded) = storage.last_synced_l1_hash()? else {
            return Ok(false);
        };
        let height = storage.last_synced_l1_height()?;
        let header = client
            .header_by_number(height)
            .await?
            .ok_or_else(|| SyncError::Rpc(format!("header {height} missing")))?;
        Ok(header.hash != recorded)
    }

    /// Roll back to the highest checkpoint and reset the cursors and
    /// accumulator to match. Returns the height to resume from.
    async fn handle_reorg(
        storage: &Storage,
        client: &C1,
        tree: &mut MerkleAccumulator<S>,
    ) -> Result<u64, SyncError> {
        let mut writer = storage.writer();
        let restart = rollback(&mut writer)?;
        let last_end = restart.saturating_sub(1);
        let header = client
            .header_by_number(last_end)
            .await?
            .ok_or_else(|| SyncError::Rpc(format!("header {last_end} missing")))?;
        writer.set_last_synced_l1_height(last_end)?;
        writer.set_last_synced_l1_timestamp(header.timestamp)?;
        writer.set_last_synced_l1_hash(header.hash)?;
        let version = writer.db_version()?;
        writer.set_db_version(version + 1)?;
        writer.commit()?;

        Self::reload_tree(storage, WitnessLayer::L1, tree)?;
        tracing::info!(restart, version = version + 1, "l1 reorg handled");
        Ok(restart)
    }

    /// Fetch, apply, checkpoint, and commit one base-layer window.
    async fn sync_l1_window(
        storage: &Storage,
        client: &C1,
        tree: &mut MerkleAccumulator<S>,
        start: u64,
        end: u64,
    ) -> Result<(), SyncError> {
        let events = client.events(start, end).await?;
        let header = client
            .header_by_number(end)
            .await?
            .ok_or_else(|| SyncError::Rpc(format!("header {end} missing")))?;

        let mut writer = storage.writer();
        writer.address_manager().store_updates(&events.address_updates)?;
        writer.address_manager().store_synced_height(end)?;
        writer
            .input_chain()
            .store_enqueued_transactions(&events.enqueued)?;
        writer.input_chain().store_batches(&events.input_batches)?;
        writer.state_chain().store_batches(&events.state_batches)?;
        writer
            .witness(WitnessLayer::L1)
            .store_sent_messages(tree, &events.sent_messages)?;
        writer.token_bridge().store_events(&events.bridge_events)?;

        record_window(&mut writer, start, end)?;
        writer.set_last_synced_l1_timestamp(header.timestamp)?;
        writer.set_last_synced_l1_height(end)?;
        writer.set_last_synced_l1_hash(header.hash)?;
        // The node file must be durable before the batch that references
        // it; a flushed-but-uncommitted suffix is overwritten on rewind.
        tree.flush()?;
        writer.commit()?;
        Ok(())
    }

    /// Fetch, apply, and commit one rollup-layer window.
    async fn sync_l2_window(
        storage: &Storage,
        client: &C2,
        tree: &mut MerkleAccumulator<S>,
        start: u64,
        end: u64,
    ) -> Result<(), SyncError> {
        let events = client.events(start, end).await?;
        let mut writer = storage.writer();
        writer
            .witness(WitnessLayer::L2)
            .store_sent_messages(tree, &events.sent_messages)?;
        writer.token_bridge().store_events(&events.bridge_events)?;
        writer.set_last_synced_l2_height(end)?;
        tree.flush()?;
        writer.commit()?;
        Ok(())
    }

    /// Rebuild `tree` from the committed compact form.
    fn reload_tree(
        storage: &Storage,
        layer: WitnessLayer,
        tree: &mut MerkleAccumulator<S>,
    ) -> Result<(), SyncError> {
        let mut reader = storage.reader();
        let (size, peaks) = WitnessStore::new(&mut reader, layer).compact_tree()?;
        tree.reset(size, peaks)?;
        Ok(())
    }

    async fn pause(config: &SyncConfig, quit: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval()) => {}
            _ = quit.changed() => {}
        }
    }
}
