//! Checkpoint recording and rollback.
//!
//! Checkpoints bound how far a reorg can force the indexer to rewind.
//! Every committed window appends its pre-images to the pending span; once
//! the span covers enough blocks it is promoted to the highest checkpoint,
//! the rollback target. Rolling back re-applies pending then highest
//! pre-images in reverse write order, landing the database at the state it
//! had when the highest span began.

use rollupindex_storage::schema::CheckpointInfo;
use rollupindex_storage::StorageWriter;

use crate::error::SyncError;

/// Fold the window `[start, end]`'s pre-images into the checkpoint chain.
///
/// Call after the window's stores have been applied to `writer` and before
/// its cursors are written, so the captured set covers exactly the domain
/// writes rollback must undo.
pub fn record_window(writer: &mut StorageWriter, start: u64, end: u64) -> Result<(), SyncError> {
    let dirty = writer.dirty()?;
    match writer.highest_checkpoint()? {
        // Very first window: it becomes the rollback floor directly.
        None => {
            let highest = CheckpointInfo {
                start,
                end: end + 1,
                dirty,
            };
            writer.set_highest_checkpoint(&highest)?;
        }
        Some(_) => {
            let mut pending = writer.pending_checkpoint()?.unwrap_or(CheckpointInfo {
                start,
                end: start,
                dirty: Vec::new(),
            });
            if pending.end != start {
                return Err(SyncError::CheckpointChain {
                    pending_end: pending.end,
                    window_start: start,
                });
            }
            pending.dirty.extend(dirty);
            pending.end = end + 1;
            if pending.promotable() {
                tracing::debug!(start = pending.start, end = pending.end, "checkpoint promoted");
                writer.set_highest_checkpoint(&pending)?;
                writer.set_pending_checkpoint(&CheckpointInfo {
                    start: end + 1,
                    end: end + 1,
                    dirty: Vec::new(),
                })?;
            } else {
                writer.set_pending_checkpoint(&pending)?;
            }
        }
    }
    Ok(())
}

/// Undo everything since the highest checkpoint began.
///
/// Re-applies the pending span's pre-images, then the highest span's, each
/// newest-first, and resets both records to an empty span at the highest
/// start. Returns that start height; the caller resumes syncing from it.
pub fn rollback(writer: &mut StorageWriter) -> Result<u64, SyncError> {
    let highest = writer.highest_checkpoint()?.ok_or(SyncError::NoCheckpoint)?;
    if let Some(pending) = writer.pending_checkpoint()? {
        for (key, value) in pending.dirty.into_iter().rev() {
            writer.cover(key, value)?;
        }
    }
    for (key, value) in highest.dirty.iter().rev() {
        writer.cover(key.clone(), value.clone())?;
    }
    let floor = CheckpointInfo {
        start: highest.start,
        end: highest.start,
        dirty: Vec::new(),
    };
    writer.set_highest_checkpoint(&floor)?;
    writer.set_pending_checkpoint(&floor)?;
    tracing::info!(to = highest.start, "rolled back to checkpoint");
    Ok(highest.start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollupindex_storage::kv::KvStore;
    use rollupindex_storage::{MemStore, Storage};
    use std::sync::Arc;

    fn storage() -> Storage {
        Storage::new(Arc::new(MemStore::new()))
    }

    #[test]
    fn first_window_becomes_the_floor() {
        let storage = storage();
        let mut writer = storage.writer();
        writer.put(b"k".to_vec(), b"v1".to_vec()).unwrap();
        record_window(&mut writer, 10, 20).unwrap();
        writer.commit().unwrap();

        let writer = storage.writer();
        let highest = writer.highest_checkpoint().unwrap().unwrap();
        assert_eq!((highest.start, highest.end), (10, 21));
        assert_eq!(highest.dirty, vec![(b"k".to_vec(), Vec::new())]);
        assert!(writer.pending_checkpoint().unwrap().is_none());
    }

    #[test]
    fn pending_chains_and_promotes() {
        let storage = storage();

        let mut writer = storage.writer();
        record_window(&mut writer, 1, 1).unwrap();
        writer.commit().unwrap();

        // Windows 2..=17 and 18..=33: second span reaches 32 blocks.
        let mut writer = storage.writer();
        record_window(&mut writer, 2, 17).unwrap();
        writer.commit().unwrap();

        let mut writer = storage.writer();
        record_window(&mut writer, 18, 33).unwrap();
        writer.commit().unwrap();

        let writer = storage.writer();
        let highest = writer.highest_checkpoint().unwrap().unwrap();
        assert_eq!((highest.start, highest.end), (2, 34));
        let pending = writer.pending_checkpoint().unwrap().unwrap();
        assert_eq!((pending.start, pending.end), (34, 34));
        assert!(pending.dirty.is_empty());
    }

    #[test]
    fn gapped_window_breaks_the_chain() {
        let storage = storage();
        let mut writer = storage.writer();
        record_window(&mut writer, 1, 1).unwrap();
        writer.commit().unwrap();

        let mut writer = storage.writer();
        record_window(&mut writer, 2, 5).unwrap();
        writer.commit().unwrap();

        let mut writer = storage.writer();
        let err = record_window(&mut writer, 9, 12).unwrap_err();
        assert!(matches!(err, SyncError::CheckpointChain { .. }));
    }

    #[test]
    fn rollback_restores_pre_images_newest_first() {
        let storage = storage();

        // Floor window writes k=v1.
        let mut writer = storage.writer();
        writer.put(b"k".to_vec(), b"v0".to_vec()).unwrap();
        writer.commit().unwrap();
        let mut writer = storage.writer();
        writer.put(b"k".to_vec(), b"v1".to_vec()).unwrap();
        record_window(&mut writer, 1, 1).unwrap();
        writer.commit().unwrap();

        // Pending windows overwrite k twice and add a fresh key.
        let mut writer = storage.writer();
        writer.put(b"k".to_vec(), b"v2".to_vec()).unwrap();
        writer.put(b"fresh".to_vec(), b"x".to_vec()).unwrap();
        record_window(&mut writer, 2, 2).unwrap();
        writer.commit().unwrap();

        let mut writer = storage.writer();
        writer.put(b"k".to_vec(), b"v3".to_vec()).unwrap();
        record_window(&mut writer, 3, 3).unwrap();
        writer.commit().unwrap();

        let mut writer = storage.writer();
        let restart = rollback(&mut writer).unwrap();
        writer.commit().unwrap();
        assert_eq!(restart, 1);

        let reader = storage.reader();
        // Back to the value k had when the floor span began.
        assert_eq!(reader.get(b"k").unwrap(), Some(b"v0".to_vec()));
        // The fresh key had an empty pre-image: deleted.
        assert_eq!(reader.get(b"fresh").unwrap(), None);

        let writer = storage.writer();
        let highest = writer.highest_checkpoint().unwrap().unwrap();
        assert_eq!((highest.start, highest.end), (1, 1));
        assert!(highest.dirty.is_empty());
    }

    #[test]
    fn rollback_without_checkpoint_is_an_error() {
        let storage = storage();
        let mut writer = storage.writer();
        assert!(matches!(rollback(&mut writer), Err(SyncError::NoCheckpoint)));
    }
}
