//! The partial map controller: public surface, op application, flush
//! scheduling, summaries.

use bytes::Bytes;
use hive_store::BlobStore;
use hive_tree::ChunkedBTree;
use hive_types::{
    DETACHED_SEQ, Handle, MapConfig, Op, SequenceNumber, Summary, SummaryRoot, validate_key,
};
use snafu::ResultExt;
use tokio::sync::broadcast;

use crate::{
    CacheRead,
    error::{CodecSnafu, InvalidKeySnafu, Result, TreeSnafu},
    events::MapEvent,
    pending::PendingState,
    sequenced::SequencedState,
};

/// Host runtime contract consumed by the controller.
///
/// The host owns connectivity and op ordering; the controller only needs to
/// hand it ops, ask whether the container is attached, and read the sequence
/// number of the last op it has processed.
pub trait Runtime {
    /// Submits a local op to the ordering service. The op is applied on this
    /// client only once it comes back sequenced.
    fn submit_local_op(&self, op: Op);

    /// Whether the container is attached to the ordering service.
    fn is_attached(&self) -> bool;

    /// Sequence number of the last op this client has processed.
    fn last_sequence_number(&self) -> SequenceNumber;
}

/// State of the outstanding flush, if any.
///
/// At most one flush is in flight at a time: the gate opens again when the
/// upload fails or when the local flush op comes back sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushState {
    /// No flush in flight.
    Idle,
    /// Chunk uploads are in progress.
    Uploading,
    /// The flush op is submitted but not yet locally sequenced.
    AwaitingAck,
}

/// A collaborative partial map.
///
/// Reads probe the pending overlay, then the sequenced cache, then the
/// chunked tree. Local mutations are visible to the local client's own reads
/// synchronously, before the ordering service acks them; remote mutations
/// become visible when their ops are applied via [`process`](Self::process).
pub struct PartialMap<S, R> {
    config: MapConfig,
    store: S,
    runtime: R,
    tree: ChunkedBTree,
    pending: PendingState,
    sequenced: SequencedState,
    is_leader: bool,
    flush_state: FlushState,
    last_flush_ref_seq: SequenceNumber,
    events: broadcast::Sender<MapEvent>,
}

impl<S: BlobStore, R: Runtime> PartialMap<S, R> {
    /// Creates an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Tree`](crate::MapError::Tree) if the configured
    /// order is invalid.
    pub fn new(config: MapConfig, store: S, runtime: R) -> Result<Self> {
        let tree = ChunkedBTree::new(config.order).context(TreeSnafu)?;
        Ok(Self {
            config,
            store,
            runtime,
            tree,
            pending: PendingState::default(),
            sequenced: SequencedState::default(),
            is_leader: false,
            flush_state: FlushState::Idle,
            last_flush_ref_seq: DETACHED_SEQ,
            events: broadcast::channel(256).0,
        })
    }

    /// Subscribes to map change events.
    pub fn subscribe(&self) -> broadcast::Receiver<MapEvent> {
        self.events.subscribe()
    }

    /// Reads the current value of `key`.
    ///
    /// A value served from the tree is cached into the sequenced layer and
    /// may trigger eviction of colder entries.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidKey`](crate::MapError::InvalidKey) for the
    /// empty key and [`MapError::Tree`](crate::MapError::Tree) if a required
    /// chunk cannot be resolved. Local state never makes a read fail.
    pub async fn get(&mut self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key).context(InvalidKeySnafu)?;
        match self.pending.get(key) {
            CacheRead::Hit(value) => return Ok(Some(value)),
            CacheRead::Absent => return Ok(None),
            CacheRead::Miss => {},
        }
        match self.sequenced.get(key) {
            CacheRead::Hit(value) => return Ok(Some(value)),
            CacheRead::Absent => return Ok(None),
            CacheRead::Miss => {},
        }
        match self.tree.get(key, &self.store).await.context(TreeSnafu)? {
            Some(value) => {
                self.sequenced.cache(key, value.clone());
                self.maybe_evict();
                Ok(Some(value))
            },
            None => Ok(None),
        }
    }

    /// Whether `key` currently has a value. Consults the same three layers
    /// as [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`get`](Self::get).
    pub async fn has(&mut self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Sets `key` to an encoded value.
    ///
    /// Attached, the write lands in the pending overlay and a Set op is
    /// submitted; detached, it is recorded directly as an acked change with
    /// a synthetic sequence number. Either way the local client's own reads
    /// see it immediately.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidKey`](crate::MapError::InvalidKey) for the
    /// empty key; no state changes.
    pub fn set(&mut self, key: &str, value: Bytes) -> Result<()> {
        validate_key(key).context(InvalidKeySnafu)?;
        if self.runtime.is_attached() {
            self.pending.set(key, value.clone());
            self.runtime.submit_local_op(Op::Set { key: key.to_string(), value });
        } else {
            self.sequenced.set(key, value, DETACHED_SEQ);
        }
        self.emit(MapEvent::ValueChanged { key: key.to_string(), local: true });
        Ok(())
    }

    /// Deletes `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidKey`](crate::MapError::InvalidKey) for the
    /// empty key; no state changes.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        validate_key(key).context(InvalidKeySnafu)?;
        if self.runtime.is_attached() {
            self.pending.delete(key);
            self.runtime.submit_local_op(Op::Delete { key: key.to_string() });
        } else {
            self.sequenced.delete(key, DETACHED_SEQ);
        }
        self.emit(MapEvent::ValueChanged { key: key.to_string(), local: true });
        Ok(())
    }

    /// Removes every entry.
    ///
    /// Attached, a Clear op is submitted and the pending overlay records the
    /// clear; detached, the tree and the sequenced cache are emptied on the
    /// spot.
    pub fn clear(&mut self) {
        if self.runtime.is_attached() {
            self.pending.clear();
            self.runtime.submit_local_op(Op::Clear);
        } else {
            self.tree = self.tree.clear();
            self.sequenced.clear();
        }
        self.emit(MapEvent::Cleared { local: true });
    }

    /// Applies one sequenced op from the ordering service.
    ///
    /// `local` marks ops this client submitted itself: their effects were
    /// already announced at issue time, so applying them acks the pending
    /// overlay instead of emitting another event.
    pub fn process(&mut self, sequence: SequenceNumber, op: Op, local: bool) {
        match op {
            Op::Set { key, value } => {
                self.sequenced.set(&key, value, sequence);
                if local {
                    self.pending.ack_modify(&key);
                } else {
                    self.emit(MapEvent::ValueChanged { key, local: false });
                }
            },
            Op::Delete { key } => {
                self.sequenced.delete(&key, sequence);
                if local {
                    self.pending.ack_modify(&key);
                } else {
                    self.emit(MapEvent::ValueChanged { key, local: false });
                }
            },
            Op::Clear => {
                self.tree = self.tree.clear();
                self.sequenced.clear();
                if local {
                    self.pending.ack_clear();
                } else {
                    self.emit(MapEvent::Cleared { local: false });
                }
            },
            Op::Flush { update, ref_sequence_number } => {
                if local && self.flush_state == FlushState::AwaitingAck {
                    self.flush_state = FlushState::Idle;
                }
                if ref_sequence_number > self.last_flush_ref_seq {
                    self.last_flush_ref_seq = ref_sequence_number;
                    self.sequenced.flush(ref_sequence_number);
                    self.tree = self.tree.update(&update);
                    self.maybe_evict();
                    self.emit(MapEvent::Flushed { is_leader: self.is_leader });
                } else {
                    // A former leader's concurrent flush; the newer tree
                    // already covers it.
                    tracing::debug!(
                        ref_seq = ref_sequence_number,
                        adopted = self.last_flush_ref_seq,
                        "ignoring stale concurrent flush"
                    );
                }
            },
        }
    }

    /// Applies one sequenced op and, after any non-Flush op, re-evaluates
    /// the flush conditions while this client leads.
    pub async fn apply(&mut self, sequence: SequenceNumber, op: Op, local: bool) {
        let is_flush = matches!(op, Op::Flush { .. });
        self.process(sequence, op, local);
        if !is_flush && self.needs_flush() {
            self.flush_if_needed().await;
        }
    }

    /// Consumes a promotion signal: this client is now the oldest quorum
    /// member. Promotion re-checks the flush gate, so the caller should
    /// invoke [`flush_if_needed`](Self::flush_if_needed) afterwards.
    pub fn promote(&mut self) {
        self.is_leader = true;
    }

    /// Consumes a demotion signal. A flush already uploading completes and
    /// submits; the reference-sequence filter resolves any race with the new
    /// leader's flushes.
    pub fn demote(&mut self) {
        self.is_leader = false;
    }

    /// Whether this client currently leads.
    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// Whether the flush conditions hold: leader, attached, enough
    /// unflushed changes, and no flush already in flight.
    pub fn needs_flush(&self) -> bool {
        self.is_leader
            && self.runtime.is_attached()
            && self.flush_state == FlushState::Idle
            && self.sequenced.unflushed_change_count() > self.config.flush_threshold
    }

    /// Starts a flush if the conditions hold; returns whether a flush op was
    /// submitted.
    ///
    /// Collapses the sequenced ops into a last-writer-wins batch, uploads
    /// the rebuilt chunks, and submits a Flush op referencing the last
    /// sequence number already incorporated. An upload failure abandons the
    /// attempt without touching local state; the next applied op re-opens
    /// the gate.
    pub async fn flush_if_needed(&mut self) -> bool {
        if !self.needs_flush() {
            return false;
        }
        debug_assert!(self.is_leader, "a non-leader must never start a flush");
        self.flush_state = FlushState::Uploading;
        self.emit(MapEvent::StartFlush);

        let ref_seq = self.runtime.last_sequence_number();
        let (updates, deletes) = self.sequenced.get_flushable_changes();
        tracing::debug!(
            updates = updates.len(),
            deletes = deletes.len(),
            ref_seq,
            "starting flush"
        );
        match self.tree.flush(&updates, &deletes, &self.store).await {
            Ok(delta) => {
                self.runtime.submit_local_op(Op::Flush {
                    update: delta,
                    ref_sequence_number: ref_seq,
                });
                self.flush_state = FlushState::AwaitingAck;
                true
            },
            Err(error) => {
                tracing::warn!(%error, "chunk upload failed; abandoning flush");
                self.flush_state = FlushState::Idle;
                false
            },
        }
    }

    /// Whether a flush is currently in flight (uploading or awaiting its
    /// op).
    pub fn flush_in_flight(&self) -> bool {
        self.flush_state != FlushState::Idle
    }

    /// Packs the map's content and unflushed changes into an attach-time
    /// summary with an inline root. Nothing is uploaded; the map is
    /// guaranteed small at attach.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Tree`](crate::MapError::Tree) if the tree is not
    /// fully resident and [`MapError::Codec`](crate::MapError::Codec) if
    /// encoding fails.
    pub fn attach_summary(&self) -> Result<Vec<u8>> {
        let (updates, deletes) = self.sequenced.get_flushable_changes();
        let leaf = self.tree.flush_sync(&updates, &deletes).context(TreeSnafu)?;
        let summary = Summary {
            order: self.config.order,
            root: SummaryRoot::Inline(leaf),
            handles: Vec::new(),
        };
        hive_types::encode(&summary).context(CodecSnafu)
    }

    /// Captures the current tree as a summary blob: by root handle when the
    /// tree is persisted, as an inline leaf when fully resident.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`attach_summary`](Self::attach_summary).
    pub fn summarize(&self) -> Result<Vec<u8>> {
        let summary = self.tree.to_summary().context(TreeSnafu)?;
        hive_types::encode(&summary).context(CodecSnafu)
    }

    /// Hydrates the map from a summary blob.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Codec`](crate::MapError::Codec) for undecodable
    /// bytes and [`MapError::Tree`](crate::MapError::Tree) for an invalid
    /// summarized order.
    pub fn load(&mut self, summary_bytes: &[u8]) -> Result<()> {
        let summary: Summary = hive_types::decode(summary_bytes).context(CodecSnafu)?;
        self.tree = ChunkedBTree::from_summary(&summary).context(TreeSnafu)?;
        Ok(())
    }

    /// Enumerates every chunk handle reachable from the tree: the map's
    /// contribution to the host's GC roots.
    pub fn gc_handles(&self) -> Vec<Handle> {
        self.tree.all_handles().collect()
    }

    /// Number of keys with unflushed acked changes.
    pub fn unflushed_change_count(&self) -> usize {
        self.sequenced.unflushed_change_count()
    }

    /// Resident working set: cached sequenced entries plus materialized
    /// tree keys.
    pub fn working_set_size(&self) -> usize {
        self.sequenced.len() + self.tree.working_set_size()
    }

    /// Applies the eviction policy: when the working set exceeds the cache
    /// size hint and enough of it is evictable, free half the hint from the
    /// sequenced cache (insertion order, modified keys pinned) and ask the
    /// tree to release the same amount.
    fn maybe_evict(&mut self) {
        let hint = self.config.cache_size_hint;
        if self.working_set_size() <= hint {
            return;
        }
        if self.sequenced.evictable_len() <= hint / 2 {
            return;
        }
        let target = hint / 2;
        let freed = self.sequenced.evict(target);
        self.tree.evict(target);
        tracing::debug!(freed, target, "evicted cold cache entries");
    }

    fn emit(&self, event: MapEvent) {
        // Nothing subscribed is fine; events are best-effort notifications.
        let _ = self.events.send(event);
    }
}
