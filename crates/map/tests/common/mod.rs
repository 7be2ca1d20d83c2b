//! Shared multi-client test harness.
//!
//! Fakes the host ordering service: each client's map submits local ops into
//! a per-client outbox, and the cluster assigns sequence numbers and delivers
//! every op to every client in the same order, the way the real service
//! would.

#![allow(dead_code)]

use std::{collections::VecDeque, sync::Arc};

use bytes::Bytes;
use hive_map::{PartialMap, Runtime};
use hive_store::MemoryBlobStore;
use hive_types::{MapConfig, Op, SequenceNumber};
use parking_lot::Mutex;

#[derive(Default)]
struct RuntimeInner {
    attached: bool,
    last_seq: SequenceNumber,
    outbox: VecDeque<Op>,
}

/// Host runtime fake shared between a map and the cluster.
#[derive(Clone, Default)]
pub struct HostRuntime {
    inner: Arc<Mutex<RuntimeInner>>,
}

impl HostRuntime {
    pub fn attached() -> Self {
        let runtime = Self::default();
        runtime.inner.lock().attached = true;
        runtime
    }

    pub fn detached() -> Self {
        Self::default()
    }

    pub fn set_attached(&self, attached: bool) {
        self.inner.lock().attached = attached;
    }

    pub fn pop_op(&self) -> Option<Op> {
        self.inner.lock().outbox.pop_front()
    }

    pub fn queued_ops(&self) -> usize {
        self.inner.lock().outbox.len()
    }

    fn set_last_seq(&self, seq: SequenceNumber) {
        self.inner.lock().last_seq = seq;
    }
}

impl Runtime for HostRuntime {
    fn submit_local_op(&self, op: Op) {
        self.inner.lock().outbox.push_back(op);
    }

    fn is_attached(&self) -> bool {
        self.inner.lock().attached
    }

    fn last_sequence_number(&self) -> SequenceNumber {
        self.inner.lock().last_seq
    }
}

pub type ClusterMap = PartialMap<Arc<MemoryBlobStore>, HostRuntime>;

struct Client {
    map: ClusterMap,
    runtime: HostRuntime,
}

/// A set of attached clients sharing one blob store and one total op order.
pub struct Cluster {
    pub store: Arc<MemoryBlobStore>,
    clients: Vec<Client>,
    next_seq: SequenceNumber,
}

impl Cluster {
    pub fn new(config: MapConfig, client_count: usize) -> Self {
        let store = Arc::new(MemoryBlobStore::new());
        let clients = (0..client_count)
            .map(|_| {
                let runtime = HostRuntime::attached();
                let map = PartialMap::new(config.clone(), Arc::clone(&store), runtime.clone())
                    .expect("create map");
                Client { map, runtime }
            })
            .collect();
        Self { store, clients, next_seq: 0 }
    }

    /// Adds a client hydrated from a summary blob.
    pub fn join_from_summary(&mut self, config: MapConfig, summary: &[u8]) -> usize {
        let runtime = HostRuntime::attached();
        let mut map = PartialMap::new(config, Arc::clone(&self.store), runtime.clone())
            .expect("create map");
        map.load(summary).expect("load summary");
        self.clients.push(Client { map, runtime });
        self.clients.len() - 1
    }

    pub fn client(&mut self, idx: usize) -> &mut ClusterMap {
        &mut self.clients[idx].map
    }

    /// Sequences the next queued op from `origin` and delivers it to every
    /// client. Returns false if the origin has nothing queued.
    pub async fn deliver_one_from(&mut self, origin: usize) -> bool {
        let Some(op) = self.clients[origin].runtime.pop_op() else {
            return false;
        };
        self.next_seq += 1;
        let seq = self.next_seq;
        for (idx, client) in self.clients.iter_mut().enumerate() {
            client.runtime.set_last_seq(seq);
            client.map.apply(seq, op.clone(), idx == origin).await;
        }
        true
    }

    /// Delivers every queued op from `origin` in submission order.
    pub async fn deliver_all_from(&mut self, origin: usize) -> usize {
        let mut delivered = 0;
        while self.deliver_one_from(origin).await {
            delivered += 1;
        }
        delivered
    }

    /// Round-robins delivery until every outbox is empty (including ops
    /// submitted while delivering, such as flush ops).
    pub async fn run_until_quiet(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            let mut progressed = false;
            for origin in 0..self.clients.len() {
                if self.deliver_one_from(origin).await {
                    delivered += 1;
                    progressed = true;
                }
            }
            if !progressed {
                return delivered;
            }
        }
    }
}

pub fn val(s: &str) -> Bytes {
    Bytes::from(s.to_string())
}
