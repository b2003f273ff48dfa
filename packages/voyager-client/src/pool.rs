//! Reference-counted connection pool keyed by `host:port`.
//!
//! Adapted from the teacher's `ConnectionRegistry`/`ConnectionHandle`
//! (`network/connection.rs`): the same "handle wraps a transport plus
//! shared state, registry tracks handles by key" shape, but reworked for
//! the pool's specific invariants. `ConnectionRegistry` uses a `DashMap`
//! because its registry never dials anything itself -- it just tracks
//! connections established elsewhere. This pool's `Get` must double-check
//! for a concurrent dial under one lock (§4.9: "a connection is never
//! dialed twice for the same address concurrently"), which a sharded map's
//! independent per-shard locks cannot guarantee; a plain
//! `RwLock<HashMap<..>>` gives the same single-writer guarantee `RegistryCore`
//! relies on for its own "write lock, recheck, then act" pattern.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tracing::{debug, warn};

use crate::error::ClientError;

const MONITOR_PERIOD: Duration = Duration::from_secs(30);

/// Sentinel refcount value meaning "claimed for closing, no longer
/// acquirable". Never a real refcount: `acquire`/`release` only ever see
/// real counts, since reaching this value requires winning a CAS from 0
/// that every `acquire` call is excluded from by the same CAS loop.
const CLOSING: usize = usize::MAX;

/// A shared transport connection plus a reference count.
///
/// Invariant: the underlying socket is closed exactly once, the first time
/// the refcount reaches zero after having been positive. New acquisitions
/// after close dial a fresh connection under a new `PooledConnection`.
#[derive(Debug)]
pub struct PooledConnection {
    address: String,
    stream: AsyncMutex<TcpStream>,
    refcount: AtomicUsize,
    closed: AtomicBool,
}

impl PooledConnection {
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn ref_count(&self) -> usize {
        match self.refcount.load(Ordering::Acquire) {
            CLOSING => 0,
            n => n,
        }
    }

    /// Exposes the raw stream for a caller to read/write its own RPC.
    /// Held only for the duration of one call; concurrent users serialize
    /// on the inner async mutex, matching the wire protocol's own
    /// one-request-at-a-time discipline over a single socket.
    pub async fn with_stream<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut TcpStream) -> T,
    {
        let mut guard = self.stream.lock().await;
        f(&mut guard)
    }

    /// Increments the refcount, unless the connection has been claimed for
    /// closing. Returns `false` in that case -- the caller must dial a
    /// fresh connection rather than hand out this one.
    fn acquire(&self) -> bool {
        loop {
            let current = self.refcount.load(Ordering::Acquire);
            if current == CLOSING {
                return false;
            }
            if self
                .refcount
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn release(&self) {
        self.refcount.fetch_sub(1, Ordering::AcqRel);
    }

    /// Atomically claims this connection for closing if its refcount is
    /// currently zero, transitioning it to the terminal `CLOSING` state.
    /// Once this succeeds, every future `acquire` call fails -- there is no
    /// window between "monitor decided to close" and "caller acquired the
    /// about-to-close connection", because both go through this same CAS.
    fn try_claim_for_close(&self) -> bool {
        self.refcount
            .compare_exchange(0, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    async fn close_once(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let mut guard = self.stream.lock().await;
            if let Err(err) = guard.shutdown().await {
                warn!(address = %self.address, %err, "error shutting down pooled connection");
            }
        }
    }
}

/// Mapping `address -> PooledConnection`, reclaiming idle entries via a
/// per-connection monitor task.
///
/// Each slot is a `tokio::sync::OnceCell`: concurrent `Get` calls for an
/// address with no existing entry race to insert the *cell*, but only the
/// winner's closure actually dials -- every other caller's
/// `get_or_try_init` waits on that same in-flight dial and receives its
/// result. This is what makes "two concurrent `Get(A)` calls produce
/// exactly one dial" (§8) hold; a plain check-then-insert under the write
/// lock would let both callers dial before either observes the other's
/// insert.
pub struct ConnectionPool {
    entries: RwLock<HashMap<String, Arc<OnceCell<Arc<PooledConnection>>>>>,
    connect_timeout: Duration,
}

impl ConnectionPool {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            connect_timeout,
        })
    }

    /// Returns the pooled connection for `address`, dialing one if absent.
    ///
    /// A cached connection can be claimed for closing by the monitor task
    /// between `get_or_try_init` returning it and this call's `acquire`
    /// running. When that happens the slot is stale: it is dropped (if it
    /// still points at the connection we just saw) and the dial is retried,
    /// so `Get` never hands back a connection that is already closed or
    /// closing.
    pub async fn get(self: &Arc<Self>, address: &str) -> Result<Arc<PooledConnection>, ClientError> {
        loop {
            let cell = {
                let mut entries = self.entries.write();
                let slot = entries
                    .entry(address.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new()));
                Arc::clone(slot)
            };

            let connect_timeout = self.connect_timeout;
            let pool = Arc::clone(self);
            let addr_owned = address.to_string();
            let conn = cell
                .get_or_try_init(|| async move {
                    let stream =
                        tokio::time::timeout(connect_timeout, TcpStream::connect(&addr_owned))
                            .await
                            .map_err(|_| ClientError::Timeout)?
                            .map_err(|err| ClientError::Connect {
                                addr: addr_owned.clone(),
                                source: err,
                            })?;

                    let conn = Arc::new(PooledConnection {
                        address: addr_owned.clone(),
                        stream: AsyncMutex::new(stream),
                        refcount: AtomicUsize::new(0),
                        closed: AtomicBool::new(false),
                    });
                    tokio::spawn(monitor(pool, addr_owned, Arc::clone(&conn)));
                    Ok::<_, ClientError>(conn)
                })
                .await?;

            if conn.acquire() {
                return Ok(Arc::clone(conn));
            }

            let mut entries = self.entries.write();
            if let Some(current) = entries.get(address) {
                if Arc::ptr_eq(current, &cell) {
                    entries.remove(address);
                }
            }
        }
    }

    /// Decrements the refcount for `address`, if present. A no-op if the
    /// connection has already been reclaimed.
    pub fn release(&self, address: &str) {
        if let Some(conn) = self.entries.read().get(address).and_then(|cell| cell.get()) {
            conn.release();
        }
    }

    /// The current refcount for `address`, or 0 if not pooled. Used by the
    /// least-connections load balancer.
    #[must_use]
    pub fn connection_count(&self, address: &str) -> usize {
        self.entries
            .read()
            .get(address)
            .and_then(|cell| cell.get())
            .map_or(0, |conn| conn.ref_count())
    }

    /// Closes and removes every pooled connection.
    pub async fn close(&self) {
        let drained: Vec<_> = self
            .entries
            .write()
            .drain()
            .filter_map(|(_, cell)| cell.get().cloned())
            .collect();
        for conn in drained {
            conn.close_once().await;
        }
    }
}

/// Wakes every 30 seconds; if the connection is idle (refcount zero), tries
/// to atomically claim it for closing via `try_claim_for_close`. That CAS is
/// the single arbiter between this monitor and every concurrent `Get`: once
/// it succeeds, no `acquire` can revive the connection, so there is no
/// window left in which `Get` could hand out a connection this monitor is
/// about to close. An opportunistic reclaim, not a strict eviction deadline.
async fn monitor(pool: Arc<ConnectionPool>, address: String, conn: Arc<PooledConnection>) {
    loop {
        tokio::time::sleep(MONITOR_PERIOD).await;

        if conn.ref_count() != 0 {
            continue;
        }
        if !conn.try_claim_for_close() {
            continue;
        }

        {
            let mut entries = pool.entries.write();
            match entries.get(&address).and_then(|cell| cell.get()) {
                Some(current) if Arc::ptr_eq(current, &conn) => {
                    entries.remove(&address);
                }
                _ => debug!(%address, "pool entry already replaced, closing stale connection anyway"),
            }
        }

        debug!(%address, "reclaiming idle pooled connection");
        conn.close_once().await;
        return;
    }
}
