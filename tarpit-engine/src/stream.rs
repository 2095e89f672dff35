//! Slow streaming: the precomputed HTML chunks are emitted one at a time
//! with a deliberate sleep in between. Modeled as an explicit chunk
//! iterator plus a flush-and-sleep consumer per the coroutine/streaming
//! design note — no reliance on a particular async-stream macro. The
//! global and per-source semaphore permits are held for the stream's
//! lifetime; dropping the stream (client disconnect) releases them and
//! ends generation without error.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use dashmap::DashMap;
use futures_util::stream;
use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct TarpitConcurrency {
    global: Arc<Semaphore>,
    per_ip: DashMap<std::net::IpAddr, Arc<Semaphore>>,
    max_per_ip: usize,
}

impl TarpitConcurrency {
    pub fn new(max_global: usize, max_per_ip: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(max_global)),
            per_ip: DashMap::new(),
            max_per_ip,
        }
    }

    /// Acquire both permits, or `None` if either is saturated within a
    /// short bound (callers should respond 503 on `None`).
    pub async fn try_acquire(
        &self,
        ip: std::net::IpAddr,
    ) -> Option<(OwnedSemaphorePermit, OwnedSemaphorePermit)> {
        let global_permit =
            tokio::time::timeout(Duration::from_millis(100), self.global.clone().acquire_owned())
                .await
                .ok()?
                .ok()?;

        let per_ip_sem = self
            .per_ip
            .entry(ip)
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_ip)))
            .clone();
        let ip_permit =
            tokio::time::timeout(Duration::from_millis(100), per_ip_sem.acquire_owned())
                .await
                .ok()?
                .ok()?;

        Some((global_permit, ip_permit))
    }
}

/// Build the streaming response body. `chunks` must already be fully
/// rendered (deterministic generation is synchronous); this only governs
/// pacing and permit lifetime.
pub fn stream_chunks(
    chunks: Vec<String>,
    min_delay_sec: f64,
    max_delay_sec: f64,
    permits: (OwnedSemaphorePermit, OwnedSemaphorePermit),
) -> Body {
    let state = (chunks.into_iter(), min_delay_sec, max_delay_sec, Some(permits));

    let byte_stream = stream::unfold(state, move |(mut iter, min_d, max_d, permits)| async move {
        let chunk = iter.next()?;
        let delay_sec = rand::thread_rng().gen_range(min_d..=max_d);
        tokio::time::sleep(Duration::from_secs_f64(delay_sec)).await;
        let bytes = bytes::Bytes::from(chunk.into_bytes());
        Some((
            Ok::<_, std::io::Error>(bytes),
            (iter, min_d, max_d, permits),
        ))
    });

    Body::from_stream(byte_stream)
}
