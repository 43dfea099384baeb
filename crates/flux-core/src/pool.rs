//! Bounded, FIFO-fair pool of reusable resource handles.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};

use flux_domain::{HandleStatus, PoolCounts};

use crate::errors::PoolError;

#[async_trait]
pub trait HandleFactory: Send + Sync {
    type Handle: Send + Sync;

    async fn open(&self) -> Result<Self::Handle, PoolError>;
    async fn close(&self, handle: Self::Handle);
    /// Default assumes every handle stays healthy; drivers that can
    /// detect a dead connection override this.
    async fn is_alive(&self, _handle: &Self::Handle) -> bool {
        true
    }
}

struct Slot<H> {
    handle: Option<H>,
    status: HandleStatus,
}

struct Inner<H> {
    slots: Vec<Slot<H>>,
    waiters: VecDeque<oneshot::Sender<usize>>,
    closed: bool,
}

pub struct Pool<F: HandleFactory> {
    name: String,
    factory: F,
    pool_size: usize,
    inner: Mutex<Inner<F::Handle>>,
}

impl<F: HandleFactory + 'static> Pool<F> {
    pub fn new(name: impl Into<String>, factory: F, pool_size: usize) -> Self {
        Self {
            name: name.into(),
            factory,
            pool_size,
            inner: Mutex::new(Inner { slots: Vec::new(), waiters: VecDeque::new(), closed: false }),
        }
    }

    /// Eagerly opens `pool_size` handles.
    pub async fn initialize(&self) -> Result<(), PoolError> {
        let mut opened = Vec::with_capacity(self.pool_size);
        for _ in 0..self.pool_size {
            opened.push(Slot { handle: Some(self.factory.open().await?), status: HandleStatus::Idle });
        }
        let mut inner = self.inner.lock().await;
        inner.slots = opened;
        Ok(())
    }

    pub async fn counts(&self) -> PoolCounts {
        let inner = self.inner.lock().await;
        let mut counts = PoolCounts { idle: 0, in_use: 0, broken: 0, pool_size: self.pool_size };
        for slot in &inner.slots {
            match slot.status {
                HandleStatus::Idle => counts.idle += 1,
                HandleStatus::InUse => counts.in_use += 1,
                HandleStatus::Broken => counts.broken += 1,
            }
        }
        counts
    }

    /// Blocks (cooperatively, FIFO) until a handle is free, returning a
    /// scoped guard whose `Drop` releases the handle on every exit path,
    /// including task cancellation.
    pub async fn acquire(self: &Arc<Self>) -> Result<PoolGuard<F>, PoolError> {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if inner.closed {
                    return Err(PoolError::Exhausted(self.name.clone()));
                }
                if inner.waiters.is_empty() {
                    if let Some(index) = find_idle(&inner.slots) {
                        inner.slots[index].status = HandleStatus::InUse;
                        let handle = inner.slots[index].handle.take();
                        return Ok(PoolGuard { pool: Arc::clone(self), index, handle, released: false });
                    }
                }
            }

            let (tx, rx) = oneshot::channel();
            {
                let mut inner = self.inner.lock().await;
                inner.waiters.push_back(tx);
            }
            match rx.await {
                Ok(index) => {
                    let mut inner = self.inner.lock().await;
                    let handle = inner.slots[index].handle.take();
                    return Ok(PoolGuard { pool: Arc::clone(self), index, handle, released: false });
                }
                Err(_) => continue,
            }
        }
    }

    async fn release(&self, index: usize, handle: Option<F::Handle>) {
        let mut inner = self.inner.lock().await;
        let alive = match &handle {
            Some(h) => self.factory.is_alive(h).await,
            None => false,
        };

        if alive {
            inner.slots[index].handle = handle;
            inner.slots[index].status = HandleStatus::Idle;
        } else {
            inner.slots[index].status = HandleStatus::Broken;
            if let Some(h) = handle {
                self.factory.close(h).await;
            }
            if let Ok(fresh) = self.factory.open().await {
                inner.slots[index].handle = Some(fresh);
                inner.slots[index].status = HandleStatus::Idle;
            }
        }

        while let Some(waiter) = inner.waiters.pop_front() {
            if inner.slots[index].status != HandleStatus::Idle {
                break;
            }
            inner.slots[index].status = HandleStatus::InUse;
            if waiter.send(index).is_ok() {
                break;
            }
            inner.slots[index].status = HandleStatus::Idle;
        }
    }

    /// Closes all idle handles; outstanding acquirers still release
    /// normally, their handles closed as they come back.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        for slot in &mut inner.slots {
            if slot.status == HandleStatus::Idle {
                if let Some(handle) = slot.handle.take() {
                    self.factory.close(handle).await;
                }
            }
        }
    }
}

fn find_idle<H>(slots: &[Slot<H>]) -> Option<usize> {
    slots.iter().position(|s| s.status == HandleStatus::Idle)
}

/// RAII guard: release is unconditional, including on cancellation, so
/// every `acquire()` site is automatically a scoped-acquisition idiom.
pub struct PoolGuard<F: HandleFactory + 'static> {
    pool: Arc<Pool<F>>,
    index: usize,
    handle: Option<F::Handle>,
    released: bool,
}

impl<F: HandleFactory + 'static> PoolGuard<F> {
    pub fn handle(&self) -> &F::Handle {
        self.handle.as_ref().expect("handle present while guard is held")
    }

    pub fn handle_mut(&mut self) -> &mut F::Handle {
        self.handle.as_mut().expect("handle present while guard is held")
    }

    /// Marks the handle broken so release discards and replaces it
    /// instead of returning it to the idle set.
    pub fn mark_broken(&mut self) {
        self.handle = None;
    }
}

impl<F: HandleFactory + 'static> Drop for PoolGuard<F> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let pool = Arc::clone(&self.pool);
        let index = self.index;
        let handle = self.handle.take();
        tokio::spawn(async move {
            pool.release(index, handle).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFactory {
        opened: AtomicUsize,
    }

    #[async_trait]
    impl HandleFactory for CountingFactory {
        type Handle = usize;

        async fn open(&self) -> Result<usize, PoolError> {
            Ok(self.opened.fetch_add(1, Ordering::SeqCst))
        }

        async fn close(&self, _handle: usize) {}
    }

    #[tokio::test]
    async fn acquire_blocks_until_release() {
        let pool = Arc::new(Pool::new("test", CountingFactory { opened: AtomicUsize::new(0) }, 1));
        pool.initialize().await.unwrap();

        let guard = pool.acquire().await.unwrap();
        let counts = pool.counts().await;
        assert_eq!(counts.in_use, 1);
        drop(guard);

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let counts = pool.counts().await;
        assert_eq!(counts.idle, 1);
    }

    #[tokio::test]
    async fn invariant_never_exceeds_pool_size() {
        let pool = Arc::new(Pool::new("test", CountingFactory { opened: AtomicUsize::new(0) }, 2));
        pool.initialize().await.unwrap();
        let counts = pool.counts().await;
        assert!(counts.invariant_holds());
        assert_eq!(counts.idle, 2);
    }
}
