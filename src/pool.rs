use crate::context::Context;

use http::Request;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

/// A bounded free list of [`Context`]s.
///
/// Contexts are handed out by [`acquire`](ContextPool::acquire) and come
/// back when the returned guard is dropped. A context is reset before it
/// re-enters the pool, including when the guard is dropped during a panic,
/// so nothing from one request is visible to the next.
#[derive(Debug)]
pub struct ContextPool {
    free: Mutex<Vec<Context>>,
    capacity: usize,
}

impl ContextPool {
    /// Creates a pool keeping at most `capacity` idle contexts.
    pub fn new(capacity: usize) -> Self {
        ContextPool {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Takes an idle context, or allocates one, and loads `request` into it.
    pub fn acquire(&self, request: Request<Vec<u8>>) -> PooledContext<'_> {
        let mut ctx = self.free.lock().pop().unwrap_or_default();
        ctx.load(request);
        PooledContext { ctx, pool: self }
    }

    fn release(&self, mut ctx: Context) {
        ctx.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(ctx);
        }
    }

    /// The number of contexts waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A context on loan from a [`ContextPool`].
#[derive(Debug)]
pub struct PooledContext<'a> {
    ctx: Context,
    pool: &'a ContextPool,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        let ctx = std::mem::take(&mut self.ctx);
        self.pool.release(ctx);
    }
}
