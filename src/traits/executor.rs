use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::{Result, RowForgeError};

/// Runs units of work on behalf of [`crate::AsyncDatabase`].
///
/// The host decides where work runs (a tokio runtime, a dedicated pool, a
/// game-server tick loop); the facade only submits.
pub trait TaskExecutor: Send + Sync + 'static {
    fn submit(&self, task: BoxFuture<'static, ()>);
}

impl TaskExecutor for tokio::runtime::Handle {
    fn submit(&self, task: BoxFuture<'static, ()>) {
        self.spawn(task);
    }
}

impl<E: TaskExecutor + ?Sized> TaskExecutor for Arc<E> {
    fn submit(&self, task: BoxFuture<'static, ()>) {
        (**self).submit(task)
    }
}

/// Handle to a submitted unit of work.
///
/// Resolves to the result of the work, or to
/// [`RowForgeError::TaskAborted`] if the executor dropped it. Dropping the
/// handle does not cancel the work; its failure is then lost.
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Takes the result if the work has finished, without waiting.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RowForgeError::TaskAborted)),
        }
    }

    /// Runs `callback` on `executor` once the work completes.
    pub fn on_complete<E, F>(self, executor: &E, callback: F)
    where
        E: TaskExecutor + ?Sized,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        executor.submit(Box::pin(async move {
            callback(self.await);
        }));
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RowForgeError::TaskAborted)))
    }
}

/// Submits `work` to `executor` and returns a handle to its result.
pub(crate) fn schedule<E, F, T>(executor: &E, work: F) -> TaskHandle<T>
where
    E: TaskExecutor + ?Sized,
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    executor.submit(Box::pin(async move {
        // The receiver may already be gone; the result is dropped with it.
        let _ = sender.send(work.await);
    }));
    TaskHandle { receiver }
}
