use futures::stream::{FusedStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::CorrelationError;
use crate::queue::PendingCommandQueue;

/// A reply together with the command it was matched to (or the default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paired<R, C> {
    pub reply: R,
    pub command: C,
}

impl<R, C> Paired<R, C> {
    pub fn new(reply: R, command: C) -> Self {
        Self { reply, command }
    }
}

/// Stream returned by [`zip_one_way_with_default`].
///
/// Emits exactly one item per reply. Commands are only queued; they never
/// produce output on their own.
pub struct ZipOneWay<R, C, T> {
    replies: R,
    /// `None` once the command stream has completed.
    commands: Option<C>,
    queue: PendingCommandQueue<T>,
    default: T,
    finished: bool,
}

/// Pair every reply with the oldest command issued before it, or with
/// `default` when no command is pending.
///
/// All commands that are ready are drained into the queue before the reply
/// stream is polled, so a command observed before a reply is always available
/// to that reply.
///
/// Completion of `commands` does not end the output: later replies pair with
/// `default`. Completion of `replies` ends the output and discards whatever is
/// still queued. An error from `commands` is yielded once, after every pair
/// emitted so far, and then the stream ends.
pub fn zip_one_way_with_default<R, C, T, E>(replies: R, commands: C, default: T) -> ZipOneWay<R, C, T>
where
    R: Stream + Unpin,
    C: Stream<Item = Result<T, E>> + Unpin,
    T: Clone + Unpin,
{
    ZipOneWay {
        replies,
        commands: Some(commands),
        queue: PendingCommandQueue::new(),
        default,
        finished: false,
    }
}

/// [`zip_one_way_with_default`] followed by a caller-supplied filter.
///
/// The pairing is positional and cannot distinguish notifications from
/// replies; `accept` decides which pairs are genuine command responses.
/// Errors from the command stream always pass through.
pub fn correlate<R, C, T, E, F>(replies: R, commands: C, default: T, accept: F) -> Correlated<R, C, T, F>
where
    R: Stream + Unpin,
    C: Stream<Item = Result<T, E>> + Unpin,
    T: Clone + Unpin,
    F: FnMut(&Paired<R::Item, T>) -> bool + Unpin,
{
    Correlated {
        inner: zip_one_way_with_default(replies, commands, default),
        accept,
    }
}

/// Stream returned by [`correlate`]. Rejected pairs still consume their
/// command.
pub struct Correlated<R, C, T, F> {
    inner: ZipOneWay<R, C, T>,
    accept: F,
}

impl<R, C, T, F> Correlated<R, C, T, F> {
    /// See [`ZipOneWay::with_capacity`].
    pub fn with_capacity(mut self, max_pending: usize) -> Self {
        self.inner = self.inner.with_capacity(max_pending);
        self
    }

    pub fn pending(&self) -> usize {
        self.inner.pending()
    }

    pub fn evicted(&self) -> u64 {
        self.inner.evicted()
    }
}

impl<R, C, T, E, F> Stream for Correlated<R, C, T, F>
where
    R: Stream + Unpin,
    C: Stream<Item = Result<T, E>> + Unpin,
    T: Clone + Unpin,
    F: FnMut(&Paired<R::Item, T>) -> bool + Unpin,
{
    type Item = Result<Paired<R::Item, T>, CorrelationError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(pair))) => {
                    if (this.accept)(&pair) {
                        return Poll::Ready(Some(Ok(pair)));
                    }
                }
                other => return other,
            }
        }
    }
}

impl<R, C, T, E, F> FusedStream for Correlated<R, C, T, F>
where
    R: Stream + Unpin,
    C: Stream<Item = Result<T, E>> + Unpin,
    T: Clone + Unpin,
    F: FnMut(&Paired<R::Item, T>) -> bool + Unpin,
{
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl<R, C, T> ZipOneWay<R, C, T> {
    /// Bound the pending command queue. Intended to be called before the
    /// stream is first polled; anything already queued is discarded.
    pub fn with_capacity(mut self, max_pending: usize) -> Self {
        self.queue = PendingCommandQueue::with_capacity(max_pending);
        self
    }

    /// Number of commands waiting for a reply.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Commands dropped because the bounded queue was full.
    pub fn evicted(&self) -> u64 {
        self.queue.evicted()
    }
}

impl<R, C, T, E> Stream for ZipOneWay<R, C, T>
where
    R: Stream + Unpin,
    C: Stream<Item = Result<T, E>> + Unpin,
    T: Clone + Unpin,
{
    type Item = Result<Paired<R::Item, T>, CorrelationError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if let Some(commands) = this.commands.as_mut() {
            loop {
                match commands.poll_next_unpin(cx) {
                    Poll::Ready(Some(Ok(command))) => this.queue.push(command),
                    Poll::Ready(Some(Err(e))) => {
                        this.finished = true;
                        this.commands = None;
                        this.queue.clear();
                        return Poll::Ready(Some(Err(CorrelationError::CommandStream(e))));
                    }
                    Poll::Ready(None) => {
                        this.commands = None;
                        break;
                    }
                    Poll::Pending => break,
                }
            }
        }

        match this.replies.poll_next_unpin(cx) {
            Poll::Ready(Some(reply)) => {
                let command = this.queue.pop().unwrap_or_else(|| this.default.clone());
                Poll::Ready(Some(Ok(Paired { reply, command })))
            }
            Poll::Ready(None) => {
                this.finished = true;
                this.commands = None;
                this.queue.clear();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R, C, T, E> FusedStream for ZipOneWay<R, C, T>
where
    R: Stream + Unpin,
    C: Stream<Item = Result<T, E>> + Unpin,
    T: Clone + Unpin,
{
    fn is_terminated(&self) -> bool {
        self.finished
    }
}
