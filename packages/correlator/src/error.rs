/// Failure propagated from the command side of a correlated channel.
///
/// Wraps whatever error the command stream produced. Pairs emitted before the
/// failure have already been delivered when this is observed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError<E> {
    #[error("command stream failed: {0}")]
    CommandStream(E),
}

impl<E> CorrelationError<E> {
    pub fn into_inner(self) -> E {
        match self {
            CorrelationError::CommandStream(e) => e,
        }
    }
}
