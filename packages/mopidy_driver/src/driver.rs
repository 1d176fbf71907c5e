use correlator::{Paired, correlate};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::MopidyError;
use crate::message::MopidyMessage;
use crate::request::{Request, Scope};
use crate::session::MopidySession;

/// Item of a driver's data stream
#[derive(Clone, Debug, PartialEq)]
pub enum DriverData {
    /// Event whose name belongs to the driver's scope
    Event(MopidyMessage),
    /// Response paired with the request it answers
    Response {
        response: MopidyMessage,
        command: Request,
    },
}

/// Commands and data for one core controller over a shared session
#[derive(Clone)]
pub struct Driver {
    session: MopidySession,
    scope: Scope,
    max_pending: Option<usize>,
}

impl Driver {
    pub fn new(session: MopidySession, scope: Scope) -> Self {
        Self {
            session,
            scope,
            max_pending: None,
        }
    }

    /// Bound the queue of requests awaiting a response.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = Some(max_pending);
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn send(&self, request: Request) -> Result<(), MopidyError> {
        self.session.send(request)
    }

    /// Scope events merged with correlated responses.
    ///
    /// Subscribes immediately, so requests sent after this call are paired.
    pub fn data(&self) -> BoxStream<'static, Result<DriverData, MopidyError>> {
        let scope = self.scope;

        // Errors reach the caller through this half only
        let events = self
            .session
            .messages()
            .try_filter(move |msg| {
                future::ready(msg.event_name().is_some_and(|e| scope.matches_event(e)))
            })
            .map_ok(DriverData::Event);

        let replies = self
            .session
            .messages()
            .filter_map(|msg| future::ready(msg.ok()))
            .boxed();
        let commands = self.session.commands().map_ok(Some).boxed();

        let mut correlated = correlate(replies, commands, None, |p| {
            p.command.is_some() && p.reply.is_response()
        });
        if let Some(max) = self.max_pending {
            correlated = correlated.with_capacity(max);
        }
        let responses = correlated
            .try_filter_map(|Paired { reply, command }| {
                future::ready(Ok(command.map(|command| DriverData::Response {
                    response: reply,
                    command,
                })))
            })
            .map_err(|e| e.into_inner());

        stream::select(events, responses).boxed()
    }
}
