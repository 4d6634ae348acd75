//! Event loop glue
//!
//! The wire runtime and the host toolkit usually live on other threads or in
//! other loops. They feed the core through a [`calloop::channel`] and the
//! embedder drives [`CompositorLoop::dispatch`] from its main loop.

use std::time::Duration;

use anyhow::Context;
use calloop::channel::{self, Channel, Sender};
use calloop::{EventLoop, LoopHandle};

use crate::host::{Host, HostEvent};
use crate::protocol::{ClientId, Request};
use crate::registry::ObjectRegistry;
use crate::state::Compositor;

/// Work delivered to the core
#[derive(Debug, Clone, PartialEq)]
pub enum LoopMessage {
    ClientConnected(ClientId),
    Request(ClientId, Request),
    ClientDisconnected(ClientId),
    Host(HostEvent),
}

pub struct CompositorLoop<R: ObjectRegistry + 'static, H: Host + 'static> {
    event_loop: EventLoop<'static, Compositor<R, H>>,
    sender: Sender<LoopMessage>,
}

impl<R: ObjectRegistry + 'static, H: Host + 'static> CompositorLoop<R, H> {
    pub fn new() -> anyhow::Result<Self> {
        let event_loop: EventLoop<Compositor<R, H>> =
            EventLoop::try_new().context("failed to create event loop")?;
        let (sender, receiver): (Sender<LoopMessage>, Channel<LoopMessage>) = channel::channel();

        event_loop
            .handle()
            .insert_source(receiver, |event, _, compositor| match event {
                channel::Event::Msg(message) => handle_message(compositor, message),
                channel::Event::Closed => {
                    tracing::debug!("all loop senders dropped");
                }
            })
            .map_err(|e| anyhow::anyhow!("failed to insert message channel: {}", e.error))?;

        Ok(Self { event_loop, sender })
    }

    /// Handle for producers on other threads
    pub fn sender(&self) -> Sender<LoopMessage> {
        self.sender.clone()
    }

    /// Handle for registering further sources, such as client sockets
    pub fn handle(&self) -> LoopHandle<'static, Compositor<R, H>> {
        self.event_loop.handle()
    }

    /// Flush pending events, wait up to `timeout` for work, process it and
    /// flush again
    pub fn dispatch(&mut self, compositor: &mut Compositor<R, H>, timeout: Option<Duration>) -> anyhow::Result<()> {
        compositor.flush();
        self.event_loop
            .dispatch(timeout, compositor)
            .context("event loop dispatch failed")?;
        compositor.flush();
        Ok(())
    }
}

fn handle_message<R: ObjectRegistry, H: Host>(compositor: &mut Compositor<R, H>, message: LoopMessage) {
    match message {
        LoopMessage::ClientConnected(client) => compositor.client_connected(client),
        LoopMessage::Request(client, request) => {
            let target = request.target();
            if target.client != client {
                tracing::warn!(%client, %target, "request addressed to another client's object");
                return;
            }
            compositor.handle_request(request);
        }
        LoopMessage::ClientDisconnected(client) => compositor.client_disconnected(client),
        LoopMessage::Host(event) => compositor.handle_host_event(event),
    }
}
