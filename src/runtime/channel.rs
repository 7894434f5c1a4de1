use std::{
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
};

use futures::future::BoxFuture;
use globset::{Glob, GlobMatcher};
use tokio::runtime::Handle;

use crate::{
    ProcflowError, Result,
    common::{BroadcastQueue, Shutdown},
    events::{Event, Log, Message},
    model::InstanceId,
};

const EVENT_QUEUE_SIZE: usize = 2048;
const LOG_QUEUE_SIZE: usize = 4096;

pub type EventHandler<T> = Arc<dyn Fn(&Event<T>) + Send + Sync>;
pub type AsyncEventHandler<T> = Arc<dyn Fn(&Event<T>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Channel traffic addressed to an instance and, optionally, a node.
pub trait Routed: Debug + Clone + Send + Sync + 'static {
    fn route(&self) -> (&str, &str);
}

impl Routed for Message {
    fn route(&self) -> (&str, &str) {
        (&self.iid, &self.nid)
    }
}

impl Routed for Log {
    fn route(&self) -> (&str, &str) {
        (&self.iid, &self.nid)
    }
}

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// glob over instance ids, eg. `order-*`
    pub iid: String,
    /// glob over node ids; workflow-level events carry an empty node id
    pub nid: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::new("*".to_string(), "*".to_string())
    }
}

impl ChannelOptions {
    pub fn new(
        iid: String,
        nid: String,
    ) -> Self {
        Self {
            iid,
            nid,
        }
    }

    pub fn with_iid(iid: String) -> Self {
        Self {
            iid,
            ..Self::default()
        }
    }

    pub fn with_nid(nid: String) -> Self {
        Self {
            nid,
            ..Self::default()
        }
    }
}

/// Handlers registered for one kind of traffic.
struct Subscribers<T> {
    inline: RwLock<Vec<EventHandler<T>>>,
    deferred: RwLock<Vec<AsyncEventHandler<T>>>,
}

impl<T: Routed> Subscribers<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inline: RwLock::new(Vec::new()),
            deferred: RwLock::new(Vec::new()),
        })
    }

    fn add(
        &self,
        handler: EventHandler<T>,
    ) {
        self.inline.write().unwrap_or_else(PoisonError::into_inner).push(handler);
    }

    fn add_async(
        &self,
        handler: AsyncEventHandler<T>,
    ) {
        self.deferred.write().unwrap_or_else(PoisonError::into_inner).push(handler);
    }

    /// Inline handlers run on the listener task in registration order; async
    /// handlers run one after another on a task of their own.
    fn deliver(
        &self,
        event: Event<T>,
        handle: &Handle,
    ) {
        let inline = self.inline.read().unwrap_or_else(PoisonError::into_inner).clone();
        for handler in &inline {
            handler(&event);
        }

        let deferred = self.deferred.read().unwrap_or_else(PoisonError::into_inner).clone();
        if !deferred.is_empty() {
            handle.spawn(async move {
                for handler in deferred {
                    handler(&event).await;
                }
            });
        }
    }
}

/// Fan-out of instance events and executor logs to registered handlers.
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,
    log_queue: Arc<BroadcastQueue<Event<Log>>>,

    events: Arc<Subscribers<Message>>,
    logs: Arc<Subscribers<Log>>,

    handle: Handle,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            event_queue: BroadcastQueue::new(EVENT_QUEUE_SIZE),
            log_queue: BroadcastQueue::new(LOG_QUEUE_SIZE),
            events: Subscribers::new(),
            logs: Subscribers::new(),
            handle,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn emit(
        &self,
        msg: Message,
    ) {
        self.event_queue.send(Event::new(&msg));
    }

    pub(crate) fn emit_log(
        &self,
        log: Log,
    ) {
        self.log_queue.send(Event::new(&log));
    }

    pub(crate) fn listen(&self) {
        let mut event_rx = self.event_queue.subscribe();
        let mut log_rx = self.log_queue.subscribe();
        let events = self.events.clone();
        let logs = self.logs.clone();
        let shutdown = self.shutdown.clone();
        let handle = self.handle.clone();

        self.handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(event) = event_rx.recv() => events.deliver(event, &handle),
                    Ok(log) = log_rx.recv() => logs.deliver(log, &handle),
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Instance and node id globs a subscription is limited to.
#[derive(Clone)]
struct Filter {
    iid: GlobMatcher,
    nid: GlobMatcher,
}

impl Filter {
    fn compile(options: &ChannelOptions) -> Result<Self> {
        let matcher = |pattern: &str| Glob::new(pattern).map(|g| g.compile_matcher()).map_err(|e| ProcflowError::Config(format!("bad glob '{}': {}", pattern, e)));
        Ok(Self {
            iid: matcher(&options.iid)?,
            nid: matcher(&options.nid)?,
        })
    }

    fn accepts<T: Routed>(
        &self,
        event: &Event<T>,
    ) -> bool {
        let (iid, nid) = event.inner().route();
        self.iid.is_match(iid) && self.nid.is_match(nid)
    }
}

/// Subscription handle filtering channel traffic by instance and node id.
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,
    filter: Filter,
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        Ok(Self {
            channel,
            filter: Filter::compile(&options)?,
        })
    }

    /// Register `f` for matching events that satisfy `wanted`.
    fn subscribe(
        &self,
        wanted: fn(&Message) -> bool,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let filter = self.filter.clone();
        self.channel.events.add(Arc::new(move |e| {
            if wanted(e.inner()) && filter.accepts(e) {
                f(e);
            }
        }));
    }

    pub fn on_complete(
        &self,
        f: impl Fn(InstanceId) + Send + Sync + 'static,
    ) {
        self.subscribe(|m| m.event.is_complete(), move |e| f(e.iid.clone()));
    }

    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        self.subscribe(|m| m.event.is_error(), f);
    }

    pub fn on_suspend(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        self.subscribe(|m| m.event.is_suspend(), f);
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        self.subscribe(|_| true, f);
    }

    pub fn on_log(
        &self,
        f: impl Fn(&Event<Log>) + Send + Sync + 'static,
    ) {
        let filter = self.filter.clone();
        self.channel.logs.add(Arc::new(move |e| {
            if filter.accepts(e) {
                f(e);
            }
        }));
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.channel.events.add_async(filtered_async(self.filter.clone(), f));
    }

    pub fn on_log_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Log>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.channel.logs.add_async(filtered_async(self.filter.clone(), f));
    }
}

fn filtered_async<T, F>(
    filter: Filter,
    f: F,
) -> AsyncEventHandler<T>
where
    T: Routed,
    F: Fn(&Event<T>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    Arc::new(move |e| if filter.accepts(e) { f(e) } else { Box::pin(async {}) })
}
