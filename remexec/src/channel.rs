use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;
use tonic::{transport::Channel, Status};

/// A long-lived tonic channel with an orderly shutdown.
///
/// tonic channels close when the last clone is dropped and offer no way to wait for in-flight
/// calls. Every call made through a `ManagedChannel` holds a [`Lease`] for as long as its response
/// stream is alive; [`shutdown`](Self::shutdown) refuses new leases and
/// [`await_termination`](Self::await_termination) waits for the outstanding ones to drop.
#[derive(Clone, Debug)]
pub struct ManagedChannel {
    name: &'static str,
    channel: Channel,
    lifecycle: Arc<Lifecycle>,
}

#[derive(Debug, Default)]
struct Lifecycle {
    shut_down: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Keeps its channel from terminating until dropped.
#[derive(Debug)]
pub struct Lease {
    lifecycle: Arc<Lifecycle>,
}

impl ManagedChannel {
    pub fn new(name: &'static str, channel: Channel) -> Self {
        Self {
            name,
            channel,
            lifecycle: Arc::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Registers an in-flight call. Fails with `UNAVAILABLE` once shutdown has begun.
    pub fn lease(&self) -> Result<Lease, Status> {
        // count first, then check, so a concurrent shutdown either sees this lease or refuses it
        self.lifecycle.in_flight.fetch_add(1, SeqCst);
        let lease = Lease {
            lifecycle: self.lifecycle.clone(),
        };
        if self.lifecycle.shut_down.load(SeqCst) {
            return Err(Status::unavailable(format!(
                "{} channel is shut down",
                self.name
            )));
        }
        Ok(lease)
    }

    /// Stops accepting new calls. Calls already in flight run to completion.
    pub fn shutdown(&self) {
        self.lifecycle.shut_down.store(true, SeqCst);
        self.lifecycle.idle.notify_waiters();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifecycle.shut_down.load(SeqCst)
    }

    /// Waits up to `timeout` for the channel to terminate: shut down with no call in flight.
    /// Returns whether it terminated in time.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.terminated()).await.is_ok()
    }

    async fn terminated(&self) {
        loop {
            let idle = self.lifecycle.idle.notified();
            if self.lifecycle.shut_down.load(SeqCst) && self.lifecycle.in_flight.load(SeqCst) == 0
            {
                return;
            }
            idle.await;
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.lifecycle.in_flight.fetch_sub(1, SeqCst) == 1 {
            self.lifecycle.idle.notify_waiters();
        }
    }
}
