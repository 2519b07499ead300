use crate::error::{Error, Result};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::task::JoinHandle;

/// A single-assignment handle to the outcome of a network call.
///
/// The call is driven by a task on the runtime, which writes the result exactly once when the
/// remote stream terminates. Awaiting the handle yields that result. If the driving task is torn
/// down before writing (runtime shutdown, abort) the awaiting side observes [`Error::Cancelled`];
/// a panic inside the task is reported as [`Error::Infrastructure`] with the panic as its source.
#[derive(Debug)]
#[must_use = "a completion does nothing observable unless awaited"]
pub struct Completion<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> Completion<T> {
    pub(crate) fn spawn<F>(call: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(call),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(Error::Cancelled),
            Err(err) => Err(Error::Infrastructure(Box::new(err))),
        })
    }
}
