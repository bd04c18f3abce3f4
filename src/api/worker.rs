//! 后台任务句柄：事件通道 + 协作式取消

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Events that end a task. Exactly one is sent, always last.
pub trait TerminalEvent {
    fn is_terminal(&self) -> bool;
}

/// Shared cancel flag, checked by the task at its own pace.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a task running on its own thread.
pub struct WorkerHandle<E> {
    events: Receiver<E>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl<E: TerminalEvent + Send + 'static> WorkerHandle<E> {
    /// Run `task` on a named thread; it reports through the sender it is given.
    pub(crate) fn spawn<F>(name: &str, task: F) -> std::io::Result<Self>
    where
        F: FnOnce(Sender<E>, CancelToken) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || task(tx, token))?;
        Ok(Self {
            events: rx,
            cancel,
            thread: Some(thread),
        })
    }

    pub fn cancel(&self) {
        debug!("Cancellation requested");
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn try_recv(&self) -> Option<E> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<E> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until the task ends; returns every event in order.
    pub fn wait(mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.recv() {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        self.join();
        events
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("⚠️ Worker thread panicked");
            }
        }
    }
}

impl<E> Drop for WorkerHandle<E> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel.cancel();
            debug!("🗑️ WorkerHandle dropped; task signalled to stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestEvent {
        Tick(u32),
        Done,
        Stopped,
    }

    impl TerminalEvent for TestEvent {
        fn is_terminal(&self) -> bool {
            !matches!(self, TestEvent::Tick(_))
        }
    }

    #[test]
    fn test_wait_collects_until_terminal() {
        let handle = WorkerHandle::spawn("test-worker", |tx, _| {
            for i in 0..3 {
                let _ = tx.send(TestEvent::Tick(i));
            }
            let _ = tx.send(TestEvent::Done);
        })
        .unwrap();

        let events = handle.wait();
        assert_eq!(events.len(), 4);
        assert_eq!(events.last(), Some(&TestEvent::Done));
    }

    #[test]
    fn test_cancel_is_observed() {
        let handle = WorkerHandle::spawn("test-cancel", |tx, cancel| {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            let _ = tx.send(TestEvent::Stopped);
        })
        .unwrap();

        handle.cancel();
        assert_eq!(handle.wait(), vec![TestEvent::Stopped]);
    }

    #[test]
    fn test_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
