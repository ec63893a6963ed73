//! Main Queue - UI thread
//!
//! One dedicated thread runs dispatched closures in FIFO order.
//! Everything that touches a text surface goes through here.

use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

pub struct MainQueue {
    tx: Option<mpsc::Sender<Message>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl MainQueue {
    pub fn new() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Message>();
        let handle = thread::Builder::new()
            .name("main-queue".to_string())
            .spawn(move || {
                while let Ok(Message::Run(job)) = rx.recv() {
                    job();
                }
                log::debug!("Main queue stopped");
            })?;

        Ok(Self {
            tx: Some(tx),
            thread_id: handle.thread().id(),
            handle: Some(handle),
        })
    }

    /// Handle for dispatching from other threads
    pub fn handle(&self) -> MainHandle {
        MainHandle {
            tx: self.tx.clone(),
            thread_id: self.thread_id,
        }
    }

}

impl Drop for MainQueue {
    fn drop(&mut self) {
        // Handles may outlive the queue, so stop explicitly instead of waiting for disconnect
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Message::Stop);
        }
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Cloneable sender side of the main queue
#[derive(Clone)]
pub struct MainHandle {
    tx: Option<mpsc::Sender<Message>>,
    thread_id: ThreadId,
}

impl MainHandle {
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let sent = self.tx.as_ref().map(|tx| tx.send(Message::Run(Box::new(job))).is_ok());
        if sent != Some(true) {
            log::warn!("Main queue closed, job dropped");
        }
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn flush(&self) {
        if self.is_current() {
            return;
        }
        let (done_tx, done_rx) = mpsc::channel::<()>();
        self.dispatch(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;

    #[test]
    fn test_jobs_run_in_order_on_main_thread() {
        let queue = MainQueue::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handle = queue.handle();

        for i in 0..5 {
            let seen = seen.clone();
            let check = handle.clone();
            handle.dispatch(move || {
                assert!(check.is_current());
                seen.lock().push(i);
            });
        }
        handle.flush();

        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
        assert!(!handle.is_current());
    }
}
