//! Background task of a pad.
//!
//! A pad can own one worker thread that repeatedly calls a function with
//! the pad's stream lock held. Sources use it to push data, sinks in pull
//! mode use it to pull. The task is started, paused and stopped from any
//! thread; pausing and stopping wait for the iteration in progress by
//! taking the stream lock, so they return only once the body is idle.
//!
//! Only `pause_task` may be called from inside the task body. Stopping
//! from inside would have to join the calling thread.

use super::{Pad, PadInner, StreamLock};
use crate::config::TaskConfig;
use crate::error::{Error, Result};
use crate::node::{NodeMessage, StreamStatus};
use crate::observability::span_pad;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};

/// State of a pad task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    /// The body runs in a loop.
    Started,
    /// The worker waits to be started again.
    Paused,
    /// The worker exits.
    #[default]
    Stopped,
}

type TaskFunction = Box<dyn FnMut(&Pad) + Send>;

struct Control {
    state: TaskState,
    func: Option<TaskFunction>,
    thread: Option<JoinHandle<()>>,
    thread_id: Option<ThreadId>,
}

struct TaskShared {
    control: Mutex<Control>,
    cond: Condvar,
    stream_lock: Arc<StreamLock>,
}

/// Worker thread bound to one pad.
pub(crate) struct Task {
    shared: Arc<TaskShared>,
    pad: Weak<PadInner>,
    config: TaskConfig,
    thread_name: String,
    node_name: String,
    pad_name: String,
}

impl Task {
    fn new(pad: &Pad, func: TaskFunction, config: TaskConfig) -> Self {
        let node = pad.parent();
        let node_name = node.as_ref().map(|n| n.name().to_string()).unwrap_or_default();
        let thread_name = config.thread_name(node.as_ref().map(|n| n.name()), pad.name());
        Self {
            shared: Arc::new(TaskShared {
                control: Mutex::new(Control {
                    state: TaskState::Stopped,
                    func: Some(func),
                    thread: None,
                    thread_id: None,
                }),
                cond: Condvar::new(),
                stream_lock: pad.stream_lock_handle().clone(),
            }),
            pad: pad.downgrade(),
            config,
            thread_name,
            node_name,
            pad_name: pad.name().to_string(),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        self.shared.control.lock().state
    }

    /// Change state, spawning the worker on the first start.
    pub(crate) fn set_state(&self, state: TaskState) -> Result<()> {
        let mut control = self.shared.control.lock();
        control.state = state;
        if state != TaskState::Stopped && control.thread.is_none() {
            if let Some(func) = control.func.take() {
                match self.spawn(func) {
                    Ok(handle) => {
                        control.thread_id = Some(handle.thread().id());
                        control.thread = Some(handle);
                    }
                    Err(err) => {
                        control.state = TaskState::Stopped;
                        return Err(err.into());
                    }
                }
            }
        }
        self.shared.cond.notify_all();
        Ok(())
    }

    fn spawn(&self, mut func: TaskFunction) -> std::io::Result<JoinHandle<()>> {
        let shared = Arc::clone(&self.shared);
        let pad = self.pad.clone();
        let mut builder = thread::Builder::new().name(self.thread_name.clone());
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }
        let span = span_pad(&self.node_name, &self.pad_name);
        builder.spawn(move || {
            let _entered = span.enter();
            post_status(&pad, StreamStatus::Enter);
            tracing::debug!(target: "padflow::pad", "task entered");
            run_loop(&shared, &pad, &mut func);
            post_status(&pad, StreamStatus::Leave);
            tracing::debug!(target: "padflow::pad", "task left");
        })
    }

    fn is_current_thread(&self) -> bool {
        self.shared.control.lock().thread_id == Some(thread::current().id())
    }

    /// Wait for the worker to exit. Fails when called from the worker.
    pub(crate) fn join(&self) -> Result<()> {
        if self.is_current_thread() {
            return Err(Error::task(
                &self.thread_name,
                "cannot join the task from its own thread",
            ));
        }
        let handle = self.shared.control.lock().thread.take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                return Err(Error::task(&self.thread_name, "task body panicked"));
            }
        }
        Ok(())
    }

    /// Stop and, unless on the worker thread, join.
    pub(crate) fn shutdown(self) {
        {
            let mut control = self.shared.control.lock();
            control.state = TaskState::Stopped;
            self.shared.cond.notify_all();
        }
        if !self.is_current_thread() {
            if let Err(err) = self.join() {
                tracing::warn!(target: "padflow::pad", %err, "task did not shut down cleanly");
            }
        }
    }
}

fn post_status(pad: &Weak<PadInner>, status: StreamStatus) {
    if let Some(pad) = Pad::from_weak(pad) {
        pad.post_message(NodeMessage::StreamStatus {
            status,
            pad: pad.name().to_string(),
        });
    }
}

fn run_loop(shared: &TaskShared, pad: &Weak<PadInner>, func: &mut TaskFunction) {
    loop {
        {
            let mut control = shared.control.lock();
            while control.state == TaskState::Paused {
                tracing::trace!(target: "padflow::pad", "task paused");
                shared.cond.wait(&mut control);
            }
            if control.state == TaskState::Stopped {
                return;
            }
        }

        let Some(pad) = Pad::from_weak(pad) else {
            return;
        };
        let guard = shared.stream_lock.lock();
        // Paused or stopped while waiting for the stream lock.
        if shared.control.lock().state != TaskState::Started {
            drop(guard);
            continue;
        }
        func(&pad);
        drop(guard);
    }
}

impl Pad {
    /// Start the pad task, creating it on first use.
    ///
    /// `func` runs in a loop with the stream lock held until the task is
    /// paused or stopped. Posts [`StreamStatus::Create`] when the task is
    /// created, then `Enter` and `Leave` from the worker thread.
    pub fn start_task<F>(&self, func: F) -> Result<()>
    where
        F: FnMut(&Pad) + Send + 'static,
    {
        self.start_task_with_config(func, TaskConfig::default())
    }

    /// [`start_task`](Self::start_task) with thread options.
    pub fn start_task_with_config<F>(&self, func: F, config: TaskConfig) -> Result<()>
    where
        F: FnMut(&Pad) + Send + 'static,
    {
        let mut state = self.lock();
        if state.task.is_none() {
            drop(state);
            let task = Task::new(self, Box::new(func), config);
            self.post_message(NodeMessage::StreamStatus {
                status: StreamStatus::Create,
                pad: self.name().to_string(),
            });
            state = self.lock();
            if state.task.is_none() {
                state.task = Some(task);
            }
        }
        tracing::debug!(target: "padflow::pad", pad = %self.name(), "starting task");
        match &state.task {
            Some(task) => task.set_state(TaskState::Started),
            None => Err(Error::task(self.name(), "task vanished while starting")),
        }
    }

    /// Pause the pad task and wait for the running iteration to finish.
    ///
    /// May be called from the task body.
    pub fn pause_task(&self) -> Result<()> {
        let state = self.lock();
        let Some(task) = &state.task else {
            tracing::debug!(target: "padflow::pad", pad = %self.name(), "pad has no task");
            return Err(Error::task(self.name(), "no task to pause"));
        };
        tracing::debug!(target: "padflow::pad", pad = %self.name(), "pausing task");
        task.set_state(TaskState::Paused)?;
        drop(state);
        // Wait for the body to leave the stream lock.
        drop(self.stream_lock());
        Ok(())
    }

    /// Stop the pad task and wait for the worker to exit.
    ///
    /// Fails when called from the task body; the task is kept in that case.
    /// Succeeds without a task.
    pub fn stop_task(&self) -> Result<()> {
        let mut state = self.lock();
        let Some(task) = state.task.take() else {
            return Ok(());
        };
        if task.is_current_thread() {
            tracing::warn!(target: "padflow::pad", pad = %self.name(), "cannot stop the task from its own thread");
            state.task = Some(task);
            return Err(Error::task(self.name(), "cannot stop the task from its own thread"));
        }
        tracing::debug!(target: "padflow::pad", pad = %self.name(), "stopping task");
        if let Err(err) = task.set_state(TaskState::Stopped) {
            state.task = Some(task);
            return Err(err);
        }
        drop(state);

        drop(self.stream_lock());

        if let Err(err) = task.join() {
            tracing::warn!(target: "padflow::pad", pad = %self.name(), %err, "failed to join task");
            let mut state = self.lock();
            if state.task.is_none() {
                state.task = Some(task);
            }
            return Err(err);
        }
        Ok(())
    }

    /// State of the pad task, `None` without a task.
    pub fn task_state(&self) -> Option<TaskState> {
        self.lock().task.as_ref().map(Task::state)
    }
}
