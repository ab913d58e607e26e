//! Configuration for pad background tasks.

/// Options for the worker thread started by [`Pad::start_task`].
///
/// [`Pad::start_task`]: crate::pad::Pad::start_task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskConfig {
    /// Thread name. Defaults to `"<node>:<pad>"`.
    pub name: Option<String>,
    /// Stack size in bytes; the platform default when `None`.
    pub stack_size: Option<usize>,
}

impl TaskConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the stack size.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub(crate) fn thread_name(&self, node: Option<&str>, pad: &str) -> String {
        match (&self.name, node) {
            (Some(name), _) => name.clone(),
            (None, Some(node)) => format!("{node}:{pad}"),
            (None, None) => pad.to_string(),
        }
    }
}
