use std::{fmt::Debug, future::Future};

use tokio::task::{JoinError, JoinSet};

/// A set of concurrently running fallible tasks and the barrier that joins them
///
/// [`TaskGroup::join`] waits for every task to finish, even after one has failed, and reports
/// the first failure in completion order. Nothing is cancelled on failure; results that finish
/// after the first failure are discarded.
///
/// Dropping a group without joining it aborts the tasks still running.
#[derive(Debug)]
pub(crate) struct TaskGroup<T, E> {
    tasks: JoinSet<Result<T, E>>,
}

impl<T, E> TaskGroup<T, E>
where
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
        }
    }

    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for all tasks, returning every output in completion order or the first error
    pub(crate) async fn join(mut self) -> Result<Vec<T>, E> {
        let mut outputs = Vec::with_capacity(self.tasks.len());
        let mut first_error = None;
        while let Some(res) = self.tasks.join_next().await {
            match res.map_err(E::from).and_then(|output| output) {
                Ok(output) if first_error.is_none() => outputs.push(output),
                Ok(_) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }
}
