use thiserror::Error;

use super::{
    array::{ArrayId, ArrayUntyped},
    ops::{Access, ArrayIr},
};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue error: the worker has shut down")]
    Closed,
    #[error("queue error: array {0} registered for both read and write in one task")]
    WriteAlias(ArrayId),
}

/// A deferred unit of work: the action plus the dependency records that keep
/// the touched buffers alive until the action has run.
pub struct Task {
    action: Box<dyn FnOnce() + Send>,
    retained: Vec<(ArrayIr, ArrayUntyped)>,
}

enum QueueEvent {
    Dispatch { task: Task },
    Synchronize { sender: flume::Sender<()> },
}

/// A handle to one execution stream.
///
/// Tasks submitted to the same queue run strictly in submission order on a
/// dedicated worker, which is what orders every reader of an array after the
/// task that writes it. Once submitted, a task always runs to completion;
/// there is no cancellation.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    sender: flume::Sender<QueueEvent>,
}

impl CommandQueue {
    /// Spawns the worker and returns a handle to it.
    ///
    /// # Panics
    /// This method will panic if called outside of a `tokio` runtime.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        tokio::spawn(serve(receiver));
        Self { sender }
    }

    /// Starts encoding one task.
    pub fn encoder(&self) -> CommandEncoder {
        let sender = self.sender.clone();
        let retained = Vec::new();
        CommandEncoder { sender, retained }
    }

    /// Resolves once every previously submitted task has run.
    pub async fn synchronize(&self) -> Result<(), QueueError> {
        let (sender, receiver) = flume::bounded(0);
        self.sender
            .send(QueueEvent::Synchronize { sender })
            .map_err(|_| QueueError::Closed)?;
        receiver.recv_async().await.map_err(|_| QueueError::Closed)
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Records the dependencies of one task, then submits it.
///
/// Registration must happen before [`dispatch`](CommandEncoder::dispatch):
/// the registered handles ride along with the task so the buffers they own
/// outlive it, even if the caller drops its own handles right away.
pub struct CommandEncoder {
    sender: flume::Sender<QueueEvent>,
    retained: Vec<(ArrayIr, ArrayUntyped)>,
}

impl CommandEncoder {
    /// Registers `array` as a read dependency of the task being encoded.
    pub fn set_input_array(&mut self, array: &ArrayUntyped) {
        self.retained.push((array.ir(Access::ReadOnly), array.clone()));
    }

    /// Registers `array` as the write dependency of the task being encoded.
    ///
    /// Rejects arrays already registered for the same task: a task's written
    /// buffer must not alias anything else it touches.
    pub fn set_output_array(&mut self, array: &ArrayUntyped) -> Result<(), QueueError> {
        let ir = array.ir(Access::WriteOnly);
        if self.retained.iter().any(|(other, _)| other.id == ir.id) {
            return Err(QueueError::WriteAlias(ir.id));
        }
        self.retained.push((ir, array.clone()));
        Ok(())
    }

    /// Packages `action` with the registered dependencies and submits it.
    pub fn dispatch(&mut self, action: impl FnOnce() + Send + 'static) -> Result<(), QueueError> {
        let action = Box::new(action);
        let retained = std::mem::take(&mut self.retained);
        let task = Task { action, retained };
        self.sender
            .send(QueueEvent::Dispatch { task })
            .map_err(|_| QueueError::Closed)
    }
}

async fn serve(receiver: flume::Receiver<QueueEvent>) {
    while let Ok(event) = receiver.recv_async().await {
        match event {
            QueueEvent::Dispatch { task } => {
                for (ir, _) in &task.retained {
                    log::trace!("task array: {} {}", ir.access, ir.id);
                }
                (task.action)();
                // dependencies release only after the action ran
                drop(task.retained);
            }
            QueueEvent::Synchronize { sender } => _ = sender.send_async(()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{CommandQueue, QueueError};
    use crate::loom::{array::Array, num::DataType};

    #[tokio::test]
    async fn test_submission_order() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let (sender, receiver) = flume::unbounded();

        for index in 0..4 {
            let sender = sender.clone();
            let mut encoder = queue.encoder();
            encoder.dispatch(move || _ = sender.send(index))?;
        }
        queue.synchronize().await?;

        let order: Vec<i32> = receiver.drain().collect();
        assert_eq!(order, [0, 1, 2, 3]);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_alias_rejected() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let array = Array::<f32>::zeros([4]).into_untyped();
        assert_eq!(array.data_type(), DataType::F32);

        let mut encoder = queue.encoder();
        encoder.set_input_array(&array);
        assert!(matches!(
            encoder.set_output_array(&array),
            Err(QueueError::WriteAlias(id)) if id == array.id()
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_retained_arrays_outlive_handles() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let array = Array::<f32>::from_slice(&[3.0, 4.0], [2])?;
        let probe = array.clone();

        let mut encoder = queue.encoder();
        encoder.set_input_array(&array);
        {
            let array = array.into_untyped();
            encoder.dispatch(move || {
                let data = array.data().map(|buffer| buffer.len());
                assert_eq!(data.ok(), Some(8));
            })?;
        }
        queue.synchronize().await?;
        assert_eq!(probe.to_vec()?, [3.0, 4.0]);
        Ok(())
    }
}
