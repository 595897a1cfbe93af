//! Outbound message queue: the worker's only side channel to the host.
//!
//! A single-producer (the scheduler), single-consumer (the host) queue
//! of small tagged events. Delivery is lossless up to its capacity; past
//! that, back-pressure is dropping the oldest event rather than blocking
//! the worker or growing without bound.

use std::collections::VecDeque;

/// A tagged event the worker reports to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// ROMs loaded, components wired up, ready for the host to call `run`.
    ReadyToRun,
    /// The scheduler resumed running after a halt.
    Run,
    /// The scheduler loop returned control to the caller.
    Halt,
    /// A hard reset completed.
    Reset,
    /// The CPU executed a JAM opcode and is stopped until the next reset.
    CpuJam { pc: u16 },
    /// A breakpoint fired.
    Breakpoint { addr: u16, hard: bool },
    /// An auto-snapshot was taken at end of frame.
    AutoSnapshot { frame: u64 },
    /// One frame's worth of pixels is ready in the framebuffer.
    Frame { frame: u64 },
    /// A cartridge was attached to the expansion port.
    CartridgeAttached,
    /// Placeholders for the VC1541/datasette ports this core treats as
    /// external collaborators: nothing in this crate raises these today,
    /// but a future drive/tape port can push them onto the same queue
    /// without changing its shape.
    DriveAttached,
    DriveLedOn,
    DriveLedOff,
    TapeInserted,
}

/// Bounded outbound queue with drop-oldest back-pressure.
///
/// This core does not spawn its own worker thread, so there is no real
/// cross-thread channel here — the host drains the same queue object the
/// scheduler pushes onto, whether that's this thread or one the host
/// spawned and wrapped the whole [`crate::c64::C64`] in a mutex for.
pub struct MessageQueue {
    queue: VecDeque<Message>,
    capacity: usize,
}

impl MessageQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an event. If the queue is at capacity, the oldest event is
    /// dropped to make room — never blocks, never grows past `capacity`.
    pub fn push(&mut self, message: Message) {
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
        }
        self.queue.push_back(message);
    }

    /// Drain every pending message in arrival order.
    pub fn drain(&mut self) -> Vec<Message> {
        self.queue.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_arrival_order() {
        let mut q = MessageQueue::new(8);
        q.push(Message::Run);
        q.push(Message::Frame { frame: 1 });
        let drained = q.drain();
        assert_eq!(drained, vec![Message::Run, Message::Frame { frame: 1 }]);
        assert!(q.is_empty());
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut q = MessageQueue::new(2);
        q.push(Message::Frame { frame: 1 });
        q.push(Message::Frame { frame: 2 });
        q.push(Message::Frame { frame: 3 });
        assert_eq!(
            q.drain(),
            vec![Message::Frame { frame: 2 }, Message::Frame { frame: 3 }]
        );
    }
}
