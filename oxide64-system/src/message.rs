// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

// Design:
//   A bounded ring of typed messages. The emulator posts, listeners either
//   poll with get() or are pushed through registered callbacks. When the
//   ring is full the oldest message is dropped.

const CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Message {
    PowerOn,
    PowerOff,
    Run,
    Pause,
    Reset,
    CpuJammed,
    CpuIllegalInstruction,
    BreakpointReached,
    WatchpointReached,
    SnapshotTaken,
    TapeInserted,
    TapeEjected,
    TapeProgress,
    DiskInserted,
    DiskEjected,
    CartridgeAttached,
    CartridgeDetached,
    DriveLed,
    AudioUnderrun,
}

pub type Listener = Box<dyn Fn(Message, u64)>;

pub struct MessageQueue {
    queue: [(Message, u64); CAPACITY],
    read: usize,
    write: usize,
    count: usize,
    listeners: Vec<Listener>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            queue: [(Message::PowerOff, 0); CAPACITY],
            read: 0,
            write: 0,
            count: 0,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Returns the next pending message, if any.
    pub fn get(&mut self) -> Option<(Message, u64)> {
        if self.count == 0 {
            None
        } else {
            let message = self.queue[self.read];
            self.read = (self.read + 1) % CAPACITY;
            self.count -= 1;
            Some(message)
        }
    }

    /// Writes a message into the queue and propagates it to all listeners.
    pub fn put(&mut self, message: Message, data: u64) {
        if self.count == CAPACITY {
            // drop the oldest entry
            self.read = (self.read + 1) % CAPACITY;
            self.count -= 1;
            warn!(target: "c64", "Message queue overflow");
        }
        self.queue[self.write] = (message, data);
        self.write = (self.write + 1) % CAPACITY;
        self.count += 1;
        for listener in self.listeners.iter() {
            listener(message, data);
        }
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_in_order() {
        let mut queue = MessageQueue::new();
        queue.put(Message::Run, 0);
        queue.put(Message::Pause, 1);
        assert_eq!(Some((Message::Run, 0)), queue.get());
        assert_eq!(Some((Message::Pause, 1)), queue.get());
        assert_eq!(None, queue.get());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut queue = MessageQueue::new();
        for i in 0..(CAPACITY as u64 + 2) {
            queue.put(Message::TapeProgress, i);
        }
        assert_eq!(Some((Message::TapeProgress, 2)), queue.get());
    }

    #[test]
    fn listeners_receive_posted_messages() {
        use std::cell::Cell;
        use std::rc::Rc;
        let seen = Rc::new(Cell::new(0u32));
        let seen_clone = seen.clone();
        let mut queue = MessageQueue::new();
        queue.add_listener(Box::new(move |_msg, _data| {
            seen_clone.set(seen_clone.get() + 1);
        }));
        queue.put(Message::Reset, 0);
        queue.put(Message::Run, 0);
        assert_eq!(2, seen.get());
    }
}
