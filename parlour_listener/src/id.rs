use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Identifies a single listening socket
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,PartialOrd,Ord)]
pub struct ListenerId(i64);

/// Identifies a single client connection; unique across all listeners of a process
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,PartialOrd,Ord)]
pub struct ConnectionId(ListenerId, i64);

impl ListenerId
{
    pub fn new(id: i64) -> Self
    {
        Self(id)
    }

    pub fn local(&self) -> i64
    {
        self.0
    }
}

impl ConnectionId
{
    pub fn new(listener: ListenerId, local: i64) -> Self
    {
        Self(listener, local)
    }

    /// The listener which accepted this connection
    pub fn listener(&self) -> ListenerId
    {
        self.0
    }

    pub fn local(&self) -> i64
    {
        self.1
    }
}

impl fmt::Display for ListenerId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConnectionId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// Generates sequential [`ListenerId`]s
#[derive(Debug)]
pub struct ListenerIdGenerator(AtomicI64);

impl ListenerIdGenerator
{
    pub fn new(start: i64) -> Self
    {
        Self(AtomicI64::new(start))
    }

    pub fn next(&self) -> ListenerId
    {
        ListenerId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Generates sequential [`ConnectionId`]s for a given listener
#[derive(Debug)]
pub struct ConnectionIdGenerator
{
    listener: ListenerId,
    next: AtomicI64,
}

impl ConnectionIdGenerator
{
    pub fn new(listener: ListenerId, start: i64) -> Self
    {
        Self {
            listener,
            next: AtomicI64::new(start),
        }
    }

    pub fn next(&self) -> ConnectionId
    {
        ConnectionId(self.listener, self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn connection_ids_are_sequential_per_listener()
    {
        let listeners = ListenerIdGenerator::new(0);
        let first = listeners.next();
        let second = listeners.next();
        assert_ne!(first, second);

        let gen = ConnectionIdGenerator::new(second, 1);
        let a = gen.next();
        let b = gen.next();

        assert_eq!(a.listener(), second);
        assert_eq!(a.local(), 1);
        assert_eq!(b.local(), 2);
        assert_eq!(b.to_string(), "1:2");
    }
}
