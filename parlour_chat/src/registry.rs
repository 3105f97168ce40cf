use crate::room::Room;
use crate::session::Session;

use parking_lot::RwLock;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Returned by [`RoomRegistry::join`] when the room already has a member
/// with the joining session's plain name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTaken;

/// Every live room, keyed by name.
///
/// The default room is always present and never removed. Other rooms are
/// created on first join and removed once their last member leaves. Both
/// happen under the registry's write lock, so a join can't race with the
/// removal of the room it is joining.
#[derive(Debug)]
pub struct RoomRegistry {
    default_room: Arc<Room>,
    rooms: RwLock<BTreeMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new(default_name: &str, scrollback: usize) -> Self {
        let default_room = Arc::new(Room::with_backlog(default_name, scrollback));
        let mut rooms = BTreeMap::new();
        rooms.insert(default_name.to_owned(), Arc::clone(&default_room));
        Self {
            default_room,
            rooms: RwLock::new(rooms),
        }
    }

    pub fn default_room(&self) -> &Arc<Room> {
        &self.default_room
    }

    pub fn is_default(&self, room: &Room) -> bool {
        std::ptr::eq(room, Arc::as_ptr(&self.default_room))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.read().get(name).cloned()
    }

    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.read().values().cloned().collect()
    }

    pub fn room_names(&self) -> Vec<String> {
        self.rooms.read().keys().cloned().collect()
    }

    /// Add `session` to the room called `name`, creating it if needed.
    pub fn join(&self, name: &str, session: &Arc<Session>) -> Result<Arc<Room>, NameTaken> {
        let mut rooms = self.rooms.write();
        let room = rooms
            .entry(name.to_owned())
            .or_insert_with(|| {
                tracing::debug!(room = %name, "Creating room");
                Arc::new(Room::new(name))
            })
            .clone();

        if room.try_add_member(session) {
            Ok(room)
        } else {
            if room.is_empty() && !self.is_default(&room) {
                rooms.remove(name);
            }
            Err(NameTaken)
        }
    }

    /// Remove `room` if it is empty and not the default room. Returns whether
    /// it was removed.
    pub fn cleanup(&self, room: &Arc<Room>) -> bool {
        if self.is_default(room) {
            return false;
        }
        let mut rooms = self.rooms.write();
        let registered = rooms.get(room.name()).map_or(false, |r| Arc::ptr_eq(r, room));
        if registered && room.is_empty() {
            tracing::debug!(room = %room.name(), "Removing empty room");
            rooms.remove(room.name());
            true
        } else {
            false
        }
    }

    /// Broadcast to every room. The room list is snapshotted first, so a room
    /// created during the broadcast may miss it.
    pub fn universe_broadcast(&self, sender: Option<&str>, text: &str) {
        for room in self.rooms() {
            room.broadcast(sender, text);
        }
    }
}
