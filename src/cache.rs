//! Recent-frame cache.
//!
//! A bounded, newest-first ring of decoded frames. Entries are evicted by
//! capacity only; age is applied at lookup time, where anything older than
//! the staleness window is ignored.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::protocol::{Address, Frame};

/// Default number of frames retained.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Frame),
    NotFound,
}

impl Lookup {
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn into_option(self) -> Option<Frame> {
        match self {
            Lookup::Found(frame) => Some(frame),
            Lookup::NotFound => None,
        }
    }
}

impl From<Option<Frame>> for Lookup {
    fn from(frame: Option<Frame>) -> Self {
        frame.map_or(Lookup::NotFound, Lookup::Found)
    }
}

/// Newest-first ring buffer of decoded frames.
#[derive(Debug)]
pub struct FrameCache {
    frames: VecDeque<Frame>,
    capacity: usize,
    stale_after: Duration,
}

impl FrameCache {
    /// Create a cache with the default capacity.
    pub fn new(stale_after: Duration) -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY, stale_after)
    }

    pub fn with_capacity(capacity: usize, stale_after: Duration) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            stale_after,
        }
    }

    /// Insert the newest frame, evicting the oldest beyond capacity.
    pub fn push_front(&mut self, frame: Frame) {
        self.frames.push_front(frame);
        self.frames.truncate(self.capacity);
    }

    /// Newest fresh frame travelling `expected_src` → `expected_dest`.
    pub fn find_reply(&self, expected_src: Address, expected_dest: Address) -> Lookup {
        let now = Instant::now();
        self.fresh(now)
            .find(|f| f.src == expected_src && f.dest == expected_dest)
            .cloned()
            .into()
    }

    /// Like [`find_reply`](Self::find_reply), restricted to frames
    /// received at or after `since`.
    pub fn find_reply_since(
        &self,
        expected_src: Address,
        expected_dest: Address,
        since: Instant,
    ) -> Lookup {
        self.frames
            .iter()
            .take_while(|f| f.received_at >= since)
            .find(|f| f.src == expected_src && f.dest == expected_dest)
            .cloned()
            .into()
    }

    /// Newest acknowledgment addressed to `device`, if still fresh.
    ///
    /// The scan stops at the first stale entry: the ring is time-ordered,
    /// so nothing behind it can be fresh.
    pub fn find_fresh(&self, device: Address) -> Lookup {
        self.find_fresh_at(device, Instant::now())
    }

    fn find_fresh_at(&self, device: Address, now: Instant) -> Lookup {
        self.fresh(now)
            .find(|f| f.is_ack() && f.dest == device)
            .cloned()
            .into()
    }

    fn fresh(&self, now: Instant) -> impl Iterator<Item = &Frame> + '_ {
        let stale_after = self.stale_after;
        self.frames
            .iter()
            .take_while(move |f| now.saturating_duration_since(f.received_at) <= stale_after)
    }

    /// Newest frame, if any.
    pub fn front(&self) -> Option<&Frame> {
        self.frames.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> + '_ {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, Cmd, DeviceClass, FrameKind, Room, Sequence};

    const WINDOW: Duration = Duration::from_secs(300);

    fn thermo(room: Room) -> Address {
        Address::new(DeviceClass::Thermostat, room)
    }

    fn frame(kind: FrameKind, dest: Address, src: Address, value0: u8) -> Frame {
        let bytes = build_frame(
            kind,
            Sequence::C,
            dest,
            src,
            Cmd::State,
            [value0, 0, 0, 0, 0, 0, 0, 0],
        );
        Frame::decode(&bytes).unwrap()
    }

    fn aged(mut frame: Frame, age: Duration) -> Frame {
        frame.received_at = Instant::now()
            .checked_sub(age)
            .expect("monotonic clock too close to its origin");
        frame
    }

    #[test]
    fn test_push_101_keeps_newest_100() {
        let mut cache = FrameCache::new(WINDOW);
        for i in 0..101u32 {
            cache.push_front(frame(
                FrameKind::Ack,
                Address::WALLPAD,
                thermo(Room::Livingroom),
                i as u8,
            ));
        }

        assert_eq!(cache.len(), 100);
        assert_eq!(cache.front().unwrap().value[0], 100);
        // frame 0 was evicted, frame 1 is now the oldest
        assert_eq!(cache.iter().last().unwrap().value[0], 1);
    }

    #[test]
    fn test_find_reply_matches_direction() {
        let mut cache = FrameCache::new(WINDOW);
        let device = thermo(Room::Bedroom);
        cache.push_front(frame(FrameKind::Send, device, Address::WALLPAD, 1));
        cache.push_front(frame(FrameKind::Ack, Address::WALLPAD, device, 2));

        let reply = cache.find_reply(device, Address::WALLPAD).into_option().unwrap();
        assert_eq!(reply.value[0], 2);
        assert!(!cache.find_reply(thermo(Room::Room1), Address::WALLPAD).is_found());
    }

    #[test]
    fn test_find_reply_returns_newest() {
        let mut cache = FrameCache::new(WINDOW);
        let device = thermo(Room::Bedroom);
        cache.push_front(frame(FrameKind::Ack, Address::WALLPAD, device, 1));
        cache.push_front(frame(FrameKind::Ack, Address::WALLPAD, device, 2));

        let reply = cache.find_reply(device, Address::WALLPAD).into_option().unwrap();
        assert_eq!(reply.value[0], 2);
    }

    #[test]
    fn test_find_reply_since_ignores_older_frames() {
        let mut cache = FrameCache::new(WINDOW);
        let device = thermo(Room::Bedroom);
        cache.push_front(aged(
            frame(FrameKind::Ack, Address::WALLPAD, device, 1),
            Duration::from_secs(2),
        ));
        let since = Instant::now() - Duration::from_secs(1);

        assert_eq!(
            cache.find_reply_since(device, Address::WALLPAD, since),
            Lookup::NotFound
        );

        cache.push_front(frame(FrameKind::Ack, Address::WALLPAD, device, 7));
        let reply = cache
            .find_reply_since(device, Address::WALLPAD, since)
            .into_option()
            .unwrap();
        assert_eq!(reply.value[0], 7);
    }

    #[test]
    fn test_find_fresh_returns_newest_ack_to_device() {
        let mut cache = FrameCache::new(WINDOW);
        let device = thermo(Room::Livingroom);
        cache.push_front(frame(FrameKind::Ack, device, Address::WALLPAD, 1));
        cache.push_front(frame(FrameKind::Send, device, Address::WALLPAD, 9));
        cache.push_front(frame(FrameKind::Ack, device, Address::WALLPAD, 3));

        let found = cache.find_fresh(device).into_option().unwrap();
        assert_eq!(found.value[0], 3);
    }

    #[test]
    fn test_find_fresh_stops_at_first_stale_entry() {
        let mut cache = FrameCache::new(WINDOW);
        let device = thermo(Room::Livingroom);
        let other = thermo(Room::Bedroom);

        cache.push_front(aged(
            frame(FrameKind::Ack, device, Address::WALLPAD, 1),
            Duration::from_secs(400),
        ));
        cache.push_front(aged(
            frame(FrameKind::Ack, other, Address::WALLPAD, 2),
            Duration::from_secs(301),
        ));
        cache.push_front(frame(FrameKind::Ack, other, Address::WALLPAD, 3));

        assert_eq!(cache.find_fresh(device), Lookup::NotFound);
        assert!(cache.find_fresh(other).is_found());
    }

    #[test]
    fn test_find_fresh_at_window_boundary() {
        let mut cache = FrameCache::new(WINDOW);
        let device = thermo(Room::Livingroom);
        let f = frame(FrameKind::Ack, device, Address::WALLPAD, 1);
        let received = f.received_at;
        cache.push_front(f);

        assert!(cache.find_fresh_at(device, received + WINDOW).is_found());
        assert!(!cache
            .find_fresh_at(device, received + WINDOW + Duration::from_millis(1))
            .is_found());
    }

    #[test]
    fn test_stale_entries_are_not_purged() {
        let mut cache = FrameCache::new(WINDOW);
        cache.push_front(aged(
            frame(FrameKind::Ack, Address::WALLPAD, thermo(Room::Room2), 1),
            Duration::from_secs(1000),
        ));
        assert_eq!(cache.len(), 1);
        assert!(!cache.find_reply(thermo(Room::Room2), Address::WALLPAD).is_found());
    }
}
