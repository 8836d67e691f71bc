use bitflags::bitflags;

bitflags! {
    /// Capabilities of a stream.
    ///
    /// Recomputed wholesale from every snapshot, never patched in place.
    /// Every mutator checks its required bit before dispatching to the
    /// backend; an unset bit is a local precondition failure.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StreamFlags: u32 {
        /// Mute state can be read
        const MUTE_READABLE = 1 << 0;
        /// Mute state can be changed
        const MUTE_WRITABLE = 1 << 1;
        /// Volume can be read
        const VOLUME_READABLE = 1 << 2;
        /// Volume can be changed
        const VOLUME_WRITABLE = 1 << 3;
        /// Channel map contains a left/right pair
        const CAN_BALANCE = 1 << 4;
        /// Channel map contains a front/back pair
        const CAN_FADE = 1 << 5;
        /// Stream can be moved to a different device
        const MOVABLE = 1 << 6;
        /// Volume supports decibel conversion
        const HAS_DECIBEL = 1 << 7;
        /// Peak level monitoring is available
        const HAS_MONITOR = 1 << 8;
        /// Stream is a stored control without a live owner
        const STORED = 1 << 9;
        /// Stream belongs to a client application
        const APPLICATION = 1 << 10;
        /// Stream plays event sounds
        const EVENT = 1 << 11;
    }
}
