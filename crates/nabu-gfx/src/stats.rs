use std::time::Duration;

/// Counters for one completed frame, filled on the render side.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Frame counter value at the boundary that submitted this frame.
    pub frame: u64,
    pub draws: u32,
    pub computes: u32,
    /// Calls rejected while recording (item array or transform cache full).
    pub dropped_calls: u32,
    pub command_bytes: usize,
    pub uniform_bytes: usize,
    /// Time spent in command execution, sort and backend submit.
    pub render_time: Duration,
}
