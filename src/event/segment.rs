//! Playback segments.

use bitflags::bitflags;

/// Unit of segment positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SegmentFormat {
    /// Nanoseconds.
    #[default]
    Time,
    /// Bytes.
    Bytes,
    /// Media-defined units (frames, samples).
    Default,
}

bitflags! {
    /// Segment flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SegmentFlags: u32 {
        /// Running time restarts at this segment.
        const RESET = 1 << 0;
        /// Elements may skip data to honour the rate.
        const SKIP = 1 << 1;
        /// The segment ends with a segment-done rather than EOS.
        const SEGMENT = 1 << 2;
    }
}

/// The timeline region to which following buffers belong.
///
/// `base` is the running time at which the segment starts; pad offsets are
/// applied by shifting it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Unit of `start`, `stop` and `position`.
    pub format: SegmentFormat,
    /// Start position.
    pub start: i64,
    /// Stop position, `None` when open-ended.
    pub stop: Option<i64>,
    /// Current position.
    pub position: i64,
    /// Playback rate (1.0 = normal speed).
    pub rate: f64,
    /// Rate already applied upstream.
    pub applied_rate: f64,
    /// Running time of `start`.
    pub base: i64,
    /// Flags.
    pub flags: SegmentFlags,
}

impl Segment {
    /// Time segment covering `[start, stop)` nanoseconds.
    pub fn new_time(start: i64, stop: Option<i64>) -> Self {
        Self::with_format(SegmentFormat::Time, start, stop)
    }

    /// Byte segment covering `[start, stop)`.
    pub fn new_bytes(start: i64, stop: Option<i64>) -> Self {
        Self::with_format(SegmentFormat::Bytes, start, stop)
    }

    fn with_format(format: SegmentFormat, start: i64, stop: Option<i64>) -> Self {
        Self {
            format,
            start,
            stop,
            position: start,
            rate: 1.0,
            applied_rate: 1.0,
            base: 0,
            flags: SegmentFlags::empty(),
        }
    }

    /// Running time for `position`, or `None` if outside the segment.
    pub fn to_running_time(&self, position: i64) -> Option<i64> {
        if position < self.start || self.stop.is_some_and(|stop| position > stop) {
            return None;
        }
        let elapsed = (position - self.start) as f64 / self.rate.abs();
        Some(self.base + elapsed as i64)
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::new_time(0, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_time_uses_base() {
        let mut seg = Segment::new_time(1_000, Some(5_000));
        seg.base = 10_000;
        assert_eq!(seg.to_running_time(1_000), Some(10_000));
        assert_eq!(seg.to_running_time(3_000), Some(12_000));
        assert_eq!(seg.to_running_time(500), None);
        assert_eq!(seg.to_running_time(6_000), None);
    }

    #[test]
    fn test_rate_scales_running_time() {
        let mut seg = Segment::new_time(0, None);
        seg.rate = 2.0;
        assert_eq!(seg.to_running_time(4_000), Some(2_000));
    }
}
