//! Moving buffers: push and chain downstream, pull and getrange upstream.
//!
//! ```text
//!  src.push(buf)                          sink.pull_range(off, len)
//!    |- flushing? -> WrongState             |- flushing? -> WrongState
//!    |- block probes, data probes           |- pre-pull probes (may answer)
//!    |- peer? -> NotLinked                  |- peer? -> NotLinked
//!    `- peer.chain(buf)                     |- peer.get_range(off, len)
//!         |- stream lock                    |     |- stream lock
//!         |- flushing? -> WrongState        |     |- pre-pull probes
//!         |- replay sticky events           |     |- getrange function
//!         |- block probes, data probes      |     `- post-pull probes
//!         `- chain function                 |- post-pull probes
//!                                           `- replay sticky events
//! ```
//!
//! A probe dropping the item ends the call with `Ok`; the item is
//! released and the chain or getrange function is not called.

use super::probe::Checkpoint;
use super::{ObjectGuard, Pad, PadFlags, ProbeData, ProbeInfo, ProbeType};
use crate::buffer::{Buffer, BufferList};
use crate::flow::{FlowError, FlowResult, FlowSuccess, flow_name};
use crate::node::NodeMessage;
use crate::observability::metrics;
use parking_lot::MutexGuard;

/// Outcome of a pull: `None` when a probe dropped the buffer.
pub type PullResult = Result<Option<Buffer>, FlowError>;

impl Pad {
    /// Push a buffer to the peer of this source pad.
    ///
    /// Block probes run first, then data probes, then the peer's chain
    /// function with no lock of this pad held. The buffer is consumed on
    /// every path.
    pub fn push(&self, buffer: Buffer) -> FlowResult {
        if !self.is_src() {
            tracing::error!(target: "padflow::scheduling", pad = %self.debug_name(), "push on a non-source pad");
            return Err(FlowError::Error);
        }
        let size = buffer.len();
        let result = self.push_data(ProbeType::BUFFER | ProbeType::PUSH, ProbeData::Buffer(buffer));
        match &result {
            Ok(_) => metrics::record_buffer_pushed(self.name(), size),
            Err(_) => metrics::record_flow_error(self.name(), flow_name(&result)),
        }
        result
    }

    /// Push a buffer list to the peer of this source pad.
    ///
    /// A peer without a chain-list function receives the buffers one by
    /// one through its chain function.
    pub fn push_list(&self, list: BufferList) -> FlowResult {
        if !self.is_src() {
            tracing::error!(target: "padflow::scheduling", pad = %self.debug_name(), "push_list on a non-source pad");
            return Err(FlowError::Error);
        }
        let size = list.total_size();
        let result = self.push_data(
            ProbeType::BUFFER_LIST | ProbeType::PUSH,
            ProbeData::BufferList(list),
        );
        match &result {
            Ok(_) => metrics::record_buffer_pushed(self.name(), size),
            Err(_) => metrics::record_flow_error(self.name(), flow_name(&result)),
        }
        result
    }

    /// Hand a buffer to this sink pad's chain function.
    ///
    /// Fails with `WrongState` while flushing and `NotSupported` without a
    /// chain function. Pending sticky events are delivered first.
    pub fn chain(&self, buffer: Buffer) -> FlowResult {
        if !self.is_sink() {
            tracing::error!(target: "padflow::scheduling", pad = %self.debug_name(), "chain on a non-sink pad");
            return Err(FlowError::Error);
        }
        self.chain_data_unchecked(ProbeType::BUFFER | ProbeType::PUSH, ProbeData::Buffer(buffer))
    }

    /// Hand a buffer list to this sink pad's chain-list function.
    pub fn chain_list(&self, list: BufferList) -> FlowResult {
        if !self.is_sink() {
            tracing::error!(target: "padflow::scheduling", pad = %self.debug_name(), "chain_list on a non-sink pad");
            return Err(FlowError::Error);
        }
        self.chain_data_unchecked(
            ProbeType::BUFFER_LIST | ProbeType::PUSH,
            ProbeData::BufferList(list),
        )
    }

    fn push_data(&self, probe_type: ProbeType, data: ProbeData<'static>) -> FlowResult {
        let span = self.span();
        let _entered = span.enter();

        let mut state = self.lock();
        if state.is_flushing() {
            tracing::trace!(target: "padflow::scheduling", pad = %self.name(), "pushing, but pad was flushing");
            return Err(FlowError::WrongState);
        }

        let data = match self.run_data_probes(&mut state, probe_type, data) {
            Ok(Checkpoint::Pass(data)) => data,
            Ok(Checkpoint::Dropped) => {
                tracing::debug!(target: "padflow::scheduling", pad = %self.name(), "dropped by probe");
                return Ok(FlowSuccess::Ok);
            }
            Err(err) => {
                tracing::debug!(target: "padflow::scheduling", pad = %self.name(), %err, "probe stopped push");
                return Err(err);
            }
        };

        let Some(peer) = state.peer() else {
            tracing::trace!(target: "padflow::scheduling", pad = %self.name(), "pushing, but it was not linked");
            return Err(FlowError::NotLinked);
        };

        state.num_using += 1;
        let result = MutexGuard::unlocked(&mut state, move || {
            let result = peer.chain_data_unchecked(probe_type, data);
            drop(peer);
            result
        });
        state.num_using -= 1;
        if state.num_using == 0 {
            self.run_idle_probes(&mut state, ProbeType::PUSH, result);
        }
        result
    }

    pub(crate) fn chain_data_unchecked(
        &self,
        probe_type: ProbeType,
        data: ProbeData<'static>,
    ) -> FlowResult {
        let _stream = self.stream_lock();

        let mut state = self.lock();
        if state.is_flushing() {
            tracing::trace!(target: "padflow::scheduling", pad = %self.name(), "chaining, but pad was flushing");
            return Err(FlowError::WrongState);
        }

        if state.flags.contains(PadFlags::NEED_EVENTS) {
            state.flags.remove(PadFlags::NEED_EVENTS);
            tracing::debug!(target: "padflow::events", pad = %self.name(), "need to update all events");
            if let Err(err) = self.update_events(&mut state) {
                tracing::debug!(target: "padflow::scheduling", pad = %self.name(), %err, "events were not accepted");
                return Err(err);
            }
        }

        let data = match self.run_data_probes(&mut state, probe_type, data)? {
            Checkpoint::Pass(data) => data,
            Checkpoint::Dropped => {
                tracing::debug!(target: "padflow::scheduling", pad = %self.name(), "dropped by probe");
                return Ok(FlowSuccess::Ok);
            }
        };
        drop(state);

        match data {
            ProbeData::Buffer(buffer) => {
                let Some(chain) = self.functions().chain.clone() else {
                    return self.missing_function("chain");
                };
                tracing::trace!(target: "padflow::scheduling", pad = %self.name(), size = buffer.len(), "calling chain function");
                let result = chain(self, buffer);
                tracing::trace!(target: "padflow::scheduling", pad = %self.name(), result = flow_name(&result), "chain function returned");
                result
            }
            ProbeData::BufferList(list) => match self.functions().chain_list.clone() {
                Some(chain_list) => {
                    tracing::trace!(target: "padflow::scheduling", pad = %self.name(), len = list.len(), "calling chain-list function");
                    chain_list(self, list)
                }
                None => self.chain_list_default(list),
            },
            other => {
                tracing::error!(target: "padflow::scheduling", pad = %self.name(), item = ?other, "probe replaced data with a non-buffer item");
                Err(FlowError::Error)
            }
        }
    }

    /// Chain every buffer of `list` separately, stopping at the first
    /// result other than `Ok`.
    pub fn chain_list_default(&self, list: BufferList) -> FlowResult {
        tracing::debug!(target: "padflow::scheduling", pad = %self.name(), len = list.len(), "chaining each buffer in list");
        let mut result = Ok(FlowSuccess::Ok);
        for buffer in list {
            result = self.chain_data_unchecked(
                ProbeType::BUFFER | ProbeType::PUSH,
                ProbeData::Buffer(buffer),
            );
            if result != Ok(FlowSuccess::Ok) {
                break;
            }
        }
        result
    }

    fn missing_function(&self, what: &str) -> FlowResult {
        let message = format!("{what} on pad {} but it has no {what} function", self.debug_name());
        tracing::error!(target: "padflow::scheduling", pad = %self.name(), "{message}");
        self.post_message(NodeMessage::Error {
            pad: self.name().to_string(),
            message,
        });
        Err(FlowError::NotSupported)
    }

    /// Produce a buffer from this source pad's getrange function.
    ///
    /// Low-level; downstream pads normally use [`pull_range`](Self::pull_range).
    pub fn get_range(&self, offset: u64, size: u32) -> PullResult {
        if !self.is_src() {
            tracing::error!(target: "padflow::scheduling", pad = %self.debug_name(), "get_range on a non-source pad");
            return Err(FlowError::Error);
        }
        self.get_range_unchecked(offset, size)
    }

    fn get_range_unchecked(&self, offset: u64, size: u32) -> PullResult {
        let _stream = self.stream_lock();

        let mut state = self.lock();
        if state.is_flushing() {
            tracing::trace!(target: "padflow::scheduling", pad = %self.name(), "getrange, but pad was flushing");
            return Err(FlowError::WrongState);
        }

        let buffer = match self.pre_pull_probes(&mut state, offset, size)? {
            PrePull::Dropped => return Ok(None),
            PrePull::Answered(buffer) => buffer,
            PrePull::Continue => {
                let Some(getrange) = self.functions().getrange.clone() else {
                    drop(state);
                    return self.missing_function("getrange").map(|_| None);
                };
                tracing::trace!(target: "padflow::scheduling", pad = %self.name(), offset, size, "calling getrange function");
                let produced = MutexGuard::unlocked(&mut state, || getrange(self, offset, size));
                match produced {
                    Ok(buffer) => buffer,
                    Err(err) => {
                        if err == FlowError::Eos || err == FlowError::WrongState {
                            tracing::info!(target: "padflow::scheduling", pad = %self.name(), %err, "getrange failed");
                        } else {
                            tracing::warn!(target: "padflow::scheduling", pad = %self.name(), %err, "getrange failed");
                        }
                        return Err(err);
                    }
                }
            }
        };

        self.post_pull_probes(&mut state, buffer)
    }

    /// Pull a buffer from the peer of this sink pad.
    ///
    /// Returns `Ok(None)` when a probe dropped the buffer. Pending sticky
    /// events are delivered after a successful pull.
    pub fn pull_range(&self, offset: u64, size: u32) -> PullResult {
        if !self.is_sink() {
            tracing::error!(target: "padflow::scheduling", pad = %self.debug_name(), "pull_range on a non-sink pad");
            return Err(FlowError::Error);
        }
        let span = self.span();
        let _entered = span.enter();

        let mut state = self.lock();
        if state.is_flushing() {
            tracing::trace!(target: "padflow::scheduling", pad = %self.name(), "pullrange, but pad was flushing");
            return Err(FlowError::WrongState);
        }

        let buffer = match self.pre_pull_probes(&mut state, offset, size)? {
            PrePull::Dropped => return Ok(None),
            PrePull::Answered(buffer) => buffer,
            PrePull::Continue => {
                let Some(peer) = state.peer() else {
                    tracing::trace!(target: "padflow::scheduling", pad = %self.name(), "pulling range, but it was not linked");
                    return Err(FlowError::NotLinked);
                };
                state.num_using += 1;
                let pulled = MutexGuard::unlocked(&mut state, move || {
                    let pulled = peer.get_range_unchecked(offset, size);
                    drop(peer);
                    pulled
                });
                state.num_using -= 1;
                if state.num_using == 0 {
                    let result = pulled.as_ref().map(|_| FlowSuccess::Ok).map_err(|e| *e);
                    self.run_idle_probes(&mut state, ProbeType::PULL, result);
                }
                match pulled {
                    Ok(Some(buffer)) => buffer,
                    Ok(None) => return Ok(None),
                    Err(err) => {
                        metrics::record_flow_error(self.name(), flow_name(&Err(err)));
                        return Err(err);
                    }
                }
            }
        };

        let Some(buffer) = self.post_pull_probes(&mut state, buffer)? else {
            return Ok(None);
        };

        if state.flags.contains(PadFlags::NEED_EVENTS) {
            state.flags.remove(PadFlags::NEED_EVENTS);
            tracing::debug!(target: "padflow::events", pad = %self.name(), "we need to update the events");
            if let Err(err) = self.update_events(&mut state) {
                tracing::warn!(target: "padflow::scheduling", pad = %self.name(), %err, "pullrange returned events that were not accepted");
                return Err(err);
            }
        }
        Ok(Some(buffer))
    }

    fn pre_pull_probes(
        &self,
        state: &mut ObjectGuard<'_>,
        offset: u64,
        size: u32,
    ) -> Result<PrePull, FlowError> {
        if state.probes.is_empty() {
            return Ok(PrePull::Continue);
        }
        let mut info = ProbeInfo::new(ProbeType::PULL | ProbeType::BLOCK | ProbeType::BUFFER, None);
        info.offset = offset;
        info.size = size;
        match self.run_probes(state, &mut info, Ok(FlowSuccess::Ok))? {
            FlowSuccess::CustomSuccess => Ok(PrePull::Dropped),
            FlowSuccess::Ok => match info.data {
                Some(ProbeData::Buffer(buffer)) => {
                    tracing::debug!(target: "padflow::scheduling", pad = %self.name(), "probe supplied buffer");
                    Ok(PrePull::Answered(buffer))
                }
                _ => Ok(PrePull::Continue),
            },
        }
    }

    fn post_pull_probes(&self, state: &mut ObjectGuard<'_>, buffer: Buffer) -> PullResult {
        match self.run_checkpoint(state, ProbeType::PULL | ProbeType::BUFFER, ProbeData::Buffer(buffer))? {
            Checkpoint::Pass(ProbeData::Buffer(buffer)) => Ok(Some(buffer)),
            Checkpoint::Pass(other) => {
                tracing::error!(target: "padflow::scheduling", pad = %self.name(), item = ?other, "probe replaced buffer with a non-buffer item");
                Err(FlowError::Error)
            }
            Checkpoint::Dropped => Ok(None),
        }
    }
}

enum PrePull {
    Continue,
    Answered(Buffer),
    Dropped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::{PadDirection, ProbeReturn};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_sink() -> (Pad, Arc<Mutex<Vec<Buffer>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sink = Pad::builder("sink", PadDirection::Sink)
            .chain_function(move |_, buffer| {
                s.lock().push(buffer);
                Ok(FlowSuccess::Ok)
            })
            .build();
        (sink, seen)
    }

    fn active_pair() -> (Pad, Pad, Arc<Mutex<Vec<Buffer>>>) {
        let src = Pad::new("src", PadDirection::Src);
        let (sink, seen) = recording_sink();
        src.link(&sink).unwrap();
        src.set_active(true).unwrap();
        sink.set_active(true).unwrap();
        (src, sink, seen)
    }

    #[test]
    fn test_push_reaches_chain() {
        let (src, _sink, seen) = active_pair();
        assert_eq!(src.push(Buffer::from_static(b"abc")), Ok(FlowSuccess::Ok));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].as_bytes(), b"abc");
    }

    #[test]
    fn test_push_unlinked_releases_buffer() {
        let src = Pad::new("src", PadDirection::Src);
        src.set_active(true).unwrap();
        let buffer = Buffer::from_static(b"abc");
        let before = buffer.ref_count();
        assert_eq!(src.push(buffer.clone()), Err(FlowError::NotLinked));
        assert_eq!(buffer.ref_count(), before);
    }

    #[test]
    fn test_flushing_skips_chain() {
        let (src, sink, seen) = active_pair();
        sink.set_active(false).unwrap();
        assert_eq!(src.push(Buffer::from_static(b"x")), Err(FlowError::WrongState));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_missing_chain_function() {
        let src = Pad::new("src", PadDirection::Src);
        let sink = Pad::new("sink", PadDirection::Sink);
        src.link(&sink).unwrap();
        src.set_active(true).unwrap();
        sink.set_active(true).unwrap();
        assert_eq!(src.push(Buffer::empty()), Err(FlowError::NotSupported));
    }

    #[test]
    fn test_list_falls_back_to_chain() {
        let (src, _sink, seen) = active_pair();
        let list: BufferList = [&b"a"[..], &b"b"[..], &b"c"[..]]
            .into_iter()
            .map(Buffer::from_static)
            .collect();
        assert_eq!(src.push_list(list), Ok(FlowSuccess::Ok));
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn test_drop_probe_reports_ok() {
        let (src, _sink, seen) = active_pair();
        src.add_probe(ProbeType::BUFFER, |_, _| ProbeReturn::Drop);
        let buffer = Buffer::from_static(b"x");
        assert_eq!(src.push(buffer.clone()), Ok(FlowSuccess::Ok));
        assert!(seen.lock().is_empty());
        assert_eq!(buffer.ref_count(), 1);
    }

    #[test]
    fn test_probe_replaces_buffer() {
        let (src, _sink, seen) = active_pair();
        src.add_probe(ProbeType::BUFFER, |_, info| {
            if let Some(buffer) = info.buffer_mut() {
                *buffer = Buffer::from_static(b"replaced");
            }
            ProbeReturn::Ok
        });
        src.push(Buffer::from_static(b"original")).unwrap();
        assert_eq!(seen.lock()[0].as_bytes(), b"replaced");
    }

    #[test]
    fn test_pull_range() {
        let src = Pad::builder("src", PadDirection::Src)
            .getrange_function(|_, offset, size| {
                Ok(Buffer::from_bytes(vec![offset as u8; size as usize]))
            })
            .build();
        let sink = Pad::new("sink", PadDirection::Sink);
        src.link(&sink).unwrap();
        sink.activate_pull(true).unwrap();
        let buffer = sink.pull_range(7, 4).unwrap().unwrap();
        assert_eq!(buffer.as_bytes(), &[7, 7, 7, 7]);
    }

    #[test]
    fn test_pull_unlinked_and_flushing() {
        let sink = Pad::new("sink", PadDirection::Sink);
        assert_eq!(sink.pull_range(0, 1), Err(FlowError::WrongState));
        sink.activate_push(true).unwrap();
        assert_eq!(sink.pull_range(0, 1), Err(FlowError::NotLinked));
    }

    #[test]
    fn test_pre_pull_probe_answers() {
        let calls = Arc::new(Mutex::new(0));
        let c = calls.clone();
        let src = Pad::builder("src", PadDirection::Src)
            .getrange_function(move |_, _, _| {
                *c.lock() += 1;
                Ok(Buffer::empty())
            })
            .build();
        let sink = Pad::new("sink", PadDirection::Sink);
        src.link(&sink).unwrap();
        sink.activate_pull(true).unwrap();
        sink.add_probe(ProbeType::PULL | ProbeType::BLOCK | ProbeType::BUFFER, |_, info| {
            info.data = Some(ProbeData::Buffer(Buffer::from_static(b"probed")));
            ProbeReturn::Pass
        });
        let buffer = sink.pull_range(0, 6).unwrap().unwrap();
        assert_eq!(buffer.as_bytes(), b"probed");
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn test_post_pull_drop() {
        let src = Pad::builder("src", PadDirection::Src)
            .getrange_function(|_, _, _| Ok(Buffer::from_static(b"data")))
            .build();
        let sink = Pad::new("sink", PadDirection::Sink);
        src.link(&sink).unwrap();
        sink.activate_pull(true).unwrap();
        sink.add_probe(ProbeType::PULL | ProbeType::BUFFER, |_, _| ProbeReturn::Drop);
        assert_eq!(sink.pull_range(0, 4), Ok(None));
    }

    #[test]
    fn test_wrong_direction_calls() {
        let src = Pad::new("src", PadDirection::Src);
        let sink = Pad::new("sink", PadDirection::Sink);
        assert_eq!(sink.push(Buffer::empty()), Err(FlowError::Error));
        assert_eq!(src.chain(Buffer::empty()), Err(FlowError::Error));
        assert_eq!(src.pull_range(0, 1), Err(FlowError::Error));
        assert_eq!(sink.get_range(0, 1), Err(FlowError::Error));
    }
}
