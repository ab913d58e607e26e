//! Probes: callbacks hooked into a pad's data-flow checkpoints.
//!
//! A probe is installed with a [`ProbeType`] mask and fires at every
//! checkpoint whose type it matches. The mask has three parts:
//!
//! - **data types** (`BUFFER`, `EVENT_DOWNSTREAM`, `QUERY_UPSTREAM`, ...):
//!   at least one must match the item passing the checkpoint
//! - **scheduling** (`PUSH`, `PULL`): at least one must match
//! - **blocking** (`BLOCK`, `IDLE`): must match exactly
//!
//! Each data checkpoint runs twice: once as a `BLOCK` checkpoint, where a
//! blocking probe that returns [`ProbeReturn::Ok`] parks the calling thread
//! until the probe is removed or the pad flushes, and once as a plain data
//! checkpoint. `IDLE` probes fire when the pad stops handing data to its
//! peer, or right away if it is idle at install time.
//!
//! # Example
//!
//! ```rust
//! use padflow::pad::{Pad, PadDirection, ProbeReturn, ProbeType};
//!
//! let pad = Pad::new("src", PadDirection::Src);
//! let id = pad.add_probe(ProbeType::BUFFER, |_pad, info| {
//!     if info.buffer().is_some_and(|b| b.is_empty()) {
//!         ProbeReturn::Drop
//!     } else {
//!         ProbeReturn::Ok
//!     }
//! });
//! assert!(pad.remove_probe(id));
//! ```

use super::{ObjectGuard, Pad, PadFlags, PadState};
use crate::buffer::{Buffer, BufferList};
use crate::event::Event;
use crate::flow::{FlowError, FlowResult, FlowSuccess};
use crate::observability::metrics;
use crate::query::Query;
use bitflags::bitflags;
use parking_lot::MutexGuard;
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Checkpoint types and probe masks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProbeType: u32 {
        /// The pad stopped handing data to its peer.
        const IDLE = 1 << 0;
        /// Blocking checkpoint.
        const BLOCK = 1 << 1;
        /// A buffer.
        const BUFFER = 1 << 4;
        /// A buffer list.
        const BUFFER_LIST = 1 << 5;
        /// A downstream event.
        const EVENT_DOWNSTREAM = 1 << 6;
        /// An upstream event.
        const EVENT_UPSTREAM = 1 << 7;
        /// A downstream query.
        const QUERY_DOWNSTREAM = 1 << 9;
        /// An upstream query.
        const QUERY_UPSTREAM = 1 << 10;
        /// Push scheduling, or the path of a query.
        const PUSH = 1 << 12;
        /// Pull scheduling, or the answer of a query.
        const PULL = 1 << 13;

        /// Both blocking kinds.
        const BLOCKING = Self::IDLE.bits() | Self::BLOCK.bits();
        /// Data travelling downstream.
        const DATA_DOWNSTREAM = Self::BUFFER.bits()
            | Self::BUFFER_LIST.bits()
            | Self::EVENT_DOWNSTREAM.bits();
        /// Data travelling upstream.
        const DATA_UPSTREAM = Self::EVENT_UPSTREAM.bits();
        /// Data in either direction.
        const DATA_BOTH = Self::DATA_DOWNSTREAM.bits() | Self::DATA_UPSTREAM.bits();
        /// Block downstream data.
        const BLOCK_DOWNSTREAM = Self::BLOCK.bits() | Self::DATA_DOWNSTREAM.bits();
        /// Block upstream data.
        const BLOCK_UPSTREAM = Self::BLOCK.bits() | Self::DATA_UPSTREAM.bits();
        /// Events in either direction.
        const EVENT_BOTH = Self::EVENT_DOWNSTREAM.bits() | Self::EVENT_UPSTREAM.bits();
        /// Queries in either direction.
        const QUERY_BOTH = Self::QUERY_DOWNSTREAM.bits() | Self::QUERY_UPSTREAM.bits();
        /// Every data type.
        const ALL_BOTH = Self::DATA_BOTH.bits() | Self::QUERY_BOTH.bits();
        /// Both scheduling modes.
        const SCHEDULING = Self::PUSH.bits() | Self::PULL.bits();
    }
}

impl ProbeType {
    /// Fill in an empty data-type or scheduling part so it matches anything.
    fn widened(self) -> Self {
        let mut mask = self;
        if (mask & Self::ALL_BOTH).is_empty() {
            mask |= Self::ALL_BOTH;
        }
        if (mask & Self::SCHEDULING).is_empty() {
            mask |= Self::SCHEDULING;
        }
        mask
    }

    /// Whether a probe installed with `self` fires at a checkpoint of `checkpoint`.
    fn matches(self, checkpoint: ProbeType) -> bool {
        // Idle checkpoints carry no data.
        if !checkpoint.contains(Self::IDLE) && !self.intersects(checkpoint & Self::ALL_BOTH) {
            return false;
        }
        if !self.intersects(checkpoint & Self::SCHEDULING) {
            return false;
        }
        (self & Self::BLOCKING) == (checkpoint & Self::BLOCKING)
    }
}

/// Verdict of a probe callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProbeReturn {
    /// Continue; a blocking probe keeps the pad blocked.
    #[default]
    Ok,
    /// Drop the item. Later probes are skipped.
    Drop,
    /// Uninstall this probe.
    Remove,
    /// Let the item through without blocking.
    Pass,
}

/// Identifier of an installed probe, unique per pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeId(u64);

impl ProbeId {
    /// Raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "probe#{}", self.0)
    }
}

/// Item seen by a probe.
pub enum ProbeData<'a> {
    /// A buffer.
    Buffer(Buffer),
    /// A buffer list.
    BufferList(BufferList),
    /// An event.
    Event(Event),
    /// A query, answered in place.
    Query(&'a mut Query),
}

impl fmt::Debug for ProbeData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeData::Buffer(b) => f.debug_tuple("Buffer").field(b).finish(),
            ProbeData::BufferList(l) => f.debug_tuple("BufferList").field(&l.len()).finish(),
            ProbeData::Event(e) => f.debug_tuple("Event").field(e).finish(),
            ProbeData::Query(q) => f.debug_tuple("Query").field(&q.name()).finish(),
        }
    }
}

/// What a probe callback sees at a checkpoint.
///
/// Callbacks may replace `data`; setting it to `None` drops the item.
#[derive(Debug)]
pub struct ProbeInfo<'a> {
    /// Type of the checkpoint.
    pub probe_type: ProbeType,
    /// Probe being invoked.
    pub id: Option<ProbeId>,
    /// Item passing the checkpoint; `None` at idle and pre-pull checkpoints.
    pub data: Option<ProbeData<'a>>,
    /// Requested offset for pull checkpoints.
    pub offset: u64,
    /// Requested size for pull checkpoints.
    pub size: u32,
    /// Result of the transfer that just finished, at idle checkpoints.
    pub flow_result: Option<FlowResult>,
}

impl<'a> ProbeInfo<'a> {
    pub(crate) fn new(probe_type: ProbeType, data: Option<ProbeData<'a>>) -> Self {
        Self {
            probe_type,
            id: None,
            data,
            offset: 0,
            size: 0,
            flow_result: None,
        }
    }

    /// The buffer, if the item is one.
    pub fn buffer(&self) -> Option<&Buffer> {
        match &self.data {
            Some(ProbeData::Buffer(b)) => Some(b),
            _ => None,
        }
    }

    /// Mutable buffer, if the item is one.
    pub fn buffer_mut(&mut self) -> Option<&mut Buffer> {
        match &mut self.data {
            Some(ProbeData::Buffer(b)) => Some(b),
            _ => None,
        }
    }

    /// The buffer list, if the item is one.
    pub fn buffer_list(&self) -> Option<&BufferList> {
        match &self.data {
            Some(ProbeData::BufferList(l)) => Some(l),
            _ => None,
        }
    }

    /// The event, if the item is one.
    pub fn event(&self) -> Option<&Event> {
        match &self.data {
            Some(ProbeData::Event(e)) => Some(e),
            _ => None,
        }
    }

    /// The query, if the item is one.
    pub fn query(&self) -> Option<&Query> {
        match &self.data {
            Some(ProbeData::Query(q)) => Some(q),
            _ => None,
        }
    }

    /// Mutable query, if the item is one.
    pub fn query_mut(&mut self) -> Option<&mut Query> {
        match &mut self.data {
            Some(ProbeData::Query(q)) => Some(q),
            _ => None,
        }
    }
}

pub(crate) type ProbeCallback = Arc<dyn Fn(&Pad, &mut ProbeInfo<'_>) -> ProbeReturn + Send + Sync>;

struct Probe {
    id: ProbeId,
    mask: ProbeType,
    callback: ProbeCallback,
    /// Dispatch cookie of the last dispatch that visited this probe.
    cookie: u32,
}

/// Installed probes plus the counters used to dispatch them.
#[derive(Default)]
pub(crate) struct ProbeList {
    probes: Vec<Probe>,
    next_id: u64,
    /// Incremented by every dispatch.
    dispatch_cookie: u32,
    /// Incremented by every install and removal.
    generation: u32,
    blocked: u32,
}

impl ProbeList {
    pub(crate) fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.probes.len()
    }

    fn clear(&mut self) {
        self.probes.clear();
        self.blocked = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    fn insert(&mut self, mask: ProbeType, callback: ProbeCallback) -> ProbeId {
        self.next_id += 1;
        let id = ProbeId(self.next_id);
        // Not yet visited by the dispatch in progress, if any.
        let cookie = self.dispatch_cookie.wrapping_sub(1);
        self.probes.insert(
            0,
            Probe {
                id,
                mask,
                callback,
                cookie,
            },
        );
        self.generation = self.generation.wrapping_add(1);
        id
    }

    /// Remove a probe. Returns its mask if it was installed.
    fn remove(&mut self, id: ProbeId) -> Option<ProbeType> {
        let pos = self.probes.iter().position(|p| p.id == id)?;
        let probe = self.probes.remove(pos);
        self.generation = self.generation.wrapping_add(1);
        Some(probe.mask)
    }
}

/// How a pair of block and data checkpoints ended.
pub(crate) enum Checkpoint<'a> {
    /// Continue with the (possibly replaced) item.
    Pass(ProbeData<'a>),
    /// A probe dropped the item.
    Dropped,
}

impl PadState {
    /// Drop every probe, unblocking the pad. Returns `true` if it was blocked.
    pub(crate) fn clear_probes(&mut self) -> bool {
        self.probes.clear();
        let was_blocked = self.flags.contains(PadFlags::BLOCKED);
        if was_blocked {
            self.flags.remove(PadFlags::BLOCKED);
            metrics::record_blocked(false);
        }
        was_blocked
    }
}

impl Pad {
    /// Install a probe.
    ///
    /// An empty data-type part of `mask` matches every data type and an
    /// empty scheduling part matches both modes. Probes with `BLOCK` or
    /// `IDLE` block the pad until removed; an `IDLE` probe installed while
    /// the pad is idle runs immediately.
    pub fn add_probe<F>(&self, mask: ProbeType, callback: F) -> ProbeId
    where
        F: Fn(&Pad, &mut ProbeInfo<'_>) -> ProbeReturn + Send + Sync + 'static,
    {
        let mask = mask.widened();
        let callback: ProbeCallback = Arc::new(callback);
        let mut state = self.lock();
        let id = state.probes.insert(mask, callback.clone());
        tracing::debug!(target: "padflow::probes", pad = %self.name(), %id, ?mask, "added probe");

        if mask.intersects(ProbeType::BLOCKING) {
            state.probes.blocked += 1;
            if !state.flags.contains(PadFlags::BLOCKED) {
                state.flags.insert(PadFlags::BLOCKED);
                metrics::record_blocked(true);
            }
            tracing::debug!(
                target: "padflow::probes",
                pad = %self.name(),
                blocked = state.probes.blocked,
                "added blocking probe"
            );
        }

        if mask.contains(ProbeType::IDLE) {
            if state.num_using == 0 {
                tracing::debug!(target: "padflow::probes", pad = %self.name(), %id, "pad is idle, calling probe");
                let mut info = ProbeInfo::new(ProbeType::IDLE, None);
                info.id = Some(id);
                let verdict = MutexGuard::unlocked(&mut state, || callback(self, &mut info));
                if verdict == ProbeReturn::Remove {
                    self.remove_probe_locked(&mut state, id);
                }
            } else {
                tracing::debug!(target: "padflow::probes", pad = %self.name(), %id, "pad is busy, idle probe deferred");
            }
        }
        id
    }

    /// Uninstall a probe. Returns `false` if it was not installed.
    pub fn remove_probe(&self, id: ProbeId) -> bool {
        let mut state = self.lock();
        self.remove_probe_locked(&mut state, id)
    }

    /// Number of installed probes.
    pub fn probe_count(&self) -> usize {
        self.lock().probes.len()
    }

    fn remove_probe_locked(&self, state: &mut ObjectGuard<'_>, id: ProbeId) -> bool {
        let Some(mask) = state.probes.remove(id) else {
            tracing::warn!(target: "padflow::probes", pad = %self.name(), %id, "removing unknown probe");
            return false;
        };
        tracing::debug!(target: "padflow::probes", pad = %self.name(), %id, "removed probe");
        if mask.intersects(ProbeType::BLOCKING) {
            state.probes.blocked = state.probes.blocked.saturating_sub(1);
            if state.probes.blocked == 0 && state.flags.contains(PadFlags::BLOCKED) {
                tracing::debug!(target: "padflow::probes", pad = %self.name(), "last blocking probe removed, unblocking");
                state.flags.remove(PadFlags::BLOCKED);
                metrics::record_blocked(false);
                self.block_broadcast();
            }
        }
        true
    }

    /// Dispatch the probes matching `info.probe_type`.
    ///
    /// Returns `Ok(CustomSuccess)` when a probe dropped the item,
    /// `Err(WrongState)` when the pad flushed while blocked, `Ok(Ok)` when the
    /// item may pass early, and `default` otherwise.
    pub(crate) fn run_probes(
        &self,
        state: &mut ObjectGuard<'_>,
        info: &mut ProbeInfo<'_>,
        default: FlowResult,
    ) -> FlowResult {
        let is_block = info.probe_type.contains(ProbeType::BLOCK);
        state.probes.dispatch_cookie = state.probes.dispatch_cookie.wrapping_add(1);
        let cookie = state.probes.dispatch_cookie;

        let mut dropped = false;
        let mut passed = false;
        let mut marshalled = false;

        tracing::trace!(target: "padflow::probes", pad = %self.name(), cookie, ty = ?info.probe_type, "running probes");

        let mut generation = state.probes.generation;
        let mut idx = 0;
        while let Some(probe) = state.probes.probes.get_mut(idx) {
            if probe.cookie == cookie {
                idx += 1;
                continue;
            }
            probe.cookie = cookie;
            if !probe.mask.matches(info.probe_type) {
                idx += 1;
                continue;
            }

            let id = probe.id;
            let callback = probe.callback.clone();
            info.id = Some(id);
            marshalled = true;
            let verdict = MutexGuard::unlocked(state, || callback(self, info));
            tracing::trace!(target: "padflow::probes", pad = %self.name(), %id, ?verdict, "probe returned");

            match verdict {
                ProbeReturn::Remove => {
                    self.remove_probe_locked(state, id);
                }
                ProbeReturn::Drop => {
                    info.data = None;
                    info.probe_type = ProbeType::empty();
                    dropped = true;
                }
                ProbeReturn::Pass => passed = true,
                ProbeReturn::Ok => {}
            }
            if dropped {
                break;
            }

            if state.probes.generation != generation {
                // The list changed while unlocked; visited probes keep this
                // dispatch's cookie and are skipped on the rescan.
                tracing::trace!(target: "padflow::probes", pad = %self.name(), "probe list changed, restarting");
                generation = state.probes.generation;
                idx = 0;
            } else {
                idx += 1;
            }
        }

        if dropped {
            tracing::debug!(target: "padflow::probes", pad = %self.name(), "item dropped by probe");
            metrics::record_item_dropped(self.name());
            return Ok(FlowSuccess::CustomSuccess);
        }
        if (!marshalled && is_block) || passed {
            return Ok(FlowSuccess::Ok);
        }

        if is_block {
            while state.flags.contains(PadFlags::BLOCKED) {
                if state.is_flushing() {
                    tracing::debug!(target: "padflow::probes", pad = %self.name(), "pad is flushing");
                    return Err(FlowError::WrongState);
                }
                tracing::debug!(target: "padflow::probes", pad = %self.name(), "waiting to be unblocked or set flushing");
                state.flags.insert(PadFlags::BLOCKING);
                self.block_wait(state);
                state.flags.remove(PadFlags::BLOCKING);
                if state.is_flushing() {
                    tracing::debug!(target: "padflow::probes", pad = %self.name(), "pad is flushing");
                    return Err(FlowError::WrongState);
                }
            }
        }
        default
    }

    /// Run the block checkpoint then the data checkpoint for `data`.
    ///
    /// `probe_type` carries the data-type and scheduling bits; the block bit
    /// is added for the first checkpoint.
    pub(crate) fn run_data_probes<'a>(
        &self,
        state: &mut ObjectGuard<'_>,
        probe_type: ProbeType,
        data: ProbeData<'a>,
    ) -> Result<Checkpoint<'a>, FlowError> {
        if state.probes.is_empty() {
            return Ok(Checkpoint::Pass(data));
        }
        let data = match self.run_checkpoint(state, probe_type | ProbeType::BLOCK, data)? {
            Checkpoint::Pass(data) => data,
            Checkpoint::Dropped => return Ok(Checkpoint::Dropped),
        };
        self.run_checkpoint(state, probe_type, data)
    }

    /// Run one checkpoint for `data`.
    pub(crate) fn run_checkpoint<'a>(
        &self,
        state: &mut ObjectGuard<'_>,
        probe_type: ProbeType,
        data: ProbeData<'a>,
    ) -> Result<Checkpoint<'a>, FlowError> {
        if state.probes.is_empty() {
            return Ok(Checkpoint::Pass(data));
        }
        let mut info = ProbeInfo::new(probe_type, Some(data));
        match self.run_probes(state, &mut info, Ok(FlowSuccess::Ok))? {
            FlowSuccess::CustomSuccess => Ok(Checkpoint::Dropped),
            FlowSuccess::Ok => match info.data {
                Some(data) => Ok(Checkpoint::Pass(data)),
                None => Ok(Checkpoint::Dropped),
            },
        }
    }

    /// Fire idle probes after the last in-flight transfer finished.
    pub(crate) fn run_idle_probes(
        &self,
        state: &mut ObjectGuard<'_>,
        scheduling: ProbeType,
        result: FlowResult,
    ) {
        if state.probes.is_empty() {
            return;
        }
        let mut info = ProbeInfo::new(scheduling | ProbeType::IDLE, None);
        info.flow_result = Some(result);
        let _ = self.run_probes(state, &mut info, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::PadDirection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_widen_empty_parts() {
        let mask = ProbeType::BLOCK.widened();
        assert!(mask.contains(ProbeType::ALL_BOTH | ProbeType::SCHEDULING | ProbeType::BLOCK));
        let mask = (ProbeType::BUFFER | ProbeType::PULL).widened();
        assert_eq!(mask, ProbeType::BUFFER | ProbeType::PULL);
    }

    #[test]
    fn test_matching_rules() {
        let data = (ProbeType::BUFFER).widened();
        assert!(data.matches(ProbeType::BUFFER | ProbeType::PUSH));
        assert!(!data.matches(ProbeType::BUFFER | ProbeType::PUSH | ProbeType::BLOCK));
        assert!(!data.matches(ProbeType::EVENT_DOWNSTREAM | ProbeType::PUSH));

        let block = ProbeType::BLOCK_DOWNSTREAM.widened();
        assert!(block.matches(ProbeType::EVENT_DOWNSTREAM | ProbeType::PUSH | ProbeType::BLOCK));
        assert!(!block.matches(ProbeType::EVENT_DOWNSTREAM | ProbeType::PUSH));

        let idle = ProbeType::IDLE.widened();
        assert!(idle.matches(ProbeType::PUSH | ProbeType::IDLE));
        assert!(!idle.matches(ProbeType::BUFFER | ProbeType::PUSH | ProbeType::BLOCK));

        let pull_only = (ProbeType::BUFFER | ProbeType::PULL).widened();
        assert!(!pull_only.matches(ProbeType::BUFFER | ProbeType::PUSH));
        assert!(pull_only.matches(ProbeType::BUFFER | ProbeType::PULL));
    }

    #[test]
    fn test_blocking_probe_sets_blocked() {
        let pad = Pad::new("src", PadDirection::Src);
        let id = pad.add_probe(ProbeType::BLOCK_DOWNSTREAM, |_, _| ProbeReturn::Ok);
        assert!(pad.is_blocked());
        assert!(!pad.is_blocking());
        assert!(pad.remove_probe(id));
        assert!(!pad.is_blocked());
        assert!(!pad.remove_probe(id));
    }

    #[test]
    fn test_clearing_probes_unblocks() {
        let pad = Pad::new("src", PadDirection::Src);
        pad.add_probe(ProbeType::BLOCK_DOWNSTREAM, |_, _| ProbeReturn::Ok);
        pad.add_probe(ProbeType::IDLE, |_, _| ProbeReturn::Ok);
        assert!(pad.is_blocked());

        let mut state = pad.lock();
        assert!(state.clear_probes());
        assert!(state.probes.is_empty());
        assert_eq!(state.probes.blocked, 0);
        assert!(!state.flags.contains(PadFlags::BLOCKED));
        assert!(!state.clear_probes());
        drop(state);
        assert!(!pad.is_blocked());
    }

    #[test]
    fn test_idle_probe_runs_when_idle() {
        let pad = Pad::new("src", PadDirection::Src);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let id = pad.add_probe(ProbeType::IDLE, move |_, info| {
            assert_eq!(info.probe_type, ProbeType::IDLE);
            assert!(info.data.is_none());
            c.fetch_add(1, Ordering::SeqCst);
            ProbeReturn::Ok
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(pad.is_blocked());
        pad.remove_probe(id);
    }

    #[test]
    fn test_idle_probe_remove_on_install() {
        let pad = Pad::new("src", PadDirection::Src);
        pad.add_probe(ProbeType::IDLE, |_, _| ProbeReturn::Remove);
        assert_eq!(pad.probe_count(), 0);
        assert!(!pad.is_blocked());
    }

    #[test]
    fn test_ids_are_unique() {
        let pad = Pad::new("src", PadDirection::Src);
        let a = pad.add_probe(ProbeType::BUFFER, |_, _| ProbeReturn::Ok);
        let b = pad.add_probe(ProbeType::BUFFER, |_, _| ProbeReturn::Ok);
        assert_ne!(a, b);
        pad.remove_probe(a);
        let c = pad.add_probe(ProbeType::BUFFER, |_, _| ProbeReturn::Ok);
        assert_ne!(a, c);
        assert_eq!(pad.probe_count(), 2);
    }

    #[test]
    fn test_probe_added_during_dispatch_runs_once() {
        let pad = Pad::new("src", PadDirection::Src);
        let inner_calls = Arc::new(AtomicUsize::new(0));
        let ic = inner_calls.clone();
        pad.add_probe(ProbeType::BUFFER, move |pad, _| {
            let ic = ic.clone();
            pad.add_probe(ProbeType::BUFFER, move |_, _| {
                ic.fetch_add(1, Ordering::SeqCst);
                ProbeReturn::Ok
            });
            ProbeReturn::Remove
        });

        let mut state = pad.lock();
        let mut info = ProbeInfo::new(
            ProbeType::BUFFER | ProbeType::PUSH,
            Some(ProbeData::Buffer(Buffer::empty())),
        );
        let ret = pad.run_probes(&mut state, &mut info, Ok(FlowSuccess::Ok));
        drop(state);
        assert_eq!(ret, Ok(FlowSuccess::Ok));
        assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pad.probe_count(), 1);
    }
}
