//! Activation: switching a pad between `None`, `Push` and `Pull` mode.

use super::sticky::prepare_event_update;
use super::{Pad, PadFlags, PadMode};
use crate::error::{Error, Result};
use parking_lot::MutexGuard;

impl Pad {
    /// Activate or deactivate the pad.
    ///
    /// Activation runs the pad's activate function, which defaults to
    /// push mode. Deactivation leaves whatever mode the pad is in.
    /// Requests matching the current state are no-ops.
    pub fn set_active(&self, active: bool) -> Result<()> {
        let old = self.mode();
        let result = if active {
            if old == PadMode::None {
                tracing::debug!(target: "padflow::pad", pad = %self.name(), "activating pad");
                match &self.functions().activate {
                    Some(activate) => activate(self),
                    None => self.activate_mode(PadMode::Push, true),
                }
            } else {
                tracing::debug!(target: "padflow::pad", pad = %self.name(), mode = ?old, "pad was active");
                Ok(())
            }
        } else if old == PadMode::None {
            tracing::debug!(target: "padflow::pad", pad = %self.name(), "pad was inactive");
            Ok(())
        } else {
            tracing::debug!(target: "padflow::pad", pad = %self.name(), mode = ?old, "deactivating pad");
            self.activate_mode(old, false)
        };

        match result {
            Ok(()) => {
                if !active {
                    self.lock().flags.remove(PadFlags::NEED_RECONFIGURE);
                }
                Ok(())
            }
            Err(err) => {
                let mut state = self.lock();
                tracing::warn!(
                    target: "padflow::pad",
                    pad = %self.name(),
                    active,
                    %err,
                    "failed to change activation"
                );
                state.flags.insert(PadFlags::FLUSHING);
                state.mode = old;
                Err(err)
            }
        }
    }

    /// Activate or deactivate the pad in push mode.
    pub fn activate_push(&self, active: bool) -> Result<()> {
        self.activate_mode(PadMode::Push, active)
    }

    /// Activate or deactivate the pad in pull mode.
    ///
    /// Activating a sink pad first activates its peer in pull mode, so the
    /// sink must be linked. A source pad needs a getrange function.
    pub fn activate_pull(&self, active: bool) -> Result<()> {
        self.activate_mode(PadMode::Pull, active)
    }

    /// Activate or deactivate the pad in `mode`.
    ///
    /// Switching from the other active mode deactivates it first.
    pub fn activate_mode(&self, mode: PadMode, active: bool) -> Result<()> {
        if mode == PadMode::None {
            return Err(Error::misuse(self.name(), "cannot activate in mode None"));
        }
        let old = self.mode();
        let new = if active { mode } else { PadMode::None };
        if old == new {
            tracing::debug!(target: "padflow::pad", pad = %self.name(), ?mode, active, "already in requested mode");
            return Ok(());
        }

        if !active && old != mode {
            tracing::debug!(target: "padflow::pad", pad = %self.name(), ?mode, actual = ?old, "deactivating in the active mode instead");
            return self.activate_mode(old, false);
        }

        if active && old != PadMode::None && old != mode {
            tracing::debug!(target: "padflow::pad", pad = %self.name(), from = ?old, to = ?mode, "switching mode");
            if let Err(err) = self.activate_mode(old, false) {
                tracing::warn!(target: "padflow::pad", pad = %self.name(), "failed to deactivate old mode");
                return Err(err);
            }
        }

        if mode == PadMode::Pull {
            if self.is_sink() {
                match self.peer() {
                    Some(peer) => {
                        tracing::debug!(target: "padflow::pad", pad = %self.name(), peer = %peer.name(), active, "propagating pull activation to peer");
                        if let Err(err) = peer.activate_mode(PadMode::Pull, active) {
                            tracing::warn!(target: "padflow::pad", pad = %self.name(), peer = %peer.name(), "peer refused pull mode");
                            return Err(err);
                        }
                    }
                    None if active => {
                        tracing::warn!(target: "padflow::pad", pad = %self.name(), "cannot activate unlinked sink in pull mode");
                        return Err(self.activation_error(mode, active));
                    }
                    None => {}
                }
            } else if active && self.functions().getrange.is_none() {
                tracing::warn!(target: "padflow::pad", pad = %self.name(), "pull mode needs a getrange function");
                return Err(self.activation_error(mode, active));
            }
        }

        self.pre_activate(new);

        let function = match mode {
            PadMode::Push => self.functions().activate_push.clone(),
            _ => self.functions().activate_pull.clone(),
        };
        if let Some(function) = function {
            if let Err(err) = function(self, active) {
                let mut state = self.lock();
                tracing::info!(
                    target: "padflow::pad",
                    pad = %self.name(),
                    ?mode,
                    active,
                    %err,
                    "activation function failed"
                );
                state.flags.insert(PadFlags::FLUSHING);
                state.mode = old;
                return Err(err);
            }
        }

        self.post_activate(new);
        tracing::debug!(target: "padflow::pad", pad = %self.name(), ?mode, active, "activation done");
        Ok(())
    }

    fn activation_error(&self, mode: PadMode, active: bool) -> Error {
        Error::Activation {
            pad: self.name().to_string(),
            mode,
            active,
        }
    }

    /// Commit the mode before the activation function runs.
    fn pre_activate(&self, new: PadMode) {
        let mut state = self.lock();
        match new {
            PadMode::None => {
                tracing::debug!(target: "padflow::pad", pad = %self.name(), "setting pad flushing");
                state.flags.insert(PadFlags::FLUSHING);
                state.mode = new;
                // Release threads parked on blocking probes.
                self.block_broadcast();
            }
            PadMode::Push | PadMode::Pull => {
                tracing::debug!(target: "padflow::pad", pad = %self.name(), mode = ?new, "clearing flushing");
                state.flags.remove(PadFlags::FLUSHING);
                state.mode = new;
                if self.is_sink() {
                    // Have the peer's sticky events replayed on this pad.
                    let Some(peer) = state.peer() else {
                        return;
                    };
                    MutexGuard::unlocked(&mut state, || {
                        let src_state = peer.lock();
                        let mut sink_state = self.lock();
                        if src_state.peer_is(self) {
                            prepare_event_update(&src_state, &mut sink_state);
                        }
                        drop(sink_state);
                        drop(src_state);
                        drop(peer);
                    });
                }
            }
        }
    }

    /// Wait for streaming to stop after deactivation and drop the sticky events.
    fn post_activate(&self, new: PadMode) {
        if new != PadMode::None {
            return;
        }
        let _stream = self.stream_lock();
        tracing::debug!(target: "padflow::pad", pad = %self.name(), "stopped streaming");
        let mut state = self.lock();
        state.events.clear();
        state.flags.remove(PadFlags::NEED_EVENTS);
    }
}
