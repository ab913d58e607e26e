//! Queries and caps negotiation helpers.
//!
//! A query runs synchronously on the calling thread. Probes see it at a
//! `PUSH` checkpoint on the way in and, once answered, at a `PULL`
//! checkpoint on the way out; they may inspect or rewrite the answer in
//! place.

use super::probe::Checkpoint;
use super::{ObjectGuard, Pad, PadFlags, ProbeData, ProbeType};
use crate::caps::Caps;
use crate::query::{Query, QueryKind};

impl Pad {
    /// Run `query` on this pad.
    ///
    /// Returns whether the query was answered. A probe dropping the query
    /// counts as unanswered.
    pub fn query(&self, query: &mut Query) -> bool {
        let probe_type = if self.is_src() {
            ProbeType::QUERY_UPSTREAM
        } else {
            ProbeType::QUERY_DOWNSTREAM
        };
        tracing::debug!(target: "padflow::pad", pad = %self.name(), query = query.name(), "sending query");

        let mut state = self.lock();
        if !self.query_checkpoint(&mut state, probe_type | ProbeType::PUSH | ProbeType::BLOCK, query)
            || !self.query_checkpoint(&mut state, probe_type | ProbeType::PUSH, query)
        {
            return false;
        }
        drop(state);

        let answered = self.call_query_function(query);
        tracing::debug!(target: "padflow::pad", pad = %self.name(), query = query.name(), answered, "sent query");
        if !answered {
            return false;
        }

        let mut state = self.lock();
        self.query_checkpoint(&mut state, probe_type | ProbeType::PULL, query)
    }

    /// Run `query` on the peer of this pad. `false` without a peer.
    pub fn peer_query(&self, query: &mut Query) -> bool {
        let probe_type = if self.is_src() {
            ProbeType::QUERY_DOWNSTREAM
        } else {
            ProbeType::QUERY_UPSTREAM
        };
        tracing::debug!(target: "padflow::pad", pad = %self.name(), query = query.name(), "peer query");

        let mut state = self.lock();
        if !self.query_checkpoint(&mut state, probe_type | ProbeType::PUSH | ProbeType::BLOCK, query)
            || !self.query_checkpoint(&mut state, probe_type | ProbeType::PUSH, query)
        {
            return false;
        }
        let Some(peer) = state.peer() else {
            tracing::warn!(target: "padflow::pad", pad = %self.name(), query = query.name(), "pad has no peer");
            return false;
        };
        drop(state);

        let answered = peer.query(query);
        drop(peer);
        if !answered {
            tracing::debug!(target: "padflow::pad", pad = %self.name(), query = query.name(), "peer query failed");
            return false;
        }

        let mut state = self.lock();
        self.query_checkpoint(&mut state, probe_type | ProbeType::PULL, query)
    }

    fn query_checkpoint(
        &self,
        state: &mut ObjectGuard<'_>,
        probe_type: ProbeType,
        query: &mut Query,
    ) -> bool {
        match self.run_checkpoint(state, probe_type, ProbeData::Query(query)) {
            Ok(Checkpoint::Pass(ProbeData::Query(_))) => true,
            Ok(Checkpoint::Pass(other)) => {
                tracing::error!(target: "padflow::probes", pad = %self.name(), item = ?other, "probe replaced query with a non-query item");
                false
            }
            Ok(Checkpoint::Dropped) => {
                tracing::debug!(target: "padflow::pad", pad = %self.name(), "query dropped by probe");
                false
            }
            Err(err) => {
                tracing::debug!(target: "padflow::pad", pad = %self.name(), %err, "probe stopped query");
                false
            }
        }
    }

    fn call_query_function(&self, query: &mut Query) -> bool {
        match self.functions().query.clone() {
            Some(query_fn) => query_fn(self, query),
            None => self.query_default(query),
        }
    }

    /// Default query handling.
    ///
    /// Caps and accept-caps are answered from this pad's own caps, going
    /// through the internal links first for `PROXY_CAPS` pads. Scheduling
    /// queries are not answered. Anything else is handed to the peers of the
    /// internally linked pads until one answers.
    pub fn query_default(&self, query: &mut Query) -> bool {
        match query.kind() {
            QueryKind::Scheduling { .. } => false,
            QueryKind::AcceptCaps { .. } => self.accept_caps_default(query),
            QueryKind::Caps { .. } => self.caps_default(query),
            _ => self.forward(|internal| internal.peer_query(query)),
        }
    }

    fn accept_caps_default(&self, query: &mut Query) -> bool {
        if self.flags().contains(PadFlags::PROXY_CAPS) && self.proxy_query_accept_caps(query) {
            return true;
        }
        let QueryKind::AcceptCaps { caps, .. } = query.kind() else {
            return false;
        };
        let allowed = self.query_caps(None);
        let accepted = caps.is_subset(&allowed);
        tracing::debug!(target: "padflow::caps", pad = %self.name(), %caps, %allowed, accepted, "accept-caps");
        query.set_accept_caps_result(accepted);
        true
    }

    fn caps_default(&self, query: &mut Query) -> bool {
        let QueryKind::Caps { filter, .. } = query.kind() else {
            return false;
        };
        let filter = filter.clone();

        if self.flags().contains(PadFlags::PROXY_CAPS) && self.proxy_query_caps(query) {
            // Already filtered by the internal links.
            return true;
        }

        let fixed = self.flags().contains(PadFlags::FIXED_CAPS);
        let current = self.current_caps();
        let result = match (fixed, current) {
            (true, Some(current)) => {
                tracing::trace!(target: "padflow::caps", pad = %self.name(), "fixed pad caps: using negotiated caps");
                current
            }
            (_, current) => match (self.template(), current) {
                (Some(template), _) => template.caps.clone(),
                (None, Some(current)) => current,
                (None, None) => {
                    tracing::trace!(target: "padflow::caps", pad = %self.name(), "no template, any caps");
                    Caps::any()
                }
            },
        };
        let result = match &filter {
            Some(filter) => filter.intersect(&result),
            None => result,
        };
        tracing::debug!(target: "padflow::caps", pad = %self.name(), caps = %result, "caps query answered");
        query.set_caps_result(result);
        true
    }

    /// Caps this pad can handle, restricted to `filter`.
    ///
    /// Falls back to `filter`, or to any caps, when the query is not
    /// answered.
    pub fn query_caps(&self, filter: Option<&Caps>) -> Caps {
        let mut query = Query::new_caps(filter.cloned());
        let answered = self.query(&mut query);
        caps_answer(answered, &query, filter)
    }

    /// Caps the peer of this pad can handle, restricted to `filter`.
    pub fn peer_query_caps(&self, filter: Option<&Caps>) -> Caps {
        let mut query = Query::new_caps(filter.cloned());
        let answered = self.peer_query(&mut query);
        caps_answer(answered, &query, filter)
    }

    /// Whether this pad accepts `caps`. `true` when the query is not
    /// answered.
    pub fn query_accept_caps(&self, caps: &Caps) -> bool {
        let mut query = Query::new_accept_caps(caps.clone());
        if self.query(&mut query) {
            query.accept_caps_result().unwrap_or(true)
        } else {
            true
        }
    }

    /// Whether the peer of this pad accepts `caps`. `true` without a peer.
    pub fn peer_query_accept_caps(&self, caps: &Caps) -> bool {
        let mut query = Query::new_accept_caps(caps.clone());
        if self.peer_query(&mut query) {
            query.accept_caps_result().unwrap_or(true)
        } else {
            true
        }
    }

    /// Caps both this pad and its peer can handle. `None` without a peer.
    pub fn allowed_caps(&self) -> Option<Caps> {
        let peer = self.peer()?;
        let mine = self.query_caps(None);
        let theirs = peer.query_caps(None);
        let allowed = mine.intersect(&theirs);
        tracing::debug!(target: "padflow::caps", pad = %self.name(), caps = %allowed, "allowed caps");
        Some(allowed)
    }

    /// Answer a caps query with what the peers of the internally linked
    /// pads can handle, intersected with this pad's template.
    pub fn proxy_query_caps(&self, query: &mut Query) -> bool {
        let QueryKind::Caps { filter, .. } = query.kind() else {
            return false;
        };
        let filter = filter.clone();
        let mut result = filter.clone().unwrap_or_else(Caps::any);
        self.forward(|internal| {
            let peer_caps = internal.peer_query_caps(filter.as_ref());
            tracing::trace!(target: "padflow::caps", pad = %self.name(), internal = %internal.name(), caps = %peer_caps, "proxied caps");
            result = result.intersect(&peer_caps);
            false
        });
        let result = result.intersect(&self.template_caps());
        tracing::debug!(target: "padflow::caps", pad = %self.name(), caps = %result, "proxy caps query answered");
        query.set_caps_result(result);
        true
    }

    /// Ask the peers of the internally linked pads whether they accept the
    /// caps of `query`. Returns `true` once one of them does, leaving the
    /// answer in `query`.
    pub fn proxy_query_accept_caps(&self, query: &mut Query) -> bool {
        if !matches!(query.kind(), QueryKind::AcceptCaps { .. }) {
            return false;
        }
        self.forward(|internal| {
            internal.peer_query(query) && query.accept_caps_result() == Some(true)
        })
    }
}

fn caps_answer(answered: bool, query: &Query, filter: Option<&Caps>) -> Caps {
    let fallback = || filter.cloned().unwrap_or_else(Caps::any);
    if answered {
        query.caps_result().cloned().unwrap_or_else(fallback)
    } else {
        fallback()
    }
}
