//! Per-section rendering lifecycle state.
//!
//! The state and a *dirty-cycle version* are packed into one `AtomicU32` so that
//! a worker dequeuing a job and the main thread re-marking the section race on a
//! single compare-and-swap. The version is bumped every time the section enters
//! [`SectionState::AwaitingMesh`]; a job or result that carries an older version
//! is stale and is dropped.
//!
//! ```text
//!   Empty ──┐
//!           ├─ mark_awaiting ─▶ AwaitingMesh ─ begin_meshing ─▶ Meshing ─ finish ─▶ Rendered
//! Rendered ─┘                        ▲                             │                 / Empty
//!                                    └──────── mark_awaiting ──────┘
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

const STATE_BITS: u32 = 2;
const STATE_MASK: u32 = (1 << STATE_BITS) - 1;
const VERSION_MASK: u32 = u32::MAX >> STATE_BITS;

/// Rendering pipeline phase of one section.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionState {
    /// No geometry: never meshed, or meshed to nothing.
    Empty = 0,
    /// Block data (or a neighbour's) changed; a mesh job is wanted.
    AwaitingMesh = 1,
    /// A worker has dequeued the job for the current version.
    Meshing = 2,
    /// Geometry for the current version is uploaded.
    Rendered = 3,
}

impl SectionState {
    fn from_bits(bits: u32) -> Self {
        match bits & STATE_MASK {
            0 => SectionState::Empty,
            1 => SectionState::AwaitingMesh,
            2 => SectionState::Meshing,
            _ => SectionState::Rendered,
        }
    }
}

#[inline]
fn pack(state: SectionState, version: u32) -> u32 {
    ((version & VERSION_MASK) << STATE_BITS) | state as u32
}

#[inline]
fn unpack(raw: u32) -> (SectionState, u32) {
    (SectionState::from_bits(raw), raw >> STATE_BITS)
}

/// Lock-free holder of a section's [`SectionState`] and dirty-cycle version.
#[derive(Debug)]
pub struct AtomicSectionState(AtomicU32);

impl Default for AtomicSectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicSectionState {
    pub fn new() -> Self {
        Self(AtomicU32::new(pack(SectionState::Empty, 0)))
    }

    /// Current state and version.
    pub fn load(&self) -> (SectionState, u32) {
        unpack(self.0.load(Ordering::Acquire))
    }

    pub fn state(&self) -> SectionState {
        self.load().0
    }

    pub fn version(&self) -> u32 {
        self.load().1
    }

    /// Enters `AwaitingMesh`, starting a new dirty cycle unless one is already open.
    ///
    /// Returns the version a mesh job must carry for this cycle.
    pub fn mark_awaiting(&self) -> u32 {
        let result = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
            let (state, version) = unpack(raw);
            match state {
                SectionState::AwaitingMesh => None,
                _ => Some(pack(
                    SectionState::AwaitingMesh,
                    version.wrapping_add(1) & VERSION_MASK,
                )),
            }
        });

        match result {
            Ok(previous) => unpack(previous).1.wrapping_add(1) & VERSION_MASK,
            Err(current) => unpack(current).1,
        }
    }

    /// `AwaitingMesh → Meshing`, only if the cycle is still `version`.
    pub fn begin_meshing(&self, version: u32) -> bool {
        self.0
            .compare_exchange(
                pack(SectionState::AwaitingMesh, version),
                pack(SectionState::Meshing, version),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Meshing → Rendered | Empty`, only if the cycle is still `version`.
    pub fn finish(&self, version: u32, outcome: SectionState) -> bool {
        debug_assert!(matches!(
            outcome,
            SectionState::Rendered | SectionState::Empty
        ));
        self.0
            .compare_exchange(
                pack(SectionState::Meshing, version),
                pack(outcome, version),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `true` if the section is `Meshing` for exactly this cycle.
    pub fn is_meshing(&self, version: u32) -> bool {
        self.load() == (SectionState::Meshing, version)
    }
}
