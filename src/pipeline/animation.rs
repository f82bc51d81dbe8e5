//! Property animations running on the pipeline thread.
//!
//! An animation is created by a command carrying its target value; the start
//! value is captured from the node when the animation is attached. Every
//! frame the manager advances each animation by the time elapsed since its
//! previous frame and writes the interpolated value into the node's
//! properties. Interpolation is linear; easing curves are evaluated by the
//! producer, which may split a curve into several linear segments.

use crate::common::AnimationId;
use crate::transaction::{Marshal, MarshalError, Parcel};

use super::properties::{PropertyUpdate, RenderProperties};

/// Repeat forever.
pub const REPEAT_INFINITE: i32 = -1;

/// Description of an animation as sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderAnimation {
    pub id: AnimationId,
    /// End value, which also names the animated property.
    pub target: PropertyUpdate,
    pub duration_ns: u64,
    pub delay_ns: u64,
    /// Number of iterations, [`REPEAT_INFINITE`] to loop. `0` is treated as `1`.
    pub repeat_count: i32,
    /// Run every other iteration backwards.
    pub auto_reverse: bool,
}

impl RenderAnimation {
    pub fn new(id: AnimationId, target: PropertyUpdate, duration_ns: u64) -> Self {
        Self {
            id,
            target,
            duration_ns,
            delay_ns: 0,
            repeat_count: 1,
            auto_reverse: false,
        }
    }

    pub fn delay(mut self, delay_ns: u64) -> Self {
        self.delay_ns = delay_ns;
        self
    }

    pub fn repeat(mut self, repeat_count: i32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    pub fn auto_reverse(mut self, auto_reverse: bool) -> Self {
        self.auto_reverse = auto_reverse;
        self
    }

    fn iterations(&self) -> Option<u64> {
        match self.repeat_count {
            REPEAT_INFINITE => None,
            n if n <= 0 => Some(1),
            n => Some(n as u64),
        }
    }
}

impl Marshal for RenderAnimation {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        self.id.marshal(parcel)?;
        self.target.marshal(parcel)?;
        self.duration_ns.marshal(parcel)?;
        self.delay_ns.marshal(parcel)?;
        self.repeat_count.marshal(parcel)?;
        self.auto_reverse.marshal(parcel)
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        Ok(Self {
            id: Marshal::unmarshal(parcel)?,
            target: Marshal::unmarshal(parcel)?,
            duration_ns: Marshal::unmarshal(parcel)?,
            delay_ns: Marshal::unmarshal(parcel)?,
            repeat_count: Marshal::unmarshal(parcel)?,
            auto_reverse: Marshal::unmarshal(parcel)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationState {
    Running,
    Paused,
}

#[derive(Debug)]
struct ActiveAnimation {
    params: RenderAnimation,
    from: PropertyUpdate,
    state: AnimationState,
    /// Running time accumulated so far, delay included.
    elapsed_ns: u64,
    /// Timestamp of the frame that last advanced this animation.
    last_frame_ns: u64,
}

/// Result of advancing a node's animations by one frame.
#[derive(Debug, Default, PartialEq)]
pub struct AnimateResult {
    /// Some animation still needs future frames.
    pub running: bool,
    /// Properties were written this frame.
    pub changed: bool,
    pub finished: Vec<AnimationId>,
}

/// Animations attached to one render node.
#[derive(Debug, Default)]
pub struct AnimationManager {
    animations: Vec<ActiveAnimation>,
}

impl AnimationManager {
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn contains(&self, id: AnimationId) -> bool {
        self.animations.iter().any(|a| a.params.id == id)
    }

    pub fn state(&self, id: AnimationId) -> Option<AnimationState> {
        self.animations
            .iter()
            .find(|a| a.params.id == id)
            .map(|a| a.state)
    }

    /// Attach an animation starting from the current property value.
    /// An animation already running on the same property is replaced.
    /// Returns the id of the replaced animation, if any.
    pub fn add(
        &mut self,
        params: RenderAnimation,
        properties: &RenderProperties,
        start_ns: u64,
    ) -> Option<AnimationId> {
        let kind = params.target.kind();
        let replaced = self
            .animations
            .iter()
            .position(|a| a.params.target.kind() == kind)
            .map(|index| self.animations.remove(index).params.id);
        self.animations.push(ActiveAnimation {
            from: properties.get(kind),
            params,
            state: AnimationState::Running,
            elapsed_ns: 0,
            last_frame_ns: start_ns,
        });
        replaced
    }

    pub fn pause(&mut self, id: AnimationId) -> bool {
        self.set_state(id, AnimationState::Paused)
    }

    pub fn resume(&mut self, id: AnimationId) -> bool {
        self.set_state(id, AnimationState::Running)
    }

    /// Jump to the end value and remove the animation.
    pub fn finish(&mut self, id: AnimationId, properties: &mut RenderProperties) -> bool {
        let Some(index) = self.animations.iter().position(|a| a.params.id == id) else {
            return false;
        };
        let animation = self.animations.remove(index);
        properties.apply(&final_value(&animation));
        true
    }

    /// Stop at the current value and remove the animation.
    pub fn cancel(&mut self, id: AnimationId) -> bool {
        let before = self.animations.len();
        self.animations.retain(|a| a.params.id != id);
        before != self.animations.len()
    }

    /// Advance every animation to `timestamp_ns`, writing values into `properties`.
    pub fn animate(&mut self, timestamp_ns: u64, properties: &mut RenderProperties) -> AnimateResult {
        let mut result = AnimateResult::default();

        self.animations.retain_mut(|animation| {
            let delta = timestamp_ns.saturating_sub(animation.last_frame_ns);
            animation.last_frame_ns = timestamp_ns;

            if animation.state == AnimationState::Paused {
                return true;
            }

            animation.elapsed_ns = animation.elapsed_ns.saturating_add(delta);
            let params = &animation.params;
            if animation.elapsed_ns < params.delay_ns {
                result.running = true;
                return true;
            }

            let active = animation.elapsed_ns - params.delay_ns;
            let finished = match params.iterations() {
                _ if params.duration_ns == 0 => true,
                Some(iterations) => active >= params.duration_ns.saturating_mul(iterations),
                None => false,
            };

            if finished {
                result.changed |= properties.apply(&final_value(animation));
                result.finished.push(params.id);
                return false;
            }

            let iteration = active / params.duration_ns;
            let mut t = (active % params.duration_ns) as f32 / params.duration_ns as f32;
            if params.auto_reverse && iteration % 2 == 1 {
                t = 1.0 - t;
            }
            if let Some(value) = animation.from.interpolate(&params.target, t) {
                result.changed |= properties.apply(&value);
            }
            result.running = true;
            true
        });

        result
    }

    fn set_state(&mut self, id: AnimationId, state: AnimationState) -> bool {
        match self.animations.iter_mut().find(|a| a.params.id == id) {
            Some(animation) => {
                animation.state = state;
                true
            }
            None => false,
        }
    }
}

fn final_value(animation: &ActiveAnimation) -> PropertyUpdate {
    let params = &animation.params;
    let ends_reversed = params.auto_reverse && params.iterations().is_some_and(|n| n % 2 == 0);
    if ends_reversed {
        animation.from
    } else {
        params.target
    }
}
