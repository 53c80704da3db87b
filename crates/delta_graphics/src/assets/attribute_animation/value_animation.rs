//! Keyframed value track

use std::ops::{Add, Mul, Sub};

use super::easing::Easing;

/// Values a [`ValueAnimation`] can interpolate
pub trait Animatable: Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self> {}

impl<T> Animatable for T where T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f32, Output = T> {}

/// One sample of a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyFrame<T> {
    /// Absolute time of the sample
    pub time: f32,
    /// Value reached at `time`
    pub value: T,
    /// Curve used to reach this key from the previous one
    pub easing: Easing,
}

/// A sequence of eased keyframes played over time.
///
/// Time advances per segment: after reaching a key the segment clock
/// restarts, and wrapping past the last key starts over from the first.
#[derive(Debug, Clone)]
pub struct ValueAnimation<T> {
    key_frames: Vec<KeyFrame<T>>,
    current_key_frame: usize,
    current_time: f32,
    total_time: f32,
    last_value: Option<T>,
    looping: bool,
    playing: bool,
    ended: bool,
}

impl<T> Default for ValueAnimation<T> {
    fn default() -> Self {
        Self {
            key_frames: Vec::new(),
            current_key_frame: 0,
            current_time: 0.0,
            total_time: 0.0,
            last_value: None,
            looping: false,
            playing: false,
            ended: false,
        }
    }
}

impl<T: Animatable> ValueAnimation<T> {
    /// Empty, stopped track
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key. The first key starts looping playback.
    pub fn set_key_frame(&mut self, time: f32, value: T, easing: Easing) {
        if self.key_frames.is_empty() {
            self.playing = true;
            self.looping = true;
            self.last_value = Some(value);
        }
        self.key_frames.push(KeyFrame { time, value, easing });
        self.total_time = time;
    }

    /// Advance by `elapsed` and return the current value
    pub fn update(&mut self, elapsed: f32) -> Option<T> {
        if !self.playing || self.key_frames.is_empty() {
            return self.last_value;
        }

        if self.current_time >= self.total_time {
            if self.looping {
                self.reset();
            } else {
                self.stop();
            }
        } else {
            let current = self.current_key_frame;
            let segment_start = if current > 0 { self.key_frames[current - 1].time } else { 0.0 };
            let key = self.key_frames[current];

            if self.current_time >= key.time - segment_start {
                self.current_key_frame = (current + 1) % self.key_frames.len();
                self.current_time = 0.0;
                return self.last_value;
            }

            if current > 0 {
                let previous = self.key_frames[current - 1];
                self.last_value = Some(key.easing.apply(
                    self.current_time,
                    previous.value,
                    key.value - previous.value,
                    key.time - previous.time,
                ));
            }
        }

        self.current_time += elapsed;
        self.last_value
    }

    /// Rewind to the first key
    pub fn reset(&mut self) {
        self.current_time = 0.0;
        self.current_key_frame = 0;
    }

    /// Resume playback
    pub fn play(&mut self) {
        self.playing = true;
        self.ended = false;
    }

    /// Stop playback and mark the track as ended
    pub fn stop(&mut self) {
        self.playing = false;
        self.ended = true;
    }

    /// Value of the first key
    pub fn initial_value(&self) -> Option<T> {
        self.key_frames.first().map(|key| key.value)
    }

    /// Last computed value
    pub fn value(&self) -> Option<T> {
        self.last_value
    }

    /// Restart from the first key when the end is reached
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Whether the track is playing
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether a non-looping track ran out
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Time of the last key
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Keys in insertion order
    pub fn key_frames(&self) -> &[KeyFrame<T>] {
        &self.key_frames
    }
}
