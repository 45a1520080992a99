//! Conversion from a stream's PCM layout to the device's
//!
//! The writer queues interleaved 16-bit samples at the rate and channel count
//! of the track. The device may run at another rate or channel count; rates
//! are bridged by linear interpolation.

use std::collections::VecDeque;

use cpal::{FromSample, Sample};

fn to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

/// Turns queued source frames into device frames
pub(super) struct FrameConverter {
    in_channels: usize,
    out_channels: usize,
    /// Source frames per device frame
    step: f64,
    /// Position between `prev` and `next`, in source frames
    phase: f64,
    prev: Vec<f32>,
    next: Vec<f32>,
}

impl FrameConverter {
    pub fn new(in_rate: u32, in_channels: u16, out_rate: u32, out_channels: u16) -> Self {
        let in_channels = in_channels.max(1) as usize;
        Self {
            in_channels,
            out_channels: out_channels.max(1) as usize,
            step: in_rate as f64 / out_rate.max(1) as f64,
            // Two source frames are pulled before the first output frame
            phase: 2.0,
            prev: vec![0.0; in_channels],
            next: vec![0.0; in_channels],
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.step == 1.0 && self.in_channels == self.out_channels
    }

    /// Fill `output` from `queue`, scaled by `volume`. Underruns are padded
    /// with silence.
    pub fn render<T>(&mut self, queue: &mut VecDeque<i16>, volume: f32, output: &mut [T])
    where
        T: Sample + FromSample<f32>,
    {
        if self.is_passthrough() {
            for out in output.iter_mut() {
                *out = match queue.pop_front() {
                    Some(sample) => T::from_sample(to_f32(sample) * volume),
                    None => T::EQUILIBRIUM,
                };
            }
            return;
        }

        let mut starved = false;
        for frame in output.chunks_mut(self.out_channels) {
            starved = starved || !self.advance(queue);
            if starved {
                frame.fill(T::EQUILIBRIUM);
                continue;
            }
            for (channel, out) in frame.iter_mut().enumerate() {
                *out = T::from_sample(self.interpolate(channel) * volume);
            }
            self.phase += self.step;
        }
    }

    /// Pull source frames until `phase` lies between `prev` and `next`.
    /// Returns false when the queue runs dry first.
    fn advance(&mut self, queue: &mut VecDeque<i16>) -> bool {
        while self.phase >= 1.0 {
            if queue.len() < self.in_channels {
                return false;
            }
            std::mem::swap(&mut self.prev, &mut self.next);
            for (slot, sample) in self.next.iter_mut().zip(queue.drain(..self.in_channels)) {
                *slot = to_f32(sample);
            }
            self.phase -= 1.0;
        }
        true
    }

    fn interpolate(&self, channel: usize) -> f32 {
        let from = self.map_channel(&self.prev, channel);
        let to = self.map_channel(&self.next, channel);
        from + (to - from) * self.phase as f32
    }

    fn map_channel(&self, frame: &[f32], channel: usize) -> f32 {
        match (self.in_channels, self.out_channels) {
            (1, _) => frame[0],
            (2, 1) => (frame[0] + frame[1]) * 0.5,
            _ => frame.get(channel).copied().unwrap_or(0.0),
        }
    }
}
