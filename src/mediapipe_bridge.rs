// src/mediapipe_bridge.rs - Stub hand detector; a native MediaPipe binding slots in here
use anyhow::Result;
use image::DynamicImage;
use tracing::debug;

use crate::tracking::HandLandmarks;

pub struct MediaPipeWrapper {
    max_hands: usize,
}

impl MediaPipeWrapper {
    pub fn new(max_hands: usize) -> Result<Self> {
        debug!("Hand detector stub created (max {} hands)", max_hands);
        Ok(Self { max_hands: max_hands.max(1) })
    }

    /// Raw detector output is 21 `[x, y, z]` triples per hand.
    pub fn process(&self, frame: &DynamicImage) -> Result<Vec<HandLandmarks>> {
        let raw_hands = self.detect_raw(frame)?;
        Ok(self.keep_hands(&raw_hands))
    }

    /// Keeps the last `max_hands` complete hands, in detector order, so the
    /// hand processed last still wins downstream.
    fn keep_hands(&self, raw_hands: &[Vec<[f64; 3]>]) -> Vec<HandLandmarks> {
        let mut hands: Vec<HandLandmarks> = raw_hands.iter()
            .filter_map(|raw| HandLandmarks::from_raw(raw))
            .collect();
        let excess = hands.len().saturating_sub(self.max_hands);
        hands.drain(..excess);
        hands
    }

    fn detect_raw(&self, _frame: &DynamicImage) -> Result<Vec<Vec<[f64; 3]>>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{observe_hands, FingerVector, GestureSymbol};

    fn raw(symbol: GestureSymbol) -> Vec<[f64; 3]> {
        let hand = HandLandmarks::posed(symbol.pose().unwrap());
        hand.points().iter().map(|p| [p.x, p.y, p.z]).collect()
    }

    #[test]
    fn single_hand_limit_keeps_the_last_hand() {
        let detector = MediaPipeWrapper::new(1).unwrap();
        let hands = detector.keep_hands(&[raw(GestureSymbol::Play), raw(GestureSymbol::Pause)]);
        assert_eq!(hands.len(), 1);
        assert_eq!(observe_hands(hands).symbol, GestureSymbol::Pause);
    }

    #[test]
    fn short_detections_are_dropped() {
        let detector = MediaPipeWrapper::new(2).unwrap();
        let partial = vec![[0.5, 0.5, 0.0]; 10];
        let hands = detector.keep_hands(&[raw(GestureSymbol::Next), partial]);
        assert_eq!(hands.len(), 1);
        assert_eq!(
            observe_hands(hands).fingers,
            Some(FingerVector::from_bits([0, 1, 1, 1, 0]))
        );
    }
}
