//! Carousel rotation engine
//!
//! Keeps a fixed-size window over a longer list of slides. Each advance swaps the
//! slot at `counter % window` with the slide waiting at `counter + window` and
//! appends the retired slide to the tail, so every slide eventually comes back
//! around. Once a full window has rotated out it is dropped from the front,
//! which keeps the list length bounded.

use crate::error::{PromoScreenError, Result};
use crate::slides::SlideItem;
use serde::{Deserialize, Serialize};

/// Rotation state owned by the carousel engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationState {
    items: Vec<SlideItem>,
    counter: usize,
    window: usize,
}

/// What the display needs to mirror the current rotation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CarouselSnapshot {
    pub counter: usize,
    pub window: usize,
    pub visible: Vec<SlideItem>,
}

impl RotationState {
    /// Create a rotation over `items` showing `window` slides at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if `window` is zero
    pub fn new(items: Vec<SlideItem>, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(PromoScreenError::from("Carousel window size must be at least 1"));
        }
        if items.len() <= window {
            tracing::warn!(
                "Carousel has {} slides for a window of {window}; slides will not rotate",
                items.len()
            );
        }
        Ok(Self {
            items,
            counter: 0,
            window,
        })
    }

    #[must_use]
    pub fn items(&self) -> &[SlideItem] {
        &self.items
    }

    #[must_use]
    pub fn counter(&self) -> usize {
        self.counter
    }

    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Slides currently on screen, at most `window` of them
    #[must_use]
    pub fn visible(&self) -> &[SlideItem] {
        &self.items[..self.window.min(self.items.len())]
    }

    #[must_use]
    pub fn snapshot(&self) -> CarouselSnapshot {
        CarouselSnapshot {
            counter: self.counter,
            window: self.window,
            visible: self.visible().to_vec(),
        }
    }

    /// Advance the rotation by one position.
    ///
    /// A list too short to supply a replacement leaves the slot unchanged. Front
    /// compaction only happens while at least one full window would remain; the
    /// counter is brought back down by `window` either way so it stays bounded.
    pub fn advance_in_place(&mut self) {
        let window = self.window;
        let index = self.counter % window;

        if self.counter + window < self.items.len() {
            let incoming = self.items[self.counter + window].clone();
            let retired = std::mem::replace(&mut self.items[index], incoming);
            self.items.push(retired);
        }

        if index == window - 1 && self.counter > 0 {
            if self.items.len() >= 2 * window {
                self.items.drain(..window);
            }
            // counter >= window - 1 here, so this cannot underflow
            self.counter = self.counter + 1 - window;
        } else {
            self.counter += 1;
        }
    }
}

/// Pure transition: returns the state after one advance
#[must_use]
pub fn advance(mut state: RotationState) -> RotationState {
    state.advance_in_place();
    state
}
