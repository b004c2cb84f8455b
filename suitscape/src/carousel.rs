//! Suit carousel visualization state.
//!
//! The four suits ride a slowly turning ring.  A confirmed gesture kicks the
//! ring; once it has spun down it eases the current scene's suit to the front.

use std::f32::consts::{PI, TAU};

use scene_sequencer::Suit;

// ════════════════════════════════════════════════════════════════════════════
// Color palette — suit → ARGB
// ════════════════════════════════════════════════════════════════════════════

pub fn suit_color(suit: Suit) -> u32 {
    let hue = match suit {
        Suit::Hearts   => 352.0,
        Suit::Diamonds => 18.0,
        Suit::Clubs    => 150.0,
        Suit::Spades   => 222.0,
    };
    hsv_to_argb(hue, 0.78, 0.94)
}

/// Convert HSV → packed ARGB (0xAARRGGBB, A=0xFF).
pub fn hsv_to_argb(h: f32, s: f32, v: f32) -> u32 {
    let h  = h.rem_euclid(360.0);
    let hi = (h / 60.0) as u32;
    let f  = h / 60.0 - hi as f32;
    let p  = v * (1.0 - s);
    let q  = v * (1.0 - s * f);
    let t  = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match hi {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let ri = (r * 255.0) as u32;
    let gi = (g * 255.0) as u32;
    let bi = (b * 255.0) as u32;
    0xFF000000 | (ri << 16) | (gi << 8) | bi
}

// ════════════════════════════════════════════════════════════════════════════
// Carousel
// ════════════════════════════════════════════════════════════════════════════

/// Idle drift in radians/frame.
const DRIFT:    f32 = 0.004;
const FRICTION: f32 = 0.94;
/// Fraction of the remaining angle covered per frame while settling.
const EASE:     f32 = 0.08;

/// Where to draw one card, in window pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardPlacement {
    pub suit:  Suit,
    pub x:     f32,
    pub y:     f32,
    /// 0.6 at the back of the ring, 1.0 at the front.
    pub scale: f32,
    /// 0.0 at the back, 1.0 at the front; draw in ascending order.
    pub depth: f32,
}

#[derive(Debug)]
pub struct Carousel {
    /// Ring rotation in radians; the card at angle 0 faces the viewer.
    pub angle:    f32,
    /// Spin velocity in radians/frame; set by `kick`.
    pub spin_vel: f32,
    pub focus:    Option<Suit>,
}

impl Default for Carousel {
    fn default() -> Self { Carousel::new() }
}

impl Carousel {
    pub fn new() -> Self {
        Carousel { angle: 0.0, spin_vel: 0.0, focus: None }
    }

    /// Ring angle at which `suit` sits at the front.
    fn front_angle(suit: Suit) -> f32 {
        -(suit.index() as f32) * TAU / Suit::ALL.len() as f32
    }

    /// Advance one frame.
    pub fn tick(&mut self) {
        self.angle += self.spin_vel;
        self.spin_vel *= FRICTION;
        if self.spin_vel.abs() < 0.002 { self.spin_vel = 0.0; }

        match self.focus {
            Some(suit) if self.spin_vel == 0.0 => {
                let mut delta = (Self::front_angle(suit) - self.angle).rem_euclid(TAU);
                if delta > PI { delta -= TAU; }
                self.angle += delta * EASE;
            }
            None => self.angle += DRIFT,
            _ => {}
        }
        self.angle = self.angle.rem_euclid(TAU);
    }

    /// Spin the ring; `strength` is normalised 0.0–1.0.
    pub fn kick(&mut self, strength: f32) {
        self.spin_vel = (self.spin_vel + strength.clamp(0.0, 1.0) * 0.35).min(0.5);
    }

    pub fn set_focus(&mut self, suit: Option<Suit>) {
        self.focus = suit;
    }

    /// Card positions on an ellipse centred at (`cx`, `cy`), back to front.
    pub fn layout(&self, cx: f32, cy: f32, radius_x: f32, radius_y: f32) -> Vec<CardPlacement> {
        let step = TAU / Suit::ALL.len() as f32;
        let mut cards: Vec<CardPlacement> = Suit::ALL.iter().map(|&suit| {
            let theta = self.angle + suit.index() as f32 * step;
            let depth = (theta.cos() + 1.0) * 0.5;
            CardPlacement {
                suit,
                x: cx + theta.sin() * radius_x,
                y: cy + theta.cos() * radius_y,
                scale: 0.6 + 0.4 * depth,
                depth,
            }
        }).collect();
        cards.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        cards
    }

    /// Suit currently nearest the front.
    pub fn front(&self) -> Suit {
        self.layout(0.0, 0.0, 1.0, 1.0)
            .last()
            .map(|c| c.suit)
            .unwrap_or(Suit::Hearts)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Pulse — brief flash after a confirmation
// ════════════════════════════════════════════════════════════════════════════

/// Fades from 1.0 to 0.0 over about 25 frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pulse {
    pub progress: f32,
}

impl Pulse {
    pub fn new() -> Self { Pulse { progress: 0.0 } }
    pub fn tick(&mut self) { self.progress = (self.progress + 0.04).min(1.0); }
    pub fn done(&self) -> bool { self.progress >= 1.0 }
    pub fn intensity(&self) -> f32 { 1.0 - self.progress }
}

impl Default for Pulse {
    fn default() -> Self { Pulse::new() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
