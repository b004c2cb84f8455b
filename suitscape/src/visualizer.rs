//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  scene label                                    status         │
//! │                                                                │
//! │          [♣]      [♥ front card]      [♦]      suit carousel   │
//! │                                                                │
//! │      [overlay tile] [overlay tile]                             │
//! │                                                                │
//! │                 BIG PROMPT TEXT (multi-line)                   │
//! │                                                                │
//! │      [calibration progress ─────────]                          │
//! │      [live score ──────|threshold    ]                         │
//! │  key legend                                                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;

use minifb::{Key, KeyRepeat, Window, WindowOptions};
use scene_sequencer::Suit;

use crate::app::SceneView;
use crate::carousel::{hsv_to_argb, suit_color, Carousel};
use crate::gesture::{SimInput, SimKey};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:       usize = 960;
pub const WIN_H:       usize = 600;
const CAROUSEL_Y:      usize = 170;
const CARD_W:          f32   = 96.0;
const CARD_H:          f32   = 128.0;
const TILE_Y:          usize = 280;
const TILE_W:          usize = 150;
const TILE_H:          usize = 70;
const PROMPT_Y:        usize = 390;
const PROMPT_SCALE:    usize = 4;
const BAR_X:           usize = 180;
const BAR_W:           usize = WIN_W - 2 * BAR_X;
const CALIB_Y:         usize = 510;
const METER_Y:         usize = 534;
const BG_COLOR:        u32   = 0xFF1A1A2E;
const CARD_FACE:       u32   = 0xFFF4F1EA;
const TEXT_COLOR:      u32   = 0xFFEEEEEE;
const DIM_TEXT:        u32   = 0xFF888888;
const BAR_BG:          u32   = 0xFF0F3460;
const PULSE_COLOR:     u32   = 0xFFFFD700;  // gold

/// Gesture keys and the simulated input they drive.
const GESTURE_KEYS: [(Key, SimKey); 5] = [
    (Key::S, SimKey::Smile),
    (Key::J, SimKey::JawOpen),
    (Key::B, SimKey::BrowRaise),
    (Key::E, SimKey::EyesClosed),
    (Key::P, SimKey::Pinch),
];

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    buf:    Vec<u32>,
    sim_tx: Sender<SimInput>,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            "Suitscapes",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        window.limit_update_rate(Some(std::time::Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll keyboard inputs and forward them as SimInput events.
    /// Returns false when the user asked to quit.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }

        if self.window.is_key_pressed(Key::Q, KeyRepeat::No)
            || self.window.is_key_pressed(Key::Escape, KeyRepeat::No)
        {
            return false;
        }

        for (key, sim) in GESTURE_KEYS {
            if self.window.is_key_pressed(key, KeyRepeat::No) {
                let _ = self.sim_tx.send(SimInput::KeyDown(sim));
            }
            if self.window.is_key_released(key) {
                let _ = self.sim_tx.send(SimInput::KeyUp(sim));
            }
        }
        if self.window.is_key_pressed(Key::G, KeyRepeat::No) {
            let _ = self.sim_tx.send(SimInput::KeyDown(SimKey::Glitch));
        }

        true
    }

    /// Render one frame.
    pub fn render(&mut self, view: &SceneView<'_>) {
        self.buf.fill(BG_COLOR);

        // ── Header ────────────────────────────────────────────────────────
        self.draw_text(&view.scene_label, 16, 14, 2, TEXT_COLOR);
        let status_w = text_width(view.status, 2);
        self.draw_text(view.status, WIN_W.saturating_sub(status_w + 16), 14, 2, DIM_TEXT);

        // ── Carousel ──────────────────────────────────────────────────────
        self.draw_carousel(view.carousel);

        // ── Overlay tiles ─────────────────────────────────────────────────
        let n = view.tiles.len();
        if n > 0 {
            let total = n * TILE_W + (n - 1) * 16;
            let mut x = WIN_W.saturating_sub(total) / 2;
            for tile in &view.tiles {
                let color = blend(BG_COLOR, asset_color(&tile.label), tile.opacity);
                self.fill_rect(x, TILE_Y, TILE_W, TILE_H, color);
                let text = blend(BG_COLOR, TEXT_COLOR, tile.opacity);
                let lw = text_width(&tile.label, 2);
                self.draw_text(&tile.label, x + TILE_W.saturating_sub(lw) / 2, TILE_Y + TILE_H / 2 - 5, 2, text);
                x += TILE_W + 16;
            }
        }

        // ── Prompt ────────────────────────────────────────────────────────
        let line_h = 7 * PROMPT_SCALE;
        for (i, line) in view.prompt.lines().enumerate() {
            let w = text_width(line, PROMPT_SCALE);
            let x = WIN_W.saturating_sub(w) / 2;
            self.draw_text(line, x, PROMPT_Y + i * line_h, PROMPT_SCALE, TEXT_COLOR);
        }

        // ── Calibration progress / live meter ─────────────────────────────
        if let Some(p) = view.calibration {
            self.fill_rect(BAR_X, CALIB_Y, BAR_W, 12, BAR_BG);
            self.fill_rect(BAR_X, CALIB_Y, (BAR_W as f32 * p.clamp(0.0, 1.0)) as usize, 12, 0xFF53A8B6);
        }
        if let Some((score, threshold)) = view.meter {
            let above = score > threshold;
            self.fill_rect(BAR_X, METER_Y, BAR_W, 12, BAR_BG);
            let fill = if above { 0xFF7BD389 } else { 0xFFB0B0B0 };
            self.fill_rect(BAR_X, METER_Y, (BAR_W as f32 * score.clamp(0.0, 1.0)) as usize, 12, fill);
            let tx = BAR_X + (BAR_W as f32 * threshold.clamp(0.0, 1.0)) as usize;
            self.fill_rect(tx.saturating_sub(1), METER_Y - 4, 3, 20, PULSE_COLOR);
        }

        // ── Confirmation pulse ────────────────────────────────────────────
        if view.pulse > 0.0 {
            let c = blend(BG_COLOR, PULSE_COLOR, view.pulse);
            for inset in 0..6 {
                self.draw_border(inset, inset, WIN_W - 2 * inset, WIN_H - 2 * inset, c);
            }
        }

        // ── Key legend ────────────────────────────────────────────────────
        self.draw_text(
            "hold S=smile J=jaw B=brow E=eyes P=pinch   G=glitch   Q=quit",
            16, WIN_H - 22, 2, DIM_TEXT,
        );

        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H).ok();
    }

    // ── Carousel ──────────────────────────────────────────────────────────

    fn draw_carousel(&mut self, carousel: &Carousel) {
        let cards = carousel.layout(WIN_W as f32 / 2.0, CAROUSEL_Y as f32, 300.0, 36.0);
        for card in cards {
            let w = CARD_W * card.scale;
            let h = CARD_H * card.scale;
            let x = (card.x - w / 2.0).max(0.0) as usize;
            let y = (card.y - h / 2.0).max(0.0) as usize;
            // Cards at the back recede into the background.
            let fade = 0.35 + 0.65 * card.depth;
            self.fill_rect(x, y, w as usize, h as usize, blend(BG_COLOR, CARD_FACE, fade));
            self.draw_border(x, y, w as usize, h as usize, 0xFF000000);
            let r = (w * 0.32) as isize;
            let color = blend(BG_COLOR, suit_color(card.suit), fade);
            self.draw_suit(card.suit, card.x as isize, card.y as isize, r, color);
        }
    }

    fn draw_suit(&mut self, suit: Suit, cx: isize, cy: isize, r: isize, color: u32) {
        if r <= 0 { return; }
        for dy in -r..=r {
            for dx in -r..=r {
                let u = dx as f32 / r as f32;
                let v = dy as f32 / r as f32;
                if suit_mask(suit, u, v) {
                    let (px, py) = (cx + dx, cy + dy);
                    if px >= 0 && py >= 0 {
                        self.set_pixel(px as usize, py as usize, color);
                    }
                }
            }
        }
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..(x+w).min(WIN_W) {
            if y < WIN_H           { self.buf[y           * WIN_W + col] = color; }
            if y+h-1 < WIN_H       { self.buf[(y+h-1)     * WIN_W + col] = color; }
        }
        for row in y..(y+h).min(WIN_H) {
            if x < WIN_W           { self.buf[row * WIN_W + x    ] = color; }
            if x+w-1 < WIN_W       { self.buf[row * WIN_W + x+w-1] = color; }
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < WIN_W && y < WIN_H {
            self.buf[y * WIN_W + x] = color;
        }
    }

    /// 3×5 bitmap font, each pixel drawn as a `scale`×`scale` block.
    fn draw_text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let mut cx = x;
        for ch in expand_text(text).chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx + 4 * scale > WIN_W { break; }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Suit silhouettes in unit coordinates (u right, v down, both in -1..=1)
// ────────────────────────────────────────────────────────────────────────────

fn in_circle(u: f32, v: f32, cu: f32, cv: f32, r: f32) -> bool {
    (u - cu).powi(2) + (v - cv).powi(2) <= r * r
}

fn heart(u: f32, v: f32) -> bool {
    in_circle(u, v, -0.48, -0.35, 0.5)
        || in_circle(u, v, 0.48, -0.35, 0.5)
        || (v >= -0.35 && u.abs() <= (1.0 - v) / 1.35 * 0.98)
}

fn stem(u: f32, v: f32) -> bool {
    v >= 0.25 && u.abs() <= 0.08 + (v - 0.25) * 0.45
}

pub fn suit_mask(suit: Suit, u: f32, v: f32) -> bool {
    match suit {
        Suit::Hearts   => heart(u, v),
        Suit::Diamonds => u.abs() / 0.7 + v.abs() <= 1.0,
        Suit::Clubs    => {
            in_circle(u, v, 0.0, -0.5, 0.36)
                || in_circle(u, v, 0.0, -0.05, 0.25)
                || in_circle(u, v, -0.45, 0.05, 0.36)
                || in_circle(u, v, 0.45, 0.05, 0.36)
                || stem(u, v)
        }
        // Upside-down heart, squashed upward, on a stem.
        Suit::Spades   => (v <= 0.45 && heart(u, -(v * 1.25) + 0.1)) || stem(u, v),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

/// Spell out characters the font has no glyph for.
fn expand_text(text: &str) -> String {
    text.replace('…', "...").replace('—', "-")
}

/// Pixel width of `text` at `scale`.
pub fn text_width(text: &str, scale: usize) -> usize {
    expand_text(text).chars().count() * 4 * scale
}

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => [0b111, 0b001, 0b010, 0b000, 0b010],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

/// Stable color for an overlay asset key.
fn asset_color(key: &str) -> u32 {
    // FNV-1a
    let mut h: u32 = 0x811C9DC5;
    for b in key.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(0x01000193);
    }
    hsv_to_argb((h % 360) as f32, 0.55, 0.85)
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0-t) + cb as f32 * t) as u32;
    let ar = (a >> 16) & 0xFF; let br = (b >> 16) & 0xFF;
    let ag = (a >>  8) & 0xFF; let bg = (b >>  8) & 0xFF;
    let ab =  a        & 0xFF; let bb =  b        & 0xFF;
    0xFF000000 | (lerp(ar,br) << 16) | (lerp(ag,bg) << 8) | lerp(ab,bb)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
    }

    #[test]
    fn prompt_punctuation_is_spelled_out() {
        assert_eq!(expand_text("Starting camera…"), "Starting camera...");
        assert_eq!(text_width("No worries — moving on.", 1), "No worries - moving on.".len() * 4);
    }

    #[test]
    fn suit_masks_cover_centre_not_corners() {
        for suit in Suit::ALL {
            assert!(suit_mask(suit, 0.0, 0.0), "{:?} centre", suit);
            assert!(!suit_mask(suit, 0.98, 0.98), "{:?} corner", suit);
        }
    }

    #[test]
    fn asset_colors_are_stable() {
        assert_eq!(asset_color("hearts-01"), asset_color("hearts-01"));
        assert_ne!(asset_color("hearts-01"), asset_color("hearts-02"));
    }
}
