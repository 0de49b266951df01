use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton};
use winit::keyboard::KeyCode;

/// Keyboard and mouse state for the current frame.
#[derive(Default, Debug, Clone)]
pub struct Input {
    /// Cursor position inside the window, clamped to its bounds
    pub cursor_position: Vec2,
    /// Cursor movement since the last frame
    pub cursor_delta: Vec2,
    /// Window size in physical pixels
    pub screen_size: Vec2,
    pub mouse_buttons: HashSet<MouseButton>,
    pub keys: HashSet<KeyCode>,
    has_cursor: bool,
}

impl Input {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-frame deltas.
    pub fn end_frame(&mut self) {
        self.cursor_delta = Vec2::ZERO;
    }

    pub fn handle_resize(&mut self, width: u32, height: u32) {
        self.screen_size = Vec2::new(width as f32, height as f32);
    }

    pub fn handle_cursor_move(&mut self, x: f64, y: f64) {
        let position = Vec2::new(x as f32, y as f32).clamp(Vec2::ZERO, self.screen_size.max(Vec2::ZERO));
        if self.has_cursor {
            self.cursor_delta += position - self.cursor_position;
        }
        self.cursor_position = position;
        self.has_cursor = true;
    }

    pub fn handle_mouse_input(&mut self, state: ElementState, button: MouseButton) {
        match state {
            ElementState::Pressed => {
                self.mouse_buttons.insert(button);
            }
            ElementState::Released => {
                self.mouse_buttons.remove(&button);
            }
        }
    }

    pub fn handle_key(&mut self, state: ElementState, code: KeyCode) {
        match state {
            ElementState::Pressed => {
                self.keys.insert(code);
            }
            ElementState::Released => {
                self.keys.remove(&code);
            }
        }
    }

    /// Losing focus drops every held key and button.
    pub fn handle_focus(&mut self, focused: bool) {
        if !focused {
            self.keys.clear();
            self.mouse_buttons.clear();
            self.cursor_delta = Vec2::ZERO;
        }
    }

    #[must_use]
    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }

    #[must_use]
    pub fn is_key_pressed(&self, code: KeyCode) -> bool {
        self.keys.contains(&code)
    }

    /// Cursor offset from the window centre while `button` is held, zero
    /// otherwise.
    #[must_use]
    pub fn offset_from_center(&self, button: MouseButton) -> Vec2 {
        if !self.is_button_pressed(button) || !self.has_cursor {
            return Vec2::ZERO;
        }
        self.cursor_position - self.screen_size * 0.5
    }
}
