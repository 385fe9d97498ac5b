//! Watch display colors

use ratatui::style::{Color, Modifier, Style};

/// Spinner animation frames
pub const BRAILLE_SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
pub const PULSE_SPINNER: &[char] = &['○', '◔', '◑', '◕', '●', '◕', '◑', '◔'];

/// Frame for a tick counter
pub fn spinner_char(frames: &[char], tick: u64) -> char {
    frames[(tick % frames.len() as u64) as usize]
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub title: Color,
    pub border: Color,
    pub hint_border: Color,
    pub failure_border: Color,

    pub status_running: Color,
    pub status_passed: Color,
    pub status_failed: Color,
    pub status_idle: Color,
    pub status_paused: Color,

    pub text_primary: Color,
    pub text_muted: Color,
    pub toast: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Color::Rgb(250, 204, 21),           // #FACC15 gold
            border: Color::Rgb(71, 85, 105),           // #475569 slate
            hint_border: Color::Rgb(234, 179, 8),      // #EAB308 yellow
            failure_border: Color::Rgb(239, 68, 68),   // #EF4444 red
            status_running: Color::Cyan,
            status_passed: Color::Rgb(34, 197, 94),    // #22C55E green
            status_failed: Color::Rgb(239, 68, 68),
            status_idle: Color::Rgb(148, 163, 184),    // #94A3B8
            status_paused: Color::Rgb(245, 158, 11),   // #F59E0B amber
            text_primary: Color::White,
            text_muted: Color::Rgb(100, 116, 139),     // #64748B
            toast: Color::Rgb(56, 189, 248),           // #38BDF8 sky
            error: Color::LightRed,
        }
    }
}

impl Theme {
    pub fn title_style(&self) -> Style {
        Style::default().fg(self.title).add_modifier(Modifier::BOLD)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.text_muted)
    }

    pub fn section_title(&self) -> Style {
        Style::default()
            .fg(self.text_primary)
            .add_modifier(Modifier::BOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_wraps() {
        assert_eq!(spinner_char(BRAILLE_SPINNER, 0), '⠋');
        assert_eq!(spinner_char(BRAILLE_SPINNER, 10), '⠋');
        assert_eq!(spinner_char(PULSE_SPINNER, 4), '●');
    }
}
