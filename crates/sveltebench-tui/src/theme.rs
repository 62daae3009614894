//! Svelte-orange on near-black palette and per-status styling

use crate::state::LogLevel;
use ratatui::style::{Modifier, Style};
use sveltebench_core::progress::{RunOutcome, TestStatus};

pub mod palette {
    use ratatui::style::Color;

    pub const SVELTE_ORANGE: Color = Color::Rgb(255, 62, 0);
    pub const EMBER: Color = Color::Rgb(255, 140, 66);
    pub const SKY: Color = Color::Rgb(64, 179, 255);
    pub const MINT: Color = Color::Rgb(72, 220, 140);
    pub const CORAL: Color = Color::Rgb(240, 72, 72);
    pub const SAND: Color = Color::Rgb(242, 200, 80);

    pub const INK: Color = Color::Rgb(12, 10, 14);
    pub const FOG: Color = Color::Rgb(226, 222, 230);
    pub const ASH: Color = Color::Rgb(120, 112, 128);
    pub const SLATE: Color = Color::Rgb(70, 64, 78);
}

use palette::*;

/// Frame counter driving spinners and blinking notices.
#[derive(Debug, Clone, Copy)]
pub struct Animation {
    frame: u64,
}

impl Animation {
    const SPINNER: [char; 8] = ['⣾', '⣽', '⣻', '⢿', '⡿', '⣟', '⣯', '⣷'];

    pub fn new(frame: u64) -> Self {
        Self { frame }
    }

    pub fn spinner(&self) -> char {
        Self::SPINNER[(self.frame / 2) as usize % Self::SPINNER.len()]
    }

    /// On for roughly half a second, off for the next.
    pub fn blink(&self) -> bool {
        (self.frame / 10) % 2 == 0
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Style,
    pub title: Style,
    pub accent: Style,
    pub bar: Style,
    pub text: Style,
    pub muted: Style,
    pub dim: Style,
    pub ok: Style,
    pub bad: Style,
    pub caution: Style,
    pub active: Style,
    pub key: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Style::default().bg(INK),
            title: Style::default()
                .fg(SVELTE_ORANGE)
                .add_modifier(Modifier::BOLD),
            accent: Style::default().fg(SKY),
            bar: Style::default().fg(SVELTE_ORANGE),
            text: Style::default().fg(FOG),
            muted: Style::default().fg(ASH),
            dim: Style::default().fg(SLATE),
            ok: Style::default().fg(MINT),
            bad: Style::default().fg(CORAL),
            caution: Style::default().fg(SAND),
            active: Style::default().fg(EMBER),
            key: Style::default().fg(SKY).add_modifier(Modifier::BOLD),
        }
    }
}

impl Theme {
    /// Style for a pass rate in `0.0..=1.0`
    pub fn pass_rate(&self, rate: f64) -> Style {
        if rate >= 0.9 {
            self.ok
        } else if rate >= 0.5 {
            self.caution
        } else {
            self.bad
        }
    }

    pub fn status(&self, status: TestStatus) -> Style {
        match status {
            TestStatus::Queued => self.dim,
            TestStatus::Running => self.active,
            TestStatus::RateLimited => self.caution,
            TestStatus::Completed => self.ok,
            TestStatus::Failed => self.bad,
        }
    }

    pub fn outcome(&self, outcome: &RunOutcome) -> Style {
        match outcome {
            RunOutcome::Running => self.active,
            RunOutcome::Succeeded => self.ok,
            RunOutcome::Incomplete | RunOutcome::Cancelled => self.caution,
            RunOutcome::Failed(_) => self.bad,
        }
    }

    /// Icon and style for an event log entry.
    pub fn log_level(&self, level: LogLevel) -> (&'static str, Style) {
        match level {
            LogLevel::Info => (glyphs::BULLET, self.muted),
            LogLevel::Success => (glyphs::PASS, self.ok),
            LogLevel::Error => (glyphs::FAIL, self.bad),
            LogLevel::Warning => (glyphs::CAUTION, self.caution),
        }
    }
}

pub mod glyphs {
    pub const PASS: &str = "✓";
    pub const FAIL: &str = "✗";
    pub const QUEUED: &str = "·";
    pub const BULLET: &str = "•";
    pub const CAUTION: &str = "!";
    pub const LOGO: &str = "▲";
    pub const CURSOR: &str = "› ";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_rate_thresholds() {
        let theme = Theme::default();
        assert_eq!(theme.pass_rate(0.95), theme.ok);
        assert_eq!(theme.pass_rate(0.5), theme.caution);
        assert_eq!(theme.pass_rate(0.2), theme.bad);
    }

    #[test]
    fn spinner_cycles() {
        let first = Animation::new(0).spinner();
        assert_ne!(first, Animation::new(2).spinner());
        assert_eq!(first, Animation::new(16).spinner());
    }
}
