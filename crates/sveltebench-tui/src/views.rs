//! Dashboard and results views

use crate::state::{AppState, View};
use crate::theme::{glyphs, Animation, Theme};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};
use std::time::Duration;
use sveltebench_core::progress::{Eta, RunOutcome, TestState, TestStatus};

const INDENT: &str = "  ";
const TEST_BAR_WIDTH: usize = 16;

pub fn render(frame: &mut Frame, state: &AppState, theme: &Theme, anim: Animation) {
    let area = frame.area();
    frame.render_widget(Block::default().style(theme.background), area);

    match state.view {
        View::Dashboard => render_dashboard(frame, state, theme, anim, area),
        View::Results => render_results(frame, state, theme, area),
    }
}

fn render_dashboard(
    frame: &mut Frame,
    state: &AppState,
    theme: &Theme,
    anim: Animation,
    area: Rect,
) {
    let [header, _, bar, stats, notice, _, body, _, help] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(8),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    let status = if state.is_running() {
        Span::styled(format!("RUNNING {}", anim.spinner()), theme.active)
    } else {
        outcome_span(state.outcome(), theme)
    };
    frame.render_widget(Paragraph::new(title_line(state, theme, "SVELTEBENCH", status)), header);
    frame.render_widget(Paragraph::new(overall_bar(state, theme, bar.width)), bar);
    frame.render_widget(Paragraph::new(stats_line(state, theme)), stats);
    frame.render_widget(Paragraph::new(notice_line(state, theme, anim)), notice);

    let [tests, events] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(body);
    frame.render_widget(Paragraph::new(test_lines(state, theme, anim, tests.height)), tests);
    frame.render_widget(Paragraph::new(event_lines(state, theme, events.height)), events);

    let quit = if state.is_running() { "cancel" } else { "quit" };
    let hints = [("q", quit), ("↑↓", "navigate"), ("tab", "results")];
    frame.render_widget(Paragraph::new(key_hints(&hints, theme)), help);
}

fn title_line<'a>(state: &AppState, theme: &Theme, title: &'a str, status: Span<'a>) -> Line<'a> {
    Line::from(vec![
        Span::raw(INDENT),
        Span::styled(glyphs::LOGO, theme.title),
        Span::styled(format!(" {title}"), theme.title),
        Span::styled(format!("   {}/{}   ", state.provider, state.model), theme.muted),
        status,
    ])
}

fn overall_bar<'a>(state: &AppState, theme: &Theme, width: u16) -> Line<'a> {
    let pct = state.progress.progress_pct();
    let width = width.saturating_sub(12) as usize;
    let filled = ((pct * width as f64).round() as usize).min(width);

    Line::from(vec![
        Span::raw(INDENT),
        Span::styled("━".repeat(filled), theme.bar),
        Span::styled("─".repeat(width - filled), theme.dim),
        Span::styled(format!(" {:.1}%", pct * 100.0), theme.muted),
    ])
}

fn stats_line<'a>(state: &AppState, theme: &Theme) -> Line<'a> {
    let progress = &state.progress;
    Line::from(vec![
        Span::raw(INDENT),
        Span::styled(
            format!(
                "{}/{} samples",
                progress.completed_samples(),
                progress.total_samples()
            ),
            theme.text,
        ),
        Span::styled(
            format!(
                "   elapsed {}   eta {}",
                format_duration(progress.elapsed()),
                format_eta(progress.eta())
            ),
            theme.muted,
        ),
    ])
}

/// First line of the run error, else the dropped-events warning.
fn notice_line<'a>(state: &AppState, theme: &Theme, anim: Animation) -> Line<'a> {
    if let Some(error) = state.outcome().error() {
        let first = error.lines().next().unwrap_or_default();
        return Line::from(vec![
            Span::raw(INDENT),
            Span::styled(format!("{} {first}", glyphs::FAIL), theme.bad),
        ]);
    }
    if state.dropped_events == 0 {
        return Line::default();
    }
    let icon = if anim.blink() { theme.caution } else { theme.dim };
    Line::from(vec![
        Span::raw(INDENT),
        Span::styled(glyphs::CAUTION, icon),
        Span::styled(
            format!(
                " {} progress events dropped, counts may lag",
                state.dropped_events
            ),
            theme.caution,
        ),
    ])
}

fn section_header<'a>(label: &'a str, theme: &Theme) -> [Line<'a>; 2] {
    [
        Line::from(vec![Span::raw(INDENT), Span::styled(label, theme.muted)]),
        Line::default(),
    ]
}

fn test_lines<'a>(
    state: &'a AppState,
    theme: &Theme,
    anim: Animation,
    height: u16,
) -> Vec<Line<'a>> {
    let mut lines = Vec::from(section_header("TESTS", theme));
    let visible = (height as usize).saturating_sub(lines.len());
    let first = state.selected_index.saturating_sub(visible.saturating_sub(1));

    for (i, test) in state
        .progress
        .tests_in_order()
        .enumerate()
        .skip(first)
        .take(visible)
    {
        let selected = i == state.selected_index;
        let name_style = if selected {
            theme.text.add_modifier(Modifier::BOLD)
        } else {
            theme.text
        };

        let mut spans = vec![
            Span::styled(if selected { glyphs::CURSOR } else { INDENT }, theme.key),
            Span::styled(status_glyph(test.status, anim), theme.status(test.status)),
            Span::styled(format!(" {:<16} ", truncate(&test.name, 16)), name_style),
            Span::styled(mini_bar(test.progress_pct()), theme.accent),
            Span::styled(
                format!(" {:>2}/{:<2}", test.current.min(test.total), test.total),
                theme.muted,
            ),
        ];
        spans.extend(test_detail(test, theme));
        lines.push(Line::from(spans));
    }
    lines
}

fn mini_bar(pct: f64) -> String {
    let filled = ((pct * TEST_BAR_WIDTH as f64).round() as usize).min(TEST_BAR_WIDTH);
    format!(
        "{}{}",
        "▰".repeat(filled),
        "▱".repeat(TEST_BAR_WIDTH - filled)
    )
}

fn test_detail<'a>(test: &TestState, theme: &Theme) -> Option<Span<'a>> {
    match test.status {
        TestStatus::RateLimited => Some(Span::styled(
            match test.retry_after {
                Some(secs) => format!("  retry in {secs}s"),
                None => "  rate limited".to_string(),
            },
            theme.caution,
        )),
        TestStatus::Completed | TestStatus::Failed => test.pass_at_one.map(|rate| {
            Span::styled(
                format!("  pass@1 {:.0}%", rate * 100.0),
                theme.pass_rate(rate),
            )
        }),
        TestStatus::Queued | TestStatus::Running => None,
    }
}

fn event_lines<'a>(state: &'a AppState, theme: &Theme, height: u16) -> Vec<Line<'a>> {
    let mut lines = Vec::from(section_header("RECENT", theme));
    let visible = (height as usize).saturating_sub(lines.len());

    lines.extend(state.events.iter().take(visible).map(|entry| {
        let (icon, icon_style) = theme.log_level(entry.level);
        let mut spans = vec![
            Span::raw(INDENT),
            Span::styled(entry.time.as_str(), theme.dim),
            Span::styled(format!("  {icon}  "), icon_style),
        ];
        if let Some(test) = &entry.test {
            spans.push(Span::styled(format!("{test} "), theme.accent));
        }
        spans.push(Span::styled(entry.message.as_str(), theme.text));
        Line::from(spans)
    }));
    lines
}

fn key_hints<'a>(hints: &[(&'a str, &'a str)], theme: &Theme) -> Line<'a> {
    let mut spans = vec![Span::raw(INDENT)];
    for (i, (key, action)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" · ", theme.dim));
        }
        spans.push(Span::styled(*key, theme.key));
        spans.push(Span::styled(format!(" {action}"), theme.muted));
    }
    Line::from(spans)
}

fn render_results(frame: &mut Frame, state: &AppState, theme: &Theme, area: Rect) {
    let [header, _, summary_area, _, table, help] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(4),
        Constraint::Length(1),
        Constraint::Min(6),
        Constraint::Length(1),
    ])
    .areas(area);

    let snapshot = state.snapshot();
    frame.render_widget(
        Paragraph::new(title_line(
            state,
            theme,
            "RESULTS",
            outcome_span(&snapshot.outcome, theme),
        )),
        header,
    );

    let tests = snapshot.results.as_ref().unwrap_or(&snapshot.tests);
    let passed = tests.iter().filter(|t| t.passed).count();
    let finished = tests.iter().filter(|t| t.status.is_finished()).count();

    let mut summary = vec![Line::from(vec![
        Span::raw(INDENT),
        Span::styled("passed ", theme.muted),
        Span::styled(format!("{passed}/{finished}"), theme.ok),
        Span::styled("   samples ", theme.muted),
        Span::styled(
            format!("{}/{}", snapshot.completed_samples, snapshot.total_samples),
            theme.text,
        ),
        Span::styled("   took ", theme.muted),
        Span::styled(format_duration(snapshot.elapsed), theme.text),
    ])];
    if let Some(path) = &snapshot.results_saved {
        summary.push(Line::from(vec![
            Span::raw(INDENT),
            Span::styled("saved to ", theme.muted),
            Span::styled(path.clone(), theme.text),
        ]));
    }
    if !snapshot.is_authoritative() {
        summary.push(Line::from(vec![
            Span::raw(INDENT),
            Span::styled(
                "worker exited without confirming completion; results may be partial",
                theme.caution,
            ),
        ]));
    }
    if let Some(error) = &snapshot.error {
        summary.push(Line::from(vec![
            Span::raw(INDENT),
            Span::styled(error.clone(), theme.bad),
        ]));
    }
    frame.render_widget(Paragraph::new(summary), summary_area);

    let mut rows = vec![
        Line::from(Span::styled(
            format!(
                "{INDENT}{:<18}{:<14}{:>9}{:>9}{:>9}",
                "TEST", "STATUS", "SAMPLES", "PASS@1", "PASS@10"
            ),
            theme.muted,
        )),
        Line::default(),
    ];
    rows.extend(tests.iter().map(|test| {
        Line::from(vec![
            Span::styled(format!("{INDENT}{:<18}", truncate(&test.name, 17)), theme.text),
            Span::styled(
                format!("{:<14}", status_name(test.status)),
                theme.status(test.status),
            ),
            Span::styled(
                format!("{:>9}", format!("{}/{}", test.current.min(test.total), test.total)),
                theme.muted,
            ),
            rate_cell(test.pass_at_one, theme),
            rate_cell(test.pass_at_ten, theme),
        ])
    }));
    frame.render_widget(Paragraph::new(rows), table);

    frame.render_widget(
        Paragraph::new(key_hints(&[("q", "quit"), ("tab", "dashboard")], theme)),
        help,
    );
}

fn rate_cell<'a>(rate: Option<f64>, theme: &Theme) -> Span<'a> {
    match rate {
        Some(r) => Span::styled(
            format!("{:>9}", format!("{:.1}%", r * 100.0)),
            theme.pass_rate(r),
        ),
        None => Span::styled(format!("{:>9}", "-"), theme.dim),
    }
}

fn status_glyph(status: TestStatus, anim: Animation) -> String {
    match status {
        TestStatus::Queued => glyphs::QUEUED.to_string(),
        TestStatus::Running => anim.spinner().to_string(),
        TestStatus::RateLimited => glyphs::CAUTION.to_string(),
        TestStatus::Completed => glyphs::PASS.to_string(),
        TestStatus::Failed => glyphs::FAIL.to_string(),
    }
}

fn status_name(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Queued => "queued",
        TestStatus::Running => "running",
        TestStatus::RateLimited => "rate limited",
        TestStatus::Completed => "passed",
        TestStatus::Failed => "failed",
    }
}

fn outcome_span<'a>(outcome: &RunOutcome, theme: &Theme) -> Span<'a> {
    let label = match outcome {
        RunOutcome::Running => "RUNNING",
        RunOutcome::Succeeded => "COMPLETED",
        RunOutcome::Incomplete => "INCOMPLETE",
        RunOutcome::Cancelled => "CANCELLED",
        RunOutcome::Failed(_) => "FAILED",
    };
    Span::styled(label, theme.outcome(outcome))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn format_eta(eta: Eta) -> String {
    match eta {
        Eta::Starting => "calculating...".to_string(),
        Eta::Remaining(d) => format_duration(d),
        Eta::Done => "-".to_string(),
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, secs / 60 % 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s:02}s"),
        (h, m, _) => format!("{h}h {m:02}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use sveltebench_core::BenchmarkEvent;

    fn rendered(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal
            .draw(|f| render(f, state, &Theme::default(), Animation::new(0)))
            .unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn durations_are_compact() {
        assert_eq!(format_duration(Duration::from_secs(9)), "9s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 05s");
        assert_eq!(format_duration(Duration::from_secs(3720)), "1h 02m");
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("counter", 16), "counter");
        assert_eq!(truncate("snippets-and-render-tags", 8), "snippet…");
    }

    #[test]
    fn dashboard_lists_tests_and_provider() {
        let tests = ["counter".to_string(), "props".to_string()];
        let mut state = AppState::new("openai", "gpt-4o", &tests, 4);
        state.handle_event(BenchmarkEvent::TestStart {
            test: "counter".into(),
            sample: None,
            total: None,
        });
        let screen = rendered(&state);
        assert!(screen.contains("SVELTEBENCH"));
        assert!(screen.contains("openai/gpt-4o"));
        assert!(screen.contains("counter"));
        assert!(screen.contains("props"));
        assert!(screen.contains("0/8 samples"));
    }

    #[test]
    fn results_view_shows_outcome_and_table() {
        let mut state = AppState::new("openai", "gpt-4o", &["counter".to_string()], 2);
        state.handle_event(BenchmarkEvent::TestComplete {
            test: "counter".into(),
            total: Some(2),
            passed: true,
            pass_at_one: Some(0.5),
            pass_at_ten: None,
        });
        state.handle_event(BenchmarkEvent::Complete {
            results_saved: Some("benchmarks/out.json".into()),
        });
        assert_eq!(state.view, View::Results);

        let screen = rendered(&state);
        assert!(screen.contains("COMPLETED"));
        assert!(screen.contains("PASS@1"));
        assert!(screen.contains("50.0%"));
        assert!(screen.contains("benchmarks/out.json"));
    }
}
