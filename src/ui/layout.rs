use crate::app::App;
use crate::chart::{GaugeChart, GaugeOptions};
use crate::engine::{MeasurementEngine, Snapshot};
use crate::render::{mbps_to_amount, ms_to_amount};
use crate::screen::Screen;
use ratatui::{
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Points},
        Block, Borders, Clear, List, ListItem, ListState, Paragraph,
    },
    Frame,
};
use std::time::Instant;

const MIN_GAUGE_WIDTH: u16 = 40;
const MIN_GAUGE_HEIGHT: u16 = 22;

struct Palette {
    background: Color,
    text_primary: Color,
    text_secondary: Color,
    text_muted: Color,
    border: Color,
    accent: Color,
    accent_dim: Color,
    warn: Color,
}

const DARK: Palette = Palette {
    background: Color::Rgb(0x0f, 0x17, 0x2a),
    text_primary: Color::Rgb(230, 230, 230),
    text_secondary: Color::Rgb(160, 160, 160),
    text_muted: Color::Rgb(100, 100, 100),
    border: Color::Rgb(60, 60, 65),
    accent: Color::Rgb(0x2d, 0xa3, 0x9f),
    accent_dim: Color::Rgb(0x33, 0x41, 0x55),
    warn: Color::Rgb(220, 180, 130),
};

const LIGHT: Palette = Palette {
    background: Color::Rgb(0xff, 0xff, 0xff),
    text_primary: Color::Rgb(0x0f, 0x17, 0x2a),
    text_secondary: Color::Rgb(0x47, 0x55, 0x69),
    text_muted: Color::Rgb(0x94, 0xa3, 0xb8),
    border: Color::Rgb(0xcb, 0xd5, 0xe1),
    accent: Color::Rgb(0x00, 0x66, 0x64),
    accent_dim: Color::Rgb(0xe2, 0xe8, 0xf0),
    warn: Color::Rgb(0xb4, 0x53, 0x09),
};

fn palette(screen: &Screen) -> &'static Palette {
    if screen.dark {
        &DARK
    } else {
        &LIGHT
    }
}

pub fn gauge_fits(width: u16, height: u16) -> bool {
    width >= MIN_GAUGE_WIDTH && height >= MIN_GAUGE_HEIGHT
}

pub fn draw_ui<E: MeasurementEngine>(frame: &mut Frame, app: &App<E>, now: Instant) {
    let area = frame.area();
    let screen = &app.ui.screen;
    let p = palette(screen);

    frame.render_widget(
        Block::default().style(Style::default().bg(p.background)),
        area,
    );

    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(8),
        Constraint::Length(1),
    ])
    .split(area);

    draw_header(frame, chunks[0], screen);

    if screen.test_wrapper {
        draw_test_wrapper(frame, chunks[1], app, now);
    } else {
        draw_loading(frame, chunks[1], screen);
    }

    draw_help(frame, chunks[2], app);

    if screen.modal_open {
        draw_server_modal(frame, area, app);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, screen: &Screen) {
    let p = palette(screen);
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(p.border));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::horizontal([
        Constraint::Length(14),
        Constraint::Min(10),
        Constraint::Length(8),
    ])
    .split(inner);

    frame.render_widget(
        Paragraph::new("speedgauge")
            .style(Style::default().fg(p.text_primary).add_modifier(Modifier::BOLD)),
        chunks[0],
    );

    if !screen.selected_server_name.is_empty() {
        let mut spans = vec![
            Span::styled("server ", Style::default().fg(p.text_muted)),
            Span::styled(
                screen.selected_server_name.clone(),
                Style::default().fg(p.text_secondary),
            ),
        ];
        if screen.server_area {
            spans.push(Span::styled("  · s change", Style::default().fg(p.text_muted)));
        }
        frame.render_widget(
            Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
            chunks[1],
        );
    }

    let mode = if screen.dark { "dark" } else { "light" };
    frame.render_widget(
        Paragraph::new(mode)
            .style(Style::default().fg(p.text_muted))
            .alignment(Alignment::Right),
        chunks[2],
    );
}

fn draw_loading(frame: &mut Frame, area: Rect, screen: &Screen) {
    let p = palette(screen);
    let (text, color) = if !screen.message.is_empty() {
        (screen.message.as_str(), p.warn)
    } else if screen.loading {
        ("Selecting server...", p.text_secondary)
    } else {
        ("", p.text_muted)
    };

    let [middle] = Layout::vertical([Constraint::Length(1)])
        .flex(Flex::Center)
        .areas(area);
    frame.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(color))
            .alignment(Alignment::Center),
        middle,
    );
}

fn draw_test_wrapper<E: MeasurementEngine>(
    frame: &mut Frame,
    area: Rect,
    app: &App<E>,
    now: Instant,
) {
    let screen = &app.ui.screen;
    let chunks = Layout::vertical([
        Constraint::Length(4),
        Constraint::Length(1),
        Constraint::Min(4),
        Constraint::Length(2),
        Constraint::Length(1),
    ])
    .split(area);

    let panels = Layout::horizontal([
        Constraint::Ratio(1, 4),
        Constraint::Ratio(1, 4),
        Constraint::Ratio(1, 4),
        Constraint::Ratio(1, 4),
    ])
    .split(chunks[0]);

    let [dl, ul, ping, jitter] = bar_amounts(app.ui.snapshot.as_ref());
    let metrics = [
        ("Download", &screen.dl_value, "Mbps", dl),
        ("Upload", &screen.ul_value, "Mbps", ul),
        ("Ping", &screen.ping_value, "ms", ping),
        ("Jitter", &screen.jit_value, "ms", jitter),
    ];
    for (area, (title, value, unit, amount)) in panels.iter().zip(metrics) {
        draw_metric_panel(frame, *area, screen, title, value, unit, amount);
    }

    let p = palette(screen);
    if !screen.ip.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled("IP ", Style::default().fg(p.text_muted)),
                Span::styled(screen.ip.clone(), Style::default().fg(p.text_secondary)),
            ]))
            .alignment(Alignment::Center),
            chunks[1],
        );
    }

    if screen.meter.canvas && !screen.meter.is_hidden() {
        if let Some(chart) = app.ui.chart.chart() {
            draw_gauge(frame, chunks[2], chart, screen.meter.opacity(now), p);
        }
    }

    draw_readout(frame, chunks[3], screen);
    draw_button(frame, chunks[4], screen);
}

fn draw_metric_panel(
    frame: &mut Frame,
    area: Rect,
    screen: &Screen,
    title: &str,
    value: &str,
    unit: &str,
    amount: f64,
) {
    let p = palette(screen);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.border))
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(p.text_secondary),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).split(inner);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                value.to_string(),
                Style::default().fg(p.text_primary).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" {}", unit), Style::default().fg(p.text_muted)),
        ]))
        .alignment(Alignment::Center),
        chunks[0],
    );

    draw_progress_bar(frame, chunks[1], amount, p.accent, p.accent_dim);
}

fn bar_amounts(snapshot: Option<&Snapshot>) -> [f64; 4] {
    match snapshot {
        Some(s) => [
            mbps_to_amount(s.download_mbps),
            mbps_to_amount(s.upload_mbps),
            ms_to_amount(s.ping_ms),
            ms_to_amount(s.jitter_ms),
        ],
        None => [0.0; 4],
    }
}

fn draw_progress_bar(frame: &mut Frame, area: Rect, ratio: f64, color: Color, dim_color: Color) {
    if area.width < 4 {
        return;
    }

    let width = (area.width - 2) as usize;
    let filled = ((ratio * width as f64) as usize).min(width);
    let empty = width.saturating_sub(filled);

    let bar = Line::from(vec![
        Span::raw(" "),
        Span::styled("━".repeat(filled), Style::default().fg(color)),
        Span::styled("━".repeat(empty), Style::default().fg(dim_color)),
        Span::raw(" "),
    ]);

    frame.render_widget(Paragraph::new(bar), area);
}

type PointSet = Vec<(f64, f64)>;

/// Rotation is measured clockwise from twelve o'clock, so -90° starts the
/// sweep at the left end. The first segment is the filled share.
fn gauge_points(data: [f64; 2], options: &GaugeOptions) -> (PointSet, PointSet) {
    const ANGLE_STEPS: usize = 160;
    const RADIAL_STEPS: usize = 6;

    let total = (data[0] + data[1]).max(f64::EPSILON);
    let filled_share = data[0] / total;
    let start = (90.0 - options.rotation_deg).to_radians();
    let sweep = options.circumference_deg.to_radians();
    let cutout = options.cutout;

    let mut filled = Vec::new();
    let mut track = Vec::new();
    for a in 0..=ANGLE_STEPS {
        let t = a as f64 / ANGLE_STEPS as f64;
        let theta = start - t * sweep;
        for r in 0..=RADIAL_STEPS {
            let radius = cutout + (1.0 - cutout) * r as f64 / RADIAL_STEPS as f64;
            let point = (radius * theta.cos(), radius * theta.sin());
            if t <= filled_share && filled_share > 0.0 {
                filled.push(point);
            } else {
                track.push(point);
            }
        }
    }
    (filled, track)
}

fn draw_gauge(frame: &mut Frame, area: Rect, chart: &dyn GaugeChart, opacity: f64, p: &Palette) {
    let dataset = chart.rendered();
    let (filled, track) = gauge_points(dataset.data, chart.options());

    let (fill_color, track_color) = if opacity < 0.5 {
        (p.text_muted, p.border)
    } else {
        (dataset.colors[0], dataset.colors[1])
    };

    let canvas = Canvas::default()
        .marker(symbols::Marker::Braille)
        .background_color(p.background)
        .x_bounds([-1.1, 1.1])
        .y_bounds([-0.05, 1.05])
        .paint(move |ctx| {
            ctx.draw(&Points {
                coords: &track,
                color: track_color,
            });
            ctx.draw(&Points {
                coords: &filled,
                color: fill_color,
            });
        });

    frame.render_widget(canvas, area);
}

fn draw_readout(frame: &mut Frame, area: Rect, screen: &Screen) {
    let p = palette(screen);
    let lines = vec![
        Line::from(Span::styled(
            screen.current_label.clone(),
            Style::default().fg(p.text_secondary),
        )),
        Line::from(vec![
            Span::styled(
                screen.current_value.clone(),
                Style::default().fg(p.text_primary).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {}", screen.current_unit),
                Style::default().fg(p.text_muted),
            ),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn draw_button(frame: &mut Frame, area: Rect, screen: &Screen) {
    let p = palette(screen);
    let style = if screen.button.running {
        Style::default().fg(p.warn).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
    };
    frame.render_widget(
        Paragraph::new(format!("[ {} ]", screen.button.label))
            .style(style)
            .alignment(Alignment::Center),
        area,
    );
}

fn draw_server_modal<E: MeasurementEngine>(frame: &mut Frame, area: Rect, app: &App<E>) {
    let screen = &app.ui.screen;
    let p = palette(screen);

    let height = (screen.server_list.len() as u16 * 2 + 2).min(area.height);
    let [popup] = Layout::horizontal([Constraint::Percentage(60)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(popup);

    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = screen
        .server_list
        .iter()
        .map(|row| {
            ListItem::new(vec![
                Line::from(Span::styled(
                    row.name.clone(),
                    Style::default().fg(p.text_primary).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(row.ping.clone(), Style::default().fg(p.text_muted))),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.border))
                .style(Style::default().bg(p.background))
                .title(Span::styled(" Select server ", Style::default().fg(p.accent))),
        )
        .highlight_style(Style::default().bg(p.accent_dim))
        .highlight_symbol("› ");

    let mut state = ListState::default().with_selected(Some(app.modal.cursor()));
    frame.render_stateful_widget(list, popup, &mut state);
}

fn draw_help<E: MeasurementEngine>(frame: &mut Frame, area: Rect, app: &App<E>) {
    let p = palette(&app.ui.screen);
    let (help, color) = if let Some(status) = &app.status {
        (status.clone(), p.warn)
    } else if app.ui.screen.modal_open {
        ("↑↓ select · enter choose · esc close".to_string(), p.text_muted)
    } else if app.ui.screen.button.running {
        ("enter abort · t theme · q quit".to_string(), p.text_muted)
    } else if app.ui.screen.server_area {
        ("enter start · s server · t theme · q quit".to_string(), p.text_muted)
    } else {
        ("enter start · t theme · q quit".to_string(), p.text_muted)
    };

    frame.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(color))
            .alignment(Alignment::Center),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_points_split_by_share() {
        let options = GaugeOptions::default();
        let (filled, track) = gauge_points([0.0, 100.0], &options);
        assert!(filled.is_empty());
        assert!(!track.is_empty());

        let (filled, track) = gauge_points([50.0, 50.0], &options);
        assert!(filled.iter().all(|&(x, y)| x <= 1e-9 && y >= -1e-9));
        assert!(track.iter().all(|&(x, _)| x >= -1e-9));

        let (_, track) = gauge_points([100.0, 0.0], &options);
        assert!(track.is_empty());
    }

    #[test]
    fn gauge_rotation_moves_start() {
        let (filled, _) = gauge_points([100.0, 0.0], &GaugeOptions::default());
        let (x, y) = filled[0];
        assert!((x + 0.75).abs() < 1e-9 && y.abs() < 1e-9);

        let upright = GaugeOptions {
            rotation_deg: 0.0,
            ..GaugeOptions::default()
        };
        let (filled, _) = gauge_points([100.0, 0.0], &upright);
        let (x, y) = filled[0];
        assert!(x.abs() < 1e-9 && (y - 0.75).abs() < 1e-9);
        assert!(filled.iter().all(|&(x, _)| x >= -1e-9));
    }

    #[test]
    fn bars_follow_snapshot_numbers() {
        assert_eq!(bar_amounts(None), [0.0; 4]);

        let snapshot = Snapshot {
            download_mbps: 87.3,
            upload_mbps: 0.0,
            ping_ms: 23.0,
            jitter_ms: 4.0,
            ..Snapshot::default()
        };
        let [dl, ul, ping, jitter] = bar_amounts(Some(&snapshot));
        assert!((dl - mbps_to_amount(87.3)).abs() < 1e-12);
        assert_eq!(ul, 0.0);
        assert!((ping - ms_to_amount(23.0)).abs() < 1e-12);
        assert!(jitter > 0.0 && jitter < ping);
    }

    #[test]
    fn gauge_needs_room() {
        assert!(gauge_fits(80, 24));
        assert!(!gauge_fits(30, 24));
        assert!(!gauge_fits(80, 10));
    }
}
