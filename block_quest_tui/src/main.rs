mod config;
mod logging;

use block_quest_core::{
    AgentState, Direction as Facing, Interpreter, Level, Program, Progress, RunResult, TileKind,
    builtin_levels,
    level::{load_levels_dir, merge_levels},
    map::Grid,
    world::Tile,
};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};

use crate::{
    config::load_config,
    logging::LogTarget,
};

#[derive(Parser, Debug)]
#[command(version, about = "Run a block program on a Block Quest level", long_about = None)]
struct Args {
    /// Built-in level to play
    #[arg(short, long, default_value_t = 1)]
    level: u32,

    /// Level file (TOML) to play instead of a built-in level
    #[arg(long, value_name = "LEVEL_FILE", conflicts_with = "level")]
    level_file: Option<PathBuf>,

    /// Program file, one instruction per line
    #[arg(short, long, value_name = "PROGRAM_FILE", conflicts_with = "code")]
    program: Option<PathBuf>,

    /// Program text, e.g. "repeat 3; forward"
    #[arg(short, long)]
    code: Option<String>,

    /// Print the outcome instead of animating it
    #[arg(long)]
    headless: bool,

    /// Config file (TOML)
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Animation delay per step, overrides the config file
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Write logs to this file while the TUI is running
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

struct App<'p> {
    levels: Vec<Level>,
    /// Index into `levels` of the level being played.
    current: usize,
    program: &'p Program,
    progress: Progress,
    /// Live run; `None` once it has finished and been scored.
    interpreter: Option<Interpreter<'p>>,
    /// Agent and grid as last drawn.
    agent: AgentState,
    grid: Grid<Tile>,
    result: Option<RunResult>,
    status: String,
    should_quit: bool,
}

impl<'p> App<'p> {
    fn new(levels: Vec<Level>, current: usize, program: &'p Program) -> Self {
        let mut progress = Progress::new(&levels);
        progress.unlock(levels[current].id());
        let level = &levels[current];
        let agent = *level.start();
        let grid = level.grid().clone();
        let mut app = App {
            interpreter: None,
            levels,
            current,
            program,
            progress,
            agent,
            grid,
            result: None,
            status: String::new(),
            should_quit: false,
        };
        app.restart();
        app
    }

    fn level(&self) -> &Level {
        &self.levels[self.current]
    }

    /// Throws away the current run and starts again from the level template.
    fn restart(&mut self) {
        let level = &self.levels[self.current];
        self.agent = *level.start();
        self.grid = level.grid().clone();
        self.interpreter = Some(level.interpreter(self.program));
        self.result = None;
        self.status = match level.disallowed(self.program).as_slice() {
            [] => String::new(),
            blocked => format!(
                "Instructions {} are not in this level's palette",
                blocked
                    .iter()
                    .map(|i| (i + 1).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
    }

    /// Advances the run by one atomic step, scoring it once it is exhausted.
    fn tick(&mut self) {
        let Some(interpreter) = self.interpreter.as_mut() else {
            return;
        };
        if interpreter.step().is_some() {
            self.agent = *interpreter.agent();
            self.grid = interpreter.grid().clone();
            return;
        }

        if let Some(interpreter) = self.interpreter.take() {
            let execution = interpreter.finish();
            let result = RunResult::from_execution(self.level(), self.program.len(), execution);
            if let Some(next) = self.progress.record(&self.levels, &result) {
                self.status = format!("Level {next} unlocked! Press 'n' to play it.");
            }
            self.result = Some(result);
        }
    }

    /// Moves to the next level if it is unlocked.
    fn next_level(&mut self) {
        let next = self.current + 1;
        match self.levels.get(next) {
            Some(level) if self.progress.is_unlocked(level.id()) => {
                self.current = next;
                self.restart();
            }
            Some(_) => self.status = "Solve this level to unlock the next one.".to_string(),
            None => self.status = "That was the last level.".to_string(),
        }
    }

    /// Highlighted program line.
    fn current_index(&self) -> Option<usize> {
        self.interpreter.as_ref().and_then(|i| i.current_index())
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_target = match (&args.log_file, args.headless) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, true) => LogTarget::Stderr,
        (None, false) => LogTarget::Off,
    };
    logging::init(log_target)?;

    let mut config = load_config(args.config.as_deref())?;
    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
        config.validate()?;
    }

    let program = load_program(&args)?;
    let (levels, current) = load_levels(&args, config.levels_dir.as_deref())?;

    if args.headless {
        return run_headless(&levels[current], &program);
    }

    let mut terminal = setup_terminal()?;
    let mut app = App::new(levels, current, &program);
    let outcome = run_app(&mut terminal, &mut app, Duration::from_millis(config.tick_ms));
    restore_terminal(&mut terminal)?;
    outcome
}

fn load_program(args: &Args) -> Result<Program> {
    let source = match (&args.program, &args.code) {
        (Some(path), _) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read program {}", path.display()))?,
        (None, Some(code)) => code.clone(),
        (None, None) => return Err(anyhow!("no program given; use --program or --code")),
    };
    source.parse::<Program>().context("invalid program")
}

/// Returns the playable levels and the index of the one to start on.
fn load_levels(args: &Args, levels_dir: Option<&std::path::Path>) -> Result<(Vec<Level>, usize)> {
    if let Some(path) = &args.level_file {
        let level = Level::load(path)?;
        return Ok((vec![level], 0));
    }

    let mut levels = builtin_levels().context("built-in levels are broken")?;
    if let Some(dir) = levels_dir {
        let extra = load_levels_dir(dir)
            .with_context(|| format!("failed to load levels from {}", dir.display()))?;
        levels = merge_levels(levels, extra);
    }
    let current = levels
        .iter()
        .position(|level| level.id() == args.level)
        .ok_or_else(|| anyhow!("no level with id {}", args.level))?;
    Ok((levels, current))
}

fn run_headless(level: &Level, program: &Program) -> Result<()> {
    for index in level.disallowed(program) {
        println!(
            "note: instruction {} ({}) is not in this level's palette",
            index + 1,
            program.instructions()[index]
        );
    }

    let result = level.play(program);
    println!("Level {}: {}", level.id(), level.name());
    for (n, entry) in result.trace.iter().enumerate() {
        let pos = entry.agent.position;
        println!(
            "{:>3}. [{}] {:<8} -> ({}, {}) facing {:?}",
            n + 1,
            entry.index + 1,
            entry.action.to_string(),
            pos.x,
            pos.y,
            entry.agent.facing
        );
    }
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    let pos = result.final_agent.position;
    println!(
        "{} at ({}, {}) with {} star(s)",
        if result.success { "Success" } else { "Try again" },
        pos.x,
        pos.y,
        result.stars
    );
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draws, handles keys, and advances the run one step per tick.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App<'_>,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char('r') => app.restart(),
                    KeyCode::Char('n') => app.next_level(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(frame: &mut Frame, app: &App<'_>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // map and program
            Constraint::Length(5), // outcome
            Constraint::Length(2), // help
        ])
        .split(frame.area());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(rows[0]);

    render_map(frame, columns[0], app);
    render_program(frame, columns[1], app);
    render_outcome(frame, rows[1], app);

    let help_text = Paragraph::new("'r' restart  'n' next level  'q'/'Esc' quit")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, rows[2]);
}

/// Draws the working grid with the agent on top.
fn render_map(frame: &mut Frame, area: Rect, app: &App<'_>) {
    let mut lines: Vec<Line> = Vec::with_capacity(app.grid.height());

    for (y, row) in app.grid.rows().enumerate() {
        let mut spans: Vec<Span> = Vec::with_capacity(row.len() * 2);
        for (x, tile) in row.iter().enumerate() {
            let span = if app.agent.position.x == x && app.agent.position.y == y {
                let arrow = match app.agent.facing {
                    Facing::Up => "^",
                    Facing::Right => ">",
                    Facing::Down => "v",
                    Facing::Left => "<",
                };
                Span::styled(arrow, Style::default().fg(Color::LightRed).bold())
            } else if tile.item {
                Span::styled("*", Style::default().fg(Color::Magenta))
            } else {
                match tile.kind {
                    TileKind::Wall => Span::styled("#", Style::default().fg(Color::DarkGray)),
                    TileKind::Goal => Span::styled("G", Style::default().fg(Color::Green).bold()),
                    TileKind::Start => Span::styled("s", Style::default().fg(Color::Blue)),
                    TileKind::Path => Span::raw("."),
                }
            };
            spans.push(span);
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    let level = app.level();
    let title = format!("Level {}: {}", level.id(), level.name());
    let map = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map, area);
}

/// Lists the program, highlighting the running instruction.
fn render_program(frame: &mut Frame, area: Rect, app: &App<'_>) {
    let active = app.current_index();
    let blocked = app.level().disallowed(app.program);

    let items: Vec<ListItem> = app
        .program
        .instructions()
        .iter()
        .enumerate()
        .map(|(i, instruction)| {
            let mut style = Style::default();
            if blocked.contains(&i) {
                style = style.fg(Color::Red);
            }
            if active == Some(i) {
                style = style.bg(Color::Yellow).fg(Color::Black);
            }
            ListItem::new(Line::styled(format!("{:>2}. {instruction}", i + 1), style))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Program ({} / par {})", app.program.len(), app.level().par())),
    );
    frame.render_widget(list, area);
}

fn render_outcome(frame: &mut Frame, area: Rect, app: &App<'_>) {
    let mut lines = vec![Line::from(app.level().description().to_string())];

    match &app.result {
        None => lines.push(Line::styled("Running...", Style::default().fg(Color::Yellow))),
        Some(result) => {
            let stars = "*".repeat(result.stars as usize) + &"-".repeat(3 - result.stars as usize);
            let verdict = if result.success {
                Span::styled("Success! ", Style::default().fg(Color::Green).bold())
            } else {
                Span::styled("Try again. ", Style::default().fg(Color::Red).bold())
            };
            lines.push(Line::from(vec![
                verdict,
                Span::styled(stars, Style::default().fg(Color::Yellow)),
                Span::raw(format!(
                    "  ({} steps, best {} star(s), {} total)",
                    result.trace.len(),
                    app.progress.get(result.level_id).stars,
                    app.progress.total_stars()
                )),
            ]));
            if let Some(warning) = result.warnings.first() {
                lines.push(Line::styled(
                    warning.to_string(),
                    Style::default().fg(Color::Yellow),
                ));
            }
        }
    }
    if !app.status.is_empty() {
        lines.push(Line::raw(app.status.clone()));
    }

    let outcome = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Outcome"));
    frame.render_widget(outcome, area);
}
