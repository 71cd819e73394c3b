use std::collections::HashSet;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::canvas::{Canvas, Map, MapResolution, Points};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::UnicodeWidthStr;

use crate::feed::{FeedStore, Intent, Moment, Outcome};
use crate::geo::{GeolocationProvider, LocationState, Locator};
use crate::map::{MapMarkers, Viewport};
use crate::model::{Comment, Coordinate, MediaKind, MediaRef, NewPost, Post, PostId};
use crate::player::Player;
use crate::profile::{Profile, ProfileSource};
use crate::reactions::ReactionEvent;
use crate::router::{Router, View};
use crate::scroll::{FeedScrollController, ScrollTarget, SmoothScroll, SnapDirection};
use crate::upload;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COLOR_FLAME: Color = Color::Rgb(255, 69, 0);
const COLOR_FLAME_GLOW: Color = Color::Rgb(250, 179, 135);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const ICON_FLAME: &str = "🔥";
const ICON_DOWNVOTE: &str = "👎";
const ICON_COMMENTS: &str = "💬";
const MAP_SPAN_DEFAULT: f64 = 60.0;
const MAP_SPAN_MIN: f64 = 2.0;
const MAP_SPAN_MAX: f64 = 360.0;

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
enum ComposeField {
    #[default]
    Content,
    Image,
    Music,
    Submit,
}

impl ComposeField {
    fn next(self) -> Self {
        match self {
            ComposeField::Content => ComposeField::Image,
            ComposeField::Image => ComposeField::Music,
            ComposeField::Music => ComposeField::Submit,
            ComposeField::Submit => ComposeField::Content,
        }
    }

    fn previous(self) -> Self {
        match self {
            ComposeField::Content => ComposeField::Submit,
            ComposeField::Image => ComposeField::Content,
            ComposeField::Music => ComposeField::Image,
            ComposeField::Submit => ComposeField::Music,
        }
    }
}

#[derive(Default)]
struct ComposeForm {
    id: u64,
    focus: ComposeField,
    content: String,
    image_path: String,
    music_path: String,
    media: Option<MediaRef>,
    audio: Option<MediaRef>,
    image_pending: bool,
    music_pending: bool,
}

impl ComposeForm {
    fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// The focused text field. Editing a path detaches whatever that path
    /// had attached.
    fn field_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            ComposeField::Content => Some(&mut self.content),
            ComposeField::Image => {
                self.media = None;
                self.image_pending = false;
                Some(&mut self.image_path)
            }
            ComposeField::Music => {
                self.audio = None;
                self.music_pending = false;
                Some(&mut self.music_path)
            }
            ComposeField::Submit => None,
        }
    }

    fn path_for(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Image => &self.image_path,
            MediaKind::Audio => &self.music_path,
        }
    }

    fn set_pending(&mut self, kind: MediaKind, pending: bool) {
        match kind {
            MediaKind::Image => self.image_pending = pending,
            MediaKind::Audio => self.music_pending = pending,
        }
    }

    fn set_media(&mut self, kind: MediaKind, media: Option<MediaRef>) {
        match kind {
            MediaKind::Image => self.media = media,
            MediaKind::Audio => self.audio = media,
        }
    }

    fn is_uploading(&self) -> bool {
        self.image_pending || self.music_pending
    }

    fn to_new_post(&self) -> NewPost {
        NewPost {
            content: self.content.clone(),
            media: self.media.clone(),
            audio: self.audio.clone(),
        }
    }
}

enum AsyncResponse {
    Location(Result<Coordinate>),
    Upload {
        form: u64,
        path: String,
        kind: MediaKind,
        result: Result<Option<MediaRef>>,
    },
}

#[derive(Clone)]
pub struct Options {
    pub store: FeedStore,
    pub profile_source: Arc<dyn ProfileSource>,
    pub geolocation: Arc<dyn GeolocationProvider>,
    pub uploader: upload::Reader,
    pub player: Player,
    pub tick_rate: Duration,
    pub scroll_animation: Duration,
    pub wheel_step: u16,
    pub status_message: String,
}

pub struct Model {
    store: FeedStore,
    router: Router,
    scroll: FeedScrollController,
    smooth: SmoothScroll,
    expanded_comments: HashSet<PostId>,
    comment_draft: Option<String>,
    compose: ComposeForm,
    profile_source: Arc<dyn ProfileSource>,
    profile: Option<Profile>,
    geolocation: Arc<dyn GeolocationProvider>,
    locator: Locator,
    map_span: f64,
    uploader: upload::Reader,
    player: Player,
    forms_opened: u64,
    status_message: String,
    tick_rate: Duration,
    wheel_step: f64,
    flame_phase: bool,
    spinner: Spinner,
    needs_redraw: bool,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let len = options.store.posts().len();
        Self {
            store: options.store,
            router: Router::new(),
            scroll: FeedScrollController::new(len, 0.0),
            smooth: SmoothScroll::new(options.scroll_animation),
            expanded_comments: HashSet::new(),
            comment_draft: None,
            compose: ComposeForm::default(),
            profile_source: options.profile_source,
            profile: None,
            geolocation: options.geolocation,
            locator: Locator::default(),
            map_span: MAP_SPAN_DEFAULT,
            uploader: options.uploader,
            player: options.player,
            forms_opened: 0,
            status_message: options.status_message,
            tick_rate: options.tick_rate,
            wheel_step: f64::from(options.wheel_step.max(1)),
            flame_phase: false,
            spinner: Spinner::new(),
            needs_redraw: true,
            response_tx,
            response_rx,
        }
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                tracing::warn!("key handling failed: {err:#}");
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(..) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                let elapsed = last_tick.elapsed();
                last_tick = Instant::now();
                if self.tick(elapsed, last_tick) {
                    self.mark_dirty();
                }
            }
        }

        Ok(())
    }

    /// Advances animations and timers. Returns true when a redraw is due.
    fn tick(&mut self, elapsed: Duration, now: Instant) -> bool {
        let mut dirty = self.smooth.step(elapsed);
        if self.store.tick(now) {
            dirty = true;
        }
        if self.store.has_live_flares() {
            self.flame_phase = !self.flame_phase;
            dirty = true;
        }
        if self.is_loading() {
            if self.spinner.advance() {
                dirty = true;
            }
        } else {
            self.spinner.reset();
        }
        dirty
    }

    fn is_loading(&self) -> bool {
        let waiting_for_location =
            self.router.view() == View::Map && self.locator.state() != LocationState::Pending
                && self.locator.state().coordinate().is_none();
        waiting_for_location || self.compose.is_uploading()
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.response_rx.try_recv() {
            changed = true;
            match response {
                AsyncResponse::Location(result) => {
                    if !self.locator.resolve(result) {
                        self.status_message =
                            "Could not determine your location; the map is still waiting."
                                .to_string();
                    }
                }
                AsyncResponse::Upload {
                    form,
                    path,
                    kind,
                    result,
                } => {
                    if form != self.compose.id || self.compose.path_for(kind).trim() != path {
                        tracing::debug!(form, kind = kind.label(), "dropping stale upload");
                        continue;
                    }
                    self.compose.set_pending(kind, false);
                    match result {
                        Ok(Some(media)) => {
                            self.status_message =
                                format!("Attached {}: {}", kind.label(), media.label());
                            self.compose.set_media(kind, Some(media));
                        }
                        Ok(None) => {
                            self.compose.set_media(kind, None);
                            self.status_message =
                                format!("No file selected; {} left unset.", kind.label());
                        }
                        Err(err) => {
                            tracing::warn!("{} upload failed: {err:#}", kind.label());
                            self.compose.set_media(kind, None);
                            self.status_message = format!("Upload failed: {err}");
                        }
                    }
                }
            }
        }
        changed
    }

    fn current_post_id(&self) -> Option<PostId> {
        self.store.posts().at(self.scroll.index()).map(|post| post.id)
    }

    fn select_view(&mut self, view: View) {
        if view == View::Profile {
            self.router.view_profile(None);
        } else {
            self.router.select(view);
        }
        self.on_view_entered();
    }

    fn on_view_entered(&mut self) {
        self.comment_draft = None;
        match self.router.view() {
            View::Profile => self.load_profile(),
            View::Map => {
                let tx = self.response_tx.clone();
                self.locator
                    .request(self.geolocation.clone(), tx, AsyncResponse::Location);
            }
            View::Feed | View::Create => {}
        }
        self.status_message = view_status(self.router.view());
        self.mark_dirty();
    }

    fn load_profile(&mut self) {
        let target = self.router.profile_target().map(str::to_string);
        match self.profile_source.load(target.as_deref()) {
            Ok(profile) => self.profile = Some(profile),
            Err(err) => {
                tracing::warn!("profile load failed: {err:#}");
                self.profile = None;
            }
        }
    }

    fn dispatch(&mut self, intent: Intent) {
        match self.store.dispatch(intent, Moment::now()) {
            Ok(outcome) => {
                if let Some(message) = outcome_status(&outcome, self.store.thresholds().flame) {
                    self.status_message = message;
                }
                if let Outcome::Created(_) = outcome {
                    self.scroll.set_len(self.store.posts().len());
                    if let Some(target) = self.scroll.jump_to(0) {
                        self.smooth.settle(target);
                    }
                }
            }
            Err(err) => {
                tracing::warn!("feed update rejected: {err}");
                self.status_message = format!("Error: {err}");
            }
        }
        self.mark_dirty();
    }

    fn follow(&mut self, target: Option<ScrollTarget>) {
        if let Some(target) = target {
            self.smooth.retarget(target);
            self.comment_draft = None;
            self.mark_dirty();
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(true);
        }

        if self.comment_draft.is_some() {
            self.handle_comment_key(key.code);
            return Ok(false);
        }

        if self.router.view() == View::Create {
            self.handle_compose_key(key.code);
            return Ok(false);
        }

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc => {
                if self.router.view() == View::Feed {
                    return Ok(true);
                }
                self.router.close();
                self.on_view_entered();
                return Ok(false);
            }
            KeyCode::Char(ch @ '1'..='4') => {
                if let Some(view) = View::from_index((ch as u8 - b'1') as usize) {
                    self.select_view(view);
                }
                return Ok(false);
            }
            KeyCode::Tab => {
                let next = View::from_index((self.router.view().index() + 1) % View::ALL.len())
                    .unwrap_or_default();
                self.select_view(next);
                return Ok(false);
            }
            _ => {}
        }

        match self.router.view() {
            View::Feed => self.handle_feed_key(key.code),
            View::Map => self.handle_map_key(key.code),
            View::Profile | View::Create => {}
        }
        Ok(false)
    }

    fn handle_feed_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::PageDown | KeyCode::Char(' ') => {
                let target = self.scroll.snap(SnapDirection::Next);
                self.follow(target);
            }
            KeyCode::Char('k') | KeyCode::Up | KeyCode::PageUp => {
                let target = self.scroll.snap(SnapDirection::Previous);
                self.follow(target);
            }
            KeyCode::Home | KeyCode::Char('g') => {
                let target = self.scroll.jump_to(0);
                self.follow(target);
            }
            KeyCode::End | KeyCode::Char('G') => {
                let target = self.scroll.jump_to(self.scroll.len().saturating_sub(1));
                self.follow(target);
            }
            KeyCode::Char('f') => {
                if let Some(id) = self.current_post_id() {
                    self.dispatch(Intent::Flame(id));
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.current_post_id() {
                    self.dispatch(Intent::Downvote(id));
                }
            }
            KeyCode::Char('a') => {
                if let Some(id) = self.current_post_id() {
                    self.dispatch(Intent::Connect(id));
                }
            }
            KeyCode::Char('c') => {
                if let Some(id) = self.current_post_id() {
                    if !self.expanded_comments.remove(&id) {
                        self.expanded_comments.insert(id);
                    }
                    self.mark_dirty();
                }
            }
            KeyCode::Char('i') | KeyCode::Enter => {
                if let Some(id) = self.current_post_id() {
                    self.expanded_comments.insert(id);
                    self.comment_draft = Some(String::new());
                    self.status_message =
                        "Add a comment. Enter posts it; Esc closes the input.".to_string();
                    self.mark_dirty();
                }
            }
            KeyCode::Char('p') => {
                if let Some(post) = self.store.posts().at(self.scroll.index()) {
                    let artist = post.artist.clone();
                    self.router.view_profile(Some(artist));
                    self.on_view_entered();
                }
            }
            KeyCode::Char('P') => self.select_view(View::Profile),
            KeyCode::Char('m') => self.play_current(MediaKind::Audio),
            KeyCode::Char('v') => self.play_current(MediaKind::Image),
            _ => {}
        }
    }

    fn handle_comment_key(&mut self, code: KeyCode) {
        let Some(draft) = self.comment_draft.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => {
                self.comment_draft = None;
                self.status_message = view_status(View::Feed);
            }
            KeyCode::Enter => {
                let text = std::mem::take(draft);
                if text.trim().is_empty() {
                    // blank drafts stay open, nothing is sent
                    *draft = text;
                } else if let Some(post) = self.current_post_id() {
                    self.dispatch(Intent::Comment { post, text });
                }
            }
            KeyCode::Backspace => {
                draft.pop();
            }
            KeyCode::Char(ch) => draft.push(ch),
            _ => {}
        }
        self.mark_dirty();
    }

    fn handle_compose_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.reset_compose();
                self.router.close();
                self.on_view_entered();
                self.status_message = "Post discarded.".to_string();
            }
            KeyCode::Tab | KeyCode::Down => self.compose.focus = self.compose.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.compose.focus = self.compose.focus.previous(),
            KeyCode::Enter => match self.compose.focus {
                ComposeField::Content => self.compose.focus = ComposeField::Image,
                ComposeField::Image => {
                    self.start_upload(MediaKind::Image);
                    self.compose.focus = ComposeField::Music;
                }
                ComposeField::Music => {
                    self.start_upload(MediaKind::Audio);
                    self.compose.focus = ComposeField::Submit;
                }
                ComposeField::Submit => self.submit_post(),
            },
            KeyCode::Backspace => {
                if let Some(field) = self.compose.field_mut() {
                    field.pop();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(field) = self.compose.field_mut() {
                    field.push(ch);
                }
            }
            _ => {}
        }
        self.mark_dirty();
    }

    fn start_upload(&mut self, kind: MediaKind) {
        let raw = self.compose.path_for(kind).trim().to_string();
        if raw.is_empty() {
            self.compose.set_media(kind, None);
            return;
        }
        let path = expand_home(&raw);
        self.compose.set_pending(kind, true);
        self.status_message = format!("Reading {}…", path.display());
        let form = self.compose.id;
        self.uploader
            .spawn(path, kind, self.response_tx.clone(), move |kind, result| {
                AsyncResponse::Upload {
                    form,
                    path: raw,
                    kind,
                    result,
                }
            });
    }

    /// Replaces the create form with a blank one. Uploads still in flight
    /// for the old form are dropped when they arrive.
    fn reset_compose(&mut self) {
        self.forms_opened += 1;
        self.compose = ComposeForm::new(self.forms_opened);
    }

    fn play_current(&mut self, kind: MediaKind) {
        let Some(post) = self.store.posts().at(self.scroll.index()) else {
            return;
        };
        let media = match kind {
            MediaKind::Image => post.media.as_ref(),
            MediaKind::Audio => post.audio.as_ref(),
        };
        let Some(media) = media else {
            self.status_message = format!("This post has no {}.", kind.label());
            self.mark_dirty();
            return;
        };
        let title = format!("{}: {}", post.artist, post.content);
        self.status_message = match self.player.launch(media, kind, &title) {
            Ok(()) => match kind {
                MediaKind::Audio => format!("Playing music from {}.", post.artist),
                MediaKind::Image => format!("Opened image from {}.", post.artist),
            },
            Err(err) => {
                tracing::warn!("{} playback failed: {err:#}", kind.label());
                format!("Could not open {}: {err}", kind.label())
            }
        };
        self.mark_dirty();
    }

    fn submit_post(&mut self) {
        if self.compose.is_uploading() {
            self.status_message = "Wait for uploads to finish before posting.".to_string();
            return;
        }
        let fields = self.compose.to_new_post();
        self.reset_compose();
        self.router.close();
        self.on_view_entered();
        self.dispatch(Intent::CreatePost(fields));
    }

    fn handle_map_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.map_span = (self.map_span / 2.0).max(MAP_SPAN_MIN);
            }
            KeyCode::Char('-') => {
                self.map_span = (self.map_span * 2.0).min(MAP_SPAN_MAX);
            }
            KeyCode::Char('0') => self.map_span = MAP_SPAN_MAX,
            _ => return,
        }
        self.mark_dirty();
    }

    fn handle_mouse(&mut self, event: MouseEvent) {
        if self.router.view() != View::Feed || self.comment_draft.is_some() {
            return;
        }
        let delta = match event.kind {
            MouseEventKind::ScrollDown => self.wheel_step,
            MouseEventKind::ScrollUp => -self.wheel_step,
            _ => return,
        };
        self.wheel(delta);
    }

    fn wheel(&mut self, delta: f64) {
        let height = self.scroll.post_height();
        let max = height * self.scroll.len().saturating_sub(1) as f64;
        let position = self.smooth.nudge(delta, max);
        if let Some(target) = self.scroll.on_scroll(delta, position) {
            self.smooth.retarget(target);
        }
        self.mark_dirty();
    }

    fn sync_feed_height(&mut self, rows: u16) {
        let rows = f64::from(rows);
        if (self.scroll.post_height() - rows).abs() > f64::EPSILON {
            let target = self.scroll.resize(rows);
            self.smooth.settle(target);
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        let titles: Vec<Line> = View::ALL
            .iter()
            .enumerate()
            .map(|(idx, view)| Line::from(format!("{} {}", idx + 1, view.title())))
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.router.view().index())
            .style(Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_PANEL_BG))
            .highlight_style(
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )
            .divider("│");
        frame.render_widget(tabs, layout[1]);

        match self.router.view() {
            View::Feed => self.draw_feed(frame, layout[2]),
            View::Create => self.draw_compose(frame, layout[2]),
            View::Profile => self.draw_profile(frame, layout[2]),
            View::Map => self.draw_map(frame, layout[2]),
        }

        let footer = Paragraph::new(footer_text(self.router.view(), self.comment_draft.is_some()))
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[3]);
    }

    fn pane_block(&self, title: String, border: Color) -> Block<'static> {
        Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(COLOR_PANEL_BG))
    }

    fn draw_feed(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let now = Instant::now();
        let current = self.current_post_id();
        let flaming = current
            .map(|id| self.store.is_flaming(id, now))
            .unwrap_or(false);
        let border = match (flaming, self.flame_phase) {
            (true, true) => COLOR_FLAME,
            (true, false) => COLOR_FLAME_GLOW,
            _ => COLOR_BORDER_FOCUSED,
        };
        let total = self.store.posts().len();
        let title = if total == 0 {
            "Feed".to_string()
        } else {
            format!("Feed {}/{}", self.scroll.index() + 1, total)
        };
        let block = self.pane_block(title, border);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.sync_feed_height(inner.height);

        if total == 0 {
            let empty = Paragraph::new("No posts yet. Press 2 to create one.")
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .alignment(Alignment::Center);
            frame.render_widget(empty, inner);
            return;
        }

        let height = inner.height as usize;
        if height == 0 {
            return;
        }
        let offset = self.smooth.offset().round().max(0.0) as usize;
        let top = offset / height;
        let skip = offset % height;

        let mut lines = self.post_card(top, inner.width, height, now);
        if skip > 0 && top + 1 < total {
            lines.extend(self.post_card(top + 1, inner.width, height, now));
        }
        let visible: Vec<Line<'static>> = lines.into_iter().skip(skip).take(height).collect();
        frame.render_widget(
            Paragraph::new(Text::from(visible)).style(Style::default().bg(COLOR_PANEL_BG)),
            inner,
        );

        if let Some(draft) = self.comment_draft.as_ref() {
            let input_area = Rect {
                x: inner.x,
                y: inner.y + inner.height.saturating_sub(3),
                width: inner.width,
                height: inner.height.min(3),
            };
            frame.render_widget(Clear, input_area);
            let input = Paragraph::new(format!("{draft}▏"))
                .style(Style::default().fg(COLOR_TEXT_PRIMARY))
                .block(self.pane_block("Add a comment...".to_string(), COLOR_ACCENT));
            frame.render_widget(input, input_area);
        }
    }

    /// Renders post `index` as exactly `height` lines.
    fn post_card(&self, index: usize, width: u16, height: usize, now: Instant) -> Vec<Line<'static>> {
        let Some(post) = self.store.posts().at(index) else {
            return blank_lines(height);
        };
        let wrap_width = width.saturating_sub(2).max(1) as usize;
        let flaming = self.store.is_flaming(post.id, now);
        let flagged = self.store.is_downvote_flagged(post.id);
        let comments = self.store.comments(post.id);

        let mut lines: Vec<Line<'static>> = Vec::new();
        lines.push(post_header(post, flaming, self.flame_phase));
        lines.push(Line::default());
        lines.extend(media_lines(post, wrap_width));
        lines.extend(wrap_plain(
            &post.content,
            wrap_width,
            Style::default().fg(COLOR_TEXT_PRIMARY),
        ));
        lines.push(Line::default());
        lines.push(reaction_line(post, comments.len(), flaming, flagged));

        if self.expanded_comments.contains(&post.id) {
            lines.push(Line::default());
            lines.extend(comment_lines(comments, wrap_width));
        }

        lines.truncate(height);
        pad_lines_to_width(&mut lines, width);
        while lines.len() < height {
            lines.push(Line::default());
        }
        lines
    }

    fn draw_compose(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block("Create Post".to_string(), COLOR_BORDER_FOCUSED);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let form = &self.compose;
        let field_style = |field: ComposeField| {
            if form.focus == field {
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_FOCUSED_BG)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(COLOR_TEXT_SECONDARY)
            }
        };
        let cursor = |field: ComposeField| if form.focus == field { "▏" } else { "" };

        let content = if form.content.is_empty() && form.focus != ComposeField::Content {
            "What's on your mind?".to_string()
        } else {
            format!("{}{}", form.content, cursor(ComposeField::Content))
        };

        let mut lines = vec![Line::from(Span::styled(
            "Content",
            Style::default().fg(COLOR_ACCENT),
        ))];
        lines.extend(wrap_plain(
            &content,
            inner.width.saturating_sub(2).max(1) as usize,
            field_style(ComposeField::Content),
        ));
        lines.push(Line::default());
        for (field, kind, path, media, pending) in [
            (
                ComposeField::Image,
                MediaKind::Image,
                &form.image_path,
                &form.media,
                form.image_pending,
            ),
            (
                ComposeField::Music,
                MediaKind::Audio,
                &form.music_path,
                &form.audio,
                form.music_pending,
            ),
        ] {
            lines.push(Line::from(Span::styled(
                format!("Upload {} (path, Enter to attach)", kind.label()),
                Style::default().fg(COLOR_ACCENT),
            )));
            lines.push(Line::from(Span::styled(
                format!("{path}{}", cursor(field)),
                field_style(field),
            )));
            let (status, color) = match (pending, media) {
                (true, _) => (format!("{} reading…", self.spinner.frame()), COLOR_TEXT_SECONDARY),
                (false, Some(media)) => (format!("attached: {}", media.label()), COLOR_SUCCESS),
                (false, None) => ("nothing attached".to_string(), COLOR_TEXT_SECONDARY),
            };
            lines.push(Line::from(Span::styled(status, Style::default().fg(color))));
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            "[ Post ]",
            field_style(ComposeField::Submit),
        )));

        frame.render_widget(
            Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
            inner,
        );
    }

    fn draw_profile(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block("Profile".to_string(), COLOR_BORDER_FOCUSED);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(profile) = self.profile.as_ref() else {
            frame.render_widget(
                Paragraph::new("Profile unavailable.").style(Style::default().fg(COLOR_ERROR)),
                inner,
            );
            return;
        };

        let width = inner.width.saturating_sub(2).max(1) as usize;
        let mut lines = vec![
            Line::from(Span::styled(
                profile.name.clone(),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!("@{}", profile.id),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )),
            Line::default(),
        ];
        lines.extend(wrap_plain(
            &profile.bio,
            width,
            Style::default().fg(COLOR_TEXT_PRIMARY),
        ));
        lines.push(Line::default());
        lines.push(Line::from(vec![
            stat_span(profile.followers, "Followers"),
            Span::raw("   "),
            stat_span(profile.following, "Following"),
            Span::raw("   "),
            stat_span(profile.posts, "Posts"),
        ]));
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Recent Posts",
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        )));
        for recent in &profile.recent_posts {
            lines.push(Line::from(vec![
                Span::styled(
                    recent.content.clone(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                ),
                Span::styled(
                    format!("  {}", recent.created_ago),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                ),
            ]));
        }
        if !profile.is_own() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                "Press 3 for your own profile.",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        frame.render_widget(Paragraph::new(Text::from(lines)), inner);
    }

    fn draw_map(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let list_height = (self.store.posts().len() as u16).saturating_add(2).min(area.height / 3);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(list_height)])
            .split(area);

        let block = self.pane_block("Map".to_string(), COLOR_BORDER_FOCUSED);
        match self.locator.state().coordinate() {
            Some(user) => {
                let markers = MapMarkers::build(self.store.posts().iter(), Some(user));
                let viewport = Viewport::around(user, self.map_span);
                let post_coords: Vec<(f64, f64)> = markers
                    .posts
                    .iter()
                    .map(|marker| (marker.position.lng, marker.position.lat))
                    .collect();
                let labels: Vec<(f64, f64, String, Color)> = markers
                    .iter()
                    .filter(|marker| viewport.contains(marker.position))
                    .map(|marker| {
                        let color = if marker.post.is_some() {
                            COLOR_FLAME_GLOW
                        } else {
                            COLOR_SUCCESS
                        };
                        (
                            marker.position.lng,
                            marker.position.lat,
                            truncate_label(&marker.label, 32),
                            color,
                        )
                    })
                    .collect();
                let user_coords = [(user.lng, user.lat)];
                let canvas = Canvas::default()
                    .block(block)
                    .marker(symbols::Marker::Braille)
                    .x_bounds(viewport.x_bounds)
                    .y_bounds(viewport.y_bounds)
                    .paint(move |ctx| {
                        ctx.draw(&Map {
                            resolution: MapResolution::High,
                            color: COLOR_BORDER_IDLE,
                        });
                        ctx.layer();
                        ctx.draw(&Points {
                            coords: &post_coords,
                            color: COLOR_FLAME,
                        });
                        ctx.draw(&Points {
                            coords: &user_coords,
                            color: COLOR_SUCCESS,
                        });
                        for (x, y, label, color) in &labels {
                            ctx.print(
                                *x,
                                *y,
                                Line::from(Span::styled(label.clone(), Style::default().fg(*color))),
                            );
                        }
                    });
                frame.render_widget(canvas, chunks[0]);
            }
            None => {
                let waiting = Paragraph::new(format!(
                    "{} Loading your location...",
                    self.spinner.frame()
                ))
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .alignment(Alignment::Center)
                .block(block);
                frame.render_widget(waiting, chunks[0]);
            }
        }

        let lines: Vec<Line<'static>> = self
            .store
            .posts()
            .iter()
            .map(|post| {
                Line::from(vec![
                    Span::styled(
                        format!("{}: ", post.artist),
                        Style::default()
                            .fg(COLOR_TEXT_PRIMARY)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(post.content.clone(), Style::default().fg(COLOR_TEXT_PRIMARY)),
                    Span::styled(
                        format!("  ({})", post.location),
                        Style::default().fg(COLOR_TEXT_SECONDARY),
                    ),
                ])
            })
            .collect();
        let list = Paragraph::new(Text::from(lines))
            .block(self.pane_block("Posts".to_string(), COLOR_BORDER_IDLE));
        frame.render_widget(list, chunks[1]);
    }
}

fn view_status(view: View) -> String {
    match view {
        View::Feed => "Scroll or press j/k to move between posts.".to_string(),
        View::Create => "Write a post. Tab moves between fields; Esc cancels.".to_string(),
        View::Profile => "Viewing profile. Esc returns to the feed.".to_string(),
        View::Map => "Posts around you. +/- zoom; Esc returns to the feed.".to_string(),
    }
}

fn footer_text(view: View, typing: bool) -> &'static str {
    if typing {
        return "Enter: post comment  Esc: close input";
    }
    match view {
        View::Feed => "j/k: move  f: flame  d: downvote  c: comments  i: comment  m: play  v: image  a: connect  p: artist  1-4/Tab: views  q: quit",
        View::Create => "Tab/↑↓: field  Enter: next/attach/post  Esc: cancel",
        View::Profile => "Esc: back  1-4/Tab: views  q: quit",
        View::Map => "+/-: zoom  0: world  Esc: back  1-4/Tab: views  q: quit",
    }
}

fn outcome_status(outcome: &Outcome, flame_threshold: u64) -> Option<String> {
    match outcome {
        Outcome::Reacted(ReactionEvent::Flamed { count, flaming, .. }) => Some(if *flaming {
            format!("{ICON_FLAME} Flamed! {count} flames.")
        } else {
            format!("Flamed. {count} of {flame_threshold} flames to catch fire.")
        }),
        Outcome::Reacted(ReactionEvent::Downvoted { count, flagged, .. }) => Some(if *flagged {
            format!("Downvoted ({count}). This post is sinking.")
        } else {
            format!("Downvoted ({count}).")
        }),
        Outcome::Commented(_) => Some("Comment posted.".to_string()),
        Outcome::CommentRejected => None,
        Outcome::Created(_) => Some("Posted! Your post is at the top of the feed.".to_string()),
        Outcome::Updated(id) => Some(format!("Updated post {id}.")),
        Outcome::Connected(_) => Some("Connection request sent.".to_string()),
    }
}

fn post_header(post: &Post, flaming: bool, phase: bool) -> Line<'static> {
    let mut spans = vec![Span::styled(
        post.artist.clone(),
        Style::default()
            .fg(COLOR_TEXT_PRIMARY)
            .add_modifier(Modifier::BOLD),
    )];
    if flaming {
        let color = if phase { COLOR_FLAME } else { COLOR_FLAME_GLOW };
        spans.push(Span::styled(
            format!("  {ICON_FLAME} ON FIRE {ICON_FLAME}"),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn media_lines(post: &Post, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let style = Style::default().fg(COLOR_TEXT_SECONDARY);
    if let Some(media) = post.media.as_ref() {
        lines.extend(wrap_with_prefix(&media.label(), width, "[image] ", style));
    }
    if let Some(audio) = post.audio.as_ref() {
        lines.extend(wrap_with_prefix(&audio.label(), width, "[music] ", style));
    }
    if !lines.is_empty() {
        lines.push(Line::default());
    }
    lines
}

fn reaction_line(post: &Post, comments: usize, flaming: bool, flagged: bool) -> Line<'static> {
    let flame_style = if flaming {
        Style::default().fg(COLOR_FLAME).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_TEXT_PRIMARY)
    };
    let downvote_style = if flagged {
        Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_TEXT_PRIMARY)
    };
    Line::from(vec![
        Span::styled(format!("{ICON_FLAME} {}", post.flame_count), flame_style),
        Span::raw("   "),
        Span::styled(format!("{ICON_DOWNVOTE} {}", post.downvote_count), downvote_style),
        Span::raw("   "),
        Span::styled(
            format!("{ICON_COMMENTS} {comments}"),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        ),
    ])
}

fn comment_lines(comments: &[Comment], width: usize) -> Vec<Line<'static>> {
    let meta_style = Style::default().fg(COLOR_ACCENT);
    let body_style = Style::default().fg(COLOR_TEXT_PRIMARY);
    if comments.is_empty() {
        return vec![Line::from(Span::styled(
            "No comments yet.",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        ))];
    }
    let mut lines = Vec::new();
    for comment in comments {
        let when = comment.created_at.with_timezone(&Local).format("%b %d %H:%M");
        lines.push(Line::from(Span::styled(
            format!("{} · {when}", comment.author),
            meta_style,
        )));
        lines.extend(wrap_with_prefix(&comment.content, width, "  ", body_style));
    }
    lines
}

fn stat_span(value: u64, label: &str) -> Span<'static> {
    Span::styled(
        format!("{value} {label}"),
        Style::default().fg(COLOR_TEXT_PRIMARY),
    )
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn truncate_label(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        return label.to_string();
    }
    let mut out: String = label.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn blank_lines(height: usize) -> Vec<Line<'static>> {
    (0..height).map(|_| Line::default()).collect()
}

fn wrap_with_prefix(text: &str, width: usize, prefix: &str, style: Style) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(String::new(), style))];
    }

    let wrap_width = width.max(prefix.chars().count().saturating_add(1));
    let options = WrapOptions::new(wrap_width)
        .break_words(true)
        .initial_indent(prefix)
        .subsequent_indent(prefix);

    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefix(text, width, "", style)
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let mut current_width = 0usize;
        for span in &line.spans {
            current_width =
                current_width.saturating_add(UnicodeWidthStr::width(span.content.as_ref()));
        }
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        let padding = " ".repeat(width - current_width);
        line.spans.push(Span::styled(padding, pad_style));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::feed::Settings;
    use crate::geo::FixedLocation;
    use crate::profile::StubProfileSource;
    use crate::seed;
    use crossterm::event::KeyEventState;
    use ratatui::backend::TestBackend;
    use std::fs;
    use tempfile::tempdir;

    const PNG_HEADER: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    fn player(command: &str) -> Player {
        Player::new(&PlayerConfig {
            audio_command: vec![command.to_string(), "%URL%".to_string()],
            image_command: vec![command.to_string(), "%URL%".to_string()],
            spool_dir: None,
        })
    }

    fn model() -> Model {
        model_with_player(player("flamefeed-no-such-player"))
    }

    fn model_with_player(player: Player) -> Model {
        let store = FeedStore::from_seed(seed::bundled(), Settings::default()).unwrap();
        Model::new(Options {
            store,
            profile_source: Arc::new(StubProfileSource::default()),
            geolocation: Arc::new(FixedLocation(Coordinate::new(40.7, -74.0))),
            uploader: upload::Reader::default(),
            player,
            tick_rate: Duration::from_millis(50),
            scroll_animation: Duration::ZERO,
            wheel_step: 3,
            status_message: String::new(),
        })
    }

    fn press(model: &mut Model, code: KeyCode) -> bool {
        model
            .handle_key(KeyEvent {
                code,
                modifiers: KeyModifiers::NONE,
                kind: KeyEventKind::Press,
                state: KeyEventState::NONE,
            })
            .unwrap()
    }

    fn type_text(model: &mut Model, text: &str) {
        for ch in text.chars() {
            press(model, KeyCode::Char(ch));
        }
    }

    fn render(model: &mut Model) {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| model.draw(frame)).unwrap();
    }

    fn total_width(line: &Line<'_>) -> usize {
        line.spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum()
    }

    #[test]
    fn pad_lines_extends_to_width() {
        let mut lines = vec![Line::from(vec![Span::raw("abc")])];
        pad_lines_to_width(&mut lines, 6);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(total_width(&lines[0]), 6);
    }

    #[test]
    fn flame_key_reacts_to_current_post() {
        let mut model = model();
        press(&mut model, KeyCode::Char('j'));
        press(&mut model, KeyCode::Char('f'));
        let id = model.current_post_id().unwrap();
        assert_eq!(id, PostId(2));
        assert_eq!(model.store().post(id).unwrap().flame_count, 1);
        assert!(model.status_message.contains("Flamed"));
    }

    #[test]
    fn comment_input_posts_and_ignores_blank() {
        let mut model = model();
        press(&mut model, KeyCode::Char('i'));
        press(&mut model, KeyCode::Char(' '));
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.store().comments(PostId(1)).len(), 0);
        type_text(&mut model, "banger");
        press(&mut model, KeyCode::Enter);
        let comments = model.store().comments(PostId(1));
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, " banger");
        press(&mut model, KeyCode::Esc);
        assert!(model.comment_draft.is_none());
        assert!(!press(&mut model, KeyCode::Char('j')));
    }

    #[test]
    fn view_switches_keep_feed_data() {
        let mut model = model();
        press(&mut model, KeyCode::Char('f'));
        press(&mut model, KeyCode::Char('i'));
        type_text(&mut model, "nice");
        press(&mut model, KeyCode::Enter);
        press(&mut model, KeyCode::Esc);

        press(&mut model, KeyCode::Char('4'));
        assert_eq!(model.router.view(), View::Map);
        press(&mut model, KeyCode::Char('1'));
        assert_eq!(model.router.view(), View::Feed);

        assert_eq!(model.store().posts().len(), 3);
        assert_eq!(model.store().post(PostId(1)).unwrap().flame_count, 1);
        assert_eq!(model.store().comments(PostId(1)).len(), 1);
    }

    #[test]
    fn compose_submits_new_post_to_top() {
        let mut model = model();
        press(&mut model, KeyCode::Char('2'));
        assert_eq!(model.router.view(), View::Create);
        type_text(&mut model, "fresh beat");
        press(&mut model, KeyCode::BackTab);
        press(&mut model, KeyCode::Enter);
        assert_eq!(model.router.view(), View::Feed);
        let top = model.store().posts().at(0).unwrap();
        assert_eq!(top.content, "fresh beat");
        assert_eq!(top.artist, "Current User");
        assert_eq!(model.scroll.len(), 4);
        assert_eq!(model.scroll.index(), 0);
    }

    /// Blocks until one background upload has been handled.
    fn wait_for_upload(model: &mut Model) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !model.poll_async() {
            assert!(Instant::now() < deadline, "upload never finished");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn attach_image(model: &mut Model, path: &std::path::Path) {
        press(model, KeyCode::Tab);
        type_text(model, &path.display().to_string());
        press(model, KeyCode::Enter);
    }

    #[test]
    fn discarded_form_drops_late_upload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cover.png");
        fs::write(&path, PNG_HEADER).unwrap();

        let mut model = model();
        press(&mut model, KeyCode::Char('2'));
        attach_image(&mut model, &path);
        assert!(model.compose.image_pending);
        press(&mut model, KeyCode::Esc);
        wait_for_upload(&mut model);
        assert!(model.compose.media.is_none());

        press(&mut model, KeyCode::Char('2'));
        type_text(&mut model, "text only");
        press(&mut model, KeyCode::BackTab);
        press(&mut model, KeyCode::Enter);
        let top = model.store().posts().at(0).unwrap();
        assert_eq!(top.content, "text only");
        assert!(top.media.is_none());
    }

    #[test]
    fn editing_path_detaches_upload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cover.png");
        fs::write(&path, PNG_HEADER).unwrap();

        let mut model = model();
        press(&mut model, KeyCode::Char('2'));
        attach_image(&mut model, &path);
        wait_for_upload(&mut model);
        assert_eq!(
            model.compose.media.as_ref().and_then(|m| m.mime.as_deref()),
            Some("image/png")
        );

        press(&mut model, KeyCode::BackTab);
        press(&mut model, KeyCode::Backspace);
        assert!(model.compose.media.is_none());
        assert!(!model.compose.is_uploading());

        press(&mut model, KeyCode::Tab);
        press(&mut model, KeyCode::Tab);
        press(&mut model, KeyCode::Enter);
        assert!(model.store().posts().at(0).unwrap().media.is_none());
    }

    #[test]
    fn play_key_reports_missing_music_and_launch_errors() {
        let mut model = model();
        press(&mut model, KeyCode::Char('m'));
        assert!(model.status_message.starts_with("Could not open music"));

        press(&mut model, KeyCode::Char('2'));
        type_text(&mut model, "no audio here");
        press(&mut model, KeyCode::BackTab);
        press(&mut model, KeyCode::Enter);
        press(&mut model, KeyCode::Char('m'));
        assert_eq!(model.status_message, "This post has no music.");
        press(&mut model, KeyCode::Char('v'));
        assert_eq!(model.status_message, "This post has no image.");
    }

    #[cfg(unix)]
    #[test]
    fn play_key_hands_audio_to_player() {
        let mut model = model_with_player(player("true"));
        press(&mut model, KeyCode::Char('m'));
        assert_eq!(model.status_message, "Playing music from DJ Harmony.");
        press(&mut model, KeyCode::Char('v'));
        assert_eq!(model.status_message, "Opened image from DJ Harmony.");
    }

    #[test]
    fn artist_profile_then_tab_away_clears_target() {
        let mut model = model();
        press(&mut model, KeyCode::Char('p'));
        assert_eq!(model.router.view(), View::Profile);
        assert_eq!(model.router.profile_target(), Some("DJ Harmony"));
        assert_eq!(model.profile.as_ref().unwrap().name, "Other User");
        press(&mut model, KeyCode::Esc);
        assert_eq!(model.router.view(), View::Feed);
        assert!(model.router.profile_target().is_none());
        press(&mut model, KeyCode::Char('3'));
        assert_eq!(model.profile.as_ref().unwrap().name, "Music Maestro");
    }

    #[test]
    fn wheel_past_half_a_post_advances() {
        let mut model = model();
        render(&mut model);
        let height = model.scroll.post_height();
        assert!(height > 0.0);
        let steps = (height / 2.0 / model.wheel_step).ceil() as usize;
        for _ in 0..steps {
            model.wheel(model.wheel_step);
        }
        assert_eq!(model.scroll.index(), 1);
        assert_eq!(model.smooth.offset(), height);
    }

    #[test]
    fn map_resolves_location_in_background() {
        let mut model = model();
        press(&mut model, KeyCode::Char('4'));
        let deadline = Instant::now() + Duration::from_secs(5);
        while model.locator.state().coordinate().is_none() && Instant::now() < deadline {
            model.poll_async();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(
            model.locator.state().coordinate(),
            Some(Coordinate::new(40.7, -74.0))
        );
        render(&mut model);
    }

    #[test]
    fn every_view_renders() {
        let mut model = model();
        for key in ['1', '2'] {
            press(&mut model, KeyCode::Char(key));
            render(&mut model);
        }
        press(&mut model, KeyCode::Esc);
        for key in ['3', '4', '1'] {
            press(&mut model, KeyCode::Char(key));
            render(&mut model);
        }
    }

    #[test]
    fn post_card_fills_requested_height() {
        let model = model();
        let card = model.post_card(0, 40, 12, Instant::now());
        assert_eq!(card.len(), 12);
        assert_eq!(total_width(&card[0]), 40);
        assert!(card[0].spans[0].content.contains("DJ Harmony"));
        assert_eq!(model.post_card(99, 40, 5, Instant::now()).len(), 5);
    }
}
