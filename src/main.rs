//! BCI Screen entry point
//!
//! Handles platform-specific initialization and runs the screen loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlElement, KeyboardEvent};

    use bci_screen::backend::Backend;
    use bci_screen::backend::http::{self, HttpBackend};
    use bci_screen::driver::Direction;
    use bci_screen::report;
    use bci_screen::screen::{Effect, Layout, ScreenState, Target, TickInput};
    use bci_screen::signal::{PollMode, PowerSampler};
    use bci_screen::speech::rosbridge::RosbridgeSpeaker;
    use bci_screen::speech::{ROSBRIDGE_URL, Speaker};
    use bci_screen::{Endpoints, Route, ScreenConfig};

    /// Page instance holding all state
    struct App {
        screen: ScreenState,
        sampler: PowerSampler,
        backend: HttpBackend,
        speaker: RosbridgeSpeaker,
        dot: HtmlElement,
        poll_handle: Option<i32>,
        timeout_handle: Option<i32>,
    }

    impl App {
        /// Mirror the dot's model position into the page
        fn render(&self) {
            let style = self.dot.style();
            let _ = style.set_property("left", &format!("{}px", self.screen.dot.pos.x));
            let _ = style.set_property("top", &format!("{}px", self.screen.dot.pos.y));
        }
    }

    fn window() -> Result<web_sys::Window, JsValue> {
        web_sys::window().ok_or_else(|| JsValue::from_str("no window"))
    }

    fn element(document: &web_sys::Document, id: &str) -> Result<HtmlElement, JsValue> {
        document
            .get_element_by_id(id)
            .ok_or_else(|| JsValue::from_str(&format!("missing #{}", id)))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| JsValue::from_str(&format!("#{} is not an HTML element", id)))
    }

    fn target(el: &HtmlElement) -> Target {
        let rect = el.get_bounding_client_rect();
        Target::new(rect.left() as f32, rect.top() as f32, el.offset_width() as f32)
    }

    /// Config embedded in the page wins over the route preset
    fn load_config(document: &web_sys::Document, route: Route) -> Option<ScreenConfig> {
        let embedded = document
            .get_element_by_id("screen_config")
            .and_then(|el| el.text_content());
        if let Some(json) = embedded {
            match ScreenConfig::from_json(&json) {
                Ok(config) => return Some(config),
                Err(e) => log::warn!("Ignoring embedded screen config: {}", e),
            }
        }
        ScreenConfig::for_route(route)
    }

    pub fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialized".into());
        }

        let window = window()?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let path = window.location().pathname()?;
        let Some(route) = Route::from_path(&path) else {
            log::warn!("Unknown page {}", path);
            return Ok(());
        };
        let Some(config) = load_config(&document, route) else {
            log::info!("Page {} has no interactive screen", path);
            return Ok(());
        };
        log::info!("BCI screen '{}' starting...", config.name);

        // Dot position is driven through CSS left/top from here on
        let screen = window.screen()?;
        let viewport = Vec2::new(screen.width()? as f32, screen.height()? as f32);
        let dot = element(&document, "main_dot")?;
        let _ = dot.style().set_property("position", "absolute");

        let (left_id, right_id) = config.target_ids();
        let layout = Layout::measured(
            viewport,
            dot.offset_width() as f32,
            target(&element(&document, &left_id)?),
            target(&element(&document, &right_id)?),
            config.right_target_offset,
        );

        let poll_interval = config.poll_interval_ms as i32;
        let app = Rc::new(RefCell::new(App {
            sampler: PowerSampler::new(config.poll_mode),
            screen: ScreenState::new(config, layout),
            backend: HttpBackend::new(Endpoints::default()),
            speaker: RosbridgeSpeaker::connect(ROSBRIDGE_URL),
            dot,
            poll_handle: None,
            timeout_handle: None,
        }));

        // Start polling
        {
            let app_poll = Rc::clone(&app);
            let closure = Closure::<dyn FnMut()>::new(move || poll(&app_poll));
            let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                poll_interval,
            )?;
            closure.forget();
            app.borrow_mut().poll_handle = Some(handle);
        }

        setup_keyboard(Rc::clone(&app))?;

        let effects = app.borrow_mut().screen.start();
        app.borrow().render();
        apply(&app, effects);

        log::info!("BCI screen running!");
        Ok(())
    }

    fn poll(app: &Rc<RefCell<App>>) {
        let mode = app.borrow().sampler.mode;
        let power = match mode {
            PollMode::Synchronous => {
                let mut guard = app.borrow_mut();
                let a = &mut *guard;
                a.sampler.poll(&mut a.backend)
            }
            PollMode::FireAndForget => {
                let used = app.borrow().sampler.latest();
                let url = app.borrow().backend.endpoints.power.clone();
                let pending = Rc::clone(app);
                let sent = http::get_number_async(&url, move |result| {
                    pending.borrow_mut().sampler.resolve(result);
                });
                if let Err(e) = sent {
                    app.borrow_mut().sampler.resolve(Err(e));
                }
                used
            }
        };

        let effects = app.borrow_mut().screen.tick(TickInput::Power(power));
        app.borrow().render();
        apply(app, effects);
    }

    fn on_timeout(app: &Rc<RefCell<App>>) {
        app.borrow_mut().timeout_handle = None;
        let vote = match app.borrow_mut().backend.timeout_vote() {
            Ok(vote) => Some(vote),
            Err(e) => {
                log::warn!("Timeout vote unavailable: {}", e);
                None
            }
        };
        let effects = app.borrow_mut().screen.on_timeout(vote);
        app.borrow().render();
        apply(app, effects);
    }

    fn arm_timeout(app: &Rc<RefCell<App>>, after_ms: u32) {
        let Ok(window) = window() else {
            return;
        };
        if let Some(handle) = app.borrow_mut().timeout_handle.take() {
            window.clear_timeout_with_handle(handle);
        }

        let app_timeout = Rc::clone(app);
        let closure = Closure::once(move || on_timeout(&app_timeout));
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            after_ms as i32,
        ) {
            Ok(handle) => app.borrow_mut().timeout_handle = Some(handle),
            Err(e) => log::warn!("Failed to arm timeout: {:?}", e),
        }
        closure.forget();
    }

    /// Carry out screen effects in order
    fn apply(app: &Rc<RefCell<App>>, effects: Vec<Effect>) {
        let Ok(window) = window() else {
            return;
        };

        for effect in effects {
            match effect {
                Effect::NotifyIndex(index) => {
                    let result = app.borrow_mut().backend.notify_index(index);
                    if let Err(e) = result {
                        log::warn!("Index notification {} failed: {}", index, e);
                    }
                }
                Effect::Speak(text) => app.borrow_mut().speaker.speak(&text),
                Effect::ArmTimeout { after_ms } => arm_timeout(app, after_ms),
                Effect::CancelTimeout => {
                    if let Some(handle) = app.borrow_mut().timeout_handle.take() {
                        window.clear_timeout_with_handle(handle);
                    }
                }
                Effect::CancelPolling => {
                    if let Some(handle) = app.borrow_mut().poll_handle.take() {
                        window.clear_interval_with_handle(handle);
                    }
                }
                Effect::Flush(sheet) => {
                    report::flush(&mut app.borrow_mut().backend, &sheet);
                }
                Effect::Navigate(route) => {
                    log::info!("Navigating to {}", route.path());
                    if let Err(e) = window.location().set_href(route.path()) {
                        log::warn!("Navigation to {} failed: {:?}", route.path(), e);
                    }
                }
            }
        }
    }

    /// Arrow keys move the dot without the headset
    fn setup_keyboard(app: Rc<RefCell<App>>) -> Result<(), JsValue> {
        let window = window()?;
        let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
            let Some(direction) = Direction::from_key(&event.key()) else {
                return;
            };
            let effects = app.borrow_mut().screen.nudge(direction.step());
            app.borrow().render();
            apply(&app, effects);
        });
        window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref())?;
        closure.forget();
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    if let Err(e) = wasm_app::run() {
        log::error!("BCI screen failed to start: {:?}", e);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let seed = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u64>()
            .with_context(|| format!("seed must be an unsigned integer, got {:?}", arg))?,
        None => 42,
    };
    log::info!("BCI screen (native) starting with seed {}...", seed);

    native::run_session(seed)
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::rc::Rc;

    use glam::Vec2;

    use bci_screen::driver::SessionDriver;
    use bci_screen::screen::{Choice, Layout, ScreenState, Target};
    use bci_screen::signal::{Intent, LocalBackend, SyntheticHeadset};
    use bci_screen::speech::LogSpeaker;
    use bci_screen::{Flow, Route, ScreenConfig};

    /// Upper bound on virtual time per screen (ms)
    const SCREEN_LIMIT_MS: u64 = 10 * 60 * 1000;

    /// 1080p page with the boxes at the screen edges
    fn layout(config: &ScreenConfig) -> Layout {
        Layout::measured(
            Vec2::new(1920.0, 1080.0),
            60.0,
            Target::new(40.0, 500.0, 300.0),
            Target::new(1580.0, 500.0, 300.0),
            config.right_target_offset,
        )
    }

    /// Steer towards the correct answer (or into the test on a gate)
    fn intent(screen: &ScreenState) -> Intent {
        match (&screen.config.flow, screen.current_stimulus()) {
            (Flow::Gate { .. }, _) => Intent::Right,
            (_, Some(stimulus)) => match stimulus.expected() {
                Choice::Yes => Intent::Right,
                Choice::No => Intent::Left,
            },
            (_, None) => Intent::Undecided,
        }
    }

    pub fn run_session(seed: u64) -> anyhow::Result<()> {
        let mut backend = LocalBackend::new();
        let clock = backend.clock();
        let mut route = Route::Intro;

        while let Some(config) = ScreenConfig::for_route(route) {
            if route == Route::Intro {
                backend.set_start_time();
            }
            let saved_before = backend.saved.len();
            let feed = SyntheticHeadset::new(seed ^ route as u64).feeding(backend.power());
            let screen = ScreenState::new(config.clone(), layout(&config));

            let mut driver = SessionDriver::new(screen, feed, &mut backend, LogSpeaker)
                .with_clock(Rc::clone(&clock));
            let opened_at = driver.now_ms();
            driver.start();
            while driver.route().is_none() && driver.now_ms() - opened_at <= SCREEN_LIMIT_MS {
                let aim = intent(&driver.screen);
                driver.source_mut().headset.intent = aim;
                if !driver.step() {
                    break;
                }
            }

            let Some(next) = driver.route() else {
                anyhow::bail!("screen '{}' did not finish", config.name);
            };
            log::info!(
                "Screen '{}' finished after {} ms -> {}",
                config.name,
                driver.now_ms() - opened_at,
                next.path()
            );
            drop(driver);

            for line in &backend.saved_lines()[saved_before..] {
                log::info!("Saved {}", line);
            }
            route = next;
        }

        let recordings = backend.recordings();
        log::info!(
            "Session ended at {} with {} recorded polls",
            route.path(),
            recordings.len()
        );
        for row in &recordings {
            log::debug!(
                "Recording question={:?} time={}ms com={}",
                row.question,
                row.elapsed_ms,
                row.com
            );
        }
        Ok(())
    }
}
