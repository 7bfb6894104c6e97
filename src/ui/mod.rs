use std::io::{self, Write};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::Key;
use winit::window::{Window, WindowId};
use softbuffer::Surface;

use crate::commands::OutputEvent;
use crate::ui::state::ViewerState;

pub mod layout;
pub mod render;
pub mod state;

/// Redraw interval while a scroll key is held.
const SCROLL_FRAME: Duration = Duration::from_millis(16);

/// Wakes the event loop from other threads.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// A protocol line read from stdin.
    Command(String),
    /// A media worker finished a job.
    MediaReady,
}

/// Writes output events to stdout, one per line.
pub fn emit(events: &[OutputEvent]) {
    if events.is_empty() {
        return;
    }
    let mut out = io::stdout().lock();
    for event in events {
        if let Err(e) = writeln!(out, "{}", event) {
            log::error!("Failed to write to stdout: {}", e);
            return;
        }
    }
    let _ = out.flush();
}

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App {
    pub state: ViewerState,
    pub window: Option<Arc<Window>>,
    pub context: Option<softbuffer::Context<Arc<Window>>>,
    pub surface: Option<Surface<Arc<Window>, Arc<Window>>>,
    pub next_redraw: Option<Instant>,
}

impl App {
    pub fn new(state: ViewerState) -> Self {
        Self {
            state,
            window: None,
            context: None,
            surface: None,
            next_redraw: None,
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    /// Flushes pending output and stops the loop if a quit was requested.
    fn after_input(&mut self, event_loop: &ActiveEventLoop) {
        emit(&self.state.take_events());
        if self.state.should_quit() {
            event_loop.exit();
        } else {
            self.request_redraw();
        }
    }

    fn create_surface(
        &mut self,
        event_loop: &ActiveEventLoop,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (width, height) = self.state.window_size;
        let attrs = Window::default_attributes()
            .with_title("spreadview")
            .with_inner_size(LogicalSize::new(width, height));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let context = softbuffer::Context::new(Arc::clone(&window))?;
        let surface = Surface::new(&context, Arc::clone(&window))?;

        let size = window.inner_size();
        self.state.resize(size.width.max(1), size.height.max(1));
        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);
        Ok(())
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_surface(event_loop) {
            log::error!("Failed to create window: {}", e);
            event_loop.exit();
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::Command(line) => {
                self.state.execute_line(&line);
                self.after_input(event_loop);
            }
            UserEvent::MediaReady => self.request_redraw(),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.state.request_quit();
                event_loop.exit();
            }

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) else {
                    return;
                };
                if let Some(ref mut surface) = self.surface {
                    if let Err(e) = surface.resize(w, h) {
                        log::error!("Failed to resize surface: {}", e);
                    }
                }
                self.state.resize(width, height);
                self.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed;
                match &event.logical_key {
                    Key::Named(named) => {
                        if pressed {
                            self.state.keys_pressed.insert(*named);
                            self.state.keys_down.insert(*named);
                        } else {
                            self.state.keys_down.remove(named);
                        }
                    }
                    Key::Character(s) => {
                        if let Some(c) = s.chars().next() {
                            let c = c.to_ascii_lowercase();
                            if pressed {
                                if !event.repeat {
                                    self.state.chars_pressed.insert(c);
                                }
                                self.state.chars_down.insert(c);
                            } else {
                                self.state.chars_down.remove(&c);
                            }
                        }
                    }
                    _ => {}
                }
                self.request_redraw();
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if state == ElementState::Pressed {
                    self.state.click(button);
                    self.after_input(event_loop);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(window) = self.window.clone() else {
                    return;
                };
                let quit = self.state.update();
                if quit {
                    emit(&self.state.take_events());
                    event_loop.exit();
                    return;
                }

                if let Some(ref mut surface) = self.surface {
                    let size = window.inner_size();
                    let fb_w = size.width.max(1);
                    let fb_h = size.height.max(1);
                    match surface.buffer_mut() {
                        Ok(mut buffer) => {
                            self.state.render(&mut buffer, fb_w, fb_h);
                            if let Err(e) = buffer.present() {
                                log::error!("Failed to present frame: {}", e);
                            }
                        }
                        Err(e) => log::error!("Failed to get frame buffer: {}", e),
                    }
                }
                emit(&self.state.take_events());

                // Keep drawing while the strip scrolls
                self.next_redraw = if self.state.is_scrolling() {
                    Some(Instant::now() + SCROLL_FRAME)
                } else {
                    None
                };
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(when) = self.next_redraw {
            if Instant::now() >= when {
                self.next_redraw = None;
                self.request_redraw();
            } else {
                event_loop.set_control_flow(ControlFlow::WaitUntil(when));
            }
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.state.shutdown();
        self.surface = None;
        self.context = None;
        self.window = None;
    }
}
