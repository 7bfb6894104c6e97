mod cache;
mod cli;
mod commands;
mod error;
mod lazy;
mod library;
mod loader;
mod paging;
mod stdin;
mod ui;

use clap::Parser;
use winit::event_loop::EventLoop;

use crate::cli::Cli;
use crate::commands::{Command, OutputEvent};
use crate::loader::MediaPool;
use crate::ui::state::ViewerState;
use crate::ui::{emit, App, UserEvent};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let event_loop = match EventLoop::<UserEvent>::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };

    let media_proxy = event_loop.create_proxy();
    let pool = MediaPool::new(cli.worker_count(), cli.classify_config(), move || {
        let _ = media_proxy.send_event(UserEvent::MediaReady);
    });

    let mut state = ViewerState::new(
        pool,
        cli.mode,
        (cli.width, cli.height),
        cli.scroll_config(),
    );
    emit(&[OutputEvent::CurrentMode(cli.mode)]);

    if !cli.paths.is_empty() {
        if let Err(e) = state.execute(Command::AddImages { tag: 0, paths: cli.paths.clone() }) {
            log::warn!("{}", e);
        }
    }

    if !cli.no_stdin {
        if let Err(e) = stdin::spawn_reader(event_loop.create_proxy()) {
            log::error!("Failed to start stdin reader: {}", e);
        }
    }

    let mut app = App::new(state);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop failed: {}", e);
    }
}
