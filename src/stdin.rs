use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use winit::event_loop::EventLoopProxy;

use crate::ui::UserEvent;

/// Reads command lines from stdin on a background thread and hands each one
/// to the event loop. The thread ends at EOF or once the loop is gone.
pub fn spawn_reader(proxy: EventLoopProxy<UserEvent>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("stdin-reader".into()).spawn(move || {
        let stdin = io::stdin();
        forward_lines(stdin.lock(), |line| proxy.send_event(UserEvent::Command(line)).is_ok());
    })
}

fn forward_lines<R: BufRead>(reader: R, mut send: impl FnMut(String) -> bool) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read stdin: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if !send(line) {
            log::debug!("Event loop closed, stdin reader exiting");
            return;
        }
    }
    log::debug!("stdin closed");
}
