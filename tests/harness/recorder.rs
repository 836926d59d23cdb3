//! Handler that records events.

use std::sync::{Arc, Mutex};

use wsloop::{Control, Error, Handler, Message, WebSocket};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Message(Message),
    Control(Control),
    Error(Error),
    Close,
}

/// Records every callback; optionally echoes messages back.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    echo: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == Event::Close)
            .count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Handler for Recorder {
    fn on_connect(&mut self, _ws: &WebSocket) {
        self.push(Event::Connect);
    }

    fn on_message(&mut self, ws: &WebSocket, message: Message) {
        if self.echo {
            let _ = ws.send(message.clone());
        }
        self.push(Event::Message(message));
    }

    fn on_control(&mut self, _ws: &WebSocket, control: &Control) {
        self.push(Event::Control(control.clone()));
    }

    fn on_error(&mut self, _ws: &WebSocket, error: &Error) {
        self.push(Event::Error(error.clone()));
    }

    fn on_close(&mut self) {
        self.push(Event::Close);
    }
}
