use chrono::{Local, TimeZone};
use std::collections::HashMap;
use textwrap::wrap;

use chatline::{ChatSession, DeliveryState, Message, MessageId, SessionEvent};

const WRAP_WIDTH: usize = 72;

/// Line-oriented transcript: prints each message once, and again if its delivery state changes.
pub struct ChatView {
    printed: HashMap<MessageId, (DeliveryState, Option<String>)>,
    greeted: bool,
}

impl ChatView {
    pub fn new() -> Self {
        ChatView {
            printed: HashMap::new(),
            greeted: false,
        }
    }

    pub async fn handle(&mut self, session: &ChatSession, event: SessionEvent) {
        match event {
            SessionEvent::MessagesChanged => self.render(session).await,
            SessionEvent::Toast(text) => eprintln!("!! {}", text),
            SessionEvent::UnreadChanged(unread) if !unread.is_empty() => {
                println!("-- {} unread --", unread.count);
            }
            SessionEvent::UnreadChanged(_)
            | SessionEvent::ScrollToBottom { .. }
            | SessionEvent::ClearInput => {}
        }
    }

    /// Print what is new since the last render. Printed inbound messages count as seen.
    async fn render(&mut self, session: &ChatSession) {
        let state = session.snapshot().await;

        if !self.greeted && !state.greetings.is_empty() {
            for greeting in &state.greetings {
                print_message(greeting, DeliveryState::Confirmed);
            }
            self.greeted = true;
        }

        let mut seen = Vec::new();
        for message in &state.messages {
            let delivery = state.delivery_of(message.id);
            let key = (delivery, message.image_url.clone());
            if self.printed.get(&message.id) == Some(&key) {
                continue;
            }
            print_message(message, delivery);
            self.printed.insert(message.id, key);
            if message.awaits_read() {
                seen.push(message.id);
            }
        }

        for id in seen {
            session.message_visible(id, 1.0).await;
        }
    }
}

fn print_message(message: &Message, delivery: DeliveryState) {
    let time = Local
        .timestamp_opt(message.create_time, 0)
        .single()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();
    let who = if message.is_inbound() { "agent" } else { "me" };
    let marker = match delivery {
        DeliveryState::Pending => " …",
        DeliveryState::Failed => " ✗ failed",
        DeliveryState::Confirmed => "",
    };

    let body = match (&message.content, &message.image_url) {
        (Some(text), _) => text.clone(),
        (None, Some(url)) => format!("[image] {}", url),
        (None, None) => String::new(),
    };

    let prefix = format!("[{}] {}:", time, who);
    let lines = wrap(&body, WRAP_WIDTH);
    match lines.split_first() {
        Some((first, rest)) => {
            println!("{} {}{}", prefix, first, marker);
            for line in rest {
                println!("{:width$} {}", "", line, width = prefix.len());
            }
        }
        None => println!("{}{}", prefix, marker),
    }
}
