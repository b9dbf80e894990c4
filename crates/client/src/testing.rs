//! Test doubles for the network and the notifier.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use noor_core::Error;

use crate::fetch::{Network, Request, Response, ResponseType};
use crate::notify::{Notification, Notifier};

/// Canned reply for one URL.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond { status: u16, response_type: ResponseType, content_type: Option<String>, body: Bytes },
    Fail,
}

impl Reply {
    pub fn ok(body: &'static str) -> Self {
        Reply::Respond {
            status: 200,
            response_type: ResponseType::Basic,
            content_type: Some("text/html".into()),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Respond { status, response_type: ResponseType::Basic, content_type: None, body: Bytes::new() }
    }

    pub fn cross_origin(body: &'static str) -> Self {
        Reply::Respond {
            status: 200,
            response_type: ResponseType::Cors,
            content_type: None,
            body: Bytes::from_static(body.as_bytes()),
        }
    }
}

/// Network answering from a URL table. Unknown URLs fail like an offline
/// network.
#[derive(Debug, Default)]
pub struct StubNetwork {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub fn with(mut self, url: &str, reply: Reply) -> Self {
        self.replies.get_mut().unwrap().insert(url.to_string(), reply);
        self
    }

    pub fn set(&self, url: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    /// Make every URL fail.
    pub fn go_offline(&self) {
        let mut replies = self.replies.lock().unwrap();
        for reply in replies.values_mut() {
            *reply = Reply::Fail;
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.as_str().to_string();
        self.calls.lock().unwrap().push(url.clone());

        let reply = self.replies.lock().unwrap().get(&url).cloned().unwrap_or(Reply::Fail);
        match reply {
            Reply::Respond { status, response_type, content_type, body } => Ok(Response {
                url: request.url.clone(),
                status,
                response_type,
                content_type,
                headers: Vec::new(),
                body,
            }),
            Reply::Fail => Err(Error::Network(format!("{url}: offline"))),
        }
    }
}

/// Notifier that remembers what it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
    fail_next: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.shown().into_iter().map(|n| n.tag).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &Notification) -> Result<(), Error> {
        self.shown.lock().unwrap().push(notification.clone());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::NotifyFailed("display unavailable".into()));
        }
        Ok(())
    }
}
