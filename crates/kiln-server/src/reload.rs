//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use kiln_pipeline::{TaskName, TaskReport};

/// WebSocket endpoint browsers connect to.
pub const SOCKET_PATH: &str = "/__livereload";

/// Path the client script is served from.
pub const SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload,

    /// Swap one stylesheet in place
    InjectCss {
        /// URL path of the stylesheet
        href: String,
    },

    /// Connection established
    Connected,
}

/// Hub broadcasting reload messages to every connected client.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Push the signal matching a finished task: stylesheets are injected,
    /// everything else reloads the page. Reports that wrote nothing are ignored.
    pub fn notify(&self, report: &TaskReport) {
        for msg in messages_for(report) {
            tracing::debug!("Live reload: {:?}", msg);
            self.send(msg);
        }
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

fn messages_for(report: &TaskReport) -> Vec<ReloadMessage> {
    if !report.wrote_anything() {
        return Vec::new();
    }

    match report.task {
        TaskName::Styles => report
            .outputs
            .iter()
            .map(|path| ReloadMessage::InjectCss {
                href: format!("/{}", path.to_string_lossy().replace('\\', "/")),
            })
            .collect(),
        _ => vec![ReloadMessage::Reload],
    }
}

/// Add the client script tag to an HTML document, before `</body>` when present.
pub fn inject_client(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, SCRIPT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(at) => format!("{}{}{}", &html[..at], tag, &html[at..]),
        None => format!("{}{}", html, tag),
    }
}

/// Client-side live reload script.
pub fn reload_client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var protocol = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var ws = new WebSocket(protocol + location.host + '{}');

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'inject_css':
        var links = document.querySelectorAll('link[rel="stylesheet"]');
        var swapped = false;
        links.forEach(function(link) {{
          var url = new URL(link.href, location.href);
          if (url.pathname === msg.href) {{
            url.searchParams.set('kiln', Date.now());
            link.href = url.toString();
            swapped = true;
          }}
        }});
        if (!swapped) {{
          location.reload();
        }}
        break;

      case 'connected':
        console.log('[kiln] live reload connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[kiln] live reload disconnected');
    setTimeout(function() {{ location.reload(); }}, 1000);
  }};
}})();
"#,
        SOCKET_PATH
    )
}
