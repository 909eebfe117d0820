//! Server-rendered HTML. Every user-visible string is escaped here, so
//! handlers and the relay never interpolate raw client or tool text.

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// One chat bubble. `class` distinguishes user and assistant styling.
pub fn message_bubble(class: &str, text: &str) -> String {
    format!(
        "<div class=\"message {}\">{}</div>",
        escape_html(class),
        escape_html(text)
    )
}

/// Placeholder the page script turns into a live event stream. The raw
/// message sits in a data attribute; the client re-encodes it with
/// `encodeURIComponent` when it builds the stream URL.
fn stream_init(thread_id: &str, message: &str, silent: bool) -> String {
    let silent_attr = if silent { " data-silent=\"1\"" } else { "" };
    format!(
        "<div class=\"stream-init\" data-thread-id=\"{}\" data-q=\"{}\"{}></div>",
        escape_html(thread_id),
        escape_html(message),
        silent_attr
    )
}

/// Fragment returned by the send route: the user's bubble plus the stream
/// hookup for the answer.
pub fn stream_fragment(thread_id: &str, message: &str) -> String {
    format!(
        "{}{}",
        message_bubble("user", message),
        stream_init(thread_id, message, false)
    )
}

/// Stream hookup without a user bubble; progress lines are muted too. Used
/// when a form submission turns into a command the user never typed.
pub fn silent_stream_fragment(thread_id: &str, message: &str) -> String {
    stream_init(thread_id, message, true)
}

/// The task entry form injected by the relay's `ui` event.
pub fn task_form_fragment(thread_id: &str) -> String {
    format!(
        concat!(
            "<form class=\"task-form\">",
            "<input type=\"hidden\" name=\"thread_id\" value=\"{tid}\">",
            "<label>Title <input name=\"description\" required></label>",
            "<label>Priority <input name=\"priority\" type=\"number\" min=\"1\" max=\"5\" value=\"3\"></label>",
            "<label>Due <input name=\"due_date\" type=\"date\" placeholder=\"YYYY-MM-DD\"></label>",
            "<label>Tags <input name=\"tags\" placeholder=\"comma, separated\"></label>",
            "<label>Notes <input name=\"notes\"></label>",
            "<button type=\"submit\">Add task</button>",
            "</form>"
        ),
        tid = escape_html(thread_id)
    )
}

/// The page itself is fully static; per-thread state lives in the cookie
/// and in the fragments the routes return.
pub fn page_shell() -> &'static str {
    PAGE_SHELL
}

const PAGE_SHELL: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>TaskMate</title>
<style>
  body { font-family: sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }
  #chat { border: 1px solid #ccc; border-radius: 6px; padding: 1rem; min-height: 16rem; }
  .message { white-space: pre-wrap; margin: 0.5rem 0; padding: 0.5rem 0.75rem; border-radius: 6px; }
  .message.user { background: #e8f0fe; }
  .message.assistant { background: #f1f3f4; }
  #status-line { color: #666; font-size: 0.9rem; min-height: 1.2rem; margin: 0.5rem 0; }
  #composer { display: flex; gap: 0.5rem; }
  #composer input[name="message"] { flex: 1; }
  .task-form { display: grid; gap: 0.4rem; margin: 0.5rem 0; padding: 0.75rem; border: 1px dashed #999; border-radius: 6px; }
</style>
</head>
<body>
<h1>TaskMate</h1>
<div id="chat"></div>
<div id="status-line"></div>
<form id="composer">
  <input name="message" autocomplete="off" placeholder="Add a task, ask for the form, or type a command">
  <button type="submit">Send</button>
  <button type="button" id="reset">Reset</button>
</form>
<script>
const chat = document.getElementById('chat');
const statusLine = document.getElementById('status-line');

function activateStreams() {
  for (const el of chat.querySelectorAll('.stream-init:not([data-active])')) {
    el.dataset.active = '1';
    const silent = el.dataset.silent === '1';
    const url = '/stream?thread_id=' + encodeURIComponent(el.dataset.threadId)
      + '&q=' + encodeURIComponent(el.dataset.q)
      + '&rid=' + Date.now();
    const source = new EventSource(url);
    source.addEventListener('status', (event) => {
      if (!silent) { statusLine.textContent = event.data; }
    });
    source.addEventListener('ui', (event) => {
      chat.insertAdjacentHTML('beforeend', event.data);
      wireTaskForms();
    });
    source.addEventListener('final', (event) => {
      if (event.data) { chat.insertAdjacentHTML('beforeend', event.data); }
      statusLine.textContent = '';
      source.close();
    });
    source.onerror = () => { source.close(); statusLine.textContent = ''; };
  }
}

function wireTaskForms() {
  for (const form of chat.querySelectorAll('.task-form:not([data-wired])')) {
    form.dataset.wired = '1';
    form.addEventListener('submit', async (event) => {
      event.preventDefault();
      const response = await fetch('/submit_task_form', {
        method: 'POST',
        body: new URLSearchParams(new FormData(form)),
      });
      form.remove();
      if (response.status !== 204) {
        chat.insertAdjacentHTML('beforeend', await response.text());
        activateStreams();
      }
    });
  }
}

document.getElementById('composer').addEventListener('submit', async (event) => {
  event.preventDefault();
  const input = event.target.elements.message;
  const response = await fetch('/send', {
    method: 'POST',
    body: new URLSearchParams({ message: input.value }),
  });
  input.value = '';
  if (response.status !== 204) {
    chat.insertAdjacentHTML('beforeend', await response.text());
    activateStreams();
  }
});

document.getElementById('reset').addEventListener('click', async () => {
  await fetch('/reset', { method: 'POST' });
  chat.innerHTML = '';
  statusLine.textContent = '';
});
</script>
</body>
</html>
"#;
