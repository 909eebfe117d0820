pub mod error;
pub mod markup;
pub mod relay;
pub mod routes;
pub mod server;
pub mod state;

pub use error::*;
pub use markup::*;
pub use relay::*;
pub use routes::*;
pub use server::*;
pub use state::*;

#[cfg(test)]
mod tests {
    use super::{
        escape_html, looks_like_form_prompt, message_bubble, page_shell, router, run_relay,
        run_web_server, task_form_fragment, AppState, RelayEvent, TurnRelay, WebError,
        THREAD_COOKIE,
    };
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_types() {
        let _ = TypeId::of::<WebError>();
        let _ = TypeId::of::<AppState>();
        let _ = TypeId::of::<RelayEvent>();
        let _ = TypeId::of::<TurnRelay>();
        assert_eq!(THREAD_COOKIE, "taskmate_thread");
    }

    #[test]
    fn crate_root_reexports_helpers_and_handlers() {
        let _escape = escape_html;
        let _bubble = message_bubble;
        let _form = task_form_fragment;
        let _form_prompt = looks_like_form_prompt;
        let _page = page_shell;
        let _router: fn(AppState) -> axum::Router = router;
        let _run_server = run_web_server;
        let _relay = run_relay;
    }
}
