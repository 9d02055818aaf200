use chromiumoxide::Browser;
use chromiumoxide::Page;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::task::JoinHandle;

/// One conversation's headless browser, kept alive across tool calls.
///
/// `page` holds the current active tab; browser tools (`browser_navigate`,
/// `browser_click`, `browser_screenshot`, ...) operate against it directly
/// rather than re-resolving a page handle on every call.
pub struct BrowserSession {
    pub conversation_id: String,
    // A tokio mutex, not parking_lot: `Browser::close` is async and the guard
    // must be held across the await point.
    browser: tokio::sync::Mutex<Browser>,
    page: Mutex<Page>,
    pub(crate) last_access_ms: AtomicI64,
    idle_timer: Mutex<Option<JoinHandle<()>>>,
    _handler_task: JoinHandle<()>,
}

impl BrowserSession {
    pub(crate) fn new(
        conversation_id: String,
        browser: Browser,
        page: Page,
        handler_task: JoinHandle<()>,
    ) -> Self {
        Self {
            conversation_id,
            browser: tokio::sync::Mutex::new(browser),
            page: Mutex::new(page),
            last_access_ms: AtomicI64::new(now_ms()),
            idle_timer: Mutex::new(None),
            _handler_task: handler_task,
        }
    }

    /// The active page for browser tool calls.
    pub fn page(&self) -> Page {
        self.page.lock().clone()
    }

    /// Replace the active page (e.g. after a tool opens a new tab).
    pub fn set_page(&self, page: Page) {
        *self.page.lock() = page;
    }

    pub(crate) fn touch(&self) {
        self.last_access_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub(crate) fn set_idle_timer(&self, handle: JoinHandle<()>) {
        *self.idle_timer.lock() = Some(handle);
    }

    pub(crate) fn cancel_idle_timer(&self) {
        if let Some(handle) = self.idle_timer.lock().take() {
            handle.abort();
        }
    }

    pub(crate) async fn close(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::debug!(
                conversation_id = %self.conversation_id,
                error = %e,
                "best-effort browser close failed"
            );
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
