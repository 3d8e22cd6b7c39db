use crate::models::ToastKind;
use crate::state::{Action, Store, ViewState};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::time::sleep;

pub const TOAST_DURATION: Duration = Duration::from_secs(3);

/// Shows one toast at a time; a newer toast replaces a pending one.
pub struct Toaster {
    store: Arc<Store<ViewState>>,
    generation: AtomicU64,
}

impl Toaster {
    pub fn new(store: Arc<Store<ViewState>>) -> Self {
        Self {
            store,
            generation: AtomicU64::new(0),
        }
    }

    /// Must be called from within a tokio runtime; the hide timer is a task.
    pub fn show(&self, message: impl Into<String>, kind: ToastKind) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.store.dispatch(Action::ToastShown {
            message: message.into(),
            kind,
            generation,
        });

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            sleep(TOAST_DURATION).await;
            store.dispatch(Action::ToastExpired { generation });
        });
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Success);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Error);
    }
}
