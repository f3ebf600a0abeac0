use std::sync::atomic::{AtomicBool, Ordering};

use crate::notification::{RemovalCause, RemovalListener};

/// Hands discarded records to the removal listener, if any.
///
/// Without a listener, records are simply dropped. A listener that panics is
/// disabled; from then on records are dropped.
pub(crate) struct RemovalNotifier<T> {
    listener: Option<RemovalListener<T>>,
    is_enabled: AtomicBool,
    #[cfg(feature = "logging")]
    table_name: Option<String>,
}

impl<T> RemovalNotifier<T> {
    pub(crate) fn new(listener: Option<RemovalListener<T>>, _table_name: Option<String>) -> Self {
        Self {
            listener,
            is_enabled: AtomicBool::new(true),
            #[cfg(feature = "logging")]
            table_name: _table_name,
        }
    }

    pub(crate) fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub(crate) fn notify(&self, record: T, cause: RemovalCause) {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let Some(listener) = &self.listener else {
            return;
        };
        if !self.is_enabled.load(Ordering::Acquire) {
            return;
        }

        let listener_clo = || listener(record, cause);

        // Safety: It is safe to assert unwind safety here because we will not
        // call the listener again if it has been panicked.
        let result = catch_unwind(AssertUnwindSafe(listener_clo));
        if let Err(_payload) = result {
            self.is_enabled.store(false, Ordering::Release);
            #[cfg(feature = "logging")]
            log_panic(&*_payload, self.table_name.as_deref());
        }
    }

    pub(crate) fn notify_all(&self, records: impl IntoIterator<Item = T>, cause: RemovalCause) {
        for record in records {
            self.notify(record, cause);
        }
    }
}

#[cfg(feature = "logging")]
fn log_panic(payload: &(dyn std::any::Any + Send + 'static), table_name: Option<&str>) {
    // Try to downcast the payload into &str or String.
    let message: Option<std::borrow::Cow<'_, str>> =
        (payload.downcast_ref::<&str>().map(|s| (*s).into()))
            .or_else(|| payload.downcast_ref::<String>().map(Into::into));

    let tn = crate::common::name_prefix(table_name);

    if let Some(m) = message {
        log::error!("{tn}Disabled the removal listener because it panicked at '{m}'");
    } else {
        log::error!("{tn}Disabled the removal listener because it panicked");
    }
}
