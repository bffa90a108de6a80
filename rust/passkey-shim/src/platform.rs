//! Cross-target helpers.
//!
//! The shim runs inside a single-threaded page on `wasm32-unknown-unknown`
//! and on a multi-threaded tokio runtime natively (where it is tested). The
//! bound traits below are `Send`/`Send + Sync` natively and empty on wasm.

use std::future::Future;
use std::time::Duration;

#[allow(missing_docs)]
#[cfg(not(target_arch = "wasm32"))]
pub trait ConditionalSend: Send {}

#[cfg(not(target_arch = "wasm32"))]
impl<S> ConditionalSend for S where S: Send {}

#[allow(missing_docs)]
#[cfg(not(target_arch = "wasm32"))]
pub trait ConditionalSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<S> ConditionalSync for S where S: Send + Sync {}

#[allow(missing_docs)]
#[cfg(target_arch = "wasm32")]
pub trait ConditionalSend {}

#[cfg(target_arch = "wasm32")]
impl<S> ConditionalSend for S {}

#[allow(missing_docs)]
#[cfg(target_arch = "wasm32")]
pub trait ConditionalSync {}

#[cfg(target_arch = "wasm32")]
impl<S> ConditionalSync for S {}

/// Run a future in the background without waiting for it.
///
/// Natively this needs an ambient tokio runtime. Without one the task is
/// dropped and a warning is logged.
#[cfg(not(target_arch = "wasm32"))]
pub fn detach<F>(future: F)
where
    F: Future<Output = ()> + ConditionalSend + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => tracing::warn!("No async runtime available; background task dropped"),
    }
}

/// Run a future in the background without waiting for it.
#[cfg(target_arch = "wasm32")]
pub fn detach<F>(future: F)
where
    F: Future<Output = ()> + ConditionalSend + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Suspend for `duration`.
#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await
}

/// A pending `setTimeout`, cleared when dropped.
#[cfg(target_arch = "wasm32")]
struct Timeout(wasm_bindgen::JsValue);

#[cfg(target_arch = "wasm32")]
impl Timeout {
    fn set(callback: &js_sys::Function, duration: Duration) -> Option<Self> {
        let millis = duration.as_millis().min(i32::MAX as u128) as f64;
        let global = js_sys::global();
        global_function(&global, "setTimeout")?
            .call2(&global, callback, &wasm_bindgen::JsValue::from_f64(millis))
            .ok()
            .map(Timeout)
    }
}

#[cfg(target_arch = "wasm32")]
impl Drop for Timeout {
    fn drop(&mut self) {
        let global = js_sys::global();
        if let Some(clear) = global_function(&global, "clearTimeout") {
            let _ = clear.call1(&global, &self.0);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn global_function(global: &js_sys::Object, name: &str) -> Option<js_sys::Function> {
    use wasm_bindgen::JsCast;

    js_sys::Reflect::get(global, &wasm_bindgen::JsValue::from_str(name))
        .ok()?
        .dyn_into()
        .ok()
}

/// Suspend for `duration`, using the global `setTimeout`. Dropping the
/// future clears the timer.
#[cfg(target_arch = "wasm32")]
pub async fn sleep(duration: Duration) {
    let mut timeout = None;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        timeout = Timeout::set(&resolve, duration);
    });
    if timeout.is_none() {
        tracing::warn!("setTimeout unavailable; not sleeping");
        return;
    }
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    async fn it_clears_a_dropped_timer() {
        let fired = Rc::new(Cell::new(false));
        let callback = Closure::<dyn FnMut()>::new({
            let fired = fired.clone();
            move || fired.set(true)
        });

        let timeout = Timeout::set(callback.as_ref().unchecked_ref(), Duration::from_millis(5));
        assert!(timeout.is_some());
        drop(timeout);

        sleep(Duration::from_millis(20)).await;
        assert!(!fired.get());
    }
}
