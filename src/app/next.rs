use tokio::sync::oneshot;

use crate::errors::GantryError;

/// What a layer asked the dispatcher to do through its [`Next`].
#[derive(Debug)]
pub(crate) enum Flow {
    Continue,
    Fail(GantryError),
}

/// One-shot continuation handed to every layer.
///
/// A layer either calls [`Next::proceed`] to hand the request to the
/// following layer, calls [`Next::fail`] to enter the error middleware
/// chain, or drops it once it has answered the request. It can be moved
/// into a spawned task; the dispatcher waits until it is used or dropped.
///
/// # Examples
///
/// ```rust,ignore
/// use gantry::app::{middleware_fn, Layer};
///
/// let logger = Layer::middleware(middleware_fn(|request, _response, next| async move {
///     log::info!("{} {}", request.method(), request.path());
///     next.proceed();
/// }));
/// ```
#[derive(Debug)]
pub struct Next {
    sender: oneshot::Sender<Flow>,
}

impl Next {
    pub(crate) fn channel() -> (Next, oneshot::Receiver<Flow>) {
        let (sender, receiver) = oneshot::channel();
        (Next { sender }, receiver)
    }

    /// Passes control to the next matching layer.
    pub fn proceed(self) {
        let _ = self
            .sender
            .send(Flow::Continue);
    }

    /// Forwards `error` to the error middleware chain.
    pub fn fail(self, error: GantryError) {
        let _ = self
            .sender
            .send(Flow::Fail(error));
    }
}
