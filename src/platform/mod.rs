/// Best-effort notification and vibration surface. Calls are fire-and-forget;
/// implementations swallow their own failures — a dead notification service
/// must never take the alarm down with it.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
    fn vibrate(&self, pattern_ms: &[u64]);
}

/// No-op notifier for embedders without a notification surface.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _title: &str, _body: &str) {}
    fn vibrate(&self, _pattern_ms: &[u64]) {}
}
