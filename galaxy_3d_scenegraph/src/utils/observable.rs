/// Ordered listener lists for render-loop hooks.
///
/// Listeners run synchronously, in registration order, at fixed points of the
/// frame. They receive event data only, never the scene, so they cannot
/// re-enter the frame being rendered.

/// Handle returned by `Observable::add`, used to remove a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Observer<T> {
    id: ObserverId,
    callback: Box<dyn FnMut(&T) + Send>,
    once: bool,
}

/// An ordered list of listeners for events of type `T`.
pub struct Observable<T> {
    observers: Vec<Observer<T>>,
    next_id: u64,
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self { observers: Vec::new(), next_id: 0 }
    }

    /// Append a listener
    pub fn add<F: FnMut(&T) + Send + 'static>(&mut self, callback: F) -> ObserverId {
        self.push(Box::new(callback), false)
    }

    /// Append a listener removed after its first call
    pub fn add_once<F: FnMut(&T) + Send + 'static>(&mut self, callback: F) -> ObserverId {
        self.push(Box::new(callback), true)
    }

    fn push(&mut self, callback: Box<dyn FnMut(&T) + Send>, once: bool) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push(Observer { id, callback, once });
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| o.id != id);
        self.observers.len() != before
    }

    /// Call every listener in order
    pub fn notify(&mut self, event: &T) {
        for observer in &mut self.observers {
            (observer.callback)(event);
        }
        self.observers.retain(|o| !o.once);
    }

    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "observable_tests.rs"]
mod tests;
