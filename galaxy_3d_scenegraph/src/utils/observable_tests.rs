use std::sync::{Arc, Mutex};
use super::*;

#[test]
fn test_listeners_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut observable: Observable<u64> = Observable::new();

    let first = log.clone();
    observable.add(move |id| first.lock().unwrap().push(format!("a{}", id)));
    let second = log.clone();
    observable.add(move |id| second.lock().unwrap().push(format!("b{}", id)));

    observable.notify(&7);
    assert_eq!(*log.lock().unwrap(), vec!["a7".to_string(), "b7".to_string()]);
}

#[test]
fn test_remove_listener() {
    let count = Arc::new(Mutex::new(0));
    let mut observable: Observable<()> = Observable::new();
    let c = count.clone();
    let id = observable.add(move |_| *c.lock().unwrap() += 1);

    observable.notify(&());
    assert!(observable.remove(id));
    assert!(!observable.remove(id));
    observable.notify(&());

    assert_eq!(*count.lock().unwrap(), 1);
    assert!(!observable.has_observers());
}

#[test]
fn test_add_once_fires_a_single_time() {
    let count = Arc::new(Mutex::new(0));
    let mut observable: Observable<()> = Observable::new();
    let c = count.clone();
    observable.add_once(move |_| *c.lock().unwrap() += 1);

    observable.notify(&());
    observable.notify(&());
    assert_eq!(*count.lock().unwrap(), 1);
    assert!(observable.is_empty());
}
