use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

static LAST_MONOTONIC_MICROS: AtomicI64 = AtomicI64::new(0);

pub fn time_millis() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_millis()
}

pub fn time_micros() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_micros()
}

/// Wall-clock microseconds that never repeat within the process,
/// even when two callers read the clock in the same microsecond.
pub fn monotonic_micros() -> i64 {
    let now = time_micros();
    let mut last = LAST_MONOTONIC_MICROS.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_MONOTONIC_MICROS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::monotonic_micros;

    #[test]
    fn test_monotonic_micros_never_repeats() {
        let handles: Vec<_> = (0..4).map(|_| std::thread::spawn(|| (0..500).map(|_| monotonic_micros()).collect::<Vec<_>>())).collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for v in handle.join().unwrap() {
                assert!(seen.insert(v), "duplicate timestamp {v}");
            }
        }
    }
}
