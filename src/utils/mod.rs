pub mod time;

/// Generates a new random identifier for instances and events.
pub fn longid() -> String {
    nanoid::nanoid!()
}

