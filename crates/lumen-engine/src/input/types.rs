/// Keyboard key identifier.
///
/// Only the keys the frame loop reacts to are named. Everything else is
/// carried as `Key::Unknown` with the platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,

    /// Platform-dependent key not represented here.
    Unknown(u32),
}

impl Key {
    /// Returns `true` for keys that end the render loop.
    pub fn is_quit(&self) -> bool {
        matches!(self, Key::Escape)
    }
}
