//! Typed, stateless command descriptors.

/// A command tag plus its argument tuple.
///
/// Tags carry no data; they exist to key a registry and to tell a receiver
/// which `action` overload it is in. Declare them with [`actions!`](crate::actions).
pub trait Action: Default + Copy + 'static {
    /// Arguments delivered with the tag, as a tuple.
    type Args: Clone;

    const NAME: &'static str;
}

/// Anything that handles `A`.
pub trait ActionReceiver<A: Action> {
    fn action(&mut self, action: A, args: A::Args);
}

/// Declare action tags and their argument tuples.
///
/// ```ignore
/// actions! {
///     /// Start playback.
///     pub Play();
///     pub SetVolume(f32);
///     pub NoteOn(u8, f32);
/// }
/// ```
#[macro_export]
macro_rules! actions {
    ($( $(#[$meta:meta])* $vis:vis $name:ident ( $($arg:ty),* $(,)? ); )+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
            $vis struct $name;

            impl $crate::itc::Action for $name {
                type Args = ($($arg,)*);
                const NAME: &'static str = stringify!($name);
            }
        )+
    };
}
