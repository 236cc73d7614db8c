#![macro_use]
#![allow(unused_macros)]

// Logging shims so the crate builds (and unit tests link) without a defmt
// global logger. With the `defmt-03` feature the macros forward to defmt,
// otherwise they evaluate their arguments and discard them.

macro_rules! trace {
    ($s:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-03")]
        ::defmt::trace!($s $(, $arg)*);
        #[cfg(not(feature = "defmt-03"))]
        { let _ = ($( & $arg ),*); }
    }};
}

macro_rules! debug {
    ($s:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-03")]
        ::defmt::debug!($s $(, $arg)*);
        #[cfg(not(feature = "defmt-03"))]
        { let _ = ($( & $arg ),*); }
    }};
}

macro_rules! warn {
    ($s:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-03")]
        ::defmt::warn!($s $(, $arg)*);
        #[cfg(not(feature = "defmt-03"))]
        { let _ = ($( & $arg ),*); }
    }};
}
