//! Compilation target description.
//!
//! All widths are in bits. A target is chosen at context creation and
//! never changes afterwards; layout, conversions and C-varargs promotion
//! all read from it.

/// Sizes and alignments of the C FFI types on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FfiWidths {
    pub size_of_bool: u32,
    pub align_of_bool: u32,
    pub size_of_char: u32,
    pub align_of_char: u32,
    pub size_of_short: u32,
    pub align_of_short: u32,
    pub size_of_int: u32,
    pub align_of_int: u32,
    pub size_of_long: u32,
    pub align_of_long: u32,
    pub size_of_long_long: u32,
    pub align_of_long_long: u32,
    pub size_of_float: u32,
    pub align_of_float: u32,
    pub size_of_double: u32,
    pub align_of_double: u32,
}

/// Sizes and alignments of the Sable primitive types on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LangWidths {
    pub size_of_bool: u32,
    pub align_of_bool: u32,
    pub size_of_int: u32,
    pub align_of_int: u32,
    pub size_of_float: u32,
    pub align_of_float: u32,
}

/// Everything the front end needs to know about the machine it compiles
/// for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    pub size_of_pointer: u32,
    pub align_of_pointer: u32,
    pub ffi: FfiWidths,
    pub lang: LangWidths,
    pub char_is_signed: bool,
}

impl Target {
    /// The default 64-bit SysV-shaped target.
    #[must_use]
    pub const fn x86_64() -> Self {
        Target {
            size_of_pointer: 64,
            align_of_pointer: 64,
            ffi: FfiWidths {
                size_of_bool: 8,
                align_of_bool: 8,
                size_of_char: 8,
                align_of_char: 8,
                size_of_short: 16,
                align_of_short: 16,
                size_of_int: 32,
                align_of_int: 32,
                size_of_long: 64,
                align_of_long: 64,
                size_of_long_long: 64,
                align_of_long_long: 64,
                size_of_float: 32,
                align_of_float: 32,
                size_of_double: 64,
                align_of_double: 64,
            },
            lang: LangWidths {
                size_of_bool: 8,
                align_of_bool: 8,
                size_of_int: 64,
                align_of_int: 64,
                size_of_float: 64,
                align_of_float: 64,
            },
            char_is_signed: true,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::x86_64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_is_64_bit() {
        let target = Target::default();
        assert_eq!(target.size_of_pointer, 64);
        assert_eq!(target.lang.size_of_int, 64);
        assert_eq!(target.ffi.size_of_int, 32);
    }
}
