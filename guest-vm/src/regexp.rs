use crate::VmError;
use std::fmt;

/// RegExp flag bits.
///
/// The numeric layout is part of the embedding API: embedders pass and receive flags as a raw
/// `u32`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegExpFlags(pub u32);

impl RegExpFlags {
  /// `i`
  pub const FOLD: u32 = 0x01;
  /// `g`
  pub const GLOBAL: u32 = 0x02;
  /// `m`
  pub const MULTILINE: u32 = 0x04;
  /// `y`
  pub const STICKY: u32 = 0x08;

  const ALL: u32 = Self::FOLD | Self::GLOBAL | Self::MULTILINE | Self::STICKY;

  pub fn bits(self) -> u32 {
    self.0
  }

  pub fn contains(self, bit: u32) -> bool {
    self.0 & bit != 0
  }

  /// Parses a flags string such as `"gi"`.
  pub fn parse(flags: &[u8]) -> Result<Self, VmError> {
    let mut bits = 0u32;
    for &c in flags {
      let bit = match c {
        b'i' => Self::FOLD,
        b'g' => Self::GLOBAL,
        b'm' => Self::MULTILINE,
        b'y' => Self::STICKY,
        _ => return Err(VmError::TypeError("invalid regular expression flags")),
      };
      if bits & bit != 0 {
        return Err(VmError::TypeError("invalid regular expression flags"));
      }
      bits |= bit;
    }
    Ok(Self(bits))
  }
}

impl fmt::Display for RegExpFlags {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (bit, c) in [
      (Self::GLOBAL, 'g'),
      (Self::FOLD, 'i'),
      (Self::MULTILINE, 'm'),
      (Self::STICKY, 'y'),
    ] {
      if self.contains(bit) {
        write!(f, "{c}")?;
      }
    }
    Ok(())
  }
}

impl fmt::Debug for RegExpFlags {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "RegExpFlags({:#x} /{self}/)", self.0)
  }
}

/// Checks that `source` compiles under `flags`.
///
/// Unknown flag bits are preserved by the runtime but ignored here.
pub(crate) fn validate(source: &[u8], flags: RegExpFlags) -> Result<(), VmError> {
  let invalid = |reason: String| VmError::InvalidRegExp {
    pattern: String::from_utf8_lossy(source).into_owned(),
    reason,
  };
  let pattern = std::str::from_utf8(source).map_err(|e| invalid(e.to_string()))?;
  regex::bytes::RegexBuilder::new(pattern)
    .case_insensitive(flags.contains(RegExpFlags::FOLD))
    .multi_line(flags.contains(RegExpFlags::MULTILINE))
    .build()
    .map_err(|e| invalid(e.to_string()))?;
  if flags.0 & !RegExpFlags::ALL != 0 {
    tracing::trace!(flags = flags.0, "regexp carries unknown flag bits");
  }
  Ok(())
}
