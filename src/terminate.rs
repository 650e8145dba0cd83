// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Bounded copy-then-terminate helpers for device tree string properties.
// Author: Lukas Bower

//! Device tree properties carry a byte length, not a string contract: a
//! "string" property may or may not end in NUL, and may stop short of the
//! width a fixed-format consumer expects. Every string-shaped property goes
//! through one of these helpers before it is interpreted.

use std::borrow::Cow;
use std::collections::TryReserveError;

/// Returns `bytes` unchanged when its last byte is NUL, otherwise an owned
/// scratch copy of `len + 1` bytes with a NUL appended.
///
/// An empty property is never terminated and always yields `[0]`.
pub fn terminated(bytes: &[u8]) -> Result<Cow<'_, [u8]>, TryReserveError> {
    if bytes.last() == Some(&0) {
        return Ok(Cow::Borrowed(bytes));
    }
    let mut scratch = Vec::new();
    scratch.try_reserve_exact(bytes.len() + 1)?;
    scratch.extend_from_slice(bytes);
    scratch.push(0);
    Ok(Cow::Owned(scratch))
}

/// Fixed-width variant for properties with a known text width of `N - 1`.
///
/// When byte `N - 1` of `bytes` exists and is NUL the property is used in
/// place. Otherwise at most `N - 1` bytes are copied into `scratch` and
/// `scratch[N - 1]` is forced to NUL, so an overlong or unterminated value is
/// clamped and a short one is zero-padded.
pub fn terminated_fixed<'a, const N: usize>(bytes: &'a [u8], scratch: &'a mut [u8; N]) -> &'a [u8] {
    if N > 0 && bytes.get(N - 1) == Some(&0) {
        return bytes;
    }
    scratch.fill(0);
    let copy = bytes.len().min(N.saturating_sub(1));
    scratch[..copy].copy_from_slice(&bytes[..copy]);
    &scratch[..]
}

/// The prefix of a terminated buffer before its first NUL.
#[must_use]
pub fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&byte| byte == 0) {
        Some(len) => &bytes[..len],
        None => bytes,
    }
}
