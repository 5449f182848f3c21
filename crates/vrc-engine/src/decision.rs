//! Passthrough-or-recompress decision.
//!
//! Pure functions only: the same source facts and settings always yield the
//! same [`Decision`].

use vrc_models::settings::MIN_DIMENSION_BOUND;
use vrc_models::{Action, Decision, DecisionReason, Settings, SourceInfo};

/// Files larger than this are recompressed even when within bounds.
pub const DEFAULT_SIZE_THRESHOLD_BYTES: u64 = 5_000_000;

/// Decide what to do with `source` under `settings`.
pub fn decide(source: &SourceInfo, settings: &Settings, size_threshold_bytes: u64) -> Decision {
    let reason = if !source.fits_within(settings.max_width, settings.max_height) {
        DecisionReason::ExceedsDimensions
    } else if source.size_bytes > size_threshold_bytes {
        DecisionReason::ExceedsSize
    } else {
        return Decision {
            action: Action::Passthrough,
            reason: DecisionReason::WithinLimits,
            target_width: source.width,
            target_height: source.height,
        };
    };

    let (target_width, target_height) =
        target_dimensions(source.width, source.height, settings.max_width, settings.max_height);

    Decision {
        action: Action::Recompress,
        reason,
        target_width,
        target_height,
    }
}

/// Fit `width`x`height` into `max_width`x`max_height`.
///
/// Scales both sides by the same factor (never up), so the limiting side
/// lands on its bound, then rounds each side down to an even number (at
/// least 2). Bounds below 2 are rejected when settings are parsed.
pub fn target_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (w, h) = if width == 0 || height == 0 {
        (width.min(max_width), height.min(max_height))
    } else if width <= max_width && height <= max_height {
        (width, height)
    } else {
        let (w64, h64) = (u64::from(width), u64::from(height));
        let (mw64, mh64) = (u64::from(max_width), u64::from(max_height));
        // Compare width/max_width against height/max_height without division
        if w64 * mh64 >= h64 * mw64 {
            (max_width, (h64 * mw64 / w64) as u32)
        } else {
            ((w64 * mh64 / h64) as u32, max_height)
        }
    };

    (even(w), even(h))
}

fn even(value: u32) -> u32 {
    (value & !1).max(MIN_DIMENSION_BOUND)
}
